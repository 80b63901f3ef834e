//! In-memory voice transport that keeps track of which guilds it is connected in.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use crate::embed::PLACEHOLDER_COVER;
use crate::error::RadioError;
use crate::models::TrackMetadata;
use crate::voice::{Dispatcher, VoiceTransport};

pub fn track(name: &str) -> TrackMetadata {
    TrackMetadata {
        song_name: name.to_string(),
        song_artist: "ClariS".to_string(),
        song_album: "BIRTHDAY".to_string(),
        song_cover: PLACEHOLDER_COVER.to_string(),
        listeners: 120,
    }
}

#[derive(Default)]
struct DispatcherState {
    volume: Option<f32>,
    stopped: bool,
    finished: bool,
}

#[derive(Clone, Default)]
pub struct FakeDispatcher {
    state: Arc<Mutex<DispatcherState>>,
}

impl FakeDispatcher {
    /// Last ratio handed to `set_volume`, before the loudness curve.
    pub fn volume(&self) -> Option<f32> {
        self.state.lock().unwrap().volume
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    /// The stream ends on its own; further track control fails.
    pub fn finish(&self) {
        self.state.lock().unwrap().finished = true;
    }
}

impl Dispatcher for FakeDispatcher {
    fn set_volume(&self, ratio: f32) -> Result<(), RadioError> {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return Err(RadioError::Track("track ended".to_string()));
        }

        state.volume = Some(ratio);
        Ok(())
    }

    fn stop(&self) -> Result<(), RadioError> {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return Err(RadioError::Track("track ended".to_string()));
        }

        state.stopped = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    Connect(GuildId, ChannelId, String),
    Disconnect(GuildId),
}

#[derive(Default)]
pub struct FakeTransport {
    refuse_joins: bool,
    dead_stream: bool,
    calls: Mutex<Vec<VoiceCall>>,
    connected: Mutex<HashSet<GuildId>>,
}

impl FakeTransport {
    pub fn failing() -> Self {
        Self {
            refuse_joins: true,
            ..Self::default()
        }
    }

    /// Joins the channel, then fails to open the stream.
    pub fn dead_stream() -> Self {
        Self {
            dead_stream: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Simulates someone else removing the bot from voice.
    pub fn kick(&self, guild_id: GuildId) {
        self.connected.lock().unwrap().remove(&guild_id);
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    type Dispatcher = FakeDispatcher;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        stream_url: &str,
    ) -> Result<FakeDispatcher, RadioError> {
        if self.refuse_joins {
            return Err(RadioError::Voice("Not in a voice channel".to_string()));
        }

        self.calls
            .lock()
            .unwrap()
            .push(VoiceCall::Connect(guild_id, channel_id, stream_url.to_string()));
        self.connected.lock().unwrap().insert(guild_id);

        if self.dead_stream {
            return Err(RadioError::Voice(format!("Could not open stream {stream_url}")));
        }

        Ok(FakeDispatcher::default())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(VoiceCall::Disconnect(guild_id));
        self.connected.lock().unwrap().remove(&guild_id);

        Ok(())
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        self.connected.lock().unwrap().contains(&guild_id)
    }
}
