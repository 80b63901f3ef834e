use std::sync::Arc;

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::tracks::TrackHandle;
use songbird::Songbird;
use tracing::info;

use crate::error::RadioError;

/// Exponent used to turn a linear volume ratio into perceived loudness.
const LOGARITHMIC_VOLUME_EXPONENT: f32 = 1.660964;

pub fn volume_ratio(percent: u8) -> f32 {
    f32::from(percent) / 100.0
}

pub fn logarithmic_gain(ratio: f32) -> f32 {
    ratio.max(0.0).powf(LOGARITHMIC_VOLUME_EXPONENT)
}

/// Handle to a stream that is currently playing in a voice channel.
pub trait Dispatcher: Send + Sync {
    /// `ratio` is the volume percentage divided by 100.
    fn set_volume(&self, ratio: f32) -> Result<(), RadioError>;
    fn stop(&self) -> Result<(), RadioError>;
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    type Dispatcher: Dispatcher;

    /// Joins `channel_id` and starts streaming `stream_url` into it.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        stream_url: &str,
    ) -> Result<Self::Dispatcher, RadioError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), RadioError>;

    async fn is_connected(&self, guild_id: GuildId) -> bool;
}

impl Dispatcher for TrackHandle {
    fn set_volume(&self, ratio: f32) -> Result<(), RadioError> {
        TrackHandle::set_volume(self, logarithmic_gain(ratio))
            .map_err(|why| RadioError::Track(why.to_string()))
    }

    fn stop(&self) -> Result<(), RadioError> {
        TrackHandle::stop(self).map_err(|why| RadioError::Track(why.to_string()))
    }
}

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    type Dispatcher = TrackHandle;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        stream_url: &str,
    ) -> Result<TrackHandle, RadioError> {
        // Open the stream first so a dead stream never leaves the bot sitting in voice.
        let source = songbird::input::ffmpeg(stream_url)
            .await
            .map_err(|why| RadioError::Voice(format!("Could not open stream {stream_url}: {why}")))?;

        let (handler_lock, joined) = self.manager.join(guild_id, channel_id).await;
        joined.map_err(|why| RadioError::Voice(why.to_string()))?;

        let mut handler = handler_lock.lock().await;

        if handler.is_deaf() {
            info!("Already deafen!")
        } else if let Err(e) = handler.deafen(true).await {
            info!("Deafen failed due to {e:?}")
        }

        Ok(handler.play_only_source(source))
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), RadioError> {
        if self.manager.get(guild_id).is_none() {
            return Ok(());
        }

        self.manager
            .remove(guild_id)
            .await
            .map_err(|why| RadioError::Voice(why.to_string()))
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        match self.manager.get(guild_id) {
            Some(handler_lock) => handler_lock.lock().await.current_channel().is_some(),
            None => false,
        }
    }
}
