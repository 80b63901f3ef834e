use std::collections::HashMap;

use serenity::model::id::{ChannelId, GuildId, MessageId};
use tracing::{info, warn};

use crate::error::{RadioError, VolumeError};
use crate::models::{NowPlayingMessage, PlaybackSession, StationId};
use crate::voice::{volume_ratio, Dispatcher, VoiceTransport};

pub const DEFAULT_VOLUME: u8 = 10;

/// Per-guild playback state: the live session, the now-playing card to keep
/// edited, and the remembered volume.
pub struct SessionTracker<V: VoiceTransport> {
    transport: V,
    sessions: HashMap<GuildId, PlaybackSession<V::Dispatcher>>,
    now_playing: HashMap<GuildId, NowPlayingMessage>,
    volumes: HashMap<GuildId, u8>,
}

impl<V: VoiceTransport> SessionTracker<V> {
    pub fn new(transport: V) -> Self {
        Self {
            transport,
            sessions: HashMap::new(),
            now_playing: HashMap::new(),
            volumes: HashMap::new(),
        }
    }

    pub async fn start_session(
        &mut self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        station: StationId,
        stream_url: &str,
    ) -> Result<(), RadioError> {
        self.stop_session(guild_id).await;

        let dispatcher = match self.transport.connect(guild_id, voice_channel, stream_url).await {
            Ok(dispatcher) => dispatcher,
            Err(why) => {
                // A half-made connection has no session to tear it down later.
                if self.transport.is_connected(guild_id).await {
                    if let Err(leave) = self.transport.disconnect(guild_id).await {
                        warn!("Leaving voice in guild {} failed: {leave}", guild_id.0);
                    }
                }

                return Err(why);
            }
        };

        let volume = self.volume(guild_id);
        self.volumes.insert(guild_id, volume);

        if let Err(why) = dispatcher.set_volume(volume_ratio(volume)) {
            warn!("Could not apply volume {volume}% in guild {}: {why}", guild_id.0);
        }

        info!("Guild {} tuned to {station} in channel {}", guild_id.0, voice_channel.0);

        self.sessions.insert(
            guild_id,
            PlaybackSession {
                station,
                voice_channel,
                dispatcher,
            },
        );

        Ok(())
    }

    /// Tears down the guild's session. Returns whether one existed.
    pub async fn stop_session(&mut self, guild_id: GuildId) -> bool {
        let Some(session) = self.sessions.remove(&guild_id) else {
            return false;
        };

        if let Err(why) = self.transport.disconnect(guild_id).await {
            warn!("Leaving voice in guild {} failed: {why}", guild_id.0);
        }

        if let Err(why) = session.dispatcher.stop() {
            info!("Stopping {} stream in guild {} failed: {why}", session.station, guild_id.0);
        }

        info!("Left channel {} in guild {}", session.voice_channel.0, guild_id.0);

        true
    }

    /// Drops a session whose voice connection is already gone.
    pub fn forget_session(&mut self, guild_id: GuildId) -> bool {
        match self.sessions.remove(&guild_id) {
            Some(session) => {
                session.dispatcher.stop().ok();
                true
            }
            None => false,
        }
    }

    /// Stores the guild's volume. The stored value also applies to the next
    /// session, so a stream that cannot take it right now is only logged.
    pub fn set_volume(&mut self, guild_id: GuildId, percent: i64) -> Result<u8, VolumeError> {
        let percent = VolumeError::check(percent)?;

        self.volumes.insert(guild_id, percent);

        if let Some(session) = self.sessions.get(&guild_id) {
            if let Err(why) = session.dispatcher.set_volume(volume_ratio(percent)) {
                warn!("Could not apply volume {percent}% in guild {}: {why}", guild_id.0);
            }
        }

        Ok(percent)
    }

    pub fn volume(&self, guild_id: GuildId) -> u8 {
        self.volumes.get(&guild_id).copied().unwrap_or(DEFAULT_VOLUME)
    }

    pub fn session(&self, guild_id: GuildId) -> Option<&PlaybackSession<V::Dispatcher>> {
        self.sessions.get(&guild_id)
    }

    pub async fn is_connected(&self, guild_id: GuildId) -> bool {
        self.transport.is_connected(guild_id).await
    }

    pub fn active_guilds(&self) -> Vec<GuildId> {
        self.sessions.keys().copied().collect()
    }

    pub fn record_sent_message(
        &mut self,
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
        station: StationId,
    ) {
        self.now_playing.insert(
            guild_id,
            NowPlayingMessage {
                channel_id,
                message_id,
                station,
            },
        );
    }

    pub fn forget_message(&mut self, guild_id: GuildId) -> Option<NowPlayingMessage> {
        self.now_playing.remove(&guild_id)
    }

    pub fn now_playing(&self, guild_id: GuildId) -> Option<&NowPlayingMessage> {
        self.now_playing.get(&guild_id)
    }

    /// Now-playing cards that show `station` and must be edited on its updates.
    pub fn messages_tuned_to(&self, station: StationId) -> Vec<(GuildId, NowPlayingMessage)> {
        self.now_playing
            .iter()
            .filter(|(_, message)| message.station == station)
            .map(|(guild_id, message)| (*guild_id, *message))
            .collect()
    }

    #[cfg(test)]
    pub fn transport(&self) -> &V {
        &self.transport
    }
}
