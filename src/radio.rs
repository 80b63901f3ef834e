use std::collections::HashSet;
use std::ops::ControlFlow;

use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::TypeMapKey;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::embed::NowPlayingCard;
use crate::error::VolumeError;
use crate::gateway::ChatGateway;
use crate::models::{StationId, TrackMetadata};
use crate::sessions::SessionTracker;
use crate::stations::StationRegistry;
use crate::voice::VoiceTransport;

pub const EVENT_QUEUE_CAPACITY: usize = 64;

const NOTHING_PLAYING: &str = "Nothing is playing right now.";

pub struct RadioEvents;

impl TypeMapKey for RadioEvents {
    type Value = mpsc::Sender<RadioEvent>;
}

#[derive(Debug)]
pub enum RadioEvent {
    Command {
        invocation: Invocation,
        command: RadioCommand,
    },
    SongUpdate {
        station: StationId,
        metadata: TrackMetadata,
    },
    /// The bot itself left voice in a guild.
    VoiceDisconnected { guild_id: GuildId },
}

/// Who issued a command and from where, resolved from the gateway cache.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub is_admin: bool,
    pub voice_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    Play(StationId),
    NowPlaying,
    Stop,
    Shutdown,
    Volume(Option<String>),
}

/// Owns all radio state. Events are applied one at a time, in arrival order.
pub struct Radio<G: ChatGateway, V: VoiceTransport> {
    registry: StationRegistry,
    tracker: SessionTracker<V>,
    gateway: G,
    shutdown_users: HashSet<UserId>,
}

impl<G: ChatGateway, V: VoiceTransport> Radio<G, V> {
    pub fn new(gateway: G, transport: V, shutdown_users: HashSet<UserId>) -> Self {
        Self {
            registry: StationRegistry::new(),
            tracker: SessionTracker::new(transport),
            gateway,
            shutdown_users,
        }
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<RadioEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event).await.is_break() {
                info!("Radio loop stopped by shutdown command");
                return;
            }
        }

        info!("Radio event queue closed");
    }

    pub async fn handle(&mut self, event: RadioEvent) -> ControlFlow<()> {
        match event {
            RadioEvent::Command {
                invocation,
                command,
            } => return self.command(&invocation, command).await,
            RadioEvent::SongUpdate { station, metadata } => {
                self.registry.record_update(station, metadata);
                self.refresh(station).await;
            }
            RadioEvent::VoiceDisconnected { guild_id } => self.voice_disconnected(guild_id).await,
        }

        ControlFlow::Continue(())
    }

    async fn command(&mut self, invocation: &Invocation, command: RadioCommand) -> ControlFlow<()> {
        info!(
            "Command {command:?} from user {} in guild {}",
            invocation.user_id.0, invocation.guild_id.0
        );

        match command {
            RadioCommand::Play(station) => self.play(invocation, station).await,
            RadioCommand::NowPlaying => self.now_playing(invocation).await,
            RadioCommand::Volume(None) => {
                let volume = self.tracker.volume(invocation.guild_id);
                self.say(invocation.channel_id, &format!("Volume is set to {volume}%."))
                    .await;
            }
            RadioCommand::Volume(Some(input)) => self.set_volume(invocation, &input).await,
            RadioCommand::Stop => self.stop(invocation).await,
            RadioCommand::Shutdown => return self.shutdown(invocation).await,
        }

        ControlFlow::Continue(())
    }

    async fn play(&mut self, invocation: &Invocation, station: StationId) {
        let guild_id = invocation.guild_id;

        self.tracker.stop_session(guild_id).await;

        // The invoker gets no feedback when they are not in voice or the join fails.
        let Some(voice_channel) = invocation.voice_channel else {
            warn!(
                "User {} asked for {station} in guild {} without being in a voice channel",
                invocation.user_id.0, guild_id.0
            );
            return;
        };

        if let Err(why) = self
            .tracker
            .start_session(guild_id, voice_channel, station, self.registry.stream_url(station))
            .await
        {
            warn!("Could not start {station} in guild {}: {why}", guild_id.0);
            return;
        }

        let card = match self.registry.latest(station) {
            Some(metadata) => NowPlayingCard::from_metadata(metadata),
            None => NowPlayingCard::pending(station),
        };

        match self.gateway.send_card(invocation.channel_id, &card).await {
            Ok(message_id) => {
                self.tracker
                    .record_sent_message(guild_id, invocation.channel_id, message_id, station)
            }
            Err(why) => warn!("Error sending now playing card: {why:?}"),
        }
    }

    async fn now_playing(&mut self, invocation: &Invocation) {
        let Some(station) = self
            .tracker
            .session(invocation.guild_id)
            .map(|session| session.station)
        else {
            self.say(invocation.channel_id, NOTHING_PLAYING).await;
            return;
        };

        let Some(metadata) = self.registry.latest(station) else {
            let reply = format!("No track information has arrived for {station} yet.");
            self.say(invocation.channel_id, &reply).await;
            return;
        };

        let card = NowPlayingCard::from_metadata(metadata);

        if let Err(why) = self.gateway.send_card(invocation.channel_id, &card).await {
            warn!("Error sending now playing card: {why:?}");
        }
    }

    async fn set_volume(&mut self, invocation: &Invocation, input: &str) {
        if !invocation.is_admin {
            debug!("Ignoring volume change from non-admin {}", invocation.user_id.0);
            return;
        }

        let result = VolumeError::parse(input)
            .and_then(|percent| self.tracker.set_volume(invocation.guild_id, i64::from(percent)));

        let reply = match result {
            Ok(percent) => format!("Volume set to {percent}%."),
            Err(rejected) => rejected.to_string(),
        };

        self.say(invocation.channel_id, &reply).await;
    }

    async fn stop(&mut self, invocation: &Invocation) {
        if !invocation.is_admin {
            debug!("Ignoring stop from non-admin {}", invocation.user_id.0);
            return;
        }

        let stopped = self.tracker.stop_session(invocation.guild_id).await;
        self.tracker.forget_message(invocation.guild_id);

        let reply = if stopped {
            "Left the voice channel."
        } else {
            NOTHING_PLAYING
        };

        self.say(invocation.channel_id, reply).await;
    }

    async fn shutdown(&mut self, invocation: &Invocation) -> ControlFlow<()> {
        if !self.shutdown_users.contains(&invocation.user_id) {
            debug!("Ignoring shutdown from {}", invocation.user_id.0);
            return ControlFlow::Continue(());
        }

        self.say(invocation.channel_id, "Shutting down...").await;

        for guild_id in self.tracker.active_guilds() {
            self.tracker.stop_session(guild_id).await;
        }

        ControlFlow::Break(())
    }

    async fn refresh(&self, station: StationId) {
        let Some(metadata) = self.registry.latest(station) else {
            return;
        };

        let card = NowPlayingCard::from_metadata(metadata);

        for (guild_id, message) in self.tracker.messages_tuned_to(station) {
            if let Err(why) = self
                .gateway
                .edit_card(message.channel_id, message.message_id, &card)
                .await
            {
                debug!(
                    "Skipping now playing message {} in guild {}: {why}",
                    message.message_id.0, guild_id.0
                );
            }
        }
    }

    async fn voice_disconnected(&mut self, guild_id: GuildId) {
        // Our own teardown while switching stations reports a disconnect too.
        if self.tracker.is_connected(guild_id).await {
            return;
        }

        if self.tracker.forget_session(guild_id) {
            info!("Dropped session in guild {} after voice disconnect", guild_id.0);
        }
    }

    async fn say(&self, channel_id: ChannelId, text: &str) {
        if let Err(why) = self.gateway.say(channel_id, text).await {
            warn!("Error sending message: {why:?}");
        }
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &SessionTracker<V> {
        &self.tracker
    }
}
