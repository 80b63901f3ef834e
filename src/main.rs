use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::StandardFramework,
    model::{
        gateway::{Activity, Ready},
        prelude::{OnlineStatus, VoiceState},
    },
    prelude::GatewayIntents,
};
use songbird::{SerenityInit, Songbird};
use tokio::sync::mpsc;
use tracing::{error, info, info_span};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

use crate::commands::{send_event, GENERAL_GROUP};
use crate::config::{Settings, SettingsKey};
use crate::feed::MetadataFeed;
use crate::gateway::DiscordGateway;
use crate::models::StationId;
use crate::radio::{Radio, RadioEvent, RadioEvents, EVENT_QUEUE_CAPACITY};
use crate::voice::SongbirdTransport;

mod commands;
mod config;
mod embed;
mod error;
mod feed;
mod gateway;
mod models;
mod radio;
mod sessions;
mod stations;
#[cfg(test)]
mod testing;
mod voice;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        ctx.set_presence(Some(Activity::listening("LISTEN.moe")), OnlineStatus::Idle)
            .await;
    }

    async fn voice_state_update(&self, ctx: Context, _: Option<VoiceState>, new: VoiceState) {
        if new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            if ctx.cache.current_user_id() == new.user_id {
                info!("Bot left voice in guild {}", guild_id.0);

                if let Err(why) = send_event(&ctx, RadioEvent::VoiceDisconnected { guild_id }).await {
                    error!("Could not report voice disconnect: {why:?}");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Arc::new(Settings::from_env()?);

    let framework = StandardFramework::new()
        .configure(|c| c.prefix(&settings.command_prefix))
        .group(&GENERAL_GROUP);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let songbird = Songbird::serenity();
    let (events, queue) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    let mut client = Client::builder(&settings.token, intents)
        .event_handler(Handler)
        .framework(framework)
        .register_songbird_with(songbird.clone())
        .type_map_insert::<RadioEvents>(events.clone())
        .type_map_insert::<SettingsKey>(settings.clone())
        .await?;

    let radio = Radio::new(
        DiscordGateway::new(client.cache_and_http.http.clone()),
        SongbirdTransport::new(songbird),
        settings.shutdown_users.clone(),
    );

    for station in StationId::ALL {
        let feed = MetadataFeed::new(station, settings.feed, events.clone());
        tokio::spawn(feed.run().instrument(info_span!("feed", station = %station)));
    }

    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        let _ = client.start().await.map_err(|why| error!("Client ended: {why:?}"));
    });

    tokio::select! {
        _ = radio.run(queue) => info!("Radio stopped, shutting down."),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl-C, shutting down.");
        }
    }

    shard_manager.lock().await.shutdown_all().await;

    Ok(())
}
