use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandError, CommandResult};
use serenity::model::channel::Message;
use serenity::model::guild::Guild;
use serenity::Result as SerenityResult;
use tracing::{debug, info};

use crate::config::{SettingsKey, DEFAULT_PREFIX};
use crate::models::StationId;
use crate::radio::{Invocation, RadioCommand, RadioEvent, RadioEvents};

#[group]
#[commands(jpop, kpop, nowplaying, volume, stop, shutdown, help)]
struct General;

#[command]
#[only_in(guilds)]
async fn jpop(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    dispatch_bare(ctx, msg, &args, RadioCommand::Play(StationId::Jp)).await
}

#[command]
#[only_in(guilds)]
async fn kpop(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    dispatch_bare(ctx, msg, &args, RadioCommand::Play(StationId::Kr)).await
}

#[command]
#[aliases("np", "now-playing")]
#[only_in(guilds)]
async fn nowplaying(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    dispatch_bare(ctx, msg, &args, RadioCommand::NowPlaying).await
}

#[command]
#[only_in(guilds)]
async fn volume(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let input = if args.is_empty() {
        None
    } else {
        Some(args.rest().to_string())
    };

    dispatch(ctx, msg, RadioCommand::Volume(input)).await
}

#[command]
#[only_in(guilds)]
async fn stop(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    dispatch_bare(ctx, msg, &args, RadioCommand::Stop).await
}

#[command]
#[only_in(guilds)]
async fn shutdown(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    dispatch_bare(ctx, msg, &args, RadioCommand::Shutdown).await
}

#[command]
#[only_in(guilds)]
async fn help(ctx: &Context, msg: &Message) -> CommandResult {
    let prefix = {
        let data = ctx.data.read().await;
        data.get::<SettingsKey>()
            .map(|settings| settings.command_prefix.clone())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string())
    };

    check_msg(msg.channel_id.say(&ctx.http, help_text(&prefix)).await);

    Ok(())
}

fn help_text(prefix: &str) -> String {
    format!(
        r#"
**Commands:**
    **{prefix}jpop** - Joins your voice channel and plays LISTEN.moe JP.
    **{prefix}kpop** - Joins your voice channel and plays LISTEN.moe KR.
    **{prefix}np** - Shows the track currently playing on this server's station.
    **{prefix}volume [1-150]** - Shows the volume, or sets it (admins only).
    **{prefix}stop** - Leaves the voice channel (admins only).
    "#
    )
}

pub async fn send_event(ctx: &Context, event: RadioEvent) -> CommandResult {
    let events = {
        let data = ctx.data.read().await;
        data.get::<RadioEvents>()
            .cloned()
            .ok_or(CommandError::from("Radio event queue not found"))?
    };

    events
        .send(event)
        .await
        .map_err(|_| CommandError::from("Radio loop has stopped"))
}

/// Commands without arguments only match the bare command word.
async fn dispatch_bare(
    ctx: &Context,
    msg: &Message,
    args: &Args,
    command: RadioCommand,
) -> CommandResult {
    if !is_bare(args) {
        debug!("Ignoring {command:?} with trailing text {:?}", args.rest());
        return Ok(());
    }

    dispatch(ctx, msg, command).await
}

fn is_bare(args: &Args) -> bool {
    args.rest().trim().is_empty()
}

async fn dispatch(ctx: &Context, msg: &Message, command: RadioCommand) -> CommandResult {
    let invocation = resolve_invocation(ctx, msg).await?;

    send_event(ctx, RadioEvent::Command { invocation, command }).await
}

async fn resolve_invocation(ctx: &Context, msg: &Message) -> CommandResult<Invocation> {
    let guild = get_guild(ctx, msg)?;

    let voice_channel = guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|voice_state| voice_state.channel_id);

    let is_admin = match msg.member(ctx).await {
        Ok(member) => guild
            .member_permissions(ctx, member.user.id)
            .await
            .map_or(false, |permissions| permissions.administrator()),
        Err(why) => {
            info!("Could not resolve member {}: {why:?}", msg.author.id.0);
            false
        }
    };

    Ok(Invocation {
        guild_id: guild.id,
        channel_id: msg.channel_id,
        user_id: msg.author.id,
        is_admin,
        voice_channel,
    })
}

/// Checks that a message successfully sent; if not, then logs why.
fn check_msg(result: SerenityResult<Message>) {
    if let Err(why) = result {
        info!("Error sending message: {why:?}");
    }
}

fn get_guild(ctx: &Context, msg: &Message) -> CommandResult<Guild> {
    msg.guild(&ctx.cache).ok_or(CommandError::from("Guild not found"))
}
