use std::fmt;

use serenity::model::id::{ChannelId, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationId {
    Jp,
    Kr,
}

impl StationId {
    pub const ALL: [StationId; 2] = [StationId::Jp, StationId::Kr];

    pub fn stream_url(self) -> &'static str {
        match self {
            StationId::Jp => "https://listen.moe/stream",
            StationId::Kr => "https://listen.moe/kpop/stream",
        }
    }

    pub fn gateway_url(self) -> &'static str {
        match self {
            StationId::Jp => "wss://listen.moe/gateway_v2",
            StationId::Kr => "wss://listen.moe/kpop/gateway_v2",
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationId::Jp => f.write_str("JP"),
            StationId::Kr => f.write_str("KR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub song_name: String,
    pub song_artist: String,
    pub song_album: String,
    pub song_cover: String,
    pub listeners: u64,
}

pub struct PlaybackSession<D> {
    pub station: StationId,
    pub voice_channel: ChannelId,
    pub dispatcher: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowPlayingMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub station: StationId,
}
