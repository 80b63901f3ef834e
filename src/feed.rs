use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant, Interval};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, trace, warn};

use crate::embed::PLACEHOLDER_COVER;
use crate::error::RadioError;
use crate::models::{StationId, TrackMetadata};
use crate::radio::RadioEvent;

const HEARTBEAT: &str = r#"{"op":9}"#;
const COVER_BASE: &str = "https://cdn.listen.moe/covers/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Reconnect attempts allowed after a connection is lost.
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum FeedFrame {
    Welcome { heartbeat: Duration },
    Track(TrackMetadata),
    HeartbeatAck,
    Other { op: u8, kind: Option<String> },
}

#[derive(Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: serde_json::Value,
}

#[derive(Deserialize)]
struct Welcome {
    heartbeat: u64,
}

#[derive(Deserialize)]
struct TrackUpdate {
    song: Song,
    #[serde(default)]
    listeners: u64,
}

#[derive(Deserialize)]
struct Song {
    title: Option<String>,
    #[serde(default)]
    artists: Vec<Credit>,
    #[serde(default)]
    albums: Vec<Album>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credit {
    name: Option<String>,
    name_romaji: Option<String>,
}

#[derive(Deserialize)]
struct Album {
    name: Option<String>,
    image: Option<String>,
}

impl From<TrackUpdate> for TrackMetadata {
    fn from(update: TrackUpdate) -> Self {
        let song = update.song;

        let artists: Vec<String> = song
            .artists
            .into_iter()
            .filter_map(|artist| artist.name.or(artist.name_romaji))
            .collect();

        let album = song.albums.into_iter().next();
        let song_cover = album
            .as_ref()
            .and_then(|album| album.image.as_deref())
            .map(|image| format!("{COVER_BASE}{image}"))
            .unwrap_or_else(|| PLACEHOLDER_COVER.to_string());

        TrackMetadata {
            song_name: song.title.unwrap_or_else(|| "Unknown Title".to_string()),
            song_artist: if artists.is_empty() {
                "Unknown Artist".to_string()
            } else {
                artists.join(", ")
            },
            song_album: album
                .and_then(|album| album.name)
                .unwrap_or_else(|| "None".to_string()),
            song_cover,
            listeners: update.listeners,
        }
    }
}

pub fn parse_frame(text: &str) -> Result<FeedFrame, RadioError> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|why| RadioError::Feed(why.to_string()))?;

    match (frame.op, frame.t.as_deref()) {
        (0, _) => {
            let welcome: Welcome =
                serde_json::from_value(frame.d).map_err(|why| RadioError::Feed(why.to_string()))?;

            Ok(FeedFrame::Welcome {
                heartbeat: Duration::from_millis(welcome.heartbeat),
            })
        }
        (1, Some("TRACK_UPDATE" | "TRACK_UPDATE_REQUEST")) => {
            let update: TrackUpdate =
                serde_json::from_value(frame.d).map_err(|why| RadioError::Feed(why.to_string()))?;

            Ok(FeedFrame::Track(update.into()))
        }
        (10, _) => Ok(FeedFrame::HeartbeatAck),
        (op, kind) => Ok(FeedFrame::Other {
            op,
            kind: kind.map(str::to_string),
        }),
    }
}

/// Websocket client for one station's LISTEN.moe gateway.
pub struct MetadataFeed {
    station: StationId,
    url: String,
    options: FeedOptions,
    events: mpsc::Sender<RadioEvent>,
}

impl MetadataFeed {
    pub fn new(station: StationId, options: FeedOptions, events: mpsc::Sender<RadioEvent>) -> Self {
        Self::with_url(station, station.gateway_url(), options, events)
    }

    /// Same as `new`, but talks to a gateway at `url` instead of LISTEN.moe's.
    pub fn with_url(
        station: StationId,
        url: impl Into<String>,
        options: FeedOptions,
        events: mpsc::Sender<RadioEvent>,
    ) -> Self {
        Self {
            station,
            url: url.into(),
            options,
            events,
        }
    }

    /// Keeps the feed connected until reconnect attempts run out or the radio
    /// loop goes away.
    pub async fn run(self) {
        let mut attempts_left = self.options.attempts;

        loop {
            let mut welcomed = false;

            match self.connection(&mut welcomed).await {
                Ok(()) => debug!("[Listen.moe] Websocket {} closed", self.station),
                Err(why) => error!("[Listen.moe] Websocket {} error: {why}", self.station),
            }

            if self.events.is_closed() {
                info!("[Listen.moe] Radio loop is gone, closing {} feed", self.station);
                return;
            }

            if welcomed {
                attempts_left = self.options.attempts;
            }

            if attempts_left == 0 {
                error!(
                    "[Listen.moe] Giving up on {} after {} reconnect attempts",
                    self.station, self.options.attempts
                );
                return;
            }

            attempts_left -= 1;
            debug!(
                "[Listen.moe] Reconnecting {} in {:?} ({attempts_left} attempts left)",
                self.station, self.options.interval
            );
            sleep(self.options.interval).await;
        }
    }

    async fn connection(&self, welcomed: &mut bool) -> Result<(), RadioError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|why| RadioError::Feed(why.to_string()))?;

        info!("[Listen.moe] Websocket {} is now open.", self.station);

        let mut heartbeat: Option<Interval> = None;

        loop {
            tokio::select! {
                frame = ws.next() => {
                    let Some(frame) = frame else {
                        return Ok(());
                    };

                    match frame.map_err(|why| RadioError::Feed(why.to_string()))? {
                        Message::Text(text) => match parse_frame(&text) {
                            Ok(FeedFrame::Welcome { heartbeat: every }) => {
                                let every = every.max(Duration::from_secs(1));
                                *welcomed = true;
                                heartbeat = Some(interval_at(Instant::now() + every, every));
                                info!("[Listen.moe] Websocket {} is now ready", self.station);
                            }
                            Ok(FeedFrame::Track(metadata)) => {
                                debug!("[Listen.moe] Websocket {} data updated, {metadata:?}", self.station);

                                let update = RadioEvent::SongUpdate {
                                    station: self.station,
                                    metadata,
                                };

                                if self.events.send(update).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Ok(FeedFrame::HeartbeatAck) => trace!("[Listen.moe] Heartbeat acknowledged"),
                            Ok(FeedFrame::Other { op, kind }) => {
                                debug!("[Listen.moe] Ignoring op {op} ({kind:?}) on {}", self.station)
                            }
                            Err(why) => warn!("[Listen.moe] Unreadable frame on {}: {why}", self.station),
                        },
                        Message::Close(reason) => {
                            debug!("[Listen.moe] Websocket {}, Close Data: {reason:?}", self.station);
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                _ = next_beat(&mut heartbeat) => {
                    ws.send(Message::Text(HEARTBEAT.to_string()))
                        .await
                        .map_err(|why| RadioError::Feed(why.to_string()))?;
                }
            }
        }
    }
}

async fn next_beat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    use super::*;

    const WELCOME: &str = r#"{"op":0,"d":{"message":"Welcome to LISTEN.moe! Enjoy your stay!","heartbeat":1000}}"#;

    fn quick_retries(attempts: u32) -> FeedOptions {
        FeedOptions {
            attempts,
            interval: Duration::from_millis(10),
        }
    }

    /// Accepts websocket clients forever. The first `welcomes` of them get a
    /// welcome frame; every connection is then closed by the server.
    async fn flaky_gateway(welcomes: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };

                if seen < welcomes {
                    ws.send(Message::Text(WELCOME.to_string())).await.ok();
                }
                ws.close(None).await.ok();
            }
        });

        (url, connections)
    }

    #[tokio::test]
    async fn gives_up_after_reconnect_attempts() {
        let (url, connections) = flaky_gateway(0).await;
        let (events, _queue) = mpsc::channel(8);

        let feed = MetadataFeed::with_url(StationId::Jp, url, quick_retries(2), events);
        timeout(Duration::from_secs(10), feed.run()).await.unwrap();

        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn welcome_resets_reconnect_attempts() {
        let (url, connections) = flaky_gateway(2).await;
        let (events, _queue) = mpsc::channel(8);

        let feed = MetadataFeed::with_url(StationId::Kr, url, quick_retries(1), events);
        timeout(Duration::from_secs(10), feed.run()).await.unwrap();

        // Two welcomed connections each earn a fresh attempt; the third is the last.
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_radio_loop_is_gone() {
        let (url, connections) = flaky_gateway(0).await;
        let (events, queue) = mpsc::channel(8);
        drop(queue);

        let feed = MetadataFeed::with_url(StationId::Jp, url, quick_retries(3), events);
        timeout(Duration::from_secs(10), feed.run()).await.unwrap();

        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forwards_tracks_and_sends_heartbeats() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (events, mut queue) = mpsc::channel(8);

        let feed = MetadataFeed::with_url(StationId::Jp, url, quick_retries(0), events);
        let client = tokio::spawn(feed.run());

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(WELCOME.to_string())).await.unwrap();
        ws.send(Message::Text(
            r#"{"op":1,"t":"TRACK_UPDATE","d":{"song":{"title":"Hare Hare Yukai","artists":[{"name":"Aya Hirano"}],"albums":[]},"listeners":51}}"#
                .to_string(),
        ))
        .await
        .unwrap();

        let update = timeout(Duration::from_secs(5), queue.recv()).await.unwrap();
        let Some(RadioEvent::SongUpdate { station, metadata }) = update else {
            panic!("expected a song update");
        };
        assert_eq!(station, StationId::Jp);
        assert_eq!(metadata.song_name, "Hare Hare Yukai");
        assert_eq!(metadata.listeners, 51);

        let beat = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
        assert_eq!(beat.unwrap().unwrap(), Message::Text(HEARTBEAT.to_string()));

        client.abort();
    }

    #[test]
    fn welcome_carries_heartbeat() {
        let frame = parse_frame(r#"{"op":0,"d":{"message":"Welcome to LISTEN.moe! Enjoy your stay!","heartbeat":35000}}"#)
            .unwrap();

        assert_eq!(
            frame,
            FeedFrame::Welcome {
                heartbeat: Duration::from_millis(35000)
            }
        );
    }

    #[test]
    fn track_update_becomes_metadata() {
        let frame = parse_frame(
            r#"{
                "op": 1,
                "t": "TRACK_UPDATE",
                "d": {
                    "song": {
                        "id": 4188,
                        "title": "Sugar Song to Bitter Step",
                        "artists": [
                            { "id": 1, "name": "UNISON SQUARE GARDEN", "nameRomaji": null },
                            { "id": 2, "name": null, "nameRomaji": "Tabuchi Tomoya" }
                        ],
                        "albums": [
                            { "id": 9, "name": "Catcher in the Spy", "image": "catcher.jpg" }
                        ],
                        "duration": 243
                    },
                    "startTime": "2024-01-01T00:00:00.000Z",
                    "listeners": 387
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            frame,
            FeedFrame::Track(TrackMetadata {
                song_name: "Sugar Song to Bitter Step".to_string(),
                song_artist: "UNISON SQUARE GARDEN, Tabuchi Tomoya".to_string(),
                song_album: "Catcher in the Spy".to_string(),
                song_cover: "https://cdn.listen.moe/covers/catcher.jpg".to_string(),
                listeners: 387,
            })
        );
    }

    #[test]
    fn track_without_album_gets_placeholder_cover() {
        let frame = parse_frame(
            r#"{"op":1,"t":"TRACK_UPDATE_REQUEST","d":{"song":{"title":"Untitled","artists":[],"albums":[]},"listeners":2}}"#,
        )
        .unwrap();

        let FeedFrame::Track(metadata) = frame else {
            panic!("expected a track frame");
        };
        assert_eq!(metadata.song_artist, "Unknown Artist");
        assert_eq!(metadata.song_album, "None");
        assert_eq!(metadata.song_cover, PLACEHOLDER_COVER);
    }

    #[test]
    fn heartbeat_ack_and_unknown_frames() {
        assert_eq!(parse_frame(r#"{"op":10}"#).unwrap(), FeedFrame::HeartbeatAck);
        assert_eq!(
            parse_frame(r#"{"op":1,"t":"QUEUE_UPDATE","d":{"amount":3}}"#).unwrap(),
            FeedFrame::Other {
                op: 1,
                kind: Some("QUEUE_UPDATE".to_string())
            }
        );
    }

    #[test]
    fn garbage_is_a_feed_error() {
        assert!(matches!(parse_frame("not json"), Err(RadioError::Feed(_))));
        assert!(matches!(
            parse_frame(r#"{"op":0,"d":{}}"#),
            Err(RadioError::Feed(_))
        ));
    }
}
