use serenity::builder::CreateEmbed;

use crate::models::{StationId, TrackMetadata};

pub const ACCENT_COLOUR: u32 = 0xFFDADA;
pub const TITLE: &str = "⭐ Now Playing...";

/// Cover the feed reports when a track has no album art.
pub const PLACEHOLDER_COVER: &str = "https://listen.moe/public/images/icons/apple-touch-icon.png";
const FALLBACK_COVER: &str = "https://listen.moe/_nuxt/img/cd1c044.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlayingCard {
    pub description: String,
    pub footer: Option<String>,
    pub thumbnail: Option<String>,
}

impl NowPlayingCard {
    pub fn from_metadata(data: &TrackMetadata) -> Self {
        let thumbnail = if data.song_cover == PLACEHOLDER_COVER {
            FALLBACK_COVER.to_string()
        } else {
            data.song_cover.clone()
        };

        Self {
            description: format!(
                "{} - {}",
                escape_markdown(&data.song_name),
                escape_markdown(&data.song_artist)
            ),
            footer: Some(format!(
                "🔖 {} | 🎧 {} Listeners",
                escape_markdown(&data.song_album),
                data.listeners
            )),
            thumbnail: Some(thumbnail),
        }
    }

    /// Shown when a station is tuned before its feed has sent anything.
    pub fn pending(station: StationId) -> Self {
        Self {
            description: format!("Waiting for track information on {station}..."),
            footer: None,
            thumbnail: None,
        }
    }

    pub fn apply<'a>(&self, embed: &'a mut CreateEmbed) -> &'a mut CreateEmbed {
        embed
            .colour(ACCENT_COLOUR)
            .title(TITLE)
            .description(&self.description);

        if let Some(footer) = &self.footer {
            embed.footer(|f| f.text(footer));
        }

        if let Some(thumbnail) = &self.thumbnail {
            embed.thumbnail(thumbnail);
        }

        embed
    }
}

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}
