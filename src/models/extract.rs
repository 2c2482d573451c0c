//! Extracts.

use super::{ExtractId, ThemeId};
use serde::{Deserialize, Serialize};

/// Time interval of an extract inside its episode.
///
/// Both bounds are opaque strings; the engine never parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Start of the interval.
    pub start: String,
    /// End of the interval.
    pub end: String,
}

impl Timing {
    /// Creates a timing interval.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// A live extract.
#[derive(Debug, Clone, PartialEq)]
pub struct Extract {
    /// Unique identifier.
    pub id: ExtractId,
    /// Extract text.
    pub text: String,
    /// Anime reference ID (pass-through).
    pub anime_id: i64,
    /// Anime title (pass-through).
    pub anime_title: String,
    /// Anime cover image URL (pass-through).
    pub anime_image: Option<String>,
    /// Interval inside the episode.
    pub timing: Timing,
    /// Episode number.
    pub episode: Option<u32>,
    /// Season number.
    pub season: Option<u32>,
    /// Character records (pass-through).
    pub characters: Vec<serde_json::Value>,
    /// Theme this extract belongs to, if any.
    pub theme_id: Option<ThemeId>,
    /// Whether a video uses this extract. Owned by the video builder.
    pub is_used_in_video: bool,
}

/// Request to create an extract with a caller-assigned ID.
///
/// Carries no `is_used_in_video` flag: created extracts always start unused.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExtract {
    /// ID the new extract will receive.
    pub id: ExtractId,
    /// Extract text.
    pub text: String,
    /// Anime reference ID.
    pub anime_id: i64,
    /// Anime title.
    pub anime_title: String,
    /// Anime cover image URL.
    pub anime_image: Option<String>,
    /// Interval inside the episode.
    pub timing: Timing,
    /// Episode number.
    pub episode: Option<u32>,
    /// Season number.
    pub season: Option<u32>,
    /// Character records.
    pub characters: Vec<serde_json::Value>,
    /// Theme reference. Must point at a live theme.
    pub theme_id: Option<ThemeId>,
}

impl NewExtract {
    /// Creates a request with a freshly generated ID and no theme.
    #[must_use]
    pub fn new(text: impl Into<String>, anime_id: i64, anime_title: impl Into<String>) -> Self {
        Self {
            id: ExtractId::generate(),
            text: text.into(),
            anime_id,
            anime_title: anime_title.into(),
            anime_image: None,
            timing: Timing::new("00:00:00", "00:00:00"),
            episode: None,
            season: None,
            characters: Vec::new(),
            theme_id: None,
        }
    }

    /// Sets the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ExtractId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the theme reference.
    #[must_use]
    pub fn with_theme(mut self, theme_id: impl Into<ThemeId>) -> Self {
        self.theme_id = Some(theme_id.into());
        self
    }

    /// Sets the timing interval.
    #[must_use]
    pub fn with_timing(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.timing = Timing::new(start, end);
        self
    }

    /// Sets the episode number.
    #[must_use]
    pub const fn with_episode(mut self, episode: u32) -> Self {
        self.episode = Some(episode);
        self
    }

    /// Adds a character record.
    #[must_use]
    pub fn with_character(mut self, character: serde_json::Value) -> Self {
        self.characters.push(character);
        self
    }

    /// Converts the request into the live entity it describes.
    #[must_use]
    pub fn into_extract(self) -> Extract {
        Extract {
            id: self.id,
            text: self.text,
            anime_id: self.anime_id,
            anime_title: self.anime_title,
            anime_image: self.anime_image,
            timing: self.timing,
            episode: self.episode,
            season: self.season,
            characters: self.characters,
            theme_id: self.theme_id,
            is_used_in_video: false,
        }
    }
}
