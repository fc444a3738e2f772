//! Media kinds and the kind-token alias table used by prompt filters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category of generated output. Governs the workflow, the argument names
/// handed to the engine, and which file extensions count as output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Audio];

    /// Token used for directory names, `artifact_type`, and filter requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    /// Lower-case file extensions the engine may produce for this kind.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["png", "jpg", "jpeg", "webp"],
            MediaKind::Audio => &["mp3", "wav", "flac"],
        }
    }

    /// Returns true if `extension` (without the dot) belongs to this kind.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let lower = extension.to_ascii_lowercase();
        self.extensions().iter().any(|e| *e == lower)
    }

    /// Maps a stored `prompt_type` value to the kind it produces.
    ///
    /// Accepts the current tokens (`image_prompt`, `lyrics_prompt`) and the
    /// legacy bare tokens (`image`, `audio`).
    pub fn from_prompt_type(prompt_type: &str) -> Option<Self> {
        match prompt_type {
            "image" | "image_prompt" => Some(MediaKind::Image),
            "audio" | "lyrics_prompt" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "audio" | "song" => Ok(MediaKind::Audio),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

/// Built-in filter tokens and the stored `prompt_type` values they match.
const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    ("image", &["image", "image_prompt"]),
    ("audio", &["audio", "lyrics_prompt"]),
];

/// Mapping from a requested filter token to the set of stored values that
/// satisfy it. Tokens without an entry match themselves only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindAliases {
    table: BTreeMap<String, Vec<String>>,
}

impl KindAliases {
    /// Alias table with no entries: every token is an exact match.
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Adds (or extends) an entry. The token itself is always part of its
    /// own match set.
    pub fn with_alias<I, S>(mut self, token: &str, stored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(token, stored);
        self
    }

    pub fn insert<I, S>(&mut self, token: &str, stored: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .table
            .entry(token.to_string())
            .or_insert_with(|| vec![token.to_string()]);
        for value in stored {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
    }

    /// Extends the table from configuration entries.
    pub fn extend_from(&mut self, extra: &BTreeMap<String, Vec<String>>) {
        for (token, values) in extra {
            self.insert(token, values.iter().cloned());
        }
    }

    /// Media kind a stored `prompt_type` produces: the built-in tokens, or
    /// any value listed under the `image`/`audio` filter tokens.
    pub fn kind_of(&self, prompt_type: &str) -> Option<MediaKind> {
        MediaKind::from_prompt_type(prompt_type).or_else(|| {
            MediaKind::ALL.into_iter().find(|kind| {
                self.table
                    .get(kind.as_str())
                    .is_some_and(|values| values.iter().any(|v| v == prompt_type))
            })
        })
    }

    /// Stored values matched by `token`, in a stable order.
    pub fn stored_values(&self, token: &str) -> Vec<String> {
        match self.table.get(token) {
            Some(values) => values.clone(),
            None => vec![token.to_string()],
        }
    }
}

impl Default for KindAliases {
    fn default() -> Self {
        let mut aliases = Self::empty();
        for (token, stored) in BUILTIN_ALIASES {
            aliases.insert(token, stored.iter().copied());
        }
        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_token_matches_legacy_and_current() {
        let aliases = KindAliases::default();
        let values = aliases.stored_values("image");
        assert!(values.contains(&"image".to_string()));
        assert!(values.contains(&"image_prompt".to_string()));
    }

    #[test]
    fn test_unknown_token_is_exact_match() {
        let aliases = KindAliases::default();
        assert_eq!(aliases.stored_values("video"), vec!["video".to_string()]);
        assert_eq!(
            aliases.stored_values("image_prompt"),
            vec!["image_prompt".to_string()]
        );
    }

    #[test]
    fn test_new_alias_pair_without_touching_builtins() {
        let aliases = KindAliases::default().with_alias("picture", ["picture_prompt"]);
        assert_eq!(
            aliases.stored_values("picture"),
            vec!["picture".to_string(), "picture_prompt".to_string()]
        );
        assert_eq!(aliases.stored_values("image").len(), 2);
    }

    #[test]
    fn test_extend_from_config_deduplicates() {
        let mut aliases = KindAliases::default();
        let mut extra = BTreeMap::new();
        extra.insert(
            "image".to_string(),
            vec!["image_prompt".to_string(), "img".to_string()],
        );
        aliases.extend_from(&extra);
        assert_eq!(
            aliases.stored_values("image"),
            vec![
                "image".to_string(),
                "image_prompt".to_string(),
                "img".to_string()
            ]
        );
    }

    #[test]
    fn test_kind_from_prompt_type() {
        assert_eq!(
            MediaKind::from_prompt_type("image_prompt"),
            Some(MediaKind::Image)
        );
        assert_eq!(MediaKind::from_prompt_type("image"), Some(MediaKind::Image));
        assert_eq!(
            MediaKind::from_prompt_type("lyrics_prompt"),
            Some(MediaKind::Audio)
        );
        assert_eq!(MediaKind::from_prompt_type("song"), None);
    }

    #[test]
    fn test_kind_of_follows_configured_aliases() {
        let aliases = KindAliases::default()
            .with_alias("image", ["img"])
            .with_alias("audio", ["song_prompt"])
            .with_alias("picture", ["picture_prompt"]);

        assert_eq!(aliases.kind_of("img"), Some(MediaKind::Image));
        assert_eq!(aliases.kind_of("song_prompt"), Some(MediaKind::Audio));
        assert_eq!(aliases.kind_of("lyrics_prompt"), Some(MediaKind::Audio));
        assert_eq!(aliases.kind_of("picture_prompt"), None);
        assert_eq!(KindAliases::default().kind_of("img"), None);
    }

    #[test]
    fn test_accepts_extension_case_insensitive() {
        assert!(MediaKind::Image.accepts_extension("PNG"));
        assert!(MediaKind::Audio.accepts_extension("flac"));
        assert!(!MediaKind::Audio.accepts_extension("png"));
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("Image".parse::<MediaKind>().unwrap(), MediaKind::Image);
        assert_eq!("song".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert!("video".parse::<MediaKind>().is_err());
    }
}
