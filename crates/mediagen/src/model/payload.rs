//! Structured prompt payloads written by the upstream prompt producer.
//!
//! Parsing is lenient: missing fields take defaults, and a payload that is
//! not valid JSON is treated as absent so the plain prompt text is used.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::kind::MediaKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePromptData {
    pub prompt: String,
    pub negative_prompt: String,
    pub style_tags: Vec<String>,
    pub technical_params: TechnicalParams,
    pub composition: Composition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalParams {
    pub aspect_ratio: String,
    pub quality: String,
    pub mood: String,
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            quality: "high".to_string(),
            mood: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Composition {
    pub subject: String,
    pub background: String,
    pub lighting: String,
}

impl ImagePromptData {
    /// Generation parameters recorded in the artifact's metadata.
    pub fn metadata(&self) -> Value {
        json!({
            "prompt": self.prompt,
            "negative_prompt": self.negative_prompt,
            "style_tags": self.style_tags,
            "aspect_ratio": self.technical_params.aspect_ratio,
            "quality": self.technical_params.quality,
            "mood": self.technical_params.mood,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsPromptData {
    pub title: String,
    pub genre: String,
    pub mood: String,
    pub tempo: String,
    pub structure: Vec<LyricsSection>,
    pub metadata: SongMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsSection {
    #[serde(rename = "type")]
    pub section_type: String,
    pub lyrics: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongMetadata {
    pub key: String,
    pub time_signature: String,
    pub vocal_style: String,
    pub instrumentation: Vec<String>,
}

impl Default for SongMetadata {
    fn default() -> Self {
        Self {
            key: String::new(),
            time_signature: "4/4".to_string(),
            vocal_style: String::new(),
            instrumentation: Vec::new(),
        }
    }
}

impl LyricsPromptData {
    /// All sections joined with upper-cased markers:
    ///
    /// ```text
    /// [VERSE]
    /// ...
    ///
    /// [CHORUS]
    /// ...
    /// ```
    pub fn full_lyrics(&self) -> String {
        self.structure
            .iter()
            .map(|s| format!("[{}]\n{}\n", s.section_type.to_uppercase(), s.lyrics))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Comma-separated style tags (genre, mood, tempo, vocals, instruments),
    /// skipping empty values.
    pub fn tags(&self) -> String {
        let mut parts = vec![
            self.genre.as_str(),
            self.mood.as_str(),
            self.tempo.as_str(),
            self.metadata.vocal_style.as_str(),
        ];
        parts.extend(self.metadata.instrumentation.iter().map(String::as_str));
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn metadata(&self) -> Value {
        json!({
            "title": self.title,
            "genre": self.genre,
            "mood": self.mood,
            "tempo": self.tempo,
            "key": self.metadata.key,
            "time_signature": self.metadata.time_signature,
            "vocal_style": self.metadata.vocal_style,
            "instrumentation": self.metadata.instrumentation,
        })
    }
}

/// A parsed payload, keyed by the kind it was parsed for.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    Image(ImagePromptData),
    Lyrics(LyricsPromptData),
}

impl PromptPayload {
    /// Parses `content` for `kind`. Returns `None` for empty or malformed
    /// content.
    pub fn parse(kind: MediaKind, content: &str) -> Option<Self> {
        if content.trim().is_empty() {
            return None;
        }
        match kind {
            MediaKind::Image => serde_json::from_str::<ImagePromptData>(content)
                .ok()
                .map(PromptPayload::Image),
            MediaKind::Audio => serde_json::from_str::<LyricsPromptData>(content)
                .ok()
                .map(PromptPayload::Lyrics),
        }
    }

    pub fn metadata(&self) -> Value {
        match self {
            PromptPayload::Image(data) => data.metadata(),
            PromptPayload::Lyrics(data) => data.metadata(),
        }
    }
}
