//! Domain types shared by the repository, executor, and pipeline.

pub mod kind;
pub mod payload;
pub mod status;

pub use kind::{KindAliases, MediaKind};
pub use payload::{ImagePromptData, LyricsPromptData, PromptPayload};
pub use status::{ArtifactStatus, InvalidTransition, UnknownStatus};
