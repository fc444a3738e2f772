pub mod output;

pub use output::{discover_outputs, ArtifactPath, JobOutputDir, OutputLayout};
