//! Engine command line construction, keyed by media kind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, WorkflowConfig};
use crate::error::ExecutionError;
use crate::model::{MediaKind, PromptPayload};

/// A fully built engine command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub kind: MediaKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Invocation {
    /// Value following `--{name}`, if present.
    pub fn arg_value(&self, name: &str) -> Option<&OsString> {
        let flag = format!("--{}", name);
        self.args
            .iter()
            .position(|a| *a == *flag)
            .and_then(|i| self.args.get(i + 1))
    }
}

/// Builds `<executable> [<script>] --<prompt_arg> <text> [--<extra> <value>]...
/// --output <dir> --<location_flag> <engine_dir> --queue-size 1`.
#[derive(Debug, Clone)]
pub struct ArgumentBuilder {
    kind: MediaKind,
    program: PathBuf,
    script: Option<PathBuf>,
    engine_dir: PathBuf,
    location_flag: String,
    prompt_arg: String,
    prompt: String,
    extras: Vec<(String, String)>,
}

impl ArgumentBuilder {
    pub fn new(kind: MediaKind, engine: &EngineConfig, workflow: &WorkflowConfig) -> Self {
        let script = workflow.script.as_ref().map(|s| {
            if s.is_absolute() {
                s.clone()
            } else {
                engine.directory.join(s)
            }
        });

        Self {
            kind,
            program: engine.executable.clone(),
            script,
            engine_dir: engine.directory.clone(),
            location_flag: engine.location_flag.clone(),
            prompt_arg: workflow.prompt_arg.clone(),
            prompt: String::new(),
            extras: Vec::new(),
        }
    }

    /// Fills prompt values for a stored prompt. A parsed payload wins over
    /// the plain text: image payloads supply the prompt, lyrics payloads
    /// supply full lyrics and the style tags.
    pub fn for_prompt(
        kind: MediaKind,
        engine: &EngineConfig,
        workflow: &WorkflowConfig,
        prompt_text: &str,
        payload: Option<&PromptPayload>,
    ) -> Self {
        let builder = Self::new(kind, engine, workflow);
        match payload {
            Some(PromptPayload::Image(data)) if !data.prompt.trim().is_empty() => {
                builder.prompt(&data.prompt)
            }
            Some(PromptPayload::Lyrics(data)) => {
                let lyrics = data.full_lyrics();
                let text = if lyrics.trim().is_empty() {
                    prompt_text.to_string()
                } else {
                    lyrics
                };
                let builder = builder.prompt(text);
                match &workflow.tags_arg {
                    Some(tags_arg) => builder.extra(tags_arg, data.tags()),
                    None => builder,
                }
            }
            _ => builder.prompt(prompt_text),
        }
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = text.into();
        self
    }

    /// Adds an optional `--{name} {value}` pair. Empty values are dropped.
    pub fn extra(mut self, name: &str, value: impl Into<String>) -> Self {
        self.extras.push((name.to_string(), value.into()));
        self
    }

    /// Checks that the kind's prompt argument is named and has a value.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.prompt_arg.trim().is_empty() {
            return Err(ExecutionError::UnconfiguredArgument { kind: self.kind });
        }
        if self.prompt.trim().is_empty() {
            return Err(ExecutionError::MissingArgument {
                kind: self.kind,
                name: self.prompt_arg.clone(),
            });
        }
        Ok(())
    }

    /// Program that will be launched.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Resolved workflow script, if the workflow uses one.
    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Validates and assembles the command for `output_dir`.
    pub fn build(self, output_dir: &Path) -> Result<Invocation, ExecutionError> {
        self.validate()?;

        let mut args: Vec<OsString> = Vec::new();
        if let Some(script) = &self.script {
            args.push(script.clone().into_os_string());
        }
        args.push(format!("--{}", self.prompt_arg).into());
        args.push(self.prompt.into());

        for (name, value) in self.extras {
            if value.trim().is_empty() {
                continue;
            }
            args.push(format!("--{}", name).into());
            args.push(value.into());
        }

        args.push("--output".into());
        args.push(output_dir.as_os_str().to_os_string());
        args.push(format!("--{}", self.location_flag).into());
        args.push(self.engine_dir.as_os_str().to_os_string());
        args.push("--queue-size".into());
        args.push("1".into());

        Ok(Invocation {
            kind: self.kind,
            program: self.program,
            args,
            working_dir: self.engine_dir,
            output_dir: output_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LyricsPromptData;

    fn engine() -> EngineConfig {
        EngineConfig {
            executable: PathBuf::from("/opt/engine/venv/bin/python"),
            directory: PathBuf::from("/opt/engine"),
            output_directory: PathBuf::from("/srv/out"),
            timeout_seconds: 900,
            location_flag: "comfyui-directory".to_string(),
        }
    }

    fn workflow(script: Option<&str>, prompt_arg: &str, tags_arg: Option<&str>) -> WorkflowConfig {
        WorkflowConfig {
            script: script.map(PathBuf::from),
            prompt_arg: prompt_arg.to_string(),
            tags_arg: tags_arg.map(str::to_string),
        }
    }

    fn strings(inv: &Invocation) -> Vec<String> {
        inv.args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_image_command_line() {
        let inv = ArgumentBuilder::new(
            MediaKind::Image,
            &engine(),
            &workflow(Some("workflows/image.py"), "prompt", None),
        )
        .prompt("a red fox")
        .build(Path::new("/srv/out/image/42_20260107T100000"))
        .unwrap();

        assert_eq!(inv.program, PathBuf::from("/opt/engine/venv/bin/python"));
        assert_eq!(inv.working_dir, PathBuf::from("/opt/engine"));
        assert_eq!(
            strings(&inv),
            vec![
                "/opt/engine/workflows/image.py",
                "--prompt",
                "a red fox",
                "--output",
                "/srv/out/image/42_20260107T100000",
                "--comfyui-directory",
                "/opt/engine",
                "--queue-size",
                "1",
            ]
        );
    }

    #[test]
    fn test_without_script_prompt_comes_first() {
        let inv = ArgumentBuilder::new(MediaKind::Image, &engine(), &workflow(None, "text", None))
            .prompt("fox")
            .build(Path::new("/o"))
            .unwrap();
        assert_eq!(strings(&inv)[0], "--text");
    }

    #[test]
    fn test_lyrics_payload_supplies_lyrics_and_tags() {
        let data: LyricsPromptData = serde_json::from_str(
            r#"{
                "title": "Night Drive",
                "genre": "synthwave",
                "mood": "nostalgic",
                "tempo": "110 bpm",
                "structure": [
                    {"type": "verse", "lyrics": "Neon on the rain"},
                    {"type": "chorus", "lyrics": "Drive all night"}
                ]
            }"#,
        )
        .unwrap();
        let payload = PromptPayload::Lyrics(data);

        let inv = ArgumentBuilder::for_prompt(
            MediaKind::Audio,
            &engine(),
            &workflow(Some("audio.py"), "lyrics", Some("tags")),
            "fallback text",
            Some(&payload),
        )
        .build(Path::new("/o"))
        .unwrap();

        let lyrics = inv.arg_value("lyrics").unwrap().to_string_lossy().to_string();
        assert!(lyrics.contains("Neon on the rain"));
        assert!(lyrics.contains("Drive all night"));
        let tags = inv.arg_value("tags").unwrap().to_string_lossy().to_string();
        assert!(tags.contains("synthwave"));
    }

    #[test]
    fn test_plain_text_used_without_payload() {
        let inv = ArgumentBuilder::for_prompt(
            MediaKind::Audio,
            &engine(),
            &workflow(None, "lyrics", Some("tags")),
            "la la la",
            None,
        )
        .build(Path::new("/o"))
        .unwrap();
        assert_eq!(inv.arg_value("lyrics").unwrap(), "la la la");
        assert!(inv.arg_value("tags").is_none());
    }

    #[test]
    fn test_empty_prompt_is_missing_argument() {
        let err = ArgumentBuilder::new(MediaKind::Image, &engine(), &workflow(None, "prompt", None))
            .prompt("   ")
            .build(Path::new("/o"))
            .unwrap_err();
        match err {
            ExecutionError::MissingArgument { kind, name } => {
                assert_eq!(kind, MediaKind::Image);
                assert_eq!(name, "prompt");
            }
            other => panic!("Expected MissingArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_unconfigured_prompt_arg() {
        let err = ArgumentBuilder::new(MediaKind::Audio, &engine(), &workflow(None, "", None))
            .prompt("words")
            .build(Path::new("/o"))
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::UnconfiguredArgument {
                kind: MediaKind::Audio
            }
        ));
    }

    #[test]
    fn test_empty_extra_is_dropped() {
        let inv = ArgumentBuilder::new(MediaKind::Image, &engine(), &workflow(None, "prompt", None))
            .prompt("fox")
            .extra("negative", "")
            .build(Path::new("/o"))
            .unwrap();
        assert!(inv.arg_value("negative").is_none());
    }
}
