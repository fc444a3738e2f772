use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::model::MediaKind;

/// Flags the executor always emits; a workflow argument may not reuse them.
const RESERVED_FLAGS: &[&str] = &["output", "queue-size"];

/// Timeouts above this are accepted but reported by `environment_issues`.
const LONG_TIMEOUT_SECS: u64 = 3600;

/// `~/.mediagen/config.json`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mediagen").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Structural checks that need no filesystem access.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.timeout_seconds == 0 {
        return Err(ConfigError::Validation {
            message: "engine.timeout_seconds must be positive".to_string(),
        });
    }

    if !config.engine.output_directory.is_absolute() {
        return Err(ConfigError::Validation {
            message: format!(
                "engine.output_directory must be absolute, got '{}'",
                config.engine.output_directory.display()
            ),
        });
    }

    if let Err(reason) = check_flag_name(&config.engine.location_flag) {
        return Err(ConfigError::Validation {
            message: format!(
                "engine.location_flag '{}': {}",
                config.engine.location_flag, reason
            ),
        });
    }

    for kind in MediaKind::ALL {
        let workflow = config.workflows.get(kind);
        let mut names = vec![workflow.prompt_arg.as_str()];
        names.extend(workflow.tags_arg.as_deref());

        for name in names {
            check_flag_name(name)
                .and_then(|()| {
                    if RESERVED_FLAGS.contains(&name) || name == config.engine.location_flag {
                        Err("name is reserved for the engine invocation".to_string())
                    } else {
                        Ok(())
                    }
                })
                .map_err(|reason| ConfigError::InvalidArgument {
                    kind,
                    name: name.to_string(),
                    reason,
                })?;
        }
    }

    if config.pipeline.status_write_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.status_write_attempts must be at least 1".to_string(),
        });
    }
    if config.pipeline.batch_limit == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.batch_limit must be at least 1".to_string(),
        });
    }

    for (token, values) in &config.kind_aliases {
        if token.trim().is_empty() || values.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: format!("kind_aliases entry '{}' contains an empty token", token),
            });
        }
    }

    Ok(())
}

fn check_flag_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name.starts_with('-') {
        return Err("give the name without leading dashes".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("only ASCII letters, digits, '-' and '_' are allowed".to_string());
    }
    Ok(())
}

/// Filesystem problems that would make a generation fail. Empty when the
/// environment looks usable. Never creates anything except the output root.
pub fn environment_issues(config: &Config) -> Vec<String> {
    let mut issues = Vec::new();

    if !config.database.path.exists() {
        issues.push(format!(
            "Database not found: {}",
            config.database.path.display()
        ));
    }

    let engine_dir = &config.engine.directory;
    if !engine_dir.is_dir() {
        issues.push(format!("Engine directory not found: {}", engine_dir.display()));
    }

    // A bare program name is resolved through PATH at launch.
    let executable = &config.engine.executable;
    if executable.components().count() > 1 && !executable.exists() {
        issues.push(format!("Engine executable not found: {}", executable.display()));
    }

    for kind in MediaKind::ALL {
        if let Some(script) = resolve_script(config, kind) {
            if !script.exists() {
                issues.push(format!(
                    "{} workflow script not found: {}",
                    kind,
                    script.display()
                ));
            }
        }
    }

    if let Err(e) = std::fs::create_dir_all(&config.engine.output_directory) {
        issues.push(format!(
            "Cannot create output directory {}: {}",
            config.engine.output_directory.display(),
            e
        ));
    }

    if config.engine.timeout_seconds > LONG_TIMEOUT_SECS {
        issues.push(format!(
            "Workflow timeout is very high ({}s), consider reducing",
            config.engine.timeout_seconds
        ));
    }

    issues
}

/// Absolute location of the kind's workflow script, if one is configured.
pub fn resolve_script(config: &Config, kind: MediaKind) -> Option<PathBuf> {
    config.workflows.get(kind).script.as_ref().map(|script| {
        if script.is_absolute() {
            script.clone()
        } else {
            config.engine.directory.join(script)
        }
    })
}
