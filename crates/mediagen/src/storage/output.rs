use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::model::MediaKind;

const WRITE_PROBE: &str = ".mediagen-write-probe";

/// A path relative to the output root, `/`-separated, made only of normal
/// segments. This is the only form in which a file location is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath(String);

impl ArtifactPath {
    /// Validates a stored or computed path. Absolute paths, drive prefixes,
    /// `.` and `..` segments are rejected rather than normalized.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidRelativePath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }
        if raw.contains('\\') {
            return Err(invalid("path contains a backslash"));
        }

        let mut segments = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Normal(segment) => match segment.to_str() {
                    Some(s) => segments.push(s),
                    None => return Err(invalid("path is not valid UTF-8")),
                },
                Component::ParentDir => return Err(invalid("path contains '..'")),
                Component::CurDir => return Err(invalid("path contains '.'")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("path is absolute"))
                }
            }
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a file name produced inside this directory.
    pub fn join(&self, file_name: &str) -> Result<Self, StorageError> {
        Self::parse(&format!("{}/{}", self.0, file_name))
    }

    pub fn first_segment(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly created, writable directory for one generation attempt.
#[derive(Debug, Clone)]
pub struct JobOutputDir {
    pub kind: MediaKind,
    /// Absolute path handed to the engine.
    pub absolute: PathBuf,
    /// Same directory relative to the output root.
    pub relative: ArtifactPath,
}

/// Resolves where generated files go and how their paths are persisted.
///
/// Layout: `{root}/{kind}/{prompt_id}_{%Y%m%dT%H%M%S}[_{n}]/`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Makes `root` absolute (relative roots resolve against the current
    /// directory). The directory itself is created lazily by `prepare`.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).map_err(|e| StorageError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { root: absolute })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sortable, per-second unique directory name for one attempt.
    pub fn job_dir_name(prompt_id: i64, at: DateTime<Utc>) -> String {
        format!("{}_{}", prompt_id, at.format("%Y%m%dT%H%M%S"))
    }

    /// Creates a new directory for this attempt and checks it is writable.
    ///
    /// An existing directory is never reused: a second attempt within the
    /// same second gets a `_2`, `_3`, ... suffix, so files from an earlier
    /// attempt are left alone.
    pub fn prepare(
        &self,
        kind: MediaKind,
        prompt_id: i64,
        at: DateTime<Utc>,
    ) -> Result<JobOutputDir, StorageError> {
        let kind_dir = self.root.join(kind.as_str());
        std::fs::create_dir_all(&kind_dir).map_err(|e| StorageError::CreateDirectory {
            path: kind_dir.clone(),
            source: e,
        })?;

        let base = Self::job_dir_name(prompt_id, at);
        for counter in 1..=1000 {
            let name = if counter == 1 {
                base.clone()
            } else {
                format!("{}_{}", base, counter)
            };
            let candidate = kind_dir.join(&name);

            match std::fs::create_dir(&candidate) {
                Ok(()) => {
                    probe_writable(&candidate)?;
                    let relative = self.relative_path(&candidate)?;
                    return Ok(JobOutputDir {
                        kind,
                        absolute: candidate,
                        relative,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::CreateDirectory {
                        path: candidate,
                        source: e,
                    })
                }
            }
        }

        Err(StorageError::DirectoryExhausted(kind_dir.join(base)))
    }

    /// Expresses `full_path` relative to the output root itself.
    ///
    /// The result always starts with a media-kind segment; anything else
    /// (a root name, an environment prefix) means the path was built
    /// against a different root and is refused.
    pub fn relative_path(&self, full_path: &Path) -> Result<ArtifactPath, StorageError> {
        let stripped =
            full_path
                .strip_prefix(&self.root)
                .map_err(|_| StorageError::OutsideRoot {
                    path: full_path.to_path_buf(),
                    root: self.root.clone(),
                })?;

        let raw = stripped
            .to_str()
            .ok_or_else(|| StorageError::InvalidRelativePath {
                path: stripped.display().to_string(),
                reason: "path is not valid UTF-8".to_string(),
            })?;
        let path = ArtifactPath::parse(&raw.replace(std::path::MAIN_SEPARATOR, "/"))?;

        let first = path.first_segment();
        if !MediaKind::ALL.iter().any(|k| k.as_str() == first) {
            return Err(StorageError::InvalidRelativePath {
                path: path.to_string(),
                reason: format!("expected a media kind as first segment, found '{}'", first),
            });
        }

        Ok(path)
    }
}

fn probe_writable(dir: &Path) -> Result<(), StorageError> {
    let probe = dir.join(WRITE_PROBE);
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|e| StorageError::NotWritable {
            path: dir.to_path_buf(),
            source: e,
        })?;
    std::fs::remove_file(&probe).map_err(|e| StorageError::NotWritable {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Lists regular files directly inside `dir` whose extension belongs to
/// `kind`, sorted by file name. Hidden files are ignored.
pub fn discover_outputs(dir: &Path, kind: MediaKind) -> Result<Vec<PathBuf>, StorageError> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| StorageError::ReadDirectory {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let accepted = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| kind.accepts_extension(e))
            .unwrap_or(false);
        if accepted {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}
