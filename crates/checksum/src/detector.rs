use crate::error::{ChecksumError, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const CHECKSUM_FILE: &str = "checksum.json";

/// Directories that never count as source, in addition to `.euignore`.
const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    ".eulix",
    "node_modules",
    "__pycache__",
    "target",
    "build",
    "dist",
    ".venv",
    "venv",
];

const SOURCE_EXTENSIONS: &[&str] = &[
    "go", "py", "js", "ts", "tsx", "jsx", "java", "c", "cpp", "h", "hpp", "rs", "rb", "php", "cs",
    "swift", "kt", "scala",
];

/// Persisted fingerprint of a source tree at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checksum {
    pub project_path: String,
    pub total_files: usize,
    pub total_lines: usize,
    pub hash: String,
    /// Relative path -> hex SHA-256 of file bytes. A `BTreeMap` keeps the
    /// iteration order lexicographic, which the aggregate hash relies on.
    pub file_hashes: BTreeMap<String, String>,
    pub last_analyzed: DateTime<Utc>,
    pub analysis_version: String,
}

/// Change-fraction policy tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Up to this fraction the stored analysis is reused silently.
    pub change: f64,
    /// Above this fraction re-analysis is required.
    pub force_reanalyze: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            change: 0.10,
            force_reanalyze: 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Tree unchanged enough; proceed silently.
    Reuse,
    /// Noticeable drift; warn and ask before continuing.
    Warn,
    /// Too much changed; refuse until re-analysis.
    Refuse,
}

impl ChangeAction {
    pub fn for_fraction(fraction: f64, thresholds: Thresholds) -> Self {
        if fraction <= thresholds.change {
            ChangeAction::Reuse
        } else if fraction <= thresholds.force_reanalyze {
            ChangeAction::Warn
        } else {
            ChangeAction::Refuse
        }
    }
}

/// Walks a project tree and produces its [`Checksum`].
pub struct Detector {
    project_path: PathBuf,
    default_ignores: GlobSet,
}

impl Detector {
    pub fn new(project_path: impl AsRef<Path>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORES {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            project_path: project_path.as_ref().to_path_buf(),
            default_ignores: builder.build()?,
        })
    }

    /// Hash every source file under the project root.
    ///
    /// Unreadable files are skipped with a warning; they never fail the run.
    pub fn calculate(&self) -> Result<Checksum> {
        let mut file_hashes: BTreeMap<String, String> = BTreeMap::new();
        let mut total_lines = 0usize;

        let default_ignores = self.default_ignores.clone();
        let walker = WalkBuilder::new(&self.project_path)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .add_custom_ignore_filename(".euignore")
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || entry
                        .file_name()
                        .to_str()
                        .map_or(true, |name| !default_ignores.is_match(name))
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if !is_source_file(path) {
                continue;
            }

            let (digest, lines) = match hash_file(path) {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("Skipping unreadable file {}: {e}", path.display());
                    continue;
                }
            };

            let rel = path
                .strip_prefix(&self.project_path)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            file_hashes.insert(rel, digest);
            total_lines += lines;
        }

        // Aggregate over per-file digests in lexicographic path order, so the
        // tree hash is stable across runs and platforms.
        let mut hasher = Sha256::new();
        for digest in file_hashes.values() {
            hasher.update(digest.as_bytes());
        }
        let hash = hex::encode(hasher.finalize());

        Ok(Checksum {
            project_path: self.project_path.to_string_lossy().into_owned(),
            total_files: file_hashes.len(),
            total_lines,
            hash,
            file_hashes,
            last_analyzed: Utc::now(),
            analysis_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Persist the record under the session directory (atomic replace).
    pub fn save(&self, session_dir: &Path, checksum: &Checksum) -> Result<()> {
        std::fs::create_dir_all(session_dir)?;
        let path = session_dir.join(CHECKSUM_FILE);
        let data = serde_json::to_vec_pretty(checksum)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load the stored record. `Ok(None)` means first run; a malformed file
    /// is fatal.
    pub fn load(&self, session_dir: &Path) -> Result<Option<Checksum>> {
        let path = session_dir.join(CHECKSUM_FILE);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| ChecksumError::Malformed { path, source })
    }

    /// Fraction of the stored tree that changed:
    /// `(added + deleted + modified) / max(1, stored.total_files)`.
    pub fn compare(stored: &Checksum, current: &Checksum) -> f64 {
        let mut added = 0usize;
        let mut modified = 0usize;
        let mut deleted = 0usize;

        for (file, hash) in &current.file_hashes {
            match stored.file_hashes.get(file) {
                None => added += 1,
                Some(old) if old != hash => modified += 1,
                Some(_) => {}
            }
        }
        for file in stored.file_hashes.keys() {
            if !current.file_hashes.contains_key(file) {
                deleted += 1;
            }
        }

        (added + deleted + modified) as f64 / stored.total_files.max(1) as f64
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// SHA-256 over file bytes, streamed in 4 KiB reads, counting newlines.
fn hash_file(path: &Path) -> std::io::Result<(String, usize)> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut lines = 0usize;
    let mut buf = [0u8; 4096];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count();
    }

    Ok((hex::encode(hasher.finalize()), lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(files: &[(&str, &str)], total_files: usize) -> Checksum {
        Checksum {
            project_path: "/proj".into(),
            total_files,
            total_lines: 0,
            hash: String::new(),
            file_hashes: files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            last_analyzed: Utc::now(),
            analysis_version: "test".into(),
        }
    }

    #[test]
    fn calculate_is_deterministic() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.path().join("src/util.py"), "def util():\n    pass\n").unwrap();

        let detector = Detector::new(dir.path()).unwrap();
        let first = detector.calculate().unwrap();
        let second = detector.calculate().unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(first.total_files, 2);
        assert_eq!(first.total_lines, 3);
    }

    #[test]
    fn ignores_default_directories_and_non_source() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not source\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "pass\n").unwrap();

        let detector = Detector::new(dir.path()).unwrap();
        let checksum = detector.calculate().unwrap();

        assert_eq!(checksum.total_files, 1);
        assert!(checksum.file_hashes.contains_key("app.py"));
    }

    #[test]
    fn euignore_prunes_matching_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("generated")).unwrap();
        std::fs::write(dir.path().join("generated/out.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "pass\n").unwrap();
        std::fs::write(dir.path().join(".euignore"), "generated/\n").unwrap();

        let detector = Detector::new(dir.path()).unwrap();
        let checksum = detector.calculate().unwrap();

        assert_eq!(checksum.total_files, 1);
        assert!(checksum.file_hashes.contains_key("app.py"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.py"), "pass\n").unwrap();

        let detector = Detector::new(dir.path()).unwrap();
        let checksum = detector.calculate().unwrap();
        let session = dir.path().join(".eulix");
        detector.save(&session, &checksum).unwrap();

        let loaded = detector.load(&session).unwrap().unwrap();
        assert_eq!(loaded.hash, checksum.hash);
        assert_eq!(loaded.file_hashes, checksum.file_hashes);
    }

    #[test]
    fn load_missing_is_first_run() {
        let dir = TempDir::new().unwrap();
        let detector = Detector::new(dir.path()).unwrap();
        assert!(detector.load(&dir.path().join(".eulix")).unwrap().is_none());
    }

    #[test]
    fn load_malformed_is_fatal() {
        let dir = TempDir::new().unwrap();
        let session = dir.path().join(".eulix");
        std::fs::create_dir_all(&session).unwrap();
        std::fs::write(session.join(CHECKSUM_FILE), "{not json").unwrap();

        let detector = Detector::new(dir.path()).unwrap();
        assert!(matches!(
            detector.load(&session),
            Err(ChecksumError::Malformed { .. })
        ));
    }

    #[test]
    fn change_fraction_counts_added_deleted_modified() {
        // 100 stored files; 35 added, 10 modified, 5 deleted -> 0.5.
        let stored_files: Vec<(String, String)> = (0..100)
            .map(|i| (format!("f{i:03}.py"), format!("hash{i}")))
            .collect();
        let stored = Checksum {
            file_hashes: stored_files.iter().cloned().collect(),
            ..record(&[], 100)
        };

        let mut current_files = stored.file_hashes.clone();
        for i in 0..5 {
            current_files.remove(&format!("f{i:03}.py"));
        }
        for i in 5..15 {
            current_files.insert(format!("f{i:03}.py"), "changed".into());
        }
        for i in 0..35 {
            current_files.insert(format!("new{i}.py"), "fresh".into());
        }
        let current = Checksum {
            file_hashes: current_files,
            ..record(&[], 130)
        };

        let fraction = Detector::compare(&stored, &current);
        assert!((fraction - 0.5).abs() < 1e-9);
        assert_eq!(
            ChangeAction::for_fraction(fraction, Thresholds::default()),
            ChangeAction::Refuse
        );
    }

    #[test]
    fn change_action_tiers() {
        let t = Thresholds::default();
        assert_eq!(ChangeAction::for_fraction(0.0, t), ChangeAction::Reuse);
        assert_eq!(ChangeAction::for_fraction(0.10, t), ChangeAction::Reuse);
        assert_eq!(ChangeAction::for_fraction(0.11, t), ChangeAction::Warn);
        assert_eq!(ChangeAction::for_fraction(0.30, t), ChangeAction::Warn);
        assert_eq!(ChangeAction::for_fraction(0.31, t), ChangeAction::Refuse);
    }

    #[test]
    fn empty_stored_tree_is_full_change() {
        let stored = record(&[], 0);
        let current = record(&[("a.py", "h1")], 1);
        assert!((Detector::compare(&stored, &current) - 1.0).abs() < 1e-9);
    }
}
