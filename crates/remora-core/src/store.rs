//! Expiring file store for published preview documents.
//!
//! Each published document is written as `site_<millis>_<hex>.html` with a JSON sidecar
//! carrying its creation and expiry timestamps; `sweep` deletes expired pairs. The store
//! is deliberately dumb: serving the files over HTTP is the embedding server's job, this
//! crate only owns the naming, expiry, and cleanup rules.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

const META_SUFFIX: &str = ".meta.json";

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^site_\d+_[0-9a-f]{1,32}\.html$").expect("valid regex"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetMetadata {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredSnippet {
    pub key: String,
    pub path: PathBuf,
    /// The path the preview server exposes this snippet under.
    pub preview_path: String,
}

#[derive(Debug, Clone)]
pub struct SnippetStore {
    dir: PathBuf,
    lifetime: Duration,
}

impl SnippetStore {
    pub fn new(dir: impl Into<PathBuf>, lifetime_days: i64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lifetime: Duration::days(lifetime_days),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn preview_path(key: &str) -> String {
        format!("/preview/{key}")
    }

    /// Writes `html` under a fresh key and records its expiry.
    pub fn publish(&self, html: &str, now: DateTime<Utc>) -> Result<StoredSnippet> {
        let random = Uuid::new_v4().simple().to_string();
        let key = format!("site_{}_{}.html", now.timestamp_millis(), &random[..16]);
        let path = self.dir.join(&key);
        fs::write(&path, html)?;

        let metadata = SnippetMetadata {
            created_at: now,
            expires_at: now + self.lifetime,
        };
        let meta_path = self.dir.join(format!("{key}{META_SUFFIX}"));
        fs::write(&meta_path, serde_json::to_vec_pretty(&metadata)?)?;

        tracing::info!(key = %key, expires = %metadata.expires_at, "published snippet");
        Ok(StoredSnippet {
            preview_path: Self::preview_path(&key),
            key,
            path,
        })
    }

    pub fn load(&self, key: &str) -> Result<String> {
        self.validate_key(key)?;
        let path = self.dir.join(key);
        fs::read_to_string(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::UnknownSnippet {
                    key: key.to_string(),
                }
            } else {
                Error::Io(err)
            }
        })
    }

    pub fn metadata(&self, key: &str) -> Result<SnippetMetadata> {
        self.validate_key(key)?;
        self.metadata_for_path(&self.dir.join(key))
    }

    /// Deletes every expired snippet (and its sidecar); returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !key_regex().is_match(name) {
                continue;
            }

            let path = entry.path();
            let expires_at = match self.metadata_for_path(&path) {
                Ok(meta) => meta.expires_at,
                Err(_) => {
                    // No readable sidecar: fall back to mtime + lifetime.
                    let modified = entry.metadata()?.modified()?;
                    DateTime::<Utc>::from(modified) + self.lifetime
                }
            };

            if expires_at <= now {
                fs::remove_file(&path)?;
                let meta_path = self.dir.join(format!("{name}{META_SUFFIX}"));
                if meta_path.exists() {
                    fs::remove_file(&meta_path)?;
                }
                tracing::debug!(key = %name, "removed expired snippet");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn metadata_for_path(&self, path: &Path) -> Result<SnippetMetadata> {
        let meta_path = PathBuf::from(format!("{}{META_SUFFIX}", path.display()));
        let raw = fs::read_to_string(&meta_path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::UnknownSnippet {
                    key: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                }
            } else {
                Error::Io(err)
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Keys are generated names only; anything else (especially anything path-like) is
    /// rejected before touching the filesystem.
    fn validate_key(&self, key: &str) -> Result<()> {
        if key_regex().is_match(key) {
            Ok(())
        } else {
            Err(Error::InvalidSnippetKey {
                key: key.to_string(),
            })
        }
    }
}
