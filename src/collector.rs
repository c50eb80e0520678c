//! Source collection: paths and URLs into raw text.
//!
//! Resolves an ordered list of inputs — local files, directories, or
//! http(s) URLs — into `(source id, raw text)` pairs for the indexer.
//! Directories are walked recursively; only files matching the
//! configured extension set are picked up. When an allow-list of root
//! directories is configured, local paths resolving outside every root
//! are rejected. A failure on any one source (missing path, disallowed
//! path, unreadable file, fetch error) fails the whole call; there is
//! no partial success for that source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::CollectorConfig;
use crate::error::{Error, Result};

/// One resolved source: its identifier (path or URL) and full text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

/// Resolves input strings into [`SourceDocument`]s.
pub struct SourceCollector {
    include: GlobSet,
    allowed_roots: Vec<PathBuf>,
    client: reqwest::Client,
}

impl SourceCollector {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for ext in &config.allowed_extensions {
            let pattern = format!("**/*.{}", ext.trim_start_matches('.'));
            builder.add(
                Glob::new(&pattern)
                    .map_err(|e| Error::Config(format!("bad extension pattern: {}", e)))?,
            );
        }
        let include = builder
            .build()
            .map_err(|e| Error::Config(format!("bad extension set: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        // Roots are resolved up front; a root that cannot be resolved is
        // kept as configured so the comparison still has a best-effort
        // absolute form.
        let allowed_roots = config
            .allowed_roots
            .iter()
            .map(|root| root.canonicalize().unwrap_or_else(|_| root.clone()))
            .collect();

        Ok(Self {
            include,
            allowed_roots,
            client,
        })
    }

    /// Resolve every input, in order. Directories expand to their
    /// matching files sorted by path; URLs fetch with a bounded timeout.
    pub async fn collect(&self, inputs: &[String]) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::new();

        for raw in inputs {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            if raw.starts_with("http://") || raw.starts_with("https://") {
                documents.push(self.fetch_url(raw).await?);
                continue;
            }

            let path = Path::new(raw);
            if !path.exists() {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            self.check_allowed(path)?;

            for file in self.expand_local(path)? {
                let text = std::fs::read_to_string(&file).map_err(|e| Error::SourceRead {
                    source_id: file.display().to_string(),
                    cause: e,
                })?;
                documents.push(SourceDocument {
                    source: file.display().to_string(),
                    text,
                });
            }
        }

        Ok(documents)
    }

    async fn fetch_url(&self, url: &str) -> Result<SourceDocument> {
        let wrap = |cause: reqwest::Error| Error::Fetch {
            url: url.to_string(),
            cause,
        };
        let response = self.client.get(url).send().await.map_err(wrap)?;
        let response = response.error_for_status().map_err(wrap)?;
        let text = response.text().await.map_err(wrap)?;
        Ok(SourceDocument {
            source: url.to_string(),
            text,
        })
    }

    /// Reject local paths resolving outside every allowed root. An empty
    /// allow-list means unrestricted.
    fn check_allowed(&self, path: &Path) -> Result<()> {
        if self.allowed_roots.is_empty() {
            return Ok(());
        }
        let resolved = path.canonicalize()?;
        if self
            .allowed_roots
            .iter()
            .any(|root| resolved.starts_with(root))
        {
            return Ok(());
        }
        Err(Error::PermissionDenied(path.to_path_buf()))
    }

    /// A file expands to itself when its name matches the extension set;
    /// a directory expands to all matching files beneath it, sorted for
    /// deterministic ordering.
    fn expand_local(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string());
            return Ok(match name {
                Some(n) if self.include.is_match(&n) => vec![path.to_path_buf()],
                _ => Vec::new(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| Error::SourceRead {
                source_id: path.display().to_string(),
                cause: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
            if self.include.is_match(relative) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}
