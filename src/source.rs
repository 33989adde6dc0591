//! Image sources: the seam the pipeline fetches candidate bytes through,
//! plus bundled in-memory and filesystem implementations. The HTTP source
//! lives in [`crate::http`] behind the `http` feature.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{ConfigError, SourceConfig};
use crate::error::SourceError;
#[cfg(feature = "http")]
use crate::http::HttpSource;

/// Resolves a candidate locator to raw image bytes.
///
/// Shared by every worker of a run; implementations must be safe for
/// concurrent `load` calls.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn load(&self, locator: &str) -> Result<Bytes, SourceError>;
}

/// Fixed locator → bytes map. The workhorse for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    images: HashMap<String, Bytes>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource {
            images: HashMap::new(),
        }
    }

    pub fn insert(&mut self, locator: impl Into<String>, bytes: impl Into<Bytes>) {
        self.images.insert(locator.into(), bytes.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_image(mut self, locator: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.insert(locator, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    async fn load(&self, locator: &str) -> Result<Bytes, SourceError> {
        self.images
            .get(locator)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(locator.to_string()))
    }
}

/// Serves locators as relative paths under a root directory.
///
/// Locators that are absolute or that climb out of the root are rejected
/// before touching the filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
    max_bytes: usize,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSource {
            root: root.into(),
            max_bytes: SourceConfig::default_max_bytes(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf, SourceError> {
        let rel = Path::new(locator);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(SourceError::InvalidLocator {
                locator: locator.to_string(),
                reason: "path escapes the source root".to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ImageSource for FileSource {
    async fn load(&self, locator: &str) -> Result<Bytes, SourceError> {
        let path = self.resolve(locator)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| io_error(locator, err))?;
        if metadata.len() > self.max_bytes as u64 {
            return Err(SourceError::TooLarge {
                locator: locator.to_string(),
                limit: self.max_bytes,
            });
        }

        let data = tokio::fs::read(&path)
            .await
            .map_err(|err| io_error(locator, err))?;
        Ok(Bytes::from(data))
    }
}

fn io_error(locator: &str, err: std::io::Error) -> SourceError {
    if err.kind() == ErrorKind::NotFound {
        SourceError::NotFound(locator.to_string())
    } else {
        SourceError::Io {
            locator: locator.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Build the image source a [`SourceConfig`] describes.
///
/// `kind: file` roots a [`FileSource`] at `source.root`; `kind: http` hands
/// the config to [`HttpSource::from_config`]. `kind: memory` is rejected:
/// an in-memory source is assembled in code, not loaded from a file.
pub fn source_from_config(config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
    match config.kind.as_str() {
        "file" => {
            let root = config.root.as_deref().ok_or_else(|| {
                ConfigError::Validation("source.root is required when kind is 'file'".to_string())
            })?;
            Ok(Arc::new(
                FileSource::new(root).with_max_bytes(config.max_bytes),
            ))
        }
        #[cfg(feature = "http")]
        "http" => Ok(Arc::new(HttpSource::from_config(config)?)),
        #[cfg(not(feature = "http"))]
        "http" => Err(ConfigError::Validation(
            "source.kind 'http' requires the `http` feature".to_string(),
        )),
        "memory" => Err(ConfigError::Validation(
            "source.kind 'memory' is assembled in code, not loaded from config".to_string(),
        )),
        other => Err(ConfigError::Validation(format!(
            "source.kind '{other}' is not a bundled source"
        ))),
    }
}
