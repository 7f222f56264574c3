//! Image downloads
//!
//! Images come from a CDN rather than the registry API, so they have their own
//! pacing and never touch ban accounting.

use super::sink::MetadataSink;
use crate::error::{IoError, Result};
use crate::protocol::{HttpTransport, RateLimiter};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadImage {
    pub url: String,
    pub dest: PathBuf,
    /// Replace an existing file
    #[serde(default)]
    pub overwrite: bool,
}

impl DownloadImage {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            overwrite: false,
        }
    }
}

impl CommandPayload for DownloadImage {
    const COMMAND_TYPE: CommandType = CommandType::DownloadImage;

    fn key(&self) -> String {
        self.dest.display().to_string()
    }
}

pub(crate) struct DownloadImageHandler {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn MetadataSink>,
}

impl DownloadImageHandler {
    pub(crate) fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        sink: Arc<dyn MetadataSink>,
    ) -> Self {
        Self {
            transport,
            limiter,
            sink,
        }
    }
}

#[async_trait]
impl CommandHandler for DownloadImageHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: DownloadImage = command.payload()?;
        let dest = &payload.dest;

        if !payload.overwrite && tokio::fs::try_exists(dest).await? {
            debug!("Image {} already present", dest.display());
            return Ok(());
        }

        self.limiter.ensure_rate().await;
        let bytes = self.transport.get_bytes(&payload.url).await?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::write_failed(parent, e))?;
        }

        // Readers never see a partial file
        let partial = partial_path(dest);
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| IoError::write_failed(&partial, e))?;
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| IoError::write_failed(dest, e))?;

        info!("Saved image {} ({} bytes)", dest.display(), bytes.len());
        self.sink.image_saved(dest).await
    }
}

/// Sibling of `dest` with `.part` appended to the full file name
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("images/poster.jpg")),
            PathBuf::from("images/poster.jpg.part")
        );
    }

    #[test]
    fn test_partial_paths_differ_by_extension() {
        assert_ne!(
            partial_path(Path::new("covers/a.jpg")),
            partial_path(Path::new("covers/a.png"))
        );
    }
}
