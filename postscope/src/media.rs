use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// Extension given to every staged video.
pub const VIDEO_SUFFIX: &str = ".mp4";

/// Local copy of a remote video, alive for one model invocation.
///
/// The file is removed when the value is dropped or [`StagedMedia::discard`]ed. Removal
/// failures are ignored.
#[derive(Debug)]
pub struct StagedMedia {
    file: NamedTempFile,
}

impl StagedMedia {
    /// Write `bytes` to a uniquely named temporary file.
    pub async fn stage(bytes: Vec<u8>) -> std::io::Result<Self> {
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("postscope-")
                .suffix(VIDEO_SUFFIX)
                .tempfile()?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!(path = %file.path().display(), "media: staged video");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now. Errors are swallowed.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            debug!("media: could not remove {}: {}", path.display(), e);
        }
    }
}
