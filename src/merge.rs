use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Remove a file, treating "already gone" as success
pub(crate) async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Best-effort removal of part files, failures are only logged
pub(crate) async fn discard_parts(parts: &[PathBuf]) {
    for part in parts {
        if let Err(e) = remove_if_exists(part).await {
            warn!("Could not remove {}: {}", part.display(), e);
        }
    }
}

async fn append(output: &mut File, part: &Path) -> io::Result<u64> {
    let mut input = File::open(part).await?;
    let n = io::copy(&mut input, output).await?;
    debug!("Appended {} bytes from {}", n, part.display());
    Ok(n)
}

async fn create(dest: &Path) -> io::Result<File> {
    remove_if_exists(dest).await?;
    File::create(dest).await
}

async fn finish(mut output: File) -> io::Result<()> {
    output.flush().await?;
    output.sync_all().await
}

/// Concatenate `parts` in order into `dest`, replacing whatever was there.
///
/// On success the parts are deleted. On failure the partial destination and the
/// parts stay on disk and [`Error::MergeFailed`] is returned. `cancel` is checked
/// before each part; a cancelled merge removes the partial destination, leaves
/// the parts to the caller and returns [`Error::Cancelled`].
#[instrument(skip(parts, dest, cancel), fields(dest=%dest.as_ref().display()))]
pub async fn merge(
    parts: &[PathBuf],
    dest: impl AsRef<Path>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let dest = dest.as_ref();
    let mut output = create(dest).await.map_err(Error::MergeFailed)?;
    let mut written = 0;
    for part in parts {
        if cancel.is_cancelled() {
            drop(output);
            if let Err(e) = remove_if_exists(dest).await {
                warn!("Could not remove {}: {}", dest.display(), e);
            }
            return Err(Error::Cancelled);
        }
        written += append(&mut output, part)
            .await
            .map_err(Error::MergeFailed)?;
    }
    finish(output).await.map_err(Error::MergeFailed)?;
    discard_parts(parts).await;
    info!("Merged {} bytes", written);
    Ok(written)
}
