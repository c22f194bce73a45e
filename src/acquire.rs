use std::fs::{self, File};
use std::path::Path;

use crate::error::SeqError;

/// Fetch `url`, stage it at `staging` and return a handle to what was fetched.
///
/// The body is written to a temporary file next to `staging` and renamed over
/// it. The returned handle is opened before the rename, so it keeps pointing
/// at this download even if another request replaces `staging` right after.
pub fn download(url: &str, staging: &Path) -> Result<File, SeqError> {
    let dir = match staging.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut out = tempfile::NamedTempFile::new_in(dir)?;

    let mut resp = reqwest::blocking::get(url).map_err(|e| SeqError::Acquire(format!("{}: {}", url, e)))?;
    if !resp.status().is_success() {
        return Err(SeqError::Acquire(format!("{}: HTTP {}", url, resp.status())));
    }
    let n = resp
        .copy_to(&mut out)
        .map_err(|e| SeqError::Acquire(format!("{}: {}", url, e)))?;
    let fetched = out.reopen()?;
    out.persist(staging).map_err(|e| SeqError::Io(e.error))?;
    log::info!("Wrote {} bytes to {}", n, staging.display());
    Ok(fetched)
}
