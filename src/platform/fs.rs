// PlateauLab - platform/fs.rs
//
// File reading helpers for run logs and small definition files.

use crate::util::constants;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Read the full content of a file as a string.
///
/// For files with invalid UTF-8, uses lossy conversion.
pub fn read_file_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a run log.
///
/// Large logs are memory-mapped instead of copied into a heap buffer first.
/// Both paths decode lossily: planner output may contain stray bytes and a
/// single bad byte must not hide every metric in the log.
///
/// Transient I/O errors (WouldBlock, Interrupted, TimedOut) are retried with
/// the backoff in `READ_RETRY_DELAYS_MS`. Permanent errors return immediately.
pub fn read_log(path: &Path, is_large: bool) -> io::Result<String> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..constants::MAX_READ_RETRIES {
        let result = if is_large {
            read_mapped_lossy(path)
        } else {
            read_file_lossy(path)
        };
        match result {
            Ok(content) => return Ok(content),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(
                    constants::READ_RETRY_DELAYS_MS[attempt as usize],
                ));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

/// Read using `memmap2` (avoids allocating a second full-size buffer).
fn read_mapped_lossy(path: &Path) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        // Mapping an empty file fails on some platforms.
        return Ok(String::new());
    }
    // SAFETY: the map is read-only and dropped before returning. Run logs are
    // complete by the time the parse step runs; a concurrent writer could at
    // worst change the bytes we decode.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(String::from_utf8_lossy(&mmap).into_owned())
}

/// Returns true for transient I/O errors that are worth retrying.
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Read a small definition file, refusing anything above `max_size` bytes.
///
/// Returns `Ok(Err(size))` when the file is too large so callers can map it
/// to their own error variant.
pub fn read_bounded(path: &Path, max_size: u64) -> io::Result<Result<String, u64>> {
    let size = std::fs::metadata(path)?.len();
    if size > max_size {
        return Ok(Err(size));
    }
    Ok(Ok(read_file_lossy(path)?))
}

/// True when `path` does not exist or is an empty directory.
pub fn is_missing_or_empty_dir(path: &Path) -> io::Result<bool> {
    match std::fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}
