//! On-disk forwarder files.
//!
//! Each file holds `server=<ip>` or `server=/<domain>/<ip>` lines, sorted,
//! one per line. Writes truncate in place; a crash mid-write can leave a
//! partial file that the next add/del run rewrites.

use std::fmt::Display;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::error::Result;
use crate::server_set;

/// Reads the non-empty lines of `path`.
///
/// A missing file reads as empty.
///
/// # Errors
///
/// Returns [`DnsnameError::Io`](crate::DnsnameError::Io) for any failure
/// other than `NotFound`.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Sorts `lines` and rewrites `path` with them.
///
/// # Errors
///
/// Returns [`DnsnameError::Io`](crate::DnsnameError::Io) if the file cannot
/// be created or written.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut sorted = lines.to_vec();
    sorted.sort();

    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for line in &sorted {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Builds `server=/<domain>/<ip>` lines.
#[must_use]
pub fn scoped_lines<T: Display>(domain: &str, servers: &[T]) -> Vec<String> {
    servers
        .iter()
        .map(|s| format!("server=/{domain}/{s}"))
        .collect()
}

/// Builds unscoped `server=<ip>` lines.
#[must_use]
pub fn plain_lines<T: Display>(servers: &[T]) -> Vec<String> {
    servers.iter().map(|s| format!("server={s}")).collect()
}

/// Merges unscoped upstream servers into the file at `path`.
///
/// The file is only rewritten when a new line was added.
///
/// # Errors
///
/// Returns [`DnsnameError::Io`](crate::DnsnameError::Io) on read or write
/// failure.
pub fn add_upstream_servers(path: &Path, servers: &[String]) -> Result<()> {
    let current = read_lines(path)?;
    let (merged, changed) = server_set::merge(&current, &plain_lines(servers));
    if !changed {
        tracing::debug!(path = %path.display(), "Upstream servers already present");
        return Ok(());
    }
    write_lines(path, &merged)
}
