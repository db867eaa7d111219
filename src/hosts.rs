//! The per-network additional hosts file read by dnsmasq.
//!
//! ```text
//! 10.88.0.5	web web-alias
//! ```

use std::fmt::Write as _;
use std::io::{ErrorKind, Write};
use std::net::IpAddr;
use std::path::Path;

use crate::error::Result;

/// Appends one line per container IP naming `pod` and its `aliases`.
///
/// # Errors
///
/// Returns [`DnsnameError::Io`](crate::DnsnameError::Io) if the file cannot
/// be opened or written.
pub fn append(path: &Path, pod: &str, aliases: &[String], ips: &[IpAddr]) -> Result<()> {
    let mut names = pod.to_string();
    for alias in aliases {
        let _ = write!(names, " {alias}");
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut content = String::new();
    for ip in ips {
        let _ = writeln!(content, "{ip}\t{names}");
    }
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Removes every line whose primary name is `pod`.
///
/// Returns `true` if any host lines remain afterwards. A missing file has
/// no hosts left.
///
/// # Errors
///
/// Returns [`DnsnameError::Io`](crate::DnsnameError::Io) if the file cannot
/// be read or rewritten.
pub fn remove_pod(path: &Path, pod: &str) -> Result<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let kept: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| line.split_whitespace().nth(1) != Some(pod))
        .collect();

    let mut rewritten = String::new();
    for line in &kept {
        let _ = writeln!(rewritten, "{line}");
    }
    std::fs::write(path, rewritten)?;
    Ok(!kept.is_empty())
}
