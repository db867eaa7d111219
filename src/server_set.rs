//! Set operations over forwarder lines.
//!
//! Lines are compared by exact content. Order only matters until the
//! store sorts on write.

/// Appends every line of `incoming` not already in `current`.
///
/// Returns the merged lines and whether anything was appended.
#[must_use]
pub fn merge(current: &[String], incoming: &[String]) -> (Vec<String>, bool) {
    let mut merged = current.to_vec();
    let mut changed = false;
    for line in incoming {
        if !merged.contains(line) {
            merged.push(line.clone());
            changed = true;
        }
    }
    (merged, changed)
}

/// Removes the first occurrence of each line of `to_remove` from `current`.
///
/// A duplicated line loses one copy per call. Returns the remaining lines
/// and whether any deletion happened.
#[must_use]
pub fn remove(current: &[String], to_remove: &[String]) -> (Vec<String>, bool) {
    let mut remaining = current.to_vec();
    let mut changed = false;
    for line in to_remove {
        if let Some(idx) = remaining.iter().position(|l| l == line) {
            remaining.remove(idx);
            changed = true;
        }
    }
    (remaining, changed)
}

/// Returns `true` if any `server=/<domain>/<ip>` line names `domain`.
#[must_use]
pub fn contains_domain(lines: &[String], domain: &str) -> bool {
    lines.iter().any(|line| {
        let mut fields = line.split('/');
        matches!((fields.next(), fields.next(), fields.next()), (Some(_), Some(d), Some(_)) if d == domain)
    })
}
