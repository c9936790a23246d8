//! Destination naming-conflict resolution.

use super::types::{RENAME_PROBE_LIMIT, TransferError};
use crate::fs::{Backend, BackendError};

/// How a directory unit landed at the destination.
pub(super) enum DirOutcome {
    /// A directory was created, under the returned (possibly suffixed) name.
    Created(String),
    /// A directory of the wanted name already existed; contents merge into it.
    Merged,
}

/// Builds the nth alternative for `name`.
///
/// Files keep their final extension segment (`a.txt` → `a_1.txt`); dotfiles
/// and directories get the suffix appended (`.env` → `.env_1`, `docs` →
/// `docs_1`).
pub(super) fn suffixed(name: &str, n: u32, split_extension: bool) -> String {
    if split_extension
        && !name.starts_with('.')
        && let Some((stem, ext)) = name.rsplit_once('.')
    {
        return format!("{}_{}.{}", stem, n, ext);
    }
    format!("{}_{}", name, n)
}

/// First collision-free destination name for a file, probed via `exists`.
pub(super) fn next_free_name(
    dest: &dyn Backend,
    dir: &str,
    name: &str,
) -> Result<String, TransferError> {
    if !dest.exists(&dest.join(&[dir, name])) {
        return Ok(name.to_string());
    }
    for n in 1..=RENAME_PROBE_LIMIT {
        let candidate = suffixed(name, n, true);
        if !dest.exists(&dest.join(&[dir, &candidate])) {
            return Ok(candidate);
        }
    }
    Err(TransferError::NameExhausted {
        path: dest.join(&[dir, name]),
    })
}

/// Ensures a directory for a unit named `name` exists under `parent`.
///
/// Missing destination: created with the wanted name. Existing directory:
/// reused as-is (merge). Existing non-directory: suffixed names are probed
/// by retrying `make_dir` until one succeeds.
pub(super) fn ensure_directory(
    dest: &dyn Backend,
    parent: &str,
    name: &str,
) -> Result<DirOutcome, TransferError> {
    let wanted = dest.join(&[parent, name]);
    match dest.stat(&wanted) {
        Err(BackendError::NotFound(_)) => match dest.make_dir(parent, name) {
            Ok(_) => Ok(DirOutcome::Created(name.to_string())),
            Err(e) => Err(TransferError::from(e).with_path(&wanted)),
        },
        Err(e) => Err(TransferError::from(e).with_path(&wanted)),
        Ok(existing) if existing.is_dir => Ok(DirOutcome::Merged),
        Ok(_) => {
            for n in 1..=RENAME_PROBE_LIMIT {
                let candidate = suffixed(name, n, false);
                match dest.make_dir(parent, &candidate) {
                    Ok(_) => return Ok(DirOutcome::Created(candidate)),
                    Err(BackendError::AlreadyExists(_)) => continue,
                    Err(e) => return Err(TransferError::from(e).with_path(&wanted)),
                }
            }
            Err(TransferError::NameExhausted { path: wanted })
        }
    }
}
