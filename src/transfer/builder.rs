//! Transfer record builder.
//!
//! Expands the top-level descriptors of a session into the flat unit list
//! the scheduler works through, preserving each unit's path relative to the
//! transfer root. Directories are walked through the source backend
//! (`cd` + `list`) with an explicit work stack, so pathological tree depth
//! cannot overflow the call stack.
//!
//! Listing failures are a partial-failure case: the affected directory's
//! unit is recorded as errored, its subtree is skipped, and siblings keep
//! being processed. The builder itself never fails.

use super::types::{TransferError, TransferUnit, UnitStatus};
use crate::fs::{Backend, Descriptor};

enum Work {
    /// Entries of one directory level, files to emit before directories.
    Entries {
        sub_directory: String,
        entries: Vec<Descriptor>,
    },
    /// A directory to emit and then descend into.
    Directory {
        sub_directory: String,
        descriptor: Descriptor,
    },
}

/// Builds the unit list for `descriptors` found at `root_path` on `source`.
///
/// Returned order is traversal order: per directory, files first, then each
/// subdirectory followed by its own subtree. Root-level units start ready.
pub(super) fn build_unit_list(
    source: &dyn Backend,
    root_path: &str,
    descriptors: Vec<Descriptor>,
) -> Vec<TransferUnit> {
    let mut units = Vec::new();
    let mut stack = vec![Work::Entries {
        sub_directory: String::new(),
        entries: descriptors,
    }];

    while let Some(work) = stack.pop() {
        match work {
            Work::Entries {
                sub_directory,
                entries,
            } => {
                let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|d| d.is_dir);
                for descriptor in files {
                    units.push(TransferUnit::new(descriptor, sub_directory.clone()));
                }
                // Reversed so the first directory's subtree is expanded first.
                for descriptor in dirs.into_iter().rev() {
                    stack.push(Work::Directory {
                        sub_directory: sub_directory.clone(),
                        descriptor,
                    });
                }
            }
            Work::Directory {
                sub_directory,
                descriptor,
            } => {
                let mut unit = TransferUnit::new(descriptor, sub_directory);
                let child_sub = unit.source_key();
                let dir_path = source.join(&[root_path, &child_sub]);
                match source.cd(&dir_path).and_then(|resolved| source.list(&resolved)) {
                    Ok(entries) => {
                        units.push(unit);
                        stack.push(Work::Entries {
                            sub_directory: child_sub,
                            entries,
                        });
                    }
                    Err(e) => {
                        log::warn!("build_unit_list: cannot list {}: {}", dir_path, e);
                        unit.status = UnitStatus::Error;
                        unit.error = Some(TransferError::from(e).with_path(&dir_path));
                        units.push(unit);
                    }
                }
            }
        }
    }

    units
}
