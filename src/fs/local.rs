//! Local disk backend implementation.

use super::{Backend, BackendError, Descriptor, ReadStream};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read/write chunk size for streamed copies.
const CHUNK_SIZE: usize = 64 * 1024;

/// A backend rooted at a local filesystem directory.
///
/// Engine paths are "/"-separated strings relative to the root. For example
/// a root of `/Users/you/Downloads` with the engine path `photos/a.jpg`
/// resolves to `/Users/you/Downloads/photos/a.jpg`.
pub struct LocalFs {
    name: String,
    root: PathBuf,
}

impl LocalFs {
    /// Creates a new local backend with the given display name and root.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Resolves an engine path to an absolute path under the root.
    ///
    /// Empty paths and "." resolve to the root itself; a leading "/" is
    /// treated as relative to the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            self.root.clone()
        } else {
            let mut out = self.root.clone();
            for part in trimmed.split('/').filter(|p| !p.is_empty()) {
                out.push(part);
            }
            out
        }
    }

    fn describe(path: &Path, name: String) -> Result<Descriptor, BackendError> {
        // symlink_metadata so broken symlinks still stat as symlinks
        let meta = fs::symlink_metadata(path)?;
        let is_symlink = meta.file_type().is_symlink();
        let link_target = if is_symlink {
            fs::read_link(path)
                .ok()
                .map(|t| t.to_string_lossy().into_owned())
        } else {
            None
        };
        Ok(Descriptor {
            name,
            is_dir: meta.is_dir(),
            is_symlink,
            length: if meta.is_dir() { 0 } else { meta.len() },
            link_target,
            mode: mode_bits(&meta),
        })
    }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(_meta: &fs::Metadata) -> u32 {
    0
}

impl Backend for LocalFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self, path: &str) -> Result<bool, BackendError> {
        let meta = fs::symlink_metadata(self.resolve(path))?;
        Ok(meta.is_dir())
    }

    fn stat(&self, path: &str) -> Result<Descriptor, BackendError> {
        let abs = self.resolve(path);
        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::describe(&abs, name)
    }

    fn exists(&self, path: &str) -> bool {
        // symlink_metadata instead of exists() to detect broken symlinks
        fs::symlink_metadata(self.resolve(path)).is_ok()
    }

    fn make_dir(&self, parent: &str, name: &str) -> Result<String, BackendError> {
        let abs = self.resolve(parent).join(name);
        fs::create_dir(&abs)?;
        Ok(self.join(&[parent, name]))
    }

    #[cfg(unix)]
    fn make_symlink(&self, target: &str, link_path: &str) -> Result<(), BackendError> {
        std::os::unix::fs::symlink(target, self.resolve(link_path))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn make_symlink(&self, _target: &str, _link_path: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported)
    }

    fn list(&self, path: &str) -> Result<Vec<Descriptor>, BackendError> {
        let abs = self.resolve(path);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&abs)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::describe(&entry.path(), name)?);
        }
        Ok(entries)
    }

    fn cd(&self, path: &str) -> Result<String, BackendError> {
        let abs = self.resolve(path);
        let meta = fs::symlink_metadata(&abs)?;
        if !meta.is_dir() {
            return Err(BackendError::Io(format!(
                "Not a directory: {}",
                abs.display()
            )));
        }
        Ok(path.to_string())
    }

    fn open_read_stream(&self, dir: &str, name: &str) -> Result<Box<dyn ReadStream>, BackendError> {
        let abs = self.resolve(dir).join(name);
        let meta = fs::symlink_metadata(&abs)?;
        let file = File::open(&abs)?;
        Ok(Box::new(FileStream {
            file,
            total: meta.len(),
            read: 0,
        }))
    }

    fn write_stream(
        &self,
        dest: &str,
        mut stream: Box<dyn ReadStream>,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, BackendError> {
        let abs = self.resolve(dest);
        let mut file = File::create(&abs)?;
        let mut written = 0u64;
        loop {
            match stream.next_chunk() {
                Some(Ok(chunk)) => {
                    if let Err(e) = file.write_all(&chunk) {
                        drop(file);
                        let _ = fs::remove_file(&abs);
                        return Err(e.into());
                    }
                    written += chunk.len() as u64;
                    on_progress(written);
                }
                Some(Err(e)) => {
                    drop(file);
                    let _ = fs::remove_file(&abs);
                    return Err(e);
                }
                None => break,
            }
        }
        Ok(written)
    }

    fn join(&self, parts: &[&str]) -> String {
        let mut out = String::new();
        for part in parts.iter().flat_map(|p| p.split('/')) {
            if part.is_empty() || part == "." {
                continue;
            }
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(part);
        }
        out
    }
}

struct FileStream {
    file: File,
    total: u64,
    read: u64,
}

impl ReadStream for FileStream {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, BackendError>> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        match self.file.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                self.read += n as u64;
                Some(Ok(buf))
            }
            Err(e) => Some(Err(e.into())),
        }
    }

    fn total_size(&self) -> u64 {
        self.total
    }

    fn bytes_read(&self) -> u64 {
        self.read
    }
}
