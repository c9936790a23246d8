//! In-memory virtual filesystem backend.
//!
//! Backs the "virtual FS" panes of the host application and doubles as the
//! engine's test double: tests populate a tree, run a transfer, and assert
//! on the resulting node map without touching the disk.

use super::{Backend, BackendError, Descriptor, ReadStream};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
enum Node {
    Dir,
    File(Arc<Vec<u8>>),
    Symlink(String),
}

/// A backend whose whole tree lives in a node map keyed by normalized path.
pub struct MemoryFs {
    name: String,
    nodes: Mutex<HashMap<String, Node>>,
}

impl MemoryFs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a directory and any missing ancestors.
    pub fn add_dir(&self, path: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        let mut current = String::new();
        for part in norm(path).split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            nodes.entry(current.clone()).or_insert(Node::Dir);
        }
    }

    /// Creates a file (and missing parent directories) with the given bytes.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let key = norm(path);
        if let Some((parent, _)) = key.rsplit_once('/') {
            self.add_dir(parent);
        }
        self.nodes
            .lock()
            .unwrap()
            .insert(key, Node::File(Arc::new(content.to_vec())));
    }

    pub fn add_symlink(&self, path: &str, target: &str) {
        let key = norm(path);
        if let Some((parent, _)) = key.rsplit_once('/') {
            self.add_dir(parent);
        }
        self.nodes
            .lock()
            .unwrap()
            .insert(key, Node::Symlink(target.to_string()));
    }

    /// Returns a file's bytes, or None if the path is missing or not a file.
    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().unwrap().get(&norm(path)) {
            Some(Node::File(bytes)) => Some(bytes.as_ref().clone()),
            _ => None,
        }
    }

    /// Returns a symlink's target, or None.
    pub fn link_target(&self, path: &str) -> Option<String> {
        match self.nodes.lock().unwrap().get(&norm(path)) {
            Some(Node::Symlink(target)) => Some(target.clone()),
            _ => None,
        }
    }

    /// All stored paths, sorted. Handy for tree-shape assertions.
    pub fn paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self.nodes.lock().unwrap().keys().cloned().collect();
        out.sort();
        out
    }

    fn describe(key: &str, node: &Node) -> Descriptor {
        let name = key.rsplit('/').next().unwrap_or(key).to_string();
        match node {
            Node::Dir => Descriptor::directory(name),
            Node::File(bytes) => Descriptor::file(name, bytes.len() as u64),
            Node::Symlink(target) => Descriptor::symlink(name, target.clone()),
        }
    }
}

fn norm(path: &str) -> String {
    path.split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl Backend for MemoryFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self, path: &str) -> Result<bool, BackendError> {
        let key = norm(path);
        if key.is_empty() {
            return Ok(true); // the root
        }
        match self.nodes.lock().unwrap().get(&key) {
            Some(Node::Dir) => Ok(true),
            Some(_) => Ok(false),
            None => Err(BackendError::NotFound(key)),
        }
    }

    fn stat(&self, path: &str) -> Result<Descriptor, BackendError> {
        let key = norm(path);
        if key.is_empty() {
            return Ok(Descriptor::directory(""));
        }
        match self.nodes.lock().unwrap().get(&key) {
            Some(node) => Ok(Self::describe(&key, node)),
            None => Err(BackendError::NotFound(key)),
        }
    }

    fn exists(&self, path: &str) -> bool {
        let key = norm(path);
        key.is_empty() || self.nodes.lock().unwrap().contains_key(&key)
    }

    fn make_dir(&self, parent: &str, name: &str) -> Result<String, BackendError> {
        let parent_key = norm(parent);
        let key = if parent_key.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent_key, name)
        };
        let mut nodes = self.nodes.lock().unwrap();
        if !parent_key.is_empty() && !matches!(nodes.get(&parent_key), Some(Node::Dir)) {
            return Err(BackendError::NotFound(parent_key));
        }
        if nodes.contains_key(&key) {
            return Err(BackendError::AlreadyExists(key));
        }
        nodes.insert(key.clone(), Node::Dir);
        Ok(key)
    }

    fn make_symlink(&self, target: &str, link_path: &str) -> Result<(), BackendError> {
        let key = norm(link_path);
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.contains_key(&key) {
            return Err(BackendError::AlreadyExists(key));
        }
        nodes.insert(key, Node::Symlink(target.to_string()));
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<Descriptor>, BackendError> {
        let key = norm(path);
        let nodes = self.nodes.lock().unwrap();
        if !key.is_empty() && !matches!(nodes.get(&key), Some(Node::Dir)) {
            return Err(BackendError::NotFound(key));
        }
        let mut out = Vec::new();
        for (child, node) in nodes.iter() {
            let relative = if key.is_empty() {
                child.as_str()
            } else {
                match child.strip_prefix(&key) {
                    Some(rest) => match rest.strip_prefix('/') {
                        Some(rest) => rest,
                        None => continue,
                    },
                    None => continue,
                }
            };
            if !relative.is_empty() && !relative.contains('/') {
                out.push(Self::describe(child, node));
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn cd(&self, path: &str) -> Result<String, BackendError> {
        match self.is_dir(path) {
            Ok(true) => Ok(norm(path)),
            Ok(false) => Err(BackendError::Io(format!("Not a directory: {}", path))),
            Err(e) => Err(e),
        }
    }

    fn open_read_stream(&self, dir: &str, name: &str) -> Result<Box<dyn ReadStream>, BackendError> {
        let key = norm(&format!("{}/{}", dir, name));
        match self.nodes.lock().unwrap().get(&key) {
            Some(Node::File(bytes)) => Ok(Box::new(MemStream {
                bytes: Arc::clone(bytes),
                offset: 0,
            })),
            Some(_) => Err(BackendError::Io(format!("Not a file: {}", key))),
            None => Err(BackendError::NotFound(key)),
        }
    }

    fn write_stream(
        &self,
        dest: &str,
        mut stream: Box<dyn ReadStream>,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, BackendError> {
        let key = norm(dest);
        if let Some((parent, _)) = key.rsplit_once('/') {
            if !matches!(self.nodes.lock().unwrap().get(parent), Some(Node::Dir)) {
                return Err(BackendError::NotFound(parent.to_string()));
            }
        }
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next_chunk() {
            let chunk = chunk?; // nothing inserted yet, so no partial file
            buffer.extend_from_slice(&chunk);
            on_progress(buffer.len() as u64);
        }
        let written = buffer.len() as u64;
        self.nodes
            .lock()
            .unwrap()
            .insert(key, Node::File(Arc::new(buffer)));
        Ok(written)
    }

    fn join(&self, parts: &[&str]) -> String {
        norm(&parts.join("/"))
    }
}

struct MemStream {
    bytes: Arc<Vec<u8>>,
    offset: usize,
}

impl ReadStream for MemStream {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, BackendError>> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let end = (self.offset + CHUNK_SIZE).min(self.bytes.len());
        let chunk = self.bytes[self.offset..end].to_vec();
        self.offset = end;
        Some(Ok(chunk))
    }

    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn bytes_read(&self) -> u64 {
        self.offset as u64
    }
}
