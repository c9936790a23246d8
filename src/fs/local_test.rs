//! Tests for the local disk backend.

use super::*;
use std::fs;

#[test]
fn test_stat_and_exists() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello").unwrap();
    let backend = LocalFs::new("Local", dir.path());

    let d = backend.stat("a.txt").unwrap();
    assert_eq!(d.name, "a.txt");
    assert!(!d.is_dir);
    assert_eq!(d.length, 5);

    assert!(backend.exists("a.txt"));
    assert!(!backend.exists("b.txt"));
    assert!(matches!(
        backend.stat("b.txt"),
        Err(BackendError::NotFound(_))
    ));
}

#[test]
fn test_list() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("file.txt"), "x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let backend = LocalFs::new("Local", dir.path());

    let mut names: Vec<String> = backend.list("").unwrap().into_iter().map(|d| d.name).collect();
    names.sort();
    assert_eq!(names, vec!["file.txt", "sub"]);
}

#[test]
fn test_make_dir() {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalFs::new("Local", dir.path());

    assert_eq!(backend.make_dir("", "fresh").unwrap(), "fresh");
    assert!(backend.is_dir("fresh").unwrap());
    assert!(matches!(
        backend.make_dir("", "fresh"),
        Err(BackendError::AlreadyExists(_))
    ));
}

#[test]
fn test_cd_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "x").unwrap();
    let backend = LocalFs::new("Local", dir.path());

    assert_eq!(backend.cd("").unwrap(), "");
    assert!(backend.cd("a.txt").is_err());
    assert!(backend.cd("missing").is_err());
}

#[test]
fn test_stream_copy() {
    let src_dir = tempfile::tempdir().unwrap();
    let dst_dir = tempfile::tempdir().unwrap();
    // larger than one chunk so the loop runs more than once
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(src_dir.path().join("big.bin"), &payload).unwrap();

    let src = LocalFs::new("Source", src_dir.path());
    let dst = LocalFs::new("Dest", dst_dir.path());

    let stream = src.open_read_stream("", "big.bin").unwrap();
    assert_eq!(stream.total_size(), payload.len() as u64);

    let mut last = 0u64;
    let written = dst
        .write_stream("big.bin", stream, &mut |n| {
            assert!(n >= last);
            last = n;
        })
        .unwrap();
    assert_eq!(written, payload.len() as u64);
    assert_eq!(last, payload.len() as u64);
    assert_eq!(fs::read(dst_dir.path().join("big.bin")).unwrap(), payload);
}

#[test]
fn test_write_stream_failure_leaves_no_partial_file() {
    struct BrokenStream {
        yielded: bool,
    }
    impl ReadStream for BrokenStream {
        fn next_chunk(&mut self) -> Option<Result<Vec<u8>, BackendError>> {
            if self.yielded {
                Some(Err(BackendError::Io("boom".to_string())))
            } else {
                self.yielded = true;
                Some(Ok(vec![1, 2, 3]))
            }
        }
        fn total_size(&self) -> u64 {
            6
        }
        fn bytes_read(&self) -> u64 {
            3
        }
    }

    let dst_dir = tempfile::tempdir().unwrap();
    let dst = LocalFs::new("Dest", dst_dir.path());
    let result = dst.write_stream("out.bin", Box::new(BrokenStream { yielded: false }), &mut |_| {});
    assert!(result.is_err());
    assert!(!dst_dir.path().join("out.bin").exists());
}

#[cfg(unix)]
#[test]
fn test_symlink() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("real.txt"), "content").unwrap();
    let backend = LocalFs::new("Local", dir.path());

    backend.make_symlink("real.txt", "link.txt").unwrap();
    let d = backend.stat("link.txt").unwrap();
    assert!(d.is_symlink);
    assert_eq!(d.link_target.as_deref(), Some("real.txt"));
}

#[cfg(unix)]
#[test]
fn test_exists_detects_broken_symlink() {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalFs::new("Local", dir.path());

    backend.make_symlink("gone.txt", "dangling").unwrap();
    assert!(backend.exists("dangling"));
}

#[test]
fn test_join() {
    let backend = LocalFs::new("Local", "/tmp");
    assert_eq!(backend.join(&["a", "b", "c.txt"]), "a/b/c.txt");
    assert_eq!(backend.join(&["", "c.txt"]), "c.txt");
    assert_eq!(backend.join(&["a/b", "c"]), "a/b/c");
}
