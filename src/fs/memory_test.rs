//! Tests for the in-memory backend.

use super::*;

#[test]
fn test_add_and_stat() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("docs/readme.md", b"hello");

    let dir = fs.stat("docs").unwrap();
    assert!(dir.is_dir);
    assert_eq!(dir.name, "docs");

    let file = fs.stat("docs/readme.md").unwrap();
    assert!(!file.is_dir);
    assert_eq!(file.length, 5);

    assert!(matches!(fs.stat("missing"), Err(BackendError::NotFound(_))));
}

#[test]
fn test_exists_and_is_dir() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("a/b.txt", b"x");

    assert!(fs.exists(""));
    assert!(fs.exists("a"));
    assert!(fs.exists("a/b.txt"));
    assert!(!fs.exists("a/c.txt"));

    assert!(fs.is_dir("").unwrap());
    assert!(fs.is_dir("a").unwrap());
    assert!(!fs.is_dir("a/b.txt").unwrap());
    assert!(fs.is_dir("nope").is_err());
}

#[test]
fn test_list_is_nonrecursive_and_sorted() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("root/b.txt", b"b");
    fs.add_file("root/a.txt", b"a");
    fs.add_dir("root/sub");
    fs.add_file("root/sub/deep.txt", b"deep");

    let names: Vec<String> = fs
        .list("root")
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
}

#[test]
fn test_list_root() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("top.txt", b"t");
    fs.add_dir("dir");

    let names: Vec<String> = fs.list("").unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["dir", "top.txt"]);
}

#[test]
fn test_list_rejects_files() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("a.txt", b"x");
    assert!(fs.list("a.txt").is_err());
}

#[test]
fn test_make_dir() {
    let fs = MemoryFs::new("Virtual");
    fs.add_dir("parent");

    assert_eq!(fs.make_dir("parent", "child").unwrap(), "parent/child");
    assert!(fs.is_dir("parent/child").unwrap());

    // collision and missing parent both fail
    assert!(matches!(
        fs.make_dir("parent", "child"),
        Err(BackendError::AlreadyExists(_))
    ));
    assert!(matches!(
        fs.make_dir("missing", "child"),
        Err(BackendError::NotFound(_))
    ));
}

#[test]
fn test_symlink() {
    let fs = MemoryFs::new("Virtual");
    fs.make_symlink("target.txt", "link").unwrap();
    assert_eq!(fs.link_target("link"), Some("target.txt".to_string()));

    let d = fs.stat("link").unwrap();
    assert!(d.is_symlink);
    assert_eq!(d.link_target.as_deref(), Some("target.txt"));
}

#[test]
fn test_stream_round_trip() {
    let src = MemoryFs::new("Source");
    let dst = MemoryFs::new("Dest");
    src.add_file("dir/data.bin", &[7u8; 1000]);

    let stream = src.open_read_stream("dir", "data.bin").unwrap();
    assert_eq!(stream.total_size(), 1000);

    let mut reports = Vec::new();
    let written = dst
        .write_stream("copy.bin", stream, &mut |n| reports.push(n))
        .unwrap();
    assert_eq!(written, 1000);
    assert_eq!(dst.file_content("copy.bin").unwrap(), vec![7u8; 1000]);
    // cumulative byte counts, ending at the full size
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reports.last(), Some(&1000));
}

#[test]
fn test_write_stream_empty_file() {
    let src = MemoryFs::new("Source");
    let dst = MemoryFs::new("Dest");
    src.add_file("empty.txt", b"");

    let stream = src.open_read_stream("", "empty.txt").unwrap();
    let written = dst.write_stream("empty.txt", stream, &mut |_| {}).unwrap();
    assert_eq!(written, 0);
    assert_eq!(dst.file_content("empty.txt").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_write_stream_requires_parent() {
    let src = MemoryFs::new("Source");
    let dst = MemoryFs::new("Dest");
    src.add_file("a.txt", b"x");

    let stream = src.open_read_stream("", "a.txt").unwrap();
    let result = dst.write_stream("nodir/a.txt", stream, &mut |_| {});
    assert!(matches!(result, Err(BackendError::NotFound(_))));
    assert!(!dst.exists("nodir/a.txt"));
}

#[test]
fn test_join_normalizes() {
    let fs = MemoryFs::new("Virtual");
    assert_eq!(fs.join(&["a", "b/c", "d.txt"]), "a/b/c/d.txt");
    assert_eq!(fs.join(&["", "a.txt"]), "a.txt");
    assert_eq!(fs.join(&["a/", "/b"]), "a/b");
    assert_eq!(fs.join(&["", ""]), "");
}

#[test]
fn test_cd_checks_directory() {
    let fs = MemoryFs::new("Virtual");
    fs.add_file("dir/file.txt", b"x");
    assert_eq!(fs.cd("dir").unwrap(), "dir");
    assert!(fs.cd("dir/file.txt").is_err());
    assert!(fs.cd("missing").is_err());
}
