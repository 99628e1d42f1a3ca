mod common;

use common::{TestServer, build_zip};
use modfs::{ErrorKind, HttpFs, HttpRangeReader, ReadAt, ReadFs, ZipFs};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

fn routes(entries: &[(&str, &[u8])]) -> HashMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(path, body)| (path.to_string(), body.to_vec()))
        .collect()
}

#[tokio::test]
async fn reads_resources_below_base() {
    let server = TestServer::start(routes(&[("/base/dir/hello.txt", b"hello world")]), false).await;
    let fs = HttpFs::new(Client::new(), &server.url("/base")).unwrap();

    let mut file = fs.open("dir/hello.txt").await.unwrap();
    let info = file.stat();
    assert_eq!(info.name(), "hello.txt");
    assert_eq!(info.size(), 11);
    assert_eq!(info.mode(), 0o444);
    assert!(!info.is_dir());

    let mut buf = [0u8; 5];
    let n = file.read(&mut buf).await.unwrap();
    assert!(n > 0);
    let mut rest = file.read_to_end().await.unwrap();
    let mut all = buf[..n].to_vec();
    all.append(&mut rest);
    assert_eq!(all, b"hello world");

    file.close();
    file.close();
    let err = file.read(&mut buf).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Closed));

    assert_eq!(fs.read_file("dir/hello.txt").await.unwrap(), b"hello world");
}

#[tokio::test]
async fn maps_statuses_and_paths_to_errors() {
    let server = TestServer::start(routes(&[("/a.txt", b"a")]), false).await;
    let fs = HttpFs::new(Client::new(), &server.url("/")).unwrap();

    let err = fs.open("missing.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.path, "missing.txt");

    let err = fs.open(".").await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::PermissionDenied));

    for bad in ["../a.txt", "/a.txt", ""] {
        let err = fs.open(bad).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidPath), "{bad}");
    }
}

#[tokio::test]
async fn range_reader_serves_zip_index() {
    let archive = build_zip(&[("pkg/lib.rs", b"pub fn f() {}"), ("README", b"readme")]);
    let size = archive.len() as u64;
    let server = TestServer::start(routes(&[("/a.zip", &archive)]), true).await;

    let reader = Arc::new(HttpRangeReader::new(server.url("/a.zip")).await.unwrap());
    assert_eq!(reader.size(), size);

    let fs = ZipFs::new(reader.clone()).await.unwrap();
    assert_eq!(fs.read_file("pkg/lib.rs").await.unwrap(), b"pub fn f() {}");
    assert!(reader.transferred_bytes() > 0);

    let mut tail = [0u8; 4];
    assert_eq!(reader.read_at(size, &mut tail).await.unwrap(), 0);
}

#[tokio::test]
async fn range_reader_requires_range_support() {
    let server = TestServer::start(routes(&[("/a.zip", b"PK")]), false).await;
    assert!(HttpRangeReader::new(server.url("/a.zip")).await.is_err());
    assert!(HttpRangeReader::new(server.url("/missing.zip")).await.is_err());
}
