mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::{TempDir, tempdir};

fn archive() -> Result<(TempDir, PathBuf), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("sample.zip");
    fs::write(
        &path,
        common::build_zip(&[
            ("docs/guide/intro.md", b"# Intro\n"),
            ("docs/README.md", b"read me\n"),
            ("main.rs", b"fn main() {}\n"),
        ]),
    )?;
    Ok((dir, path))
}

#[test]
fn lists_root_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .arg(&zip)
        .assert()
        .success()
        .stdout("docs/\nmain.rs\n");
    Ok(())
}

#[test]
fn lists_recursively_inside_sub_view() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .args(["-l", "-r", "--sub", "docs"])
        .arg(&zip)
        .assert()
        .success()
        .stdout("README.md\nguide/\nguide/intro.md\n");
    Ok(())
}

#[test]
fn list_flag_overrides_print() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .args(["-l", "-p"])
        .arg(&zip)
        .arg("docs")
        .assert()
        .success()
        .stdout("README.md\nguide/\n");
    Ok(())
}

#[test]
fn verbose_listing_shows_modes() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .arg("-v")
        .arg(&zip)
        .arg("docs")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("dr-xr-xr-x")
                .and(predicate::str::contains("guide/"))
                .and(predicate::str::contains("README.md")),
        );
    Ok(())
}

#[test]
fn prints_file_contents() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .arg("-p")
        .arg(&zip)
        .arg("docs/guide/intro.md")
        .assert()
        .success()
        .stdout("# Intro\n");
    Ok(())
}

#[test]
fn extracts_tree_and_respects_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    let out = tempdir()?;

    Command::cargo_bin("modfs")?
        .arg("-d")
        .arg(out.path())
        .arg(&zip)
        .assert()
        .success()
        .stdout(predicate::str::contains("extracting: docs/guide/intro.md"));
    assert_eq!(fs::read(out.path().join("docs/README.md"))?, b"read me\n");
    assert_eq!(fs::read(out.path().join("main.rs"))?, b"fn main() {}\n");

    fs::write(out.path().join("main.rs"), b"local edit")?;
    Command::cargo_bin("modfs")?
        .arg("-d")
        .arg(out.path())
        .arg(&zip)
        .arg("main.rs")
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipping: main.rs"));
    assert_eq!(fs::read(out.path().join("main.rs"))?, b"local edit");

    Command::cargo_bin("modfs")?
        .args(["-o", "-q", "-d"])
        .arg(out.path())
        .arg(&zip)
        .arg("main.rs")
        .assert()
        .success();
    assert_eq!(fs::read(out.path().join("main.rs"))?, b"fn main() {}\n");
    Ok(())
}

#[test]
fn reports_missing_and_invalid_paths() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, zip) = archive()?;
    Command::cargo_bin("modfs")?
        .arg(&zip)
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("open nope: file does not exist"));

    Command::cargo_bin("modfs")?
        .arg("-p")
        .arg(&zip)
        .arg("../main.rs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument"));
    Ok(())
}
