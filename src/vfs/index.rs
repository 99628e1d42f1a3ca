//! Directory tree built from a flat list of archive records.
//!
//! Archives only list member paths; intermediate directories may or may not
//! have records of their own. The builder walks every record once, links it
//! into its parent (synthesizing missing ancestors on the way up) and then
//! freezes the result into path-keyed maps holding only parent-to-child
//! links.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::entry::{DirInfo, Entry, FileEntry};
use super::path::{self, ROOT};
use crate::zip::ZipFileEntry;

/// What to do when two records normalize to the same path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first record, drop the later ones
    #[default]
    FirstWins,
    /// Let each later record replace the earlier one
    LastWins,
}

/// Index construction settings
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    pub duplicates: DuplicatePolicy,
    /// Fail on the first dropped record instead of skipping it
    pub strict: bool,
}

impl IndexOptions {
    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Why a record did not make it into the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Absolute,
    OutsideRoot,
    /// Directory record carrying data
    MalformedDirectory,
    Duplicate,
    /// A file and a directory claim the same path
    Conflict,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Skip::Absolute => "absolute path",
            Skip::OutsideRoot => "path escapes the archive root",
            Skip::MalformedDirectory => "directory record with non-zero size",
            Skip::Duplicate => "duplicate path",
            Skip::Conflict => "file and directory share a path",
        })
    }
}

/// A directory together with its (unsorted) children.
#[derive(Debug)]
pub(crate) struct Directory {
    pub(crate) info: DirInfo,
    pub(crate) children: Vec<Entry>,
}

/// Immutable lookup structure shared by all views of one archive.
#[derive(Debug)]
pub(crate) struct Index {
    dirs: HashMap<String, Directory>,
    files: HashMap<String, Arc<FileEntry>>,
    skipped: usize,
}

impl Index {
    pub(crate) fn build(records: Vec<ZipFileEntry>, options: IndexOptions) -> Result<Index> {
        let mut builder = Builder::new(options.duplicates);

        for record in records {
            let name = record.file_name.clone();
            match builder.insert(record) {
                Ok(()) => {}
                Err(reason) if options.strict => bail!("{name}: {reason}"),
                Err(reason) => {
                    tracing::debug!(%name, %reason, "skipping archive record");
                    builder.skipped += 1;
                }
            }
        }

        Ok(builder.finish())
    }

    pub(crate) fn dir(&self, name: &str) -> Option<&Directory> {
        self.dirs.get(name)
    }

    pub(crate) fn file(&self, name: &str) -> Option<&Arc<FileEntry>> {
        self.files.get(name)
    }

    pub(crate) fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub(crate) fn file_count(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }
}

struct DirNode {
    name: String,
    modified: SystemTime,
    explicit: bool,
    children: Vec<String>,
}

struct Builder {
    now: SystemTime,
    policy: DuplicatePolicy,
    dirs: HashMap<String, DirNode>,
    files: HashMap<String, Arc<FileEntry>>,
    skipped: usize,
}

/// Normalize a raw record name into an index key and a directory flag.
///
/// `Ok(None)` marks a record naming the root itself, which carries nothing.
fn normalize(raw: &str) -> Result<Option<(String, bool)>, Skip> {
    let is_dir = raw.is_empty() || raw.ends_with('/');
    if raw.starts_with('/') {
        return Err(Skip::Absolute);
    }
    let name = path::clean(raw);
    if name == ROOT {
        return Ok(None);
    }
    if name == ".." || name.starts_with("../") {
        return Err(Skip::OutsideRoot);
    }
    Ok(Some((name, is_dir)))
}

impl Builder {
    fn new(policy: DuplicatePolicy) -> Self {
        let now = SystemTime::now();
        let root = DirNode {
            name: ROOT.to_string(),
            modified: now,
            explicit: true,
            children: Vec::new(),
        };
        Self {
            now,
            policy,
            dirs: HashMap::from([(ROOT.to_string(), root)]),
            files: HashMap::new(),
            skipped: 0,
        }
    }

    fn insert(&mut self, record: ZipFileEntry) -> Result<(), Skip> {
        let Some((name, is_dir)) = normalize(&record.file_name)? else {
            return Ok(());
        };
        let is_dir = is_dir || record.is_directory;

        if is_dir && record.uncompressed_size != 0 {
            return Err(Skip::MalformedDirectory);
        }

        // A file can never act as a parent directory.
        let mut ancestor = path::parent(&name);
        while ancestor != ROOT {
            if self.files.contains_key(ancestor) {
                return Err(Skip::Conflict);
            }
            ancestor = path::parent(ancestor);
        }

        if is_dir {
            if self.files.contains_key(&name) {
                return Err(Skip::Conflict);
            }
            if let Some(dir) = self.dirs.get_mut(&name) {
                // Already linked; an explicit record only contributes metadata.
                if dir.explicit && self.policy == DuplicatePolicy::FirstWins {
                    return Err(Skip::Duplicate);
                }
                dir.modified = record.modified();
                dir.explicit = true;
                return Ok(());
            }
            let node = DirNode {
                name: path::base(&name).to_string(),
                modified: record.modified(),
                explicit: true,
                children: Vec::new(),
            };
            self.dirs.insert(name.clone(), node);
        } else {
            if self.dirs.contains_key(&name) {
                return Err(Skip::Conflict);
            }
            if let Some(existing) = self.files.get_mut(&name) {
                return match self.policy {
                    DuplicatePolicy::FirstWins => Err(Skip::Duplicate),
                    DuplicatePolicy::LastWins => {
                        *existing = Arc::new(FileEntry::new(path::base(&name), record));
                        Ok(())
                    }
                };
            }
            let file = FileEntry::new(path::base(&name), record);
            self.files.insert(name.clone(), Arc::new(file));
        }

        self.link(name);
        Ok(())
    }

    /// Attach `child` to its parent, creating missing ancestors until an
    /// existing directory is reached.
    fn link(&mut self, mut child: String) {
        loop {
            let parent = path::parent(&child).to_string();
            if let Some(dir) = self.dirs.get_mut(&parent) {
                dir.children.push(child);
                return;
            }
            let node = DirNode {
                name: path::base(&parent).to_string(),
                modified: self.now,
                explicit: false,
                children: vec![child],
            };
            self.dirs.insert(parent.clone(), node);
            child = parent;
        }
    }

    fn entry(&self, name: &str) -> Option<Entry> {
        if let Some(file) = self.files.get(name) {
            return Some(Entry::File(Arc::clone(file)));
        }
        self.dirs.get(name).map(|dir| {
            Entry::Directory(DirInfo {
                name: dir.name.clone(),
                modified: dir.modified,
            })
        })
    }

    fn finish(self) -> Index {
        let dirs = self
            .dirs
            .iter()
            .map(|(name, node)| {
                let children = node
                    .children
                    .iter()
                    .filter_map(|child| self.entry(child))
                    .collect();
                let dir = Directory {
                    info: DirInfo {
                        name: node.name.clone(),
                        modified: node.modified,
                    },
                    children,
                };
                (name.clone(), dir)
            })
            .collect();

        Index {
            dirs,
            files: self.files,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::CompressionMethod;

    fn record(name: &str, size: u64) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: CompressionMethod::Stored,
            compressed_size: size,
            uncompressed_size: size,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0x21,
            is_directory: name.ends_with('/'),
            version_made_by: 0,
            external_attrs: 0,
            flags: 0,
            mtime_unix: None,
        }
    }

    fn build(names: &[(&str, u64)], options: IndexOptions) -> Index {
        let records = names.iter().map(|(n, s)| record(n, *s)).collect();
        Index::build(records, options).unwrap()
    }

    fn children(index: &Index, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = index
            .dir(dir)
            .unwrap()
            .children
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn synthesizes_missing_directories() {
        let index = build(&[("dir/file.txt", 2), ("dir/subdir/a.txt", 1)], IndexOptions::default());

        assert_eq!(children(&index, "."), ["dir"]);
        assert_eq!(children(&index, "dir"), ["file.txt", "subdir"]);
        assert_eq!(children(&index, "dir/subdir"), ["a.txt"]);
        assert_eq!(index.dir_count(), 3);
        assert_eq!(index.file_count(), 2);
        assert!(index.file("dir/subdir/a.txt").is_some());
    }

    #[test]
    fn explicit_directory_after_synthesis_keeps_children() {
        let index = build(&[("a/b.txt", 1), ("a/", 0), ("empty/", 0)], IndexOptions::default());
        assert_eq!(children(&index, "."), ["a", "empty"]);
        assert_eq!(children(&index, "a"), ["b.txt"]);
        assert!(children(&index, "empty").is_empty());
        // The explicit record's timestamp replaces the synthesized one.
        assert_eq!(
            index.dir("a").unwrap().info.modified,
            record("a/", 0).modified()
        );
    }

    #[test]
    fn drops_unsafe_and_malformed_records() {
        let index = build(
            &[
                ("/etc/passwd", 4),
                ("../escape.txt", 1),
                ("a/../../up.txt", 1),
                ("bad/", 3),
                ("./", 0),
                ("ok.txt", 1),
            ],
            IndexOptions::default(),
        );
        assert_eq!(children(&index, "."), ["ok.txt"]);
        assert_eq!(index.skipped(), 4);
        assert!(index.dir("bad").is_none());
    }

    #[test]
    fn normalizes_redundant_separators() {
        let index = build(&[("a//b/./c.txt", 1), ("a/b/c.txt", 2)], IndexOptions::default());
        assert_eq!(children(&index, "a/b"), ["c.txt"]);
        assert_eq!(index.file("a/b/c.txt").unwrap().uncompressed_size(), 1);
        assert_eq!(index.skipped(), 1);
    }

    #[test]
    fn duplicate_policy() {
        let names = [("x.txt", 1), ("x.txt", 5)];

        let first = build(&names, IndexOptions::default());
        assert_eq!(first.file("x.txt").unwrap().uncompressed_size(), 1);
        assert_eq!(children(&first, "."), ["x.txt"]);

        let last = build(&names, IndexOptions::default().duplicates(DuplicatePolicy::LastWins));
        assert_eq!(last.file("x.txt").unwrap().uncompressed_size(), 5);
        assert_eq!(children(&last, "."), ["x.txt"]);
        match &last.dir(".").unwrap().children[0] {
            Entry::File(file) => assert_eq!(file.uncompressed_size(), 5),
            Entry::Directory(_) => panic!("expected a file"),
        }
    }

    #[test]
    fn file_directory_conflicts() {
        let index = build(&[("a", 1), ("a/b.txt", 1), ("c/d.txt", 1), ("c", 1)], IndexOptions::default());
        assert_eq!(children(&index, "."), ["a", "c"]);
        assert!(index.file("a").is_some());
        assert!(index.dir("c").is_some());
        assert!(index.file("c").is_none());
        assert_eq!(index.skipped(), 2);
    }

    #[test]
    fn strict_mode_fails_on_first_bad_record() {
        let records = vec![record("ok.txt", 1), record("/abs", 1)];
        let err = Index::build(records, IndexOptions::default().strict(true)).unwrap_err();
        assert!(err.to_string().contains("/abs"));
    }

    #[test]
    fn empty_archive_has_root_only() {
        let index = build(&[], IndexOptions::default());
        assert_eq!(index.dir_count(), 1);
        assert!(children(&index, ".").is_empty());
    }
}
