use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::HttpOptions;
use crate::vfs::{DuplicatePolicy, IndexOptions};

#[derive(Parser, Debug)]
#[command(name = "modfs")]
#[command(version)]
#[command(about = "Browse ZIP archives and Go module sources as read-only filesystems", long_about = None)]
#[command(after_help = "Examples:\n  \
  modfs data.zip                       list the top level of data.zip\n  \
  modfs -lr data.zip docs              list everything below docs/\n  \
  modfs -p data.zip docs/README.md     print one file\n  \
  modfs -d out https://example.com/archive.zip\n  \
  modfs --proxy https://proxy.golang.org golang.org/x/mod@v0.20.0")]
pub struct Cli {
    /// ZIP file path, HTTP URL, or module path (with --proxy)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Paths inside the archive (default: the root)
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// List directories (default action; takes precedence over -p and -d)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely: mode, size, modification time
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Recurse into subdirectories when listing or extracting
    #[arg(short = 'r')]
    pub recursive: bool,

    /// Print file contents to stdout
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into DIR
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Overwrite existing files when extracting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Re-root the view at this directory of the archive
    #[arg(long = "sub", value_name = "DIR")]
    pub sub: Option<String>,

    /// Treat SOURCE as a module path served by this Go module proxy
    #[arg(long = "proxy", value_name = "URL")]
    pub proxy: Option<String>,

    /// Fail on the first archive record that cannot be placed in the tree
    #[arg(long)]
    pub strict: bool,

    /// Keep the last of several records with the same path instead of the first
    #[arg(long = "last-wins")]
    pub last_wins: bool,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Retries per HTTP range read on connection errors
    #[arg(long = "max-retry", value_name = "N", default_value_t = 10)]
    pub max_retry: u32,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

/// What to do with the paths named on the command line
#[derive(Debug, PartialEq, Eq)]
pub enum Action<'a> {
    List,
    Print,
    Extract(&'a Path),
}

impl Cli {
    /// `-l` wins over `-p`, which wins over `-d`; listing is the default.
    pub fn action(&self) -> Action<'_> {
        if self.list {
            return Action::List;
        }
        if self.pipe {
            return Action::Print;
        }
        match &self.extract_dir {
            Some(dir) => Action::Extract(dir),
            None => Action::List,
        }
    }

    pub fn is_http_url(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn index_options(&self) -> IndexOptions {
        let policy = if self.last_wins {
            DuplicatePolicy::LastWins
        } else {
            DuplicatePolicy::FirstWins
        };
        IndexOptions::default().duplicates(policy).strict(self.strict)
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout),
            max_retry: self.max_retry,
        }
    }

    /// Split a module SOURCE into path and optional version.
    pub fn module_spec(&self) -> (&str, Option<&str>) {
        match self.source.rsplit_once('@') {
            Some((path, version)) => (path, Some(version)),
            None => (self.source.as_str(), None),
        }
    }
}
