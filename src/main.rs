//! Command line front end for the modfs library.
//!
//! Opens a local archive, a remote archive over HTTP or a Go module version
//! from a proxy, then lists, prints or extracts paths from it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use modfs::cli::Action;
use modfs::vfs::{self, path};
use modfs::{
    Cli, FsView, HttpFs, HttpOptions, HttpRangeReader, LocalFileReader, ModFs, ReadAt, ReadFs,
    ZipFs,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    // Another provider may already be installed; either one will do.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut range_reader = None;
    let view = if let Some(proxy) = &cli.proxy {
        open_module(proxy, &cli).await?
    } else if cli.is_http_url() {
        let (view, reader) = open_remote(&cli).await?;
        range_reader = reader;
        view
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.source))?);
        ZipFs::with_options(reader, cli.index_options()).await?.into()
    };

    let view = match &cli.sub {
        Some(dir) => view.sub(&path::clean(dir))?,
        None => view,
    };

    let paths: Vec<String> = if cli.paths.is_empty() {
        vec![path::ROOT.to_string()]
    } else {
        cli.paths.iter().map(|p| path::clean(p)).collect()
    };

    match cli.action() {
        Action::List => list_files(&view, &paths, &cli)?,
        Action::Print => print_files(&view, &paths, &cli).await?,
        Action::Extract(dir) => extract_files(&view, &paths, dir, &cli).await?,
    }

    // Display network transfer statistics for HTTP sources
    if let Some(reader) = range_reader {
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default = if cli.is_very_quiet() || cli.pipe {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open an archive URL with Range requests, or stage the whole body in a
/// temporary file when the server cannot serve ranges.
async fn open_remote(cli: &Cli) -> Result<(FsView, Option<Arc<HttpRangeReader>>)> {
    let options = cli.http_options();
    match HttpRangeReader::with_options(cli.source.clone(), &options).await {
        Ok(reader) => {
            let reader = Arc::new(reader);
            let fs = ZipFs::with_options(reader.clone(), cli.index_options()).await?;
            Ok((fs.into(), Some(reader)))
        }
        Err(err) => {
            tracing::warn!(url = %cli.source, "range requests unavailable ({err:#}), downloading");
            let reader = Arc::new(download(&cli.source, &options).await?);
            let fs = ZipFs::with_options(reader, cli.index_options()).await?;
            Ok((fs.into(), None))
        }
    }
}

async fn download(url: &str, options: &HttpOptions) -> Result<LocalFileReader> {
    let mut response = options
        .client()?
        .get(url)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("downloading {url}"))?;

    let temp = tempfile::Builder::new()
        .prefix("modfs_")
        .suffix(".zip")
        .tempfile()?;
    let mut out = tokio::fs::File::from_std(temp.reopen()?);
    while let Some(chunk) = response.chunk().await? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;

    let reader = LocalFileReader::from_tempfile(temp)?;
    tracing::debug!(%url, bytes = reader.size(), "staged remote archive");
    Ok(reader)
}

async fn open_module(proxy: &str, cli: &Cli) -> Result<FsView> {
    let client = cli.http_options().client()?;
    let modfs = ModFs::new(HttpFs::new(client, proxy)?);

    let (module_path, version) = cli.module_spec();
    let module = modfs.open_module(module_path).await?;
    let version = match version {
        Some(v) => module.version(v).await?,
        None => module.version_latest().await?,
    };

    if !cli.is_quiet() {
        eprintln!("{}@{}", module.path(), version.info().version);
    }
    version.open_fs().await
}

/// List directories, or describe files, named on the command line.
fn list_files(view: &FsView, paths: &[String], cli: &Cli) -> Result<()> {
    for name in paths {
        let handle = view.open(name)?;
        if !handle.is_dir() {
            print_entry(name, handle.stat(), cli.verbose);
            continue;
        }

        if paths.len() > 1 {
            println!("{name}:");
        }
        let entries = if cli.recursive {
            vfs::walk(view, name)?
        } else {
            view.read_dir(name)?
                .into_iter()
                .map(|e| (path::join(name, e.name()), e))
                .collect()
        };
        for (full, entry) in entries {
            let shown = if cli.recursive {
                full.as_str()
            } else {
                entry.name()
            };
            print_entry(shown, entry.info(), cli.verbose);
        }
    }
    Ok(())
}

fn print_entry(name: &str, info: vfs::FileInfo, verbose: bool) {
    if verbose {
        println!("{}", info.renamed(name));
    } else if info.is_dir() {
        println!("{name}/");
    } else {
        println!("{name}");
    }
}

/// Write file contents to stdout; directories are expanded with `-r`.
async fn print_files(view: &FsView, paths: &[String], cli: &Cli) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    for name in paths {
        for file in files_below(view, name, cli.recursive)? {
            let data = view.read_file(&file).await?;
            stdout.write_all(&data).await?;
        }
    }
    stdout.flush().await?;
    Ok(())
}

/// Extract the named files, and whole directories, under `dir`.
async fn extract_files(view: &FsView, paths: &[String], dir: &Path, cli: &Cli) -> Result<()> {
    for name in paths {
        for file in files_below(view, name, true)? {
            let output = dir.join(&file);
            if output.exists() && !cli.overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {file} (use -o to overwrite)");
                }
                continue;
            }
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let data = view.read_file(&file).await?;
            tokio::fs::write(&output, &data)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            if !cli.is_quiet() {
                println!("  extracting: {file}");
            }
        }
    }
    Ok(())
}

/// `name` itself if it is a file, otherwise the files inside it.
fn files_below(view: &FsView, name: &str, recursive: bool) -> Result<Vec<String>> {
    let handle = view.open(name)?;
    if !handle.is_dir() {
        return Ok(vec![name.to_string()]);
    }
    let entries = if recursive {
        vfs::walk(view, name)?
    } else {
        view.read_dir(name)?
            .into_iter()
            .map(|e| (path::join(name, e.name()), e))
            .collect()
    };
    Ok(entries
        .into_iter()
        .filter(|(_, entry)| !entry.is_dir())
        .map(|(full, _)| full)
        .collect())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
