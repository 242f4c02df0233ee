//! Main entry point for the rzim CLI application.
//!
//! This binary provides a command-line interface for inspecting ZIM archives
//! stored locally, split into parts, or served over HTTP.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use rzim::{Archive, Cli, DirEntry, HttpRangeReader, LocalFileReader, ReadAt};

/// Metadata keys shown by `-i`
const INFO_KEYS: &[&str] = &[
    "Title",
    "Description",
    "Language",
    "Creator",
    "Publisher",
    "Date",
];

/// Application entry point.
///
/// Parses command-line arguments, opens every part and dispatches to the
/// requested mode.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut parts: Vec<Arc<dyn ReadAt>> = Vec::new();
    let mut remote: Vec<Arc<HttpRangeReader>> = Vec::new();

    for part in &cli.parts {
        if Cli::is_http_url(part) {
            // Remote part via HTTP Range requests
            let reader = Arc::new(HttpRangeReader::new(part.clone()).await?);
            remote.push(reader.clone());
            parts.push(reader);
        } else if cli.parts.len() == 1 {
            // A single local path may name the first of several split parts
            for path in LocalFileReader::discover_parts(Path::new(part)) {
                let reader = LocalFileReader::new(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                parts.push(Arc::new(reader));
            }
        } else {
            let reader = LocalFileReader::new(Path::new(part))
                .with_context(|| format!("opening {}", part))?;
            parts.push(Arc::new(reader));
        }
    }

    let archive = Archive::open_with_options(parts, cli.archive_options()).await?;
    run(&archive, &cli).await?;

    // Display network transfer statistics for HTTP sources
    if !remote.is_empty() {
        let transferred: u64 = remote.iter().map(|r| r.transferred_bytes()).sum();
        eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
    }

    Ok(())
}

/// Dispatch to the mode selected on the command line.
///
/// Without any mode flag the header summary is shown.
async fn run(archive: &Archive, cli: &Cli) -> Result<()> {
    let namespace = cli.namespace().unwrap_or_else(|| archive.article_namespace());

    if let Some(path) = &cli.print {
        let Some(entry) = archive.get_dir_entry_by_path(path).await? else {
            bail!("No entry at {}", path);
        };
        let data = archive.read_binary_file(&entry).await?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    if let Some(key) = &cli.metadata {
        match archive.get_metadata(key).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => bail!("No metadata named {}", key),
        }
        return Ok(());
    }

    if let Some(prefix) = &cli.search {
        let hits = archive
            .find_dir_entries_with_prefix(prefix, namespace, cli.max_results)
            .await?;
        for entry in &hits {
            print_entry(entry);
        }
        if hits.is_empty() {
            eprintln!("No titles starting with {:?}", prefix);
        }
        return Ok(());
    }

    if cli.random {
        let entry = archive.get_random_dir_entry(namespace).await?;
        print_entry(&entry);
        return Ok(());
    }

    if cli.main_page {
        match archive.get_main_page_dir_entry().await? {
            Some(entry) => print_entry(&entry),
            None => bail!("Archive has no main page"),
        }
        return Ok(());
    }

    if cli.list {
        let range = archive.namespace_range(namespace).await?;
        for index in range {
            print_entry(&archive.dir_entry_by_index(index).await?);
        }
        return Ok(());
    }

    show_info(archive).await
}

/// Print one entry as `path  title  [mimetype | -> target]`.
fn print_entry(entry: &DirEntry) {
    let detail = match (&entry.mime_type, entry.redirect_target()) {
        (_, Some(target)) => format!("-> #{}", target),
        (Some(mime), None) => mime.to_string(),
        (None, None) => "-".to_string(),
    };
    println!("{}\t{}\t{}", entry.full_path(), entry.title_or_url(), detail);
}

/// Show header fields and common metadata.
async fn show_info(archive: &Archive) -> Result<()> {
    let header = archive.header();
    println!(
        "Version:    {}.{}",
        header.major_version, header.minor_version
    );
    println!("UUID:       {}", hex(&header.uuid));
    println!("Size:       {}", format_size(archive.size()));
    println!("Entries:    {}", archive.entry_count());
    println!("Clusters:   {}", archive.cluster_count());
    println!("Mimetypes:  {}", archive.mime_types().len());
    if let Some(sum) = archive.checksum().await? {
        println!("Checksum:   {}", hex(&sum));
    }
    if let Some(main) = archive.get_main_page_dir_entry().await? {
        println!("Main page:  {}", main.full_path());
    }

    for key in INFO_KEYS {
        if let Some(value) = archive.get_metadata(key).await? {
            println!("{:<11} {}", format!("{}:", key), String::from_utf8_lossy(&value));
        }
    }

    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
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
