mod import;

use std::path::{Path, PathBuf};

use chs::{db, snapshot};

#[derive(clap::Parser)]
struct Args {
    /// Path to a specific weekly_charts_*.json file.
    #[arg(long, conflicts_with = "all")]
    file: Option<PathBuf>,

    /// Process all snapshot files found in the data directory.
    #[arg(long)]
    all: bool,
}

fn report(path: &Path, count: usize) {
    let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    if count > 0 {
        tracing::info!(target: "ingest", "\x1b[36minserted {count} new entries from {name}\x1b[0m");
    } else {
        tracing::info!(target: "ingest", "no new entries inserted from {name} (already in database)");
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    if args.file.is_none() && !args.all {
        anyhow::bail!("pass --file <path> or --all");
    }

    let mut conn = db::open_default()?;
    tracing::info!(target: "ingest", "database initialized at {}", db::constants::DB_FILE);

    if let Some(file) = args.file {
        let count = import::import_snapshot(&mut conn, &file)?;
        report(&file, count);
        return Ok(());
    }

    let files = snapshot::list_all()?;
    if files.is_empty() {
        tracing::warn!(target: "ingest", "no weekly chart JSON files found");
        return Ok(());
    }

    tracing::info!(target: "ingest", "processing {} files ...", files.len());
    for file in files {
        // one broken file must not block the rest of the backlog
        match import::import_snapshot(&mut conn, &file) {
            Ok(count) => report(&file, count),
            Err(e) => tracing::error!(target: "ingest", "\x1b[31m{} skipped: {e}\x1b[0m", file.display()),
        }
    }

    Ok(())
}
