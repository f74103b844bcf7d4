mod charts;

use std::path::PathBuf;

use chrono::NaiveDate;

use chs::{config, db::constants::ENV_FILE, model, snapshot};

#[derive(clap::Parser)]
struct Args {
    /// Week-ending date (YYYY-MM-DD, a Thursday). Defaults to the most
    /// recent Thursday.
    week: Option<String>,

    /// Env file the bearer token was saved to.
    #[arg(long, default_value = ENV_FILE)]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let week_id = args
        .week
        .unwrap_or_else(|| model::latest_thursday().format("%Y-%m-%d").to_string());

    match NaiveDate::parse_from_str(&week_id, "%Y-%m-%d") {
        Ok(date) if !model::is_thursday(date) => {
            tracing::warn!(target: "fetch", "{week_id} is not a Thursday, the endpoint will likely 404 every market");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(target: "fetch", "week {week_id:?} does not parse as a date: {e}"),
    }

    // fail fast before any request goes out
    let token = config::bearer_token(&args.env_file)?;

    tracing::info!(target: "fetch", "fetching charts for week ending {week_id}");

    let client = charts::ChartsClient::new(charts::API_BASE)?;
    let (records, status) = client.fetch_week(&week_id, &token).await?;

    if records.is_empty() {
        anyhow::bail!("no chart records fetched for week {week_id}, nothing to write");
    }

    let path = snapshot::write(&week_id, &records)?;
    tracing::info!(
        target: "fetch",
        "\x1b[36msaved {} records to {}\x1b[0m",
        records.len(),
        path.display(),
    );

    if status == charts::FetchStatus::Unauthorized {
        return Err(chs::Error::Unauthorized.into());
    }
    Ok(())
}
