mod browser;
mod login;

use std::path::PathBuf;

use chs::{config, db::constants::ENV_FILE};
use login::CaptureOutcome;

#[derive(clap::Parser)]
struct Args {
    /// Run the browser without a visible window. The login UI sometimes
    /// behaves differently headless; visible is the default.
    #[arg(long)]
    headless: bool,

    /// Env file holding USERNAME and PASSWORD; BEARER_TOKEN is written
    /// back into the same file.
    #[arg(long, default_value = ENV_FILE)]
    env_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let creds = config::credentials(&args.env_file)?;

    match login::capture_token(&creds, &args.env_file, args.headless) {
        CaptureOutcome::Token(_) => {
            tracing::info!(target: "token", "\x1b[32mbearer token captured and saved\x1b[0m");
            Ok(())
        }
        CaptureOutcome::NoRequestObserved => {
            anyhow::bail!("login completed but no authenticated request was observed; no token captured")
        }
        CaptureOutcome::LoginTimeout => anyhow::bail!("login flow timed out"),
        CaptureOutcome::FlowUnrecognized => anyhow::bail!("login flow took an unrecognized shape"),
        CaptureOutcome::BrowserError(e) => Err(e.context("browser session failed")),
    }
}
