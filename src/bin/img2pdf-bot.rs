//! Bot binary for edgequake-img2pdf.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `BotConfig`, installs logging and runs the polling loop until
//! Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2pdf::{telegram, BotConfig};
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Token from the environment (or a .env file in the working directory)
  TELEGRAM_TOKEN=123456:ABC-DEF img2pdf-bot

  # Wait 3 s of silence before closing an album
  img2pdf-bot --album-window-ms 3000

  # Debug logging
  RUST_LOG=edgequake_img2pdf=debug img2pdf-bot

ENVIRONMENT VARIABLES:
  TELEGRAM_TOKEN            Bot API token from @BotFather (required)
  IMG2PDF_ALBUM_WINDOW_MS   Silence window before an album is converted (default 2000)
  RUST_LOG                  tracing filter, overrides -v / -q
"#;

/// Telegram bot that converts images and albums to PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "img2pdf-bot",
    version,
    about = "Telegram bot that converts images and albums to PDF files",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Telegram Bot API token.
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Silence window in milliseconds after the last album image.
    #[arg(long, env = "IMG2PDF_ALBUM_WINDOW_MS",
          value_parser = clap::value_parser!(u64).range(1..))]
    album_window_ms: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = BotConfig::builder().token_opt(cli.token);
    if let Some(ms) = cli.album_window_ms {
        builder = builder.album_window_ms(ms);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Refusing to start");
        }
    };

    // ── Run until Ctrl-C ─────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                on_signal.cancel();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    telegram::run(config, cancel)
        .await
        .context("Telegram bot stopped with an error")?;
    Ok(())
}
