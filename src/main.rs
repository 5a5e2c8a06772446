use std::path::PathBuf;

mod config;
mod db;
mod delivery;
mod error;
mod feed;
mod logging;
mod models;
mod relay;
mod sync;

#[cfg(test)]
mod test_support;

use config::Config;
use db::{MemoryStore, PostStore, Repository};
use delivery::TelegramClient;
use error::{AppError, Result};
use feed::HttpRenderer;
use relay::Relay;

/// `db_path` value selecting the in-memory store.
const MEMORY_STORE: &str = "memory";

const USAGE: &str = "usage: feed-relay [--sync | --deliver] [--force] [--config <path>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Update,
    SyncOnly,
    DeliverOnly,
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    mode: Mode,
    force: bool,
    config_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        mode: Mode::Update,
        force: false,
        config_path: None,
    };

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--sync" => options.mode = Mode::SyncOnly,
            "--deliver" => options.mode = Mode::DeliverOnly,
            "--force" => options.force = true,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| AppError::Config(format!("--config needs a path\n{}", USAGE)))?;
                options.config_path = Some(PathBuf::from(path));
            }
            other => {
                return Err(AppError::Config(format!("unknown argument {}\n{}", other, USAGE)));
            }
        }
    }

    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;

    let config = Config::load(options.config_path.as_deref())?;
    logging::init(&config)?;

    let credentials = config
        .credentials()
        .map(|(login, password)| (login.to_string(), password.to_string()));
    let renderer = HttpRenderer::new(&config.base_url, credentials)?;
    let channel = match config.telegram_credentials() {
        Ok((token, _)) => Some(TelegramClient::new(&config.telegram_api_url, token)?),
        Err(_) => None,
    };

    if config.db_path == MEMORY_STORE {
        tracing::warn!("Using the in-memory store, history is lost on exit");
        let relay = Relay::new(config, MemoryStore::new(), renderer, channel)?;
        execute(relay, &options).await
    } else {
        let store = Repository::new(&config.db_path).await?;
        let relay = Relay::new(config, store, renderer, channel)?;
        execute(relay, &options).await
    }
}

async fn execute<S: PostStore>(
    mut relay: Relay<S, HttpRenderer, TelegramClient>,
    options: &Options,
) -> Result<()> {
    match options.mode {
        Mode::Update => match relay.update(options.force).await? {
            Some(report) => println!(
                "Synced {} new posts, sent {}, failed {}",
                report.sync.new_posts.len(),
                report.delivery.sent.len(),
                report.delivery.failed.len()
            ),
            None => println!("Skipped: updated too recently (use --force)"),
        },
        Mode::SyncOnly => {
            let report = relay.sync().await?;
            println!("Synced {} new posts", report.new_posts.len());
        }
        Mode::DeliverOnly => {
            let report = relay.deliver().await?;
            println!(
                "Sent {} posts, failed {}",
                report.sent.len(),
                report.failed.len()
            );
        }
    }

    Ok(())
}
