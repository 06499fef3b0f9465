use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::format::{Compact, DefaultFields};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ConfigError;
use crate::detector::ChangeDetector;
use crate::notifier::{Notifier, Pushbullet};
use crate::poll::PollError;
use crate::store::GameStore;

mod config;
mod detector;
mod notifier;
mod poll;
mod store;
#[cfg(test)]
mod testing;
mod twitch;

const SUCCESS_EXIT: u8 = 0;
const CONFIG_EXIT: u8 = 2;
const API_EXIT: u8 = 3;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
    /// Config file
    #[arg(short, long, default_value_t = String::from("config.cfg"))]
    config: String,
    /// Database of last known games
    #[arg(short, long, default_value_t = String::from("games.db"))]
    database: String,
    /// Log file
    #[arg(short, long, default_value_t = String::from("log.txt"))]
    log_file: String,
    /// Where the body of a failed Twitch response is saved
    #[arg(long, default_value_t = String::from("bad_response.json"))]
    bad_response: String,
    /// Send a test push before checking streams
    #[arg(long, default_value_t = false)]
    test_push: bool,
    /// Twitch API address
    #[arg(long, default_value_t = String::from(twitch::TWITCH_API_URL))]
    api_url: String,
    /// Pushbullet API address
    #[arg(long, default_value_t = String::from(notifier::PUSHBULLET_URL))]
    push_url: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every configured streamer once (default)
    Check,
    /// Print the last known game of every streamer
    Records,
}

fn get_layer<S>(
    layer: tracing_subscriber::fmt::Layer<S>,
) -> tracing_subscriber::fmt::Layer<
    S,
    DefaultFields,
    tracing_subscriber::fmt::format::Format<Compact, ChronoLocal>,
> {
    layer
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_owned()))
        .compact()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_level = std::env::var("LOG").unwrap_or("debug".to_owned());
    let file_appender = tracing_appender::rolling::never(".", &args.log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::new(format!("game_change_notifier={log_level}")))
        .with(get_layer(tracing_subscriber::fmt::layer()))
        .with(
            get_layer(tracing_subscriber::fmt::layer())
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    let started = Instant::now();
    let res = match args.command {
        Some(Command::Records) => records(&args),
        Some(Command::Check) | None => check(&args).await,
    };
    if let Err(err) = &res {
        error!("{err:#}");
    }
    debug!(
        "The run took {:.2} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(ExitCode::from(res?))
}

/// Runs one pass and returns the process exit code. Errors without a
/// dedicated code are returned and end up as exit code 1.
async fn check(args: &Args) -> Result<u8> {
    let config = match config::load_or_bootstrap(Path::new(&args.config)).await {
        Ok(config) => config,
        // already reported while writing the template
        Err(ConfigError::Missing(_)) => return Ok(CONFIG_EXIT),
        Err(err) => {
            warn!("{err}");
            return Ok(CONFIG_EXIT);
        }
    };

    let store = GameStore::new(&args.database);
    store
        .ensure_initialized()
        .context("Initializing database")?;

    let pushbullet = Pushbullet::new(config.api_key.clone(), args.push_url.clone());
    if args.test_push {
        if let Err(err) = pushbullet.notify("Test", "This is a debug message.").await {
            warn!("Test push failed: {err}");
        }
    }

    let client = twitch::Client::new(
        config.client_id.clone(),
        config.oauth_token.clone(),
        args.api_url.clone(),
    );
    let detector = ChangeDetector::new(store, pushbullet, config.notify_on_first_seen);

    match poll::run(
        &config.streamers,
        &client,
        &detector,
        Path::new(&args.bad_response),
    )
    .await
    {
        Ok(summary) => {
            info!(
                "Checked {} streamers: {} changed, {} unchanged, {} new, {} offline",
                config.streamers.len(),
                summary.changed,
                summary.unchanged,
                summary.first_seen,
                summary.offline
            );
            Ok(SUCCESS_EXIT)
        }
        Err(PollError::BadResponse { .. }) => Ok(API_EXIT),
        Err(err) => Err(err).context("Checking streams"),
    }
}

fn records(args: &Args) -> Result<u8> {
    let store = GameStore::new(&args.database);
    store
        .ensure_initialized()
        .context("Initializing database")?;

    for record in store.records().context("Reading records")? {
        println!(
            "{}\t{}\t{}",
            record.streamer,
            record.game.as_deref().unwrap_or("-"),
            record
                .last_changed
                .map(|x| x.to_string())
                .unwrap_or_else(|| "-".to_owned())
        );
    }
    Ok(SUCCESS_EXIT)
}
