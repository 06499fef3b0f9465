use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    detector::{ChangeDetector, Outcome},
    notifier::Notifier,
    store::StoreError,
    twitch::{self, FetchError, StreamStatus},
};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Bad response code {status} for {streamer}, check {}", .saved_to.display())]
    BadResponse {
        streamer: String,
        status: reqwest::StatusCode,
        saved_to: PathBuf,
    },
    #[error("Could not save bad response to {}: {source}", .path.display())]
    SaveBadResponse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub offline: usize,
    pub first_seen: usize,
    pub unchanged: usize,
    pub changed: usize,
}

/// Checks every streamer once, in order. The first bad API response aborts
/// the run after its body is written to `bad_response_path`.
pub async fn run<N: Notifier>(
    streamers: &[String],
    client: &twitch::Client,
    detector: &ChangeDetector<N>,
    bad_response_path: &Path,
) -> Result<RunSummary, PollError> {
    let mut summary = RunSummary::default();

    for streamer in streamers {
        let game = match client.stream(streamer).await {
            Ok(StreamStatus::Live { game }) => game,
            Ok(StreamStatus::Offline) => {
                debug!("{streamer} is offline");
                summary.offline += 1;
                continue;
            }
            Err(FetchError::BadResponse { status, body }) => {
                fs::write(bad_response_path, body)
                    .await
                    .map_err(|source| PollError::SaveBadResponse {
                        path: bad_response_path.to_owned(),
                        source,
                    })?;
                warn!(
                    "Bad response code: {status}. Check {}",
                    bad_response_path.display()
                );
                return Err(PollError::BadResponse {
                    streamer: streamer.clone(),
                    status,
                    saved_to: bad_response_path.to_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        match detector.process(streamer, game.as_deref()).await? {
            Outcome::FirstSeen => summary.first_seen += 1,
            Outcome::Unchanged => summary.unchanged += 1,
            Outcome::Changed { previous } => {
                info!("{streamer} changed from {previous:?} to {game:?}");
                summary.changed += 1
            }
        }
    }

    Ok(summary)
}
