use tracing::{debug, warn};

use crate::{
    notifier::Notifier,
    store::{model::ChangedAt, GameStore, StoreError},
};

pub const TITLE: &str = "Twitch Notify";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No record existed, one was created
    FirstSeen,
    Unchanged,
    Changed { previous: Option<String> },
}

pub fn message(streamer: &str, game: Option<&str>) -> String {
    match game {
        Some(game) => format!("{streamer} is now playing {game}."),
        None => format!("{streamer} is now streaming without a category."),
    }
}

/// Compares observed games against the store and notifies on transitions.
pub struct ChangeDetector<N> {
    store: GameStore,
    notifier: N,
    notify_on_first_seen: bool,
}

impl<N: Notifier> ChangeDetector<N> {
    pub fn new(store: GameStore, notifier: N, notify_on_first_seen: bool) -> ChangeDetector<N> {
        ChangeDetector {
            store,
            notifier,
            notify_on_first_seen,
        }
    }

    #[cfg(test)]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn process(
        &self,
        streamer: &str,
        observed: Option<&str>,
    ) -> Result<Outcome, StoreError> {
        self.process_at(streamer, observed, ChangedAt::now()).await
    }

    pub async fn process_at(
        &self,
        streamer: &str,
        observed: Option<&str>,
        now: ChangedAt,
    ) -> Result<Outcome, StoreError> {
        let Some(record) = self.store.get(streamer)? else {
            debug!("First observation of {streamer}: {observed:?}");
            self.store.upsert(streamer, observed, now)?;
            if self.notify_on_first_seen {
                self.send(streamer, observed).await;
            }
            return Ok(Outcome::FirstSeen);
        };

        if record.game.as_deref() == observed {
            return Ok(Outcome::Unchanged);
        }

        self.store.upsert(streamer, observed, now)?;
        self.send(streamer, observed).await;
        Ok(Outcome::Changed {
            previous: record.game,
        })
    }

    async fn send(&self, streamer: &str, game: Option<&str>) {
        if let Err(err) = self
            .notifier
            .notify(TITLE, &message(streamer, game))
            .await
        {
            warn!("Notification for {streamer} failed: {err}");
        }
    }
}
