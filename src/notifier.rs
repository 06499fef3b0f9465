use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const PUSHBULLET_URL: &str = "https://api.pushbullet.com";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Could not send push: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Push rejected with {status}: {body}")]
    BadResponse {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Delivers a one-line push message.
pub trait Notifier {
    fn notify(&self, title: &str, body: &str) -> impl Future<Output = Result<(), NotifyError>>;
}

#[derive(Debug, Clone)]
pub struct Pushbullet {
    access_token: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct Push<'a> {
    #[serde(rename = "type")]
    _type: &'a str,
    title: &'a str,
    body: &'a str,
}

impl Pushbullet {
    pub fn new(access_token: String, url: String) -> Pushbullet {
        Pushbullet {
            access_token,
            url,
            client: reqwest::Client::new(),
        }
    }
}

impl Notifier for Pushbullet {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        debug!("Sending notification: {title} - {body}");
        let res = self
            .client
            .post(format!("{}/v2/pushes", self.url))
            .header("Access-Token", &self.access_token)
            .json(&Push {
                _type: "note",
                title,
                body,
            })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(NotifyError::BadResponse {
                status: res.status(),
                body: res.text().await?,
            });
        }
        Ok(())
    }
}
