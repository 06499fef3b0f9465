use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

pub const TWITCH_API_URL: &str = "https://api.twitch.tv";
const ACCEPT: &str = "application/vnd.twitchtv.v3+json";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Bad response code: {status}")]
    BadResponse {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Could not decode stream of {streamer}: {source}")]
    Decode {
        streamer: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Offline,
    /// `game` is `None` when no category is set
    Live { game: Option<String> },
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    stream: Option<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(default)]
    game: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Client {
    client_id: String,
    oauth_token: String,
    url: String,
    client: reqwest::Client,
}

impl Client {
    pub fn new(client_id: String, oauth_token: String, url: String) -> Client {
        Client {
            client_id,
            oauth_token,
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn stream(&self, streamer: &str) -> Result<StreamStatus, FetchError> {
        let url = format!("{}/kraken/streams/{streamer}", self.url);
        trace!("GET {url}");
        let request_error = |source| FetchError::Request {
            url: url.clone(),
            source,
        };

        let res = self
            .client
            .get(&url)
            .header("Accept", ACCEPT)
            .header("Client-ID", &self.client_id)
            .header("Authorization", format!("OAuth {}", self.oauth_token))
            .send()
            .await
            .map_err(request_error)?;

        let status = res.status();
        let text = res.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(FetchError::BadResponse { status, body: text });
        }

        let data: StreamsResponse =
            serde_json::from_str(&text).map_err(|source| FetchError::Decode {
                streamer: streamer.to_owned(),
                source,
            })?;
        Ok(match data.stream {
            Some(stream) => StreamStatus::Live { game: stream.game },
            None => StreamStatus::Offline,
        })
    }
}
