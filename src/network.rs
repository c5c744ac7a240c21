use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};

use crate::error::TransportError;

/// Transport used by [`crate::RecipeService`] to issue GET requests.
///
/// Implementations return the raw response body; decoding happens in the
/// caller. Tests substitute their own implementation.
#[async_trait]
pub trait NetworkService: Send + Sync {
    async fn request(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

pub struct ReqwestNetworkService {
    client: Client,
}

impl ReqwestNetworkService {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let timeout = timeout.unwrap_or(Duration::from_secs(30));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reciplease/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl NetworkService for ReqwestNetworkService {
    /// Errors never carry the request URL, since its query holds the API key
    async fn request(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(reqwest::Error::without_url)?;
        debug!("{} responded with {}", url.path(), response.status());

        let body = response.bytes().await.map_err(reqwest::Error::without_url)?;
        Ok(body.to_vec())
    }
}
