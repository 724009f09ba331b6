use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{redirect::Policy, Client, ClientBuilder, StatusCode};
use tracing::info;

use crate::error::{Error, Result};
use crate::generator::{form_pairs, Payload};

pub const FORM_URL_PATTERN: &str = r"^https://docs\.google\.com/forms/d/e/[A-Za-z0-9_-]{56}/formResponse";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.5615.50 Safari/537.36";

/// Reject anything that is not a form response endpoint, before any network access.
pub fn validate_url(url: &str) -> Result<()> {
    let pattern = Regex::new(FORM_URL_PATTERN).map_err(|e| Error::Parse(e.to_string()))?;
    if pattern.is_match(url) {
        Ok(())
    } else {
        Err(Error::InvalidUrl {
            url: url.to_string(),
            pattern: FORM_URL_PATTERN,
        })
    }
}

/// Sends one response to a form.
#[async_trait]
pub trait Submit: Send + Sync {
    /// HTTP status of the response. `Err` only when no response arrived.
    async fn submit(&self, payload: &Payload) -> Result<u16>;
}

#[derive(Debug, Clone)]
pub struct FormClient {
    client: Client,
    url: String,
}

impl FormClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        validate_url(url)?;
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(5))
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// Download the form page the schema is scraped from.
    pub async fn fetch_page(&self) -> Result<String> {
        info!(url = %self.url, "fetching form");
        let resp = self.client.get(&self.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(Error::Fetch(resp.status().as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl Submit for FormClient {
    async fn submit(&self, payload: &Payload) -> Result<u16> {
        let resp = self
            .client
            .post(&self.url)
            .form(&form_pairs(payload))
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }
}
