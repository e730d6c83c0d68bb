use std::time::Duration;

use {
    tracing::{debug, info},
    tryon_config::{ExtractorConfig, Locator},
    url::Url,
};

use crate::{
    error::{ExtractError, Result},
    extract::{CandidateImage, extract_candidates},
};

/// A downloaded page, keyed by the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

impl Page {
    pub fn candidates(&self, locators: &[Locator]) -> Vec<CandidateImage> {
        extract_candidates(&self.html, &self.url, locators)
    }
}

/// Downloads shop pages over HTTP(S).
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    locators: Vec<Locator>,
}

impl PageFetcher {
    pub fn new(timeout: Duration, user_agent: &str, locators: Vec<Locator>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, locators })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Self::new(
            config.timeout(),
            &config.user_agent,
            config.locators.clone(),
        )
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    pub async fn fetch(&self, url: &str) -> Result<Page> {
        let parsed = Url::parse(url).map_err(|source| ExtractError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {},
            s => return Err(ExtractError::UnsupportedScheme(s.to_string())),
        }

        debug!(url = %parsed, "fetching page");
        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        let final_url = resp.url().clone();
        if !status.is_success() {
            return Err(ExtractError::Status {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }
        let html = resp.text().await?;
        info!(url = %final_url, bytes = html.len(), "page fetched");
        Ok(Page {
            url: final_url,
            html,
        })
    }

    /// Fetch `url` and run the locator table over it.
    pub async fn extract(&self, url: &str) -> Result<Vec<CandidateImage>> {
        let page = self.fetch(url).await?;
        Ok(page.candidates(&self.locators))
    }
}
