use std::time::Duration;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_REGION: &str = "GLOBAL";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Replaces every run of whitespace in a community name with a single underscore.
///
/// A single leading `r/` is dropped. Other characters Reddit rejects are passed through
/// untouched.
pub fn normalize_subreddit(raw: &str) -> String {
    let name = raw.strip_prefix("r/").unwrap_or(raw);
    WHITESPACE.replace_all(name, "_").into_owned()
}

/// Full URL of a post's comment thread on `base_url`.
pub fn thread_url(base_url: &str, permalink: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), permalink)
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("reddit: request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("reddit: api error {status}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    HttpStatus { status: u16, reason: Option<String> },
    #[error("reddit: decode listing: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("reddit: invalid listing url: {0}")]
    Url(#[from] url::ParseError),
}

impl ListingError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ListingError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human readable reason reported by the server, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ListingError::HttpStatus { reason, .. } => {
                reason.as_deref().filter(|r| !r.trim().is_empty())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            base_url: None,
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOptions {
    pub limit: u32,
    pub region: String,
    pub after: Option<String>,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            limit: 15,
            region: DEFAULT_REGION.to_string(),
            after: None,
        }
    }
}

impl ListingOptions {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = vec![("limit".to_string(), self.limit.to_string())];
        if !self.region.is_empty() {
            params.push(("g".into(), self.region));
        }
        if let Some(after) = self.after {
            params.push(("after".into(), after));
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Hot,
    New,
    Top,
    Controversial,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Hot,
        Category::New,
        Category::Top,
        Category::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hot => "hot",
            Category::New => "new",
            Category::Top => "top",
            Category::Controversial => "controversial",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Hot => "Hot",
            Category::New => "New",
            Category::Top => "Top",
            Category::Controversial => "Controversial",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(key.trim()))
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("reddit client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn listing_url(
        &self,
        community: &str,
        category: Category,
        opts: ListingOptions,
    ) -> Result<Url, ListingError> {
        let path = format!("/r/{}/{}.json", community, category.as_str());
        let mut url = self.base_url.join(&path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in opts.into_params() {
                pairs.append_pair(&k, &v);
            }
        }
        Ok(url)
    }

    pub fn subreddit_listing(
        &self,
        community: &str,
        category: Category,
        opts: ListingOptions,
    ) -> Result<Listing<Post>, ListingError> {
        let url = self.listing_url(community, category, opts)?;
        tracing::debug!(%url, "fetching listing");
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .send()
            .map_err(ListingError::Transport)?;
        let resp = check_status(resp)?;
        let body = resp.text().map_err(ListingError::Transport)?;
        let listing: ListingEnvelope<Post> =
            serde_json::from_str(&body).map_err(ListingError::Decode)?;
        Ok(listing.data)
    }
}

fn check_status(resp: Response) -> Result<Response, ListingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(ListingError::HttpStatus {
        status: status.as_u16(),
        reason: error_reason(status, &body),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn error_reason(status: StatusCode, body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|payload| payload.message)
        .filter(|message| !message.trim().is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub downs: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub spoiler: bool,
    #[serde(default)]
    pub post_hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListingEnvelope<T> {
    #[serde(default)]
    kind: String,
    data: Listing<T>,
}
