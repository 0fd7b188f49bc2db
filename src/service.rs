use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

/// Page size used when none is given on the command line.
pub const DEFAULT_PER_PAGE: u32 = 14;

/// Path of the listing collection, relative to the API base URL.
const LISTING_PATH: &str = "contributions/";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end_time: DateTime<Utc>,
    pub owner: String,
}

impl Contribution {
    pub fn status_at(&self, now: DateTime<Utc>) -> ContributionStatus {
        ContributionStatus::classify(now, self.start_time, self.end_time)
    }
}

/// Accepts RFC 3339 timestamps, or naive ISO 8601 datetimes which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&chrono::Local)
        .format("%b %d %Y %H:%M")
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionStatus {
    Scheduled,
    Active,
    Complete,
}

impl ContributionStatus {
    /// Both edges of the window count as active.
    pub fn classify(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < now {
            ContributionStatus::Complete
        } else if start <= now {
            ContributionStatus::Active
        } else {
            ContributionStatus::Scheduled
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContributionStatus::Scheduled => "Scheduled",
            ContributionStatus::Active => "Active",
            ContributionStatus::Complete => "Complete",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            ContributionStatus::Scheduled => Color::Blue,
            ContributionStatus::Active => Color::Green,
            ContributionStatus::Complete => Color::DarkGray,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub title: String,
    pub owner: String,
}

impl SearchParams {
    pub fn new(title: &str, owner: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            owner: owner.trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.owner.is_empty()
    }
}

/// One window of the listing, in skip/limit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub skip: u64,
    pub limit: u32,
    pub title: Option<String>,
    pub owner: Option<String>,
}

impl ListingQuery {
    pub fn new(page: u32, per_page: u32, search: &SearchParams) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            skip: u64::from(page.saturating_sub(1)) * u64::from(per_page),
            limit: per_page,
            title: non_empty(&search.title),
            owner: non_empty(&search.owner),
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("skip", self.skip.to_string()), ("limit", self.limit.to_string())];
        if let Some(ref title) = self.title {
            pairs.push(("title", title.clone()));
        }
        if let Some(ref owner) = self.owner {
            pairs.push(("owner", owner.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub contributions: Vec<Contribution>,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("malformed listing response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("listing response carries neither `total` nor `totalItems`")]
    MissingTotal,
}

#[derive(Deserialize)]
struct ListingResponse {
    contributions: Vec<Contribution>,
    total: Option<u64>,
    #[serde(rename = "totalItems")]
    total_items: Option<u64>,
}

pub fn parse_listing(body: &[u8]) -> Result<ListingPage, FetchError> {
    let response: ListingResponse = serde_json::from_slice(body)?;
    let total = response
        .total
        .or(response.total_items)
        .ok_or(FetchError::MissingTotal)?;
    Ok(ListingPage {
        contributions: response.contributions,
        total,
    })
}

#[derive(Debug)]
pub enum FetchOutcome {
    Success(ListingPage),
    Empty { total: u64 },
    Failure(FetchError),
}

impl From<Result<ListingPage, FetchError>> for FetchOutcome {
    fn from(result: Result<ListingPage, FetchError>) -> Self {
        match result {
            Ok(page) if page.contributions.is_empty() => FetchOutcome::Empty { total: page.total },
            Ok(page) => FetchOutcome::Success(page),
            Err(e) => FetchOutcome::Failure(e),
        }
    }
}

pub trait ContributionSource: Send + Sync {
    fn list(&self, query: &ListingQuery) -> Result<ListingPage, FetchError>;
}

pub struct HttpSource {
    client: reqwest::blocking::Client,
    endpoint: Url,
}

impl HttpSource {
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = listing_endpoint(api_url)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("contribview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ContributionSource for HttpSource {
    fn list(&self, query: &ListingQuery) -> Result<ListingPage, FetchError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(query.to_pairs());

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes()?;
        parse_listing(&body)
    }
}

/// Resolve the listing collection under `api_url`, keeping any path prefix.
pub fn listing_endpoint(api_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(api_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(LISTING_PATH)
}

/// A request tagged with the token of the state it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub token: u64,
    pub query: ListingQuery,
}

#[derive(Debug)]
pub struct PageLoaded {
    pub token: u64,
    pub result: Result<ListingPage, FetchError>,
}

pub type PageLoader = Box<dyn Fn(FetchTicket) + Send>;

/// Runs every ticket on its own worker thread and reports back on `tx`.
pub fn spawn_loader(source: Arc<dyn ContributionSource>, tx: Sender<PageLoaded>) -> PageLoader {
    Box::new(move |ticket: FetchTicket| {
        let source = Arc::clone(&source);
        let tx = tx.clone();
        thread::spawn(move || {
            let result = source.list(&ticket.query);
            if tx
                .send(PageLoaded {
                    token: ticket.token,
                    result,
                })
                .is_err()
            {
                tracing::debug!(token = ticket.token, "listing receiver gone, dropping response");
            }
        });
    })
}
