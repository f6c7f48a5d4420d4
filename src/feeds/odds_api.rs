//! The Odds API integration.
//!
//! Pulls the target book (default Hard Rock) and the reference book (default
//! Pinnacle) for one sport and joins them into `GameBoard`s. The reference
//! book's alternate spreads are fetched per event so the fair ladder has more
//! than the main line to work with.
//!
//! API docs: https://the-odds-api.com/liveapi/guides/v4/
//! Auth: `apiKey` query parameter. Quota is per calendar month; exhaustion
//! shows up as 401 (with a quota message), 402 or 429.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{FeedError, OddsFeed};
use crate::config::FeedConfig;
use crate::types::{Game, GameBoard, MarketKind, PriceQuote, ReferenceQuoteSet, Side, TargetQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Main markets requested from both books.
const MAIN_MARKETS: &str = "h2h,spreads";

/// Per-event market holding every alternate spread.
const ALTERNATE_MARKET: &str = "alternate_spreads";

/// Maximum retries for transient failures (5xx, timeouts, connection errors).
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_BACKOFF_MS: u64 = 1000;

/// Run `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_retries` extra attempts are spent. Delays double from `base_backoff`.
pub(crate) async fn with_retry<T, F, Fut>(
    max_retries: u32,
    base_backoff: Duration,
    mut attempt: F,
) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FeedError>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && tries < max_retries => {
                tries += 1;
                let delay = base_backoff * 2u32.pow(tries - 1);
                warn!(attempt = tries, delay_ms = delay.as_millis() as u64, error = %e, "Retryable Odds API error");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// API response types (Odds API JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEvent {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    #[serde(default)]
    away_team: Option<String>,
    /// Older payloads list both teams instead of `away_team`.
    #[serde(default)]
    teams: Vec<String>,
    #[serde(default)]
    bookmakers: Vec<ApiBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiBookmaker {
    key: String,
    #[serde(default)]
    markets: Vec<ApiMarket>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<ApiOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiOutcome {
    name: String,
    price: f64,
    #[serde(default)]
    point: Option<f64>,
}

impl ApiEvent {
    fn away(&self) -> Option<&str> {
        self.away_team
            .as_deref()
            .or_else(|| self.teams.iter().map(String::as_str).find(|t| *t != self.home_team))
    }

    fn book(&self, key: &str) -> Option<&ApiBookmaker> {
        self.bookmakers.iter().find(|b| b.key == key)
    }

    /// Side for an outcome name.
    fn side_of(&self, name: &str) -> Option<Side> {
        if name == self.home_team {
            Some(Side::Home)
        } else if Some(name) == self.away() {
            Some(Side::Away)
        } else {
            None
        }
    }
}

fn american_price(price: f64) -> Option<i32> {
    let rounded = price.round();
    (price.is_finite() && rounded.abs() <= i32::MAX as f64).then_some(rounded as i32)
}

// ---------------------------------------------------------------------------
// Response → board
// ---------------------------------------------------------------------------

/// Map an HTTP status (and body) to a feed error, `None` on success.
pub fn classify_status(status: u16, body: &str) -> Option<FeedError> {
    match status {
        200..=299 => None,
        402 | 429 => Some(FeedError::Quota { status }),
        401 if body.to_lowercase().contains("quota") => Some(FeedError::Quota { status }),
        _ => Some(FeedError::Http {
            status,
            body: body.chars().take(200).collect(),
        }),
    }
}

fn target_quotes(event: &ApiEvent, book: &str) -> Vec<TargetQuote> {
    let Some(bookmaker) = event.book(book) else {
        return Vec::new();
    };

    let mut quotes = Vec::new();
    for market in &bookmaker.markets {
        // Alternates are reference-only; we value the target's posted lines.
        let Some(kind) = MarketKind::ALL.iter().copied().find(|k| k.api_key() == market.key) else {
            continue;
        };
        for outcome in &market.outcomes {
            let (Some(side), Some(odds)) = (event.side_of(&outcome.name), american_price(outcome.price)) else {
                debug!(game_id = %event.id, outcome = %outcome.name, "Unusable target outcome");
                continue;
            };
            quotes.push(TargetQuote {
                market: kind,
                side,
                odds,
                line: if kind.has_line() { outcome.point } else { None },
            });
        }
    }
    quotes
}

fn reference_quotes(event: &ApiEvent, book: &str) -> Vec<ReferenceQuoteSet> {
    let Some(bookmaker) = event.book(book) else {
        return Vec::new();
    };

    let mut sets: Vec<ReferenceQuoteSet> = Vec::new();
    for market in &bookmaker.markets {
        let Ok(kind) = market.key.parse::<MarketKind>() else {
            continue;
        };
        let quotes = market.outcomes.iter().filter_map(|o| {
            let side = event.side_of(&o.name)?;
            let odds = american_price(o.price)?;
            Some(PriceQuote::new(side, odds, if kind.has_line() { o.point } else { None }))
        });

        match sets.iter_mut().find(|s| s.market == kind) {
            Some(set) => {
                for quote in quotes {
                    if !set.quotes.contains(&quote) {
                        set.quotes.push(quote);
                    }
                }
            }
            None => sets.push(ReferenceQuoteSet {
                market: kind,
                quotes: quotes.collect(),
            }),
        }
    }
    sets
}

/// Join target and reference events into boards.
///
/// Games that already started, or where the target book posted nothing
/// usable, are dropped. Output is ordered by kickoff, then id.
pub(crate) fn assemble_boards(
    target: &[ApiEvent],
    reference: &[ApiEvent],
    target_book: &str,
    reference_book: &str,
    now: DateTime<Utc>,
) -> Vec<GameBoard> {
    let reference_by_id: HashMap<&str, &ApiEvent> = reference.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut boards = Vec::new();
    for event in target {
        if event.commence_time < now {
            continue;
        }
        let Some(away) = event.away() else {
            warn!(game_id = %event.id, "Event has no away team, skipping");
            continue;
        };

        let targets = target_quotes(event, target_book);
        if targets.is_empty() {
            debug!(game_id = %event.id, book = target_book, "No target quotes");
            continue;
        }

        let references = reference_by_id
            .get(event.id.as_str())
            .map(|r| reference_quotes(r, reference_book))
            .unwrap_or_default();

        boards.push(GameBoard {
            game: Game {
                id: event.id.clone(),
                home: event.home_team.clone(),
                away: away.to_string(),
                commence_time: event.commence_time,
            },
            targets,
            references,
        });
    }

    boards.sort_by(|a, b| {
        a.game
            .commence_time
            .cmp(&b.game.commence_time)
            .then_with(|| a.game.id.cmp(&b.game.id))
    });
    boards
}

/// Fold a per-event alternate-lines response into the reference event.
pub(crate) fn merge_alternates(reference: &mut ApiEvent, alternates: ApiEvent, book: &str) {
    let Some(alt_book) = alternates.bookmakers.into_iter().find(|b| b.key == book) else {
        return;
    };
    match reference.bookmakers.iter_mut().find(|b| b.key == book) {
        Some(existing) => existing.markets.extend(alt_book.markets),
        None => reference.bookmakers.push(alt_book),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The Odds API feed client.
pub struct OddsApiFeed {
    http: Client,
    base_url: String,
    sport: String,
    regions: String,
    target_book: String,
    reference_book: String,
    alternate_lines: bool,
    api_key: Option<SecretString>,
}

impl OddsApiFeed {
    pub fn new(config: &FeedConfig, api_key: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("SHARPLINE/0.1.0 (odds-valuation)")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        if api_key.is_none() {
            warn!(env = %config.api_key_env, "No Odds API key configured, requests will likely be rejected");
        }

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sport: config.sport.clone(),
            regions: config.regions.clone(),
            target_book: config.target_book.clone(),
            reference_book: config.reference_book.clone(),
            alternate_lines: config.alternate_lines,
            api_key,
        })
    }

    /// Request URL without credentials (safe to log).
    fn odds_url(&self, path: &str, book: &str, markets: &str) -> String {
        format!(
            "{}/sports/{}/{path}?regions={}&markets={}&oddsFormat=american&dateFormat=iso&bookmakers={}",
            self.base_url,
            urlencoding::encode(&self.sport),
            urlencoding::encode(&self.regions),
            urlencoding::encode(markets),
            urlencoding::encode(book),
        )
    }

    /// GET with retry + backoff on transient failures.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        with_retry(MAX_RETRIES, Duration::from_millis(BASE_BACKOFF_MS), || self.get_once(url)).await
    }

    async fn get_once<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        debug!(url = %url, "Fetching odds");

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apiKey", key.expose_secret().as_str())]);
        }
        let resp = request.send().await?;

        let status = resp.status().as_u16();
        if let Some(remaining) = resp
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(remaining, "Odds API quota");
        }

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body).unwrap_or_else(|| FeedError::Http {
                status,
                body: body.clone(),
            }));
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FeedError::Decode(e.to_string()))
    }

    async fn fetch_events(&self, book: &str) -> Result<Vec<ApiEvent>, FeedError> {
        let url = self.odds_url("odds", book, MAIN_MARKETS);
        self.get(&url).await
    }

    async fn fetch_alternates(&self, event_id: &str) -> Result<ApiEvent, FeedError> {
        let path = format!("events/{}/odds", urlencoding::encode(event_id));
        let url = self.odds_url(&path, &self.reference_book, ALTERNATE_MARKET);
        self.get(&url).await
    }

    /// Fetch alternate spreads for every upcoming reference event the
    /// target book also lists.
    ///
    /// A quota error aborts the run; any other per-event failure only costs
    /// that event its alternates.
    async fn enrich_alternates(
        &self,
        reference: &mut [ApiEvent],
        target: &[ApiEvent],
        now: DateTime<Utc>,
    ) -> Result<(), FeedError> {
        let listed: HashSet<&str> = target.iter().map(|e| e.id.as_str()).collect();
        let upcoming: Vec<usize> = (0..reference.len())
            .filter(|&i| reference[i].commence_time >= now && listed.contains(reference[i].id.as_str()))
            .collect();

        let fetches = upcoming.iter().map(|&i| self.fetch_alternates(&reference[i].id));
        let results = futures::future::join_all(fetches).await;

        for (i, result) in upcoming.into_iter().zip(results) {
            match result {
                Ok(alternates) => merge_alternates(&mut reference[i], alternates, &self.reference_book),
                Err(e) if e.is_quota() => return Err(e),
                Err(e) => warn!(game_id = %reference[i].id, error = %e, "Alternate lines unavailable"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OddsFeed for OddsApiFeed {
    async fn fetch_board(&self) -> Result<Vec<GameBoard>, FeedError> {
        let now = Utc::now();

        let (target, mut reference) = futures::try_join!(
            self.fetch_events(&self.target_book),
            self.fetch_events(&self.reference_book),
        )?;

        if self.alternate_lines {
            self.enrich_alternates(&mut reference, &target, now).await?;
        }

        let boards = assemble_boards(&target, &reference, &self.target_book, &self.reference_book, now);
        info!(
            target_events = target.len(),
            reference_events = reference.len(),
            boards = boards.len(),
            "Odds board fetched"
        );
        Ok(boards)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
