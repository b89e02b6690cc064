//! News/catalyst lookups with a tagged outcome.
//!
//! A missing catalyst and an unanswerable catalyst question are different
//! facts, so the fetch returns a four-way outcome instead of an empty list:
//! disabled (no key, feature off), restricted (plan does not cover the
//! endpoint), failed (transient error), or a report.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One news item attributed to a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub symbol: String,
    pub headline: String,
    pub summary: Option<String>,
    pub published_utc: DateTime<Utc>,
}

/// Per-symbol news inside the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReport {
    pub provider: String,
    pub lookback_hours: u32,
    pub items: HashMap<String, Vec<NewsItem>>,
}

impl NewsReport {
    pub fn has_catalyst(&self, symbol: &str) -> bool {
        self.items.get(symbol).is_some_and(|v| !v.is_empty())
    }

    /// Catalyst text for a symbol: the newest item's summary, falling back
    /// to its headline.
    pub fn catalyst_text(&self, symbol: &str) -> Option<String> {
        let items = self.items.get(symbol)?;
        let newest = items.iter().max_by_key(|i| i.published_utc)?;
        newest
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(newest.headline.clone()))
            .filter(|s| !s.trim().is_empty())
    }
}

/// Result of a news fetch for the run.
#[derive(Debug, Clone, PartialEq)]
pub enum NewsOutcome {
    /// Feature off or no API key; `reason` says which.
    Disabled { reason: String },
    /// The provider answered but refused the endpoint (e.g. HTTP 402).
    Restricted { provider: String, status: u16 },
    /// Transient failure; catalyst status is unknown this run.
    Failed { error: String },
    Ok(NewsReport),
}

pub trait NewsProvider {
    fn name(&self) -> &str;
    fn fetch(&self, symbols: &[String], now: DateTime<Utc>, lookback_hours: u32) -> NewsOutcome;
}

#[derive(Debug, Deserialize)]
struct FmpNewsRow {
    symbol: String,
    #[serde(rename = "publishedDate")]
    published_date: String,
    title: String,
    #[serde(default)]
    text: Option<String>,
}

/// Financial Modeling Prep stock-news endpoint.
pub struct FmpNewsProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl FmpNewsProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://financialmodelingprep.com".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            base_url,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }

    fn url(&self, symbols: &[String]) -> String {
        format!(
            "{}/api/v3/stock_news?tickers={}&limit=250&apikey={}",
            self.base_url,
            symbols.join(","),
            self.api_key
        )
    }
}

/// FMP timestamps come as naive "YYYY-MM-DD HH:MM:SS"; treated as UTC.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

impl NewsProvider for FmpNewsProvider {
    fn name(&self) -> &str {
        "fmp"
    }

    fn fetch(&self, symbols: &[String], now: DateTime<Utc>, lookback_hours: u32) -> NewsOutcome {
        if symbols.is_empty() {
            return NewsOutcome::Ok(NewsReport {
                provider: self.name().to_string(),
                lookback_hours,
                items: HashMap::new(),
            });
        }

        let url = self.url(symbols);
        let mut last_error = String::from("max retries exceeded");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let jitter = rand::thread_rng().gen_range(0..250);
                let delay = self.base_delay * 2u32.pow(attempt - 1) + Duration::from_millis(jitter);
                std::thread::sleep(delay);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
                        return NewsOutcome::Restricted {
                            provider: self.name().to_string(),
                            status: status.as_u16(),
                        };
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = format!("HTTP {status}");
                        continue;
                    }
                    if !status.is_success() {
                        last_error = format!("HTTP {status}");
                        continue;
                    }

                    let rows: Vec<FmpNewsRow> = match resp.json() {
                        Ok(rows) => rows,
                        Err(e) => return NewsOutcome::Failed {
                            error: format!("bad response: {e}"),
                        },
                    };

                    let cutoff = now - chrono::Duration::hours(lookback_hours as i64);
                    let mut items: HashMap<String, Vec<NewsItem>> = HashMap::new();
                    for row in rows {
                        let Some(published) = parse_published(&row.published_date) else {
                            continue;
                        };
                        if published < cutoff || published > now {
                            continue;
                        }
                        items.entry(row.symbol.clone()).or_default().push(NewsItem {
                            symbol: row.symbol,
                            headline: row.title,
                            summary: row.text,
                            published_utc: published,
                        });
                    }

                    return NewsOutcome::Ok(NewsReport {
                        provider: self.name().to_string(),
                        lookback_hours,
                        items,
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            }
        }

        NewsOutcome::Failed { error: last_error }
    }
}

/// Fixed news table for fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticNews {
    pub items: HashMap<String, Vec<NewsItem>>,
}

impl NewsProvider for StaticNews {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, symbols: &[String], now: DateTime<Utc>, lookback_hours: u32) -> NewsOutcome {
        let cutoff = now - chrono::Duration::hours(lookback_hours as i64);
        let mut items: HashMap<String, Vec<NewsItem>> = HashMap::new();
        for symbol in symbols {
            if let Some(list) = self.items.get(symbol) {
                let fresh: Vec<NewsItem> = list
                    .iter()
                    .filter(|i| i.published_utc >= cutoff && i.published_utc <= now)
                    .cloned()
                    .collect();
                if !fresh.is_empty() {
                    items.insert(symbol.clone(), fresh);
                }
            }
        }
        NewsOutcome::Ok(NewsReport {
            provider: self.name().to_string(),
            lookback_hours,
            items,
        })
    }
}
