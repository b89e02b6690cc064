//! Float share-count providers.
//!
//! The HTTP provider hits Financial Modeling Prep's shares-float endpoint
//! with bounded retries. HTTP 402 means the account's plan does not cover
//! the endpoint; that disables the float feature for the rest of the run
//! instead of being retried.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use serde::Deserialize;

use scanlab_core::domain::FloatSnapshot;

use super::ProviderError;

/// Float lookups behind one seam; the pipeline layers day-level caching on
/// top of this.
pub trait FloatProvider {
    fn name(&self) -> &str;
    fn fetch_float(&self, symbol: &str, today: NaiveDate) -> Result<FloatSnapshot, ProviderError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FloatRow {
    symbol: String,
    #[serde(default)]
    float_shares: Option<f64>,
    #[serde(default)]
    free_float: Option<f64>,
}

/// Financial Modeling Prep shares-float endpoint.
pub struct FmpFloatProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl FmpFloatProvider {
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
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/api/v4/shares_float?symbol={symbol}&apikey={}",
            self.base_url, self.api_key
        )
    }

    fn backoff(&self, attempt: u32) {
        let jitter = rand::thread_rng().gen_range(0..250);
        let delay = self.base_delay * 2u32.pow(attempt - 1) + Duration::from_millis(jitter);
        std::thread::sleep(delay);
    }

    #[cfg(test)]
    fn for_tests(base_url: String, timeout: Duration, max_retries: u32) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key: "test".to_string(),
            base_url,
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }
}

impl FloatProvider for FmpFloatProvider {
    fn name(&self) -> &str {
        "fmp"
    }

    fn fetch_float(&self, symbol: &str, today: NaiveDate) -> Result<FloatSnapshot, ProviderError> {
        let url = self.url(symbol);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                self.backoff(attempt);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
                        return Err(ProviderError::PaymentRequired);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(ProviderError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }
                    if !status.is_success() {
                        last_error =
                            Some(ProviderError::Network(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let rows: Vec<FloatRow> = resp
                        .json()
                        .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
                    let row = rows
                        .into_iter()
                        .find(|r| r.symbol.eq_ignore_ascii_case(symbol))
                        .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;
                    let shares = row
                        .float_shares
                        .or(row.free_float)
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;

                    return Ok(FloatSnapshot {
                        symbol: symbol.to_string(),
                        as_of: today,
                        float_shares: shares as u64,
                        source: self.name().to_string(),
                    });
                }
                // Timeouts and connect failures get the same backoff; the
                // error only surfaces once the retries are spent.
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        ProviderError::Timeout {
                            symbol: symbol.to_string(),
                        }
                    } else {
                        ProviderError::Network(e.to_string())
                    });
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Network("max retries exceeded".into())))
    }
}

/// Fixed float table for fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFloats {
    floats: HashMap<String, u64>,
}

impl StaticFloats {
    pub fn new(floats: HashMap<String, u64>) -> Self {
        Self { floats }
    }
}

impl FloatProvider for StaticFloats {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_float(&self, symbol: &str, today: NaiveDate) -> Result<FloatSnapshot, ProviderError> {
        match self.floats.get(symbol) {
            Some(&shares) => Ok(FloatSnapshot {
                symbol: symbol.to_string(),
                as_of: today,
                float_shares: shares,
                source: self.name().to_string(),
            }),
            None => Err(ProviderError::NoData(symbol.to_string())),
        }
    }
}
