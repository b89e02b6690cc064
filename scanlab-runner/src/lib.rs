//! ScanLab Runner — everything around the core math.
//!
//! Configuration, the on-disk caches, market/float/news providers, the
//! sequential pipeline, closed-market fallback, and output artifacts. The
//! CLI crate is a thin shell over [`run::execute`].

pub mod bar_cache;
pub mod baseline_store;
pub mod config;
pub mod fallback;
pub mod history;
pub mod output;
pub mod payload;
pub mod pipeline;
pub mod providers;
pub mod run;

pub use bar_cache::{BarCache, CacheStatus, StorageError, SymbolInfo};
pub use config::{ConfigError, ConfigFile, Profile, ProfileRequest, ResolvedConfig};
pub use fallback::{resolve_fallback, FallbackResult};
pub use history::RunHistory;
pub use payload::{SymbolRow, WatchlistPayload};
pub use pipeline::{build_watchlist, select_profile, PipelineEnv};
pub use providers::{MarketDataSource, ProviderError, ScanPage, ScanRow};
pub use run::{execute, RunOutcome};
