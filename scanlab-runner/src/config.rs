//! Layered TOML configuration resolved into one immutable snapshot.
//!
//! Precedence, lowest to highest: built-in defaults, the config file's base
//! sections, then the selected profile's overrides. Resolution happens once
//! at startup; the pipeline only ever sees the frozen [`ResolvedConfig`], so
//! a run cannot observe two different values for the same knob.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scanlab_core::funnel::FilterLimits;
use scanlab_core::sanity::SanityLimits;
use scanlab_core::scoring::{GradeThresholds, ScoreWeights};
use scanlab_core::session::Session;
use scanlab_core::stats::BaselineMethod;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("unknown profile '{0}' (expected 'pre', 'open', or 'auto')")]
    UnknownProfile(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Named scan profile. `Pre` scans the extended session with pre-market
/// thresholds; `Open` scans regular hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Pre,
    Open,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Pre => "pre",
            Profile::Open => "open",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user asked for on the command line; `Auto` defers to the
/// market phase at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRequest {
    Auto,
    Fixed(Profile),
}

impl ProfileRequest {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ProfileRequest::Auto),
            "pre" => Ok(ProfileRequest::Fixed(Profile::Pre)),
            "open" => Ok(ProfileRequest::Fixed(Profile::Open)),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

/// RVOL engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RvolConfig {
    pub session: Session,
    pub bar_minutes: u32,
    pub lookback_days: u32,
    pub method: BaselineMethod,
    pub trim_pct: f64,
    pub min_history_days: u32,
    pub min_baseline: u64,
    /// Display/filter cap on the ratio; 0 disables.
    pub cap: f64,
    /// With a delayed or snapshot feed, missing RVOL does not eliminate a
    /// candidate. A known ratio below the minimum still does.
    pub permissive_when_delayed: bool,
    /// Pause between historical-bar fetches.
    pub throttle_ms: u64,
}

impl Default for RvolConfig {
    fn default() -> Self {
        Self {
            session: Session::Rth,
            bar_minutes: 1,
            lookback_days: 30,
            method: BaselineMethod::TrimmedMean,
            trim_pct: 0.10,
            min_history_days: 10,
            min_baseline: 1_000,
            cap: 200.0,
            permissive_when_delayed: true,
            throttle_ms: 250,
        }
    }
}

/// News/catalyst feature settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub lookback_hours: u32,
    /// Env var holding the provider API key.
    pub api_key_env: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_hours: 24,
            api_key_env: "FMP_API_KEY".to_string(),
        }
    }
}

/// Float-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatConfig {
    pub enabled: bool,
    /// A cached float this many days old is still usable when the provider
    /// cannot be reached.
    pub allow_stale_days: u32,
    pub api_key_env: String,
}

impl Default for FloatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_stale_days: 14,
            api_key_env: "FMP_API_KEY".to_string(),
        }
    }
}

/// Behavior when the market is closed or the scan comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Emit an empty watchlist with a reason.
    Empty,
    /// Re-emit the last successful output if it is fresh enough.
    LastOk,
    /// Re-emit the last successful output regardless of age, for
    /// off-hours research.
    Research,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub mode: FallbackMode,
    /// In `last_ok` mode, a previous output older than this is not
    /// re-emitted.
    pub stale_max_hours: u32,
    /// Refuse to publish a watchlist built entirely from inactive data.
    pub require_active_data: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            mode: FallbackMode::LastOk,
            stale_max_hours: 36,
            require_active_data: true,
        }
    }
}

/// Partial per-profile overrides; only the knobs that differ between the
/// pre-market and open profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub change_min_pct: Option<f64>,
    pub volume_min: Option<u64>,
    pub rvol_min: Option<f64>,
    pub max_candidates: Option<usize>,
    pub max_rvol_symbols: Option<usize>,
    pub session: Option<Session>,
}

impl ProfileOverrides {
    fn apply(&self, filters: &mut FilterLimits, rvol: &mut RvolConfig) {
        if let Some(v) = self.price_min {
            filters.price_min = v;
        }
        if let Some(v) = self.price_max {
            filters.price_max = v;
        }
        if let Some(v) = self.change_min_pct {
            filters.change_min_pct = v;
        }
        if let Some(v) = self.volume_min {
            filters.volume_min = v;
        }
        if let Some(v) = self.rvol_min {
            filters.rvol_min = v;
        }
        if let Some(v) = self.max_candidates {
            filters.max_candidates = v;
        }
        if let Some(v) = self.max_rvol_symbols {
            filters.max_rvol_symbols = v;
        }
        if let Some(v) = self.session {
            rvol.session = v;
        }
    }
}

/// On-disk config file shape. Every section is optional; missing sections
/// take the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub scanner: FilterLimits,
    pub rvol: RvolConfig,
    pub sanity: SanityLimits,
    pub weights: ScoreWeights,
    pub grades: GradeThresholds,
    pub news: NewsConfig,
    pub float: FloatConfig,
    pub fallback: FallbackConfig,
    pub exclude_otc_pink: bool,
    pub cache_dir: String,
    pub profiles: BTreeMap<String, ProfileOverrides>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            scanner: FilterLimits::default(),
            rvol: RvolConfig::default(),
            sanity: SanityLimits::default(),
            weights: ScoreWeights::default(),
            grades: GradeThresholds::default(),
            news: NewsConfig::default(),
            float: FloatConfig::default(),
            fallback: FallbackConfig::default(),
            exclude_otc_pink: true,
            cache_dir: "cache".to_string(),
            profiles: BTreeMap::new(),
        }
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Built-in profiles: `pre` scans the extended session with looser volume,
/// `open` scans regular hours.
fn default_profiles() -> BTreeMap<String, ProfileOverrides> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "pre".to_string(),
        ProfileOverrides {
            session: Some(Session::RthPre),
            volume_min: Some(100_000),
            ..Default::default()
        },
    );
    profiles.insert(
        "open".to_string(),
        ProfileOverrides {
            session: Some(Session::Rth),
            ..Default::default()
        },
    );
    profiles
}

/// The frozen configuration a run executes against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub profile: Profile,
    pub filters: FilterLimits,
    pub rvol: RvolConfig,
    pub sanity: SanityLimits,
    pub weights: ScoreWeights,
    pub grades: GradeThresholds,
    pub news: NewsConfig,
    pub float: FloatConfig,
    pub fallback: FallbackConfig,
    pub exclude_otc_pink: bool,
    pub cache_dir: String,
}

impl ResolvedConfig {
    /// Merge defaults, the file's base sections, and the profile overrides.
    pub fn resolve(file: Option<ConfigFile>, profile: Profile) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let mut filters = file.scanner;
        let mut rvol = file.rvol;

        // Built-in profile overrides apply first so a user file only has to
        // override what it changes.
        if let Some(builtin) = default_profiles().get(profile.as_str()) {
            builtin.apply(&mut filters, &mut rvol);
        }
        if let Some(user) = file.profiles.get(profile.as_str()) {
            user.apply(&mut filters, &mut rvol);
        }

        let cache_dir = if file.cache_dir.is_empty() {
            "cache".to_string()
        } else {
            file.cache_dir
        };

        let resolved = Self {
            profile,
            filters,
            rvol,
            sanity: file.sanity,
            weights: file.weights,
            grades: file.grades,
            news: file.news,
            float: file.float,
            fallback: file.fallback,
            exclude_otc_pink: file.exclude_otc_pink,
            cache_dir,
        };
        resolved.validate()?;
        Ok(resolved)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.filters.price_min > self.filters.price_max {
            return Err(ConfigError::Invalid(format!(
                "price_min {} exceeds price_max {}",
                self.filters.price_min, self.filters.price_max
            )));
        }
        if self.rvol.bar_minutes == 0 {
            return Err(ConfigError::Invalid("bar_minutes must be positive".into()));
        }
        if self.rvol.session.minutes() % self.rvol.bar_minutes != 0 {
            return Err(ConfigError::Invalid(format!(
                "bar_minutes {} does not divide the {}-minute session",
                self.rvol.bar_minutes,
                self.rvol.session.minutes()
            )));
        }
        if !(0.0..=0.49).contains(&self.rvol.trim_pct) {
            return Err(ConfigError::Invalid(format!(
                "trim_pct {} outside [0, 0.49]",
                self.rvol.trim_pct
            )));
        }
        if self.filters.max_rvol_symbols == 0 {
            return Err(ConfigError::Invalid(
                "max_rvol_symbols must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_for_both_profiles() {
        let open = ResolvedConfig::resolve(None, Profile::Open).unwrap();
        assert_eq!(open.rvol.session, Session::Rth);
        assert_eq!(open.filters.volume_min, 200_000);

        let pre = ResolvedConfig::resolve(None, Profile::Pre).unwrap();
        assert_eq!(pre.rvol.session, Session::RthPre);
        assert_eq!(pre.filters.volume_min, 100_000);
    }

    #[test]
    fn file_overrides_base_then_profile_wins() {
        let toml_text = r#"
            [scanner]
            change_min_pct = 12.0
            volume_min = 300000

            [profiles.open]
            change_min_pct = 8.0
        "#;
        let file: ConfigFile = toml::from_str(toml_text).unwrap();
        let open = ResolvedConfig::resolve(Some(file.clone()), Profile::Open).unwrap();
        assert_eq!(open.filters.change_min_pct, 8.0);
        assert_eq!(open.filters.volume_min, 300_000);

        // The pre profile keeps the file base where it does not override,
        // but the built-in pre session still applies.
        let pre = ResolvedConfig::resolve(Some(file), Profile::Pre).unwrap();
        assert_eq!(pre.filters.change_min_pct, 12.0);
        assert_eq!(pre.rvol.session, Session::RthPre);
    }

    #[test]
    fn partial_sections_take_defaults() {
        let file: ConfigFile = toml::from_str("[rvol]\nlookback_days = 20\n").unwrap();
        let cfg = ResolvedConfig::resolve(Some(file), Profile::Open).unwrap();
        assert_eq!(cfg.rvol.lookback_days, 20);
        assert_eq!(cfg.rvol.method, BaselineMethod::TrimmedMean);
        assert_eq!(cfg.filters.price_min, 2.0);
    }

    #[test]
    fn invalid_price_range_rejected() {
        let file: ConfigFile =
            toml::from_str("[scanner]\nprice_min = 30.0\nprice_max = 20.0\n").unwrap();
        let err = ResolvedConfig::resolve(Some(file), Profile::Open).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bar_size_must_divide_session() {
        let file: ConfigFile = toml::from_str("[rvol]\nbar_minutes = 7\n").unwrap();
        assert!(ResolvedConfig::resolve(Some(file), Profile::Open).is_err());
    }

    #[test]
    fn trim_pct_bounds_enforced() {
        let file: ConfigFile = toml::from_str("[rvol]\ntrim_pct = 0.6\n").unwrap();
        assert!(ResolvedConfig::resolve(Some(file), Profile::Open).is_err());
    }

    #[test]
    fn profile_request_parsing() {
        assert_eq!(ProfileRequest::parse("auto").unwrap(), ProfileRequest::Auto);
        assert_eq!(
            ProfileRequest::parse("PRE").unwrap(),
            ProfileRequest::Fixed(Profile::Pre)
        );
        assert_eq!(
            ProfileRequest::parse("open").unwrap(),
            ProfileRequest::Fixed(Profile::Open)
        );
        assert!(ProfileRequest::parse("night").is_err());
    }

    #[test]
    fn fallback_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&FallbackMode::LastOk).unwrap(),
            "\"last_ok\""
        );
    }
}
