// Configuration — pipeline tunables from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::Result;

use crate::pipeline::PipelineParams;
use crate::subgroups::ellipsoid::DEFAULT_QUANTILE;
use crate::subgroups::validity::MIN_SUBGROUP_SIZE;
use crate::vocabulary::logodds::DEFAULT_ALPHA;

/// Tunables loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// variable is optional; a value that is set but unparseable is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// STRATA_MIN_SUBGROUP_SIZE
    pub min_subgroup_size: usize,
    /// STRATA_ALPHA
    pub alpha: f64,
    /// STRATA_QUANTILE
    pub quantile: f64,
    /// STRATA_TOP_WORDS
    pub top_words: usize,
    /// STRATA_KEEP_STOP_WORDS
    pub keep_stop_words: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            min_subgroup_size: parse_var(&lookup, "STRATA_MIN_SUBGROUP_SIZE")?
                .unwrap_or(MIN_SUBGROUP_SIZE),
            alpha: parse_var(&lookup, "STRATA_ALPHA")?.unwrap_or(DEFAULT_ALPHA),
            quantile: parse_var(&lookup, "STRATA_QUANTILE")?.unwrap_or(DEFAULT_QUANTILE),
            top_words: parse_var(&lookup, "STRATA_TOP_WORDS")?.unwrap_or(10),
            keep_stop_words: parse_var(&lookup, "STRATA_KEEP_STOP_WORDS")?.unwrap_or(false),
        };

        if config.min_subgroup_size == 0 {
            anyhow::bail!("STRATA_MIN_SUBGROUP_SIZE must be at least 1");
        }
        if !(config.alpha > 0.0 && config.alpha.is_finite()) {
            anyhow::bail!("STRATA_ALPHA must be a positive number, got {}", config.alpha);
        }
        if !(config.quantile > 0.0 && config.quantile <= 1.0) {
            anyhow::bail!(
                "STRATA_QUANTILE must be in (0, 1], got {}",
                config.quantile
            );
        }
        Ok(config)
    }

    /// Pipeline parameters for this configuration.
    pub fn pipeline_params(&self, show_progress: bool) -> PipelineParams {
        PipelineParams {
            min_subgroup_size: self.min_subgroup_size,
            quantile: self.quantile,
            alpha: self.alpha,
            top_words: self.top_words,
            exclude_stop_words: !self.keep_stop_words,
            show_progress,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{name}={raw} is invalid: {e}")),
    }
}
