use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine configuration with TOML file loading and sane defaults.
///
/// Every threshold the engine applies (similarity cut-offs, mining minimums,
/// cart nudge bands, acceptance probabilities) lives here so they can be
/// tuned per deployment without touching code.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub similarity: SimilarityConfig,
    pub affinity: AffinityConfig,
    pub recommend: RecommendConfig,
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityConfig {
    /// Minimum co-rating users required before Pearson is meaningful.
    pub min_common_raters: usize,
    /// Item-item similarities at or below this are discarded.
    pub min_similarity: f64,
    /// Neighborhood size for user-based collaborative filtering.
    pub top_k_users: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AffinityConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    pub bundle_min_products: usize,
    pub bundle_max_products: usize,
    /// Discount applied when pricing a discovered bundle as an offer.
    pub bundle_discount_pct: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecommendConfig {
    pub user_based_weight: f64,
    pub item_based_weight: f64,
    pub hybrid_collaborative_weight: f64,
    pub hybrid_content_weight: f64,
    pub hybrid_trending_weight: f64,
    pub context_product_weight: f64,
    pub max_preference_boost: f64,
    pub default_max_recommendations: usize,
    pub response_ttl_secs: u64,
    pub request_timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerConfig {
    pub free_shipping_threshold: Decimal,
    pub free_shipping_nudge_window: Decimal,
    pub free_shipping_high_urgency_gap: Decimal,
    pub upsell_min_increase_pct: f64,
    pub upsell_max_increase_pct: f64,
    /// Fallback volume tiers for products without their own.
    pub default_volume_tiers: Vec<(u32, f64)>,
    pub abandonment_idle_minutes: i64,
    pub low_stock_threshold: u32,
    pub acceptance: AcceptanceConfig,
}

/// Base acceptance probabilities per suggestion channel, used for
/// expected-value prediction.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptanceConfig {
    pub upsell: f64,
    pub cross_sell: f64,
    pub bundle: f64,
    pub free_shipping: f64,
    pub quantity: f64,
    pub time_limited: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityConfig {
                min_common_raters: 2,
                min_similarity: 0.3,
                top_k_users: 10,
            },
            affinity: AffinityConfig {
                min_support: 0.01,
                min_confidence: 0.1,
                bundle_min_products: 2,
                bundle_max_products: 5,
                bundle_discount_pct: 0.10,
            },
            recommend: RecommendConfig {
                user_based_weight: 0.6,
                item_based_weight: 0.4,
                hybrid_collaborative_weight: 0.5,
                hybrid_content_weight: 0.4,
                hybrid_trending_weight: 0.1,
                context_product_weight: 1.5,
                max_preference_boost: 0.5,
                default_max_recommendations: 10,
                response_ttl_secs: 3600,
                request_timeout_ms: 2000,
            },
            optimizer: OptimizerConfig {
                free_shipping_threshold: Decimal::new(7500, 2),
                free_shipping_nudge_window: Decimal::new(2500, 2),
                free_shipping_high_urgency_gap: Decimal::new(1000, 2),
                upsell_min_increase_pct: 0.10,
                upsell_max_increase_pct: 0.40,
                default_volume_tiers: vec![(3, 0.10), (5, 0.15), (10, 0.20)],
                abandonment_idle_minutes: 30,
                low_stock_threshold: 10,
                acceptance: AcceptanceConfig {
                    upsell: 0.15,
                    cross_sell: 0.25,
                    bundle: 0.30,
                    free_shipping: 0.40,
                    quantity: 0.20,
                    time_limited: 0.35,
                },
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Optional overrides parsed from a TOML file; anything absent keeps the
/// built-in default.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    similarity: Option<SimilarityPatch>,
    affinity: Option<AffinityPatch>,
    recommend: Option<RecommendPatch>,
    optimizer: Option<OptimizerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarityPatch {
    min_common_raters: Option<usize>,
    min_similarity: Option<f64>,
    top_k_users: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AffinityPatch {
    min_support: Option<f64>,
    min_confidence: Option<f64>,
    bundle_min_products: Option<usize>,
    bundle_max_products: Option<usize>,
    bundle_discount_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendPatch {
    default_max_recommendations: Option<usize>,
    response_ttl_secs: Option<u64>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OptimizerPatch {
    free_shipping_threshold: Option<Decimal>,
    free_shipping_nudge_window: Option<Decimal>,
    abandonment_idle_minutes: Option<i64>,
    low_stock_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl EngineConfig {
    /// Load configuration, applying `path` as a patch over defaults when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            let raw = fs::read_to_string(path)
                .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
            let patch: ConfigPatch = toml::from_str(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;
            config.apply_patch(patch);
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(similarity) = patch.similarity {
            if let Some(value) = similarity.min_common_raters {
                self.similarity.min_common_raters = value;
            }
            if let Some(value) = similarity.min_similarity {
                self.similarity.min_similarity = value;
            }
            if let Some(value) = similarity.top_k_users {
                self.similarity.top_k_users = value;
            }
        }

        if let Some(affinity) = patch.affinity {
            if let Some(value) = affinity.min_support {
                self.affinity.min_support = value;
            }
            if let Some(value) = affinity.min_confidence {
                self.affinity.min_confidence = value;
            }
            if let Some(value) = affinity.bundle_min_products {
                self.affinity.bundle_min_products = value;
            }
            if let Some(value) = affinity.bundle_max_products {
                self.affinity.bundle_max_products = value;
            }
            if let Some(value) = affinity.bundle_discount_pct {
                self.affinity.bundle_discount_pct = value;
            }
        }

        if let Some(recommend) = patch.recommend {
            if let Some(value) = recommend.default_max_recommendations {
                self.recommend.default_max_recommendations = value;
            }
            if let Some(value) = recommend.response_ttl_secs {
                self.recommend.response_ttl_secs = value;
            }
            if let Some(value) = recommend.request_timeout_ms {
                self.recommend.request_timeout_ms = value;
            }
        }

        if let Some(optimizer) = patch.optimizer {
            if let Some(value) = optimizer.free_shipping_threshold {
                self.optimizer.free_shipping_threshold = value;
            }
            if let Some(value) = optimizer.free_shipping_nudge_window {
                self.optimizer.free_shipping_nudge_window = value;
            }
            if let Some(value) = optimizer.abandonment_idle_minutes {
                self.optimizer.abandonment_idle_minutes = value;
            }
            if let Some(value) = optimizer.low_stock_threshold {
                self.optimizer.low_stock_threshold = value;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(value) = logging.level {
                self.logging.level = value;
            }
            if let Some(value) = logging.format {
                self.logging.format = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.similarity.min_common_raters < 2 {
            return Err(ConfigError::Validation(
                "similarity.min_common_raters must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.affinity.min_support)
            || !(0.0..=1.0).contains(&self.affinity.min_confidence)
        {
            return Err(ConfigError::Validation(
                "affinity thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.affinity.bundle_min_products < 2
            || self.affinity.bundle_max_products < self.affinity.bundle_min_products
        {
            return Err(ConfigError::Validation(
                "bundle size bounds must satisfy 2 <= min <= max".to_string(),
            ));
        }
        if self.optimizer.upsell_min_increase_pct >= self.optimizer.upsell_max_increase_pct {
            return Err(ConfigError::Validation(
                "optimizer upsell band must satisfy min < max".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::EngineConfig;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = EngineConfig::default();

        assert_eq!(config.similarity.min_similarity, 0.3);
        assert_eq!(config.optimizer.free_shipping_threshold, Decimal::new(7500, 2));
        assert_eq!(config.optimizer.acceptance.bundle, 0.30);
        assert_eq!(config.recommend.response_ttl_secs, 3600);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn toml_patch_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[affinity]\nmin_support = 0.05\n\n[logging]\nlevel = \"debug\""
        )
        .expect("write config");

        let config = EngineConfig::load(Some(file.path())).expect("load config");

        assert_eq!(config.affinity.min_support, 0.05);
        assert_eq!(config.logging.level, "debug");
        // Untouched sections keep defaults.
        assert_eq!(config.affinity.min_confidence, 0.1);
    }

    #[test]
    fn invalid_bundle_bounds_fail_validation() {
        let mut config = EngineConfig::default();
        config.affinity.bundle_max_products = 1;

        assert!(config.validate().is_err());
    }
}
