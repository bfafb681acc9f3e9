use std::path::Path;

use basketwise_core::config::EngineConfig;

/// Renders the effective engine configuration, noting whether a config file
/// was applied over the built-in defaults.
pub fn run(config: &EngineConfig, path: Option<&Path>) -> String {
    let source = match path {
        Some(path) => format!("defaults patched by {}", path.display()),
        None => "built-in defaults".to_string(),
    };

    let mut lines = vec![format!("effective config ({source}):")];

    lines.push(format!("  similarity.min_common_raters = {}", config.similarity.min_common_raters));
    lines.push(format!("  similarity.min_similarity = {}", config.similarity.min_similarity));
    lines.push(format!("  similarity.top_k_users = {}", config.similarity.top_k_users));

    lines.push(format!("  affinity.min_support = {}", config.affinity.min_support));
    lines.push(format!("  affinity.min_confidence = {}", config.affinity.min_confidence));
    lines.push(format!(
        "  affinity.bundle_size = {}..={}",
        config.affinity.bundle_min_products, config.affinity.bundle_max_products
    ));
    lines.push(format!("  affinity.bundle_discount_pct = {}", config.affinity.bundle_discount_pct));

    lines.push(format!(
        "  recommend.blend_weights = user {} / item {}",
        config.recommend.user_based_weight, config.recommend.item_based_weight
    ));
    lines.push(format!(
        "  recommend.hybrid_weights = collaborative {} / content {} / trending {}",
        config.recommend.hybrid_collaborative_weight,
        config.recommend.hybrid_content_weight,
        config.recommend.hybrid_trending_weight
    ));
    lines.push(format!("  recommend.response_ttl_secs = {}", config.recommend.response_ttl_secs));
    lines.push(format!("  recommend.request_timeout_ms = {}", config.recommend.request_timeout_ms));

    lines.push(format!(
        "  optimizer.free_shipping_threshold = {}",
        config.optimizer.free_shipping_threshold
    ));
    lines.push(format!(
        "  optimizer.upsell_band = {}..={}",
        config.optimizer.upsell_min_increase_pct, config.optimizer.upsell_max_increase_pct
    ));
    lines.push(format!(
        "  optimizer.abandonment_idle_minutes = {}",
        config.optimizer.abandonment_idle_minutes
    ));
    lines.push(format!("  logging.level = {}", config.logging.level));

    lines.join("\n")
}
