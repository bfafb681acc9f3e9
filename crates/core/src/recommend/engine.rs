//! Recommendation engine orchestration and training entry points.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Utc};
use rand::thread_rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bandit::thompson_scores;
use super::collaborative::collaborative_scores;
use super::content::content_based_scores;
use super::filters::apply_filters;
use super::types::{
    Recommendation, RecommendationModel, RecommendationRequest, RecommendationResponse, Strategy,
};
use crate::affinity::AffinityAnalyzer;
use crate::domain::{Order, Product, ProductId, Purchase, SessionEventKind};
use crate::errors::{EngineError, EngineResult};
use crate::similarity::SimilarityIndex;
use crate::sources::EventSource;
use crate::state::{EngineState, LoggedResponse, TrainingSnapshot};

/// Stateless-per-request recommendation engine.
///
/// All request paths read immutable snapshots out of [`EngineState`];
/// only the training entry points replace them.
pub struct RecommendationEngine {
    state: Arc<EngineState>,
    events: Arc<dyn EventSource>,
}

impl RecommendationEngine {
    pub fn new(state: Arc<EngineState>, events: Arc<dyn EventSource>) -> Self {
        Self { state, events }
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    // ------------------------------------------------------------------
    // Training (idempotent full rebuilds, snapshot-swapped)
    // ------------------------------------------------------------------

    /// Rebuilds user rating vectors and the product similarity index from
    /// scratch. Malformed purchase records are logged and skipped so one bad
    /// row never aborts the batch.
    pub fn train_collaborative_model(&self, purchases: &[Purchase]) {
        let previous = self.state.training();

        let mut user_vectors: HashMap<_, HashMap<ProductId, f64>> = HashMap::new();
        let mut purchase_counts: HashMap<ProductId, u64> = HashMap::new();

        let mut skipped = 0usize;
        for purchase in purchases {
            if purchase.customer_id.0.is_empty()
                || purchase.product_id.0.is_empty()
                || !purchase.rating.is_finite()
                || purchase.rating <= 0.0
            {
                warn!(
                    customer = %purchase.customer_id,
                    product = %purchase.product_id,
                    rating = purchase.rating,
                    "skipping malformed purchase record"
                );
                skipped += 1;
                continue;
            }

            *user_vectors
                .entry(purchase.customer_id.clone())
                .or_default()
                .entry(purchase.product_id.clone())
                .or_insert(0.0) += purchase.rating;
            *purchase_counts.entry(purchase.product_id.clone()).or_insert(0) += 1;
        }

        let similarity = SimilarityIndex::compute(&user_vectors, &self.state.config.similarity);

        info!(
            users = user_vectors.len(),
            products = purchase_counts.len(),
            similar_products = similarity.product_count(),
            skipped,
            "collaborative model trained"
        );

        self.state.install_training(TrainingSnapshot {
            user_vectors,
            similarity,
            purchase_counts,
            feature_vectors: previous.feature_vectors.clone(),
            catalog: previous.catalog.clone(),
            trained_at: Some(Utc::now()),
        });
    }

    /// Rebuilds product feature vectors from catalog attributes.
    pub fn train_content_model(&self, products: &[Product]) {
        let previous = self.state.training();

        let mut feature_vectors = HashMap::new();
        let mut catalog = HashMap::new();

        let mut skipped = 0usize;
        for product in products {
            if product.id.0.is_empty() || product.category.is_empty() || product.price < Decimal::ZERO
            {
                warn!(product = %product.id, "skipping malformed catalog record");
                skipped += 1;
                continue;
            }

            feature_vectors.insert(product.id.clone(), feature_vector(product));
            catalog.insert(product.id.clone(), product.clone());
        }

        info!(products = catalog.len(), skipped, "content model trained");

        self.state.install_training(TrainingSnapshot {
            feature_vectors,
            catalog,
            user_vectors: previous.user_vectors.clone(),
            similarity: previous.similarity.clone(),
            purchase_counts: previous.purchase_counts.clone(),
            trained_at: Some(Utc::now()),
        });
    }

    /// Full affinity mining pass with explicit thresholds, swapped in as the
    /// new affinity model.
    pub fn analyze_frequently_bought_together(
        &self,
        orders: &[Order],
        min_support: f64,
        min_confidence: f64,
    ) {
        let catalog = self.state.training().catalog.clone();
        let analyzer = AffinityAnalyzer::new(self.state.config.affinity.clone());
        let model =
            analyzer.analyze_with_thresholds(orders, &catalog, min_support, min_confidence);
        self.state.install_affinity(model);
    }

    // ------------------------------------------------------------------
    // Request path
    // ------------------------------------------------------------------

    /// Generates ranked recommendations for the requested strategy.
    ///
    /// Always returns a usable (possibly smaller) result set: cold starts
    /// and missing models degrade to popularity, and a request exceeding
    /// its time budget degrades the same way instead of failing.
    pub async fn generate_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> EngineResult<RecommendationResponse> {
        if request.max_recommendations == 0 {
            return Err(EngineError::Validation(
                "max_recommendations must be at least 1".to_string(),
            ));
        }

        let budget = request
            .timeout
            .unwrap_or(StdDuration::from_millis(self.state.config.recommend.request_timeout_ms));

        // One snapshot per request: scoring and filtering always see the
        // same training state even if a retrain swaps in mid-flight.
        let snapshot = self.state.training();

        let raw = if request.strategy == Strategy::SessionBased {
            match tokio::time::timeout(budget, self.session_based(&request, &snapshot)).await {
                Ok(recommendations) => recommendations,
                Err(_) => {
                    warn!(strategy = %request.strategy, "request exceeded budget, degrading to popularity");
                    popularity(&snapshot)
                }
            }
        } else {
            // The remaining strategies never await, so they must run off
            // the async runtime for the budget to be able to expire.
            let state = Arc::clone(&self.state);
            let scoring_snapshot = Arc::clone(&snapshot);
            let scoring_request = request.clone();
            let deadline = Instant::now() + budget;
            let scoring = tokio::task::spawn_blocking(move || {
                if Instant::now() >= deadline {
                    return None;
                }
                Some(score_strategy(&state, &scoring_snapshot, &scoring_request))
            });

            match tokio::time::timeout(budget, scoring).await {
                Ok(Ok(Some(recommendations))) => recommendations,
                Ok(Err(error)) => {
                    warn!(%error, "scoring task failed, degrading to popularity");
                    popularity(&snapshot)
                }
                Ok(Ok(None)) | Err(_) => {
                    warn!(strategy = %request.strategy, "request exceeded budget, degrading to popularity");
                    popularity(&snapshot)
                }
            }
        };

        let mut recommendations = apply_filters(raw, &snapshot.catalog, &request.filters);
        recommendations.truncate(request.max_recommendations);

        for recommendation in &recommendations {
            self.state.performance.record_impression(&recommendation.product_id);
        }

        let now = Utc::now();
        let ttl = Duration::seconds(self.state.config.recommend.response_ttl_secs as i64);
        let response = RecommendationResponse {
            id: Uuid::new_v4().to_string(),
            recommendations,
            strategy: request.strategy,
            timestamp: now,
            expires_at: now + ttl,
        };

        self.state.prune_responses(now);
        self.state.log_response(LoggedResponse {
            id: response.id.clone(),
            strategy: request.strategy.as_str().to_string(),
            customer_id: request.customer_id.clone(),
            recommendation_count: response.recommendations.len(),
            timestamp: response.timestamp,
            expires_at: response.expires_at,
        });

        info!(
            response_id = %response.id,
            strategy = %request.strategy,
            count = response.recommendations.len(),
            "recommendations served"
        );

        Ok(response)
    }

    /// Predicts the next purchase from the session's view sequence via the
    /// mined sequential patterns; an empty session degrades to popularity.
    async fn session_based(
        &self,
        request: &RecommendationRequest,
        snapshot: &TrainingSnapshot,
    ) -> Vec<Recommendation> {
        let Some(session_id) = request.session_id.as_ref() else {
            return popularity(snapshot);
        };

        let events = match self.events.session_events(session_id).await {
            Ok(events) => events,
            Err(error) => {
                warn!(%error, "session events unavailable, falling back to popularity");
                return popularity(snapshot);
            }
        };

        let mut viewed: Vec<ProductId> = Vec::new();
        for event in &events {
            if event.kind == SessionEventKind::View && !viewed.contains(&event.product_id) {
                viewed.push(event.product_id.clone());
            }
        }

        if viewed.is_empty() {
            return popularity(snapshot);
        }

        let affinity = self.state.affinity();
        let mut scores: HashMap<ProductId, (u64, f64)> = HashMap::new();
        // Most recently viewed products carry the strongest signal.
        for product in viewed.iter().rev().take(3) {
            for prediction in affinity.predict_next_purchase(product, request.max_recommendations * 2)
            {
                let entry = scores
                    .entry(prediction.product_id.clone())
                    .or_insert((0, prediction.avg_days));
                entry.0 += prediction.count;
            }
        }
        scores.retain(|product, _| !viewed.contains(product));

        if scores.is_empty() {
            return popularity(snapshot);
        }

        let max_count = scores.values().map(|(count, _)| *count).max().unwrap_or(1) as f64;
        let mut recommendations: Vec<Recommendation> = scores
            .into_iter()
            .map(|(product_id, (count, avg_days))| Recommendation {
                product_id,
                score: count as f64 / max_count,
                confidence: count as f64 / max_count,
                reasoning: vec![format!(
                    "Shoppers typically buy this about {avg_days:.0} days after what you viewed"
                )],
                model: RecommendationModel::SessionBased,
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        recommendations
    }
}

/// Synchronous scoring for the strategies that never await. Runs on the
/// blocking pool so the per-request budget can expire while it works.
fn score_strategy(
    state: &EngineState,
    snapshot: &TrainingSnapshot,
    request: &RecommendationRequest,
) -> Vec<Recommendation> {
    let config = &state.config;

    match request.strategy {
        Strategy::Collaborative => {
            let recommendations = request
                .customer_id
                .as_ref()
                .map(|customer| {
                    collaborative_scores(snapshot, customer, &config.recommend, &config.similarity)
                })
                .unwrap_or_default();

            if recommendations.is_empty() {
                debug!("collaborative cold start, falling back to popularity");
                popularity(snapshot)
            } else {
                recommendations
            }
        }
        Strategy::ContentBased => content_based_scores(
            snapshot,
            request.customer_id.as_ref(),
            &request.context_products,
            &config.recommend,
        ),
        Strategy::Hybrid => hybrid(state, snapshot, request),
        Strategy::ThompsonSampling => {
            let mut candidates: Vec<_> = snapshot
                .catalog
                .keys()
                .map(|id| (id.clone(), state.performance.metrics(id)))
                .collect();
            candidates.sort_by(|a, b| a.0.cmp(&b.0));
            thompson_scores(&candidates, &mut thread_rng())
        }
        Strategy::SessionBased | Strategy::Popularity => popularity(snapshot),
    }
}

/// Weighted ensemble of collaborative, content-based, and trending
/// signals. Each source runs with 2x headroom; a candidate missing from
/// a source simply omits that term.
fn hybrid(
    state: &EngineState,
    snapshot: &TrainingSnapshot,
    request: &RecommendationRequest,
) -> Vec<Recommendation> {
    let config = &state.config;
    let headroom = request.max_recommendations * 2;

    let mut collaborative = request
        .customer_id
        .as_ref()
        .map(|customer| {
            collaborative_scores(snapshot, customer, &config.recommend, &config.similarity)
        })
        .unwrap_or_default();
    collaborative.truncate(headroom);

    let mut content = content_based_scores(
        snapshot,
        request.customer_id.as_ref(),
        &request.context_products,
        &config.recommend,
    );
    content.truncate(headroom);

    let mut trending = trending(state);
    trending.truncate(headroom);

    let sources = [
        (collaborative, config.recommend.hybrid_collaborative_weight),
        (content, config.recommend.hybrid_content_weight),
        (trending, config.recommend.hybrid_trending_weight),
    ];

    let mut combined: HashMap<ProductId, (f64, Vec<String>)> = HashMap::new();
    for (recommendations, weight) in sources {
        let max_score = recommendations.iter().map(|rec| rec.score).fold(0.0_f64, f64::max);
        if max_score <= 0.0 {
            continue;
        }
        for rec in recommendations {
            let entry = combined.entry(rec.product_id).or_insert_with(|| (0.0, Vec::new()));
            entry.0 += weight * (rec.score / max_score);
            for reason in rec.reasoning {
                if !entry.1.contains(&reason) {
                    entry.1.push(reason);
                }
            }
        }
    }

    let max_combined = combined.values().map(|(score, _)| *score).fold(0.0_f64, f64::max);
    let mut recommendations: Vec<Recommendation> = combined
        .into_iter()
        .map(|(product_id, (score, reasoning))| Recommendation {
            product_id,
            score,
            confidence: if max_combined > 0.0 { score / max_combined } else { 0.0 },
            reasoning,
            model: RecommendationModel::Hybrid,
        })
        .collect();

    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    recommendations
}

/// Popularity ranking from accumulated purchase counts; the universal
/// cold-start and degradation fallback.
fn popularity(snapshot: &TrainingSnapshot) -> Vec<Recommendation> {
    let ranking = snapshot.popularity_ranking();
    let max_count = ranking.first().map(|(_, count)| *count).unwrap_or(0) as f64;
    if max_count == 0.0 {
        return Vec::new();
    }

    ranking
        .into_iter()
        .map(|(product_id, count)| Recommendation {
            product_id,
            score: count as f64 / max_count,
            confidence: count as f64 / max_count,
            reasoning: vec!["Popular with shoppers".to_string()],
            model: RecommendationModel::Popularity,
        })
        .collect()
}

/// Engagement-weighted trending ranking from the performance counters.
fn trending(state: &EngineState) -> Vec<Recommendation> {
    let metrics = state.performance.snapshot();
    let mut scored: Vec<(ProductId, f64)> = metrics
        .into_iter()
        .filter(|(_, m)| m.impressions > 0)
        .map(|(product_id, m)| {
            let engagement =
                (m.clicks as f64 + 2.0 * m.conversions as f64) / (m.impressions as f64 + 1.0);
            (product_id, engagement)
        })
        .filter(|(_, engagement)| *engagement > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
    });

    let max = scored.first().map(|(_, score)| *score).unwrap_or(0.0);
    scored
        .into_iter()
        .map(|(product_id, score)| Recommendation {
            product_id,
            score: score / max,
            confidence: score / max,
            reasoning: vec!["Trending with shoppers right now".to_string()],
            model: RecommendationModel::Trending,
        })
        .collect()
}

/// Sparse feature vector from catalog attributes.
fn feature_vector(product: &Product) -> HashMap<String, f64> {
    let mut features = HashMap::new();
    features.insert(format!("category:{}", product.category), 1.0);
    if let Some(brand) = &product.brand {
        features.insert(format!("brand:{brand}"), 1.0);
    }
    features.insert(format!("price:{}", price_bucket(product.price)), 1.0);
    for tag in &product.tags {
        features.insert(format!("tag:{tag}"), 1.0);
    }
    if let Some(color) = &product.color {
        features.insert(format!("color:{color}"), 1.0);
    }
    if let Some(size) = &product.size {
        features.insert(format!("size:{size}"), 1.0);
    }
    features
}

fn price_bucket(price: Decimal) -> &'static str {
    let price = price.to_f64().unwrap_or(0.0);
    match price {
        p if p < 10.0 => "under_10",
        p if p < 25.0 => "10_25",
        p if p < 50.0 => "25_50",
        p if p < 100.0 => "50_100",
        p if p < 250.0 => "100_250",
        _ => "over_250",
    }
}
