pub mod affinity;
pub mod config;
pub mod domain;
pub mod errors;
pub mod optimizer;
pub mod recommend;
pub mod similarity;
pub mod sources;
pub mod state;

pub use affinity::{
    AffinityAnalyzer, AffinityModel, AssociationRule, CategoryAffinity, NextPurchasePrediction,
    ProductBundle, ProductStats, SequentialPattern,
};
pub use config::{EngineConfig, LogFormat};
pub use domain::{
    Cart, CartId, CartItem, CartStatus, CustomerId, Order, OrderFilters, OrderId, OrderLine,
    Product, ProductId, Purchase, RecoveryAttempt, SessionEvent, SessionEventKind, SessionId,
    VolumeTier,
};
pub use errors::{EngineError, EngineResult};
pub use optimizer::{
    CartOptimization, CartOptimizer, OptimizationContext, OptimizationRule, RecoveryPlan,
    RecoveryStrategy,
};
pub use recommend::{
    Recommendation, RecommendationEngine, RecommendationFilters, RecommendationRequest,
    RecommendationResponse, Strategy,
};
pub use similarity::{cosine_similarity, pearson_correlation, SimilarityIndex};
pub use sources::{
    CatalogSource, EventSource, InMemoryCatalogSource, InMemoryEventSource, InMemoryOrderSource,
    OrderSource,
};
pub use state::{EngineState, LoggedResponse, PerformanceMetrics, PerformanceTracker};
