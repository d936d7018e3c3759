pub mod catalog;
pub mod cost;
pub mod history;
pub mod invoker;
pub mod providers;
pub mod routing;
pub mod service;
pub mod types;

// Re-export core types at crate root for convenience.
pub use catalog::{ProviderCatalog, ProviderDescriptor, TaskProviderMapping, TierPolicy};
pub use history::{
    HistoricalReader, HistoricalStats, InMemoryScoreHistory, PersistenceError, ScoreRecord,
    ScoreSink,
};
pub use invoker::{HttpInvoker, Invoker, ModelHandle, ModelInvoker, ModelTarget};
pub use providers::{AiProvider, ProviderError};
pub use routing::{
    Decision, RouteRequest, RouterError, RoutingOptions, RoutingOrchestrator, RoutingResult,
};
pub use service::RouterService;
pub use types::*;
