pub mod bracket_service;
pub mod bracket_store;
pub mod card_service;
pub mod insight_service;
pub mod photo_service;
pub mod rate_limit_service;
pub mod share_service;
pub mod tournament_service;

#[cfg(test)]
mod bracket_service_test;

pub use bracket_service::{BracketEngine, BracketError, BracketStore, RankedPhoto};
pub use bracket_store::PgBracketStore;
pub use card_service::{CardDocument, CardRenderer, DocumentCardRenderer};
pub use insight_service::{InsightGenerator, InsightReport, OpenAiInsightGenerator, RetryConfig};
pub use photo_service::PhotoService;
pub use rate_limit_service::RateLimitService;
pub use share_service::ShareService;
pub use tournament_service::TournamentService;
