//! Core of pilotdeck: remote-data acquisition against the game's HTTP API
//! (credential refresh, retries with backoff, response caching) plus the
//! skill-plan qualification engine that classifies every character against
//! every locally-defined plan.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod plans;
pub mod qualify;
pub mod resilience;
pub mod roster;

pub use auth::AuthError;
pub use auth::Credential;
pub use auth::CredentialHandle;
pub use auth::CredentialRefresher;
pub use catalog::CatalogError;
pub use catalog::SkillCatalog;
pub use catalog::SkillCatalogEntry;
pub use client::ApiClient;
pub use client::FetchError;
pub use config::Config;
pub use config::ConfigError;
pub use plans::PlanError;
pub use plans::PlanStore;
pub use plans::SkillPlan;
pub use plans::parse_plan_text;
pub use plans::render_plan_text;
pub use qualify::EvaluationReport;
pub use qualify::PlanEvaluation;
pub use qualify::PlanStatus;
pub use qualify::evaluate;
pub use resilience::BreakerError;
pub use resilience::CircuitBreaker;
pub use resilience::ResponseCache;
pub use resilience::RetryPolicy;
pub use roster::Character;
pub use roster::QueuedSkillEntry;
pub use roster::Roster;
pub use roster::TrainedSkill;
pub use roster::refresh_roster;
