pub mod backoff;
pub mod breaker;
pub mod cache;

pub use backoff::RetryPolicy;
pub use breaker::BreakerError;
pub use breaker::BreakerState;
pub use breaker::CircuitBreaker;
pub use cache::CacheError;
pub use cache::DEFAULT_CHARACTER_TTL;
pub use cache::DEFAULT_SWEEP_INTERVAL;
pub use cache::ResponseCache;
