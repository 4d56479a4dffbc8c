pub mod client;
pub mod config;
pub mod health;
pub mod idem;
pub mod metrics;
pub mod publisher;
pub mod rate_limit;

pub use config::AgentConfig;
pub use publisher::{Publisher, SubmitOutcome};
