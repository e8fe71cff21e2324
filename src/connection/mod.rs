//! Collaborators at the edge of the engine: who is calling, how the process
//! is configured, and where seed data comes from.

pub mod auth;
pub mod config;
pub mod seed;

pub use auth::{ActorResolver, SessionResolver, bearer_token};
pub use config::AppConfig;
pub use seed::{GistSeedPool, SeedPool, SeedRecord, StaticSeedPool};
