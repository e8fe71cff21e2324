//! quizgate: a metadata-driven CRUD engine for a quiz platform.
//!
//! Every table is described once by a [`engine::TableDescriptor`] (schema,
//! access pragmas, validators, computed and hidden fields) and served by the
//! single generic [`engine::Table`] orchestrator.

pub mod connection;
pub mod core;
pub mod domain;
pub mod engine;
pub mod storage;
pub mod web;

pub use connection::{ActorResolver, AppConfig, SeedPool, SessionResolver, StaticSeedPool};
pub use core::{Actor, Role, SeedError, StoreError, Value};
pub use domain::Tables;
pub use engine::{Data, Envelope, Response, Status, Table, TableDescriptor};
pub use storage::{MemoryTable, Model, Persistable};
pub use web::api_router;
