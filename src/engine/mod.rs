//! The metadata-driven CRUD engine.
//!
//! A [`TableDescriptor`] declares what a table allows; a [`Table`] runs every
//! operation through projection, validation, authorization, computation,
//! persistence and masking, and answers with a uniform [`Response`].

pub mod access;
pub mod descriptor;
pub mod orchestrator;
pub mod pipeline;
pub mod projector;
pub mod response;
pub mod seed;

pub use access::{
    AccessPragma, Authorization, ConditionalAccess, Crud, Decision, Permission, authorize_many,
    authorize_roles,
};
pub use descriptor::{ComputedField, Placeholder, Relation, SeedPragma, TableDescriptor, Validator};
pub use orchestrator::{Table, UNAUTHENTICATED};
pub use projector::project;
pub use response::{Data, Envelope, Record, Response, SeedSummary, Status};
