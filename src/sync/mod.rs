//! Mutation sync: keeping indexes in step with the primary store

pub mod mutation;
pub mod projector;
pub mod worker;

pub use mutation::{CommitFailure, MutationSync, SyncFailure, SyncReport};
pub use projector::{identifier, project};
pub use worker::SyncWorker;
