//! Ingestion services, leaf-first: identity and metadata collaborators,
//! intake and staging, media tooling, classification and keying, the
//! object store, and the pipeline and materializer built on top of them.

pub mod auth;
pub mod classify;
pub mod intake;
pub mod materializer;
pub mod media;
pub mod object_key;
pub mod object_store;
pub mod pipeline;
pub mod staging;
pub mod video_repository;

#[cfg(test)]
pub(crate) mod testing;
