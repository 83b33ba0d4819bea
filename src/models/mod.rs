//! Core data models for the video ingestion service.
//!
//! `Video` maps to the `videos` table via `sqlx::FromRow`; `VideoResponse`
//! is what callers see, serialized as JSON via `serde`.

pub mod reference;
pub mod video;
