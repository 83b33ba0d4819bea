//! Video ingestion service: accepts MP4 uploads for owned video records,
//! remuxes them for fast start, classifies their orientation, publishes
//! them to S3, and hands back short-lived signed URLs on read.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
