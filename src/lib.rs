//! Pockets: a bookmark aggregator that serves curated links from a
//! third-party key/value API through a revalidating cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod presentation;
pub mod upstream;
