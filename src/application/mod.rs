//! Application services: the read path, invalidation and the small write
//! surface, independent of HTTP routing.

pub mod admin;
pub mod details;
pub mod error;
pub mod invalidation;
pub mod links;
pub mod metadata;
pub mod syndication;
