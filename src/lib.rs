//! Nippon News - A Japanese RSS News Aggregator
//!
//! This crate fetches several category feeds concurrently through a CORS relay,
//! normalizes them into a single chronological stream and supports keyword
//! search over the merged result. A small JSON API exposes the pipeline.

pub mod aggregator;
pub mod config;
pub mod dates;
pub mod fetcher;
pub mod image;
pub mod normalizer;
pub mod parser;
pub mod registry;
pub mod routes;
pub mod search;
