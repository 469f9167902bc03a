// src/ingest/providers/mod.rs
pub mod bsky;
pub mod fixture;
