//! Core types and shared functionality for pagewalk.
//!
//! This crate provides:
//! - The gallery store with in-memory and SQLite backends
//! - Preload cache eviction and master list assembly
//! - The store message protocol and its background service
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod eviction;
pub mod protocol;
pub mod sequence;
pub mod service;
pub mod store;

pub use config::{AppConfig, ConfigError, SharedConfig};
pub use error::Error;
pub use eviction::PreloadCache;
pub use protocol::{Request, Response, dispatch};
pub use service::{StoreClient, StoreService};
pub use store::{GalleryBackend, GalleryDb, GalleryRecord, GalleryStore, MemoryBackend};
