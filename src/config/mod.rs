//! Configuration management for countdown-sync
//!
//! A single JSON file holds the process-level settings both surfaces share:
//! log level, store location and loop timings. Timer state never lives here;
//! that belongs to the shared store.

pub mod app;

pub use app::{AppConfig, Timings};
