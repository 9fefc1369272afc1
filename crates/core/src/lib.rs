//! Core library: text extraction, LLM classification, and the user-scoped
//! document library built on top of them.

pub mod app;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod library;
pub mod models;
pub mod options;
pub mod orchestrator;

pub use error::{Error, ExtractError, Result};
