//! Auto Hunter API Library
//!
//! Core pipeline for AI-assisted car shopping: free-text queries become
//! structured search filters, retrieved listings get ranked and annotated by
//! a hosted model with lossless reconciliation, and a separate path scores a
//! pasted offer for price fairness and scam risk.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `fuel`: Fuel and running-cost estimates.
//! - `gemini`: Structured call client for the Gemini REST endpoint.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models and DTOs.
//! - `offer`: Offer evaluation (price fairness, scam risk).
//! - `search`: Query parsing, ranking/reconciliation and narratives.
//! - `source`: Retrieval boundary.

pub mod config;
pub mod errors;
pub mod fuel;
pub mod gemini;
pub mod handlers;
pub mod models;
pub mod offer;
pub mod search;
pub mod source;
