//! LessonForge: an outline-driven, quality-gated generation pipeline for
//! educational material.
//!
//! A job asks for one topic, one audience and a set of content types. The
//! pipeline generates a master outline, fans out to the requested
//! derivatives, scores every draft and keeps only what clears its quality
//! threshold.

pub mod anthropic;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod generation;
pub mod manager;
pub mod orchestrator;
pub mod prompt;
pub mod quality;
pub mod queue;
pub mod server;
pub mod state_machine;
pub mod store;
pub mod ui;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ForgeError;
