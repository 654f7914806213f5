//! docent - document training and retrieval backend for RAG chatbots
//!
//! Trains chatbots on documents (blob-stored PDFs and text, Google
//! Docs/Sheets) and serves grounded context at query time. Documents are
//! fragmented, embedded and stored in a vector index; a durable tracking
//! store records which bots rely on which documents and keeps the two in
//! sync as sources change or bots let go of documents.

pub mod commands;
pub mod config;
pub mod document;
pub mod embed;
pub mod error;
pub mod extract;
pub mod fragment;
pub mod lifecycle;
pub mod progress;
pub mod registry;
pub mod search;
pub mod store;
pub mod tracking;
pub mod train;

pub use config::Config;
pub use document::{Document, SourceKind};
pub use error::{Error, Result};
pub use lifecycle::{DetachOutcome, DocumentStatus, Lifecycle, RemoveOutcome};
pub use search::ContextSearcher;
pub use train::{Trainer, TrainingOutcome};
