//! Folio - Ask questions about your voice notes
//!
//! Voice-note transcripts are split into overlapping word windows, embedded
//! and stored per note. Questions are answered per folder by retrieving the
//! nearest chunks and grounding an LLM completion in them.

pub mod chunking;
pub mod cli;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod retrieval;
pub mod service;
pub mod storage;

pub use error::{FolioError, Result};
