//! Scanner and live index for external links (web and `file://` URLs) found in
//! a mutable corpus of text documents.
//!
//! `link_parser::scan` classifies links in one document. `link_indexer::LinkIndex`
//! keeps a document -> links and URL -> documents index current as documents are
//! created, modified, renamed and deleted, publishing full snapshots to subscribers.

pub mod config;
pub mod document;
pub mod error;
pub mod link_indexer;
pub mod link_parser;

pub use config::IndexConfig;
pub use document::{DocumentEvent, DocumentRef, DocumentStore, Link, MemoryDocumentStore};
pub use error::{ExtLinksError, Result};
pub use link_indexer::{IndexSnapshot, Indices, LinkIndex, SubscriptionId};
pub use link_parser::scan;
