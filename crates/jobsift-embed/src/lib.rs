//! Embedding generation for job postings.
//!
//! Wraps a TEI (Text Embeddings Inference) server: posting text is rendered
//! into a retrieval prompt, embedded in batches, and dimension-checked before
//! the vectors are handed to storage.

mod client;
mod error;

pub use client::{embedding_input, EmbedClient};
pub use error::EmbedError;
