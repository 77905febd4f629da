//! Retrieval-augmented generation: vector-store retrieval, prompt assembly
//! and provider dispatch.

pub mod generator;
pub mod retriever;
pub mod vector_store;

pub use generator::{AnswerGenerator, Citation, GeneratedAnswer};
pub use retriever::{ContextRetriever, RetrievedChunk, DEFAULT_TOP_K};
pub use vector_store::VectorStoreClient;
