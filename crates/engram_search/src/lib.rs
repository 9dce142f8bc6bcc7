//! Hybrid retrieval pipeline for the Engram memory service.
//!
//! The pipeline is: validate filters, embed the query variants, generate
//! per-source candidates under the access predicate, fuse variants with
//! Reciprocal Rank Fusion, adjust by stored feedback, return the top K.
//! The filter engine, fusion, and re-scorer are pure; all I/O lives in the
//! embedding gateway and the storage adapter.

pub mod embedding;
pub mod filters;
pub mod fusion;
pub mod hybrid;
pub mod ief;

pub use embedding::{DeterministicEmbedder, EmbeddingConfig, EmbeddingGateway, OpenAiEmbedder};
pub use filters::validate_filters;
pub use fusion::{dedup_highest_score, fuse_variants, RRF_K};
pub use hybrid::{HybridSearch, SearchRequest, DEFAULT_TOP_K, MAX_QUERY_VARIANTS, MAX_TOP_K};
pub use ief::{apply_feedback, FEEDBACK_STEP};
