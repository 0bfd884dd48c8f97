// Session-scoped retrieval core
// Per-session vector indexes with durable persistence and a two-stage
// retrieval pipeline (threshold filter + heuristic rerank) on top

pub mod errors;
pub mod flat_index;
pub mod retriever;
pub mod session_index;
pub mod store;

pub use errors::RagError;
pub use flat_index::{FlatIpIndex, NO_MATCH_ID};
pub use retriever::{
    HeuristicBooster, RetrievedChunk, Retriever, ScoringStrategy, MAX_SEARCH_K, OVERFETCH_FACTOR,
};
pub use session_index::{SearchResult, SessionIndex, VectorMetadata};
pub use store::{
    CacheMetrics, FileSummary, SessionStatus, SessionVectorStore, UpsertItem,
};
