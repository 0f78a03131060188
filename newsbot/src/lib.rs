pub mod dedup;
pub mod embedding;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod publisher;
pub mod scraping;
pub mod selector;
pub mod similarity;
pub mod staleness;
pub mod storage;
pub mod story;
pub mod summary_gate;
pub mod window;
pub mod worker;
