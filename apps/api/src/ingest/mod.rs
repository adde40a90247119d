// Document ingestion: fetch a page, reduce it to text, split it into chunks
// small enough to embed. Nothing here is persisted; every request re-fetches.

pub mod loader;
pub mod splitter;

/// Text pulled from one source URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

/// A split piece of a [`Document`], ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source: String,
    pub index: usize,
    pub text: String,
}
