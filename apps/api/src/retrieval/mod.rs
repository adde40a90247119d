// Retrieval-augmented answering over a single fetched page.
// Chunks are embedded, indexed in memory, and the top matches for the fixed
// impact query are handed to the completion model.

pub mod index;
pub mod prompts;
pub mod qa;
