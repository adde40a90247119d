// Impact API: one endpoint that runs the whole pipeline for a URL.
// All provider calls go through llm_client; no direct OpenAI calls here.

pub mod handlers;
pub mod pipeline;
