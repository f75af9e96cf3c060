//! Content enhancement infrastructure - HTTP-backed enhancers

pub mod http_client;
mod openai;

pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiEnhancer;
