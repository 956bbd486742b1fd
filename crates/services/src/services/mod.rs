pub mod ai_client;
pub mod anthropic;
pub mod archive;
pub mod backend_detection;
pub mod config;
pub mod gemini;
pub mod generation;
pub mod openai;
pub mod prompt_composer;
pub mod response_parser;
