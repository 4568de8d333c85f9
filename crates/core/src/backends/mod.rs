pub mod gemini;

pub use gemini::{GeminiBackend, GeminiConfig, GEMINI_EMBEDDING_DIMENSIONS};
