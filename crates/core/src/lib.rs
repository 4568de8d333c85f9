pub mod backends;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod loader;
pub mod models;
pub mod presenter;
pub mod session;

pub use backends::{GeminiBackend, GeminiConfig, GEMINI_EMBEDDING_DIMENSIONS};
pub use chunking::{chunk_passages, normalize_whitespace, ChunkingConfig};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ConfigError, EmbedError, GenerationError, IndexError, LoadError, RetrievalError, SessionError,
};
pub use extractor::{LopdfExtractor, PlainTextExtractor, SourceKind, TextExtractor};
pub use generation::Generator;
pub use index::{IndexCache, VectorIndex};
pub use loader::{
    discover_source_files, document_from_file, load_documents, LoadReport, SkippedFile,
};
pub use models::{
    Document, Message, RetrievalResult, Role, ScoredPassage, SessionOptions,
};
pub use presenter::{Granularity, PresentationChunk, PresentationStream, Presenter};
pub use session::{ChatSession, SessionState, Turn, TurnFailure, ERROR_REPLY};
