use crate::error::GenerationError;
use async_trait::async_trait;

#[async_trait]
pub trait Generator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
