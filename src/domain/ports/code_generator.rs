use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::GenerationError;

/// Output of the code-generation collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    pub board: String,
    #[serde(default)]
    pub libraries: Vec<String>,
}

/// Port for the natural-language code generator
///
/// Treated as a slow but pure function of its inputs.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        existing_code: &str,
    ) -> Result<GeneratedCode, GenerationError>;
}
