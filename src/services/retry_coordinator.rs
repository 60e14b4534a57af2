//! Bounded automatic retry after a remote build failure.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::GenerationError;
use crate::domain::ports::{CodeGenerator, GeneratedCode};

/// Decides whether a failed build gets another attempt and produces the
/// replacement code for it
pub struct RetryCoordinator {
    generator: Option<Arc<dyn CodeGenerator>>,
    max_auto_retries: u32,
}

impl RetryCoordinator {
    pub fn new(generator: Option<Arc<dyn CodeGenerator>>, max_auto_retries: u32) -> Self {
        Self {
            generator,
            max_auto_retries,
        }
    }

    pub fn max_auto_retries(&self) -> u32 {
        self.max_auto_retries
    }

    /// `attempts` counts submissions already made for this job, the first included.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.generator.is_some() && attempts <= self.max_auto_retries
    }

    /// Prompt asking the generator to repair code that failed to compile.
    pub fn build_prompt(message: &str, board: &str) -> String {
        let message = message.trim();
        let message = if message.is_empty() {
            "The compiler did not report a reason."
        } else {
            message
        };
        format!(
            "The code failed to compile for board {board}.\n\n\
             Compiler output:\n{message}\n\n\
             Fix the code so that it compiles. Keep the existing behaviour and \
             only change what is needed to resolve the error."
        )
    }

    /// Ask the generator for corrected code.
    pub async fn regenerate(
        &self,
        failure_message: &str,
        board: &str,
        existing_code: &str,
    ) -> Result<GeneratedCode, GenerationError> {
        let generator = self.generator.as_ref().ok_or(GenerationError::Unavailable)?;
        let prompt = Self::build_prompt(failure_message, board);

        info!(board = %board, "requesting corrected code");
        let generated = generator.generate(&prompt, existing_code).await?;
        if generated.code.trim().is_empty() {
            warn!("code generator returned empty code");
            return Err(GenerationError::Empty);
        }
        Ok(generated)
    }
}
