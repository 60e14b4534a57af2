//! `compile`: run a full compilation job and save the binary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::application::JobOrchestrator;
use crate::cli::output::{output, CommandOutput, JobProgress};
use crate::cli::types::CompileArgs;
use crate::cli::CliContext;
use crate::domain::models::{FileKind, JobOrigin, JobSpec, OriginInfo};

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub request_id: String,
    pub build_id: String,
    pub kind: FileKind,
    pub path: PathBuf,
    pub size: usize,
    pub attempts: u32,
}

impl CommandOutput for CompileOutput {
    fn to_human(&self) -> String {
        format!(
            "Build {} ({}) saved to {} ({} bytes)",
            self.build_id,
            self.kind,
            self.path.display(),
            self.size
        )
    }
}

fn client_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map_or_else(|_| "cli".to_string(), |user| format!("cli-{user}"))
}

pub async fn execute(ctx: &CliContext, args: CompileArgs, json_mode: bool) -> Result<()> {
    let code = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut origin = OriginInfo::new(JobOrigin::Cli, client_id());
    if let Some(project) = args.project {
        origin = origin.with_project(project);
    }

    let orchestrator = JobOrchestrator::builder(ctx.store.clone(), ctx.config.clone()).build()?;
    let progress = JobProgress::follow(orchestrator.user_log(), !json_mode);

    let run = orchestrator.run(JobSpec {
        code,
        board: args.board,
        libraries: args.libraries,
        origin,
        history_id: None,
    });
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel().await;
            run.await
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.finish_error("Compilation failed");
            return Err(e.into());
        }
    };

    // Only the file name part of what the agent reported is trusted.
    let path = args.out.unwrap_or_else(|| {
        Path::new(&outcome.artifact.filename)
            .file_name()
            .map_or_else(
                || PathBuf::from(format!("{}.{}", outcome.build_id, outcome.artifact.kind)),
                PathBuf::from,
            )
    });
    tokio::fs::write(&path, &outcome.artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    progress.finish_success(format!("Compiled in {} attempt(s)", outcome.attempts));

    output(
        &CompileOutput {
            request_id: outcome.request_id,
            build_id: outcome.build_id,
            kind: outcome.artifact.kind,
            path,
            size: outcome.artifact.bytes.len(),
            attempts: outcome.attempts,
        },
        json_mode,
    );
    Ok(())
}
