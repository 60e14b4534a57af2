//! `fetch`: download an artifact of a finished build.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::FetchArgs;
use crate::cli::CliContext;
use crate::domain::models::FileKind;
use crate::services::ArtifactFetcher;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutput {
    pub build_id: String,
    pub kind: FileKind,
    pub path: PathBuf,
    pub size: usize,
}

impl CommandOutput for FetchOutput {
    fn to_human(&self) -> String {
        format!(
            "Wrote {} ({} bytes, {}) from build {}",
            self.path.display(),
            self.size,
            self.kind,
            self.build_id
        )
    }
}

pub async fn execute(ctx: &CliContext, args: FetchArgs, json_mode: bool) -> Result<()> {
    let fetcher = ArtifactFetcher::new(
        ctx.store.clone(),
        ctx.config.artifacts.preference.clone(),
        Duration::from_secs(ctx.config.artifacts.download_timeout_secs),
    )?;

    let (kind, bytes) = match args.kind {
        Some(kind) => (kind, fetcher.download(&args.build_id, kind).await?),
        None => {
            let artifact = fetcher.fetch(&args.build_id).await?;
            (artifact.kind, artifact.bytes)
        }
    };

    tokio::fs::write(&args.out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    output(
        &FetchOutput {
            build_id: args.build_id,
            kind,
            path: args.out,
            size: bytes.len(),
        },
        json_mode,
    );
    Ok(())
}
