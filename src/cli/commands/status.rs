//! `status`: print a request's current status record.

use anyhow::{Context, Result};

use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::StatusRecord;
use crate::infrastructure::store::paths;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub request_id: String,
    pub record: Option<StatusRecord>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let Some(record) = &self.record else {
            return format!("No status reported yet for {}", self.request_id);
        };

        let mut lines = vec![
            format!("Request: {}", self.request_id),
            record.summary_line(),
        ];
        if let Some(log_id) = record.log_id() {
            lines.push(format!("Log: {log_id}"));
        }
        if let Some(build_id) = record.build_id() {
            lines.push(format!("Build: {build_id}"));
        }
        if !record.history.is_empty() {
            lines.push("\nHistory:".to_string());
            lines.extend(record.history.iter().map(|h| format!("  - {h}")));
        }
        lines.join("\n")
    }
}

pub async fn execute(ctx: &CliContext, request_id: String, json_mode: bool) -> Result<()> {
    let path = paths::status(&request_id);
    let record = ctx
        .store
        .read(&path)
        .await?
        .map(serde_json::from_value::<StatusRecord>)
        .transpose()
        .with_context(|| format!("Unreadable status record at {path}"))?;

    output(&StatusOutput { request_id, record }, json_mode);
    Ok(())
}
