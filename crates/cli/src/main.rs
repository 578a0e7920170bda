//! PromptRelay CLI - submit prompts and manage platform sessions through the daemon

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "promptrelay")]
#[command(about = "PromptRelay CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PROMPTRELAY_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one prompt
    Submit {
        /// Target platform (midjourney, ideogram, firefly, leonardo)
        #[arg(short, long)]
        service: String,

        /// Prompt text
        prompt: String,
    },

    /// Submit every non-blank line of a file, in order
    Batch {
        #[arg(short, long)]
        service: String,

        /// File with one prompt per line
        #[arg(short, long)]
        file: PathBuf,

        /// Minimum pause between prompts
        #[arg(short, long, default_value = "0")]
        delay_ms: u64,
    },

    /// Show whether the platform session looks logged in
    Status {
        #[arg(short, long)]
        service: String,
    },

    /// Close the platform session
    Close {
        #[arg(short, long)]
        service: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct SubmitResult {
    success: bool,
    error: Option<String>,
    note: Option<String>,
    method: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResult {
    prompt: String,
    success: bool,
    error: Option<String>,
    note: Option<String>,
    method: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResult {
    success: bool,
    results: Vec<JobResult>,
    success_count: usize,
    fail_count: usize,
    halted_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResult {
    service: String,
    backend: String,
    logged_in: bool,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Prompt")]
    prompt: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

const PROMPT_PREVIEW_CHARS: usize = 48;

fn preview(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_PREVIEW_CHARS {
        return prompt.to_string();
    }
    let cut: String = prompt.chars().take(PROMPT_PREVIEW_CHARS - 1).collect();
    format!("{}…", cut)
}

impl JobRow {
    fn new(index: usize, job: JobResult) -> Self {
        Self {
            index,
            prompt: preview(&job.prompt),
            result: if job.success { "ok" } else { "failed" }.to_string(),
            method: job.method.unwrap_or_default(),
            detail: job.error.or(job.note).unwrap_or_default(),
        }
    }
}

/// Non-blank lines, trimmed, in file order
fn read_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { service, prompt } => {
            let params = json!({ "service": service, "prompt": prompt });
            let result = call_rpc(&cli.rpc_url, "prompt.submit.v1", params).await?;
            let submit: SubmitResult = serde_json::from_value(result)?;

            if submit.success {
                let method = submit.method.unwrap_or_default();
                println!(
                    "{}",
                    format!("✓ Prompt submitted to {} ({})", service, method)
                        .green()
                        .bold()
                );
                if let Some(note) = submit.note {
                    println!("  {} {}", "Note:".bold(), note);
                }
            } else {
                println!("{}", format!("✗ Submission to {} failed", service).red().bold());
                if let Some(error) = submit.error {
                    println!("  {} {}", "Error:".bold(), error);
                }
            }
        }

        Commands::Batch {
            service,
            file,
            delay_ms,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let prompts = read_prompts(&text);
            if prompts.is_empty() {
                anyhow::bail!("{} contains no prompts", file.display());
            }

            println!(
                "{}",
                format!("Submitting {} prompts to {}...", prompts.len(), service)
                    .cyan()
                    .bold()
            );
            let params = json!({ "service": service, "prompts": prompts, "delayMs": delay_ms });
            let result = call_rpc(&cli.rpc_url, "prompt.batch.v1", params).await?;
            let batch: BatchResult = serde_json::from_value(result)?;

            println!();
            let rows: Vec<JobRow> = batch
                .results
                .into_iter()
                .enumerate()
                .map(|(i, job)| JobRow::new(i + 1, job))
                .collect();
            println!("{}", Table::new(rows));
            println!();

            let summary = format!(
                "{} succeeded, {} failed",
                batch.success_count, batch.fail_count
            );
            if batch.success {
                println!("{}", format!("✓ {}", summary).green().bold());
            } else {
                println!("{}", format!("✗ {}", summary).yellow().bold());
            }
            if let Some(reason) = batch.halted_by {
                println!("  {} {}", "Halted:".bold(), reason.red());
            }
        }

        Commands::Status { service } => {
            println!("{}", "Session Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "session.status.v1", json!({ "service": service })).await {
                Ok(result) => {
                    let status: StatusResult = serde_json::from_value(result)?;
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Service:".bold(), status.service);
                    println!("  {} {}", "Backend:".bold(), status.backend);
                    let login = if status.logged_in {
                        "LOGGED IN".green()
                    } else {
                        "LOGGED OUT".red()
                    };
                    println!("  {} {} (advisory)", "Session:".bold(), login);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Close { service } => {
            let result = call_rpc(&cli.rpc_url, "session.close.v1", json!({ "service": service })).await?;
            if result["closed"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Session for {} closed", service).green().bold());
            } else {
                println!("{}", format!("○ No open session for {}", service).yellow());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_prompts_skips_blank_lines() {
        let text = "a cat in a hat\n\n   \n  a fox at dawn  \r\nlast one";
        assert_eq!(
            read_prompts(text),
            vec!["a cat in a hat", "a fox at dawn", "last one"]
        );
    }

    #[test]
    fn test_cli_parses_batch() {
        let cli = Cli::try_parse_from([
            "promptrelay",
            "--rpc-url",
            "http://127.0.0.1:9999",
            "batch",
            "--service",
            "leonardo",
            "--file",
            "prompts.txt",
            "--delay-ms",
            "2500",
        ])
        .unwrap();
        assert_eq!(cli.rpc_url, "http://127.0.0.1:9999");
        match cli.command {
            Commands::Batch {
                service,
                file,
                delay_ms,
            } => {
                assert_eq!(service, "leonardo");
                assert_eq!(file, PathBuf::from("prompts.txt"));
                assert_eq!(delay_ms, 2500);
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_job_row_prefers_error_over_note() {
        let row = JobRow::new(
            2,
            JobResult {
                prompt: "x".repeat(80),
                success: false,
                error: Some("Element not found: textarea".into()),
                note: Some("diagnostics: /tmp/a.html".into()),
                method: Some("click".into()),
            },
        );
        assert_eq!(row.result, "failed");
        assert_eq!(row.detail, "Element not found: textarea");
        assert_eq!(row.prompt.chars().count(), PROMPT_PREVIEW_CHARS);
    }
}
