mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use quarry_core::config::{load_dotenv, Config};
use quarry_core::{GenerationResult, Metadata};
use quarry_engine::Engine;
use quarry_ingest::document::decode_text;
use serde_json::json;
use tracing::info;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = match args.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };

    if let Command::Config = args.command {
        let mut summary = config.redacted_summary();
        summary["available_profiles"] = json!(Config::available_profiles());
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    config.validate().context("invalid configuration")?;
    config.log_summary();
    let engine = Engine::from_config(&config).context("failed to initialize engine")?;

    match args.command {
        Command::Ingest { file, id } => ingest(&engine, &file, id).await?,
        Command::Retrieve { query, k } => {
            let k = k.unwrap_or(config.retrieval.top_k);
            let passages = engine
                .retrieve(&query, k)
                .await
                .context("retrieval failed")?;
            println!("{}", serde_json::to_string_pretty(&passages)?);
        }
        Command::Ask { query } => {
            let result = engine
                .generate(&query)
                .await
                .context("generation failed")?;
            print_answer(&result);
        }
        Command::Delete { document_id } => {
            engine
                .delete_document(&document_id)
                .await
                .with_context(|| format!("failed to delete document '{document_id}'"))?;
            println!("deleted {document_id}");
        }
        Command::Config => {}
    }
    Ok(())
}

async fn ingest(engine: &Engine, file: &Path, id: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let content = decode_text(&bytes);
    let document_id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let mut metadata = Metadata::new();
    metadata.insert("filename".into(), json!(filename));
    metadata.insert("size".into(), json!(bytes.len()));
    metadata.insert("ingested_at".into(), json!(chrono::Utc::now().to_rfc3339()));

    info!(%document_id, file = %file.display(), bytes = bytes.len(), "ingesting file");
    let report = engine
        .ingest(&document_id, &content, metadata)
        .await
        .with_context(|| format!("failed to ingest {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_answer(result: &GenerationResult) {
    println!("{}", result.response.trim());
    if result.context.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (rank, passage) in result.context.iter().enumerate() {
        let source = passage
            .metadata
            .get("filename")
            .and_then(|v| v.as_str())
            .or_else(|| passage.parent_id())
            .unwrap_or("unknown");
        let chunk = passage
            .chunk_index()
            .map(|i| format!(" #{i}"))
            .unwrap_or_default();
        println!(
            "  [{}] {}{} ({:.1}%)",
            rank + 1,
            source,
            chunk,
            passage.similarity * 100.0
        );
    }
}
