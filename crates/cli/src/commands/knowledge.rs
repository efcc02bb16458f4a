//! Knowledge command handler.
//!
//! Loads pre-chunked sources into the local store and reports on it.

use clap::{Args, Subcommand};
use sift_core::{config::AppConfig, AppResult};
use sift_knowledge::LoadOptions;
use std::path::PathBuf;

/// Knowledge store management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Load pre-chunked JSONL files or directories
    Load(KnowledgeLoadCommand),
    /// Show knowledge store statistics
    Stats(KnowledgeStatsCommand),
    /// Remove every document and chunk
    Clean(KnowledgeCleanCommand),
}

/// Load chunk files
#[derive(Args, Debug)]
pub struct KnowledgeLoadCommand {
    /// JSONL files or directories to load
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Reset the store before loading
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLoadCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge load command for {} path(s)", self.paths.len());

        let options = LoadOptions {
            paths: self.paths.clone(),
            reset: self.reset,
        };

        let stats = sift_knowledge::load(&config.workspace, options, &config.embedding).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Loaded {} chunks from {} documents ({} files, {} blank skipped) in {:.2}s",
                stats.chunks_count,
                stats.documents_count,
                stats.files_count,
                stats.skipped_count,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Show knowledge store stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge stats command");

        let stats = sift_knowledge::stats(&config.workspace)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            let index_path = sift_knowledge::config::get_index_path(&config.workspace);
            println!("Knowledge store: {:?}", index_path);
            println!("  Documents: {}", stats.documents_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
        }

        Ok(())
    }
}

/// Clean knowledge store
#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {}

impl KnowledgeCleanCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge clean command");

        sift_knowledge::clean(&config.workspace)?;

        println!("Knowledge store cleaned");

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Load(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config),
            KnowledgeAction::Clean(cmd) => cmd.execute(config),
        }
    }
}
