//! Session command handler.
//!
//! Runs an interactive retrieval session over stdin. The reasoning side
//! (`search`, `synthesize`, `stats`) and the observer side (`approve`,
//! `clear`, `config`) share one session, the way a chat agent and its review
//! panel would.

use clap::Args;
use sift_core::{config::AppConfig, AppError, AppResult};
use sift_workflow::{
    describe, Chunk, JsonLinesSink, NullSink, RetrievalCoordinator, SearchConfig, SearchType, Session,
    SessionRegistry, SnapshotSink, SynthesisAssembler,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands:
  search <query>             Search the knowledge store
  approve <id|#>...          Approve chunks by id or by list position
  approve all                Approve every retrieved chunk
  clear                      Clear all approvals
  config key=value...        Set threshold=<0-1>, max=<n>, type=semantic|hybrid
  synthesize                 Assemble the approved chunks as context
  state                      Describe the current session
  stats                      Refresh knowledge store statistics
  session <id>               Switch to (or create) another session
  sessions                   List sessions
  help                       Show this help
  quit                       Leave";

/// Interactive retrieval session
#[derive(Args, Debug)]
pub struct SessionCommand {
    /// Session to start in
    #[arg(long, default_value = "default")]
    pub id: String,

    /// Append state snapshot events (JSON lines) to this file
    #[arg(long)]
    pub snapshots: Option<PathBuf>,

    /// Print each reply as a JSON object
    #[arg(long)]
    pub json: bool,
}

/// Partial search config update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub threshold: Option<f32>,
    pub max_results: Option<usize>,
    pub search_type: Option<SearchType>,
}

impl ConfigUpdate {
    fn apply(&self, mut config: SearchConfig) -> SearchConfig {
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(search_type) = self.search_type {
            config.search_type = search_type;
        }
        config
    }
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Search(String),
    Approve(Vec<String>),
    ApproveAll,
    Clear,
    Config(ConfigUpdate),
    Synthesize,
    State,
    Stats,
    Switch(String),
    Sessions,
    Help,
    Quit,
}

impl FromStr for ReplCommand {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "s" => {
                if rest.is_empty() {
                    return Err(AppError::Validation("Usage: search <query>".to_string()));
                }
                Self::Search(rest.to_string())
            }
            "approve" | "a" => match rest {
                "" => {
                    return Err(AppError::Validation(
                        "Usage: approve <id|#>... | approve all".to_string(),
                    ))
                }
                "all" => Self::ApproveAll,
                ids => Self::Approve(ids.split_whitespace().map(str::to_string).collect()),
            },
            "clear" => Self::Clear,
            "config" => Self::Config(parse_config(rest)?),
            "synthesize" | "synth" => Self::Synthesize,
            "state" => Self::State,
            "stats" => Self::Stats,
            "session" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(AppError::Validation("Usage: session <id>".to_string()));
                }
                Self::Switch(rest.to_string())
            }
            "sessions" => Self::Sessions,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown command '{}'. Type 'help' for commands",
                    other
                )))
            }
        };

        Ok(command)
    }
}

fn parse_config(args: &str) -> AppResult<ConfigUpdate> {
    if args.is_empty() {
        return Err(AppError::Validation(
            "Usage: config threshold=<0-1> max=<n> type=semantic|hybrid".to_string(),
        ));
    }

    let mut update = ConfigUpdate::default();
    for pair in args.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Validation(format!("Expected key=value, got '{}'", pair)))?;

        match key {
            "threshold" => {
                update.threshold = Some(value.parse().map_err(|_| {
                    AppError::Validation(format!("Invalid threshold '{}'", value))
                })?)
            }
            "max" | "max_results" => {
                update.max_results = Some(value.parse().map_err(|_| {
                    AppError::Validation(format!("Invalid max results '{}'", value))
                })?)
            }
            "type" | "search_type" => update.search_type = Some(value.parse()?),
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown config key '{}'",
                    other
                )))
            }
        }
    }

    Ok(update)
}

/// Resolve approval tokens against the current chunk list.
///
/// A token equal to a retrieved chunk id names that chunk. Otherwise a
/// number, optionally written `#n`, is a 1-based list position, and any
/// other token is kept as a chunk id.
fn resolve_approvals(chunks: &[Chunk], tokens: &[String]) -> AppResult<Vec<String>> {
    tokens
        .iter()
        .map(|token| {
            if chunks.iter().any(|c| &c.chunk_id == token) {
                return Ok(token.clone());
            }

            let position = token.strip_prefix('#').unwrap_or(token);
            match position.parse::<usize>() {
                Ok(position) => chunks
                    .get(position.wrapping_sub(1))
                    .map(|c| c.chunk_id.clone())
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "No chunk at position {} ({} retrieved)",
                            position,
                            chunks.len()
                        ))
                    }),
                Err(_) => Ok(token.clone()),
            }
        })
        .collect()
}

enum Flow {
    Reply(String),
    Quit,
}

struct Repl {
    registry: SessionRegistry,
    coordinator: RetrievalCoordinator,
    assembler: SynthesisAssembler,
    current: Arc<Session>,
}

impl Repl {
    /// Open the knowledge store and start in session `id`.
    fn open(config: &AppConfig, id: &str, sink: Arc<dyn SnapshotSink>) -> AppResult<Self> {
        let index = Arc::new(sift_knowledge::open_index(&config.workspace)?);
        let embedder = sift_knowledge::create_provider(&config.embedding)?;
        let coordinator = RetrievalCoordinator::new(
            embedder,
            index.clone(),
            index,
            config.retrieval.clone(),
        );

        let registry = SessionRegistry::new(
            SearchConfig::from_settings(&config.retrieval),
            config.retrieval.max_match_count,
            sink,
        );
        let current = registry.get_or_create(id);

        Ok(Self {
            registry,
            coordinator,
            assembler: SynthesisAssembler::new(),
            current,
        })
    }

    async fn run(&mut self, command: ReplCommand) -> AppResult<Flow> {
        let session = Arc::clone(&self.current);

        let reply = match command {
            ReplCommand::Search(query) => self
                .coordinator
                .execute_search(&session, &query)
                .await?
                .message(),
            ReplCommand::Approve(tokens) => {
                let state = session.state();
                let mut ids: BTreeSet<String> = state.approvals().ids().clone();
                ids.extend(resolve_approvals(state.retrieved_chunks(), &tokens)?);
                session.set_approved_chunk_ids(ids);
                approval_reply(&session)
            }
            ReplCommand::ApproveAll => {
                let ids: Vec<String> = session
                    .state()
                    .retrieved_chunks()
                    .iter()
                    .map(|c| c.chunk_id.clone())
                    .collect();
                session.set_approved_chunk_ids(ids);
                approval_reply(&session)
            }
            ReplCommand::Clear => {
                session.set_approved_chunk_ids(Vec::new());
                "Approvals cleared.".to_string()
            }
            ReplCommand::Config(update) => {
                let applied =
                    session.set_search_config(update.apply(session.state().search_config().clone()));
                format!(
                    "Search settings: threshold {:.2}, max results {}, type {}",
                    applied.similarity_threshold, applied.max_results, applied.search_type
                )
            }
            ReplCommand::Synthesize => {
                let bundle = self.assembler.synthesize(&session).await;
                if bundle.ready {
                    format!(
                        "Here are the {} approved sources to use for your answer:\n\n{}",
                        bundle.sources.len(),
                        bundle.content
                    )
                } else {
                    bundle.content
                }
            }
            ReplCommand::State => describe(&session.state()),
            ReplCommand::Stats => match self.coordinator.refresh_stats(&session).await {
                Ok(total) => format!("Knowledge base has {} chunks. Status: ready.", total),
                Err(e) => format!("Error getting knowledge base stats: {}", e),
            },
            ReplCommand::Switch(id) => {
                self.current = self.registry.get_or_create(&id);
                format!("Switched to session '{}'", id)
            }
            ReplCommand::Sessions => self
                .registry
                .session_ids()
                .into_iter()
                .map(|id| {
                    let marker = if id == self.current.id() { "*" } else { " " };
                    format!("{} {}", marker, id)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            ReplCommand::Help => HELP.to_string(),
            ReplCommand::Quit => return Ok(Flow::Quit),
        };

        Ok(Flow::Reply(reply))
    }
}

fn approval_reply(session: &Session) -> String {
    let state = session.state();
    let current = state.approved_chunks().len();
    let stale = state.approvals().len().saturating_sub(current);
    if stale > 0 {
        format!(
            "{} chunk(s) approved ({} id(s) not in the current results)",
            current, stale
        )
    } else {
        format!("{} chunk(s) approved", current)
    }
}

impl SessionCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing session command for session '{}'", self.id);

        let sink: Arc<dyn SnapshotSink> = match &self.snapshots {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Arc::new(JsonLinesSink::new(file))
            }
            None => Arc::new(NullSink),
        };

        let mut repl = Repl::open(config, &self.id, sink)?;

        eprintln!("sift session '{}'. Type 'help' for commands.", self.id);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let outcome = match line.parse::<ReplCommand>() {
                Ok(command) => repl.run(command).await,
                Err(e) => Err(e),
            };

            let reply = match outcome {
                Ok(Flow::Quit) => break,
                Ok(Flow::Reply(reply)) => reply,
                Err(e) => {
                    tracing::debug!("Command rejected: {}", e);
                    format!("Error: {}", e)
                }
            };

            if self.json {
                let output = serde_json::json!({
                    "session": repl.current.id(),
                    "reply": reply,
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("{}\n", reply);
            }
        }

        Ok(())
    }
}
