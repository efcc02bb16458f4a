//! Approved-context assembly.

use crate::session::Session;
use crate::types::Chunk;
use serde::Serialize;

/// Result text when nothing current has been approved.
pub const NOT_READY_MESSAGE: &str = "No sources have been approved yet. Please wait for the user to approve sources before synthesizing.";

/// Separator between rendered source blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Context handed to the downstream generation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisBundle {
    /// False when no current chunk was approved
    pub ready: bool,

    /// Rendered sources, or the not-ready message
    pub content: String,

    /// Labels of the sources used, in rank order
    pub sources: Vec<String>,
}

impl SynthesisBundle {
    fn not_ready() -> Self {
        Self {
            ready: false,
            content: NOT_READY_MESSAGE.to_string(),
            sources: Vec::new(),
        }
    }
}

/// Render one source block.
pub fn render_block(chunk: &Chunk) -> String {
    format!("[Source: {}]\n{}", chunk.label(), chunk.content)
}

/// Render approved chunks, in the given order, into one bundle text.
pub fn render_bundle(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Builds synthesis context from a session's approved chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisAssembler;

impl SynthesisAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the approved chunks of `session`.
    ///
    /// Without a current approval nothing changes and no snapshot is
    /// emitted. Otherwise the approval wait ends, the chunk list is left as
    /// it was and one snapshot is emitted.
    pub async fn synthesize(&self, session: &Session) -> SynthesisBundle {
        let _exclusive = session.exclusive().await;

        let approved = session.update(|state| {
            if !state.synthesis_ready() {
                return None;
            }
            state.begin_synthesis();
            Some((state.approved_chunks(), state.retrieved_chunks().len()))
        });

        let Some((approved, available)) = approved else {
            let stale = session.read(|state| state.approvals().len());
            tracing::warn!(
                session_id = %session.id(),
                approved_ids = stale,
                "synthesis.no_approved_chunks"
            );
            return SynthesisBundle::not_ready();
        };

        tracing::info!(
            session_id = %session.id(),
            total_chunks_available = available,
            approved_chunks_count = approved.len(),
            "synthesis.started"
        );

        let content = render_bundle(&approved);
        let sources: Vec<String> = approved.iter().map(Chunk::label).collect();

        session.commit(|state| state.complete_synthesis());

        tracing::info!(
            session_id = %session.id(),
            chunks_used = sources.len(),
            sources = ?sources,
            "synthesis.completed"
        );

        SynthesisBundle {
            ready: true,
            content,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunk(index: u32, title: &str, content: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{}-{}", title, index),
            document_id: title.to_string(),
            content: content.to_string(),
            similarity: 0.8,
            metadata: Metadata::new(),
            document_title: title.to_string(),
            document_source: String::new(),
            chunk_index: index,
            approved: true,
        }
    }

    #[test]
    fn test_render_block() {
        assert_eq!(
            render_block(&chunk(2, "Report", "Body text")),
            "[Source: Chunk 2 of Report]\nBody text"
        );
    }

    #[test]
    fn test_render_bundle_joins_in_order() {
        let bundle = render_bundle(&[chunk(1, "B", "second doc"), chunk(1, "A", "first doc")]);
        assert_eq!(
            bundle,
            "[Source: Chunk 1 of B]\nsecond doc\n\n---\n\n[Source: Chunk 1 of A]\nfirst doc"
        );
    }

    #[test]
    fn test_render_bundle_empty() {
        assert_eq!(render_bundle(&[]), "");
    }
}
