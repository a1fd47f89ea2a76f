//! Stage prompt construction.
//!
//! Each model-backed stage consumes exactly what the previous stage validated:
//! the plan stage sees the user query, the write stage sees the plan's answer
//! sections, and the refine stage sees the write stage's answer sections.
//! [`StageInput`] makes that data dependency explicit, and a
//! [`PromptBuilder`] turns it into prompt text.

use super::stage::StageKind;

/// Separator placed between outline parts in the write prompt.
pub const OUTLINE_SEPARATOR: &str = "\n### Outline:";

/// The data a model-backed stage is prompted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput<'a> {
    Plan { query: &'a str },
    Write { outline: &'a [String] },
    Refine { draft: &'a [String] },
}

impl StageInput<'_> {
    pub fn kind(&self) -> StageKind {
        match self {
            StageInput::Plan { .. } => StageKind::Plan,
            StageInput::Write { .. } => StageKind::Write,
            StageInput::Refine { .. } => StageKind::Refine,
        }
    }
}

/// Turns stage inputs into prompt text.
///
/// Implementations must be deterministic: the stage runner rebuilds the
/// prompt on every attempt.
pub trait PromptBuilder: Send + Sync {
    fn build(&self, input: &StageInput<'_>) -> String;
}

/// Prompt format for models fine-tuned on the staged writing protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagedWritingPrompts;

impl PromptBuilder for StagedWritingPrompts {
    fn build(&self, input: &StageInput<'_>) -> String {
        match input {
            StageInput::Plan { query } => format!(
                "Superwrite-Stage-1: \n### User query: *** {query} ***. \n\
                 Brainstorm the request above and lay out a detailed plan for it: \
                 the goal, the intended readers, the key points to cover and the \
                 overall structure. \n### Superwrite Answer:"
            ),
            StageInput::Write { outline } => format!(
                "Superwrite-Stage-2: \n### Stage-1 Plan: *** {} *** \n\
                 ### Task: Work through the plan one outline section at a time, \
                 reasoning about each section before writing its paragraph. \
                 \n### Superwrite Answer:",
                outline.join(OUTLINE_SEPARATOR)
            ),
            StageInput::Refine { draft } => format!(
                "Superwrite-Stage-3: ### Stage-2 Write generated content: *** {} *** \n\
                 ### Task: Revise the draft paragraph by paragraph for clarity, \
                 coherence and consistency, correct any mistakes, smooth the \
                 transitions, then assemble the polished result. \
                 \n### Superwrite Answer:",
                draft.join("\n")
            ),
        }
    }
}

/// Assemble the final document from the refine stage's answer sections.
pub fn compile_final(refined_sections: &[String]) -> String {
    refined_sections.join("\n")
}
