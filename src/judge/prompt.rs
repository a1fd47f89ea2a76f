//! Judge prompt construction.

use super::task::JudgeTask;

/// Builds the scoring prompt for one candidate.
pub trait JudgePromptBuilder: Send + Sync {
    fn build(&self, task: &JudgeTask) -> String;
}

/// Default rubric prompt asking for a fenced JSON verdict with an
/// `Analysis` and a `Score` per criterion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricPrompt;

const OUTPUT_FORMAT: &str = r#"The final output should be in JSON format, structured as follows:
```json
{
    "Criterion 1": {
        "Analysis": "...",
        "Score": X
    },
    ...
}
```"#;

impl JudgePromptBuilder for RubricPrompt {
    fn build(&self, task: &JudgeTask) -> String {
        let rubric = serde_json::to_string(&task.rubric).unwrap_or_else(|_| "{}".to_string());
        format!(
            "### Query: {query}\n\n\
             ### Result: <start> {result} <end>\n\n\
             ### Evaluation Standard: {rubric}\n\n\
             Based on the provided info, perform a rigorous evaluation. {format}\n",
            query = task.query,
            result = task.candidate_text(),
            rubric = rubric,
            format = OUTPUT_FORMAT,
        )
    }
}
