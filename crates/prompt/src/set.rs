//! The three prompts a workflow run needs, resolved once.

use crate::builder::build_prompt;
use crate::builtin::{ANSWER_GROUNDED, ANSWER_ZERO_SHOT, REFLECTION_JUDGE};
use crate::loader::{load_builtin, load_prompt};
use crate::types::{BuiltPrompt, PromptDefinition};
use sage_core::AppResult;
use std::collections::HashMap;
use std::path::Path;

/// Resolved answer and reflection prompts.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub grounded: PromptDefinition,
    pub zero_shot: PromptDefinition,
    pub reflection: PromptDefinition,
}

impl PromptSet {
    /// Load all prompts, honoring overrides in `<workspace>/.sage/prompts/`.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        Ok(Self {
            grounded: load_prompt(workspace_path, ANSWER_GROUNDED)?,
            zero_shot: load_prompt(workspace_path, ANSWER_ZERO_SHOT)?,
            reflection: load_prompt(workspace_path, REFLECTION_JUDGE)?,
        })
    }

    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        Ok(Self {
            grounded: load_builtin(ANSWER_GROUNDED)?,
            zero_shot: load_builtin(ANSWER_ZERO_SHOT)?,
            reflection: load_builtin(REFLECTION_JUDGE)?,
        })
    }

    /// Render the answer prompt.
    ///
    /// A non-empty `context` selects the grounded template; an empty one
    /// selects the zero-shot template.
    pub fn render_answer(&self, query: &str, context: &str) -> AppResult<BuiltPrompt> {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());

        if context.is_empty() {
            build_prompt(&self.zero_shot, vars)
        } else {
            vars.insert("context".to_string(), context.to_string());
            build_prompt(&self.grounded, vars)
        }
    }

    /// Render the reflection prompt.
    pub fn render_reflection(&self, query: &str, answer: &str) -> AppResult<BuiltPrompt> {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("answer".to_string(), answer.to_string());
        build_prompt(&self.reflection, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_grounded_answer_embeds_context() {
        let prompts = PromptSet::builtin().unwrap();
        let built = prompts
            .render_answer("What is solar?", "Solar is light.\n\nPanels convert it.")
            .unwrap();

        assert_eq!(built.metadata.source_prompt_id, ANSWER_GROUNDED);
        assert!(built.user.contains("Context:\nSolar is light.\n\nPanels convert it."));
        assert!(built.user.contains("Question:\nWhat is solar?"));
    }

    #[test]
    fn test_empty_context_uses_zero_shot() {
        let prompts = PromptSet::builtin().unwrap();
        let built = prompts.render_answer("hello", "").unwrap();

        assert_eq!(built.metadata.source_prompt_id, ANSWER_ZERO_SHOT);
        assert!(!built.user.contains("Context:"));
        assert!(built.user.contains("hello"));
    }

    #[test]
    fn test_reflection_prompt_keeps_json_example() {
        let prompts = PromptSet::builtin().unwrap();
        let built = prompts.render_reflection("Q?", "A.").unwrap();

        assert!(built.user.contains("Question: Q?"));
        assert!(built.user.contains("Answer: A."));
        assert!(built.user.contains(r#"{"score": 0.85"#));
    }

    #[test]
    fn test_load_with_override() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".sage/prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("reflection.judge.yml"),
            r#"
id: reflection.judge
title: Strict judge
apiVersion: "1.0"
variables: [query, answer]
template: "Grade {{answer}} for {{query}}"
output:
  format: json
"#,
        )
        .unwrap();

        let prompts = PromptSet::load(temp_dir.path()).unwrap();
        let built = prompts.render_reflection("q", "a").unwrap();
        assert_eq!(built.user, "Grade a for q");
        assert_eq!(prompts.grounded.id, ANSWER_GROUNDED);
    }
}
