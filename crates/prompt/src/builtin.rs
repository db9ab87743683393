//! Prompt definitions compiled into the binary.

/// Answer prompt used when passages were retrieved.
pub const ANSWER_GROUNDED: &str = "answer.grounded";

/// Answer prompt used when no passage survived retrieval.
pub const ANSWER_ZERO_SHOT: &str = "answer.zero_shot";

/// Judgment prompt for the reflection call.
pub const REFLECTION_JUDGE: &str = "reflection.judge";

const BUILTINS: &[(&str, &str)] = &[
    (
        ANSWER_GROUNDED,
        include_str!("../prompts/answer.grounded.yml"),
    ),
    (
        ANSWER_ZERO_SHOT,
        include_str!("../prompts/answer.zero_shot.yml"),
    ),
    (
        REFLECTION_JUDGE,
        include_str!("../prompts/reflection.judge.yml"),
    ),
];

/// Raw YAML of a built-in prompt.
pub fn builtin_yaml(prompt_id: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, yaml)| *yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptDefinition;

    #[test]
    fn test_builtins_parse_and_match_their_ids() {
        for (id, yaml) in BUILTINS {
            assert_eq!(builtin_yaml(id), Some(*yaml));
            let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(def.id, *id);
            assert!(!def.template.is_empty());
        }
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_yaml("does.not.exist").is_none());
    }
}
