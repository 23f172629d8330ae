//! Prompt templates for classification, ensemble answers, and time-travel

use crate::core::string::truncate_chars;

/// Characters of each snapshot included in the key-changes comparison
pub const KEY_CHANGES_EXCERPT_CHARS: usize = 600;
/// Characters of each snapshot included in the narrative prompt
pub const NARRATIVE_EXCERPT_CHARS: usize = 500;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    // ==================== Classification ====================

    /// System prompt for the classifier call
    pub fn classification_system() -> &'static str {
        r#"You classify user questions so they can be routed to the right language models.
Assume the models' knowledge ends in late 2023; anything newer requires web search.
Respond with ONLY a JSON object, no prose and no code fences."#
    }

    /// User prompt for the classifier call
    pub fn classification_prompt(question: &str) -> String {
        format!(
            r#"Classify this question on these dimensions:

- complexity: "simple" (single-step lookup), "moderate" (some explanation or comparison), or "complex" (deep reasoning, multiple perspectives, long-form creation)
- intent: "factual", "creative", "analytical", "procedural", or "comparative"
- domain: "coding", "technical", "general", "creative", or "research"
- requires_search: true if the answer needs information newer than the models' training data
- recommended_models: subset of "gpt-4o-mini", "gpt-4o", "gpt-4-turbo"
- reasoning: one sentence
- confidence: number from 0.0 to 1.0

Questions about current events or recent years are never "simple".

Question: "{}"

JSON format:
{{"complexity": "...", "intent": "...", "domain": "...", "requires_search": false, "recommended_models": ["..."], "reasoning": "...", "confidence": 0.0}}"#,
            question
        )
    }

    // ==================== Ensemble ====================

    /// System prompt for each ensemble member
    pub fn ensemble_system() -> &'static str {
        r#"You are a knowledgeable assistant. Give an accurate, well-structured answer.
Be concise but complete, and say so when you are unsure."#
    }

    /// User prompt for each ensemble member, optionally grounded in search results
    pub fn ensemble_query(question: &str, search_context: Option<&str>) -> String {
        match search_context {
            Some(context) => format!(
                r#"Recent web search results:

{}

Using these results where relevant, answer:

{}"#,
                context, question
            ),
            None => question.to_string(),
        }
    }

    /// System prompt for the synthesis call
    pub fn synthesis_system() -> &'static str {
        r#"You merge several model answers to the same question into one response.
Keep points the answers agree on, resolve disagreements in favour of the better-supported position,
and drop anything that is clearly wrong. Write a single self-contained answer."#
    }

    /// User prompt embedding every successful answer
    pub fn synthesis_prompt(question: &str, responses: &[(String, String)]) -> String {
        let mut prompt = format!("Question: {}\n\nAnswers to merge:\n", question);
        for (model, content) in responses {
            prompt.push_str(&format!("\n--- {} ---\n{}\n", model, content));
        }
        prompt.push_str("\nWrite the merged answer.");
        prompt
    }

    // ==================== Time travel ====================

    /// System prompt pinning the model to a historical date
    pub fn snapshot_system(date: &str) -> String {
        format!(
            r#"You are answering as if today is {date}.
Use only information available on {date}; do not mention anything that happened later.
Include specific names, numbers, and dates from that period."#
        )
    }

    /// User prompt asking the question as of a date
    pub fn snapshot_prompt(question: &str, date: &str) -> String {
        format!(
            r#"As of {date}, answer this question: {question}

If something did not exist yet as of {date}, say so clearly."#
        )
    }

    /// System prompt for the single batched key-changes call
    pub fn key_changes_system() -> &'static str {
        r#"You compare answers to the same question written at different dates.
For each consecutive pair of periods list 2-3 key changes, using exactly this format:

TRANSITION 1→2:
- change
- change

TRANSITION 2→3:
- change"#
    }

    /// User prompt listing every snapshot, each cut to a short excerpt
    pub fn key_changes_prompt(snapshots: &[(String, String)]) -> String {
        let periods: Vec<String> = snapshots
            .iter()
            .enumerate()
            .map(|(i, (label, text))| {
                format!(
                    "Period {} - {}:\n{}",
                    i + 1,
                    label,
                    truncate_chars(text, KEY_CHANGES_EXCERPT_CHARS)
                )
            })
            .collect();
        format!("Compare these answers:\n\n{}", periods.join("\n\n---\n\n"))
    }

    /// System prompt for the narrative call
    pub fn narrative_system() -> &'static str {
        r#"You explain how answers to a question evolved over time. Reply in exactly these sections:

NARRATIVE: one or two paragraphs
INSIGHTS:
- insight
- insight
- insight
VELOCITY: fast, moderate, slow, or minimal
OUTLOOK: one sentence about what comes next"#
    }

    /// User prompt with the question, timeline excerpts, and extracted changes
    pub fn narrative_prompt(question: &str, timeline: &[(String, String, Vec<String>)]) -> String {
        let mut prompt = format!("Question: {}\n\nTimeline:\n", question);
        for (label, text, changes) in timeline {
            prompt.push_str(&format!(
                "\n{}:\n{}\n",
                label,
                truncate_chars(text, NARRATIVE_EXCERPT_CHARS)
            ));
            if !changes.is_empty() {
                prompt.push_str("Changes since previous period:\n");
                for change in changes {
                    prompt.push_str(&format!("- {}\n", change));
                }
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_prompt_embeds_question() {
        let prompt = PromptTemplate::classification_prompt("What is Rust?");
        assert!(prompt.contains("Question: \"What is Rust?\""));
        assert!(prompt.contains("\"complexity\""));
    }

    #[test]
    fn test_ensemble_query_with_and_without_search() {
        assert_eq!(PromptTemplate::ensemble_query("Q?", None), "Q?");
        let grounded = PromptTemplate::ensemble_query("Q?", Some("result 1"));
        assert!(grounded.contains("result 1"));
        assert!(grounded.ends_with("Q?"));
    }

    #[test]
    fn test_synthesis_prompt_lists_each_answer() {
        let responses = vec![
            ("gpt-4o".to_string(), "Answer A".to_string()),
            ("gpt-4o-mini".to_string(), "Answer B".to_string()),
        ];
        let prompt = PromptTemplate::synthesis_prompt("Q?", &responses);
        assert!(prompt.contains("--- gpt-4o ---\nAnswer A"));
        assert!(prompt.contains("--- gpt-4o-mini ---\nAnswer B"));
    }

    #[test]
    fn test_snapshot_prompt_is_dated() {
        let prompt = PromptTemplate::snapshot_prompt("Who leads?", "January 01, 2023");
        assert!(prompt.starts_with("As of January 01, 2023, answer this question: Who leads?"));
    }

    #[test]
    fn test_key_changes_prompt_truncates_each_snapshot() {
        let long = "x".repeat(KEY_CHANGES_EXCERPT_CHARS + 100);
        let prompt = PromptTemplate::key_changes_prompt(&[
            ("Jan 2023".to_string(), long.clone()),
            ("Today".to_string(), "short".to_string()),
        ]);
        assert!(!prompt.contains(&long));
        assert!(prompt.contains(&format!("{}...", "x".repeat(KEY_CHANGES_EXCERPT_CHARS))));
        assert!(prompt.contains("Period 2 - Today:\nshort"));
    }

    #[test]
    fn test_narrative_prompt_includes_changes() {
        let prompt = PromptTemplate::narrative_prompt(
            "Q?",
            &[
                ("2023".to_string(), "old".to_string(), vec![]),
                ("2024".to_string(), "new".to_string(), vec!["it moved".to_string()]),
            ],
        );
        assert!(prompt.contains("- it moved"));
        assert_eq!(prompt.matches("Changes since previous period").count(), 1);
    }
}
