//! Temporal sensitivity and snapshot complexity heuristics.

use crate::classification::entities::Complexity;
use crate::core::model::Model;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How much a question's correct answer changes over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    High,
    Medium,
    Low,
    None,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::High => "high",
            SensitivityLevel::Medium => "medium",
            SensitivityLevel::Low => "low",
            SensitivityLevel::None => "none",
        }
    }

    /// Whether snapshots are worth generating without a force flag
    pub fn is_eligible(&self) -> bool {
        matches!(self, SensitivityLevel::High | SensitivityLevel::Medium)
    }
}

impl std::fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitivity level plus the reason it was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalSensitivity {
    pub level: SensitivityLevel,
    pub reason: String,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("sensitivity pattern"))
        .collect()
}

static TIMELESS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bhow many\s+(continents?|planets?|states?|countries?)\b",
        r"\bwhat is\s+the\s+(capital|population|area|distance)\s+of\b",
        r"\bwhat is\s+(photosynthesis|gravity|electricity|evolution)\b",
        r"\bhow does\s+(the body|the heart|the brain|digestion)\s+work\b",
        r"\bwhat is\s+(recursion|polymorphism|inheritance|encapsulation)\b",
        r"\b(explain|define)\s+(algorithm|data structure|design pattern)\b",
        r"\bwhat is\s+(happiness|love|meaning|consciousness|ethics)\b",
        r"\bwhy do\s+(humans?|we|people)\b",
        r"\bwhat is\s+a\s+(database|server|variable|function|class)\b",
        r"\bdefinition of\b",
    ])
});

static HIGH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(who is the current|who is|who's the)\s+(president|ceo|leader|prime minister|chairman)\b",
        r"\b(current|latest|recent|new)\s+(events?|news|developments?|updates?|breakthroughs?)\b",
        r"\b(what's happening|what is happening|what happened)\s+(today|now|recently)\b",
        r"\bbreaking news\b",
        r"\b(latest|newest|recent|current)\s+(ai|llm|gpt|claude|gemini|models?|versions?|releases?)\b",
        r"\bwhat (ai|llm|gpt|language) models?\s+(exist|are available|are there)\b",
        r"\b(chatgpt|openai|anthropic|google|meta)\s+(released?|launched?|announced?)\b",
        r"\b(stock|market|crypto|bitcoin|ethereum)\s+(price|performance|value)\b",
        r"\bmarket\s+(trends?|conditions?|outlook)\b",
        r"\bwho won\s+(the|last|this year's)\s+\w+\s*(championship|cup|bowl|series|title|election|award)\b",
        r"\b(super bowl|world cup|olympics|grammy|oscar|emmy)\s+(winner|champion|results?)\b",
        r"\bcurrent\s+(champion|leader|holder|ranking)\b",
        r"\b(top|best|most popular)\s+\d+\s+(programming languages?|frameworks?|tools?|apps?|games?)\b",
        r"\bwhat'?s?\s+trending\b",
        r"\b(latest|recent|new)\s+(findings?|discoveries?|research|studies?|papers?)\b",
        r"\bbreakthrough\s+(in|for)\b",
        r"\b(this year|this month|this week|today|right now)\b",
    ])
});

static MEDIUM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bhow has\s+\w+\s+(changed|evolved|grown|developed)\b",
        r"\b(company|product|service)\s+(strategy|direction|evolution)\b",
        r"\b(current|modern)\s+(understanding|knowledge|view)\s+of\b",
        r"\bstate of\s+(the art|research|science)\b",
        r"\b(best practices?|standards?|guidelines?)\s+(in|for)\b",
        r"\b(recommended|suggested)\s+(approach|method|practice)\b",
        r"\b(regulations?|laws?|policies?|compliance)\s+(around|for|about)\b",
    ])
});

static RECENT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(202[4-9]|203\d)\b").expect("recent year regex"));

/// Classify how strongly a question's answer depends on when it is asked
///
/// Timeless patterns win over everything else; then high, then medium.
pub fn classify_sensitivity(question: &str) -> TemporalSensitivity {
    let matches_any = |patterns: &[Regex]| patterns.iter().any(|p| p.is_match(question));

    let (level, reason) = if matches_any(&TIMELESS) {
        (SensitivityLevel::None, "timeless question")
    } else if matches_any(&HIGH) {
        (SensitivityLevel::High, "answer tracks current events or rankings")
    } else if RECENT_YEAR.is_match(question) {
        (SensitivityLevel::High, "refers to a recent or future year")
    } else if matches_any(&MEDIUM) {
        (SensitivityLevel::Medium, "answer evolves with practice or research")
    } else {
        (SensitivityLevel::Low, "no temporal markers")
    };

    TemporalSensitivity {
        level,
        reason: reason.to_string(),
    }
}

static COMPLEXITY_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(best|top|leading|most advanced|state of the art)\b",
        r"\b(compare|comparison|versus|vs\.?|difference between)\b",
        r"\b(architecture|design|implementation|strategy)\b",
        r"\b(comprehensive|detailed|in-depth|thorough)\b",
        r"\b(analysis|analyze|evaluate|assessment)\b",
        r"\b(explain|how does|why does|mechanism)\b",
        r"\b(future|prediction|forecast|outlook|trajectory)\b",
        r"\b(evolution|history|development|progress)\b",
        r"\b(implications|impact|consequences|effects)\b",
    ])
});

/// Complexity of a time-travel question, used to pick the snapshot model
///
/// Temporal questions are at least moderate; three or more markers (or two
/// in a long question) make them complex.
pub fn snapshot_complexity(question: &str) -> Complexity {
    let markers = COMPLEXITY_MARKERS
        .iter()
        .filter(|p| p.is_match(question))
        .count();
    let words = question.split_whitespace().count();

    if markers >= 3 || (markers >= 2 && words > 15) {
        Complexity::Complex
    } else {
        Complexity::Moderate
    }
}

/// Model and answer budget for snapshots of a given complexity
pub fn snapshot_plan(complexity: Complexity) -> (Model, u32) {
    match complexity {
        Complexity::Simple => (Model::Gpt4oMini, 800),
        Complexity::Moderate => (Model::Gpt4o, 1200),
        Complexity::Complex => (Model::Gpt4Turbo, 1500),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeless_wins_over_high() {
        // "today" alone would be high, but the definition pattern comes first
        let s = classify_sensitivity("What is the definition of entropy today?");
        assert_eq!(s.level, SensitivityLevel::None);
        assert!(!s.level.is_eligible());
    }

    #[test]
    fn test_high_sensitivity() {
        for q in [
            "What are the latest AI models?",
            "Who is the current CEO of OpenAI?",
            "What's the bitcoin price right now?",
            "What's trending on tiktok",
        ] {
            assert_eq!(classify_sensitivity(q).level, SensitivityLevel::High, "{q}");
        }
    }

    #[test]
    fn test_recent_year_is_high() {
        assert_eq!(
            classify_sensitivity("Who hosted the 2026 summit?").level,
            SensitivityLevel::High
        );
    }

    #[test]
    fn test_medium_sensitivity() {
        let s = classify_sensitivity("How has journalism changed over the decade?");
        assert_eq!(s.level, SensitivityLevel::Medium);
        assert!(s.level.is_eligible());
        assert_eq!(
            classify_sensitivity("best practices for API versioning").level,
            SensitivityLevel::Medium
        );
    }

    #[test]
    fn test_low_sensitivity() {
        let s = classify_sensitivity("Tell me a joke about cats");
        assert_eq!(s.level, SensitivityLevel::Low);
        assert!(!s.level.is_eligible());
    }

    #[test]
    fn test_snapshot_complexity() {
        assert_eq!(snapshot_complexity("latest AI models"), Complexity::Moderate);
        assert_eq!(
            snapshot_complexity("Compare the best architecture options and their impact"),
            Complexity::Complex
        );
    }

    #[test]
    fn test_snapshot_plan_budgets() {
        assert_eq!(snapshot_plan(Complexity::Moderate), (Model::Gpt4o, 1200));
        assert_eq!(snapshot_plan(Complexity::Complex), (Model::Gpt4Turbo, 1500));
    }
}
