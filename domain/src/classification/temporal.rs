//! Keyword and year heuristic for time-sensitive questions.
//!
//! Runs without any model call so the router can react to "latest",
//! "today", or a post-cut-off year even when classification falls back.

use super::entities::{TemporalScope, TemporalSignal};
use regex::Regex;
use std::sync::LazyLock;

/// Last year the hosted models have reliable training data for
pub const KNOWLEDGE_CUTOFF_YEAR: i32 = 2023;

static TEMPORAL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(latest|newest|current(?:ly)?|recent(?:ly)?|today|tonight|now|nowadays|right now|trending|breaking|upcoming|this (?:week|month|year)|up[- ]to[- ]date|as of)\b",
    )
    .expect("temporal keyword regex")
});

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20[2-3]\d)\b").expect("year regex"));

/// Keywords that on their own mean the answer needs live data
const CURRENT_DATA_KEYWORDS: &[&str] = &["latest", "current", "today", "now", "breaking", "trending", "right now"];

/// Inspect `question` for temporal markers, relative to `current_year`
pub fn detect_temporal(question: &str, current_year: i32) -> TemporalSignal {
    let lower = question.to_lowercase();

    let mut keywords: Vec<String> = TEMPORAL_KEYWORDS
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect();
    keywords.sort();
    keywords.dedup();

    let years: Vec<i32> = YEAR
        .captures_iter(&lower)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();

    let after_cutoff = years.iter().any(|&y| y > KNOWLEDGE_CUTOFF_YEAR);
    let is_temporal = !keywords.is_empty() || after_cutoff;
    let requires_current_data =
        after_cutoff || keywords.iter().any(|k| CURRENT_DATA_KEYWORDS.contains(&k.as_str()));

    let scope = if !is_temporal {
        TemporalScope::Evergreen
    } else if years.iter().any(|&y| y > current_year) {
        TemporalScope::Future
    } else if !years.is_empty() && years.iter().all(|&y| y <= KNOWLEDGE_CUTOFF_YEAR) {
        TemporalScope::Historical
    } else {
        TemporalScope::Current
    };

    let confidence = match (keywords.is_empty(), years.is_empty()) {
        (false, false) => 0.95,
        (false, true) => 0.85,
        (true, false) if after_cutoff => 0.80,
        (true, false) => 0.60,
        (true, true) => 0.50,
    };

    let mut reasons = Vec::new();
    if !keywords.is_empty() {
        reasons.push(format!("temporal keywords: {}", keywords.join(", ")));
    }
    if !years.is_empty() {
        let years: Vec<String> = years.iter().map(i32::to_string).collect();
        reasons.push(format!("years mentioned: {}", years.join(", ")));
    }
    if requires_current_data {
        reasons.push("asks for information newer than the training cut-off".to_string());
    }
    if reasons.is_empty() {
        reasons.push("no temporal indicators".to_string());
    }

    TemporalSignal {
        is_temporal,
        scope,
        requires_current_data,
        keywords,
        years,
        confidence,
        reasoning: reasons.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i32 = 2026;

    #[test]
    fn test_evergreen_question() {
        let s = detect_temporal("How does photosynthesis work?", NOW);
        assert!(!s.is_temporal);
        assert_eq!(s.scope, TemporalScope::Evergreen);
        assert!(!s.requires_current_data);
        assert!((s.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_keyword_only() {
        let s = detect_temporal("What are the LATEST developments in fusion?", NOW);
        assert!(s.is_temporal);
        assert_eq!(s.keywords, vec!["latest".to_string()]);
        assert_eq!(s.scope, TemporalScope::Current);
        assert!(s.requires_current_data);
        assert!((s.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_keyword_and_year() {
        let s = detect_temporal("What's trending in AI in 2025?", NOW);
        assert_eq!(s.years, vec![2025]);
        assert!((s.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(s.scope, TemporalScope::Current);
    }

    #[test]
    fn test_future_year() {
        let s = detect_temporal("Who will host the 2030 World Cup?", NOW);
        assert!(s.is_temporal);
        assert_eq!(s.scope, TemporalScope::Future);
        assert!((s.confidence - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn test_past_year_alone_is_not_temporal() {
        let s = detect_temporal("Summarize the 2021 chip shortage", NOW);
        assert!(!s.is_temporal);
        assert_eq!(s.scope, TemporalScope::Evergreen);
        assert!((s.confidence - 0.60).abs() < f64::EPSILON);
    }

    #[test]
    fn test_past_year_with_keyword_is_historical() {
        let s = detect_temporal("What was the most recent rate hike in 2022?", NOW);
        assert!(s.is_temporal);
        assert_eq!(s.scope, TemporalScope::Historical);
    }

    #[test]
    fn test_word_boundaries() {
        let s = detect_temporal("I know the snowfall records", NOW);
        assert!(!s.is_temporal, "matched inside another word: {:?}", s.keywords);
    }
}
