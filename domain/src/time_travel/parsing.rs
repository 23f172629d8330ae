//! Parsers for the key-changes and narrative replies, plus text heuristics
//! over snapshot answers.

use super::entities::{ChangeVelocity, Narrative, Snapshot};
use crate::core::string::{extract_json_object, jaccard_similarity};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// First/last answers more similar than this show no real evolution
pub const IDENTICAL_ANSWER_THRESHOLD: f64 = 0.85;

static TRANSITION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[#*\s]*transition\b(?:\s*(\d+)\s*(?:→|->|to)\s*(\d+))?").expect("transition regex")
});

fn bullet_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(['-', '•', '*'])?;
    let text = rest.trim_start_matches(['-', '•', '*']).trim();
    (!text.is_empty()).then_some(text)
}

/// Split a batched comparison reply into per-transition change lists
///
/// Returns `pairs` lists where entry `k` holds the changes between the
/// `k`-th and `k+1`-th compared snapshot. Headers of the form
/// `TRANSITION i→j:` address a pair explicitly; numberless headers take
/// the next pair in order. Bullets may start with `-`, `•`, or `*`.
pub fn parse_key_changes(reply: &str, pairs: usize) -> Vec<Vec<String>> {
    let mut transitions = vec![Vec::new(); pairs];
    let mut current: Option<usize> = None;
    let mut next_slot = 0usize;

    for line in reply.lines().map(str::trim) {
        if let Some(caps) = TRANSITION_HEADER.captures(line) {
            let slot = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .and_then(|from| from.checked_sub(1))
                .unwrap_or(next_slot);
            current = Some(slot);
            next_slot = slot.saturating_add(1);
        } else if line.starts_with("---") {
            current = None;
        } else if let Some(change) = bullet_text(line) {
            let slot = *current.get_or_insert_with(|| {
                let slot = next_slot;
                next_slot = next_slot.saturating_add(1);
                slot
            });
            if let Some(list) = transitions.get_mut(slot) {
                list.push(change.to_string());
            }
        }
    }

    transitions
}

/// Attach transition lists to the successful snapshots they describe
///
/// The first successful snapshot has nothing to compare against; transition
/// `k` lands on the `k+1`-th successful snapshot. Failed snapshots are
/// skipped because they were not part of the comparison.
pub fn attach_key_changes(snapshots: &mut [Snapshot], transitions: Vec<Vec<String>>) {
    let targets = snapshots.iter_mut().filter(|s| s.is_success()).skip(1);
    for (snapshot, changes) in targets.zip(transitions) {
        snapshot.key_changes = changes;
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInsight {
    Text(String),
    Object { text: String },
}

#[derive(Debug, Deserialize)]
struct RawNarrative {
    narrative: String,
    #[serde(default)]
    insights: Vec<RawInsight>,
    #[serde(default)]
    velocity: Option<String>,
    #[serde(default)]
    outlook: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Narrative,
    Insights,
    Velocity,
    Outlook,
}

fn section_header(line: &str) -> Option<(Section, &str)> {
    let line = line.trim_start_matches(['#', '*', ' ']);
    let upper = line.to_ascii_uppercase();
    [
        ("NARRATIVE:", Section::Narrative),
        ("INSIGHTS:", Section::Insights),
        ("VELOCITY:", Section::Velocity),
        ("OUTLOOK:", Section::Outlook),
    ]
    .into_iter()
    .find(|(tag, _)| upper.starts_with(tag))
    .map(|(tag, section)| (section, line[tag.len()..].trim_start_matches('*').trim()))
}

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+(.+)$").expect("numbered list regex"));

/// Parse the narrative reply
///
/// Accepts a JSON object (`narrative`, `insights`, `velocity`, `outlook`),
/// or `NARRATIVE:` / `INSIGHTS:` / `VELOCITY:` / `OUTLOOK:` sections. Text
/// matching neither becomes the narrative as-is.
pub fn parse_narrative(reply: &str) -> Narrative {
    if let Some(raw) = extract_json_object(reply).and_then(|j| serde_json::from_str::<RawNarrative>(j).ok()) {
        return Narrative {
            narrative: raw.narrative.trim().to_string(),
            insights: raw
                .insights
                .into_iter()
                .map(|i| match i {
                    RawInsight::Text(t) | RawInsight::Object { text: t } => t,
                })
                .filter(|t| !t.trim().is_empty())
                .collect(),
            velocity: raw
                .velocity
                .as_deref()
                .map_or(ChangeVelocity::Moderate, ChangeVelocity::from_label),
            outlook: raw.outlook.trim().to_string(),
        };
    }

    let mut narrative = Vec::new();
    let mut insights = Vec::new();
    let mut velocity = None;
    let mut outlook = Vec::new();
    let mut section = None;

    for line in reply.lines().map(str::trim) {
        let content = match section_header(line) {
            Some((s, rest)) => {
                section = Some(s);
                rest
            }
            None => line,
        };
        if content.is_empty() {
            continue;
        }
        match section {
            Some(Section::Narrative) => narrative.push(content),
            Some(Section::Insights) => {
                let item = bullet_text(content)
                    .or_else(|| NUMBERED.captures(content).and_then(|c| c.get(1)).map(|m| m.as_str()))
                    .unwrap_or(content);
                insights.push(item.to_string());
            }
            Some(Section::Velocity) => {
                velocity.get_or_insert(ChangeVelocity::from_label(content));
            }
            Some(Section::Outlook) => outlook.push(content),
            None => {}
        }
    }

    if section.is_none() {
        return Narrative {
            narrative: reply.trim().to_string(),
            ..Default::default()
        };
    }

    Narrative {
        narrative: narrative.join("\n"),
        insights,
        velocity: velocity.unwrap_or_default(),
        outlook: outlook.join(" "),
    }
}

static DATA_POINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$[\d,]+(?:\.\d+)?(?:\s*(?:billion|million|trillion))?",
        r"\d+(?:\.\d+)?%",
        r"\b(?:19|20)\d{2}\b",
        r"#\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("data point regex"))
    .collect()
});

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?](?:\s+|$)|\n+").expect("sentence regex"));

/// Pull up to three short sentences containing money, percentages, years, or rankings
pub fn extract_data_points(answer: &str) -> Vec<String> {
    let sentences: Vec<&str> = SENTENCE_END
        .split(answer)
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() < 150)
        .collect();

    let mut points: Vec<String> = Vec::new();
    for pattern in DATA_POINT_PATTERNS.iter() {
        for m in pattern.find_iter(answer).take(2) {
            if let Some(sentence) = sentences.iter().find(|s| s.contains(m.as_str())) {
                if !points.iter().any(|p| p == sentence) {
                    points.push(sentence.to_string());
                }
            }
        }
    }
    points.truncate(3);
    points
}

/// Whether the first and last successful snapshots say essentially the same thing
pub fn answers_identical(snapshots: &[Snapshot]) -> bool {
    let mut successful = snapshots.iter().filter(|s| s.is_success());
    let (Some(first), Some(last)) = (successful.next(), successful.last()) else {
        return false;
    };
    jaccard_similarity(&first.result.text, &last.result.text) > IDENTICAL_ANSWER_THRESHOLD
}
