//! Historical dates to snapshot a question at.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A dated, labelled moment to answer a question "as of"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub label: String,
}

impl TimePoint {
    pub fn new(date: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            date,
            label: label.into(),
        }
    }

    /// Long date form used in prompts, e.g. "March 14, 2023"
    pub fn prompt_date(&self) -> String {
        self.date.format("%B %d, %Y").to_string()
    }
}

static AI_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ai|gpt|llms?|chatgpt|claude|gemini|models?)\b").expect("ai topic regex")
});

/// Pick up to `max` chronologically ordered time points for `question`
///
/// AI questions are anchored on model-release milestones; everything else
/// gets yearly snapshots. The last point is always `today`. When more
/// candidates exist than `max`, the first and last are kept and the rest
/// sampled evenly.
pub fn identify_time_points(question: &str, today: NaiveDate, max: usize) -> Vec<TimePoint> {
    let milestones: [(i32, u32, u32, &str); 3] = if AI_TOPIC.is_match(question) {
        [
            (2023, 1, 1, "Jan 2023 - Pre-GPT-4 Era"),
            (2023, 3, 14, "Mar 2023 - GPT-4 Release"),
            (2024, 5, 13, "May 2024 - GPT-4o Release"),
        ]
    } else {
        [
            (2023, 1, 1, "Jan 2023 - Earlier Snapshot"),
            (2024, 1, 1, "Jan 2024 - Mid Snapshot"),
            (2025, 1, 1, "Jan 2025 - Recent Snapshot"),
        ]
    };

    let mut points: Vec<TimePoint> = milestones
        .iter()
        .filter_map(|&(y, m, d, label)| NaiveDate::from_ymd_opt(y, m, d).map(|date| TimePoint::new(date, label)))
        .filter(|p| p.date < today)
        .collect();
    points.push(TimePoint::new(
        today,
        format!("Today ({})", today.format("%b %d, %Y")),
    ));

    downsample(points, max)
}

fn downsample(points: Vec<TimePoint>, max: usize) -> Vec<TimePoint> {
    let n = points.len();
    if n <= max {
        return points;
    }
    match max {
        0 => Vec::new(),
        1 => points.into_iter().last().into_iter().collect(),
        _ => {
            let keep: Vec<usize> = (0..max).map(|i| i * (n - 1) / (max - 1)).collect();
            points
                .into_iter()
                .enumerate()
                .filter(|(i, _)| keep.contains(i))
                .map(|(_, p)| p)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_ai_question_uses_milestones() {
        let points = identify_time_points("How have AI models improved?", today(), 4);
        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Jan 2023 - Pre-GPT-4 Era",
                "Mar 2023 - GPT-4 Release",
                "May 2024 - GPT-4o Release",
                "Today (Oct 18, 2026)",
            ]
        );
    }

    #[test]
    fn test_general_question_uses_yearly_points() {
        let points = identify_time_points("What are the top EV makers?", today(), 4);
        assert_eq!(points.len(), 4);
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(points[3].date, today());
    }

    #[test]
    fn test_ai_match_is_word_based() {
        let points = identify_time_points("What did the chairman say again?", today(), 4);
        assert_eq!(points[0].label, "Jan 2023 - Earlier Snapshot");
    }

    #[test]
    fn test_points_are_chronological() {
        let points = identify_time_points("latest gpt releases", today(), 4);
        assert!(points.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_downsample_keeps_first_and_last() {
        let points = identify_time_points("top EV makers", today(), 2);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(points[1].date, today());

        let points = identify_time_points("top EV makers", today(), 3);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert_eq!(identify_time_points("top EV makers", today(), 1).len(), 1);
    }

    #[test]
    fn test_prompt_date_format() {
        let p = TimePoint::new(NaiveDate::from_ymd_opt(2023, 3, 14).unwrap(), "x");
        assert_eq!(p.prompt_date(), "March 14, 2023");
    }
}
