//! Console output formatter for ensemble answers and time-travel events

use colored::Colorize;
use ensemble_application::RouteAndAnswerOutput;
use ensemble_domain::{EnsembleResult, ModelCallResult, StreamEvent};
use serde::Serialize;

/// Formats results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Routing details, every response, the final answer and costs
    pub fn format_routed(output: &RouteAndAnswerOutput) -> String {
        let mut text = String::new();

        text.push_str(&Self::header("LLM Ensemble Results"));
        text.push('\n');
        text.push_str(&format!(
            "{} {}\n\n",
            "Question:".cyan().bold(),
            output.result.question
        ));

        let c = &output.classification;
        text.push_str(&Self::section_header("Routing"));
        text.push_str(&format!(
            "{} {} ({:.0}% confidence{})\n",
            "Complexity:".cyan(),
            c.complexity,
            c.confidence * 100.0,
            if c.fallback_used { ", fallback" } else { "" }
        ));
        text.push_str(&format!(
            "{} {}\n",
            "Models:".cyan(),
            output
                .routing
                .models_to_use
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        text.push_str(&format!("{} {}\n", "Why:".cyan(), output.routing.rationale));
        if let Some(search) = &output.search {
            text.push_str(&format!(
                "{} {} citation(s)\n",
                "Web search:".cyan(),
                search.citations.len()
            ));
        }

        text.push_str(&Self::responses(&output.result));

        if let Some(answer) = &output.final_answer {
            text.push_str(&Self::section_header("Answer"));
            if let Some(model) = &output.final_answer_model {
                text.push_str(&format!("{}\n", format!("── {} ──", model).yellow().bold()));
            }
            text.push_str(answer);
            text.push('\n');
        }

        let costs = &output.cost_breakdown;
        text.push_str(&Self::section_header("Cost"));
        text.push_str(&format!(
            "Total ${:.6} (baseline ${:.6}, saved ${:.6} / {:.1}%)\n",
            costs.total_cost, costs.baseline_cost, costs.savings, costs.savings_percent
        ));
        text.push_str(&format!(
            "{}\n",
            format!("Finished in {}ms", output.metrics.total_time_ms).dimmed()
        ));

        text.push_str(&Self::footer());
        text
    }

    /// A fixed-model ensemble run
    pub fn format_ensemble(result: &EnsembleResult) -> String {
        let mut text = String::new();

        text.push_str(&Self::header("LLM Ensemble Results"));
        text.push('\n');
        text.push_str(&format!("{} {}\n", "Question:".cyan().bold(), result.question));
        text.push_str(&Self::responses(result));

        if let Some(synthesis) = &result.synthesis {
            text.push_str(&Self::section_header("Synthesis"));
            text.push_str(&Self::call(synthesis));
        }

        text.push_str(&format!(
            "\n{}\n",
            format!(
                "Total ${:.6} in {}ms",
                result.total_cost, result.total_time_ms
            )
            .dimmed()
        ));
        text.push_str(&Self::footer());
        text
    }

    /// Answer text only; empty when nothing succeeded
    pub fn format_answer(output: &RouteAndAnswerOutput) -> String {
        output.final_answer.clone().unwrap_or_default()
    }

    pub fn format_ensemble_answer(result: &EnsembleResult) -> String {
        result
            .final_answer()
            .map(|r| r.text.clone())
            .unwrap_or_default()
    }

    /// Format as JSON
    pub fn format_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    /// One line (or block) per stream event; heartbeats render dimmed
    pub fn format_event(event: &StreamEvent) -> String {
        match event {
            StreamEvent::Start { question, message } => {
                format!("{} {}\n{}", "Question:".cyan().bold(), question, message.dimmed())
            }
            StreamEvent::Classification {
                sensitivity,
                sensitivity_reason,
                model,
                time_points,
                ..
            } => {
                let line = format!("{} {} ({})", "Sensitivity:".cyan(), sensitivity, sensitivity_reason);
                if time_points.is_empty() {
                    return line;
                }
                format!(
                    "{}\n{} {} via {}",
                    line,
                    "Snapshots:".cyan(),
                    time_points.join(", "),
                    model
                )
            }
            StreamEvent::Snapshot {
                index,
                total,
                snapshot,
                ..
            } => {
                let title = format!("[{}/{}] {}", index, total, snapshot.time_point.label);
                if snapshot.result.success {
                    format!("\n{}\n{}", title.yellow().bold(), snapshot.result.text)
                } else {
                    format!(
                        "\n{}\nError: {}",
                        title.red().bold(),
                        snapshot.result.error.as_deref().unwrap_or("Unknown")
                    )
                }
            }
            StreamEvent::KeyChanges { transitions } => {
                let mut text = Self::section_header("Key Changes");
                for t in transitions {
                    text.push_str(&format!("{}\n", format!("{} → {}", t.from, t.to).bold()));
                    for change in &t.changes {
                        text.push_str(&format!("  * {}\n", change));
                    }
                }
                text
            }
            StreamEvent::Narrative {
                narrative,
                velocity,
                outlook,
                success,
            } => {
                if !success {
                    return format!("{}", "Narrative unavailable".red());
                }
                let mut text = Self::section_header("Evolution");
                text.push_str(narrative);
                text.push_str(&format!(
                    "\n\n{} {}\n",
                    "Velocity:".cyan(),
                    format!("{:?}", velocity).to_lowercase()
                ));
                if !outlook.is_empty() {
                    text.push_str(&format!("{} {}\n", "Outlook:".cyan(), outlook));
                }
                text
            }
            StreamEvent::Insight { index, insight, .. } => {
                format!("  {}. {}", index, insight)
            }
            StreamEvent::Timing(timing) => format!(
                "{}",
                format!(
                    "Finished in {}ms ({}ms saved by running in parallel, slowest step: {})",
                    timing.total_ms, timing.time_saved_ms, timing.bottleneck
                )
                .dimmed()
            ),
            StreamEvent::Complete(summary) => match &summary.skip_reason {
                Some(reason) => format!("{} {}", "Skipped:".yellow().bold(), reason),
                None => format!(
                    "{} {} snapshots, ${:.6}, {} tokens",
                    "Done:".green().bold(),
                    summary.total_snapshots,
                    summary.total_cost,
                    summary.total_tokens
                ),
            },
            StreamEvent::Error {
                message,
                stage,
                recoverable,
            } => {
                let label = if *recoverable { "Warning:".yellow() } else { "Error:".red() };
                match stage {
                    Some(stage) => format!("{} {} (during {})", label.bold(), message, stage),
                    None => format!("{} {}", label.bold(), message),
                }
            }
            StreamEvent::Heartbeat { message } => format!("{}", message.dimmed()),
        }
    }

    fn responses(result: &EnsembleResult) -> String {
        let mut text = Self::section_header("Responses");
        for response in &result.responses {
            text.push_str(&Self::call(response));
        }
        text
    }

    fn call(response: &ModelCallResult) -> String {
        if response.success {
            format!(
                "\n{}\n{}\n",
                format!("── {} ({}ms) ──", response.model, response.latency_ms)
                    .yellow()
                    .bold(),
                response.text
            )
        } else {
            format!(
                "\n{}\nError: {}\n",
                format!("── {} ──", response.model).red().bold(),
                response.error.as_deref().unwrap_or("Unknown")
            )
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_domain::{CallErrorKind, Complexity, Model, SensitivityLevel, TokenUsage, TransitionChanges};
    use std::time::Duration;

    fn result() -> EnsembleResult {
        EnsembleResult::new(
            "Compare Rust and Go".to_string(),
            vec![
                ModelCallResult::success(
                    Model::Gpt4o,
                    "Rust has no GC",
                    TokenUsage::new(100, 200),
                    Duration::from_millis(1200),
                ),
                ModelCallResult::failure(
                    Model::Gpt4Turbo,
                    CallErrorKind::Timeout,
                    "timed out",
                    Duration::from_secs(30),
                ),
            ],
            None,
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_ensemble_lists_failures() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format_ensemble(&result());
        assert!(text.contains("── gpt-4o (1200ms) ──"));
        assert!(text.contains("── gpt-4-turbo ──\nError: timed out"));
        assert!(!text.contains("Synthesis"));
    }

    #[test]
    fn test_answer_only_prefers_best_success() {
        assert_eq!(ConsoleFormatter::format_ensemble_answer(&result()), "Rust has no GC");
    }

    #[test]
    fn test_event_lines() {
        colored::control::set_override(false);
        let changes = StreamEvent::KeyChanges {
            transitions: vec![TransitionChanges {
                from: "January 2023".to_string(),
                to: "January 2024".to_string(),
                changes: vec!["new CEO".to_string()],
            }],
        };
        let text = ConsoleFormatter::format_event(&changes);
        assert!(text.contains("January 2023 → January 2024"));
        assert!(text.contains("  * new CEO"));

        let warning = StreamEvent::Error {
            message: "snapshot lost".to_string(),
            stage: None,
            recoverable: true,
        };
        assert_eq!(ConsoleFormatter::format_event(&warning), "Warning: snapshot lost");

        let skipped = StreamEvent::Classification {
            sensitivity: SensitivityLevel::Low,
            sensitivity_reason: "no time-sensitive pattern matched".to_string(),
            complexity: Complexity::Simple,
            model: Model::Gpt4oMini,
            num_snapshots: 0,
            time_points: Vec::new(),
        };
        assert_eq!(
            ConsoleFormatter::format_event(&skipped),
            "Sensitivity: low (no time-sensitive pattern matched)"
        );

        let fatal = StreamEvent::fatal("all snapshot calls failed", Some("generating_snapshots"));
        assert_eq!(
            ConsoleFormatter::format_event(&fatal),
            "Error: all snapshot calls failed (during generating_snapshots)"
        );
    }
}
