//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for one-shot answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every model response, routing details and costs
    Full,
    /// Only the final answer
    Answer,
    /// JSON output
    Json,
}

/// CLI arguments for llm-ensemble
#[derive(Parser, Debug)]
#[command(name = "llm-ensemble")]
#[command(author, version, about = "LLM Ensemble - Route questions to the cheapest adequate set of models")]
#[command(long_about = r#"
LLM Ensemble fans a question out to several hosted models in parallel and
optionally merges their answers with a synthesis model.

A cheap classifier call grades each question first, so simple questions go to
one fast model while complex ones get the full ensemble plus synthesis.
Time-sensitive questions can also be answered "as of" several past dates to
show how the answer evolved.

Configuration files are loaded from (in priority order):
1. --config <path>            Explicit config file
2. ./ensemble.toml            Project-level config
3. ~/.config/llm-ensemble/config.toml   Global config
Environment variables prefixed with ENSEMBLE_ override all files
(e.g. ENSEMBLE_SERVER__PORT=9000).

Example:
  llm-ensemble serve --port 8000
  llm-ensemble ask "What's the difference between TCP and UDP?"
  llm-ensemble ask -m gpt-4o -m gpt-4o-mini --synthesis "Compare Rust and Go"
  llm-ensemble time-travel "Who is the current CEO of Twitter?"
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Answer one question and exit
    Ask(AskArgs),
    /// Show how the answer to a question evolved over time
    TimeTravel(TimeTravelArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides [server] host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub question: String,

    /// Run exactly these models instead of routing (can be specified multiple times)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Always merge the answers with the synthesis model
    #[arg(long, conflicts_with = "no_synthesis")]
    pub synthesis: bool,

    /// Never run synthesis
    #[arg(long)]
    pub no_synthesis: bool,

    /// Ground the answers in a web search first
    #[arg(long)]
    pub search: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub output: OutputFormat,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}

impl AskArgs {
    /// `None` leaves the decision to the router
    pub fn synthesis_override(&self) -> Option<bool> {
        match (self.synthesis, self.no_synthesis) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct TimeTravelArgs {
    /// The question to ask
    pub question: String,

    /// Generate snapshots even when the question looks timeless
    #[arg(short, long)]
    pub force: bool,

    /// Print raw stream events as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_with_models_and_flags() {
        let cli = Cli::try_parse_from([
            "llm-ensemble",
            "-vv",
            "ask",
            "-m",
            "gpt-4o",
            "-m",
            "gpt-4o-mini",
            "--no-synthesis",
            "--output",
            "json",
            "Compare Rust and Go",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Ask(args)) => {
                assert_eq!(args.model, vec!["gpt-4o", "gpt-4o-mini"]);
                assert_eq!(args.synthesis_override(), Some(false));
                assert_eq!(args.output, OutputFormat::Json);
                assert_eq!(args.question, "Compare Rust and Go");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_synthesis_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "llm-ensemble",
            "ask",
            "--synthesis",
            "--no-synthesis",
            "q",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_serve_overrides_and_global_config() {
        let cli = Cli::try_parse_from([
            "llm-ensemble",
            "serve",
            "--port",
            "9000",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(9000));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_show_config_needs_no_command() {
        let cli = Cli::try_parse_from(["llm-ensemble", "--show-config"]).unwrap();
        assert!(cli.show_config);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_time_travel_force() {
        let cli = Cli::try_parse_from(["llm-ensemble", "time-travel", "--force", "What is Rust?"]).unwrap();
        match cli.command {
            Some(Command::TimeTravel(args)) => {
                assert!(args.force);
                assert!(!args.json);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
