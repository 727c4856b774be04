#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use orbit_core::config::{OrbitConfig, load_config};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "orbit: event-sourced spaced repetition",
    long_about = None
)]
struct Cli {
    /// Config file (default: $ORBIT_CONFIG, then <config dir>/orbit/config.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite store to use instead of `store.path` from the config.
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Tasks",
        about = "Add a task",
        long_about = "Ingest a new QA task (with --answer) or plain task.",
        after_help = "EXAMPLES:\n    # Add a question and answer\n    orbit add --body \"Capital of France?\" --answer Paris\n\n    # Add a plain prompt with a known ID\n    orbit add --body \"Recall the GPL's four freedoms\" --id gpl-freedoms"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Record a review",
        long_about = "Record a repetition of one task component and reschedule it.",
        after_help = "EXAMPLES:\n    # Remembered the main component\n    orbit repeat <TASK> --outcome remembered\n\n    # Forgot one cloze deletion\n    orbit repeat <TASK> --component c1 --outcome forgotten"
    )]
    Repeat(cmd::repeat::RepeatArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Move a component's due time",
        long_about = "Set a component's due time without changing its interval.",
        after_help = "EXAMPLES:\n    # Due at a specific time (epoch millis)\n    orbit reschedule <TASK> --due 1767225600000"
    )]
    Reschedule(cmd::reschedule::RescheduleArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Delete a task",
        long_about = "Mark a task deleted; it drops out of review queues.",
        after_help = "EXAMPLES:\n    orbit delete <TASK>"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Restore a deleted task",
        after_help = "EXAMPLES:\n    orbit restore <TASK>"
    )]
    Restore(cmd::delete::RestoreArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one entity",
        long_about = "Show the current snapshot of a task or attachment.",
        after_help = "EXAMPLES:\n    # Show a task\n    orbit show <TASK>\n\n    # Emit machine-readable output\n    orbit show <TASK> --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List stored events",
        long_about = "Page through the event log in storage order.",
        after_help = "EXAMPLES:\n    # One entity's history\n    orbit events --entity <TASK>\n\n    # Next page\n    orbit events --after <EVENT> --limit 50"
    )]
    Events(cmd::events::EventsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the review queue",
        long_about = "List components due for review, at most one per task.",
        after_help = "EXAMPLES:\n    # Due now (plus the configured look-ahead)\n    orbit queue\n\n    # At most 10 items\n    orbit queue --limit 10 --json"
    )]
    Queue(cmd::queue::QueueArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Import events",
        long_about = "Load events from a JSON-lines file. Duplicates are ignored.",
        after_help = "EXAMPLES:\n    orbit import events.jsonl"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Rebuild snapshots",
        long_about = "Recompute every entity snapshot from the event log, e.g. after changing scheduler settings.",
        after_help = "EXAMPLES:\n    orbit rebuild"
    )]
    Rebuild,

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    orbit completions bash\n\n    # Generate zsh completions\n    orbit completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORBIT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "orbit=debug,orbit_core=debug,info"
        } else {
            "orbit=info,orbit_core=info,warn"
        })
    });

    let format = env::var("ORBIT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load(cli: &Cli, output: OutputMode) -> anyhow::Result<OrbitConfig> {
    load_config(cli.config.as_deref()).or_else(|err| {
        render_error(output, &CliError::from(&err))?;
        Err(err.into())
    })
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let config = load(&cli, output)?;
    let db = match cmd::open_database(&config, cli.db.as_deref()) {
        Ok(db) => db,
        Err(err) => {
            render_error(output, &CliError::new(format!("{err:#}")))?;
            return Err(err);
        }
    };

    let result = match &cli.command {
        Commands::Add(args) => cmd::add::run_add(args, &db, output),
        Commands::Repeat(args) => cmd::repeat::run_repeat(args, &db, output),
        Commands::Reschedule(args) => cmd::reschedule::run_reschedule(args, &db, output),
        Commands::Delete(args) => cmd::delete::run_delete(args, &db, output),
        Commands::Restore(args) => cmd::delete::run_restore(args, &db, output),
        Commands::Show(args) => cmd::show::run_show(args, &db, output),
        Commands::Events(args) => cmd::events::run_events(args, &db, output),
        Commands::Queue(args) => cmd::queue::run_queue(args, &config.review, &db, output),
        Commands::Import(args) => cmd::import::run_import(args, &db, output),
        Commands::Rebuild => cmd::rebuild::run_rebuild(&db, output),
        Commands::Completions(_) => Ok(()),
    };

    if let Err(err) = db.close() {
        tracing::warn!(error = %err, "failed to close store");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["orbit", "--json", "queue"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["orbit", "queue", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn default_output_is_human() {
        let cli = Cli::parse_from(["orbit", "rebuild"]);
        assert!(!cli.output_mode().is_json());
    }

    #[test]
    fn global_paths_parse_anywhere() {
        let cli = Cli::parse_from(["orbit", "show", "t1", "--db", "/tmp/o.sqlite3", "--config", "c.toml"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/o.sqlite3")));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn repeat_defaults_to_main_component() {
        let cli = Cli::parse_from(["orbit", "repeat", "t1", "--outcome", "skipped"]);
        let Commands::Repeat(args) = cli.command else {
            panic!("expected repeat");
        };
        assert_eq!(args.component, "main");
        assert_eq!(args.outcome, cmd::repeat::OutcomeArg::Skipped);
    }

    #[test]
    fn repeat_requires_outcome() {
        assert!(Cli::try_parse_from(["orbit", "repeat", "t1"]).is_err());
        assert!(Cli::try_parse_from(["orbit", "repeat", "t1", "--outcome", "meh"]).is_err());
    }

    #[test]
    fn reschedule_accepts_negative_due() {
        let cli = Cli::parse_from(["orbit", "reschedule", "t1", "--due", "-5"]);
        let Commands::Reschedule(args) = cli.command else {
            panic!("expected reschedule");
        };
        assert_eq!(args.due, -5);
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["orbit", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["orbit", "add", "--body", "x"],
            vec!["orbit", "add", "--body", "x", "--answer", "y"],
            vec!["orbit", "repeat", "t", "--outcome", "remembered"],
            vec!["orbit", "reschedule", "t", "--component", "c", "--due", "5"],
            vec!["orbit", "delete", "t"],
            vec!["orbit", "restore", "t"],
            vec!["orbit", "show", "t"],
            vec!["orbit", "events", "--entity", "t", "--limit", "3"],
            vec!["orbit", "queue", "--at", "0", "--limit", "5"],
            vec!["orbit", "import", "events.jsonl"],
            vec!["orbit", "rebuild"],
            vec!["orbit", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(
                result.is_ok(),
                "Failed to parse: {:?} error: {:?}",
                args,
                result.err()
            );
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
