//! Command-line surface for the orchestration kernel: a derive-based
//! `Cli`/`Commands` pair, a thin `#[tokio::main]` dispatcher, and each
//! subcommand's logic living in its own `commands::` module.

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};
use error::ArboristResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arborist", version, about = "Drive a task tree through implement/test/review, one branch and commit at a time")]
struct Cli {
    /// Repository the kernel reads and writes. Defaults to the current
    /// directory.
    #[arg(long, global = true, default_value = ".")]
    target_repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a spec directory into a task tree and materialize its
    /// branches.
    Build {
        #[arg(long, default_value = "spec")]
        spec_dir: PathBuf,

        #[arg(long, default_value = "feature")]
        namespace: String,

        /// Generate the spec tree itself from a prompt instead of reading
        /// `spec_dir`. Not implemented by this kernel.
        #[arg(long, default_value_t = false)]
        ai: bool,

        /// Re-materialize even if the spec changed structurally since the
        /// last build.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Drive a previously-built spec's tasks to completion.
    Run {
        #[arg(long, default_value = "feature")]
        namespace: String,

        #[arg(long)]
        spec_id: String,

        #[arg(long)]
        runner: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long = "max-retries")]
        max_retries: Option<u32>,

        #[arg(long = "test-command")]
        test_command: Option<String>,
    },

    /// Print every task's current protocol state.
    Status {
        #[arg(long = "spec-id")]
        spec_id: Option<String>,

        #[arg(long, default_value = "text")]
        format: Format,
    },

    /// Print the full commit history of one task.
    Inspect {
        task_id: String,

        #[arg(long, default_value = "text")]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    arborist_telemetry::init_logging("info");

    let cli = Cli::parse();
    let result = dispatch(cli).await;

    if let Err(err) = result {
        eprintln!("{}", err.code());
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> ArboristResult<()> {
    match cli.command {
        Commands::Build {
            spec_dir,
            namespace,
            ai,
            force,
        } => commands::build::run(&cli.target_repo, &spec_dir, &namespace, ai, force).await,
        Commands::Run {
            namespace,
            spec_id,
            runner,
            model,
            max_retries,
            test_command,
        } => {
            commands::run::run(
                &cli.target_repo,
                &namespace,
                &spec_id,
                runner,
                model,
                max_retries,
                test_command,
            )
            .await
        }
        Commands::Status { spec_id, format } => commands::status::run(&cli.target_repo, spec_id, format).await,
        Commands::Inspect { task_id, format } => commands::inspect::run(&cli.target_repo, &task_id, format).await,
    }
}
