// clientlink CLI - run client scripts headless and work with the command queue

mod exit_codes;
mod logging;
mod queue;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clientlink_config::Settings;
use clientlink_protocol::CommandKind;
use clientlink_queue::StoreError;
use clientlink_state::StatusError;

use exit_codes::{EXIT_ERROR, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "clink")]
#[command(about = "Drive a game client through its shared command queue")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "CLIENTLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lua script against the client
    #[command(after_help = "\
Examples:
  clink run walk.lua
  clink run walk.lua --status status.json --name walker
  clink run walk.lua --untargeted")]
    Run {
        /// Script file
        script: PathBuf,

        /// Session name (defaults to the script's file stem)
        #[arg(long)]
        name: Option<String>,

        /// Queue file (defaults to queue.path, then shared memory)
        #[arg(long)]
        queue: Option<PathBuf>,

        /// Process-state snapshot, re-read whenever a command completes
        #[arg(long)]
        status: Option<PathBuf>,

        /// Run with no client attached; commands are dropped
        #[arg(long)]
        untargeted: bool,

        /// Process id recorded for the attached client
        #[arg(long)]
        pid: Option<u32>,
    },

    /// Inspect or reset the shared command queue
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Act as the client: execute queued commands in order
    #[command(after_help = "\
Examples:
  clink serve
  clink serve --delay-ms 200
  clink serve --once")]
    Serve {
        /// Queue file (defaults to queue.path, then shared memory)
        #[arg(long)]
        queue: Option<PathBuf>,

        /// Simulated time spent on each command
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        /// Drain what is pending, then exit
        #[arg(long)]
        once: bool,
    },

    /// List the command names scripts can call
    Commands,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Print the last processed id and the pending commands
    Show {
        #[arg(long)]
        queue: Option<PathBuf>,

        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop every pending command, keeping the processed id
    Clear {
        #[arg(long)]
        queue: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    logging::init(&settings.log_level, cli.verbose);

    let result = match cli.command {
        None => {
            eprintln!("Usage: clink <command> [options]");
            eprintln!("       clink --help for more information");
            Ok(())
        }
        Some(Commands::Run { script, name, queue, status, untargeted, pid }) => {
            let queue = queue.unwrap_or_else(|| settings.resolved_queue_path());
            run::cmd_run(
                &settings,
                run::RunArgs { script, name, queue, status, untargeted, pid },
            )
        }
        Some(Commands::Queue(queue_cmd)) => match queue_cmd {
            QueueCommands::Show { queue, json } => {
                queue::cmd_show(&queue.unwrap_or_else(|| settings.resolved_queue_path()), json)
            }
            QueueCommands::Clear { queue } => {
                queue::cmd_clear(&queue.unwrap_or_else(|| settings.resolved_queue_path()))
            }
        },
        Some(Commands::Serve { queue, delay_ms, once }) => queue::cmd_serve(
            &queue.unwrap_or_else(|| settings.resolved_queue_path()),
            Duration::from_millis(delay_ms),
            settings.poll_interval(),
            once,
        ),
        Some(Commands::Commands) => cmd_commands(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn cmd_commands() -> Result<(), CliError> {
    for kind in CommandKind::ALL {
        println!("{}", kind);
    }
    Ok(())
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Exit with `code` without printing anything; the command already
    /// reported what went wrong.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::Io { .. } => Some(format!(
                "check that the queue directory exists and is writable, or set queue.path in {}",
                Settings::config_path_display()
            )),
            StoreError::Corrupt { .. } => {
                Some("the queue file is not a queue snapshot; `clink queue clear` rewrites it".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_STORE, message: err.to_string(), hint }
    }

    pub fn status(err: StatusError) -> Self {
        Self {
            code: EXIT_STORE,
            message: err.to_string(),
            hint: Some("the status file maps bucket names to key/value objects".to_string()),
        }
    }
}
