//! Forkline - relay child process output and run self-forking demos.

use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forkline::config::{Config, ConfigLoader};
use forkline::display;
use forkline::fork::{ForkError, ForkHandle, Forker, Role};
use forkline::process::{ProcessBridge, ProcessBuilder, ProcessError};
use forkline::stream::{listener, ProcessEvent};

#[derive(Parser)]
#[command(
    name = "forkline",
    about = "Relay child process output as line events, or fork this program into workers",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program and relay its stdout and stderr line by line.
    Run {
        /// Print events as JSON objects.
        #[arg(long)]
        json: bool,
        /// Prefix relayed lines with a timestamp.
        #[arg(long)]
        timestamps: bool,
        /// Forward this program's stdin to the child.
        #[arg(long)]
        stdin: bool,
        /// Program to run, followed by its arguments.
        #[arg(
            value_name = "COMMAND",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command: Vec<String>,
    },
    /// Fork this program into workers that multiply the numbers sent to them.
    Demo {
        /// Number of forks to create.
        #[arg(long, default_value_t = 2)]
        forks: u32,
    },
}

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Fork(#[from] ForkError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid number {0:?}")]
    InvalidNumber(String),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ConfigLoader::new().load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    // The role marker is not a CLI option; read it, then hide it from clap.
    let raw: Vec<OsString> = std::env::args_os().collect();
    let role = Role::from_parts(
        raw.iter().skip(1).cloned(),
        std::env::var_os(&config.fork.env_var),
        &config.fork,
    );
    let cli = Cli::parse_from(raw.iter().filter(|arg| !config.fork.is_flag(arg)));
    init_tracing(cli.verbose);
    tracing::debug!(%role, "Starting forkline");

    let result = match cli.command {
        Commands::Run {
            json,
            timestamps,
            stdin,
            command,
        } => {
            let (program, args) = command.split_first().unzip();
            run(
                &config,
                RunOptions {
                    json,
                    timestamps,
                    stdin,
                },
                program.map_or("", String::as_str),
                args.unwrap_or_default(),
            )
            .await
        }
        Commands::Demo { forks } => demo(&Forker::new(role, config), forks).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

struct RunOptions {
    json: bool,
    timestamps: bool,
    stdin: bool,
}

async fn run(
    config: &Config,
    options: RunOptions,
    program: &str,
    args: &[String],
) -> Result<ExitCode, AppError> {
    let bridge = ProcessBridge::create(
        ProcessBuilder::new(program)
            .args(args)
            .kill_on_dispose(config.process.kill_on_dispose),
    );
    let mut events = bridge.events();
    bridge.start()?;

    if options.stdin {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Err(e) = bridge.send_line(&line).await {
                    tracing::debug!(error = %e, "Stopped forwarding stdin");
                    break;
                }
            }
        });
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) if options.json => display::print_json_event(program, &event),
                Some(ProcessEvent::Line(line)) => display::print_line(program, &line, options.timestamps),
                Some(ProcessEvent::Completed) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, terminating child");
                bridge.terminate(config.process.terminate_timeout()).await?;
            }
        }
    }

    let code = bridge.wait_for_exit().await?;
    if !options.json {
        display::print_exit_code(program, code);
    }
    bridge.dispose();

    Ok(code.map_or(ExitCode::FAILURE, |c| {
        ExitCode::from(u8::try_from(c).unwrap_or(1))
    }))
}

async fn demo(forker: &Forker, count: u32) -> Result<ExitCode, AppError> {
    // In a fork every handle is inert, so the same code only does fork work.
    let forks: Vec<(String, ForkHandle)> = (1..=count)
        .map(|i| forker.fork().map(|fork| (format!("FORK{i}"), fork)))
        .collect::<Result<_, _>>()?;

    forker.run_as_master(|| display::print_status("Starting forks..."));

    let subscriptions: Vec<_> = forks
        .iter()
        .map(|(label, fork)| {
            let on_line = label.clone();
            let on_done = label.clone();
            fork.subscribe(listener(
                move |line| display::print_line(&on_line, line, false),
                move || display::print_completed(&on_done),
            ))
        })
        .collect();

    for (_, fork) in &forks {
        fork.start()?;
    }

    for (n, (_, fork)) in (0..).zip(&forks) {
        let x = 5 + 2 * n;
        fork.send_line(&x.to_string()).await?;
        fork.send_line(&(x + 1).to_string()).await?;
    }

    if let Some(result) = forker.run_as_fork_async(multiply_stdin).await {
        result?;
    }

    for (label, fork) in &forks {
        if let Some(code) = fork
            .run_as_master_async(|bridge| async move { bridge.wait_for_exit().await })
            .await
        {
            display::print_exit_code(label, code?);
        }
    }

    for subscription in &subscriptions {
        subscription.dispose();
    }
    for (_, fork) in &forks {
        fork.dispose();
    }
    Ok(ExitCode::SUCCESS)
}

/// Fork side of the demo: read two numbers and print their product.
async fn multiply_stdin() -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let x = read_number(&mut lines).await?;
    let y = read_number(&mut lines).await?;
    println!("{x} * {y} = {}", x * y);
    Ok(())
}

async fn read_number<R>(lines: &mut Lines<R>) -> Result<i64, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let line = lines.next_line().await?.unwrap_or_default();
    line.trim()
        .parse()
        .map_err(|_| AppError::InvalidNumber(line))
}
