//! DOSEmu supervisor - launch and control DOSEmu through dosdebug.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dosemu_supervisor::config::{render_config, ConfigLoader, SupervisorConfig};
use dosemu_supervisor::display::{self, ConsoleSink};
use dosemu_supervisor::process::check_executable;
use dosemu_supervisor::sink::SharedSink;
use dosemu_supervisor::supervisor::{StopReport, Supervisor, SupervisorError};

#[derive(Parser)]
#[command(
    name = "dosemu-supervisor",
    about = "Launch and control DOSEmu through dosdebug",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Supervisor settings file (defaults to .dosemu-supervisor.toml or
    /// the user config directory).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start DOSEmu and keep it supervised until Ctrl-C or until it exits.
    Run {
        /// DOSEmu executable.
        #[arg(long)]
        primary: Option<PathBuf>,
        /// DOSEmu config file passed with -f (empty or ~/.dosemurc for the default).
        #[arg(long, default_value = "")]
        config: String,
        /// dosdebug executable.
        #[arg(long)]
        companion: Option<PathBuf>,
        /// Use PC console video (-c).
        #[arg(long)]
        console: bool,
        /// Use BIOS-VGA modes (-V).
        #[arg(long)]
        vga: bool,
        /// Print without colors.
        #[arg(long)]
        plain: bool,
    },
    /// Check that DOSEmu and dosdebug can be executed.
    Check {
        /// DOSEmu executable.
        #[arg(long)]
        primary: Option<PathBuf>,
        /// dosdebug executable.
        #[arg(long)]
        companion: Option<PathBuf>,
    },
    /// Print the effective settings as TOML.
    Config,
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
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .settings
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = loader.find_config_file() {
        tracing::info!(path = %path.display(), "Using settings file");
    }

    match cli.command {
        Commands::Run {
            primary,
            config: dos_config,
            companion,
            console,
            vga,
            plain,
        } => {
            if let Some(path) = companion {
                config.companion.path = path;
            }
            if console {
                config.primary.extra_args.push("-c".to_string());
            }
            if vga {
                config.primary.extra_args.push("-V".to_string());
            }
            let primary = primary.unwrap_or_else(|| config.primary.path.clone());
            run(config, primary, &dos_config, plain).await
        }
        Commands::Check { primary, companion } => {
            let primary = primary.unwrap_or_else(|| config.primary.path.clone());
            let companion = companion.unwrap_or_else(|| config.companion.path.clone());
            check(&loader, &primary, &companion)
        }
        Commands::Config => match render_config(&config) {
            Ok(rendered) => {
                print!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(
    config: SupervisorConfig,
    primary: PathBuf,
    dos_config: &str,
    plain: bool,
) -> ExitCode {
    let poll_interval = config.timing.poll_interval();
    let sink: SharedSink = Arc::new(ConsoleSink::new(plain));
    let mut supervisor = Supervisor::new(config, sink);

    if let Err(e) = supervisor.start(&primary, dos_config).await {
        tracing::debug!(error = ?e, "Start failed");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut exit_code = ExitCode::SUCCESS;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("Interrupted, stopping DOSEmu");
                exit_code = report_stop(&supervisor.stop().await);
                break;
            }
            _ = ticker.tick() => {
                if !supervisor.is_running().await {
                    break;
                }
            }
        }
    }

    let stats = supervisor.stats();
    tracing::info!(
        starts = stats.starts,
        stops = stats.stops,
        unexpected_exits = stats.unexpected_exits,
        "Supervisor finished"
    );
    exit_code
}

/// Log the outcome of an interactive stop and map it to an exit code.
fn report_stop(result: &Result<StopReport, SupervisorError>) -> ExitCode {
    match result {
        Ok(report) => {
            tracing::info!(
                forced = report.forced_termination,
                kill_acknowledged = report.shutdown.kill_acknowledged(),
                "Stopped"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Stop failed");
            ExitCode::FAILURE
        }
    }
}

fn check(loader: &ConfigLoader, primary: &std::path::Path, companion: &std::path::Path) -> ExitCode {
    match loader.find_config_file() {
        Some(path) => display::print_check("settings", true, &path.display().to_string()),
        None => display::print_check("settings", true, "built-in defaults"),
    }

    let mut ok = true;
    for (label, path) in [("dosemu", primary), ("dosdebug", companion)] {
        match check_executable(path) {
            Ok(()) => display::print_check(label, true, &path.display().to_string()),
            Err(e) => {
                ok = false;
                display::print_check(label, false, &e.to_string());
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
