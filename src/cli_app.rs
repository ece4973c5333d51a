//! Top-level CLI definition and dispatch.

use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use lcd_commander::core::config::Config;
use lcd_commander::core::errors::PanelError;
use lcd_commander::daemon::loop_main::{DaemonArgs, PanelDaemon, PanelParts};
use lcd_commander::daemon::signals::SignalHandler;
use lcd_commander::hal::display::{CharDisplay, Geometry};
use lcd_commander::hal::input::{INPUT_QUEUE_CAPACITY, input_channel};
use lcd_commander::hal::stream::{StreamDisplay, spawn_line_reader};
use lcd_commander::hal::terminal::{TerminalDisplay, spawn_key_reader};
use lcd_commander::logger::activity::spawn_logger;
use lcd_commander::logger::jsonl::JsonlConfig;
use lcd_commander::menu::executor::CommandExecutor;
use lcd_commander::menu::resolver::{ResolvedAction, STAT_PREFIX, resolve};
use lcd_commander::menu::tree::{MenuNode, MenuTree};
use lcd_commander::stats::{LinuxStats, StatMethod, StatsSource};

/// LCD Commander: menu-driven control panel for character LCDs.
#[derive(Debug, Parser)]
#[command(
    name = "lcdc",
    author,
    version,
    about = "LCD Commander - character LCD control panel",
    long_about = None
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute (defaults to `run`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the panel until terminated.
    Run(RunArgs),
    /// Validate the configuration and print a summary.
    Check,
    /// Print the menu tree.
    Menu,
    /// Look up one statistic.
    Stat(StatArgs),
    /// Resolve and execute one action, printing the display-sized result.
    Exec(ExecArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Emulate the panel in this terminal; arrow keys drive the menu.
    #[arg(long)]
    terminal: bool,
    /// Stop when standard input is exhausted (headless mode only).
    #[arg(long, conflicts_with = "terminal")]
    exit_on_eof: bool,
    /// Systemd watchdog timeout in seconds (0 disables).
    #[arg(long, default_value_t = 0, value_name = "SECONDS")]
    watchdog_sec: u64,
}

#[derive(Debug, Clone, Args)]
struct StatArgs {
    /// Stat name: `ip`, `get_ip` or `stat:get_ip`.
    name: String,
}

#[derive(Debug, Clone, Args)]
struct ExecArgs {
    /// Shell command or `stat:<name>` wildcard.
    action: String,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration or user input.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<PanelError> for CliError {
    fn from(err: PanelError) -> Self {
        if err.is_fatal() || matches!(err, PanelError::UnknownStatMethod { .. }) {
            Self::User(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        None => run_panel(cli, &RunArgs::default()),
        Some(Command::Run(args)) => run_panel(cli, args),
        Some(Command::Check) => run_check(cli),
        Some(Command::Menu) => run_menu(cli),
        Some(Command::Stat(args)) => run_stat(cli, args),
        Some(Command::Exec(args)) => run_exec(cli, args),
        Some(Command::Completions(args)) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── config ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.verbose = true;
    }
    Ok(config)
}

/// Like [`load_config`], but an absent default config file means defaults.
fn load_config_or_default(cli: &Cli) -> Result<Config, CliError> {
    if cli.config.is_none() && !Config::default_path().exists() {
        return Ok(Config::default());
    }
    load_config(cli)
}

fn config_source(config: &Config) -> String {
    config
        .source
        .as_deref()
        .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string())
}

// ──────────────────── run ────────────────────

fn run_panel(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let geometry = Geometry::from(&config.hardware.i2c);

    let (logger, logger_join) = spawn_logger(JsonlConfig::at(&config.logging.jsonl_log))?;
    let signals = SignalHandler::new();
    let (sender, inputs) = input_channel(INPUT_QUEUE_CAPACITY);
    let stats: Arc<dyn StatsSource> = Arc::new(LinuxStats::new());
    let daemon_args = DaemonArgs {
        watchdog_sec: args.watchdog_sec,
    };

    if args.terminal {
        let display = TerminalDisplay::new(geometry)?;
        let keys = spawn_key_reader(sender, signals.clone())?;
        let parts = PanelParts {
            display,
            stats,
            inputs,
            logger,
            logger_join: Some(logger_join),
            signals,
        };
        drive(config, parts, &daemon_args)?;
        let _ = keys.join();
        return Ok(());
    }

    let on_eof = {
        let signals = signals.clone();
        let exit_on_eof = args.exit_on_eof;
        move || {
            if exit_on_eof {
                signals.request_shutdown();
            }
        }
    };
    // Detached: a blocked stdin read must not hold up shutdown.
    spawn_line_reader(BufReader::new(io::stdin()), sender, on_eof)?;
    let parts = PanelParts {
        display: StreamDisplay::new(geometry, io::stdout()),
        stats,
        inputs,
        logger,
        logger_join: Some(logger_join),
        signals,
    };
    drive(config, parts, &daemon_args)
}

fn drive<D: CharDisplay>(
    config: Config,
    parts: PanelParts<D>,
    args: &DaemonArgs,
) -> Result<(), CliError> {
    let mut daemon = PanelDaemon::init(config, parts, args)?;
    daemon.run()?;
    Ok(())
}

// ──────────────────── check ────────────────────

fn run_check(cli: &Cli) -> Result<(), CliError> {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(err) => {
            if output_mode(cli) == OutputMode::Json {
                write_json_line(&json!({
                    "command": "check",
                    "status": "invalid",
                    "error": err.to_string(),
                    "exit_code": err.exit_code(),
                }))?;
            }
            return Err(err);
        }
    };

    let tree = MenuTree::load(&config.menu)?;
    let geometry = Geometry::from(&config.hardware.i2c);
    let pages = config.non_empty_pages().count();
    let skipped = config.dashboard.pages.len() - pages;
    let config_hash = config
        .stable_hash()
        .map_err(|e| CliError::Internal(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "check",
            "status": "ok",
            "source": config_source(&config),
            "config_hash": config_hash,
            "display": geometry.to_string(),
            "menu_items": tree.depth_first().len(),
            "menu_actions": tree.leaf_count(),
            "dashboard_pages": pages,
            "dashboard_pages_skipped": skipped,
            "quick_launch": config.quick_launch.command(),
        }))?,
        OutputMode::Human => {
            let mut out = io::stdout().lock();
            writeln!(out, "{} {}", "ok".green().bold(), config_source(&config))?;
            writeln!(out, "  display:        {geometry}")?;
            writeln!(
                out,
                "  menu:           {} items, {} actions",
                tree.depth_first().len(),
                tree.leaf_count()
            )?;
            if pages == 0 {
                writeln!(out, "  dashboard:      default pages")?;
            } else {
                writeln!(out, "  dashboard:      {pages} page(s)")?;
            }
            if skipped > 0 {
                writeln!(
                    out,
                    "  {} {skipped} empty dashboard page(s) will be skipped",
                    "warning:".yellow()
                )?;
            }
            writeln!(
                out,
                "  quick launch:   {}",
                config.quick_launch.command().unwrap_or("(none)")
            )?;
            writeln!(out, "  config hash:    {config_hash}")?;
        }
    }
    Ok(())
}

// ──────────────────── menu ────────────────────

fn run_menu(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let tree = MenuTree::load(&config.menu)?;

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "menu",
            "items": tree.root().children().iter().map(node_json).collect::<Vec<_>>(),
        }))?,
        OutputMode::Human => {
            let mut out = io::stdout().lock();
            for (depth, node) in tree.depth_first() {
                let indent = "  ".repeat(depth);
                match node.action() {
                    Some(action) => {
                        let wait = if node.wait_for_key() { " [wait]" } else { "" };
                        writeln!(
                            out,
                            "{indent}{}  {}{}",
                            node.label(),
                            action.cyan(),
                            wait.dimmed()
                        )?;
                    }
                    None => writeln!(out, "{indent}{}", node.label().bold())?,
                }
            }
        }
    }
    Ok(())
}

fn node_json(node: &MenuNode) -> Value {
    match node.action() {
        Some(action) => json!({
            "label": node.label(),
            "action": action,
            "wait_for_key": node.wait_for_key(),
        }),
        None => json!({
            "label": node.label(),
            "items": node.children().iter().map(node_json).collect::<Vec<_>>(),
        }),
    }
}

// ──────────────────── stat / exec ────────────────────

fn parse_stat_name(raw: &str) -> Result<StatMethod, CliError> {
    let raw = raw.trim();
    if raw.starts_with(STAT_PREFIX) {
        return match resolve(raw)? {
            ResolvedAction::StatLookup(method) => Ok(method),
            ResolvedAction::ShellCommand(_) => Err(CliError::Internal(format!(
                "{raw:?} did not resolve to a stat"
            ))),
        };
    }
    Ok(raw.parse::<StatMethod>()?)
}

fn run_stat(cli: &Cli, args: &StatArgs) -> Result<(), CliError> {
    let method = parse_stat_name(&args.name)?;
    let value = LinuxStats::new().stat(method)?;

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "stat",
            "stat": method.name(),
            "value": value,
        }))?,
        OutputMode::Human => writeln!(io::stdout(), "{value}")?,
    }
    Ok(())
}

fn run_exec(cli: &Cli, args: &ExecArgs) -> Result<(), CliError> {
    let config = load_config_or_default(cli)?;
    let geometry = Geometry::from(&config.hardware.i2c);
    let executor = CommandExecutor::new(
        Arc::new(LinuxStats::new()),
        config.execution.timeout(),
        geometry,
    );
    let result = executor.run(&args.action);

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "exec",
            "action": args.action,
            "output_text": result.output_text,
            "succeeded": result.succeeded,
            "error_message": result.error_message,
            "elapsed_ms": u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
        }))?,
        OutputMode::Human => writeln!(io::stdout(), "{}", result.output_text)?,
    }

    if result.succeeded {
        Ok(())
    } else {
        Err(CliError::Runtime(format!(
            "action failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        )))
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LCDC_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

/// `--json` wins, then `LCDC_OUTPUT_FORMAT`; human otherwise, piped or not.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
