//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;

use hit_count_monitor::core::config::DashboardConfig;
use hit_count_monitor::core::errors::{ErrorKind, HcmError};
use hit_count_monitor::daemon::dashboard::Dashboard;
use hit_count_monitor::daemon::signals::SignalHandler;
use hit_count_monitor::logger::activity::{ActivityLoggerHandle, spawn_logger};
use hit_count_monitor::logger::jsonl::JsonlConfig;
use hit_count_monitor::search::client::HttpSearchClient;
use hit_count_monitor::widget::hit_count::WidgetUpdate;
use hit_count_monitor::widget::props::{self, WidgetConfig};
use hit_count_monitor::widget::view::{WidgetView, render_text};

/// Hit Count Monitor: Elasticsearch hit count dashboard widgets.
#[derive(Debug, Parser)]
#[command(
    name = "hcm",
    author,
    version,
    about = "Hit Count Monitor - Elasticsearch hit count dashboard",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override dashboard config path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Mount every widget and render updates until interrupted.
    Watch,
    /// Validate the dashboard config and every widget's props.
    Check,
    /// Run one poll per widget, print the results, and exit.
    Poll(PollArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct PollArgs {
    /// Give up on widgets that have not settled after this many milliseconds.
    #[arg(long, default_value_t = 15_000, value_name = "MS")]
    timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
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
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Some widgets worked, some did not.
    #[error("{0}")]
    Partial(String),
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
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<HcmError> for CliError {
    fn from(err: HcmError) -> Self {
        match err.kind() {
            ErrorKind::Configuration => Self::User(err.to_string()),
            ErrorKind::Fetch | ErrorKind::Runtime => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch the parsed command line.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Watch => run_watch(cli),
        Command::Check => run_check(cli),
        Command::Poll(args) => run_poll(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── watch ────────────────────

fn run_watch(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let transport = Arc::new(HttpSearchClient::new(&config.http)?);
    let (activity, logger_join) = start_activity_log(&config)?;
    let signals = SignalHandler::new();
    let mode = output_mode(cli);
    let color = use_color(cli, mode);

    if config.widgets.is_empty() {
        eprintln!(
            "hcm: no widgets configured in {}",
            config.config_file.display()
        );
    }

    let mut dashboard = Dashboard::mount(config, transport, activity.clone());
    let mut stdout = io::stdout();
    emit_initial_views(&mut stdout, mode, color, &dashboard.views());

    let reload_path = cli.config.clone();
    dashboard.run(
        &signals,
        || DashboardConfig::load(reload_path.as_deref()),
        |_, update: &WidgetUpdate| {
            if let Err(e) = emit_view(&mut stdout, mode, color, update.widget_id, &update.view) {
                eprintln!("[HCM-DASH] failed to write update: {e}");
            }
        },
    );

    stop_activity_log(&activity, logger_join);
    Ok(())
}

/// Write every view, logging failures instead of aborting. Returns how many
/// views failed to write.
fn emit_initial_views(
    out: &mut impl Write,
    mode: OutputMode,
    color: bool,
    views: &[WidgetView],
) -> usize {
    let mut failed = 0;
    for (id, view) in views.iter().enumerate() {
        if let Err(e) = emit_view(out, mode, color, id, view) {
            eprintln!("[HCM-DASH] failed to write initial view #{id}: {e}");
            failed += 1;
        }
    }
    failed
}

fn emit_view(
    out: &mut impl Write,
    mode: OutputMode,
    color: bool,
    id: usize,
    view: &WidgetView,
) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => writeln!(out, "#{id} {}", render_text(view, color))?,
        OutputMode::Json => {
            let line = serde_json::to_string(&json!({ "widget_id": id, "view": view }))?;
            writeln!(out, "{line}")?;
        }
    }
    out.flush()?;
    Ok(())
}

// ──────────────────── check ────────────────────

fn run_check(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let credentials = config.credential_store();

    let mut invalid = 0usize;
    let mut reports = Vec::with_capacity(config.widgets.len());
    for (id, raw) in config.widgets.iter().enumerate() {
        let props_value = serde_json::to_value(raw)?;
        let violations = props::validate(&props_value);
        let mut warnings = Vec::new();
        if let Ok(widget) = WidgetConfig::from_props(&props_value)
            && let Some(key) = widget.auth_key.as_deref()
            && !credentials.contains(key)
        {
            warnings.push(format!("authKey {key:?} has no [auth.{key}] credentials"));
        }
        if !violations.is_empty() {
            invalid += 1;
        }
        let title = props_value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(props::DEFAULT_TITLE)
            .to_string();
        reports.push((id, title, violations, warnings));
    }

    let mut stdout = io::stdout();
    match output_mode(cli) {
        OutputMode::Json => {
            let widgets: Vec<Value> = reports
                .iter()
                .map(|(id, title, violations, warnings)| {
                    json!({
                        "widget_id": id,
                        "title": title,
                        "valid": violations.is_empty(),
                        "violations": violations,
                        "warnings": warnings,
                    })
                })
                .collect();
            let doc = json!({
                "config": config.config_file.display().to_string(),
                "config_hash": config.stable_hash()?,
                "widgets": widgets,
                "invalid": invalid,
            });
            writeln!(stdout, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
        OutputMode::Human => {
            writeln!(stdout, "config: {}", config.config_file.display())?;
            for (id, title, violations, warnings) in &reports {
                let status = if violations.is_empty() { "ok" } else { "INVALID" };
                writeln!(stdout, "#{id} {title}: {status}")?;
                for v in violations {
                    writeln!(stdout, "    - {v}")?;
                }
                for w in warnings {
                    writeln!(stdout, "    ! {w}")?;
                }
            }
        }
    }

    if invalid > 0 {
        return Err(CliError::User(format!(
            "{invalid} of {} widgets failed validation",
            reports.len()
        )));
    }
    Ok(())
}

// ──────────────────── poll ────────────────────

fn run_poll(cli: &Cli, args: &PollArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let transport = Arc::new(HttpSearchClient::new(&config.http)?);
    let (activity, logger_join) = start_activity_log(&config)?;
    let mode = output_mode(cli);
    let color = use_color(cli, mode);

    let mut dashboard = Dashboard::mount(config, transport, activity.clone());
    let settled = dashboard.wait_until_settled(Duration::from_millis(args.timeout_ms));
    let views = dashboard.views();
    dashboard.shutdown("poll complete");
    stop_activity_log(&activity, logger_join);

    let mut stdout = io::stdout();
    for (id, view) in views.iter().enumerate() {
        emit_view(&mut stdout, mode, color, id, view)?;
    }

    if !settled {
        return Err(CliError::Partial(format!(
            "some widgets did not settle within {}ms",
            args.timeout_ms
        )));
    }
    let failed = views.iter().filter(|v| v.has_error).count();
    if failed > 0 {
        return Err(CliError::Partial(format!(
            "{failed} of {} widgets reported an error",
            views.len()
        )));
    }
    Ok(())
}

// ──────────────────── helpers ────────────────────

fn load_config(cli: &Cli) -> Result<DashboardConfig, CliError> {
    Ok(DashboardConfig::load(cli.config.as_deref())?)
}

fn start_activity_log(
    config: &DashboardConfig,
) -> Result<(ActivityLoggerHandle, Option<thread::JoinHandle<()>>), CliError> {
    if !config.logging.enabled {
        return Ok((ActivityLoggerHandle::disabled(), None));
    }
    let jsonl = JsonlConfig {
        path: config.logging.jsonl_log.clone(),
        fallback_path: config.logging.fallback_log.clone(),
        ..JsonlConfig::default()
    };
    let (handle, join) = spawn_logger(jsonl)?;
    Ok((handle, Some(join)))
}

fn stop_activity_log(handle: &ActivityLoggerHandle, join: Option<thread::JoinHandle<()>>) {
    handle.shutdown();
    if let Some(join) = join {
        let _ = join.join();
    }
    let dropped = handle.dropped_events();
    if dropped > 0 {
        eprintln!("[HCM-DASH] {dropped} activity events were dropped");
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("HCM_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

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

fn use_color(cli: &Cli, mode: OutputMode) -> bool {
    mode == OutputMode::Human && !cli.no_color && io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("JSON ")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human")), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None), OutputMode::Human);
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(CliError::Partial(String::new()).exit_code(), 4);
    }

    #[test]
    fn config_errors_map_to_user_errors() {
        let err: CliError = HcmError::MissingConfig {
            path: PathBuf::from("/nope"),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn loading_view(title: &str) -> WidgetView {
        WidgetView::new(title, &hit_count_monitor::widget::state::DisplayState::default())
    }

    #[test]
    fn initial_view_write_errors_are_counted_not_dropped() {
        let views = [loading_view("A"), loading_view("B")];
        assert_eq!(
            emit_initial_views(&mut BrokenPipe, OutputMode::Human, false, &views),
            2
        );

        let mut buf = Vec::new();
        assert_eq!(emit_initial_views(&mut buf, OutputMode::Human, false, &views), 0);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "#0 A: loading…\n#1 B: loading…\n");
    }

    #[test]
    fn emit_view_propagates_write_errors() {
        let err = emit_view(&mut BrokenPipe, OutputMode::Json, false, 0, &loading_view("A"))
            .unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn poll_timeout_parses() {
        let cli = Cli::try_parse_from(["hcm", "poll", "--timeout-ms", "250"]).unwrap();
        match cli.command {
            Command::Poll(args) => assert_eq!(args.timeout_ms, 250),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
