use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use weatherdash::error::FETCH_FAILED_MESSAGE;
use weatherdash::{
    Dashboard, DashboardConfig, FetchState, ResolverState, UnitPreferences, telemetry,
};

/// Terminal weather dashboard backed by Open-Meteo.
///
/// Type a place name to search as you type, then pick a result.
#[derive(Parser, Debug)]
#[command(name = "weatherdash", version, about)]
struct Args {
    /// Path to a TOML config file (default: <config dir>/weatherdash/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with fahrenheit, mph and inches
    #[arg(long)]
    imperial: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Place to search for on startup
    query: Option<String>,
}

const HELP: &str = "\
Commands:
  <text>           search as you type
  /search <text>   search now
  /pick <n>        select result n
  /units           toggle metric/imperial
  /day <weekday>   show hourly forecast for a day
  /retry           reset after a failed fetch
  /show            redraw the dashboard
  /help            this text
  /quit            exit";

#[derive(Debug, PartialEq)]
enum Command {
    Type(String),
    Search(String),
    Pick(usize),
    Units,
    Day(String),
    Retry,
    Show,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Type(line.to_string());
        };
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        let arg = arg.trim();
        match name {
            "search" | "s" => Self::Search(arg.to_string()),
            "pick" | "p" => match arg.parse::<usize>() {
                Ok(n) if n > 0 => Self::Pick(n - 1),
                _ => Self::Unknown(line.to_string()),
            },
            "units" | "u" => Self::Units,
            "day" | "d" => Self::Day(arg.to_string()),
            "retry" | "r" => Self::Retry,
            "show" => Self::Show,
            "help" | "h" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

fn print_search(state: &ResolverState) {
    if let Some(condition) = state.condition {
        println!("{}", condition.user_message());
        return;
    }
    for (i, candidate) in state.candidates.iter().enumerate() {
        println!("  {}. {}", i + 1, candidate.label());
    }
}

fn print_fetch(dashboard: &Dashboard, state: &FetchState, active_day: usize) {
    match state {
        FetchState::Idle => {}
        FetchState::Loading => println!("Loading forecast..."),
        FetchState::Success(_) => {
            if let Some(view) = dashboard.view(active_day) {
                println!("{view}");
            }
        }
        FetchState::Failed(_) => println!("{FETCH_FAILED_MESSAGE} (type /retry)"),
    }
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = DashboardConfig::load_from_path(args.config.clone())?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    if args.imperial {
        config.defaults.units = UnitPreferences::imperial();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("Failed to load configuration")?;
    telemetry::init(&config.logging)?;

    let dashboard = Dashboard::from_config(&config).context("Failed to create dashboard")?;
    let mut search_changes = dashboard.subscribe_search();
    let mut fetch_changes = dashboard.subscribe_fetch();
    let mut active_day = 0;

    println!("weatherdash {} ({})", weatherdash::VERSION, config.defaults.units);
    println!("{HELP}");
    if let Some(query) = &args.query {
        dashboard.submit(query);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Type(text) => dashboard.search(&text),
                    Command::Search(text) => dashboard.submit(&text),
                    Command::Pick(index) => match dashboard.select(index) {
                        Ok(location) => println!("Selected {}", location.label()),
                        Err(e) => println!("{}", e.user_message()),
                    },
                    Command::Units => {
                        let units = dashboard.toggle_units();
                        println!("Units: {units}");
                    }
                    Command::Day(name) => match dashboard.view(active_day) {
                        Some(view) => match view.find_day(&name) {
                            Some(day) => {
                                active_day = day;
                                print_fetch(&dashboard, &dashboard.fetch_state(), active_day);
                            }
                            None => println!("Days: {}", view.day_names().join(", ")),
                        },
                        None => println!("No forecast yet"),
                    },
                    Command::Retry => dashboard.retry(),
                    Command::Show => print_fetch(&dashboard, &dashboard.fetch_state(), active_day),
                    Command::Help => println!("{HELP}"),
                    Command::Quit => break,
                    Command::Unknown(line) => println!("Unknown command: {line} (try /help)"),
                }
            }
            Ok(()) = search_changes.changed() => {
                let state = search_changes.borrow_and_update().clone();
                print_search(&state);
            }
            Ok(()) = fetch_changes.changed() => {
                let state = fetch_changes.borrow_and_update().clone();
                if matches!(state, FetchState::Success(_)) {
                    active_day = 0;
                }
                print_fetch(&dashboard, &state, active_day);
            }
        }
    }

    dashboard.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Berlin", Command::Type("Berlin".to_string()))]
    #[case("/search New York", Command::Search("New York".to_string()))]
    #[case("/pick 2", Command::Pick(1))]
    #[case("/pick 0", Command::Unknown("/pick 0".to_string()))]
    #[case("/u", Command::Units)]
    #[case("/day Tuesday", Command::Day("Tuesday".to_string()))]
    #[case("/retry", Command::Retry)]
    #[case("/quit", Command::Quit)]
    #[case("/frobnicate", Command::Unknown("/frobnicate".to_string()))]
    fn test_parse_command(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line), expected);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["weatherdash", "--imperial", "--log-level", "debug", "Oslo"]);
        assert!(args.imperial);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.query.as_deref(), Some("Oslo"));
        assert!(!args.json_logs);
    }
}
