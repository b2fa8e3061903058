//! Storypoint CLI
//!
//! Usage:
//!   storypoint --duration "1d 15m" --complexity 0.6    # Single evaluation
//!   storypoint --page issue.html                       # Calculate once on a saved page
//!   storypoint --page issue.html --watch               # Re-read the page every poll
//!   storypoint --page issue.html --interactive         # Drive with verbs or shortcuts
//!   storypoint --page issue.html --serve               # HTTP API server
//!   storypoint --duration 2h --complexity 0.2 --json   # JSON output

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use storypoint::config::Config;
use storypoint::core::{
    derive_linear, evaluate, parse_complexity, parse_duration, parse_priority, run_server,
    spawn_poller, Controller, SessionFlag, Shortcuts,
};
use storypoint::dom::PageDocument;
use storypoint::logging::{logger_init, LoggerConfig, LoggerFormat};
use storypoint::types::{Ack, Action, CycleOutput, FieldReading, ReasonCode, Trigger};
use storypoint::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "storypoint",
    version = VERSION,
    about = "Derive a story point estimate from time tracking and complexity",
    long_about = "Storypoint reads the time tracking duration, complexity rating and\n\
                  priority of an issue page, derives round(sqrt(hours * complexity), 2)\n\
                  (+0.5 for Urgent) and writes it into the story point field.\n\n\
                  Modes:\n  \
                  --duration/--complexity  Evaluate explicit values\n  \
                  --page                   Calculate once on a saved page\n  \
                  --watch                  Poll the page file for changes\n  \
                  --interactive            Read verbs or shortcuts from stdin\n  \
                  --serve                  HTTP API server mode"
)]
struct Args {
    /// HTML file holding the issue page
    #[arg(short, long)]
    page: Option<PathBuf>,

    /// Address the page was loaded from (enables auto-activation)
    #[arg(long)]
    url: Option<String>,

    /// Time tracking duration, e.g. "1d 15m"
    #[arg(short, long)]
    duration: Option<String>,

    /// Complexity rating (0.1, 0.2, 0.3, 0.6, 1, 1.5, 2)
    #[arg(short, long)]
    complexity: Option<String>,

    /// Priority label
    #[arg(long)]
    priority: Option<String>,

    /// Interactive mode - read verbs or shortcuts from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Watch the page file and recalculate when the fields change
    #[arg(short, long)]
    watch: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Write the updated page here after a calculation
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show the reading and formula breakdown
    #[arg(long)]
    verbose: bool,

    /// Log filter, e.g. "debug" or "storypoint=trace"
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Logger error: {}", e);
        std::process::exit(1);
    }
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if args.duration.is_some() || args.complexity.is_some() {
        run_single(&args);
        return;
    }

    let one_shot = !(args.serve || args.watch || args.interactive || args.page.is_none());
    let controller = match load_controller(&args, &config, !one_shot) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if args.serve {
        run_serve(&args, controller, &config).await;
    } else if args.watch {
        run_watch(&args, controller, &config).await;
    } else if args.interactive || args.page.is_none() {
        run_interactive(&args, controller, &config).await;
    } else {
        run_once(&args, controller).await;
    }
}

fn init_logging(args: &Args) -> Result<(), storypoint::logging::LoggerError> {
    let format: LoggerFormat = args.log_format.parse()?;
    let level = if args.verbose && args.log_level == "warn" {
        "info".to_string()
    } else {
        args.log_level.clone()
    };
    logger_init(&LoggerConfig {
        format,
        level,
        with_targets: false,
        use_color: !args.no_color,
    })
}

fn load_page(path: Option<&Path>, url: Option<&str>) -> Result<PageDocument, String> {
    let doc = match path {
        Some(path) => {
            let markup = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read page {}: {}", path.display(), e))?;
            PageDocument::parse(&markup)
        }
        None => PageDocument::parse(""),
    };
    Ok(match url {
        Some(url) => doc.with_url(url),
        None => doc,
    })
}

/// A controller that does not `persist` reads the session flag but never
/// writes it back
fn load_controller(
    args: &Args,
    config: &Config,
    persist: bool,
) -> Result<Controller<PageDocument>, String> {
    let doc = load_page(args.page.as_deref(), args.url.as_deref())?;
    let session = match &config.session.flag_path {
        Some(path) => SessionFlag::open(path).map_err(|e| format!("Session flag error: {}", e))?,
        None => SessionFlag::in_memory(),
    };
    let session = if persist { session } else { session.detached() };
    Ok(Controller::new(doc, config, session))
}

/// Evaluate explicit values without a page
fn run_single(args: &Args) {
    let duration = args.duration.as_deref().map(parse_duration);
    let complexity = args.complexity.as_deref().map(parse_complexity);
    for err in [duration.clone().and_then(Result::err), complexity.clone().and_then(Result::err)]
        .into_iter()
        .flatten()
    {
        warn!(error = %err, "value rejected");
    }
    let reading = FieldReading {
        duration: duration.and_then(Result::ok),
        complexity: complexity.and_then(Result::ok),
        priority: args.priority.as_deref().and_then(parse_priority),
    };
    let output = evaluate(Trigger::Manual, reading);
    print_output(&output, args);
}

/// Calculate once on the page file. Activating for this run leaves the
/// session flag file untouched.
async fn run_once(args: &Args, mut controller: Controller<PageDocument>) {
    let output = match controller.on_load().await {
        Some(output) => output,
        None => {
            controller.activate();
            controller.handle(Trigger::Manual).await
        }
    };
    print_output(&output, args);
    write_page(args, &controller);
    if !output.reason.is_success() {
        std::process::exit(2);
    }
}

/// Poll the page file; every poll re-reads it as a host re-render
async fn run_watch(args: &Args, mut controller: Controller<PageDocument>, config: &Config) {
    let Some(path) = args.page.clone() else {
        eprintln!("--watch needs --page");
        std::process::exit(1);
    };
    print_header("Watch Mode", args.no_color);
    println!(
        "Watching {} every {} ms. Ctrl+C to stop.",
        path.display(),
        config.timing.poll_interval_ms
    );
    println!();

    match controller.on_load().await {
        Some(output) => print_output(&output, args),
        None => {
            controller.activate();
        }
    }

    let (tx, mut rx) = mpsc::channel(8);
    let _poller = spawn_poller(Duration::from_millis(config.timing.poll_interval_ms), tx);
    let mut last_markup = std::fs::read_to_string(&path).unwrap_or_default();

    while let Some(trigger) = rx.recv().await {
        match std::fs::read_to_string(&path) {
            Ok(markup) if markup != last_markup => {
                debug!(path = %path.display(), "page file changed");
                controller.document_mut().replace_markup(&markup);
                last_markup = markup;
            }
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "page file unreadable"),
        }
        let output = controller.handle(trigger).await;
        if output.reason == ReasonCode::R302_UNCHANGED {
            continue;
        }
        print_output(&output, args);
        write_page(args, &controller);
    }
}

/// Read verbs (`activate`, `deactivate`, `status`, `calculate`) or key
/// combinations (`ctrl+shift+c`) from stdin
async fn run_interactive(args: &Args, mut controller: Controller<PageDocument>, config: &Config) {
    let shortcuts = Shortcuts::new(&config.shortcuts);

    print_header("Interactive Mode", args.no_color);
    println!("Verbs: activate, deactivate, status, calculate, reload, quit");
    println!(
        "Shortcuts: {} activate, {} deactivate, {} calculate",
        config.shortcuts.activate, config.shortcuts.deactivate, config.shortcuts.calculate
    );
    println!();

    if let Some(output) = controller.on_load().await {
        print_output(&output, args);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let prompt = if controller.is_active() { "[on] > " } else { "[off] > " };
        print!("{}", prompt);
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Runs: {}", controller.status().runs);
            break;
        }
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("reload") {
            match load_page(args.page.as_deref(), None) {
                Ok(page) => {
                    controller.document_mut().replace_markup(&page.to_html());
                    println!("Page reloaded (render {})", controller.document().render_count());
                }
                Err(e) => println!("{}", e),
            }
            continue;
        }

        let action = shortcuts
            .action_for(line)
            .or_else(|| line.parse::<Action>().ok());
        let Some(action) = action else {
            println!("Unknown command: {}", line);
            continue;
        };

        let ack = controller.handle_message(action).await;
        print_ack(&ack, args);
        if ack.output.as_ref().map_or(false, CycleOutput::committed) {
            write_page(args, &controller);
        }
    }
}

/// Run HTTP API server
async fn run_serve(args: &Args, controller: Controller<PageDocument>, config: &Config) {
    println!();
    println!("Storypoint API Server");
    println!("Version: {}", VERSION);
    println!();

    if let Err(e) = run_server(&args.addr, controller, config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn write_page(args: &Args, controller: &Controller<PageDocument>) {
    let Some(out) = &args.out else { return };
    if let Err(e) = std::fs::write(out, controller.document().to_html()) {
        eprintln!("Cannot write {}: {}", out.display(), e);
    }
}

fn print_output(output: &CycleOutput, args: &Args) {
    if args.json {
        match serde_json::to_string(output) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Cannot serialize output: {}", e),
        }
    } else if args.verbose {
        print_verbose(output, args.no_color);
    } else if args.no_color {
        println!("{}", output.to_parseable_string());
    } else {
        println!("{}", output.to_terminal_string());
    }
}

fn print_ack(ack: &Ack, args: &Args) {
    if args.json {
        match serde_json::to_string(ack) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Cannot serialize acknowledgment: {}", e),
        }
        return;
    }
    let state = if ack.active { "active" } else { "inactive" };
    match &ack.message {
        Some(message) => println!("{} ({})", message, state),
        None => println!("Status: {}", state),
    }
    if let Some(output) = &ack.output {
        print_output(output, args);
    }
}

fn print_verbose(output: &CycleOutput, no_color: bool) {
    let reading = &output.reading;
    let label = |s: &str| if no_color { s.normal() } else { s.bold() };

    println!("{}", label("Reading"));
    println!("  duration:   {}", display_opt(&reading.duration));
    println!("  complexity: {}", display_opt(&reading.complexity));
    println!("  priority:   {}", display_opt(&reading.priority));

    if let (Some(hours), Some(complexity)) = (reading.duration, reading.complexity) {
        let linear = derive_linear(hours, complexity, reading.priority.as_ref());
        println!("{}", label("Formula"));
        println!("  sqrt(hours x complexity): {}", display_opt(&output.score));
        println!("  hours x complexity:       {}", linear);
    }

    println!("{}", label("Result"));
    if let Some(path) = output.write_path {
        println!("  written via: {}", path);
    }
    println!("  {}", output.reason);
}

fn print_header(mode: &str, no_color: bool) {
    let title = format!("Storypoint v{} - {}", VERSION, mode);
    if no_color {
        println!("{}", title);
    } else {
        println!("{}", title.cyan().bold());
    }
    println!();
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}
