//! MagicPop CLI
//!
//! CLI tool for checking popup configurations and page rules, and for
//! running the selection engine outside the browser.

mod snapshot;
mod state;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use mp_core::markup::{render_modal, render_styles, MarkupOptions};
use mp_core::rules::PageRules;
use mp_core::selector::{EvalContext, Selector};
use mp_core::storage::{DisplayState, MemoryStore};
use mp_core::types::{Timestamp, MOBILE_MAX_WIDTH};

use snapshot::{find_config, location, now_millis, read_snapshot};
use state::JsonFileStore;

#[derive(Parser)]
#[command(name = "mp-cli")]
#[command(about = "MagicPop popup configuration tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick the popup that would be shown for a page view
    Select {
        /// Popup configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Full URL of the page
        #[arg(short, long)]
        url: String,

        /// Request path, if it differs from the one in the URL
        #[arg(long)]
        path: Option<String>,

        /// Viewport width in CSS pixels
        #[arg(short, long, default_value_t = MOBILE_MAX_WIDTH)]
        width: u32,

        /// Current time in epoch milliseconds (defaults to now)
        #[arg(long)]
        now: Option<Timestamp>,

        /// Display state file (JSON object of storage key to timestamp)
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Record the selected popup as shown in the state file
        #[arg(long, requires = "state")]
        record: bool,

        /// Print the verdict for every popup
        #[arg(short, long)]
        explain: bool,
    },

    /// Render the modal markup of a popup
    Render {
        /// Popup configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Popup id (defaults to the first popup)
        #[arg(long)]
        id: Option<String>,

        /// Also print the stylesheet
        #[arg(long)]
        styles: bool,

        /// Label of the close button
        #[arg(long)]
        close_label: Option<String>,
    },

    /// Test page rules against a URL
    CheckRule {
        /// Page rule (repeatable)
        #[arg(short, long, required = true)]
        rule: Vec<String>,

        /// Full URL of the page
        #[arg(short, long)]
        url: String,

        /// Request path, if it differs from the one in the URL
        #[arg(long)]
        path: Option<String>,
    },

    /// Validate a popup configuration
    Validate {
        /// Popup configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Select {
            config,
            url,
            path,
            width,
            now,
            state,
            record,
            explain,
        } => cmd_select(SelectArgs {
            config,
            url,
            path,
            width,
            now: now.unwrap_or_else(now_millis),
            state,
            record,
            explain,
        }),
        Commands::Render {
            config,
            id,
            styles,
            close_label,
        } => cmd_render(&config, id.as_deref(), styles, close_label),
        Commands::CheckRule { rule, url, path } => cmd_check_rule(&rule, &url, path.as_deref()),
        Commands::Validate { config } => cmd_validate(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct SelectArgs {
    config: PathBuf,
    url: String,
    path: Option<String>,
    width: u32,
    now: Timestamp,
    state: Option<PathBuf>,
    record: bool,
    explain: bool,
}

fn cmd_select(args: SelectArgs) -> Result<(), String> {
    let snapshot = read_snapshot(&args.config)?;
    let location = location(&args.url, args.path.as_deref());
    let ctx = EvalContext::new(&location, args.width, args.now);
    let selector = Selector::new(&snapshot.configs);

    match &args.state {
        Some(path) => {
            let mut state = DisplayState::new(JsonFileStore::open(path)?);
            if args.explain {
                print_evaluation(&selector, &state, &ctx);
            }
            let chosen = selector.select(&state, &ctx);
            print_choice(chosen.map(|c| c.id.as_str()));
            if let (Some(config), true) = (chosen, args.record) {
                state
                    .try_record_shown(&config.storage_key, args.now)
                    .map_err(|e| e.to_string())?;
                println!("Recorded '{}' at {}", config.storage_key, args.now);
            }
        }
        None => {
            let state = DisplayState::new(MemoryStore::new());
            if args.explain {
                print_evaluation(&selector, &state, &ctx);
            }
            print_choice(selector.select(&state, &ctx).map(|c| c.id.as_str()));
        }
    }

    Ok(())
}

fn print_evaluation<S: mp_core::KeyValueStore>(selector: &Selector<'_>, state: &DisplayState<S>, ctx: &EvalContext<'_>) {
    for evaluation in selector.evaluate(state, ctx) {
        match evaluation.verdict {
            Ok(()) => println!("  {:<24} eligible", evaluation.config.id),
            Err(reason) => println!("  {:<24} skipped: {}", evaluation.config.id, reason),
        }
    }
}

fn print_choice(id: Option<&str>) {
    match id {
        Some(id) => println!("Selected: {}", id),
        None => println!("Selected: none"),
    }
}

fn cmd_render(config: &Path, id: Option<&str>, styles: bool, close_label: Option<String>) -> Result<(), String> {
    let snapshot = read_snapshot(config)?;
    let popup = find_config(&snapshot, id)?;

    let mut options = MarkupOptions::default();
    if let Some(label) = close_label {
        options.close_label = label;
    }

    if styles {
        println!("<style>{}</style>", render_styles(popup.renderable_products().count()));
    }
    println!("{}", render_modal(popup, &options));
    Ok(())
}

fn cmd_check_rule(rules: &[String], url: &str, path: Option<&str>) -> Result<(), String> {
    let location = location(url, path);
    let compiled = PageRules::compile(rules);

    println!("Path:     {}", location.path);
    println!("Full URL: {}", location.full_url);

    if compiled.is_empty() {
        println!("No rules: matches every page");
        return Ok(());
    }

    for rule in compiled.iter() {
        let hit = rule.matches(&location.path, &location.full_url);
        println!("  {:<5} {}", if hit { "match" } else { "-" }, rule.raw());
    }
    println!(
        "Result:   {}",
        if compiled.matches_location(&location) { "shown" } else { "not shown" }
    );
    Ok(())
}

fn cmd_validate(config: &Path) -> Result<(), String> {
    let snapshot = read_snapshot(config)?;
    let report = &snapshot.report;

    println!("Configuration '{}'", config.display());
    println!("  Records:     {}", report.records);
    println!("  Loaded:      {}", snapshot.configs.len());
    println!("  Rejected:    {}", report.rejected_records);
    println!("  Products dropped (missing fields): {}", report.dropped_products);
    println!("  Duplicate rules removed:           {}", report.deduped_rules);

    for id in &report.without_products {
        println!("  warning: '{}' has no renderable products and will never show", id);
    }
    for collision in &report.storage_key_collisions {
        println!(
            "  warning: storage key '{}' shared by {}",
            collision.storage_key,
            collision.popup_ids.join(", ")
        );
    }

    for popup in &snapshot.configs {
        println!(
            "  [{}] {} - {} product(s), {} rule(s), {}, {}",
            if popup.enabled { "on " } else { "off" },
            popup.id,
            popup.products.len(),
            popup.page_rules.len(),
            if popup.show_on_desktop { "all devices" } else { "mobile only" },
            match popup.redisplay_days {
                0 => "show once".to_string(),
                days => format!("every {} day(s)", days),
            }
        );
    }

    Ok(())
}
