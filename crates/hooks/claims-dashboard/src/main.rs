//! Claims dashboard: a read-only view of the claim board.
//!
//! ```text
//! claims-dashboard              # formatted board
//! claims-dashboard --json      # raw JSON
//! claims-dashboard --watch     # refresh every 5 s
//! claims-dashboard -w -i 10    # custom interval
//! ```

use chrono::{DateTime, Utc};
use clap::Parser;
use hook_store::{ClaimFilter, ClaimStatus, ClaimStore, ClaimView};
use serde::Serialize;

const BOX_H: char = '\u{2500}';
const BOX_V: char = '\u{2502}';
const BOX_DH: char = '\u{2550}';
const BOX_TL: char = '\u{250c}';
const BOX_TR: char = '\u{2510}';
const BOX_BL: char = '\u{2514}';
const BOX_BR: char = '\u{2518}';

#[derive(Debug, Parser)]
#[command(name = "claims-dashboard", about = "Display the claims board")]
struct Cli {
    /// Output raw JSON instead of the formatted board
    #[arg(long)]
    json: bool,

    /// Refresh periodically until interrupted
    #[arg(long, short)]
    watch: bool,

    /// Refresh interval in seconds
    #[arg(long, short, default_value_t = 5)]
    interval: u64,

    /// Display width
    #[arg(long, default_value_t = 60)]
    width: usize,
}

#[derive(Debug, Serialize)]
struct Board {
    active: Vec<ClaimView>,
    stealable: Vec<ClaimView>,
    completed: Vec<ClaimView>,
    stats: BoardStats,
}

#[derive(Debug, Serialize)]
struct BoardStats {
    active: usize,
    stealable: usize,
    completed: usize,
}

fn main() {
    let cli = Cli::parse();
    let store = ClaimStore::open_default();

    if cli.watch {
        loop {
            // ANSI clear; good enough for a terminal dashboard
            print!("\x1b[2J\x1b[H");
            println!("{}", render(&cli, &store));
            println!("\nRefreshing every {}s... (Ctrl+C to stop)", cli.interval);
            std::thread::sleep(std::time::Duration::from_secs(cli.interval.max(1)));
        }
    }

    println!("{}", render(&cli, &store));
}

fn render(cli: &Cli, store: &ClaimStore) -> String {
    let board = load_board(store);
    if cli.json {
        serde_json::to_string_pretty(&board).unwrap_or_else(|_| "{}".to_string())
    } else {
        format_dashboard(&board, cli.width)
    }
}

fn load_board(store: &ClaimStore) -> Board {
    let active = store.list_claims(&ClaimFilter {
        status: Some(ClaimStatus::Active),
        ..Default::default()
    });
    let stealable = store.list_claims(&ClaimFilter {
        status: Some(ClaimStatus::Stealable),
        ..Default::default()
    });

    Board {
        stats: BoardStats {
            active: active.len(),
            stealable: stealable.len(),
            completed: 0,
        },
        active,
        stealable,
        completed: Vec::new(),
    }
}

fn format_dashboard(board: &Board, width: usize) -> String {
    let width = width.max(24);
    let title_bar: String = std::iter::repeat(BOX_DH).take(width).collect();
    let mut lines = vec![
        title_bar.clone(),
        center("CLAIMS DASHBOARD", width),
        title_bar.clone(),
        String::new(),
    ];

    for (items, label) in [(&board.active, "ACTIVE"), (&board.stealable, "STEALABLE")] {
        lines.push(format!("{label} ({}):", items.len()));
        if items.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for view in items.iter() {
                lines.extend(format_claim_box(view, width));
            }
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "Summary: {} active, {} stealable, {} completed",
        board.stats.active, board.stats.stealable, board.stats.completed
    ));
    lines.push(title_bar);

    lines.join("\n")
}

fn format_claim_box(view: &ClaimView, width: usize) -> Vec<String> {
    let inner = width - 4;
    let rule: String = std::iter::repeat(BOX_H).take(width - 2).collect();
    let row = |content: &str| {
        let clipped: String = content.chars().take(inner).collect();
        format!("{BOX_V} {:<inner$} {BOX_V}", clipped)
    };

    let mut lines = vec![format!("{BOX_TL}{rule}{BOX_TR}")];
    lines.push(row(&view.issue_id));
    lines.push(row(&format!("Claimed by: {}", view.claim.claimant)));
    lines.push(row(&format!("Since: {}", format_age(&view.claim.claimed_at))));
    if let Some(progress) = view.claim.progress {
        lines.push(row(&format!("Progress: {progress}%")));
    }
    if let Some(reason) = &view.claim.steal_reason {
        lines.push(row(&format!("Reason: {reason}")));
    }
    if let Some(available) = &view.claim.available_for {
        lines.push(row(&format!("Available for: {available}")));
    }
    lines.push(format!("{BOX_BL}{rule}{BOX_BR}"));
    lines
}

fn center(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let pad = (width - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn format_age(timestamp: &str) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(timestamp) else {
        return "unknown".to_string();
    };
    let seconds = (Utc::now() - then.with_timezone(&Utc)).num_seconds().max(0);
    let plural = |n: i64, unit: &str| {
        format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" })
    };
    match seconds {
        0..=59 => plural(seconds, "second"),
        60..=3599 => plural(seconds / 60, "minute"),
        3600..=86_399 => plural(seconds / 3600, "hour"),
        _ => plural(seconds / 86_400, "day"),
    }
}
