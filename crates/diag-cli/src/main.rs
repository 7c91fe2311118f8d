#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive harness for driving one diagnostic-agent session from a
//! terminal and observing the raw event stream.
//!
//! ```text
//! cargo run -p diag_cli
//! cargo run -p diag_cli -- --raw-events
//! ```
//!
//! Not the product's API surface: a manual-exercising tool in the spirit
//! of the `conversations` binary, for watching the agentic loop work
//! against whichever LLM provider is configured in the environment.

use clap::Parser;
use dialoguer::Input;
use diag_facade::{DiagnosticConfig, SessionFacade};
use diag_types::LoopEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "diag_cli", about = "Interactive harness for the diagnostic agent")]
struct Cli {
    /// Print every event as JSON instead of a formatted narration.
    #[arg(long)]
    raw_events: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let facade = SessionFacade::new(DiagnosticConfig::from_env());
    let session_id = facade.start_session();
    println!("session: {session_id}");
    println!("Type a message and press enter. Ctrl+C to quit.\n");

    loop {
        let text: String = Input::new().with_prompt("you").interact_text()?;
        if text.trim().is_empty() {
            continue;
        }

        let (tx, mut rx) = mpsc::channel(64);
        let send = facade.send_message(&session_id, &text, tx, CancellationToken::new());
        tokio::pin!(send);

        loop {
            tokio::select! {
                result = &mut send => {
                    if let Err(err) = result {
                        eprintln!("turn error: {err}");
                    }
                    break;
                }
                Some(event) = rx.recv() => {
                    let terminal = event.is_terminal();
                    print_event(&event, cli.raw_events);
                    if terminal {
                        break;
                    }
                }
            }
        }
        println!();
    }
}

fn print_event(event: &LoopEvent, raw: bool) {
    if raw {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
        return;
    }

    match event {
        LoopEvent::Status { message, iteration, total, .. } => {
            println!("... [{iteration}/{total}] {message}");
        }
        LoopEvent::Content { text } => println!("agent> {text}"),
        LoopEvent::ToolCall { name, arguments } => {
            println!("  -> calling {name}({arguments})");
        }
        LoopEvent::ToolResult { tool, success, content } => {
            let status = if *success { "ok" } else { "failed" };
            println!("  <- {tool} [{status}]\n{content}");
        }
        LoopEvent::Done { final_text, stats } => {
            println!("agent> {final_text}");
            println!("(done: {} iterations, {} tools, verified={})", stats.iteration_count, stats.tool_count, stats.verified);
        }
        LoopEvent::Error { message } => eprintln!("error: {message}"),
    }
}
