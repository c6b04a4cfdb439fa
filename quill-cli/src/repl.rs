//! Interactive question loop.

use crate::commands::{build_pipeline, load};
use crate::output;
use quill_core::pipeline::AnswerRequest;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Slash commands understood by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    ToggleSources,
    Help,
    Unknown(&'a str),
    Question(&'a str),
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    if !line.starts_with('/') {
        return Input::Question(line);
    }
    match line.split_whitespace().next().unwrap_or(line) {
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/sources" => Input::ToggleSources,
        "/help" | "/?" => Input::Help,
        other => Input::Unknown(other),
    }
}

fn retrieval_mode(hybrid: bool) -> &'static str {
    if hybrid { "hybrid (keyword + semantic)" } else { "semantic only" }
}

const HELP: &str = "  /sources  toggle the source list under each answer\n  /help     show this help\n  /quit     exit";

pub async fn run_interactive(workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let pipeline = build_pipeline(&config, workspace).await?;

    println!("\x1b[1;32mQuill\x1b[0m");
    println!(
        "  Providers: {} | Retrieval: {} | top_k: {} | Workspace: {}",
        pipeline.generator().provider_chain().join(" -> "),
        retrieval_mode(pipeline.retriever().hybrid_by_default()),
        config.retrieval.top_k,
        workspace.display()
    );
    println!("  Ask a question, /help for commands, /quit to exit\n");

    let mut show_sources = true;
    let stdin = io::stdin();
    loop {
        print!("\x1b[1;34m> \x1b[0m");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }

        match parse_input(&line) {
            Input::Blank => continue,
            Input::Quit => {
                println!("Goodbye!");
                break;
            }
            Input::Help => println!("{HELP}"),
            Input::ToggleSources => {
                show_sources = !show_sources;
                println!("Source listing {}", if show_sources { "on" } else { "off" });
            }
            Input::Unknown(cmd) => println!("Unknown command: {cmd}. Type /help for commands."),
            Input::Question(question) => {
                let result = pipeline.answer_with(&AnswerRequest::new(question)).await;
                println!("{}", output::render_result(&result, show_sources));
            }
        }
    }
    Ok(())
}
