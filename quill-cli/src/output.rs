//! Terminal rendering of pipeline results.

use quill_core::generation::SourceRef;
use quill_core::pipeline::{GenerationResult, GenerationStatus};

const WRAP_WIDTH: usize = 100;

/// Render a result for the terminal. Sources are listed only for successful
/// answers and only when `show_sources` is set.
pub fn render_result(result: &GenerationResult, show_sources: bool) -> String {
    let mut out = String::new();

    let (color, label) = match result.status {
        GenerationStatus::Success => ("\x1b[32m", "Answer"),
        GenerationStatus::NoContext => ("\x1b[33m", "No context"),
        GenerationStatus::LlmError => ("\x1b[31m", "Generation failed"),
    };
    out.push_str(&format!(
        "\n{color}{label}\x1b[0m \x1b[90m({} chunk(s) retrieved)\x1b[0m\n\n",
        result.num_chunks_retrieved
    ));
    out.push_str(&wrap(&result.answer));
    out.push('\n');

    if show_sources && result.status == GenerationStatus::Success {
        if result.sources.is_empty() {
            out.push_str("\n\x1b[90mNo valid citations in the answer.\x1b[0m\n");
        } else {
            out.push_str("\n\x1b[1mSources\x1b[0m\n");
            for source in &result.sources {
                out.push_str(&format!("  - {}\n", describe_source(source)));
            }
        }
    }
    out
}

/// `Title, Section (url)`, leaving out whatever is missing.
pub fn describe_source(source: &SourceRef) -> String {
    let mut line = source.title.clone();
    if !source.section.is_empty() {
        line.push_str(", ");
        line.push_str(&source.section);
    }
    if let Some(url) = &source.source_url {
        line.push_str(&format!(" ({url})"));
    }
    line
}

/// Wrap long lines, keeping the model's own line breaks.
fn wrap(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.chars().count() <= WRAP_WIDTH {
                line.to_string()
            } else {
                textwrap::fill(line, WRAP_WIDTH)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source(section: &str, url: Option<&str>) -> SourceRef {
        SourceRef {
            source_url: url.map(str::to_string),
            title: "System Design Primer".into(),
            section: section.into(),
            chunk_id: "abc".into(),
        }
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(
            describe_source(&source("Caching", Some("https://example.com"))),
            "System Design Primer, Caching (https://example.com)"
        );
        assert_eq!(describe_source(&source("", None)), "System Design Primer");
    }

    #[test]
    fn test_sources_listed_for_success() {
        let result = GenerationResult {
            answer: "Cache reads [1].".into(),
            sources: vec![source("Caching", None)],
            status: GenerationStatus::Success,
            num_chunks_retrieved: 3,
        };
        let rendered = render_result(&result, true);
        assert!(rendered.contains("(3 chunk(s) retrieved)"));
        assert!(rendered.contains("Cache reads [1]."));
        assert!(rendered.contains("  - System Design Primer, Caching\n"));
        assert!(!render_result(&result, false).contains("Sources"));
    }

    #[test]
    fn test_no_sources_for_no_context() {
        let rendered = render_result(&GenerationResult::no_context(), true);
        assert!(rendered.contains("No context"));
        assert!(!rendered.contains("Sources"));
    }

    #[test]
    fn test_long_lines_wrapped() {
        let long = "word ".repeat(60);
        let wrapped = wrap(long.trim_end());
        assert!(wrapped.lines().all(|l| l.chars().count() <= WRAP_WIDTH));
        assert_eq!(wrap("a\n\nb"), "a\n\nb");
    }
}
