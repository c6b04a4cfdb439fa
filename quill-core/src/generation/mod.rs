//! Answer generation: numbered context, prompts, and citation checks.

pub mod citations;
pub mod context;
pub mod prompts;

pub use citations::CitationExtractor;
pub use context::{ContextAssembler, SourceMap, SourceRef};
pub use prompts::{SYSTEM_PROMPT, build_messages, user_prompt};
