/// Intelligence module
///
/// Lightweight text analysis for the prompt editor: body statistics and
/// tag suggestions.

pub mod analyzer;
pub mod tag_suggester;

pub use analyzer::TextStats;
pub use tag_suggester::{suggest_tags, suggest_tags_limit, MAX_SUGGESTIONS};
