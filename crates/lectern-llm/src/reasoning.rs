//! Removal of reasoning markup that local models emit ahead of the answer.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?(?:</think>|\z)").expect("valid regex"));

static SOURCES_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\n+\s*sources?:[\s\S]*\z").expect("valid regex"));

static THINK_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</think>").expect("valid regex"));

/// Strip `<think>` blocks (closed or left open at the end of the reply), any
/// reasoning that precedes a stray closing tag, and a trailing `Sources:` section.
///
/// The model is asked to cite inline; the sources list is rendered separately.
#[must_use]
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = THINK_BLOCK.replace_all(text, "");
    let after_close = match THINK_CLOSE.find_iter(&without_blocks).last() {
        Some(close) => &without_blocks[close.end()..],
        None => &without_blocks,
    };
    SOURCES_TAIL.replace(after_close, "").trim().to_owned()
}
