//! Prompt and source-listing text built from accepted hits.

use std::fmt::Write as _;
use std::sync::LazyLock;

use lectern_index::Hit;
use regex::Regex;

static CITATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));

const TRUNCATED: &str = "\n...[truncated]";

const RULES: &str = "You are a helpful tutorial assistant.\n\
Answer ONLY from the information in SOURCES.\n\
If the SOURCES do not clearly contain the answer, reply exactly: I don't know.\n\
Include bracket citations like [1] or [2] that point to the numbered sources you used.\n\
Do NOT describe your reasoning. Do NOT print a 'Sources:' section.\n\
Prefer a short list of steps when the question asks how to do something.";

fn display_title(hit: &Hit) -> &str {
    let chunk = &hit.chunk;
    if !chunk.page_title.is_empty() {
        &chunk.page_title
    } else if !chunk.toc_title.is_empty() {
        &chunk.toc_title
    } else {
        "(untitled)"
    }
}

/// Numbered source blocks, cut to at most `max_chars` characters plus a truncation marker.
#[must_use]
pub fn context_blocks(hits: &[Hit], max_chars: usize) -> String {
    let blocks: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let chunk = &hit.chunk;
            format!(
                "[{n}] Title: {title}\nURL: {url}\nChunk #{index}\nBreadcrumb: {crumbs}\n----\n{text}",
                n = i + 1,
                title = display_title(hit),
                url = chunk.page_url,
                index = chunk.chunk_index,
                crumbs = chunk.breadcrumb.join(" > "),
                text = chunk.chunk_text.trim(),
            )
        })
        .collect();
    let context = blocks.join("\n\n");

    match context.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATED}", &context[..cut]),
        None => context,
    }
}

#[must_use]
pub fn answer_prompt(question: &str, context: &str) -> String {
    format!("{RULES}\n\nSOURCES:\n{context}\n\nUSER QUESTION:\n{question}\n\nYOUR ANSWER:\n")
}

/// Shorter prompt used once when the first reply came back empty.
#[must_use]
pub fn retry_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer briefly using ONLY the SOURCES below, with citations like [1].\n\
         If they do not contain the answer, reply exactly: I don't know.\n\n\
         SOURCES:\n{context}\n\nQUESTION: {question}\n\nANSWER:\n"
    )
}

/// `- [n] Title (chunk i)` lines followed by the page URL.
#[must_use]
pub fn sources_listing(hits: &[Hit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "- [{}] {} (chunk {})\n  {}",
            i + 1,
            display_title(hit),
            hit.chunk.chunk_index,
            hit.chunk.page_url
        );
    }
    out
}

#[must_use]
pub fn has_citation(text: &str) -> bool {
    CITATION.is_match(text)
}

#[cfg(test)]
mod tests {
    use lectern_index::{Chunk, SearchMode};

    use super::*;

    fn hit(title: &str, index: u32, text: &str) -> Hit {
        Hit {
            chunk: Chunk {
                page_title: title.into(),
                toc_title: "Section".into(),
                page_url: format!("https://docs.example.com/{}", title.to_lowercase()),
                breadcrumb: vec![title.into(), "Section".into()],
                chunk_index: index,
                chunk_text: format!("  {text}  "),
                ..Chunk::default()
            },
            score: 0.5,
            mode: SearchMode::Hybrid,
        }
    }

    #[test]
    fn blocks_are_numbered_with_metadata() {
        let hits = [hit("Walls", 0, "Draw a wall."), hit("Roofs", 3, "Draw a roof.")];
        let context = context_blocks(&hits, 6000);
        assert_eq!(
            context,
            "[1] Title: Walls\nURL: https://docs.example.com/walls\nChunk #0\nBreadcrumb: Walls > Section\n----\nDraw a wall.\n\n\
             [2] Title: Roofs\nURL: https://docs.example.com/roofs\nChunk #3\nBreadcrumb: Roofs > Section\n----\nDraw a roof."
        );
    }

    #[test]
    fn blocks_truncated_on_char_boundary() {
        let hits = [hit("Wände", 0, &"é".repeat(100))];
        let context = context_blocks(&hits, 40);
        assert!(context.ends_with(TRUNCATED));
        assert_eq!(context.chars().count(), 40 + TRUNCATED.chars().count());
    }

    #[test]
    fn untitled_falls_back() {
        let mut h = hit("", 0, "x");
        assert!(context_blocks(std::slice::from_ref(&h), 1000).starts_with("[1] Title: Section"));
        h.chunk.toc_title.clear();
        assert!(sources_listing(&[h]).starts_with("- [1] (untitled) (chunk 0)"));
    }

    #[test]
    fn prompt_contains_rules_context_and_question() {
        let prompt = answer_prompt("How do I draw a wall?", "[1] Title: Walls");
        assert!(prompt.contains("reply exactly: I don't know."));
        assert!(prompt.contains("Do NOT print a 'Sources:' section"));
        assert!(prompt.contains("SOURCES:\n[1] Title: Walls"));
        assert!(prompt.ends_with("USER QUESTION:\nHow do I draw a wall?\n\nYOUR ANSWER:\n"));
    }

    #[test]
    fn retry_prompt_is_shorter() {
        let context = "[1] Title: Walls";
        assert!(retry_prompt("q", context).len() < answer_prompt("q", context).len());
        assert!(retry_prompt("q", context).contains(context));
    }

    #[test]
    fn listing_format() {
        let hits = [hit("Walls", 2, "a"), hit("Roofs", 0, "b")];
        assert_eq!(
            sources_listing(&hits),
            "- [1] Walls (chunk 2)\n  https://docs.example.com/walls\n- [2] Roofs (chunk 0)\n  https://docs.example.com/roofs"
        );
        assert_eq!(sources_listing(&[]), "");
    }

    #[test]
    fn citation_detection() {
        assert!(has_citation("Click Wall [2]."));
        assert!(!has_citation("Click Wall."));
        assert!(!has_citation("Use [a] notation"));
    }
}
