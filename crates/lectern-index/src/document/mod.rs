//! Source documents and their conversion into heading/text blocks.

pub mod error;
mod html;
pub mod loader;
mod markdown;
mod records;

use std::path::Path;

pub use error::DocumentError;
pub use loader::{discover, load_document};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Structural element of a parsed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, title: String },
    /// Body text. Line breaks inside `text` are meaningful; `links` are the
    /// hyperlink targets that appeared in it.
    Text { text: String, links: Vec<String> },
}

impl Block {
    #[must_use]
    pub fn heading(level: u8, title: impl Into<String>) -> Self {
        Self::Heading {
            level,
            title: title.into(),
        }
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            links: Vec::new(),
        }
    }
}

/// A tutorial page ready for chunking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub page_title: String,
    pub page_url: String,
    pub category: Option<String>,
    pub time_required: Option<String>,
    pub tutorial_files_used: Vec<String>,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Title of the first level-1 heading, if any.
    #[must_use]
    pub fn first_h1(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Heading { level: 1, title } => Some(title.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.blocks.iter().any(|block| match block {
            Block::Text { text, .. } => !text.trim().is_empty(),
            Block::Heading { .. } => false,
        })
    }
}

/// How a file's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Markdown,
    Html,
    Json,
    JsonLines,
    /// Anything else: every line is body text, no headings.
    Plain,
}

impl SourceFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" | "txt" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            "jsonl" | "ndjson" => Self::JsonLines,
            _ => Self::Plain,
        }
    }
}

/// Parse raw file contents into a [`Document`].
///
/// `stem` is the file name without extension and serves as the title of last
/// resort. Malformed structured input degrades to plain text rather than failing.
#[must_use]
pub fn parse_document(format: SourceFormat, stem: &str, raw: &str) -> Document {
    let mut doc = match format {
        SourceFormat::Markdown => Document {
            blocks: markdown::parse_markdown(raw),
            ..Document::default()
        },
        SourceFormat::Html => {
            let (title, blocks) = html::parse_html(raw);
            Document {
                page_title: title.unwrap_or_default(),
                blocks,
                ..Document::default()
            }
        }
        SourceFormat::Json => records::parse_json(raw).unwrap_or_else(|e| {
            tracing::warn!(stem, "malformed JSON, indexing as plain text: {e}");
            plain_text(raw)
        }),
        SourceFormat::JsonLines => records::parse_json_lines(raw),
        SourceFormat::Plain => plain_text(raw),
    };

    let h1 = doc.first_h1().map(str::to_owned);
    if let Some(h1) = h1 {
        doc.page_title = h1;
    } else if doc.page_title.trim().is_empty() {
        stem.clone_into(&mut doc.page_title);
    }
    doc
}

fn plain_text(raw: &str) -> Document {
    let text = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let blocks = if text.is_empty() {
        Vec::new()
    } else {
        vec![Block::text(text)]
    };
    Document {
        blocks,
        ..Document::default()
    }
}
