//! Breadcrumb-scoped chunking of parsed documents.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{Block, Document};
use crate::types::Chunk;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)\]>"']+"#).expect("valid regex"));

static VIDEO_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://([a-z0-9-]+\.)*(youtube\.com|youtu\.be|vimeo\.com|autodesk\.com)(:\d+)?([/?#]|$)")
        .expect("valid regex")
});

/// Unit in which chunk sizes are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Whitespace-separated words.
    Tokens,
    /// Unicode scalar values of the rendered chunk text.
    #[default]
    Chars,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub unit: SizeUnit,
    /// Size at which a chunk is emitted.
    pub target_size: usize,
    /// Chunks smaller than this are merged into a neighbour.
    pub min_size: usize,
    /// Upper bound a merge may not exceed.
    pub max_size: usize,
    /// Trailing tokens carried into the next chunk of the same section.
    pub overlap: usize,
    /// Deepest heading level kept in a breadcrumb.
    pub max_depth: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            unit: SizeUnit::Chars,
            target_size: 1400,
            min_size: 100,
            max_size: 2000,
            overlap: 0,
            max_depth: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkerConfigError {
    #[error("target_size must be greater than zero")]
    ZeroTarget,
    #[error("min_size ({min}) must be smaller than target_size ({target})")]
    MinNotBelowTarget { min: usize, target: usize },
    #[error("max_size ({max}) must be at least target_size + min_size ({needed})")]
    MaxTooSmall { max: usize, needed: usize },
    #[error("overlap ({overlap}) must be smaller than target_size ({target})")]
    OverlapTooLarge { overlap: usize, target: usize },
    #[error("max_depth must be between 1 and 6, got {0}")]
    Depth(usize),
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns the first violated sizing constraint.
    pub fn validate(&self) -> Result<(), ChunkerConfigError> {
        if self.target_size == 0 {
            return Err(ChunkerConfigError::ZeroTarget);
        }
        if self.min_size >= self.target_size {
            return Err(ChunkerConfigError::MinNotBelowTarget {
                min: self.min_size,
                target: self.target_size,
            });
        }
        let needed = self.target_size + self.min_size;
        if self.max_size < needed {
            return Err(ChunkerConfigError::MaxTooSmall {
                max: self.max_size,
                needed,
            });
        }
        if self.overlap >= self.target_size {
            return Err(ChunkerConfigError::OverlapTooLarge {
                overlap: self.overlap,
                target: self.target_size,
            });
        }
        if !(1..=6).contains(&self.max_depth) {
            return Err(ChunkerConfigError::Depth(self.max_depth));
        }
        Ok(())
    }
}

/// Splits documents into chunks tagged with their heading ancestry.
///
/// Body text accumulates under the currently open headings. A chunk is
/// emitted when it reaches `target_size`, or when a heading at or above the
/// depth the chunk was opened at arrives. Deeper sub-headings stay in the
/// running chunk as a text line. Chunks below `min_size` are merged into the
/// next chunk under the same parent, or into the previous chunk when they are
/// last on the page.
#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    config: ChunkerConfig,
}

impl HierarchicalChunker {
    /// # Errors
    ///
    /// Returns an error if `config` fails [`ChunkerConfig::validate`].
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkerConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one page. Empty documents yield no chunks.
    #[must_use]
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut builder = Builder::new(&self.config);
        for block in &document.blocks {
            match block {
                Block::Heading { level, title } => builder.heading(*level, title),
                Block::Text { text, links } => builder.text(text, links),
            }
        }
        let drafts = merge_small(builder.finish(), &self.config);

        drafts
            .into_iter()
            .zip(0u32..)
            .map(|(draft, chunk_index)| {
                let chunk_text = render(&draft.tokens);
                let toc_title = draft
                    .breadcrumb
                    .last()
                    .cloned()
                    .unwrap_or_else(|| document.page_title.clone());
                let video_links = video_links(&chunk_text, &draft.links);
                Chunk {
                    page_title: document.page_title.clone(),
                    toc_title,
                    chunk_text,
                    page_url: document.page_url.clone(),
                    breadcrumb: draft.breadcrumb,
                    chunk_index,
                    video_links,
                    category: document.category.clone(),
                    time_required: document.time_required.clone(),
                    tutorial_files_used: document.tutorial_files_used.clone(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    /// Rendered on a new line rather than after a space.
    line_start: bool,
}

#[derive(Debug, Clone)]
struct Draft {
    breadcrumb: Vec<String>,
    tokens: Vec<Token>,
    /// Leading tokens copied from the previous chunk as overlap.
    carried: usize,
    links: Vec<String>,
}

struct Builder<'a> {
    config: &'a ChunkerConfig,
    stack: Vec<(usize, String)>,
    buffer: Vec<Token>,
    carried: usize,
    /// Heading depth the buffered chunk was opened at; 0 when no heading was open.
    opening: Option<usize>,
    links: Vec<String>,
    drafts: Vec<Draft>,
}

impl<'a> Builder<'a> {
    fn new(config: &'a ChunkerConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            buffer: Vec::new(),
            carried: 0,
            opening: None,
            links: Vec::new(),
            drafts: Vec::new(),
        }
    }

    fn fresh(&self) -> usize {
        self.buffer.len() - self.carried
    }

    fn heading(&mut self, level: u8, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        let level = usize::from(level).clamp(1, self.config.max_depth);

        if self.fresh() > 0 {
            let cuts = self.opening.is_none_or(|open| open == 0 || level <= open);
            if cuts {
                self.close();
            } else {
                self.push_line(title);
            }
        } else {
            self.reset();
        }

        while self.stack.last().is_some_and(|(open, _)| *open >= level) {
            self.stack.pop();
        }
        self.stack.push((level, title.to_owned()));
    }

    fn text(&mut self, text: &str, links: &[String]) {
        let mut attached = false;
        for line in text.lines() {
            let mut words = line.split_whitespace();
            let Some(first) = words.next() else {
                continue;
            };
            if !attached {
                self.links.extend(links.iter().cloned());
                attached = true;
            }
            self.push_word(first, true);
            for word in words {
                self.push_word(word, false);
            }
        }
    }

    fn push_line(&mut self, line: &str) {
        let mut words = line.split_whitespace();
        if let Some(first) = words.next() {
            self.push_word(first, true);
        }
        for word in words {
            self.push_word(word, false);
        }
    }

    fn push_word(&mut self, word: &str, line_start: bool) {
        if self.config.unit == SizeUnit::Chars && word.chars().count() > self.config.target_size {
            let chars: Vec<char> = word.chars().collect();
            for (i, piece) in chars.chunks(self.config.target_size).enumerate() {
                self.push_token(piece.iter().collect(), line_start && i == 0);
            }
        } else {
            self.push_token(word.to_owned(), line_start);
        }
    }

    fn push_token(&mut self, text: String, line_start: bool) {
        if self.config.unit == SizeUnit::Chars && !self.buffer.is_empty() {
            let incoming = text.chars().count();
            let target = self.config.target_size;
            let fits =
                |buffer: &[Token]| measure(buffer, SizeUnit::Chars) + 1 + incoming <= target;
            if !fits(&self.buffer) {
                self.split();
                // overlap that cannot share a chunk with the incoming token is dropped
                if !self.buffer.is_empty() && !fits(&self.buffer) {
                    self.buffer.clear();
                    self.carried = 0;
                }
            }
        }
        if self.fresh() == 0 && self.opening.is_none() {
            self.opening = Some(self.stack.last().map_or(0, |(level, _)| *level));
        }
        self.buffer.push(Token { text, line_start });
        if measure(&self.buffer, self.config.unit) >= self.config.target_size {
            self.split();
        }
    }

    /// Emit at target size, keeping trailing overlap tokens for the next chunk.
    fn split(&mut self) {
        if self.fresh() == 0 {
            return;
        }
        let carry = self.overlap_tail();
        self.emit();
        self.carried = carry.len();
        self.buffer = carry;
        self.opening = None;
    }

    /// Emit at a section boundary. Nothing is carried over.
    fn close(&mut self) {
        if self.fresh() > 0 {
            self.emit();
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.carried = 0;
        self.opening = None;
        self.links.clear();
    }

    fn emit(&mut self) {
        self.drafts.push(Draft {
            breadcrumb: self.stack.iter().map(|(_, title)| title.clone()).collect(),
            tokens: self.buffer.clone(),
            carried: self.carried,
            links: std::mem::take(&mut self.links),
        });
    }

    fn overlap_tail(&self) -> Vec<Token> {
        if self.config.overlap == 0 {
            return Vec::new();
        }
        let budget = self.config.target_size / 2;
        let mut tail: Vec<Token> = Vec::new();
        for token in self.buffer.iter().rev().take(self.config.overlap) {
            let mut candidate = vec![token.clone()];
            candidate.extend(tail.iter().cloned());
            if measure(&candidate, self.config.unit) > budget {
                break;
            }
            tail = candidate;
        }
        tail
    }

    fn finish(mut self) -> Vec<Draft> {
        self.close();
        self.drafts
    }
}

/// Apply the minimum-size rule to a page's drafts.
fn merge_small(drafts: Vec<Draft>, config: &ChunkerConfig) -> Vec<Draft> {
    if drafts.len() <= 1 {
        return drafts;
    }

    let mut out: Vec<Draft> = Vec::with_capacity(drafts.len());
    let mut pending: Option<Draft> = None;
    let mut iter = drafts.into_iter().peekable();

    while let Some(mut draft) = iter.next() {
        if let Some(short) = pending.take() {
            draft = prepend(short, draft);
        }
        if measure(&draft.tokens, config.unit) >= config.min_size {
            out.push(draft);
            continue;
        }

        if let Some(next) = iter.peek()
            && shares_parent(&draft.breadcrumb, &next.breadcrumb)
        {
            pending = Some(draft);
            continue;
        }

        let last_on_page = iter.peek().is_none();
        match out.last_mut() {
            Some(prev) if last_on_page && fits_after(prev, &draft, config) => append(prev, draft),
            _ => out.push(draft),
        }
    }

    out
}

/// `next` continues under the parent heading of `short`.
fn shares_parent(short: &[String], next: &[String]) -> bool {
    let parent = &short[..short.len().saturating_sub(1)];
    next.starts_with(parent)
}

fn prepend(short: Draft, mut next: Draft) -> Draft {
    let mut tokens = short.tokens;
    let boundary = tokens.len();
    tokens.extend(next.tokens.into_iter().skip(next.carried));
    if let Some(first) = tokens.get_mut(boundary) {
        first.line_start = true;
    }
    let mut links = short.links;
    links.append(&mut next.links);
    Draft {
        breadcrumb: next.breadcrumb,
        tokens,
        carried: short.carried,
        links,
    }
}

fn fits_after(prev: &Draft, short: &Draft, config: &ChunkerConfig) -> bool {
    let fresh = &short.tokens[short.carried..];
    let joined = match config.unit {
        SizeUnit::Tokens => prev.tokens.len() + fresh.len(),
        SizeUnit::Chars => measure(&prev.tokens, config.unit) + 1 + measure(fresh, config.unit),
    };
    fresh.is_empty() || joined <= config.max_size
}

fn append(prev: &mut Draft, short: Draft) {
    let boundary = prev.tokens.len();
    prev.tokens.extend(short.tokens.into_iter().skip(short.carried));
    if let Some(first) = prev.tokens.get_mut(boundary) {
        first.line_start = true;
    }
    prev.links.extend(short.links);
}

fn measure(tokens: &[Token], unit: SizeUnit) -> usize {
    match unit {
        SizeUnit::Tokens => tokens.len(),
        SizeUnit::Chars => {
            let chars: usize = tokens.iter().map(|t| t.text.chars().count()).sum();
            chars + tokens.len().saturating_sub(1)
        }
    }
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(if token.line_start { '\n' } else { ' ' });
        }
        out.push_str(&token.text);
    }
    out
}

/// Media URLs in the chunk text or its link targets, first occurrence kept.
fn video_links(text: &str, links: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = URL
        .find_iter(text)
        .map(|m| m.as_str())
        .chain(links.iter().map(String::as_str));
    for url in candidates {
        if VIDEO_HOST.is_match(url) && !out.iter().any(|seen| seen == url) {
            out.push(url.to_owned());
        }
    }
    out
}
