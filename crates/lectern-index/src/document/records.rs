//! JSON and JSON Lines page records.
//!
//! A record is an object with a title, a URL, and a body under one of several
//! conventional keys. Bodies that contain HTML headings are parsed as HTML,
//! everything else as Markdown.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::{Block, Document, html, markdown};

const TITLE_KEYS: &[&str] = &["title", "page_title"];
const URL_KEYS: &[&str] = &["url", "page_url"];
const BODY_KEYS: &[&str] = &["content", "text", "chunk_text", "body"];
const SECTION_KEYS: &[&str] = &["heading", "toc_title", "section"];

static HTML_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[1-6][\s>]").expect("valid regex"));

type Record = Map<String, Value>;

pub(crate) fn parse_json(raw: &str) -> Result<Document, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(match value {
        Value::Object(record) => from_record(&record),
        Value::Array(items) => {
            let records: Vec<&Record> = items.iter().filter_map(Value::as_object).collect();
            from_records(&records, Vec::new())
        }
        scalar => Document {
            blocks: vec![Block::text(scalar.to_string())],
            ..Document::default()
        },
    })
}

/// One record per line. Lines that are not JSON objects are kept as plain text.
pub(crate) fn parse_json_lines(raw: &str) -> Document {
    let mut records = Vec::new();
    let mut stray = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => records.push(record),
            Ok(_) | Err(_) => {
                tracing::debug!(line = lineno + 1, "non-object JSON line kept as text");
                stray.push(line.to_owned());
            }
        }
    }
    let refs: Vec<&Record> = records.iter().collect();
    from_records(&refs, stray)
}

fn from_record(record: &Record) -> Document {
    let mut doc = Document::default();
    apply_metadata(&mut doc, record);
    let title = first_str(record, TITLE_KEYS);
    let body = first_str(record, BODY_KEYS).unwrap_or_default();

    if looks_like_html(body) {
        doc.blocks = html::parse_html(body).1;
    } else {
        if let Some(title) = title {
            doc.blocks.push(Block::heading(1, title));
        }
        doc.blocks.extend(markdown::parse_markdown(body));
    }
    attach_links(&mut doc.blocks, record);

    doc.page_title = title.unwrap_or_default().to_owned();
    doc.page_url = first_str(record, URL_KEYS).unwrap_or_default().to_owned();
    doc
}

fn from_records(records: &[&Record], stray: Vec<String>) -> Document {
    let mut doc = Document::default();
    let title = records.iter().find_map(|r| first_str(r, TITLE_KEYS));
    if let Some(title) = title {
        doc.blocks.push(Block::heading(1, title));
    }

    for record in records {
        apply_metadata(&mut doc, record);
        if let Some(section) = first_str(record, SECTION_KEYS) {
            doc.blocks.push(Block::heading(2, section));
        }
        if let Some(body) = first_str(record, BODY_KEYS) {
            if looks_like_html(body) {
                doc.blocks.extend(html::parse_html(body).1);
            } else {
                doc.blocks.extend(markdown::parse_markdown(body));
            }
            attach_links(&mut doc.blocks, record);
        }
    }

    if !stray.is_empty() {
        doc.blocks.push(Block::text(stray.join("\n")));
    }
    doc.page_title = title.unwrap_or_default().to_owned();
    doc
}

/// Fill page-level fields the document does not have yet.
fn apply_metadata(doc: &mut Document, record: &Record) {
    if doc.page_url.is_empty()
        && let Some(url) = first_str(record, URL_KEYS)
    {
        url.clone_into(&mut doc.page_url);
    }
    if doc.category.is_none() {
        doc.category = scalar_string(record.get("category"));
    }
    if doc.time_required.is_none() {
        doc.time_required = scalar_string(record.get("time_required"));
    }
    if doc.tutorial_files_used.is_empty() {
        doc.tutorial_files_used = string_list(record.get("tutorial_files_used"));
    }
}

fn attach_links(blocks: &mut [Block], record: &Record) {
    let links = string_list(record.get("video_links"));
    if links.is_empty() {
        return;
    }
    if let Some(Block::Text { links: existing, .. }) = blocks
        .iter_mut()
        .rev()
        .find(|b| matches!(b, Block::Text { .. }))
    {
        existing.extend(links);
    }
}

fn looks_like_html(body: &str) -> bool {
    HTML_HEADING.is_match(body)
}

fn first_str<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_owned()],
        _ => Vec::new(),
    }
}
