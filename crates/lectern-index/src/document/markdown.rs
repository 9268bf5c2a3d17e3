use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::Block;

/// Parse Markdown into heading and text blocks.
///
/// Paragraphs, list items, block quotes, and code blocks each become a text
/// block; code keeps its line breaks. Link and image targets are attached to
/// the block they appear in.
pub(crate) fn parse_markdown(input: &str) -> Vec<Block> {
    let parser = Parser::new_ext(input, Options::ENABLE_TABLES);
    let mut collector = BlockCollector::default();
    for event in parser {
        collector.push_event(event);
    }
    collector.finish()
}

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    text: String,
    links: Vec<String>,
    heading: Option<u8>,
    in_code_block: bool,
}

impl BlockCollector {
    fn push_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(level) = self.heading.take() {
                    let title = collapse_whitespace(&self.text);
                    self.text.clear();
                    if !title.is_empty() {
                        self.blocks.push(Block::heading(level, title));
                    }
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.flush();
                self.in_code_block = false;
            }
            Event::Start(
                Tag::Paragraph | Tag::Item | Tag::List(_) | Tag::BlockQuote(_) | Tag::TableRow,
            )
            | Event::End(
                TagEnd::Paragraph
                | TagEnd::Item
                | TagEnd::List(_)
                | TagEnd::BlockQuote(_)
                | TagEnd::TableRow
                | TagEnd::TableHead,
            ) => self.flush(),
            Event::Start(Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. }) => {
                self.links.push(dest_url.to_string());
            }
            Event::Text(text) | Event::Code(text) => self.text.push_str(&text),
            Event::SoftBreak => self.text.push(' '),
            Event::HardBreak => self.text.push('\n'),
            Event::End(TagEnd::TableCell) => self.text.push(' '),
            _ => {}
        }
    }

    fn flush(&mut self) {
        if self.heading.is_some() {
            return;
        }
        let text = if self.in_code_block {
            self.text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            self.text
                .lines()
                .map(collapse_whitespace)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.text.clear();
        if text.is_empty() {
            return;
        }
        self.blocks.push(Block::Text {
            text,
            links: std::mem::take(&mut self.links),
        });
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
