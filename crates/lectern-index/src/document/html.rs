use scraper::{ElementRef, Html, Selector};

use super::Block;
use super::markdown::collapse_whitespace;

const SKIPPED: &[&str] = &[
    "script", "style", "template", "noscript", "svg", "nav", "head",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "li", "pre", "td", "th", "tr", "blockquote", "dd", "dt", "figcaption", "div", "section",
    "article", "main", "ul", "ol", "table", "header", "footer", "aside",
];

/// Parse an HTML page (or fragment) into heading and text blocks.
///
/// Returns the `<title>` text, if any, alongside the blocks.
pub(crate) fn parse_html(input: &str) -> (Option<String>, Vec<Block>) {
    let document = Html::parse_document(input);
    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut collector = BlockCollector::default();
    collector.walk(document.root_element());
    (title, collector.finish())
}

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    text: String,
    links: Vec<String>,
    preformatted: bool,
}

impl BlockCollector {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.text.push_str(text);
            } else if let Some(el) = ElementRef::wrap(child) {
                self.visit(el);
            }
        }
    }

    fn visit(&mut self, element: ElementRef<'_>) {
        let tag = element.value().name();
        if SKIPPED.contains(&tag) {
            return;
        }

        if let Some(level) = heading_level(tag) {
            self.flush();
            let title = collapse_whitespace(&element.text().collect::<String>());
            if !title.is_empty() {
                self.blocks.push(Block::heading(level, title));
            }
            return;
        }

        match tag {
            "br" => {
                self.text.push('\n');
                return;
            }
            "a" => {
                if let Some(href) = element.value().attr("href") {
                    self.links.push(href.to_owned());
                }
            }
            _ => {}
        }

        let is_block = BLOCK_TAGS.contains(&tag);
        if is_block {
            self.flush();
        }
        let was_pre = self.preformatted;
        if tag == "pre" {
            self.preformatted = true;
        }
        self.walk(element);
        if is_block {
            self.flush();
        }
        self.preformatted = was_pre;
    }

    fn flush(&mut self) {
        let text = if self.preformatted {
            self.text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            self.text
                .lines()
                .map(collapse_whitespace)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
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

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_paragraphs_and_lists() {
        let html = r"<html><body>
            <h1>Doors</h1>
            <p>Place a   door
               in a wall.</p>
            <h2>Swing</h2>
            <ul><li>Flip <b>facing</b></li><li>Flip hand</li></ul>
        </body></html>";
        let (_, blocks) = parse_html(html);
        assert_eq!(
            blocks,
            vec![
                Block::heading(1, "Doors"),
                Block::text("Place a door in a wall."),
                Block::heading(2, "Swing"),
                Block::text("Flip facing"),
                Block::text("Flip hand"),
            ]
        );
    }

    #[test]
    fn script_style_and_nav_skipped() {
        let html = "<body><nav>Home | Docs</nav><script>var x = 1;</script>\
                    <style>p { color: red }</style><p>Visible</p></body>";
        let (_, blocks) = parse_html(html);
        assert_eq!(blocks, vec![Block::text("Visible")]);
    }

    #[test]
    fn title_tag_extracted() {
        let (title, _) = parse_html("<html><head><title> Floors </title></head><body></body></html>");
        assert_eq!(title.as_deref(), Some("Floors"));
    }

    #[test]
    fn fragment_without_body() {
        let (title, blocks) = parse_html("<h3>Grids</h3><p>Add a grid line.</p>");
        assert_eq!(title, None);
        assert_eq!(blocks, vec![Block::heading(3, "Grids"), Block::text("Add a grid line.")]);
    }

    #[test]
    fn anchors_collected_as_links() {
        let html = r#"<p>See <a href="https://vimeo.com/123">this clip</a>.</p>"#;
        let (_, blocks) = parse_html(html);
        assert_eq!(
            blocks,
            vec![Block::Text {
                text: "See this clip.".into(),
                links: vec!["https://vimeo.com/123".into()],
            }]
        );
    }

    #[test]
    fn preformatted_keeps_line_breaks() {
        let (_, blocks) = parse_html("<pre>step 1\nstep 2\n</pre>");
        assert_eq!(blocks, vec![Block::text("step 1\nstep 2")]);
    }

    #[test]
    fn line_break_separates_words() {
        let (_, blocks) = parse_html("<p>one<br>two</p>");
        assert_eq!(blocks, vec![Block::text("one two")]);
    }
}
