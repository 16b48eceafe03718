//! The small subset of HTML allowed in layout text: bold, italic, paragraphs,
//! line breaks and lists.

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    Normal,
    Bold,
    Italic,
}

/// A run of text in one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub font: FontRole,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Element { name: String, children: Vec<Node> },
}

const VOID_ELEMENTS: [&str; 4] = ["br", "hr", "img", "meta"];

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Parse into a forest. Unclosed elements are closed at the end and stray closing
/// tags are dropped.
fn parse(html: &str) -> Vec<Node> {
    // Stack of open elements; the bottom entry collects the top-level nodes.
    let mut stack: Vec<(String, Vec<Node>)> = vec![(String::new(), Vec::new())];
    let mut rest = html;

    fn close(stack: &mut Vec<(String, Vec<Node>)>) {
        if let Some((name, children)) = stack.pop() {
            if let Some((_, parent)) = stack.last_mut() {
                parent.push(Node::Element { name, children });
            }
        }
    }

    while !rest.is_empty() {
        let (text, tag) = match rest.find('<') {
            Some(start) => {
                let end = rest[start..].find('>').map(|offset| start + offset);
                match end {
                    Some(end) => (&rest[..start], Some(&rest[start + 1..end])),
                    None => (rest, None),
                }
            }
            None => (rest, None),
        };
        if !text.is_empty() {
            if let Some((_, children)) = stack.last_mut() {
                children.push(Node::Text(collapse_whitespace(&decode_entities(text))));
            }
        }
        let Some(tag) = tag else { break };
        rest = &rest[text.len() + tag.len() + 2..];

        let tag = tag.trim();
        if tag.starts_with('!') || tag.starts_with('?') {
            continue;
        }
        if let Some(closing) = tag.strip_prefix('/') {
            let name = closing.trim().to_ascii_lowercase();
            if let Some(depth) = stack.iter().rposition(|(open, _)| *open == name) {
                if depth > 0 {
                    while stack.len() > depth {
                        close(&mut stack);
                    }
                }
            }
            continue;
        }
        let self_closing = tag.ends_with('/');
        let name: String = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            if let Some((_, children)) = stack.last_mut() {
                children.push(Node::Element { name, children: Vec::new() });
            }
        } else {
            stack.push((name, Vec::new()));
        }
    }
    while stack.len() > 1 {
        close(&mut stack);
    }
    stack.pop().map(|(_, nodes)| nodes).unwrap_or_default()
}

struct SegmentWriter {
    paragraphs: Vec<Vec<Segment>>,
    current: Vec<Segment>,
    skipping_space: bool,
}

impl SegmentWriter {
    fn push_text(&mut self, text: &str, font: FontRole) {
        let text = if self.skipping_space { text.trim_start() } else { text };
        if !text.is_empty() {
            self.current.push(Segment { text: text.to_string(), font });
            self.skipping_space = false;
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            self.current.push(Segment { text: String::new(), font: FontRole::Normal });
        }
        self.paragraphs.push(std::mem::take(&mut self.current));
        self.skipping_space = true;
    }

    fn node(&mut self, node: &Node, font: FontRole) {
        match node {
            Node::Text(text) => self.push_text(text, font),
            Node::Element { name, children } => match name.as_str() {
                "b" | "strong" => children.iter().for_each(|child| self.node(child, FontRole::Bold)),
                "i" | "em" => children.iter().for_each(|child| self.node(child, FontRole::Italic)),
                "br" => self.flush(),
                "ul" | "ol" | "li" => {
                    self.flush();
                    children.iter().for_each(|child| self.node(child, font));
                    self.flush();
                }
                "p" => {
                    for child in children {
                        self.node(child, FontRole::Normal);
                        self.flush();
                    }
                }
                "span" | "html" | "body" => children.iter().for_each(|child| self.node(child, font)),
                other => info!(tag = other, "unhandled html tag"),
            },
        }
    }
}

/// Paragraphs of styled segments. Each paragraph starts on a new line.
pub fn to_segments(html: &str) -> Vec<Vec<Segment>> {
    let mut writer = SegmentWriter {
        paragraphs: Vec::new(),
        current: Vec::new(),
        skipping_space: true,
    };
    for node in parse(html) {
        writer.node(&node, FontRole::Normal);
    }
    if !writer.current.is_empty() {
        writer.flush();
    }
    // Trailing flushes only add blank lines at the bottom.
    while writer
        .paragraphs
        .last()
        .map_or(false, |p| p.iter().all(|s| s.text.is_empty()))
    {
        writer.paragraphs.pop();
    }
    writer.paragraphs
}

/// One laid-out piece of text, relative to the top-left of the text box.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub font: FontRole,
    pub x: f64,
    pub y: f64,
}

/// Word-wrap paragraphs into `width`. `y` is the baseline of each line.
pub fn layout<F>(
    paragraphs: &[Vec<Segment>],
    width: f64,
    font_size: f64,
    measure: F,
) -> Vec<PlacedText>
where
    F: Fn(&str, FontRole) -> f64,
{
    let line_height = font_size * 1.2;
    let paragraph_gap = font_size / 2.0;
    let mut placed = Vec::new();
    let mut y = 0.0;

    for paragraph in paragraphs {
        let mut x = 0.0;
        for segment in paragraph {
            for word in segment.text.split_inclusive(' ') {
                let mut word = word;
                let mut word_width = measure(word, segment.font);
                if x > 0.0 && x + measure(word.trim_end(), segment.font) > width {
                    y += line_height;
                    x = 0.0;
                    word = word.trim_start();
                    word_width = measure(word, segment.font);
                }
                if word.is_empty() {
                    continue;
                }
                placed.push(PlacedText {
                    text: word.to_string(),
                    font: segment.font,
                    x,
                    y,
                });
                x += word_width;
            }
        }
        y += line_height + paragraph_gap;
    }
    placed
}
