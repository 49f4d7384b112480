//! Forgiving HTML tree builder.
//!
//! Handles the markup found on ordinary form pages: nested elements, void
//! and raw-text elements, comments, doctypes, quoted/unquoted/bare attributes
//! and the common character references. Unclosed elements close implicitly at
//! end of input and stray end tags are dropped.

use super::{Document, NodeId, VOID_ELEMENTS};

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

pub(super) fn parse_into(doc: &mut Document, html: &str) {
    let mut builder = TreeBuilder {
        doc,
        src: html,
        pos: 0,
        open: Vec::new(),
    };
    builder.run();
}

struct TreeBuilder<'a> {
    doc: &'a mut Document,
    src: &'a str,
    pos: usize,
    /// Open elements, innermost last. The document node is implied below.
    open: Vec<(NodeId, String)>,
}

impl<'a> TreeBuilder<'a> {
    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn current_parent(&self) -> NodeId {
        self.open
            .last()
            .map(|(id, _)| *id)
            .unwrap_or_else(|| self.doc.root())
    }

    fn run(&mut self) {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let end = rest[4..].find("-->").map(|i| i + 7).unwrap_or(rest.len());
                let comment = self.doc.create_comment();
                let parent = self.current_parent();
                self.doc.append_child(parent, comment);
                self.pos += end;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                self.pos += end;
            } else if rest.starts_with("</") && starts_with_alpha(&rest[2..]) {
                self.end_tag();
            } else if rest.starts_with('<') && starts_with_alpha(&rest[1..]) {
                self.start_tag();
            } else {
                self.text();
            }
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A '<' that does not open markup is literal text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
        let raw = &rest[..end];
        self.pos += end;
        self.append_text(&decode_entities(raw));
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let node = self.doc.create_text(text);
        let parent = self.current_parent();
        self.doc.append_child(parent, node);
    }

    fn end_tag(&mut self) {
        let rest = self.rest();
        let name_len = tag_name_len(&rest[2..]);
        let name = rest[2..2 + name_len].to_ascii_lowercase();
        let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        self.pos += end;

        if let Some(index) = self.open.iter().rposition(|(_, tag)| *tag == name) {
            self.open.truncate(index);
        }
    }

    fn start_tag(&mut self) {
        let rest = self.rest();
        let name_len = tag_name_len(&rest[1..]);
        let name = rest[1..1 + name_len].to_ascii_lowercase();
        self.pos += 1 + name_len;

        let (attrs, self_closing) = self.attributes();
        self.close_implied(&name);

        let element = self.doc.create_element(&name);
        for (key, value) in attrs {
            if !self.doc.has_attr(element, &key) {
                self.doc.set_attr(element, &key, &value);
            }
        }
        let parent = self.current_parent();
        self.doc.append_child(parent, element);

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text(element, &name);
            return;
        }
        self.open.push((element, name));
    }

    /// Parse attributes up to and including the closing `>`.
    fn attributes(&mut self) -> (Vec<(String, String)>, bool) {
        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return (attrs, false);
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                return (attrs, true);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return (attrs, false);
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let name_len = rest
                .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
                .unwrap_or(rest.len())
                .max(rest.chars().next().map(char::len_utf8).unwrap_or(1));
            let name = rest[..name_len].to_ascii_lowercase();
            self.pos += name_len;

            self.skip_whitespace();
            if !self.rest().starts_with('=') {
                attrs.push((name, String::new()));
                continue;
            }
            self.pos += 1;
            self.skip_whitespace();
            let value = self.attribute_value();
            attrs.push((name, decode_entities(&value)));
        }
    }

    fn attribute_value(&mut self) -> String {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(quote).unwrap_or(body.len());
                let value = body[..end].to_string();
                self.pos += 1 + (end + 1).min(body.len());
                value
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                let value = rest[..end].to_string();
                self.pos += end;
                value
            }
        }
    }

    fn raw_text(&mut self, element: NodeId, name: &str) {
        let rest = self.rest();
        let closing = format!("</{}", name);
        let end = find_ignore_ascii_case(rest, &closing).unwrap_or(rest.len());
        let raw = &rest[..end];
        let text = if matches!(name, "textarea" | "title") {
            decode_entities(raw)
        } else {
            raw.to_string()
        };
        if !text.is_empty() {
            let node = self.doc.create_text(&text);
            self.doc.append_child(element, node);
        }
        let after = &rest[end..];
        let close_len = after.find('>').map(|i| i + 1).unwrap_or(after.len());
        self.pos += end + close_len;
    }

    /// Close elements whose end tag HTML lets authors omit.
    fn close_implied(&mut self, incoming: &str) {
        while let Some((_, open)) = self.open.last() {
            let closes = match open.as_str() {
                "option" => matches!(incoming, "option" | "optgroup"),
                "optgroup" => incoming == "optgroup",
                "li" => incoming == "li",
                "dt" | "dd" => matches!(incoming, "dt" | "dd"),
                "tr" => incoming == "tr",
                "td" | "th" => matches!(incoming, "td" | "th" | "tr"),
                "p" => BLOCK_ELEMENTS.contains(&incoming),
                _ => false,
            };
            if !closes {
                break;
            }
            self.open.pop();
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }
}

fn starts_with_alpha(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn tag_name_len(s: &str) -> usize {
    s.find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(s.len())
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Decode the character references that appear in ordinary form markup.
/// Unknown references are left untouched.
pub(super) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest[1..].find(';').map(|i| i + 1).filter(|i| *i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let name = &rest[1..semi];
        match decode_reference(name) {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
