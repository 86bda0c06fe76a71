use std::path::{Path, PathBuf};

use crate::ast::{Node, NodeId, NodeKind, Stylesheet};
use crate::error::{Error, Location, Span};

/// Parse `input` into a fresh stylesheet.
pub fn parse(input: &str, file: Option<&Path>) -> Result<Stylesheet, Error> {
    let mut sheet = Stylesheet::new();
    let root = sheet.root();
    parse_into(&mut sheet, root, input, file)?;
    Ok(sheet)
}

/// Parse `input` and append the resulting nodes to `parent`.
pub fn parse_into(
    sheet: &mut Stylesheet,
    parent: NodeId,
    input: &str,
    file: Option<&Path>,
) -> Result<(), Error> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        file: file.map(Path::to_path_buf),
    };
    parser.parse_block(sheet, parent, None)
}

/// How a statement header ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Open,
    Semicolon,
    Close,
    Eof,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: Option<PathBuf>,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn location(&self, span: Span) -> Location {
        Location::new(self.file.clone(), span)
    }

    fn error(&self, span: Span, message: impl Into<String>) -> Error {
        Error::Parse {
            message: message.into(),
            location: self.location(span),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, ch)| self.peek_at(i) == Some(ch))
    }

    fn parse_block(
        &mut self,
        sheet: &mut Stylesheet,
        parent: NodeId,
        opened: Option<Span>,
    ) -> Result<(), Error> {
        loop {
            self.skip_whitespace();
            let start = self.span();
            match self.peek() {
                None => match opened {
                    Some(open) => return Err(self.error(open, "Unclosed block")),
                    None => return Ok(()),
                },
                Some('}') if opened.is_some() => {
                    self.bump();
                    return Ok(());
                }
                Some('}') => return Err(self.error(start, "Unexpected }")),
                Some(';') => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let text = self.read_comment(start)?;
                    let node = Node::new(NodeKind::Comment { text }).with_location(self.location(start));
                    let id = sheet.create(node);
                    sheet.append(parent, id);
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                Some('@') => self.parse_at_rule(sheet, parent, start)?,
                Some(_) => self.parse_rule_or_declaration(sheet, parent, start)?,
            }
        }
    }

    fn read_comment(&mut self, start: Span) -> Result<String, Error> {
        self.bump();
        self.bump();
        let mut text = String::new();
        loop {
            if self.starts_with("*/") {
                self.bump();
                self.bump();
                return Ok(text);
            }
            match self.bump() {
                Some(ch) => text.push(ch),
                None => return Err(self.error(start, "Unclosed comment")),
            }
        }
    }

    /// Read statement text up to a top-level `{`, `;` or `}`. Quotes,
    /// parentheses and `#{...}` interpolations are copied verbatim. The
    /// terminator is consumed except for `}`.
    fn read_header(&mut self, start: Span) -> Result<(String, Terminator), Error> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let Some(ch) = self.peek() else {
                if depth > 0 {
                    return Err(self.error(start, "Unclosed bracket"));
                }
                return Ok((text, Terminator::Eof));
            };
            match ch {
                '"' | '\'' => self.read_string(ch, &mut text, start)?,
                '\\' => {
                    text.push(ch);
                    self.bump();
                    if let Some(next) = self.bump() {
                        text.push(next);
                    }
                }
                '#' if self.peek_at(1) == Some('{') => self.read_interpolation(&mut text, start)?,
                '/' if self.peek_at(1) == Some('*') => {
                    let comment_start = self.span();
                    let comment = self.read_comment(comment_start)?;
                    text.push_str("/*");
                    text.push_str(&comment);
                    text.push_str("*/");
                }
                '(' => {
                    depth += 1;
                    text.push(ch);
                    self.bump();
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    text.push(ch);
                    self.bump();
                }
                '{' if depth == 0 => {
                    self.bump();
                    return Ok((text, Terminator::Open));
                }
                ';' if depth == 0 => {
                    self.bump();
                    return Ok((text, Terminator::Semicolon));
                }
                '}' if depth == 0 => return Ok((text, Terminator::Close)),
                _ => {
                    text.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn read_string(&mut self, quote: char, text: &mut String, start: Span) -> Result<(), Error> {
        text.push(quote);
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    text.push('\\');
                    if let Some(next) = self.bump() {
                        text.push(next);
                    }
                }
                Some(ch) if ch == quote => {
                    text.push(ch);
                    return Ok(());
                }
                Some(ch) => text.push(ch),
                None => return Err(self.error(start, "Unclosed string")),
            }
        }
    }

    fn read_interpolation(&mut self, text: &mut String, start: Span) -> Result<(), Error> {
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some('{') => {
                    depth += 1;
                    text.push('{');
                }
                Some('}') => {
                    text.push('}');
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(ch) => text.push(ch),
                None => return Err(self.error(start, "Unclosed interpolation")),
            }
        }
    }

    fn parse_at_rule(
        &mut self,
        sheet: &mut Stylesheet,
        parent: NodeId,
        start: Span,
    ) -> Result<(), Error> {
        self.bump();
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                name.push(ch);
                self.bump();
            } else if ch == '#' && self.peek_at(1) == Some('{') {
                self.read_interpolation(&mut name, start)?;
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error(start, "At-rule without name"));
        }

        let (params, terminator) = self.read_header(start)?;
        let block = terminator == Terminator::Open;
        let node = Node::new(NodeKind::AtRule {
            name,
            params: params.trim().to_string(),
            block,
        })
        .with_location(self.location(start));
        let id = sheet.create(node);
        sheet.append(parent, id);

        if block {
            self.parse_block(sheet, id, Some(start))?;
        }
        Ok(())
    }

    fn parse_rule_or_declaration(
        &mut self,
        sheet: &mut Stylesheet,
        parent: NodeId,
        start: Span,
    ) -> Result<(), Error> {
        let (header, terminator) = self.read_header(start)?;
        let location = self.location(start);

        if terminator == Terminator::Open {
            let selector = header.trim().to_string();
            if selector.is_empty() {
                return Err(self.error(start, "Missing selector before '{'"));
            }
            let id = sheet.create(Node::rule(selector).with_location(location));
            sheet.append(parent, id);
            return self.parse_block(sheet, id, Some(start));
        }

        let Some((prop, value)) = split_declaration(&header) else {
            return Err(self.error(start, format!("Unknown word: '{}'", header.trim())));
        };
        let (value, important) = strip_important(value);
        let node = Node::new(NodeKind::Declaration {
            prop: prop.to_string(),
            value,
            important,
        })
        .with_location(location);
        let id = sheet.create(node);
        sheet.append(parent, id);
        Ok(())
    }
}

/// Split a declaration at its first top-level colon.
fn split_declaration(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                let prop = text[..i].trim();
                if prop.is_empty() {
                    return None;
                }
                return Some((prop, text[i + 1..].trim()));
            }
            _ => {}
        }
    }
    None
}

fn strip_important(value: &str) -> (String, bool) {
    let lower = value.to_ascii_lowercase();
    if let Some(index) = lower.rfind('!') {
        let flag: String = lower[index + 1..].split_whitespace().collect();
        if flag == "important" {
            return (value[..index].trim_end().to_string(), true);
        }
    }
    (value.to_string(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sheet: &Stylesheet, parent: NodeId) -> Vec<NodeKind> {
        sheet
            .children(parent)
            .into_iter()
            .map(|id| sheet.kind(id).clone())
            .collect()
    }

    #[test]
    fn parses_rules_and_declarations_with_positions() {
        let sheet = parse("a {\n  color: red;\n  margin: 0 !important\n}", None).expect("parse");
        let rules = sheet.children(sheet.root());
        assert_eq!(rules.len(), 1);
        assert_eq!(sheet.node(rules[0]).selector(), Some("a"));

        let decls = sheet.children(rules[0]);
        assert_eq!(
            kinds(&sheet, rules[0]),
            vec![
                NodeKind::Declaration {
                    prop: "color".into(),
                    value: "red".into(),
                    important: false
                },
                NodeKind::Declaration {
                    prop: "margin".into(),
                    value: "0".into(),
                    important: true
                },
            ]
        );
        assert_eq!(sheet.span(decls[0]), Span { line: 2, column: 3 });
    }

    #[test]
    fn at_rules_with_and_without_blocks() {
        let sheet = parse("@import \"a\";\n@media print { b { c: d } }\n@mixin m {}", None)
            .expect("parse");
        let nodes = sheet.children(sheet.root());
        assert_eq!(
            sheet.kind(nodes[0]),
            &NodeKind::AtRule {
                name: "import".into(),
                params: "\"a\"".into(),
                block: false
            }
        );
        assert_eq!(sheet.node(nodes[1]).params(), Some("print"));
        assert_eq!(sheet.children(nodes[1]).len(), 1);
        assert_eq!(
            sheet.kind(nodes[2]),
            &NodeKind::AtRule {
                name: "mixin".into(),
                params: "m".into(),
                block: true
            }
        );
    }

    #[test]
    fn interpolation_braces_do_not_open_blocks() {
        let sheet = parse(".icon-#{$name} { width: #{$size}; }", None).expect("parse");
        let rule = sheet.children(sheet.root())[0];
        assert_eq!(sheet.node(rule).selector(), Some(".icon-#{$name}"));
        let decl = sheet.children(rule)[0];
        assert_eq!(sheet.node(decl).value(), Some("#{$size}"));
    }

    #[test]
    fn variables_and_maps_parse_as_declarations() {
        let sheet = parse("$map: (a: 1, b: 2);\n$c: red !default;", None).expect("parse");
        let nodes = sheet.children(sheet.root());
        assert_eq!(sheet.node(nodes[0]).prop(), Some("$map"));
        assert_eq!(sheet.node(nodes[0]).value(), Some("(a: 1, b: 2)"));
        assert_eq!(sheet.node(nodes[1]).value(), Some("red !default"));
    }

    #[test]
    fn comments_are_kept_and_line_comments_dropped() {
        let sheet = parse("/* keep */\n// drop\na { b: c }", None).expect("parse");
        let nodes = sheet.children(sheet.root());
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            sheet.kind(nodes[0]),
            &NodeKind::Comment {
                text: " keep ".into()
            }
        );
    }

    #[test]
    fn reports_unclosed_blocks_with_location() {
        let err = parse("a {\n  color: red;", Some(Path::new("x.scss"))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unclosed block"), "{message}");
        assert!(message.starts_with("x.scss:1:1"), "{message}");
    }

    #[test]
    fn rejects_words_without_colon() {
        let err = parse("a { color red }", None).unwrap_err();
        assert!(err.to_string().contains("Unknown word"));
    }
}
