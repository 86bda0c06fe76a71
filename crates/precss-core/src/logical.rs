//! Logical properties and values, rewritten into their physical
//! equivalents.
//!
//! Expansions that depend on the writing direction use the configured
//! `dir`. Without one, they become two nested `&:dir(ltr)` / `&:dir(rtl)`
//! copies of the enclosing rule, which the nesting stage flattens later.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Node, NodeId, Stylesheet};
use crate::config::{Direction, LogicalOptions};
use crate::error::Error;
use crate::list;
use crate::pipeline::{Context, Plugin};

static BORDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^border(?:-(block|block-start|block-end|inline|inline-start|inline-end|start|end))?(-width|-style|-color)?$",
    )
    .expect("valid border regex")
});
static SIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(inset|margin|padding)-(block|block-start|block-end|inline|inline-start|inline-end|start|end)$",
    )
    .expect("valid side regex")
});
static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(min-|max-)?(block|inline)-size$").expect("valid size regex"));
static LOGICAL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*logical\s+").expect("valid logical keyword regex"));

type Decls = Vec<(String, String)>;

/// Physical declarations replacing one logical declaration.
#[derive(Debug, Clone, PartialEq)]
enum Expansion {
    Fixed(Decls),
    Directional { ltr: Decls, rtl: Decls },
}

impl Expansion {
    /// Fixed when both directions agree.
    fn directional(ltr: Decls, rtl: Decls) -> Self {
        if ltr == rtl {
            Self::Fixed(ltr)
        } else {
            Self::Directional { ltr, rtl }
        }
    }
}

/// The first of `indexes` present in `values`.
fn first_of(values: &[String], indexes: &[usize]) -> String {
    indexes
        .iter()
        .find_map(|&i| values.get(i).filter(|value| !value.is_empty()))
        .cloned()
        .unwrap_or_default()
}

fn decl(prop: impl Into<String>, value: impl Into<String>) -> (String, String) {
    (prop.into(), value.into())
}

/// Expansion of a side keyword (`block`, `inline-start`, ...) into physical
/// sides. `name` builds the physical property from a side.
fn sides(side: &str, value: &str, values: &[String], name: impl Fn(&str) -> String) -> Expansion {
    let v = |indexes: &[usize]| first_of(values, indexes);
    match side {
        "block" => Expansion::Fixed(vec![decl(name("top"), v(&[0])), decl(name("bottom"), v(&[1, 0]))]),
        "block-start" => Expansion::Fixed(vec![decl(name("top"), value)]),
        "block-end" => Expansion::Fixed(vec![decl(name("bottom"), value)]),
        "inline" => {
            let ltr = vec![decl(name("left"), v(&[0])), decl(name("right"), v(&[1, 0]))];
            let rtl = vec![decl(name("right"), v(&[0])), decl(name("left"), v(&[1, 0]))];
            let symmetric = values.len() == 1 || (values.len() == 2 && values[0] == values[1]);
            if symmetric {
                Expansion::Fixed(ltr)
            } else {
                Expansion::Directional { ltr, rtl }
            }
        }
        "inline-start" => Expansion::directional(
            vec![decl(name("left"), value)],
            vec![decl(name("right"), value)],
        ),
        "inline-end" => Expansion::directional(
            vec![decl(name("right"), value)],
            vec![decl(name("left"), value)],
        ),
        "start" => Expansion::directional(
            vec![decl(name("top"), v(&[0])), decl(name("left"), v(&[1, 0]))],
            vec![decl(name("top"), v(&[0])), decl(name("right"), v(&[1, 0]))],
        ),
        _ => Expansion::directional(
            vec![decl(name("bottom"), v(&[0])), decl(name("right"), v(&[1, 0]))],
            vec![decl(name("bottom"), v(&[0])), decl(name("left"), v(&[1, 0]))],
        ),
    }
}

/// `border[-width|-style|-color]: logical ...` lists the sides as
/// block-start, inline-start, block-end, inline-end.
fn logical_border(prop: &str, suffix: &str, value: &str, values: &[String]) -> Option<Expansion> {
    let first = values.first()?;
    if !LOGICAL_KEYWORD.is_match(first) {
        return None;
    }
    let mut values = values.to_vec();
    values[0] = LOGICAL_KEYWORD.replace(first, "").into_owned();
    if values.len() == 1 {
        return Some(Expansion::Fixed(vec![decl(prop, LOGICAL_KEYWORD.replace(value, ""))]));
    }

    let v = |indexes: &[usize]| first_of(&values, indexes);
    let name = |side: &str| format!("border-{side}{suffix}");
    if values.get(3).map_or(true, |end| *end == values[1]) {
        return Some(Expansion::Fixed(vec![
            decl(name("top"), v(&[0])),
            decl(name("right"), v(&[3, 1, 0])),
            decl(name("bottom"), v(&[2, 0])),
            decl(name("left"), v(&[1, 0])),
        ]));
    }
    Some(Expansion::Directional {
        ltr: vec![
            decl(name("top"), v(&[0])),
            decl(name("left"), v(&[1, 0])),
            decl(name("bottom"), v(&[2, 0])),
            decl(name("right"), v(&[3, 1, 0])),
        ],
        rtl: vec![
            decl(name("top"), v(&[0])),
            decl(name("right"), v(&[1, 0])),
            decl(name("bottom"), v(&[2, 0])),
            decl(name("left"), v(&[3, 1, 0])),
        ],
    })
}

fn border(prop: &str, value: &str, values: &[String]) -> Option<Expansion> {
    let captures = BORDER.captures(prop)?;
    let suffix = captures.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let Some(side) = captures.get(1).map(|m| m.as_str().to_ascii_lowercase()) else {
        return logical_border(prop, &suffix, value, values);
    };
    let name = |physical: &str| format!("border-{physical}{suffix}");
    let expansion = match side.as_str() {
        "block" => Expansion::Fixed(vec![
            decl(name("top"), first_of(values, &[0])),
            decl(name("bottom"), first_of(values, &[0])),
        ]),
        other => sides(other, value, values, name),
    };
    Some(expansion)
}

/// `inset`, plus its `logical` form in block-start, inline-start,
/// block-end, inline-end order.
fn inset(values: &[String]) -> Expansion {
    let v = |indexes: &[usize]| first_of(values, indexes);
    let logical = values
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case("logical"));
    if !logical {
        return Expansion::Fixed(vec![
            decl("top", v(&[0])),
            decl("right", v(&[1, 0])),
            decl("bottom", v(&[2, 0])),
            decl("left", v(&[3, 1, 0])),
        ]);
    }
    let ltr = vec![
        decl("top", v(&[1])),
        decl("left", v(&[2, 1])),
        decl("bottom", v(&[3, 1])),
        decl("right", v(&[4, 2, 1])),
    ];
    if values.get(4).map_or(true, |end| Some(end) == values.get(2)) {
        return Expansion::Fixed(ltr);
    }
    let rtl = vec![
        decl("top", v(&[1])),
        decl("right", v(&[2, 1])),
        decl("bottom", v(&[3, 1])),
        decl("left", v(&[4, 2, 1])),
    ];
    Expansion::Directional { ltr, rtl }
}

/// `margin: logical ...` / `padding: logical ...`.
fn spacing(prop: &str, value: &str, values: &[String]) -> Option<Expansion> {
    let logical = values
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case("logical"));
    if !logical {
        return None;
    }
    if values.get(4).map_or(true, |end| Some(end) == values.get(2)) {
        return Some(Expansion::Fixed(vec![decl(prop, LOGICAL_KEYWORD.replace(value, ""))]));
    }
    let v = |indexes: &[usize]| first_of(values, indexes);
    let ltr = [v(&[1]), v(&[4, 2, 1]), v(&[3, 1]), v(&[2, 1])].join(" ");
    let rtl = [v(&[1]), v(&[2, 1]), v(&[3, 1]), v(&[4, 2, 1])].join(" ");
    Some(Expansion::Directional {
        ltr: vec![decl(prop, ltr)],
        rtl: vec![decl(prop, rtl)],
    })
}

/// `float`, `clear` and `text-align` keywords that name a side.
fn flow_keyword(prop: &str, value: &str, start: &str, end: &str) -> Option<Expansion> {
    let left = vec![decl(prop, "left")];
    let right = vec![decl(prop, "right")];
    if value.eq_ignore_ascii_case(start) {
        Some(Expansion::Directional { ltr: left, rtl: right })
    } else if value.eq_ignore_ascii_case(end) {
        Some(Expansion::Directional { ltr: right, rtl: left })
    } else {
        None
    }
}

/// Work out the physical replacement of `prop: value`, if it is logical.
fn expand(prop: &str, value: &str) -> Option<Expansion> {
    let lower = prop.to_ascii_lowercase();
    let trimmed = value.trim();

    if BORDER.is_match(&lower) {
        let values = list::split(value, &['/'], false);
        return border(&lower, value, &values);
    }

    let values = list::space(value);
    if let Some(captures) = SIDE.captures(&lower) {
        let property = captures[1].to_string();
        let name = move |side: &str| {
            if property == "inset" {
                side.to_string()
            } else {
                format!("{property}-{side}")
            }
        };
        return Some(sides(&captures[2], value, &values, name));
    }
    if let Some(captures) = SIZE.captures(&lower) {
        let minmax = captures.get(1).map_or("", |m| m.as_str());
        let dimension = if &captures[2] == "block" { "height" } else { "width" };
        return Some(Expansion::Fixed(vec![decl(format!("{minmax}{dimension}"), value)]));
    }

    match lower.as_str() {
        "inset" => Some(inset(&values)),
        "margin" | "padding" => spacing(prop, value, &values),
        "float" | "clear" => flow_keyword(prop, trimmed, "inline-start", "inline-end"),
        "text-align" => flow_keyword(prop, trimmed, "start", "end"),
        "resize" if trimmed.eq_ignore_ascii_case("block") => {
            Some(Expansion::Fixed(vec![decl(prop, "vertical")]))
        }
        "resize" if trimmed.eq_ignore_ascii_case("inline") => {
            Some(Expansion::Fixed(vec![decl(prop, "horizontal")]))
        }
        _ => None,
    }
}

#[derive(Debug)]
pub struct Logical {
    dir: Option<Direction>,
    preserve: bool,
}

impl Logical {
    pub fn new(options: &LogicalOptions) -> Self {
        Self {
            // Keeping the logical declarations leaves the direction open.
            dir: if options.preserve { None } else { options.dir },
            preserve: options.preserve,
        }
    }

    fn build(&self, sheet: &mut Stylesheet, source: NodeId, decls: &Decls) -> Vec<NodeId> {
        decls
            .iter()
            .map(|(prop, value)| sheet.clone_declaration(source, prop, value))
            .collect()
    }

    /// A `&:dir(..)` copy of the rule enclosing `source`, holding `decls`.
    fn direction_rule(
        &self,
        sheet: &mut Stylesheet,
        source: NodeId,
        dir: Direction,
        decls: &Decls,
    ) -> NodeId {
        let rule = match sheet.closest_rule(source) {
            Some(enclosing) => sheet.shallow_clone(enclosing),
            None => sheet.create(Node::rule("").with_location(sheet.location(source))),
        };
        sheet.set_selector(rule, format!("&:dir({})", dir.as_str()));
        for child in self.build(sheet, source, decls) {
            sheet.append(rule, child);
        }
        rule
    }
}

impl Plugin for Logical {
    fn name(&self) -> &'static str {
        "logical"
    }

    fn run(&self, sheet: &mut Stylesheet, _ctx: &mut Context) -> Result<(), Error> {
        for id in sheet.declarations() {
            let node = sheet.node(id);
            let (Some(prop), Some(value)) = (node.prop(), node.value()) else {
                continue;
            };
            let Some(expansion) = expand(prop, value) else {
                continue;
            };
            tracing::trace!(prop = %prop, "Expanding logical property");

            let replacement = match (&expansion, self.dir) {
                (Expansion::Fixed(decls), _) => self.build(sheet, id, decls),
                (Expansion::Directional { ltr, .. }, Some(Direction::Ltr)) => self.build(sheet, id, ltr),
                (Expansion::Directional { rtl, .. }, Some(Direction::Rtl)) => self.build(sheet, id, rtl),
                (Expansion::Directional { ltr, rtl }, None) => vec![
                    self.direction_rule(sheet, id, Direction::Ltr, ltr),
                    self.direction_rule(sheet, id, Direction::Rtl, rtl),
                ],
            };

            if self.preserve {
                sheet.insert_all_before(id, &replacement);
            } else {
                sheet.replace_with(id, &replacement);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::emit_css;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run_with(source: &str, options: LogicalOptions) -> String {
        let mut sheet = parse(source, None).expect("parse");
        Logical::new(&options)
            .run(&mut sheet, &mut Context::default())
            .expect("transform");
        emit_css(&sheet)
    }

    fn run(source: &str) -> String {
        run_with(source, LogicalOptions::default())
    }

    fn ltr() -> LogicalOptions {
        LogicalOptions {
            dir: Some(Direction::Ltr),
            preserve: false,
        }
    }

    #[test]
    fn block_sides_do_not_depend_on_direction() {
        assert_eq!(
            run("a { margin-block: 1px 2px; padding-block-start: 3px; inset-block-end: 0 }"),
            "a {\n    margin-top: 1px;\n    margin-bottom: 2px;\n    padding-top: 3px;\n    bottom: 0;\n}\n\n"
        );
    }

    #[test]
    fn sizes_map_to_width_and_height() {
        assert_eq!(
            run("a { inline-size: 10px; max-block-size: 5px }"),
            "a {\n    width: 10px;\n    max-height: 5px;\n}\n\n"
        );
    }

    #[test]
    fn inline_sides_use_the_configured_direction() {
        assert_eq!(
            run_with("a { margin-inline-start: 1px }", ltr()),
            "a {\n    margin-left: 1px;\n}\n\n"
        );
        let rtl = LogicalOptions {
            dir: Some(Direction::Rtl),
            preserve: false,
        };
        assert_eq!(
            run_with("a { padding-inline: 1px 2px !important }", rtl),
            "a {\n    padding-right: 1px !important;\n    padding-left: 2px !important;\n}\n\n"
        );
    }

    #[test]
    fn symmetric_inline_values_need_no_direction() {
        assert_eq!(
            run("a { margin-inline: 4px }"),
            "a {\n    margin-left: 4px;\n    margin-right: 4px;\n}\n\n"
        );
    }

    #[test]
    fn unknown_direction_clones_the_rule() {
        assert_eq!(
            run(".a { color: red; text-align: start }"),
            ".a {\n    color: red;\n    &:dir(ltr) {\n        text-align: left;\n    }\n    &:dir(rtl) {\n        text-align: right;\n    }\n}\n\n"
        );
    }

    #[test]
    fn logical_shorthands() {
        assert_eq!(
            run("a { margin: logical 1px 2px 3px 4px }"),
            "a {\n    &:dir(ltr) {\n        margin: 1px 4px 3px 2px;\n    }\n    &:dir(rtl) {\n        margin: 1px 2px 3px 4px;\n    }\n}\n\n"
        );
        assert_eq!(run("a { padding: logical 1px 2px }"), "a {\n    padding: 1px 2px;\n}\n\n");
        assert_eq!(run("a { margin: 1px 2px }"), "a {\n    margin: 1px 2px;\n}\n\n");
        assert_eq!(
            run("a { inset: 1px 2px }"),
            "a {\n    top: 1px;\n    right: 2px;\n    bottom: 1px;\n    left: 2px;\n}\n\n"
        );
    }

    #[test]
    fn border_sides_keep_their_suffix() {
        assert_eq!(
            run_with("a { border-inline-end-color: red; border-block-start: 1px solid }", ltr()),
            "a {\n    border-right-color: red;\n    border-top: 1px solid;\n}\n\n"
        );
        assert_eq!(run("a { border: 1px solid }"), "a {\n    border: 1px solid;\n}\n\n");
        assert_eq!(
            run("a { border-width: logical 1px / 2px }"),
            "a {\n    border-top-width: 1px;\n    border-right-width: 2px;\n    border-bottom-width: 1px;\n    border-left-width: 2px;\n}\n\n"
        );
    }

    #[test]
    fn float_and_resize_keywords() {
        assert_eq!(
            run_with("a { float: inline-end; clear: inline-start; resize: block }", ltr()),
            "a {\n    float: right;\n    clear: left;\n    resize: vertical;\n}\n\n"
        );
    }

    #[test]
    fn preserve_keeps_the_logical_declaration() {
        let options = LogicalOptions {
            dir: Some(Direction::Ltr),
            preserve: true,
        };
        assert_eq!(
            run_with("a { margin-inline-start: 1px }", options),
            "a {\n    &:dir(ltr) {\n        margin-left: 1px;\n    }\n    &:dir(rtl) {\n        margin-right: 1px;\n    }\n    margin-inline-start: 1px;\n}\n\n"
        );
    }
}
