//! `@extend SELECTOR;` and `%placeholder` rules.

use std::collections::VecDeque;

use crate::ast::{NodeId, Stylesheet};
use crate::error::{Error, Warning};
use crate::list;
use crate::pipeline::{Context, Plugin};

pub const PLUGIN: &str = "extend";

/// How many times copied content may itself be extended.
const MAX_EXTEND_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct Extend;

impl Extend {
    pub fn new() -> Self {
        Self
    }
}

fn is_extend(sheet: &Stylesheet, id: NodeId) -> bool {
    sheet.node(id).at_rule_name().as_deref() == Some("extend")
}

/// Whether every selector of the list is a placeholder.
fn is_placeholder(selector: &str) -> bool {
    let selectors = list::selectors(selector);
    !selectors.is_empty() && selectors.iter().all(|s| s.starts_with('%'))
}

/// Rules whose selector list names `target`, except those enclosing `at`.
fn matching_rules(sheet: &Stylesheet, at: NodeId, target: &str) -> Vec<NodeId> {
    let enclosing: Vec<NodeId> = sheet.ancestors(at).collect();
    sheet
        .rules()
        .into_iter()
        .filter(|rule| !enclosing.contains(rule))
        .filter(|&rule| {
            sheet
                .node(rule)
                .selector()
                .is_some_and(|selector| list::selectors(selector).iter().any(|s| s == target))
        })
        .collect()
}

fn skip(sheet: &mut Stylesheet, ctx: &mut Context, id: NodeId, target: &str, message: String) {
    ctx.diagnostics.warn(Warning {
        plugin: PLUGIN,
        message,
        word: Some(target.to_string()),
        location: sheet.location(id),
    });
    sheet.remove(id);
}

impl Plugin for Extend {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn run(&self, sheet: &mut Stylesheet, ctx: &mut Context) -> Result<(), Error> {
        let mut queue: VecDeque<(NodeId, usize)> = sheet
            .descendants(sheet.root())
            .into_iter()
            .filter(|&id| is_extend(sheet, id))
            .map(|id| (id, 0))
            .collect();

        while let Some((id, depth)) = queue.pop_front() {
            if !sheet.in_tree(id) {
                continue;
            }
            let target = sheet.node(id).params().unwrap_or_default().trim().to_string();
            if target.is_empty() {
                skip(sheet, ctx, id, "@extend", "Expected a selector after @extend".to_string());
                continue;
            }
            if depth >= MAX_EXTEND_DEPTH {
                let message =
                    format!("Extending \"{target}\" exceeded {MAX_EXTEND_DEPTH} nested levels");
                skip(sheet, ctx, id, &target, message);
                continue;
            }

            let sources = matching_rules(sheet, id, &target);
            if sources.is_empty() {
                let message = format!("Could not find a rule matching \"{target}\" to extend");
                skip(sheet, ctx, id, &target, message);
                continue;
            }
            tracing::trace!(target = %target, rules = sources.len(), "Extending");

            let mut copies = Vec::new();
            for source in sources {
                for child in sheet.children(source) {
                    copies.push(sheet.deep_clone(child));
                }
            }
            sheet.replace_with(id, &copies);
            for &copy in &copies {
                for nested in sheet.descendants(copy) {
                    if is_extend(sheet, nested) {
                        queue.push_back((nested, depth + 1));
                    }
                }
            }
        }

        for rule in sheet.rules() {
            if sheet.node(rule).selector().is_some_and(is_placeholder) {
                sheet.remove(rule);
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

    fn run(source: &str) -> (String, Context) {
        let mut sheet = parse(source, None).expect("parse");
        let mut ctx = Context::default();
        Extend::new().run(&mut sheet, &mut ctx).expect("extend");
        (emit_css(&sheet), ctx)
    }

    #[test]
    fn copies_the_declarations_of_matching_rules() {
        let (css, ctx) = run(".a, .c { color: red }\n.b { @extend .a; margin: 0 }");
        assert_eq!(
            css,
            ".a, .c {\n    color: red;\n}\n\n.b {\n    color: red;\n    margin: 0;\n}\n\n"
        );
        assert!(ctx.diagnostics.warnings().is_empty());
    }

    #[test]
    fn placeholder_rules_are_dropped() {
        let (css, _) = run("%button { padding: 0 }\n.cta { @extend %button; }");
        assert_eq!(css, ".cta {\n    padding: 0;\n}\n\n");
    }

    #[test]
    fn unmatched_extend_is_removed_with_a_warning() {
        let (css, ctx) = run(".x { @extend .missing; color: red }");
        assert_eq!(css, ".x {\n    color: red;\n}\n\n");
        let warnings = ctx.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].plugin, "extend");
        assert_eq!(warnings[0].word.as_deref(), Some(".missing"));
    }

    #[test]
    fn extends_in_copied_content_are_followed() {
        let (css, _) = run(".leaf { @extend %mid; }\n%mid { @extend %base; }\n%base { color: red }");
        assert_eq!(css, ".leaf {\n    color: red;\n}\n\n");
    }

    #[test]
    fn mutual_extends_terminate() {
        let (css, ctx) = run(".a { @extend .b; }\n.b { @extend .a; color: red }");
        assert!(css.starts_with(".a {\n    color: red;\n}\n\n.b {\n"));
        assert!(!css.contains("@extend"));
        assert_eq!(ctx.diagnostics.warnings().len(), 1);
    }
}
