//! Flattening of nested rules.
//!
//! Rules are visited in document order, parents before children. A parent
//! moves its nested rules out right after itself with combined selectors;
//! when a nested rule is visited later, its selector is already final.

use crate::ast::{NodeId, NodeKind, Stylesheet};
use crate::error::Error;
use crate::list;
use crate::pipeline::{Context, Plugin};

/// At-rules that move out of a rule, taking a copy of the rule with them.
const BUBBLE: &[&str] = &["media", "supports", "document"];

#[derive(Debug, Default)]
pub struct Nesting;

impl Nesting {
    pub fn new() -> Self {
        Self
    }
}

/// Combine every parent selector with every child selector. `&` stands for
/// the parent; without one the child becomes a descendant.
pub fn combine_selectors(parent: &str, child: &str) -> String {
    let parent_terms = list::selectors(parent);
    let child_terms = list::selectors(child);
    let mut results = Vec::new();

    for parent in &parent_terms {
        for child in &child_terms {
            if child.contains('&') {
                results.push(child.replace('&', parent));
            } else {
                results.push(format!("{parent} {child}"));
            }
        }
    }

    results.join(", ")
}

fn bubbles(sheet: &Stylesheet, id: NodeId) -> bool {
    sheet
        .node(id)
        .at_rule_name()
        .is_some_and(|name| BUBBLE.contains(&name.as_str()))
}

/// Copy of `rule` holding `nodes`, placed after `after`.
fn split_off(sheet: &mut Stylesheet, rule: NodeId, nodes: &mut Vec<NodeId>, after: NodeId) -> NodeId {
    let copy = sheet.shallow_clone(rule);
    for node in nodes.drain(..) {
        sheet.append(copy, node);
    }
    sheet.insert_after(after, copy);
    copy
}

/// Prepare a bubbling at-rule: combine the selectors of its rules with
/// `selector` and wrap its loose declarations in a copy of `rule`.
fn wrap_at_rule(sheet: &mut Stylesheet, rule: NodeId, selector: &str, at_rule: NodeId) {
    let mut loose = Vec::new();
    for child in sheet.children(at_rule) {
        match sheet.kind(child) {
            NodeKind::Declaration { .. } | NodeKind::Comment { .. } => loose.push(child),
            NodeKind::Rule { selector: own } => {
                let combined = combine_selectors(selector, own);
                sheet.set_selector(child, combined);
            }
            NodeKind::AtRule { .. } if bubbles(sheet, child) => {
                wrap_at_rule(sheet, rule, selector, child);
            }
            NodeKind::AtRule { .. } => loose.push(child),
            NodeKind::Root => {}
        }
    }
    if loose.is_empty() {
        return;
    }
    let copy = sheet.shallow_clone(rule);
    for node in loose {
        sheet.append(copy, node);
    }
    match sheet.children(at_rule).first() {
        Some(&first) => sheet.insert_before(first, copy),
        None => sheet.append(at_rule, copy),
    }
}

fn flatten(sheet: &mut Stylesheet, rule: NodeId) {
    let Some(selector) = sheet.node(rule).selector().map(str::to_string) else {
        return;
    };
    let mut after = rule;
    let mut unwrapped = false;
    // Declarations that follow a nested rule, waiting for their own copy.
    let mut trailing = Vec::new();

    for child in sheet.children(rule) {
        match sheet.kind(child) {
            NodeKind::Rule { selector: own } => {
                let combined = combine_selectors(&selector, own);
                if !trailing.is_empty() {
                    after = split_off(sheet, rule, &mut trailing, after);
                }
                sheet.set_selector(child, combined);
                sheet.insert_after(after, child);
                after = child;
                unwrapped = true;
            }
            NodeKind::AtRule { .. } if bubbles(sheet, child) => {
                if !trailing.is_empty() {
                    after = split_off(sheet, rule, &mut trailing, after);
                }
                wrap_at_rule(sheet, rule, &selector, child);
                sheet.insert_after(after, child);
                after = child;
                unwrapped = true;
            }
            _ if unwrapped => trailing.push(child),
            _ => {}
        }
    }
    if !trailing.is_empty() {
        split_off(sheet, rule, &mut trailing, after);
    }
    if unwrapped && !sheet.has_children(rule) {
        sheet.remove(rule);
    }
}

impl Plugin for Nesting {
    fn name(&self) -> &'static str {
        "nesting"
    }

    fn run(&self, sheet: &mut Stylesheet, _ctx: &mut Context) -> Result<(), Error> {
        for rule in sheet.rules() {
            if sheet.in_tree(rule) {
                flatten(sheet, rule);
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

    fn run(source: &str) -> String {
        let mut sheet = parse(source, None).expect("parse");
        Nesting::new()
            .run(&mut sheet, &mut Context::default())
            .expect("nesting");
        emit_css(&sheet)
    }

    #[test]
    fn test_combine_selectors() {
        assert_eq!(combine_selectors(".a, .b", "span"), ".a span, .b span");
        assert_eq!(combine_selectors(".a", "&:hover, & + &"), ".a:hover, .a + .a");
        assert_eq!(combine_selectors(".a", "&:dir(rtl)"), ".a:dir(rtl)");
    }

    #[test]
    fn flattens_in_document_order() {
        assert_eq!(
            run(".a { color: red; .b { .c { margin: 0 } } &:hover { color: blue } }"),
            ".a {\n    color: red;\n}\n\n.a .b .c {\n    margin: 0;\n}\n\n.a:hover {\n    color: blue;\n}\n\n"
        );
    }

    #[test]
    fn declarations_after_a_nested_rule_keep_their_place() {
        assert_eq!(
            run(".a { color: red; span { margin: 0 } padding: 0 }"),
            ".a {\n    color: red;\n}\n\n.a span {\n    margin: 0;\n}\n\n.a {\n    padding: 0;\n}\n\n"
        );
    }

    #[test]
    fn media_bubbles_out_of_rules() {
        assert_eq!(
            run(".a { color: red; @media print { color: black; .b { margin: 0 } } }"),
            ".a {\n    color: red;\n}\n\n@media print {\n    .a {\n        color: black;\n    }\n    .a .b {\n        margin: 0;\n    }\n}\n\n"
        );
    }

    #[test]
    fn other_at_rules_stay_inside() {
        assert_eq!(
            run(".a { @font-feature-values x { } }"),
            ".a {\n    @font-feature-values x {\n    }\n}\n\n"
        );
    }
}
