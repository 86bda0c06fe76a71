//! `@at-root [SELECTOR] { ... }`.

use std::collections::HashMap;

use crate::ast::{Node, NodeId, Stylesheet};
use crate::error::Error;
use crate::pipeline::{Context, Plugin};

#[derive(Debug, Default)]
pub struct AtRoot;

impl AtRoot {
    pub fn new() -> Self {
        Self
    }
}

/// The ancestor of `id` that sits directly under the stylesheet root.
fn top_level(sheet: &Stylesheet, id: NodeId) -> Option<NodeId> {
    let root = sheet.root();
    sheet
        .ancestors(id)
        .find(|&ancestor| sheet.parent(ancestor) == Some(root))
}

impl Plugin for AtRoot {
    fn name(&self) -> &'static str {
        "at-root"
    }

    fn run(&self, sheet: &mut Stylesheet, _ctx: &mut Context) -> Result<(), Error> {
        let at_roots: Vec<NodeId> = sheet
            .descendants(sheet.root())
            .into_iter()
            .filter(|&id| sheet.node(id).at_rule_name().as_deref() == Some("at-root"))
            .collect();

        // Last node moved after each top-level ancestor, so that several
        // `@at-root` blocks keep their document order.
        let mut anchors: HashMap<NodeId, NodeId> = HashMap::new();

        for id in at_roots {
            if !sheet.in_tree(id) {
                continue;
            }
            let selector = sheet.node(id).params().unwrap_or_default().trim().to_string();
            let content = if selector.is_empty() {
                sheet.children(id)
            } else {
                let rule = sheet.create(Node::rule(selector).with_location(sheet.location(id)));
                for child in sheet.children(id) {
                    sheet.append(rule, child);
                }
                vec![rule]
            };

            let Some(top) = top_level(sheet, id) else {
                continue;
            };
            if top == id {
                sheet.replace_with(id, &content);
                continue;
            }

            let mut anchor = anchors.get(&top).copied().unwrap_or(top);
            for node in content {
                sheet.insert_after(anchor, node);
                anchor = node;
            }
            anchors.insert(top, anchor);
            sheet.remove(id);
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
        AtRoot::new()
            .run(&mut sheet, &mut Context::default())
            .expect("at-root");
        emit_css(&sheet)
    }

    #[test]
    fn moves_content_after_the_top_level_rule() {
        assert_eq!(
            run(".a { color: red; .b { @at-root { .c { margin: 0 } } } }\n.z { color: blue }"),
            ".a {\n    color: red;\n    .b {\n    }\n}\n\n.c {\n    margin: 0;\n}\n\n.z {\n    color: blue;\n}\n\n"
        );
    }

    #[test]
    fn selector_wraps_the_content() {
        assert_eq!(
            run(".a { @at-root .b { color: red } @at-root .c { color: blue } }"),
            ".a {\n}\n\n.b {\n    color: red;\n}\n\n.c {\n    color: blue;\n}\n\n"
        );
    }

    #[test]
    fn top_level_at_root_is_unwrapped() {
        assert_eq!(
            run("@at-root { .a { color: red } }"),
            ".a {\n    color: red;\n}\n\n"
        );
    }
}
