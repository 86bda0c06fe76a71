use crate::ast::{NodeId, NodeKind, Stylesheet};

const INDENT: &str = "    ";

pub fn emit_css(stylesheet: &Stylesheet) -> String {
    let mut out = String::new();

    for node in stylesheet.children(stylesheet.root()) {
        emit_node(stylesheet, node, 0, &mut out);
        out.push('\n');
    }
    out
}

fn emit_node(stylesheet: &Stylesheet, id: NodeId, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    match stylesheet.kind(id) {
        NodeKind::Root => emit_children(stylesheet, id, depth, out),
        NodeKind::Rule { selector } => {
            out.push_str(&indent);
            out.push_str(selector);
            emit_block(stylesheet, id, depth, out);
        }
        NodeKind::AtRule {
            name,
            params,
            block,
        } => {
            out.push_str(&indent);
            out.push('@');
            out.push_str(name);
            if !params.is_empty() {
                out.push(' ');
                out.push_str(params);
            }
            if *block || stylesheet.has_children(id) {
                emit_block(stylesheet, id, depth, out);
            } else {
                out.push_str(";\n");
            }
        }
        NodeKind::Declaration {
            prop,
            value,
            important,
        } => emit_declaration(prop, value, *important, &indent, out),
        NodeKind::Comment { text } => {
            out.push_str(&indent);
            out.push_str("/*");
            out.push_str(text);
            out.push_str("*/\n");
        }
    }
}

fn emit_block(stylesheet: &Stylesheet, id: NodeId, depth: usize, out: &mut String) {
    out.push_str(" {\n");
    emit_children(stylesheet, id, depth + 1, out);
    out.push_str(&INDENT.repeat(depth));
    out.push_str("}\n");
}

fn emit_children(stylesheet: &Stylesheet, id: NodeId, depth: usize, out: &mut String) {
    for child in stylesheet.children(id) {
        emit_node(stylesheet, child, depth, out);
    }
}

fn emit_declaration(prop: &str, value: &str, important: bool, indent: &str, out: &mut String) {
    out.push_str(indent);
    out.push_str(prop);
    out.push_str(": ");
    out.push_str(value);
    if important {
        out.push_str(" !important");
    }
    out.push_str(";\n");
}
