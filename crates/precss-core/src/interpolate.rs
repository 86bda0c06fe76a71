//! Variable interpolation in selectors, params and values.
//!
//! Recognizes `$name`, `$(name)` and `#{$name}`. A reference preceded by a
//! backslash is kept literally with the backslash removed.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ast::{NodeId, Stylesheet};
use crate::config::Unresolved;
use crate::error::{Diagnostics, Error};
use crate::scope::Scope;

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.?)(?:\$([A-Za-z_][\w-]*)|\$\(([A-Za-z_][\w-]*)\)|#\{\$([A-Za-z_][\w-]*)\})")
        .expect("valid variable regex")
});

pub const PLUGIN: &str = "advanced-variables";

/// Replace every variable reference in `text`, resolving from the parent of
/// `node` so that a declaration never sees the variable it defines.
pub fn interpolate(
    sheet: &Stylesheet,
    scope: &Scope,
    node: NodeId,
    text: &str,
    policy: Unresolved,
    diagnostics: &mut Diagnostics,
) -> Result<String, Error> {
    if !text.contains('$') {
        return Ok(text.to_string());
    }

    let from = sheet.parent(node);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in VARIABLE.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&text[last..whole.start]);
        last = whole.end;

        let before = &caps[1];
        if before == "\\" {
            out.push_str(&text[whole.start + 1..whole.end]);
            continue;
        }

        let name = reference_name(&caps);
        match scope.get(sheet, name, from) {
            Some(value) => {
                out.push_str(before);
                out.push_str(&value.to_string());
            }
            None => {
                let error = Error::UnresolvedReference {
                    message: format!("Could not resolve the variable \"${name}\" within \"{text}\""),
                    word: name.to_string(),
                    location: sheet.location(node),
                };
                policy.handle(diagnostics, PLUGIN, error)?;
                out.push_str(&text[whole]);
            }
        }
    }

    out.push_str(&text[last..]);
    Ok(out)
}

fn reference_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::value::Value;

    fn setup() -> (Stylesheet, Scope, NodeId) {
        let mut sheet = Stylesheet::new();
        let rule = sheet.create(Node::rule("a"));
        let decl = sheet.create(Node::declaration("width", ""));
        sheet.append(sheet.root(), rule);
        sheet.append(rule, decl);
        let scope = Scope::default();
        let root = sheet.root();
        scope.set(&mut sheet, root, "size", "10px".into());
        scope.set(
            &mut sheet,
            root,
            "pair",
            Value::List(vec!["a".into(), "b".into()]),
        );
        (sheet, scope, decl)
    }

    fn run(text: &str, policy: Unresolved) -> Result<(String, Diagnostics), Error> {
        let (sheet, scope, decl) = setup();
        let mut diagnostics = Diagnostics::new();
        let out = interpolate(&sheet, &scope, decl, text, policy, &mut diagnostics)?;
        Ok((out, diagnostics))
    }

    #[test]
    fn replaces_all_reference_forms() {
        let (out, _) = run("$size $(size) #{$size}-x", Unresolved::Throw).expect("interpolate");
        assert_eq!(out, "10px 10px 10px-x");
    }

    #[test]
    fn escaped_references_are_kept_without_backslash() {
        let (out, _) = run(r"calc(\$size + $size)", Unresolved::Throw).expect("interpolate");
        assert_eq!(out, "calc($size + 10px)");
    }

    #[test]
    fn lists_are_stringified() {
        let (out, _) = run("$pair", Unresolved::Throw).expect("interpolate");
        assert_eq!(out, "(a,b)");
    }

    #[test]
    fn unresolved_reference_policy() {
        let err = run("$nope", Unresolved::Throw).unwrap_err();
        assert_eq!(err.word(), Some("nope"));

        let (out, diagnostics) = run("a $nope b", Unresolved::Warn).expect("warn");
        assert_eq!(out, "a $nope b");
        assert_eq!(diagnostics.warnings().len(), 1);

        let (out, diagnostics) = run("$nope", Unresolved::Ignore).expect("ignore");
        assert_eq!(out, "$nope");
        assert!(diagnostics.warnings().is_empty());
    }
}
