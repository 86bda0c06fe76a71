//! `@prop` / `@(prop)` references to the value of another declaration of the
//! same rule, or of the nearest ancestor that declares it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ast::{NodeId, NodeKind, Stylesheet};
use crate::config::{LogLevel, PropertyLookupOptions};
use crate::error::Error;
use crate::pipeline::{Context, Plugin};

pub const PLUGIN: &str = "property-lookup";

/// Nested references followed before giving up.
const MAX_LOOKUP_DEPTH: usize = 64;

static LOOKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(?:\(([a-z-]+)\)|([a-z-]+)\b)").expect("valid property lookup regex")
});

#[derive(Debug)]
pub struct PropertyLookup {
    log_level: LogLevel,
}

/// Declarations directly in `container` or inside its at-rules, but not
/// inside nested rules.
fn own_declarations(sheet: &Stylesheet, container: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    for child in sheet.children(container) {
        match sheet.kind(child) {
            NodeKind::Declaration { .. } => found.push(child),
            NodeKind::AtRule { .. } => found.extend(own_declarations(sheet, child)),
            _ => {}
        }
    }
    found
}

fn referenced_prop<'a>(captures: &'a Captures<'_>) -> &'a str {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map_or("", |m| m.as_str())
}

impl PropertyLookup {
    pub fn new(options: &PropertyLookupOptions) -> Self {
        Self {
            log_level: options.log_level,
        }
    }

    /// Replace every reference in `value`, looking from `container` upwards.
    fn resolve(
        &self,
        sheet: &Stylesheet,
        ctx: &mut Context,
        container: NodeId,
        value: &str,
        depth: usize,
    ) -> Result<String, Error> {
        if depth > MAX_LOOKUP_DEPTH {
            return Err(Error::RecursionLimit {
                message: format!(
                    "Resolving property references in \"{value}\" exceeded {MAX_LOOKUP_DEPTH} nested levels"
                ),
                location: sheet.location(container),
            });
        }

        let mut resolved = String::with_capacity(value.len());
        let mut last = 0;
        for captures in LOOKUP.captures_iter(value) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            resolved.push_str(&value[last..whole.start()]);
            last = whole.end();

            let prop = referenced_prop(&captures);
            match self.closest(sheet, ctx, Some(container), prop, depth)? {
                Some(found) => resolved.push_str(&found),
                None => self.report(sheet, ctx, container, whole.as_str())?,
            }
        }
        resolved.push_str(&value[last..]);
        Ok(resolved)
    }

    /// The last value of `prop` in `container`, or in its nearest ancestor
    /// declaring it.
    fn closest(
        &self,
        sheet: &Stylesheet,
        ctx: &mut Context,
        container: Option<NodeId>,
        prop: &str,
        depth: usize,
    ) -> Result<Option<String>, Error> {
        let Some(container) = container else {
            return Ok(None);
        };
        let value = own_declarations(sheet, container)
            .into_iter()
            .filter(|&decl| sheet.node(decl).prop() == Some(prop))
            .filter_map(|decl| sheet.node(decl).value().map(str::to_string))
            .last();

        match value {
            // a { color: @color }
            Some(value) if value.replacen('@', "", 1) == prop => Ok(None),
            Some(value) if !value.is_empty() => {
                if value.contains('@') {
                    self.resolve(sheet, ctx, container, &value, depth + 1).map(Some)
                } else {
                    Ok(Some(value))
                }
            }
            _ => self.closest(sheet, ctx, sheet.parent(container), prop, depth),
        }
    }

    fn report(
        &self,
        sheet: &Stylesheet,
        ctx: &mut Context,
        container: NodeId,
        reference: &str,
    ) -> Result<(), Error> {
        let node = sheet.node(container);
        let name = node.selector().or_else(|| node.params()).unwrap_or_default();
        let error = Error::PropertyLookup {
            message: format!("Unable to find property {reference} in {name}"),
            location: sheet.location(container),
        };
        match self.log_level {
            LogLevel::Warn => {
                ctx.diagnostics.warn_error(PLUGIN, &error);
                Ok(())
            }
            LogLevel::Error => Err(error),
        }
    }
}

impl Plugin for PropertyLookup {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn run(&self, sheet: &mut Stylesheet, ctx: &mut Context) -> Result<(), Error> {
        for rule in sheet.rules() {
            for decl in own_declarations(sheet, rule) {
                let Some(value) = sheet.node(decl).value().map(str::to_string) else {
                    continue;
                };
                if !value.contains('@') {
                    continue;
                }
                let resolved = self.resolve(sheet, ctx, rule, &value, 0)?;
                sheet.set_value(decl, resolved);
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

    fn run_with(source: &str, log_level: LogLevel) -> Result<(String, Context), Error> {
        let mut sheet = parse(source, None).expect("parse");
        let mut ctx = Context::default();
        PropertyLookup::new(&PropertyLookupOptions { log_level }).run(&mut sheet, &mut ctx)?;
        Ok((emit_css(&sheet), ctx))
    }

    fn run(source: &str) -> String {
        run_with(source, LogLevel::Warn).expect("lookup").0
    }

    #[test]
    fn resolves_sibling_declarations() {
        assert_eq!(
            run(".a { width: 10px; height: @width; margin: calc(@(width) * -1) }"),
            ".a {\n    width: 10px;\n    height: 10px;\n    margin: calc(10px * -1);\n}\n\n"
        );
    }

    #[test]
    fn resolves_from_ancestors_and_at_rules() {
        assert_eq!(
            run(".a { color: red; .b { background: @color } }"),
            ".a {\n    color: red;\n    .b {\n        background: red;\n    }\n}\n\n"
        );
        assert_eq!(
            run(".a { @media print { color: blue } border-color: @color }"),
            ".a {\n    @media print {\n        color: blue;\n    }\n    border-color: blue;\n}\n\n"
        );
    }

    #[test]
    fn nested_references_resolve_in_their_container() {
        assert_eq!(
            run(".a { padding: @margin; margin: @top; top: 2px }"),
            ".a {\n    padding: 2px;\n    margin: 2px;\n    top: 2px;\n}\n\n"
        );
    }

    #[test]
    fn self_references_become_empty_with_a_warning() {
        let (css, ctx) = run_with(".a { color: @color }", LogLevel::Warn).expect("lookup");
        assert_eq!(css, ".a {\n    color: ;\n}\n\n");
        let warnings = ctx.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Unable to find property @color in .a");
    }

    #[test]
    fn error_level_fails_on_unknown_properties() {
        let err = run_with(".a { color: @missing }", LogLevel::Error).unwrap_err();
        assert!(matches!(err, Error::PropertyLookup { .. }));
    }

    #[test]
    fn cycles_hit_the_depth_limit() {
        let err = run_with(".a { color: @background; background: @color }", LogLevel::Warn)
            .unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { .. }));
    }
}
