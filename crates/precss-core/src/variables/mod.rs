//! Sass-like variables and control flow.
//!
//! The walker visits children in document order, one at a time, over a
//! snapshot of each child list. A child is fully transformed (including any
//! imports or expansions it triggers) before its next sibling is visited, so
//! later siblings observe variables set by earlier ones.

mod control;
mod import;
mod mixin;

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{NodeId, NodeKind, Stylesheet};
use crate::config::{Disabled, Feature, Options, Unresolved};
use crate::error::Error;
use crate::interpolate::{self, interpolate};
use crate::loader::{ImportFilter, ImportResolver, SassImportResolver};
use crate::pipeline::{Context, Plugin};
use crate::scope::Scope;
use crate::value::Value;

/// Nested `@include`/`@content` expansions allowed before giving up.
const MAX_EXPANSION_DEPTH: usize = 64;

static VARIABLE_PROP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[\w-]+$").expect("valid variable prop regex"));

#[derive(Debug)]
pub struct AdvancedVariables {
    scope: Scope,
    unresolved: Unresolved,
    disabled: Disabled,
    import_paths: Vec<PathBuf>,
    import_root: PathBuf,
    import_filter: ImportFilter,
    resolver: Arc<dyn ImportResolver>,
}

impl AdvancedVariables {
    pub fn new(options: &Options) -> Self {
        let resolver = options
            .resolver
            .clone()
            .unwrap_or_else(|| Arc::new(SassImportResolver::default()));
        let import_root = options
            .import_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        Self {
            scope: Scope::new(options.variables.clone()),
            unresolved: options.unresolved,
            disabled: options.disable.clone(),
            import_paths: options.import_paths.clone(),
            import_root,
            import_filter: options.import_filter.clone(),
            resolver,
        }
    }

    fn enabled(&self, feature: Feature) -> bool {
        !self.disabled.contains(feature)
    }
}

impl Plugin for AdvancedVariables {
    fn name(&self) -> &'static str {
        interpolate::PLUGIN
    }

    fn run(&self, sheet: &mut Stylesheet, ctx: &mut Context) -> Result<(), Error> {
        let import_stack = ctx
            .from
            .iter()
            .map(|file| file.canonicalize().unwrap_or_else(|_| file.clone()))
            .collect();
        let mut walker = Walker {
            plugin: self,
            ctx,
            import_stack,
            depth: 0,
        };
        let root = sheet.root();
        walker.transform_children(sheet, root)
    }
}

/// Per-run state of the transform.
struct Walker<'a> {
    plugin: &'a AdvancedVariables,
    ctx: &'a mut Context,
    /// Canonical paths of the files currently being imported.
    import_stack: Vec<PathBuf>,
    depth: usize,
}

impl Walker<'_> {
    fn transform_children(&mut self, sheet: &mut Stylesheet, parent: NodeId) -> Result<(), Error> {
        let children = sheet.children(parent);
        self.transform_nodes(sheet, parent, children)
    }

    /// Transform `nodes`, skipping any that an earlier sibling moved away
    /// from `parent`.
    fn transform_nodes(
        &mut self,
        sheet: &mut Stylesheet,
        parent: NodeId,
        nodes: Vec<NodeId>,
    ) -> Result<(), Error> {
        for child in nodes {
            if sheet.parent(child) != Some(parent) {
                continue;
            }
            let descend = self.transform_node(sheet, child)?;
            if descend && sheet.is_attached(child) {
                self.transform_children(sheet, child)?;
            }
        }
        Ok(())
    }

    /// Transform one node. Returns whether its children should be walked.
    fn transform_node(&mut self, sheet: &mut Stylesheet, id: NodeId) -> Result<bool, Error> {
        match sheet.kind(id).clone() {
            NodeKind::AtRule { name, params, .. } => {
                let name = name.to_ascii_lowercase();
                let feature = Feature::from_at_rule(&format!("@{name}"));
                // A disabled `@if` still decides whether its `@else` is kept.
                if let Some(feature) = feature.filter(|&f| f != Feature::If) {
                    if !self.plugin.enabled(feature) {
                        return Ok(false);
                    }
                }
                match feature {
                    Some(Feature::Content) => self.transform_content(sheet, id),
                    Some(Feature::Each) => self.transform_each(sheet, id, &params),
                    Some(Feature::If) => self.transform_if(sheet, id, &params),
                    Some(Feature::Import) => self.transform_import(sheet, id, &params),
                    Some(Feature::Include) => self.transform_include(sheet, id, &params),
                    Some(Feature::For) => self.transform_for(sheet, id, &params),
                    Some(Feature::Mixin) => self.transform_mixin(sheet, id, &params),
                    Some(Feature::Else) | None => {
                        let params = self.interpolate(sheet, id, &params)?;
                        sheet.set_params(id, params);
                        Ok(true)
                    }
                }
            }
            NodeKind::Rule { selector } => {
                let selector = self.interpolate(sheet, id, &selector)?;
                sheet.set_selector(id, selector);
                Ok(true)
            }
            NodeKind::Declaration { prop, value, .. } => {
                let value = self.interpolate(sheet, id, &value)?;
                if VARIABLE_PROP.is_match(&prop) {
                    if let Some(parent) = sheet.parent(id) {
                        self.plugin
                            .scope
                            .set(sheet, parent, &prop[1..], Value::Scalar(value));
                    }
                    sheet.remove(id);
                } else {
                    sheet.set_value(id, value);
                }
                Ok(false)
            }
            NodeKind::Root | NodeKind::Comment { .. } => Ok(true),
        }
    }

    fn interpolate(&mut self, sheet: &Stylesheet, id: NodeId, text: &str) -> Result<String, Error> {
        interpolate(
            sheet,
            &self.plugin.scope,
            id,
            text,
            self.plugin.unresolved,
            &mut self.ctx.diagnostics,
        )
    }

    fn unresolved(&mut self, error: Error) -> Result<(), Error> {
        self.plugin
            .unresolved
            .handle(&mut self.ctx.diagnostics, interpolate::PLUGIN, error)
    }

    /// Temporarily place `clone` in front of `construct` so that it shares
    /// the construct's lexical parent, transform its children, then splice
    /// them in front of the construct and drop the clone.
    fn expand_clone(
        &mut self,
        sheet: &mut Stylesheet,
        construct: NodeId,
        clone: NodeId,
    ) -> Result<(), Error> {
        sheet.insert_before(construct, clone);
        self.transform_children(sheet, clone)?;
        sheet.move_children_before(clone, construct);
        sheet.remove(clone);
        Ok(())
    }

    /// Transform the children of `node` in place and splice them in front of
    /// it.
    fn expand_in_place(&mut self, sheet: &mut Stylesheet, node: NodeId) -> Result<(), Error> {
        self.transform_children(sheet, node)?;
        sheet.move_children_before(node, node);
        Ok(())
    }

    fn enter_expansion(&mut self, sheet: &Stylesheet, id: NodeId, what: &str) -> Result<(), Error> {
        if self.depth >= MAX_EXPANSION_DEPTH {
            return Err(Error::RecursionLimit {
                message: format!(
                    "Expanding {what} exceeded {MAX_EXPANSION_DEPTH} nested levels"
                ),
                location: sheet.location(id),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_expansion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::emit_css;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    pub(super) fn run_with(source: &str, options: &Options) -> Result<(String, Context), Error> {
        let mut sheet = parse(source, None)?;
        let mut ctx = Context::default();
        AdvancedVariables::new(options).run(&mut sheet, &mut ctx)?;
        Ok((emit_css(&sheet), ctx))
    }

    pub(super) fn run(source: &str) -> String {
        run_with(source, &Options::default())
            .expect("transform")
            .0
    }

    #[test]
    fn variables_are_replaced_and_removed() {
        assert_eq!(
            run("$color: red;\na { color: $color; }"),
            "a {\n    color: red;\n}\n\n"
        );
    }

    #[test]
    fn declaration_cannot_see_its_own_binding() {
        let options = Options {
            unresolved: Unresolved::Ignore,
            ..Options::default()
        };
        let (css, _) = run_with("a { $x: $x; b: $x }", &options).expect("transform");
        assert_eq!(css, "a {\n    b: $x;\n}\n\n");
    }

    #[test]
    fn nested_scopes_shadow_outer_bindings() {
        let css = run("$x: 1;\na { $x: 2; b: $x }\nc { d: $x }");
        assert_eq!(css, "a {\n    b: 2;\n}\n\nc {\n    d: 1;\n}\n\n");
    }

    #[test]
    fn selectors_and_params_are_interpolated() {
        let css = run("$name: icon;\n$bp: 600px;\n.#{$name} { a: b }\n@media (min-width: $bp) { c { d: e } }");
        assert_eq!(
            css,
            ".icon {\n    a: b;\n}\n\n@media (min-width: 600px) {\n    c {\n        d: e;\n    }\n}\n\n"
        );
    }

    #[test]
    fn unresolved_variables_throw_by_default() {
        let err = run_with("a { b: $missing }", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(err.word(), Some("missing"));
    }

    #[test]
    fn unresolved_variables_warn_and_keep_text() {
        let options = Options {
            unresolved: Unresolved::Warn,
            ..Options::default()
        };
        let (css, ctx) = run_with("a { b: $missing }", &options).expect("transform");
        assert_eq!(css, "a {\n    b: $missing;\n}\n\n");
        assert_eq!(ctx.diagnostics.warnings().len(), 1);
    }

    #[test]
    fn host_variables_fill_gaps() {
        let options = Options::default().with_variables(
            [("brand".to_string(), Value::scalar("teal"))]
                .into_iter()
                .collect(),
        );
        let (css, _) = run_with("a { color: $brand }", &options).expect("transform");
        assert_eq!(css, "a {\n    color: teal;\n}\n\n");
    }
}
