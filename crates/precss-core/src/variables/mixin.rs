use crate::ast::{NodeId, Stylesheet};
use crate::error::Error;
use crate::list;
use crate::value::{Mixin, MixinParam, Value};

use super::Walker;

fn mixin_key(name: &str) -> String {
    format!("@mixin {name}")
}

/// Split `name(args)` into the name and the raw text between the parens.
fn split_call(params: &str) -> (&str, Option<&str>) {
    match params.split_once('(') {
        Some((name, rest)) => {
            let inner = rest.trim_end();
            let inner = inner.strip_suffix(')').unwrap_or(inner).trim();
            (name.trim(), (!inner.is_empty()).then_some(inner))
        }
        None => (params.trim(), None),
    }
}

fn parse_params(raw: Option<&str>) -> Vec<MixinParam> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    list::comma(raw)
        .into_iter()
        .filter(|param| !param.is_empty())
        .map(|param| {
            let parts = list::split(&param, &[':'], false);
            let name = parts
                .first()
                .map(|name| name.trim_start_matches('$').to_string())
                .unwrap_or_default();
            let default = (parts.len() > 1).then(|| parts[1..].join(":"));
            MixinParam { name, default }
        })
        .collect()
}

impl Walker<'_> {
    /// `@mixin NAME[(PARAMS)]` registers the mixin on the parent scope.
    pub(super) fn transform_mixin(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let (name, raw_params) = split_call(params);
        let mixin = Mixin {
            params: parse_params(raw_params),
            rule: id,
        };
        if let Some(parent) = sheet.parent(id) {
            self.plugin
                .scope
                .set(sheet, parent, &mixin_key(name), Value::Mixin(mixin));
        }
        sheet.remove(id);
        Ok(false)
    }

    /// `@include NAME[(ARGS)]` expands a copy of the mixin body in place.
    pub(super) fn transform_include(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let (name, raw_args) = split_call(params);
        let found = self
            .plugin
            .scope
            .get(sheet, &mixin_key(name), sheet.parent(id));
        let Some(Value::Mixin(mixin)) = found else {
            self.unresolved(Error::UnresolvedReference {
                message: format!("Could not resolve the mixin for \"{name}\""),
                word: name.to_string(),
                location: sheet.location(id),
            })?;
            return Ok(true);
        };

        let args = raw_args.map(list::comma).unwrap_or_default();
        for (index, param) in mixin.params.iter().enumerate() {
            let value = match args.get(index) {
                Some(arg) => Some(self.interpolate(sheet, id, arg)?),
                None => param.default.clone(),
            };
            if let Some(value) = value {
                self.plugin.scope.set(sheet, id, &param.name, Value::Scalar(value));
            }
        }

        self.enter_expansion(sheet, id, &format!("the mixin \"{name}\""))?;
        let clone = sheet.deep_clone(mixin.rule);
        let variables = sheet.node(id).variables.clone();
        let node = sheet.node_mut(clone);
        node.original = Some(id);
        node.variables = variables;
        let result = self.expand_clone(sheet, id, clone);
        self.leave_expansion();
        result?;

        sheet.remove(id);
        Ok(false)
    }

    /// `@content` expands the content block of the `@include` that produced
    /// the enclosing mixin body.
    pub(super) fn transform_content(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
    ) -> Result<bool, Error> {
        let invocation = sheet
            .ancestors(id)
            .skip(1)
            .find(|&ancestor| sheet.node(ancestor).at_rule_name().as_deref() == Some("mixin"))
            .and_then(|mixin| sheet.node(mixin).original);
        let Some(include) = invocation else {
            self.unresolved(Error::UnresolvedReference {
                message: "Could not resolve the mixin for @content".to_string(),
                word: "@content".to_string(),
                location: sheet.location(id),
            })?;
            return Ok(true);
        };

        self.enter_expansion(sheet, id, "@content")?;
        let clone = sheet.deep_clone(include);
        let variables = sheet.node(id).variables.clone();
        sheet.node_mut(clone).variables = variables;
        let result = self.expand_clone(sheet, id, clone);
        self.leave_expansion();
        result?;

        sheet.remove(id);
        Ok(false)
    }
}
