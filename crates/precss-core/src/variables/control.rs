use std::cmp::Ordering;

use crate::ast::{NodeId, Stylesheet};
use crate::config::Feature;
use crate::error::Error;
use crate::list;
use crate::value::Value;

use super::Walker;

/// An `@if` operand after coercion.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Operand {
    fn coerce(text: &str) -> Self {
        match text {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => parse_number(text).map_or_else(|| Self::Text(text.to_string()), Self::Number),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Self::Bool(flag) => *flag,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(text) => !text.is_empty(),
        }
    }

    fn as_number(&self) -> f64 {
        match self {
            Self::Bool(flag) => f64::from(u8::from(*flag)),
            Self::Number(n) => *n,
            Self::Text(text) => parse_number(text).unwrap_or(f64::NAN),
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => self.as_number().partial_cmp(&other.as_number()),
        }
    }
}

/// Numeric coercion: blank text is zero, anything with stray characters is
/// not a number.
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn evaluate(left: &Operand, operator: Option<&str>, right: &Operand) -> bool {
    match operator {
        None => left.truthy(),
        Some("==") => left == right,
        Some("!=") => left != right,
        Some("<") => left.compare(right) == Some(Ordering::Less),
        Some("<=") => matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal)),
        Some(">") => left.compare(right) == Some(Ordering::Greater),
        Some(">=") => matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Some(_) => false,
    }
}

impl Walker<'_> {
    fn condition(&mut self, sheet: &Stylesheet, id: NodeId, params: &str) -> Result<bool, Error> {
        let parts = list::space(params);
        let left = self.interpolate(sheet, id, parts.first().map_or("", String::as_str))?;
        let right = self.interpolate(sheet, id, parts.get(2).map_or("", String::as_str))?;
        Ok(evaluate(
            &Operand::coerce(&left),
            parts.get(1).map(String::as_str),
            &Operand::coerce(&right),
        ))
    }

    /// `@if` followed by any number of `@else if` and an optional `@else`.
    /// Exactly one branch body is kept. A disabled `@if` stays as written,
    /// but its condition still selects or drops the `@else` branches.
    pub(super) fn transform_if(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let mut taken = self.condition(sheet, id, params)?;
        let mut next = sheet.next_sibling(id);

        if self.plugin.enabled(Feature::If) {
            if taken {
                self.expand_in_place(sheet, id)?;
            }
            sheet.remove(id);
        }

        if !self.plugin.enabled(Feature::Else) {
            return Ok(false);
        }

        while let Some(branch) = next.filter(|&n| sheet.node(n).at_rule_name().as_deref() == Some("else")) {
            next = sheet.next_sibling(branch);
            let branch_params = sheet.node(branch).params().unwrap_or_default().to_string();
            let chained = branch_params
                .strip_prefix("if")
                .filter(|rest| rest.starts_with(char::is_whitespace))
                .map(str::trim);

            let matches = match chained {
                Some(condition) if !taken => self.condition(sheet, branch, condition)?,
                Some(_) => false,
                None => !taken,
            };
            if matches {
                self.expand_in_place(sheet, branch)?;
                taken = true;
            }
            sheet.remove(branch);

            if chained.is_none() {
                break;
            }
        }
        Ok(false)
    }

    /// `@each $value [$key] in LIST`.
    pub(super) fn transform_each(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let (names, source) = params.split_once(" in ").unwrap_or((params, ""));
        let mut names = names.split_whitespace().map(|name| name.trim_start_matches('$'));
        let value_name = names.next().unwrap_or_default().to_string();
        let key_name = names.next().map(str::to_string);

        let source = self.interpolate(sheet, id, source.trim())?;
        let entries = Value::parse(&source).entries();
        tracing::trace!(variable = %value_name, count = entries.len(), "Expanding @each");

        for (key, value) in entries {
            self.plugin.scope.set(sheet, id, &value_name, value);
            if let Some(key_name) = &key_name {
                self.plugin.scope.set(sheet, id, key_name, Value::Scalar(key));
            }
            let clone = sheet.deep_clone(id);
            self.expand_clone(sheet, id, clone)?;
        }

        sheet.remove(id);
        Ok(false)
    }

    /// `@for $i from START through|to END [by STEP]`, inclusive in both
    /// directions.
    pub(super) fn transform_for(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let parts = list::space(params);
        let name = parts
            .first()
            .map(|name| name.trim_start_matches('$').to_string())
            .unwrap_or_default();
        let start = self.numeric_param(sheet, id, parts.get(2))?;
        let end = self.numeric_param(sheet, id, parts.get(4))?;
        let step = match parts.get(6) {
            Some(_) => self.numeric_param(sheet, id, parts.get(6))?,
            None => 1.0,
        };
        let step = if step == 0.0 || step.is_nan() {
            1.0
        } else {
            step.abs()
        };
        let direction = if start <= end { 1.0 } else { -1.0 };

        let mut counter = start;
        while counter * direction <= end * direction {
            self.plugin.scope.set(sheet, id, &name, Value::number(counter));
            let clone = sheet.deep_clone(id);
            self.expand_clone(sheet, id, clone)?;
            counter += step * direction;
        }

        sheet.remove(id);
        Ok(false)
    }

    fn numeric_param(
        &mut self,
        sheet: &Stylesheet,
        id: NodeId,
        param: Option<&String>,
    ) -> Result<f64, Error> {
        let Some(param) = param else {
            return Ok(f64::NAN);
        };
        let text = self.interpolate(sheet, id, param)?;
        Ok(parse_number(&text).unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{run, run_with};
    use super::*;
    use crate::config::{Disabled, Options};
    use pretty_assertions::assert_eq;

    #[test]
    fn if_keeps_only_the_true_branch() {
        assert_eq!(
            run("@if 1 == 1 { a { color: red; } } @else { a { color: blue; } }"),
            "a {\n    color: red;\n}\n\n"
        );
        assert_eq!(
            run("@if 1 == 2 { a { color: red; } } @else { a { color: blue; } }"),
            "a {\n    color: blue;\n}\n\n"
        );
    }

    #[test]
    fn if_compares_interpolated_operands() {
        let css = run("$size: 12;\n@if $size > 10 { big { a: b } }\n@if $size <= 10 { small { a: b } }");
        assert_eq!(css, "big {\n    a: b;\n}\n\n");
    }

    #[test]
    fn if_without_operator_tests_truthiness() {
        assert_eq!(run("@if false { a { b: c } }"), "");
        assert_eq!(run("@if 0 { a { b: c } }"), "");
        assert_eq!(run("@if yes { a { b: c } }"), "a {\n    b: c;\n}\n\n");
    }

    #[test]
    fn else_if_chains_pick_the_first_match() {
        let css = run(
            "$x: 2;\n@if $x == 1 { a { n: one } } @else if $x == 2 { a { n: two } } @else { a { n: other } }\nz { y: w }",
        );
        assert_eq!(css, "a {\n    n: two;\n}\n\nz {\n    y: w;\n}\n\n");
    }

    #[test]
    fn operand_coercion_is_strict_for_equality() {
        assert!(evaluate(&Operand::coerce("1"), Some("=="), &Operand::coerce("1.0")));
        assert!(!evaluate(&Operand::coerce("true"), Some("=="), &Operand::coerce("1")));
        assert!(evaluate(&Operand::coerce("a"), Some("<"), &Operand::coerce("b")));
        assert!(!evaluate(&Operand::coerce("a"), Some("<"), &Operand::coerce("1")));
    }

    #[test]
    fn for_counts_up_down_and_by_step() {
        assert_eq!(
            run("@for $i from 1 through 3 { .m-$i { margin: $(i)px } }"),
            ".m-1 {\n    margin: 1px;\n}\n\n.m-2 {\n    margin: 2px;\n}\n\n.m-3 {\n    margin: 3px;\n}\n\n"
        );
        assert_eq!(
            run("@for $i from 3 through 1 { i { n: $i } }"),
            "i {\n    n: 3;\n}\n\ni {\n    n: 2;\n}\n\ni {\n    n: 1;\n}\n\n"
        );
        assert_eq!(
            run("@for $i from 1 through 5 by 2 { i { n: $i } }"),
            "i {\n    n: 1;\n}\n\ni {\n    n: 3;\n}\n\ni {\n    n: 5;\n}\n\n"
        );
    }

    #[test]
    fn for_with_non_numeric_bounds_does_nothing() {
        assert_eq!(run("@for $i from a through 3 { i { n: $i } }"), "");
    }

    #[test]
    fn each_over_scalar_runs_once() {
        assert_eq!(
            run("@each $c in red { .t-$c { color: $c } }"),
            ".t-red {\n    color: red;\n}\n\n"
        );
    }

    #[test]
    fn each_binds_value_and_index_or_key() {
        assert_eq!(
            run("@each $c $i in (red, blue) { .c-$i { color: $c } }"),
            ".c-0 {\n    color: red;\n}\n\n.c-1 {\n    color: blue;\n}\n\n"
        );
        assert_eq!(
            run("$map: (primary: blue, danger: red);\n@each $c $k in $map { .btn-$k { color: $c } }"),
            ".btn-primary {\n    color: blue;\n}\n\n.btn-danger {\n    color: red;\n}\n\n"
        );
    }

    #[test]
    fn loop_variables_do_not_leak_between_iterations() {
        let css = run("@each $c in a, b { $last: $c; x-$c { v: $last } }");
        assert_eq!(css, "x-a {\n    v: a;\n}\n\nx-b {\n    v: b;\n}\n\n");
    }

    #[test]
    fn disabled_features_are_left_untouched() {
        let options = Options {
            disable: Disabled::parse("@each, @if"),
            ..Options::default()
        };
        let (css, _) = run_with("@each $c in a { x { y: $c } }", &options).expect("transform");
        assert_eq!(css, "@each $c in a {\n    x {\n        y: $c;\n    }\n}\n\n");
    }

    #[test]
    fn disabled_if_still_decides_its_else() {
        let options = Options {
            disable: Disabled::parse("@if"),
            ..Options::default()
        };
        let (css, _) = run_with(
            "@if 1 == 1 { .a { b: c } } @else { .x { y: $undefined } }",
            &options,
        )
        .expect("true condition drops the else");
        assert_eq!(css, "@if 1 == 1 {\n    .a {\n        b: c;\n    }\n}\n\n");

        let (css, _) = run_with(
            "$v: z;\n@if 1 == 2 { .a { b: $v } } @else { .x { y: $v } }",
            &options,
        )
        .expect("false condition keeps the else");
        assert_eq!(
            css,
            "@if 1 == 2 {\n    .a {\n        b: $v;\n    }\n}\n\n.x {\n    y: z;\n}\n\n"
        );
    }
}
