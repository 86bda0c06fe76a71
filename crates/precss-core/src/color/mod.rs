//! `color-mod()` evaluation.
//!
//! Declarations whose value calls `color-mod(` are scanned for outermost
//! calls; each one is tokenized, its `var()` references optionally resolved
//! against `:root`, evaluated, and replaced by the stringified color. Calls
//! that cannot be evaluated under a lenient policy are left as written.

mod convert;
mod eval;
mod model;
mod names;
mod token;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::ast::Stylesheet;
use crate::config::{Options, Unresolved};
use crate::error::{Diagnostics, Error, Location};
use crate::pipeline::{Context, Plugin};
use crate::value::format_number;

use eval::{substitute_vars, Evaluator};
pub use model::{Channel, Color, Model, Space};
use model::js_round;

pub const PLUGIN: &str = "color-mod";

static COLOR_MOD_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\s)color-mod\(").expect("valid color-mod regex"));
static COLOR_MOD_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)color-mod\(").expect("valid color-mod call regex"));

pub type ColorFormatter = Arc<dyn Fn(&Color) -> String + Send + Sync>;

/// How evaluated colors are written back.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stringifier {
    /// `hsl()`/`hsla()` for HSL colors, `rgb()`/`rgba()` otherwise.
    #[default]
    Legacy,
    RgbLegacy,
    Rgb,
    Hsl,
    Hwb,
    /// The modern syntax of the color's own space.
    Native,
    #[serde(skip_deserializing)]
    Custom(ColorFormatter),
}

impl fmt::Debug for Stringifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("Legacy"),
            Self::RgbLegacy => f.write_str("RgbLegacy"),
            Self::Rgb => f.write_str("Rgb"),
            Self::Hsl => f.write_str("Hsl"),
            Self::Hwb => f.write_str("Hwb"),
            Self::Native => f.write_str("Native"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for Stringifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "rgb-legacy" => Ok(Self::RgbLegacy),
            "rgb" => Ok(Self::Rgb),
            "hsl" => Ok(Self::Hsl),
            "hwb" => Ok(Self::Hwb),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown stringifier '{other}'")),
        }
    }
}

impl Stringifier {
    pub fn apply(&self, color: &Color) -> String {
        match self {
            Self::Legacy if color.space() == Space::Hsl => hsl_legacy_string(color),
            Self::Legacy | Self::RgbLegacy => rgb_legacy_string(color),
            Self::Rgb => rgb_string(color),
            Self::Hsl => hsl_string(color),
            Self::Hwb => hwb_string(color),
            Self::Native => match color.space() {
                Space::Rgb => rgb_string(color),
                Space::Hsl => hsl_string(color),
                Space::Hwb => hwb_string(color),
            },
            Self::Custom(format) => format(color),
        }
    }
}

/// Round to ten decimal places.
fn round10(value: f64) -> f64 {
    js_round(value * 1e10) / 1e10
}

fn number(value: f64) -> String {
    format_number(round10(value))
}

fn modern_alpha(color: &Color) -> String {
    if color.alpha == 100.0 {
        String::new()
    } else {
        format!(" / {}%", number(color.alpha))
    }
}

fn rgb_string(color: &Color) -> String {
    let [red, green, blue, _] = color.to_rgb();
    format!(
        "rgb({}% {}% {}%{})",
        number(red),
        number(green),
        number(blue),
        modern_alpha(color)
    )
}

fn hsl_string(color: &Color) -> String {
    let [hue, saturation, lightness] = color.to_hsl();
    format!(
        "hsl({} {}% {}%{})",
        number(hue),
        number(saturation),
        number(lightness),
        modern_alpha(color)
    )
}

fn hwb_string(color: &Color) -> String {
    let [hue, whiteness, blackness] = color.to_hwb();
    format!(
        "hwb({} {}% {}%{})",
        number(hue),
        number(whiteness),
        number(blackness),
        modern_alpha(color)
    )
}

fn rgb_legacy_string(color: &Color) -> String {
    let [red, green, blue, _] = color.to_rgb();
    let [red, green, blue] = [red, green, blue].map(|channel| format_number(js_round(channel * 255.0 / 100.0)));
    if color.alpha == 100.0 {
        format!("rgb({red}, {green}, {blue})")
    } else {
        format!("rgba({red}, {green}, {blue}, {})", number(color.alpha / 100.0))
    }
}

fn hsl_legacy_string(color: &Color) -> String {
    let [hue, saturation, lightness] = color.to_hsl();
    let (hue, saturation, lightness) = (number(hue), number(saturation), number(lightness));
    if color.alpha == 100.0 {
        format!("hsl({hue}, {saturation}%, {lightness}%)")
    } else {
        format!(
            "hsla({hue}, {saturation}%, {lightness}%, {})",
            number(color.alpha / 100.0)
        )
    }
}

#[derive(Debug)]
pub struct ColorMod {
    unresolved: Unresolved,
    stringifier: Stringifier,
    transform_vars: bool,
}

impl ColorMod {
    pub fn new(options: &Options) -> Self {
        Self {
            unresolved: options.color_unresolved(),
            stringifier: options.color_mod.stringifier.clone(),
            transform_vars: options.color_mod.transform_vars,
        }
    }

    /// Rewrite every outermost `color-mod()` call in `value`.
    fn transform_value(
        &self,
        value: &str,
        vars: &HashMap<String, String>,
        location: Location,
        diagnostics: &mut Diagnostics,
    ) -> Result<String, Error> {
        let mut output = String::with_capacity(value.len());
        let mut cursor = 0;

        while let Some(found) = COLOR_MOD_CALL.find_at(value, cursor) {
            let start = found.start();
            let preceded_by_word = value[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_');
            let end = call_end(value, found.end());
            output.push_str(&value[cursor..start]);
            cursor = end;

            let text = &value[start..end];
            if preceded_by_word {
                output.push_str(text);
                continue;
            }

            let mut tokens = token::tokenize(text);
            if self.transform_vars {
                tokens = substitute_vars(&tokens, vars, &mut Vec::new());
            }
            let mut evaluator = Evaluator {
                policy: self.unresolved,
                diagnostics: &mut *diagnostics,
                location: location.clone(),
            };
            let color = match tokens.first() {
                Some(call) if tokens.len() == 1 => evaluator.color_mod(call)?,
                _ => None,
            };
            match color {
                Some(color) => output.push_str(&self.stringifier.apply(&color)),
                None => output.push_str(text),
            }
        }
        output.push_str(&value[cursor..]);
        Ok(output)
    }
}

/// Byte offset just past the `)` that closes the call whose arguments start
/// at `open`, or the end of `value` when it is never closed.
fn call_end(value: &str, open: usize) -> usize {
    let mut depth = 1usize;
    let mut quote = None;
    let mut escaped = false;
    for (offset, ch) in value[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return open + offset + 1;
                }
            }
            _ => {}
        }
    }
    value.len()
}

/// Custom properties declared directly in `:root` rules; the last
/// declaration of a name wins.
fn root_custom_properties(sheet: &Stylesheet) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for rule in sheet.rules() {
        if sheet.node(rule).selector().map(str::trim) != Some(":root") {
            continue;
        }
        for child in sheet.children(rule) {
            let node = sheet.node(child);
            if let (Some(prop), Some(value)) = (node.prop(), node.value()) {
                if prop.starts_with("--") {
                    vars.insert(prop.to_string(), value.to_string());
                }
            }
        }
    }
    vars
}

impl Plugin for ColorMod {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn run(&self, sheet: &mut Stylesheet, ctx: &mut Context) -> Result<(), Error> {
        let vars = if self.transform_vars {
            root_custom_properties(sheet)
        } else {
            HashMap::new()
        };

        for decl in sheet.declarations() {
            let Some(value) = sheet.node(decl).value() else {
                continue;
            };
            if !COLOR_MOD_VALUE.is_match(value) {
                continue;
            }
            let value = value.to_string();
            let transformed =
                self.transform_value(&value, &vars, sheet.location(decl), &mut ctx.diagnostics)?;
            if transformed != value {
                tracing::trace!(from = %value, to = %transformed, "Evaluated color-mod()");
                sheet.set_value(decl, transformed);
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

    fn run_with(source: &str, options: &Options) -> Result<(String, Context), Error> {
        let mut sheet = parse(source, None)?;
        let mut ctx = Context::default();
        ColorMod::new(options).run(&mut sheet, &mut ctx)?;
        Ok((emit_css(&sheet), ctx))
    }

    fn color(value: &str) -> String {
        color_with(value, Stringifier::Legacy)
    }

    fn color_with(value: &str, stringifier: Stringifier) -> String {
        let options = Options::default().with_stringifier(stringifier);
        let (css, _) = run_with(&format!("a {{ color: {value} }}"), &options).expect("transform");
        css.trim_start_matches("a {\n    color: ")
            .trim_end_matches(";\n}\n\n")
            .to_string()
    }

    #[test]
    fn adjusters_darken_and_fade() {
        assert_eq!(color("color-mod(red blackness(50%))"), "rgb(128, 0, 0)");
        assert_eq!(color("color-mod(#000 a(50%))"), "rgba(0, 0, 0, 0.5)");
        assert_eq!(color("color-mod(black tint(50%))"), "rgb(128, 128, 128)");
        assert_eq!(color("color-mod(red blend(blue 50%))"), "rgb(128, 0, 128)");
        assert_eq!(color("color-mod(#000 rgb(+ 10% 20% 30%))"), "rgb(26, 51, 77)");
        assert_eq!(color("color-mod(white rgb(* 50%))"), "rgb(128, 128, 128)");
    }

    #[test]
    fn hsl_colors_stay_hsl_in_legacy_output() {
        assert_eq!(
            color("color-mod(hsl(120, 100%, 50%) lightness(-10%))"),
            "hsl(120, 100%, 40%)"
        );
        assert_eq!(color("color-mod(120deg)"), "hsl(120, 100%, 50%)");
    }

    #[test]
    fn contrast_reaches_the_extremes() {
        assert_eq!(color("color-mod(#000 contrast(100%))"), "rgb(255, 255, 255)");
        assert_eq!(color("color-mod(#000 contrast(0%))"), "rgb(0, 0, 0)");
    }

    #[test]
    fn partial_contrast_blends_towards_the_extreme() {
        assert_eq!(color("color-mod(#000 contrast(50%))"), "rgb(128, 128, 128)");
        assert_eq!(color("color-mod(black contrast(25%))"), "rgb(64, 64, 64)");
        assert_eq!(color("color-mod(aliceblue)"), "rgb(240, 248, 255)");
    }

    #[test]
    fn stringifiers() {
        assert_eq!(color_with("color-mod(red)", Stringifier::Hwb), "hwb(0 0% 0%)");
        assert_eq!(
            color_with("color-mod(red a(50%))", Stringifier::Rgb),
            "rgb(100% 0% 0% / 50%)"
        );
        assert_eq!(
            color_with("color-mod(hsl(0 100% 50%))", Stringifier::RgbLegacy),
            "rgb(255, 0, 0)"
        );
        assert_eq!(
            color_with("color-mod(hsl(0 100% 50%))", Stringifier::Native),
            "hsl(0 100% 50%)"
        );
        let custom = Stringifier::Custom(Arc::new(|color: &Color| format!("alpha={}", color.alpha)));
        assert_eq!(color_with("color-mod(red)", custom), "alpha=100");
    }

    #[test]
    fn only_color_mod_calls_change() {
        assert_eq!(
            color("1px solid color-mod(red a(50%)), rgb(1, 2, 3)"),
            "1px solid rgba(255, 0, 0, 0.5), rgb(1, 2, 3)"
        );
        assert_eq!(color("x-color-mod(red)"), "x-color-mod(red)");
    }

    #[test]
    fn root_variables_feed_color_mod() {
        let (css, _) = run_with(
            ":root { --brand: #000; --brand: blue }\na { color: color-mod(var(--brand) a(50%)); background: color-mod(var(--none, red)) }",
            &Options::default(),
        )
        .expect("transform");
        assert_eq!(
            css,
            ":root {\n    --brand: #000;\n    --brand: blue;\n}\n\na {\n    color: rgba(0, 0, 255, 0.5);\n    background: rgb(255, 0, 0);\n}\n\n"
        );
    }

    #[test]
    fn bad_adjusters_follow_the_policy() {
        let err = run_with("a { color: color-mod(red bogus(1)) }", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedColor { .. }));
        assert_eq!(err.word(), Some("bogus"));

        let options = Options {
            unresolved: Unresolved::Warn,
            ..Options::default()
        };
        let (css, ctx) = run_with(
            "a { color: color-mod(red a(50%) bogus(1) a(10%)) }",
            &options,
        )
        .expect("warn");
        assert_eq!(css, "a {\n    color: rgba(255, 0, 0, 0.5);\n}\n\n");
        assert_eq!(ctx.diagnostics.warnings().len(), 1);
        assert_eq!(ctx.diagnostics.warnings()[0].plugin, "color-mod");
    }

    #[test]
    fn unknown_colors_are_left_in_place_when_lenient() {
        let mut options = Options::default();
        options.color_mod.unresolved = Some(Unresolved::Ignore);
        let (css, ctx) = run_with("a { color: color-mod(nope a(50%)) }", &options).expect("ignore");
        assert_eq!(css, "a {\n    color: color-mod(nope a(50%));\n}\n\n");
        assert!(ctx.diagnostics.warnings().is_empty());
    }
}
