//! Evaluation of `color-mod()` token trees.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Unresolved;
use crate::error::{Diagnostics, Error, Location};

use super::convert::angle2deg;
use super::model::{Channel, Color, Space};
use super::names;
use super::token::{tokenize, Token};
use super::PLUGIN;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#(?:[0-9a-f]{3,4}|[0-9a-f]{6}|[0-9a-f]{8})$").expect("valid hex color regex")
});
static HUE_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(deg|grad|rad|turn)?$").expect("valid hue unit regex"));

/// Kinds of argument a grammar alternative can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    /// `<percentage>`, or a bare `0`.
    Percentage,
    /// A unitless RGB channel on the 0-255 scale.
    Number,
    /// A unitless 0-1 alpha or a percentage.
    Alpha,
    Hue,
    Comma,
    Slash,
    /// `+` or `-`.
    Sign,
    Times,
    /// `+`, `-` or `*`.
    AnyOperator,
    AnyColor,
    Hex,
    ColorSpace,
}

/// A sequence of parameters and how many leading ones must be present.
type Alternative = (&'static [Param], usize);

use Param::*;

const RGB_FUNCTION: &[Alternative] = &[
    (&[Percentage, Percentage, Percentage, Slash, Alpha], 3),
    (&[Number, Number, Number, Slash, Alpha], 3),
    (&[Percentage, Comma, Percentage, Comma, Percentage, Comma, Alpha], 5),
    (&[Number, Comma, Number, Comma, Number, Comma, Alpha], 5),
];
const HSL_FUNCTION: &[Alternative] = &[
    (&[Hue, Percentage, Percentage, Slash, Alpha], 3),
    (&[Hue, Comma, Percentage, Comma, Percentage, Comma, Alpha], 5),
];
const HWB_FUNCTION: &[Alternative] = &[(&[Hue, Percentage, Percentage, Slash, Alpha], 3)];

const ALPHA_ADJUSTER: &[Alternative] = &[
    (&[Sign, Alpha], 2),
    (&[Times, Percentage], 2),
    (&[Alpha], 1),
];
const RGB_CHANNEL_ADJUSTER: &[Alternative] = &[
    (&[Sign, Percentage], 2),
    (&[Sign, Number], 2),
    (&[Times, Percentage], 2),
    (&[Percentage], 1),
    (&[Number], 1),
];
const RGB_ADJUSTER: &[Alternative] = &[
    (&[Sign, Percentage, Percentage, Percentage], 4),
    (&[Sign, Number, Number, Number], 4),
    (&[Sign, Hex], 2),
    (&[Times, Percentage], 2),
];
const HUE_ADJUSTER: &[Alternative] = &[(&[AnyOperator, Hue], 2), (&[Hue], 1)];
const PERCENTAGE_ADJUSTER: &[Alternative] = &[(&[AnyOperator, Percentage], 2), (&[Percentage], 1)];
const SINGLE_PERCENTAGE: &[Alternative] = &[(&[Percentage], 1)];
const BLEND_ADJUSTER: &[Alternative] = &[(&[AnyColor, Percentage, ColorSpace], 2)];

#[derive(Debug, Clone, Copy)]
enum Arg {
    Number(f64),
    Operator(char),
    Color(Color),
    Space(Space),
}

/// Adjuster functions recognized inside `color-mod()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjuster {
    Channel(Channel),
    Rgb,
    Shade,
    Tint,
    Blend { with_alpha: bool },
    Contrast,
}

impl Adjuster {
    fn from_name(name: &str) -> Option<Self> {
        let adjuster = match name.to_ascii_lowercase().as_str() {
            "a" | "alpha" => Self::Channel(Channel::Alpha),
            "red" => Self::Channel(Channel::Red),
            "green" => Self::Channel(Channel::Green),
            "blue" => Self::Channel(Channel::Blue),
            "h" | "hue" => Self::Channel(Channel::Hue),
            "s" | "saturation" => Self::Channel(Channel::Saturation),
            "l" | "lightness" => Self::Channel(Channel::Lightness),
            "w" | "whiteness" => Self::Channel(Channel::Whiteness),
            "b" | "blackness" => Self::Channel(Channel::Blackness),
            "rgb" => Self::Rgb,
            "shade" => Self::Shade,
            "tint" => Self::Tint,
            "blend" => Self::Blend { with_alpha: false },
            "blenda" => Self::Blend { with_alpha: true },
            "contrast" => Self::Contrast,
            _ => return None,
        };
        Some(adjuster)
    }
}

/// Evaluates the colors of one declaration.
pub struct Evaluator<'a> {
    pub policy: Unresolved,
    pub diagnostics: &'a mut Diagnostics,
    pub location: Location,
}

impl Evaluator<'_> {
    fn unresolved(&mut self, token: &Token, message: impl Into<String>) -> Result<(), Error> {
        let error = Error::UnresolvedColor {
            message: message.into(),
            word: token.word(),
            location: self.location.clone(),
        };
        self.policy.handle(self.diagnostics, PLUGIN, error)
    }

    /// `color-mod([<color> | <hue>] <adjuster>*)`. Adjusters apply left to
    /// right; one that fails under a lenient policy stops the fold and the
    /// color built so far is kept.
    pub fn color_mod(&mut self, call: &Token) -> Result<Option<Color>, Error> {
        let args = match call {
            Token::Function { args, .. } => args.as_slice(),
            _ => &[],
        };
        let Some((first, adjusters)) = args.split_first() else {
            self.unresolved(call, "Expected a valid color-mod() function")?;
            return Ok(None);
        };

        let base = match hue(first) {
            Some(hue) => Color::hsl(hue, 100.0, 50.0, 100.0),
            None => match self.color(first)? {
                Some(color) => color,
                None => return Ok(None),
            },
        };

        let mut color = base;
        for adjuster in adjusters {
            match self.adjust(&color, adjuster)? {
                Some(adjusted) => color = adjusted,
                None => break,
            }
        }
        Ok(Some(color))
    }

    /// Any `<color>`: a color function, a hex color or a named color.
    pub fn color(&mut self, token: &Token) -> Result<Option<Color>, Error> {
        match token {
            Token::Function { name, .. } => match name.to_ascii_lowercase().as_str() {
                "rgb" | "rgba" => self.construct(token, RGB_FUNCTION, "rgb", |[r, g, b, a]| {
                    Color::rgb(r, g, b, a, 0.0)
                }),
                "hsl" | "hsla" => self.construct(token, HSL_FUNCTION, "hsl", |[h, s, l, a]| {
                    Color::hsl(h, s, l, a)
                }),
                "hwb" => self.construct(token, HWB_FUNCTION, "hwb", |[h, w, b, a]| {
                    Color::hwb(h, w, b, a)
                }),
                "color-mod" => self.color_mod(token),
                _ => {
                    self.unresolved(token, "Expected a color")?;
                    Ok(None)
                }
            },
            Token::Word(word) if word.starts_with('#') => match hex(word) {
                Some(color) => Ok(Some(color)),
                None => {
                    self.unresolved(token, "Expected a valid hex color")?;
                    Ok(None)
                }
            },
            Token::Word(word) => match names::lookup(word) {
                Some([red, green, blue]) => Ok(Some(Color::rgb(red, green, blue, 100.0, 0.0))),
                None => {
                    self.unresolved(token, "Expected a color")?;
                    Ok(None)
                }
            },
            _ => {
                self.unresolved(token, "Expected a color")?;
                Ok(None)
            }
        }
    }

    /// Build a color from three channels and an optional alpha.
    fn construct(
        &mut self,
        token: &Token,
        grammar: &[Alternative],
        name: &str,
        build: impl FnOnce([f64; 4]) -> Color,
    ) -> Result<Option<Color>, Error> {
        let numbers = self.match_args(token, grammar).map(|args| {
            args.iter()
                .filter_map(|arg| match arg {
                    Arg::Number(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>()
        });
        match numbers.as_deref() {
            Some(&[first, second, third]) => Ok(Some(build([first, second, third, 100.0]))),
            Some(&[first, second, third, alpha]) => Ok(Some(build([first, second, third, alpha]))),
            _ => {
                self.unresolved(token, format!("Expected a valid {name}() function"))?;
                Ok(None)
            }
        }
    }

    fn adjust(&mut self, base: &Color, token: &Token) -> Result<Option<Color>, Error> {
        let adjuster = match token {
            Token::Function { name, .. } => Adjuster::from_name(name),
            _ => None,
        };
        let Some(adjuster) = adjuster else {
            self.unresolved(token, "Expected a valid color adjuster")?;
            return Ok(None);
        };

        let adjusted = match adjuster {
            Adjuster::Channel(channel) => self.adjust_channel(base, token, channel),
            Adjuster::Rgb => self.adjust_rgb(base, token),
            Adjuster::Shade | Adjuster::Tint => {
                match self.match_args(token, SINGLE_PERCENTAGE).as_deref() {
                    Some(&[Arg::Number(percentage)]) if adjuster == Adjuster::Shade => {
                        Some(base.shade(percentage))
                    }
                    Some(&[Arg::Number(percentage)]) => Some(base.tint(percentage)),
                    _ => None,
                }
            }
            Adjuster::Blend { with_alpha } => match self.match_args(token, BLEND_ADJUSTER).as_deref() {
                Some(&[Arg::Color(other), Arg::Number(percentage)]) => {
                    Some(base.blend(&other, percentage, Space::Rgb, with_alpha))
                }
                Some(&[Arg::Color(other), Arg::Number(percentage), Arg::Space(space)]) => {
                    Some(base.blend(&other, percentage, space, with_alpha))
                }
                _ => None,
            },
            Adjuster::Contrast => match self.match_args(token, SINGLE_PERCENTAGE).as_deref() {
                Some(&[Arg::Number(percentage)]) => Some(base.contrast(percentage)),
                _ => None,
            },
        };

        if adjusted.is_none() {
            self.unresolved(token, format!("Expected valid {}() arguments", token.word()))?;
        }
        Ok(adjusted)
    }

    /// `a()`, `red()`, `hue()`, `lightness()` and friends: set the channel,
    /// or move it with `+`, `-` or `*`.
    fn adjust_channel(&mut self, base: &Color, token: &Token, channel: Channel) -> Option<Color> {
        let grammar = match channel {
            Channel::Alpha => ALPHA_ADJUSTER,
            Channel::Red | Channel::Green | Channel::Blue => RGB_CHANNEL_ADJUSTER,
            Channel::Hue => HUE_ADJUSTER,
            _ => PERCENTAGE_ADJUSTER,
        };
        let percent = channel != Channel::Hue;
        let existing = base.get(channel);
        let value = match self.match_args(token, grammar)?.as_slice() {
            &[Arg::Operator(op), Arg::Number(amount)] => relative(existing, op, amount, percent),
            &[Arg::Number(value)] => value,
            _ => return None,
        };
        Some(base.with(channel, value))
    }

    /// `rgb()` adjuster: add or subtract channels, or scale all three.
    fn adjust_rgb(&mut self, base: &Color, token: &Token) -> Option<Color> {
        let [red, green, blue, _] = base.to_rgb();
        let adjusted = match self.match_args(token, RGB_ADJUSTER)?.as_slice() {
            &[Arg::Operator(op), Arg::Color(other)] => {
                let [r, g, b, _] = other.to_rgb();
                base.with_rgb(
                    relative(red, op, r, true),
                    relative(green, op, g, true),
                    relative(blue, op, b, true),
                )
            }
            &[Arg::Operator(op), Arg::Number(r), Arg::Number(g), Arg::Number(b)] => base.with_rgb(
                relative(red, op, r, true),
                relative(green, op, g, true),
                relative(blue, op, b, true),
            ),
            &[Arg::Operator(op), Arg::Number(factor)] => base.with_rgb(
                relative(red, op, factor, true),
                relative(green, op, factor, true),
                relative(blue, op, factor, true),
            ),
            _ => return None,
        };
        Some(adjusted)
    }

    /// Try each alternative in turn; the first one every argument fits wins.
    /// Separators are checked but produce no value.
    fn match_args(&mut self, token: &Token, grammar: &[Alternative]) -> Option<Vec<Arg>> {
        let Token::Function { args, .. } = token else {
            return None;
        };
        'alternatives: for &(params, required) in grammar {
            if args.len() < required || args.len() > params.len() {
                continue;
            }
            let mut values = Vec::with_capacity(args.len());
            for (param, arg) in params.iter().zip(args) {
                match self.accept(*param, arg) {
                    Some(Some(value)) => values.push(value),
                    Some(None) => {}
                    None => continue 'alternatives,
                }
            }
            return Some(values);
        }
        None
    }

    /// `None` when `token` does not fit `param`; `Some(None)` for a matching
    /// separator.
    fn accept(&mut self, param: Param, token: &Token) -> Option<Option<Arg>> {
        let value = match param {
            Param::Percentage => Arg::Number(percentage(token)?),
            Param::Number => Arg::Number(unitless(token)? / 2.55),
            Param::Alpha => match unitless(token) {
                Some(value) => Arg::Number(value * 100.0),
                None => Arg::Number(percentage(token)?),
            },
            Param::Hue => Arg::Number(hue(token)?),
            Param::Comma => return matches!(token, Token::Comma).then_some(None),
            Param::Slash => return matches!(token, Token::Operator('/')).then_some(None),
            Param::Sign => match token {
                Token::Operator(op @ ('+' | '-')) => Arg::Operator(*op),
                _ => return None,
            },
            Param::Times => match token {
                Token::Operator('*') => Arg::Operator('*'),
                _ => return None,
            },
            Param::AnyOperator => match token {
                Token::Operator(op @ ('+' | '-' | '*')) => Arg::Operator(*op),
                _ => return None,
            },
            Param::AnyColor => Arg::Color(self.quietly(|evaluator| evaluator.color(token))?),
            Param::Hex => match token {
                Token::Word(word) => Arg::Color(hex(word)?),
                _ => return None,
            },
            Param::ColorSpace => match token {
                Token::Word(word) => Arg::Space(Space::parse(word)?),
                _ => return None,
            },
        };
        Some(Some(value))
    }

    /// Run a nested evaluation with failures ignored.
    fn quietly(
        &mut self,
        eval: impl FnOnce(&mut Self) -> Result<Option<Color>, Error>,
    ) -> Option<Color> {
        let policy = std::mem::replace(&mut self.policy, Unresolved::Ignore);
        let result = eval(self);
        self.policy = policy;
        result.ok().flatten()
    }
}

/// Apply `op` to `existing`. A `*` by a percentage scales by that fraction.
fn relative(existing: f64, op: char, amount: f64, percent: bool) -> f64 {
    match op {
        '+' => existing + amount,
        '-' => existing - amount,
        _ if percent => existing * amount / 100.0,
        _ => existing * amount,
    }
}

fn percentage(token: &Token) -> Option<f64> {
    match token {
        Token::Number { value, unit, .. } if unit == "%" => Some(*value),
        Token::Number { value, unit, raw } if unit.is_empty() && raw == "0" => Some(*value),
        _ => None,
    }
}

fn unitless(token: &Token) -> Option<f64> {
    match token {
        Token::Number { value, unit, .. } if unit.is_empty() => Some(*value),
        _ => None,
    }
}

/// A `<number>` or `<angle>`, in degrees.
fn hue(token: &Token) -> Option<f64> {
    match token {
        Token::Number { value, unit, .. } if HUE_UNIT.is_match(unit) => Some(angle2deg(*value, unit)),
        _ => None,
    }
}

/// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
fn hex(word: &str) -> Option<Color> {
    if !HEX_COLOR.is_match(word) {
        return None;
    }
    let digits = &word[1..];
    let channel = |text: &str| u8::from_str_radix(text, 16).ok().map(|c| f64::from(c) / 2.55);
    let pairs: Vec<String> = if digits.len() <= 4 {
        digits.chars().map(|c| format!("{c}{c}")).collect()
    } else {
        digits
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect()
    };
    let red = channel(&pairs[0])?;
    let green = channel(&pairs[1])?;
    let blue = channel(&pairs[2])?;
    let alpha = match pairs.get(3) {
        Some(pair) => channel(pair)?,
        None => 100.0,
    };
    Some(Color::rgb(red, green, blue, alpha, 0.0))
}

/// Replace every `var(--name[, fallback])` with the tokens of the last
/// `--name` declared in a `:root` rule, or with its fallback. References
/// that cannot be resolved, or that refer back to themselves, are left as
/// they are.
pub fn substitute_vars(
    tokens: &[Token],
    vars: &HashMap<String, String>,
    stack: &mut Vec<String>,
) -> Vec<Token> {
    let mut substituted = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Function { args, .. } if token.is_function("var") => {
                substituted.extend(resolve_var(token, args, vars, stack));
            }
            Token::Function { name, args } => substituted.push(Token::Function {
                name: name.clone(),
                args: substitute_vars(args, vars, stack),
            }),
            other => substituted.push(other.clone()),
        }
    }
    substituted
}

fn resolve_var(
    call: &Token,
    args: &[Token],
    vars: &HashMap<String, String>,
    stack: &mut Vec<String>,
) -> Vec<Token> {
    let Some(Token::Word(name)) = args.first() else {
        return vec![call.clone()];
    };
    if stack.contains(name) {
        tracing::debug!(name = %name, "Cyclic custom property reference");
        return vec![call.clone()];
    }
    if let Some(value) = vars.get(name) {
        stack.push(name.clone());
        let tokens = substitute_vars(&tokenize(value), vars, stack);
        stack.pop();
        return tokens;
    }
    match args.get(1) {
        Some(Token::Comma) => substitute_vars(&args[2..], vars, stack),
        _ => vec![call.clone()],
    }
}
