//! Values bound to variables: plain strings, Sass-like lists and maps, and
//! mixin descriptors.

use std::fmt;

use indextree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::list;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(Vec<(String, Value)>),
    Mixin(Mixin),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mixin {
    pub params: Vec<MixinParam>,
    /// The detached `@mixin` at-rule whose children are the template.
    pub rule: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixinParam {
    pub name: String,
    pub default: Option<String>,
}

static WRAPPING_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([\s\S]*)\)$").expect("valid wrapping-parens regex"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*,\s*$").expect("valid trailing-comma regex"));
static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w-]+)\s*:\s*([\s\S]+?)\s*$").expect("valid key-value regex"));

impl Value {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn number(value: f64) -> Self {
        Self::Scalar(format_number(value))
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Parse a Sass-like list or map literal.
    ///
    /// `(a, b)` and `a, b` become lists, `(k: v, k2: v2)` becomes a map, and
    /// entries are parsed recursively. A value that is not a list stays a
    /// scalar.
    pub fn parse(value: &str) -> Self {
        let unwrapped = match WRAPPING_PARENS.captures(value) {
            Some(caps) if encloses_whole(value) => caps[1].to_string(),
            _ => value.to_string(),
        };
        let unwrapped = TRAILING_COMMA.replace(&unwrapped, "").into_owned();
        let entries = list::comma(&unwrapped);

        if entries.first().map(String::as_str) == Some(value) {
            return Self::Scalar(value.to_string());
        }

        let mut keyed = false;
        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match KEY_VALUE.captures(entry) {
                Some(caps) => {
                    keyed = true;
                    items.push((caps[1].to_string(), Self::parse(&caps[2])));
                }
                None => items.push((index.to_string(), Self::parse(entry))),
            }
        }

        if keyed {
            Self::Map(items)
        } else {
            Self::List(items.into_iter().map(|(_, value)| value).collect())
        }
    }

    /// Entries to iterate over with `@each`: a scalar is a one-entry list.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Self::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item.clone()))
                .collect(),
            Self::Map(items) => items.clone(),
            other => vec![("0".to_string(), other.clone())],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.write_str(value),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Map(items) => {
                f.write_str("(")?;
                for (i, (key, item)) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key}:{item}")?;
                }
                f.write_str(")")
            }
            Self::Mixin(_) => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

/// Whether the first `(` of `value` is closed by its last character.
fn encloses_whole(value: &str) -> bool {
    let mut depth = 0usize;
    let last = value.len().saturating_sub(1);
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }
    false
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_words_stay_scalar() {
        assert_eq!(Value::parse("red"), Value::scalar("red"));
        assert_eq!(Value::parse("1px solid red"), Value::scalar("1px solid red"));
    }

    #[test]
    fn comma_lists_with_and_without_parens() {
        let expected = Value::List(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(Value::parse("a, b, c"), expected);
        assert_eq!(Value::parse("(a, b, c,)"), expected);
    }

    #[test]
    fn single_parenthesized_entry_is_a_list() {
        assert_eq!(Value::parse("(a)"), Value::List(vec!["a".into()]));
    }

    #[test]
    fn separate_groups_are_not_unwrapped() {
        assert_eq!(
            Value::parse("(a, b), (c, d)"),
            Value::List(vec![
                Value::List(vec!["a".into(), "b".into()]),
                Value::List(vec!["c".into(), "d".into()]),
            ])
        );
    }

    #[test]
    fn key_value_entries_make_maps() {
        let map = Value::parse("(primary: blue, secondary: (a, b))");
        assert_eq!(
            map,
            Value::Map(vec![
                ("primary".into(), "blue".into()),
                (
                    "secondary".into(),
                    Value::List(vec!["a".into(), "b".into()])
                ),
            ])
        );
        assert_eq!(map.to_string(), "(primary:blue,secondary:(a,b))");
    }

    #[test]
    fn scalar_entries_iterate_once() {
        assert_eq!(
            Value::scalar("red").entries(),
            vec![("0".to_string(), Value::scalar("red"))]
        );
    }

    #[test]
    fn numbers_render_like_integers_when_integral() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
    }
}
