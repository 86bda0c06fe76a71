//! Splitting of CSS values that respects quotes, parentheses and escapes.

/// Split `value` on any of `separators`, ignoring separators inside quotes
/// or parentheses. With `last` set, a trailing empty part is kept.
pub fn split(value: &str, separators: &[char], last: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            escaped = false;
            current.push(ch);
            continue;
        }
        if ch == '\\' {
            escaped = true;
            current.push(ch);
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            _ if depth == 0 && separators.contains(&ch) => {
                let part = current.trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let part = current.trim();
    if !part.is_empty() || last {
        parts.push(part.to_string());
    }
    parts
}

pub fn space(value: &str) -> Vec<String> {
    split(value, &[' ', '\n', '\t'], false)
}

pub fn comma(value: &str) -> Vec<String> {
    split(value, &[','], true)
}

/// Split a selector list into its trimmed, non-empty terms.
pub fn selectors(selector: &str) -> Vec<String> {
    split(selector, &[','], false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_respects_functions_and_quotes() {
        assert_eq!(
            comma("rgb(1, 2, 3), \"a, b\", c"),
            vec!["rgb(1, 2, 3)", "\"a, b\"", "c"]
        );
    }

    #[test]
    fn comma_keeps_trailing_empty_part() {
        assert_eq!(comma("a,"), vec!["a", ""]);
    }

    #[test]
    fn space_collapses_runs() {
        assert_eq!(space("  1px   solid\tred "), vec!["1px", "solid", "red"]);
    }

    #[test]
    fn selectors_skip_blank_terms() {
        assert_eq!(selectors(".a, , :is(.b, .c)"), vec![".a", ":is(.b, .c)"]);
    }
}
