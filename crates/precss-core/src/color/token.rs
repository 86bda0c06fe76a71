//! A small value tokenizer for color expressions. Whitespace only separates
//! tokens and is not kept.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers, hex colors and anything else that is not structural.
    Word(String),
    Number {
        value: f64,
        unit: String,
        raw: String,
    },
    Function {
        name: String,
        args: Vec<Token>,
    },
    /// `+`, `-`, `*` or `/`.
    Operator(char),
    Comma,
    String(String),
}

impl Token {
    /// Text used to point at the token in errors.
    pub fn word(&self) -> String {
        match self {
            Self::Function { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_function(&self, name: &str) -> bool {
        matches!(self, Self::Function { name: n, .. } if n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(text) | Self::String(text) => f.write_str(text),
            Self::Number { raw, unit, .. } => write!(f, "{raw}{unit}"),
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 && !matches!(arg, Token::Comma) {
                        f.write_str(" ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Operator(op) => write!(f, "{op}"),
            Self::Comma => f.write_str(","),
        }
    }
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
    };
    lexer.tokens(false)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Read tokens until the end of input, or until the `)` closing the
    /// current function when `nested`.
    fn tokens(&mut self, nested: bool) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek(0) {
            match ch {
                c if c.is_whitespace() => self.pos += 1,
                ')' => {
                    self.pos += 1;
                    if nested {
                        return tokens;
                    }
                    tokens.push(Token::Word(")".to_string()));
                }
                ',' => {
                    self.pos += 1;
                    tokens.push(Token::Comma);
                }
                '(' => {
                    self.pos += 1;
                    let args = self.tokens(true);
                    tokens.push(Token::Function {
                        name: String::new(),
                        args,
                    });
                }
                '"' | '\'' => tokens.push(self.string(ch)),
                '*' | '/' => {
                    self.pos += 1;
                    tokens.push(Token::Operator(ch));
                }
                '+' | '-' if self.starts_number(1) => {
                    // A sign at the start of a group reads as an operator.
                    let after_separator = matches!(
                        tokens.last(),
                        None | Some(Token::Comma) | Some(Token::Operator(_))
                    );
                    if after_separator {
                        self.pos += 1;
                        tokens.push(Token::Operator(ch));
                    }
                    tokens.push(self.number());
                }
                '+' | '-' if !(ch == '-' && self.starts_ident(1)) => {
                    self.pos += 1;
                    tokens.push(Token::Operator(ch));
                }
                c if c.is_ascii_digit() || (c == '.' && self.starts_number(1)) => {
                    tokens.push(self.number());
                }
                _ => {
                    let word = self.word();
                    if self.peek(0) == Some('(') {
                        self.pos += 1;
                        let args = self.tokens(true);
                        tokens.push(Token::Function { name: word, args });
                    } else {
                        tokens.push(Token::Word(word));
                    }
                }
            }
        }
        tokens
    }

    fn starts_number(&self, offset: usize) -> bool {
        match self.peek(offset) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek(offset + 1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn starts_ident(&self, offset: usize) -> bool {
        self.peek(offset)
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '-' || c == '\\')
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        if matches!(self.peek(0), Some('+' | '-')) {
            self.pos += 1;
        }
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let signed = matches!(self.peek(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digit_at;
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();

        let unit_start = self.pos;
        if self.peek(0) == Some('%') {
            self.pos += 1;
        } else {
            while self.peek(0).is_some_and(|c| c.is_alphabetic()) {
                self.pos += 1;
            }
        }
        let unit: String = self.chars[unit_start..self.pos].iter().collect();

        Token::Number {
            value: raw.parse().unwrap_or(f64::NAN),
            unit,
            raw,
        }
    }

    fn string(&mut self, quote: char) -> Token {
        let start = self.pos;
        self.pos += 1;
        while let Some(ch) = self.peek(0) {
            self.pos += 1;
            if ch == '\\' {
                self.pos += 1;
            } else if ch == quote {
                break;
            }
        }
        let end = self.pos.min(self.chars.len());
        Token::String(self.chars[start..end].iter().collect())
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        while let Some(ch) = self.peek(0) {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | ',' | '/' | '*' | '"' | '\'') {
                break;
            }
            if ch == '\\' {
                self.pos += 1;
            }
            self.pos += 1;
        }
        let end = self.pos.min(self.chars.len());
        self.chars[start..end].iter().collect()
    }
}
