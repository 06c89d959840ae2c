//! Tokenizer for the expression language

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Reasons an expression fails to tokenize or parse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("empty expression")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Null,
    True,
    False,
    Number(f64),
    String(String),
    Ident(String),
    Dot,
    Comma,
    Star,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Token {
    /// Source-like rendering used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Null => "null".to_string(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Number(n) => n.to_string(),
            Token::String(s) => format!("'{}'", s),
            Token::Ident(name) => name.clone(),
            Token::Dot => ".".to_string(),
            Token::Comma => ",".to_string(),
            Token::Star => "*".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::Not => "!".to_string(),
            Token::Eq => "==".to_string(),
            Token::Ne => "!=".to_string(),
            Token::Lt => "<".to_string(),
            Token::Le => "<=".to_string(),
            Token::Gt => ">".to_string(),
            Token::Ge => ">=".to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
        }
    }
}

/// A token and its byte position in the expression source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Split expression source into tokens
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    lazy_static! {
        static ref NUMBER_RE: Regex =
            Regex::new(r"^-?(0x[0-9a-fA-F]+|([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][-+]?[0-9]+)?)")
                .unwrap();
        static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*").unwrap();
    }

    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        let two = rest.get(..2).unwrap_or_default();
        let (token, width) = match (ch, two) {
            (_, "==") => (Token::Eq, 2),
            (_, "!=") => (Token::Ne, 2),
            (_, "<=") => (Token::Le, 2),
            (_, ">=") => (Token::Ge, 2),
            (_, "&&") => (Token::And, 2),
            (_, "||") => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('.', _) if !rest[1..].starts_with(|c: char| c.is_ascii_digit()) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('*', _) => (Token::Star, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('\'', _) => {
                let (value, width) = read_string(rest, pos)?;
                (Token::String(value), width)
            }
            _ => {
                if let Some(m) = NUMBER_RE.find(rest) {
                    let text = m.as_str();
                    let value = match text.strip_prefix("-0x").or_else(|| text.strip_prefix("0x")) {
                        Some(hex) => {
                            let n = i64::from_str_radix(hex, 16).unwrap_or_default() as f64;
                            if text.starts_with('-') {
                                -n
                            } else {
                                n
                            }
                        }
                        None => text.parse().unwrap_or(f64::NAN),
                    };
                    (Token::Number(value), text.len())
                } else if let Some(m) = IDENT_RE.find(rest) {
                    let token = match m.as_str() {
                        "null" => Token::Null,
                        "true" => Token::True,
                        "false" => Token::False,
                        name => Token::Ident(name.to_string()),
                    };
                    (token, m.as_str().len())
                } else {
                    return Err(ExpressionError::UnexpectedChar(ch, pos));
                }
            }
        };

        tokens.push(Spanned {
            token,
            position: pos,
        });
        pos += width;
    }

    Ok(tokens)
}

/// Read a single-quoted string starting at the beginning of `rest`.
/// `''` inside the string is an escaped quote.
fn read_string(rest: &str, position: usize) -> Result<(String, usize), ExpressionError> {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();

    while let Some((i, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                value.push('\'');
                continue;
            }
            return Ok((value, i + 1));
        }
        value.push(ch);
    }

    Err(ExpressionError::UnterminatedString(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn test_tokenize_property_access() {
        assert_eq!(
            tokens("env.WF_VALUE == env.my-var"),
            vec![
                Token::Ident("env".to_string()),
                Token::Dot,
                Token::Ident("WF_VALUE".to_string()),
                Token::Eq,
                Token::Ident("env".to_string()),
                Token::Dot,
                Token::Ident("my-var".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            tokens("'it''s' 42 -1.5 0xff .5 true null"),
            vec![
                Token::String("it's".to_string()),
                Token::Number(42.0),
                Token::Number(-1.5),
                Token::Number(255.0),
                Token::Number(0.5),
                Token::True,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            tokens("!a && b || c <= d"),
            vec![
                Token::Not,
                Token::Ident("a".to_string()),
                Token::And,
                Token::Ident("b".to_string()),
                Token::Or,
                Token::Ident("c".to_string()),
                Token::Le,
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        assert_eq!(
            tokenize("'open"),
            Err(ExpressionError::UnterminatedString(0))
        );
        assert_eq!(
            tokenize("a # b"),
            Err(ExpressionError::UnexpectedChar('#', 2))
        );
    }
}
