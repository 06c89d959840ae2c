//! `${{ ... }}` template scanning
//!
//! Finds embedded expressions inside scalar text. Closing braces inside
//! single-quoted expression strings do not terminate the expression.

use std::ops::Range;

/// One `${{ ... }}` occurrence inside a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateExpression {
    /// Byte range of the whole `${{ ... }}` in the scanned text
    pub range: Range<usize>,
    /// Byte range of the expression source between the braces
    pub inner: Range<usize>,
}

impl TemplateExpression {
    /// The expression source, without braces and surrounding blanks
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        text[self.inner.clone()].trim()
    }
}

/// A piece of a template: literal text or an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

/// Whether the text contains at least one complete `${{ ... }}`
pub fn contains_expression(text: &str) -> bool {
    !scan_expressions(text).is_empty()
}

/// Scan text for complete `${{ ... }}` expressions, in document order
pub fn scan_expressions(text: &str) -> Vec<TemplateExpression> {
    let mut matches = Vec::new();
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i + 2 < len {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' && bytes[i + 2] == b'{' {
            if let Some(close) = find_expression_end(text, i + 3) {
                matches.push(TemplateExpression {
                    range: i..close + 2,
                    inner: i + 3..close,
                });
                i = close + 2;
                continue;
            }
            // Unclosed: nothing after it can be an expression either
            break;
        }
        i += 1;
    }

    matches
}

/// Find the `}}` closing an expression whose source starts at `from`.
/// Returns the byte position of the first closing brace.
/// Skips single-quoted strings, where `''` is an escaped quote.
fn find_expression_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = from;

    while i < len {
        match bytes[i] {
            b'\'' => {
                i += 1;
                while i < len {
                    if bytes[i] == b'\'' {
                        if i + 1 < len && bytes[i + 1] == b'\'' {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            b'}' if i + 1 < len && bytes[i + 1] == b'}' => return Some(i),
            _ => {}
        }
        i += 1;
    }

    None
}

/// Split a text into literal and expression parts, in order
pub fn split_template(text: &str) -> Vec<TemplatePart<'_>> {
    let mut parts = Vec::new();
    let mut last = 0;

    for expression in scan_expressions(text) {
        if expression.range.start > last {
            parts.push(TemplatePart::Literal(&text[last..expression.range.start]));
        }
        parts.push(TemplatePart::Expression(expression.source(text)));
        last = expression.range.end;
    }
    if last < text.len() {
        parts.push(TemplatePart::Literal(&text[last..]));
    }

    parts
}

/// Source of an expression that is open (not yet closed) at the end of `text`
pub fn open_expression(text: &str) -> Option<&str> {
    let start = text.rfind("${{")?;
    let rest = &text[start + 3..];
    if find_expression_end(rest, 0).is_some() {
        return None;
    }
    Some(rest)
}
