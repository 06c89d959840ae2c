//! Expression evaluation
//!
//! Evaluation runs in two phases: the root namespaces an expression
//! references are resolved through the [`ContextProvider`] (the only place
//! that may suspend), then the expression is evaluated synchronously against
//! those values.

use std::cmp::Ordering;

use super::lexer::ExpressionError;
use super::parser::{parse_expression, BinaryOp, Expr};
use super::template::{split_template, TemplatePart};
use super::value::ExprValue;
use crate::context::ContextProvider;

/// Resolved root namespaces for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    roots: Vec<(String, ExprValue)>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ExprValue) {
        self.roots.push((name.into(), value));
    }

    /// Namespaces are matched case-insensitively
    pub fn get(&self, name: &str) -> ExprValue {
        self.roots
            .iter()
            .find(|(root, _)| root.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }
}

/// Resolve every root namespace referenced by `expr`
pub async fn resolve_context(expr: &Expr, provider: &dyn ContextProvider) -> EvalContext {
    let mut context = EvalContext::new();
    for root in expr.roots() {
        let value = provider.resolve(&root).await.unwrap_or_default();
        if value.is_undefined() {
            tracing::debug!("Context '{}' could not be resolved", root);
        }
        context.insert(root, value);
    }
    context
}

/// Parse and evaluate the source of one expression
pub async fn evaluate_expression(
    source: &str,
    provider: &dyn ContextProvider,
) -> Result<ExprValue, ExpressionError> {
    let expr = parse_expression(source)?;
    let context = resolve_context(&expr, provider).await;
    Ok(evaluate(&expr, &context))
}

/// Evaluate every `${{ ... }}` in `text` and splice the results into the
/// surrounding literal text. Expressions that fail to parse render as the
/// undefined placeholder.
pub async fn evaluate_template(text: &str, provider: &dyn ContextProvider) -> String {
    let mut out = String::new();
    for part in split_template(text) {
        match part {
            TemplatePart::Literal(literal) => out.push_str(literal),
            TemplatePart::Expression(source) => {
                let value = match evaluate_expression(source, provider).await {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::debug!("Expression '{}' failed to parse: {}", source, err);
                        ExprValue::Undefined
                    }
                };
                out.push_str(&value.to_string());
            }
        }
    }
    out
}

/// Evaluate a parsed expression against resolved namespaces
pub fn evaluate(expr: &Expr, context: &EvalContext) -> ExprValue {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Ident(name) => context.get(name),
        Expr::Property(base, name) => {
            let value = evaluate(base, context);
            match value {
                ExprValue::Array(items) if is_filtered(base) => {
                    ExprValue::Array(items.iter().map(|item| item.get(name)).collect())
                }
                value => value.get(name),
            }
        }
        Expr::Index(base, index) => {
            let index = evaluate(index, context);
            evaluate(base, context).index(&index)
        }
        Expr::Filter(base) => match evaluate(base, context) {
            ExprValue::Array(items) => ExprValue::Array(items),
            ExprValue::Object(pairs) => {
                ExprValue::Array(pairs.into_iter().map(|(_, value)| value).collect())
            }
            _ => ExprValue::Undefined,
        },
        Expr::Not(operand) => ExprValue::Bool(!evaluate(operand, context).is_truthy()),
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = evaluate(left, context);
            if left.is_truthy() {
                evaluate(right, context)
            } else {
                left
            }
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = evaluate(left, context);
            if left.is_truthy() {
                left
            } else {
                evaluate(right, context)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, context);
            let right = evaluate(right, context);
            ExprValue::Bool(compare(*op, &left, &right))
        }
        Expr::Call(name, args) => {
            let args: Vec<ExprValue> = args.iter().map(|arg| evaluate(arg, context)).collect();
            call(name, &args)
        }
    }
}

fn is_filtered(expr: &Expr) -> bool {
    match expr {
        Expr::Filter(_) => true,
        Expr::Property(base, _) | Expr::Index(base, _) => is_filtered(base),
        _ => false,
    }
}

fn compare(op: BinaryOp, left: &ExprValue, right: &ExprValue) -> bool {
    if left.is_undefined() || right.is_undefined() {
        return false;
    }
    match op {
        BinaryOp::Eq => left.loose_eq(right),
        BinaryOp::Ne => !left.loose_eq(right),
        BinaryOp::Lt => left.loose_cmp(right) == Some(Ordering::Less),
        BinaryOp::Le => matches!(
            left.loose_cmp(right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        BinaryOp::Gt => left.loose_cmp(right) == Some(Ordering::Greater),
        BinaryOp::Ge => matches!(
            left.loose_cmp(right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        BinaryOp::And | BinaryOp::Or => false,
    }
}

fn call(name: &str, args: &[ExprValue]) -> ExprValue {
    if args.iter().any(ExprValue::is_undefined) {
        return ExprValue::Undefined;
    }
    let lower = |value: &ExprValue| value.to_string().to_lowercase();

    match (name.to_ascii_lowercase().as_str(), args) {
        ("contains", [ExprValue::Array(items), item]) => {
            ExprValue::Bool(items.iter().any(|candidate| candidate.loose_eq(item)))
        }
        ("contains", [search, item]) => ExprValue::Bool(lower(search).contains(&lower(item))),
        ("startswith", [search, prefix]) => {
            ExprValue::Bool(lower(search).starts_with(&lower(prefix)))
        }
        ("endswith", [search, suffix]) => ExprValue::Bool(lower(search).ends_with(&lower(suffix))),
        ("format", [pattern, rest @ ..]) => format(&pattern.to_string(), rest),
        ("join", [ExprValue::Array(items)]) => join(items, ","),
        ("join", [ExprValue::Array(items), separator]) => join(items, &separator.to_string()),
        ("join", [value, ..]) => ExprValue::String(value.to_string()),
        _ => ExprValue::Undefined,
    }
}

fn join(items: &[ExprValue], separator: &str) -> ExprValue {
    let parts: Vec<String> = items.iter().map(ExprValue::to_string).collect();
    ExprValue::String(parts.join(separator))
}

/// `format('{0} and {1}', a, b)`; `{{` and `}}` escape braces
fn format(pattern: &str, args: &[ExprValue]) -> ExprValue {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                match (digits.parse::<usize>(), chars.peek()) {
                    (Ok(index), Some('}')) => {
                        chars.next();
                        if let Some(arg) = args.get(index) {
                            out.push_str(&arg.to_string());
                        }
                    }
                    _ => {
                        out.push('{');
                        out.push_str(&digits);
                    }
                }
            }
            _ => out.push(ch),
        }
    }

    ExprValue::String(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> ExprValue {
        let mut context = EvalContext::new();
        context.insert(
            "env",
            ExprValue::object([
                ("A", ExprValue::Number(42.0)),
                ("B", ExprValue::Number(23.0)),
                ("NAME", ExprValue::from("Octocat")),
            ]),
        );
        context.insert(
            "github",
            ExprValue::object([(
                "event",
                ExprValue::object([(
                    "labels",
                    ExprValue::Array(vec![
                        ExprValue::object([("name", ExprValue::from("bug"))]),
                        ExprValue::object([("name", ExprValue::from("docs"))]),
                    ]),
                )]),
            )]),
        );
        let expr = parse_expression(source).expect("parse");
        evaluate(&expr, &context)
    }

    #[test]
    fn test_property_access() {
        assert_eq!(eval("env.A"), ExprValue::Number(42.0));
        assert_eq!(eval("env.a"), ExprValue::Number(42.0));
        assert_eq!(eval("env['NAME']"), ExprValue::from("Octocat"));
        assert_eq!(eval("env.MISSING"), ExprValue::Undefined);
        assert_eq!(eval("secrets.TOKEN"), ExprValue::Undefined);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("env.A == env.B"), ExprValue::Bool(false));
        assert_eq!(eval("env.A != env.B"), ExprValue::Bool(true));
        assert_eq!(eval("env.A > env.B"), ExprValue::Bool(true));
        assert_eq!(eval("env.A == '42'"), ExprValue::Bool(true));
        assert_eq!(eval("env.NAME == 'OCTOCAT'"), ExprValue::Bool(true));
    }

    #[test]
    fn test_undefined_is_absorbing_in_comparisons() {
        assert_eq!(eval("env.MISSING == env.MISSING"), ExprValue::Bool(false));
        assert_eq!(eval("env.MISSING != 1"), ExprValue::Bool(false));
        assert_eq!(eval("env.MISSING < 1"), ExprValue::Bool(false));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(eval("env.MISSING || 'fallback'"), ExprValue::from("fallback"));
        assert_eq!(eval("env.A && env.NAME"), ExprValue::from("Octocat"));
        assert_eq!(eval("!env.A"), ExprValue::Bool(false));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("contains(env.NAME, 'cat')"), ExprValue::Bool(true));
        assert_eq!(eval("startsWith(env.NAME, 'octo')"), ExprValue::Bool(true));
        assert_eq!(eval("endsWith(env.NAME, 'dog')"), ExprValue::Bool(false));
        assert_eq!(
            eval("format('{0} is {1} {{x}}', env.NAME, env.A)"),
            ExprValue::from("Octocat is 42 {x}")
        );
        assert_eq!(eval("unknown(env.A)"), ExprValue::Undefined);
        assert_eq!(eval("contains(env.MISSING, 'a')"), ExprValue::Undefined);
    }

    #[test]
    fn test_object_filter() {
        assert_eq!(
            eval("join(github.event.labels.*.name, ', ')"),
            ExprValue::from("bug, docs")
        );
        assert_eq!(
            eval("contains(github.event.labels.*.name, 'bug')"),
            ExprValue::Bool(true)
        );
    }
}
