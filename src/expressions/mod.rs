//! The `${{ ... }}` expression language
//!
//! Scanning of embedded expressions in scalar text, tokenizing, parsing and
//! evaluation against values supplied by a context provider.

mod eval;
mod lexer;
mod parser;
mod template;
mod value;

pub use eval::{evaluate, evaluate_expression, evaluate_template, resolve_context, EvalContext};
pub use lexer::{tokenize, ExpressionError, Spanned, Token};
pub use parser::{parse_expression, BinaryOp, Expr};
pub use template::{
    contains_expression, open_expression, scan_expressions, split_template, TemplateExpression,
    TemplatePart,
};
pub use value::ExprValue;
