//! Recursive-descent parser for the expression language
//!
//! Precedence, lowest first: `||`, `&&`, `==`/`!=`, `<`/`<=`/`>`/`>=`,
//! unary `!`, then postfix property access, indexing and object filters.

use super::lexer::{tokenize, ExpressionError, Spanned, Token};
use super::value::ExprValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ExprValue),
    /// Root context namespace such as `env` or `github`
    Ident(String),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// `base.*`: every element or property value of `base`
    Filter(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Root namespaces referenced anywhere in the expression
    pub fn roots(&self) -> Vec<String> {
        let mut roots = Vec::new();
        self.collect_roots(&mut roots);
        roots
    }

    fn collect_roots(&self, roots: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => {
                if !roots.iter().any(|root| root.eq_ignore_ascii_case(name)) {
                    roots.push(name.clone());
                }
            }
            Expr::Property(base, _) | Expr::Filter(base) | Expr::Not(base) => {
                base.collect_roots(roots)
            }
            Expr::Index(base, index) | Expr::Binary(_, base, index) => {
                base.collect_roots(roots);
                index.collect_roots(roots);
            }
            Expr::Call(_, args) => args.iter().for_each(|arg| arg.collect_roots(roots)),
        }
    }
}

/// Parse the source of one expression (the text between `${{` and `}}`)
pub fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(unexpected(extra)),
    }
}

fn unexpected(spanned: &Spanned) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        found: spanned.token.describe(),
        position: spanned.position,
    }
}

struct ExprParser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Result<Spanned, ExpressionError> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(spanned)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExpressionError> {
        let spanned = self.advance()?;
        if &spanned.token == token {
            Ok(())
        } else {
            Err(unexpected(&spanned))
        }
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(&[(Token::Or, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(&[(Token::And, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[(Token::Eq, BinaryOp::Eq), (Token::Ne, BinaryOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            let operand = self.unary()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let spanned = self.advance()?;
                expr = match spanned.token {
                    Token::Star => Expr::Filter(Box::new(expr)),
                    Token::Ident(name) => Expr::Property(Box::new(expr), name),
                    Token::Null | Token::True | Token::False => {
                        Expr::Property(Box::new(expr), spanned.token.describe())
                    }
                    _ => return Err(unexpected(&spanned)),
                };
            } else if self.eat(&Token::LBracket) {
                if self.eat(&Token::Star) {
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Filter(Box::new(expr));
                } else {
                    let index = self.or()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let spanned = self.advance()?;
        match spanned.token {
            Token::Null => Ok(Expr::Literal(ExprValue::Null)),
            Token::True => Ok(Expr::Literal(ExprValue::Bool(true))),
            Token::False => Ok(Expr::Literal(ExprValue::Bool(false))),
            Token::Number(n) => Ok(Expr::Literal(ExprValue::Number(n))),
            Token::String(s) => Ok(Expr::Literal(ExprValue::String(s))),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Ident(name));
                }
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                let expr = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            _ => Err(unexpected(&spanned)),
        }
    }
}
