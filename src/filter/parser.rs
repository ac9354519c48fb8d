//! Recursive-descent parser producing the expression tree.
//!
//! Precedence, lowest first: `or`, `and`, `not`, atom.

use super::FilterError;
use super::lexer::{CompareOp, Token, TokenKind, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Const(bool),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Operand,
    },
    /// `'needle' in field`
    Contains { needle: String, field: FieldRef },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Str(String),
    Number(f64),
    Bool(bool),
    Field(FieldRef),
}

/// Dotted field path, e.g. `author.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub segments: Vec<String>,
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

pub(crate) fn parse(source: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Ok(Expr::Const(true));
    }
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(token.start, "unexpected token after expression"));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> FilterError {
        FilterError::at(self.source, position, message)
    }

    /// Error pointing at the current token, or at the end of input.
    fn error_here(&self, message: &str) -> FilterError {
        match self.peek() {
            Some(token) => self.error_at(token.start, message),
            None => self.error_at(self.source.len(), format!("{message}, found end of expression")),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.and_expr()?];
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.advance();
            terms.push(self.and_expr()?);
        }
        Ok(collapse(terms, Expr::Or))
    }

    fn and_expr(&mut self) -> Result<Expr, FilterError> {
        let mut terms = vec![self.unary()?];
        while self.peek_kind() == Some(&TokenKind::And) {
            self.advance();
            terms.push(self.unary()?);
        }
        Ok(collapse(terms, Expr::And))
    }

    fn unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek_kind() == Some(&TokenKind::Not) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, FilterError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("expected an expression"));
        };
        match token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.or_expr()?;
                match self.peek_kind() {
                    Some(TokenKind::RParen) => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(self.error_here("expected ')'")),
                }
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Const(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Const(false))
            }
            TokenKind::Str(needle) => {
                self.advance();
                match self.peek_kind() {
                    Some(TokenKind::In) => {
                        self.advance();
                    }
                    _ => return Err(self.error_here("expected 'in' after string literal")),
                }
                let field = self.field_ref()?;
                Ok(Expr::Contains { needle, field })
            }
            TokenKind::Ident(_) => self.comparison(),
            _ => Err(self.error_at(token.start, "expected a field, literal or '('")),
        }
    }

    fn comparison(&mut self) -> Result<Expr, FilterError> {
        let field = self.field_ref()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Op(op)) => *op,
            _ => return Err(self.error_here("expected a comparison operator")),
        };
        self.advance();
        let value = self.operand()?;
        Ok(Expr::Compare { field, op, value })
    }

    fn operand(&mut self) -> Result<Operand, FilterError> {
        match self.peek_kind() {
            Some(TokenKind::Str(s)) => {
                let s = s.clone();
                self.advance();
                Ok(Operand::Str(s))
            }
            Some(TokenKind::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Operand::Number(n))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Operand::Bool(true))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Operand::Bool(false))
            }
            Some(TokenKind::Ident(_)) => Ok(Operand::Field(self.field_ref()?)),
            _ => Err(self.error_here("expected a value")),
        }
    }

    fn field_ref(&mut self) -> Result<FieldRef, FilterError> {
        let mut segments = vec![self.identifier()?];
        while self.peek_kind() == Some(&TokenKind::Dot) {
            self.advance();
            segments.push(self.identifier()?);
        }
        Ok(FieldRef { segments })
    }

    fn identifier(&mut self) -> Result<String, FilterError> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here("expected a field name")),
        }
    }
}

fn collapse(mut terms: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}
