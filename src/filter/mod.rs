//! Filter expressions: a small boolean language for selecting documents.
//!
//! ```text
//! published == true and 'rust' in tags
//! (date >= '2024-01-01' or featured == true) and not draft == true
//! author.name == 'Ana'
//! ```
//!
//! Parsing happens once per feed; [`Filter::matches`] is pure and read-only,
//! so the same filter can be evaluated from many threads at once.
//!
//! A field that a document lacks, or a comparison between incompatible
//! types, is simply false. The language selects; it does not type-check.

mod eval;
mod lexer;
mod parser;

pub use lexer::CompareOp;
pub use parser::FieldRef;

use crate::document::Document;
use std::str::FromStr;
use thiserror::Error;

const FRAGMENT_LEN: usize = 24;

/// A malformed filter expression.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at position {position} near '{fragment}'")]
pub struct FilterError {
    /// Byte offset into the expression.
    pub position: usize,
    pub fragment: String,
    pub message: String,
}

impl FilterError {
    pub(crate) fn at(source: &str, position: usize, message: impl Into<String>) -> Self {
        let fragment = match source.get(position..) {
            Some(rest) if !rest.trim().is_empty() => rest
                .split_whitespace()
                .next()
                .unwrap_or(rest)
                .chars()
                .take(FRAGMENT_LEN)
                .collect(),
            _ => source
                .split_whitespace()
                .last()
                .unwrap_or_default()
                .chars()
                .take(FRAGMENT_LEN)
                .collect(),
        };
        Self {
            position,
            fragment,
            message: message.into(),
        }
    }
}

/// A parsed, reusable filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    expr: parser::Expr,
}

impl Filter {
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    /// The filter that selects everything.
    pub fn all() -> Self {
        Self {
            source: String::new(),
            expr: parser::Expr::Const(true),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        eval::evaluate(&self.expr, doc)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, doc: &Document) -> Result<bool, FilterError> {
    Ok(Filter::parse(source)?.matches(doc))
}
