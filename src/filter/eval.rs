//! Evaluation of a parsed expression against one document.
//!
//! Every field resolves to a [`Resolved`] value. Comparisons only succeed
//! between compatible variants; an absent field or a type mismatch makes the
//! comparison false, `!=` included.

use super::lexer::CompareOp;
use super::parser::{Expr, FieldRef, Operand};
use crate::document::{Document, Value, parse_date};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved<'a> {
    Str(Cow<'a, str>),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    List(&'a [String]),
    /// A nested map. Exists, but compares with nothing.
    Map,
    Absent,
}

pub(crate) fn evaluate(expr: &Expr, doc: &Document) -> bool {
    match expr {
        Expr::Const(b) => *b,
        Expr::Not(inner) => !evaluate(inner, doc),
        Expr::And(terms) => terms.iter().all(|t| evaluate(t, doc)),
        Expr::Or(terms) => terms.iter().any(|t| evaluate(t, doc)),
        Expr::Compare { field, op, value } => {
            let left = resolve(doc, field);
            let right = match value {
                Operand::Str(s) => Resolved::Str(Cow::Borrowed(s)),
                Operand::Number(n) => Resolved::Number(*n),
                Operand::Bool(b) => Resolved::Bool(*b),
                Operand::Field(other) => resolve(doc, other),
            };
            compare(&left, *op, &right)
        }
        Expr::Contains { needle, field } => match resolve(doc, field) {
            Resolved::List(items) => items.iter().any(|item| item == needle),
            _ => false,
        },
    }
}

/// Built-in fields first, then the extension map with dotted descent.
pub(crate) fn resolve<'a>(doc: &'a Document, field: &FieldRef) -> Resolved<'a> {
    let Some((head, rest)) = field.segments.split_first() else {
        return Resolved::Absent;
    };

    if let Some(builtin) = builtin(doc, head) {
        return if rest.is_empty() {
            builtin
        } else {
            Resolved::Absent
        };
    }

    match doc.extra.get(head.as_str()).and_then(|v| v.lookup(rest)) {
        Some(Value::String(s)) => Resolved::Str(Cow::Borrowed(s)),
        Some(Value::Number(n)) => Resolved::Number(*n),
        Some(Value::Bool(b)) => Resolved::Bool(*b),
        Some(Value::List(items)) => Resolved::List(items),
        Some(Value::Map(_)) => Resolved::Map,
        None => Resolved::Absent,
    }
}

fn builtin<'a>(doc: &'a Document, name: &str) -> Option<Resolved<'a>> {
    fn opt_str(value: &Option<String>) -> Resolved<'_> {
        value
            .as_deref()
            .map_or(Resolved::Absent, |s| Resolved::Str(Cow::Borrowed(s)))
    }

    let resolved = match name {
        "title" => opt_str(&doc.title),
        "slug" => Resolved::Str(Cow::Borrowed(&doc.slug)),
        "date" => doc.date.map_or(Resolved::Absent, Resolved::Date),
        "tags" => Resolved::List(doc.tags()),
        "draft" => Resolved::Bool(doc.draft),
        "published" => Resolved::Bool(doc.published),
        "template" => Resolved::Str(Cow::Borrowed(&doc.template)),
        "path" => Resolved::Str(doc.path().to_string_lossy()),
        "url" => opt_str(&doc.url),
        "description" => opt_str(&doc.description),
        "word_count" | "wordCount" => doc
            .word_count
            .map_or(Resolved::Absent, |n| Resolved::Number(n as f64)),
        "reading_time" | "readingTime" => doc
            .reading_time
            .map_or(Resolved::Absent, |n| Resolved::Number(f64::from(n))),
        _ => return None,
    };
    Some(resolved)
}

fn compare(left: &Resolved<'_>, op: CompareOp, right: &Resolved<'_>) -> bool {
    use Resolved as R;
    let ordering = match (left, right) {
        (R::Absent, _) | (_, R::Absent) => None,
        (R::Str(a), R::Str(b)) => Some(a.cmp(b)),
        (R::Number(a), R::Number(b)) => a.partial_cmp(b),
        (R::Date(a), R::Date(b)) => Some(a.cmp(b)),
        (R::Date(a), R::Str(b)) => parse_date(b).map(|b| a.cmp(&b)),
        (R::Str(a), R::Date(b)) => parse_date(a).map(|a| a.cmp(b)),
        (R::Bool(a), R::Bool(b)) => {
            return match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => false,
            };
        }
        _ => None,
    };
    ordering.is_some_and(|ord| matches_ordering(op, ord))
}

fn matches_ordering(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
    }
}
