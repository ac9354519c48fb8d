//! Sort keys for feed ordering.

use crate::document::{Document, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Date,
    Title,
    WordCount,
    ReadingTime,
    Path,
    Slug,
    /// The first tag.
    FirstTag,
    /// Documents carrying the tag sort before those without it.
    HasTag(String),
    /// Any other frontmatter key, dotted for nested maps.
    Field(Vec<String>),
}

impl SortKey {
    pub fn parse(name: &str) -> SortKey {
        let name = name.trim();
        if let Some(tag) = name.strip_prefix("tag:") {
            return SortKey::HasTag(tag.trim().to_string());
        }
        match name {
            "date" => SortKey::Date,
            "title" => SortKey::Title,
            "word_count" | "wordCount" => SortKey::WordCount,
            "reading_time" | "readingTime" => SortKey::ReadingTime,
            "path" => SortKey::Path,
            "slug" => SortKey::Slug,
            "tags" => SortKey::FirstTag,
            other => SortKey::Field(other.split('.').map(str::to_string).collect()),
        }
    }

    fn extract(&self, doc: &Document) -> SortValue {
        match self {
            SortKey::Date => doc.date.map_or(SortValue::Missing, SortValue::Date),
            SortKey::Title => doc
                .title
                .clone()
                .map_or(SortValue::Missing, SortValue::Text),
            SortKey::WordCount => doc
                .word_count
                .map_or(SortValue::Missing, |n| SortValue::Number(n as f64)),
            SortKey::ReadingTime => doc
                .reading_time
                .map_or(SortValue::Missing, |n| SortValue::Number(f64::from(n))),
            SortKey::Path => SortValue::Text(doc.path().to_string_lossy().into_owned()),
            SortKey::Slug => SortValue::Text(doc.slug.clone()),
            SortKey::FirstTag => doc
                .tags()
                .first()
                .cloned()
                .map_or(SortValue::Missing, SortValue::Text),
            SortKey::HasTag(tag) => SortValue::Number(if doc.has_tag(tag) { 0.0 } else { 1.0 }),
            SortKey::Field(segments) => {
                let Some((head, rest)) = segments.split_first() else {
                    return SortValue::Missing;
                };
                match doc.extra.get(head).and_then(|v| v.lookup(rest)) {
                    Some(Value::String(s)) => SortValue::Text(s.clone()),
                    Some(Value::Number(n)) => SortValue::Number(*n),
                    Some(Value::Bool(b)) => SortValue::Bool(*b),
                    _ => SortValue::Missing,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Missing,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

/// Missing sorts lowest; values of different kinds compare equal.
fn compare_values(a: &SortValue, b: &SortValue) -> Ordering {
    use SortValue as V;
    match (a, b) {
        (V::Missing, V::Missing) => Ordering::Equal,
        (V::Missing, _) => Ordering::Less,
        (_, V::Missing) => Ordering::Greater,
        (V::Text(a), V::Text(b)) => a.cmp(b),
        (V::Number(a), V::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (V::Bool(a), V::Bool(b)) => a.cmp(b),
        (V::Date(a), V::Date(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Stable sort by `key`, reversing only the key comparison. Ties always
/// fall back to ascending path order.
pub fn sort_documents(items: &mut Vec<Arc<Document>>, key: Option<&SortKey>, reverse: bool) {
    let mut decorated: Vec<(SortValue, Arc<Document>)> = items
        .drain(..)
        .map(|doc| {
            let value = key.map_or(SortValue::Missing, |k| k.extract(&doc));
            (value, doc)
        })
        .collect();

    decorated.sort_by(|(va, a), (vb, b)| {
        let primary = compare_values(va, vb);
        let primary = if reverse { primary.reverse() } else { primary };
        primary.then_with(|| a.path().cmp(b.path()))
    });

    items.extend(decorated.into_iter().map(|(_, doc)| doc));
}
