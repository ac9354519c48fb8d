//! The content item that flows through the pipeline.
//!
//! A [`Document`] is created during Load from one content file, mutated in
//! place by Transform and Render (always by the single worker that owns it),
//! and frozen behind an `Arc` from Collect onward.
//!
//! Frontmatter keys with a fixed meaning (`title`, `slug`, `date`, `tags`,
//! `draft`, `published`, `template`, `description`) become typed fields.
//! Everything else lands in [`Document::extra`] as a [`Value`], the explicit
//! variant type the filter engine compares against.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "post";

/// A frontmatter value outside the typed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Walk nested maps along `segments`. An empty path yields `self`.
    pub fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            match current {
                Value::Map(map) => current = map.get(segment.as_ref())?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Scalar rendering used when a scalar has to live in a string list.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::List(_) | Value::Map(_) => None,
        }
    }
}

/// Integral floats print without a fractional part (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A frontmatter field whose value could not be coerced to its typed slot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("unparsable date '{0}'")]
    InvalidDate(String),
    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    path: PathBuf,
    /// Markdown source, frontmatter removed.
    pub raw: String,

    pub title: Option<String>,
    pub slug: String,
    /// Whether `slug` was given in frontmatter rather than taken from the
    /// file stem.
    #[serde(skip)]
    explicit_slug: bool,
    pub date: Option<DateTime<Utc>>,
    tags: Vec<String>,
    pub draft: bool,
    pub published: bool,
    pub template: String,
    pub description: Option<String>,
    pub extra: BTreeMap<String, Value>,

    /// Rendered HTML of `raw`. Written by Render.
    pub body: Option<String>,
    /// `body` wrapped in its template. Written by Render.
    pub page: Option<String>,
    pub word_count: Option<usize>,
    /// Minutes.
    pub reading_time: Option<u32>,
    pub url: Option<String>,
}

impl Document {
    /// A document with no frontmatter. The slug starts as the file stem.
    pub fn new(path: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        let path = path.into();
        let slug = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            raw: raw.into(),
            title: None,
            slug,
            explicit_slug: false,
            date: None,
            tags: Vec::new(),
            draft: false,
            published: true,
            template: DEFAULT_TEMPLATE.to_string(),
            description: None,
            extra: BTreeMap::new(),
            body: None,
            page: None,
            word_count: None,
            reading_time: None,
            url: None,
        }
    }

    /// Build a document from parsed frontmatter fields.
    ///
    /// `published` falls back to `!draft` when the frontmatter leaves it out.
    pub fn from_fields(
        path: impl Into<PathBuf>,
        raw: impl Into<String>,
        fields: BTreeMap<String, Value>,
    ) -> Result<Self, FieldError> {
        let mut doc = Self::new(path, raw);
        let mut published = None;

        for (key, value) in fields {
            match key.as_str() {
                "title" => doc.title = Some(expect_string("title", value)?),
                "slug" => doc.set_slug(expect_string("slug", value)?),
                "date" => {
                    let text = expect_string("date", value)?;
                    doc.date = Some(parse_date(&text).ok_or(FieldError::InvalidDate(text))?);
                }
                "tags" => doc.set_tags(tag_list(value)?),
                "draft" => doc.draft = expect_bool("draft", value)?,
                "published" => published = Some(expect_bool("published", value)?),
                "template" => doc.template = expect_string("template", value)?,
                "description" => doc.description = Some(expect_string("description", value)?),
                _ => {
                    doc.extra.insert(key, value);
                }
            }
        }

        doc.published = published.unwrap_or(!doc.draft);
        Ok(doc)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem of the source path.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Replace the tag set, dropping blanks and later duplicates.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Returns false if the tag was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into().trim().to_string();
        if tag.is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Set a slug chosen by the author. It is used as given, without
    /// stripping an ordering prefix.
    pub fn set_slug(&mut self, slug: impl Into<String>) {
        self.slug = slug.into();
        self.explicit_slug = true;
    }

    pub fn has_explicit_slug(&self) -> bool {
        self.explicit_slug
    }

    /// `title` if set, otherwise the slug.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.slug)
    }
}

fn expect_string(field: &'static str, value: Value) -> Result<String, FieldError> {
    match value {
        Value::List(_) | Value::Map(_) => Err(FieldError::WrongType {
            field,
            expected: "a string",
        }),
        scalar => scalar.scalar_string().ok_or(FieldError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn expect_bool(field: &'static str, value: Value) -> Result<bool, FieldError> {
    let wrong = FieldError::WrongType {
        field,
        expected: "a boolean",
    };
    match value {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            _ => Err(wrong),
        },
        _ => Err(wrong),
    }
}

fn tag_list(value: Value) -> Result<Vec<String>, FieldError> {
    match value {
        Value::List(items) => Ok(items),
        Value::String(s) => Ok(s.split(',').map(str::to_string).collect()),
        _ => Err(FieldError::WrongType {
            field: "tags",
            expected: "a list or comma-separated string",
        }),
    }
}

/// Parse the date forms accepted in frontmatter: RFC 3339,
/// `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DD`. Naive forms are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
