//! Frontmatter splitting.
//!
//! A content file may open with a metadata block:
//!
//! ```text
//! ---                 +++
//! title: Hello        title = "Hello"
//! tags: [a, b]        tags = ["a", "b"]
//! ---                 +++
//! Body text...        Body text...
//! ```
//!
//! YAML between `---` fences, TOML between `+++` fences. A file without an
//! opening fence has no frontmatter and is all body. The parsed block is
//! coerced into [`Value`]s: numbers become `Number`, sequences become string
//! lists (non-scalar items dropped), tables become `Map`, null removes the key.

use crate::document::{Value, format_number};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("frontmatter opened with '{0}' is never closed")]
    Unterminated(&'static str),
    #[error("invalid YAML frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML frontmatter: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("frontmatter must be a key/value mapping")]
    NotAMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn fence(self) -> &'static str {
        match self {
            Format::Yaml => "---",
            Format::Toml => "+++",
        }
    }
}

/// Parsed frontmatter plus the remaining body text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub fields: BTreeMap<String, Value>,
    pub body: String,
}

/// Split `source` into frontmatter fields and body.
pub fn parse(source: &str) -> Result<Frontmatter, FrontmatterError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some((format, rest)) = opening_fence(source) else {
        return Ok(Frontmatter {
            fields: BTreeMap::new(),
            body: source.to_string(),
        });
    };

    let (block, body) = split_at_closing(rest, format)?;
    let fields = match format {
        Format::Yaml => yaml_fields(block)?,
        Format::Toml => toml_fields(block)?,
    };
    Ok(Frontmatter {
        fields,
        body: body.to_string(),
    })
}

fn opening_fence(source: &str) -> Option<(Format, &str)> {
    let (first, rest) = match source.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (source, ""),
    };
    match first.trim_end() {
        "---" => Some((Format::Yaml, rest)),
        "+++" => Some((Format::Toml, rest)),
        _ => None,
    }
}

/// Returns (block, body). YAML blocks may also close with `...`.
fn split_at_closing(rest: &str, format: Format) -> Result<(&str, &str), FrontmatterError> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let closes = trimmed == format.fence() || (format == Format::Yaml && trimmed == "...");
        if closes {
            let body = &rest[offset + line.len()..];
            return Ok((&rest[..offset], body));
        }
        offset += line.len();
    }
    Err(FrontmatterError::Unterminated(format.fence()))
}

fn yaml_fields(block: &str) -> Result<BTreeMap<String, Value>, FrontmatterError> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(block)?;
    match parsed {
        serde_yaml::Value::Null => Ok(BTreeMap::new()),
        serde_yaml::Value::Mapping(map) => Ok(yaml_mapping(map)),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

fn yaml_mapping(map: serde_yaml::Mapping) -> BTreeMap<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let key = match from_yaml(key)? {
                Value::List(_) | Value::Map(_) => return None,
                scalar => scalar.scalar_string()?,
            };
            Some((key, from_yaml(value)?))
        })
        .collect()
}

fn from_yaml(value: serde_yaml::Value) -> Option<Value> {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => None,
        Y::Bool(b) => Some(Value::Bool(b)),
        Y::Number(n) => n.as_f64().map(Value::Number),
        Y::String(s) => Some(Value::String(s)),
        Y::Sequence(items) => Some(Value::List(
            items
                .into_iter()
                .filter_map(from_yaml)
                .filter_map(|v| v.scalar_string())
                .collect(),
        )),
        Y::Mapping(map) => Some(Value::Map(yaml_mapping(map))),
        Y::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn toml_fields(block: &str) -> Result<BTreeMap<String, Value>, FrontmatterError> {
    let table: toml::Table = toml::from_str(block)?;
    Ok(toml_table(table))
}

fn toml_table(table: toml::Table) -> BTreeMap<String, Value> {
    table
        .into_iter()
        .map(|(key, value)| (key, from_toml(value)))
        .collect()
}

fn from_toml(value: toml::Value) -> Value {
    use toml::Value as T;
    match value {
        T::String(s) => Value::String(s),
        T::Integer(i) => Value::Number(i as f64),
        T::Float(f) => Value::Number(f),
        T::Boolean(b) => Value::Bool(b),
        T::Datetime(dt) => Value::String(dt.to_string()),
        T::Array(items) => Value::List(
            items
                .into_iter()
                .filter_map(|item| match item {
                    T::String(s) => Some(s),
                    T::Integer(i) => Some(i.to_string()),
                    T::Float(f) => Some(format_number(f)),
                    T::Boolean(b) => Some(b.to_string()),
                    T::Datetime(dt) => Some(dt.to_string()),
                    T::Array(_) | T::Table(_) => None,
                })
                .collect(),
        ),
        T::Table(table) => Value::Map(toml_table(table)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fence_means_all_body() {
        let fm = parse("# Title\n\nText").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "# Title\n\nText");
    }

    #[test]
    fn yaml_block_is_split_from_body() {
        let fm = parse("---\ntitle: Hello\ncount: 3\n---\nBody\n").unwrap();
        assert_eq!(fm.fields["title"], Value::String("Hello".into()));
        assert_eq!(fm.fields["count"], Value::Number(3.0));
        assert_eq!(fm.body, "Body\n");
    }

    #[test]
    fn yaml_block_may_close_with_dots() {
        let fm = parse("---\ntitle: Hello\n...\nBody").unwrap();
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn toml_block_is_split_from_body() {
        let fm = parse("+++\ntitle = \"Hi\"\ndate = 2024-01-02\ntags = [\"a\", 1]\n+++\nBody").unwrap();
        assert_eq!(fm.fields["title"], Value::String("Hi".into()));
        assert_eq!(fm.fields["date"], Value::String("2024-01-02".into()));
        assert_eq!(
            fm.fields["tags"],
            Value::List(vec!["a".into(), "1".into()])
        );
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn sequences_keep_scalars_only() {
        let fm = parse("---\ntags: [rust, 2, true, {a: b}]\n---\n").unwrap();
        assert_eq!(
            fm.fields["tags"],
            Value::List(vec!["rust".into(), "2".into(), "true".into()])
        );
    }

    #[test]
    fn null_values_drop_the_key() {
        let fm = parse("---\ntitle: ~\nslug: x\n---\n").unwrap();
        assert!(!fm.fields.contains_key("title"));
        assert!(fm.fields.contains_key("slug"));
    }

    #[test]
    fn nested_maps_are_preserved() {
        let fm = parse("---\nauthor:\n  name: Ana\n---\n").unwrap();
        assert_eq!(
            fm.fields["author"].lookup(&["name"]),
            Some(&Value::String("Ana".into()))
        );
    }

    #[test]
    fn empty_block_is_valid() {
        let fm = parse("---\n---\nBody").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn unterminated_block_errors() {
        let err = parse("---\ntitle: Hello\nBody").unwrap_err();
        assert!(matches!(err, FrontmatterError::Unterminated("---")));
    }

    #[test]
    fn scalar_block_is_not_a_mapping() {
        let err = parse("---\njust a string\n---\n").unwrap_err();
        assert!(matches!(err, FrontmatterError::NotAMapping));
    }

    #[test]
    fn invalid_yaml_errors() {
        assert!(matches!(
            parse("---\ntitle: [unclosed\n---\n"),
            Err(FrontmatterError::Yaml(_))
        ));
    }
}
