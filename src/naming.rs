//! Filename conventions for content files.
//!
//! Content files may carry an ordering prefix, `NNN-name.md`, so that they
//! sort the way the author wants in a file browser. The prefix is never part
//! of the published slug:
//!
//! - `020-hello-world.md` → slug `hello-world`
//! - `notes.md` → slug `notes`
//! - `2024-05-01-launch.md` → slug `05-01-launch` (only the first group is an order prefix)
//!
//! Slugs that come from frontmatter or titles go through [`slugify`] so they
//! are always safe in URLs and on disk.

/// A file stem split into its optional order prefix and the remaining name.
#[derive(Debug, Clone, PartialEq)]
pub struct StemParts<'a> {
    pub order: Option<u32>,
    pub name: &'a str,
}

/// Split a file stem on the `NNN-` convention.
///
/// A stem that is only digits keeps the digits as its name, so `404.md` is
/// published as `404` rather than as an empty slug.
pub fn split_stem(stem: &str) -> StemParts<'_> {
    if let Some((prefix, rest)) = stem.split_once('-')
        && !prefix.is_empty()
        && !rest.is_empty()
        && let Ok(order) = prefix.parse::<u32>()
    {
        return StemParts {
            order: Some(order),
            name: rest,
        };
    }
    StemParts {
        order: None,
        name: stem,
    }
}

/// Title derived from a stem when the document declares none.
pub fn title_from_stem(stem: &str) -> String {
    split_stem(stem).name.replace(['-', '_'], " ")
}

pub const MAX_SLUG_LEN: usize = 80;

/// Lowercase a string and reduce it to `[a-z0-9-]`.
///
/// Runs of anything else become a single dash, leading and trailing dashes
/// are dropped, and results longer than [`MAX_SLUG_LEN`] are cut at the last
/// dash before the limit.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    let truncated = &slug[..MAX_SLUG_LEN];
    match truncated.rfind('-') {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated.to_string(),
    }
}
