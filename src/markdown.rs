//! Markdown rendering and plain-text statistics.
//!
//! Thin wrappers over pulldown-cmark. Everything here is a pure function of
//! its inputs, which is what lets Render cache the output by content hash.

use crate::config::MarkdownConfig;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

pub fn options(config: &MarkdownConfig) -> Options {
    let mut options = Options::empty();
    options.set(Options::ENABLE_TABLES, config.tables);
    options.set(Options::ENABLE_FOOTNOTES, config.footnotes);
    options.set(Options::ENABLE_STRIKETHROUGH, config.strikethrough);
    options.set(Options::ENABLE_TASKLISTS, config.tasklists);
    options.set(Options::ENABLE_SMART_PUNCTUATION, config.smart_punctuation);
    options.set(Options::ENABLE_HEADING_ATTRIBUTES, config.heading_attributes);
    options
}

/// Render Markdown to HTML.
pub fn to_html(source: &str, config: &MarkdownConfig) -> String {
    let parser = Parser::new_ext(source, options(config));
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Words of visible text. Code blocks count, markup and URLs do not.
pub fn word_count(source: &str) -> usize {
    Parser::new(source)
        .map(|event| match event {
            Event::Text(text) | Event::Code(text) => text.split_whitespace().count(),
            _ => 0,
        })
        .sum()
}

/// Minutes to read `words` at `words_per_minute`, rounded up. Zero words
/// take zero minutes; anything else takes at least one.
pub fn reading_time(words: usize, words_per_minute: u32) -> u32 {
    if words == 0 {
        return 0;
    }
    let wpm = words_per_minute.max(1) as usize;
    u32::try_from(words.div_ceil(wpm)).unwrap_or(u32::MAX).max(1)
}

/// Plain text of the first paragraph, if there is one.
pub fn first_paragraph(source: &str) -> Option<String> {
    let mut text = String::new();
    let mut inside = false;
    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Paragraph) => inside = true,
            Event::End(TagEnd::Paragraph) if inside => break,
            Event::Text(t) | Event::Code(t) if inside => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if inside => text.push(' '),
            _ => {}
        }
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Cut `text` to at most `max` characters on a word boundary, adding `…`.
pub fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation()))
}
