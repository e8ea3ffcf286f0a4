//! Markdown to sanitized HTML.
//!
//! LLM answers are markdown. They are rendered with `pulldown-cmark` and
//! passed through an `ammonia` allow-list before reaching the browser, so
//! scripts, event handlers and `data-*` attributes never survive.

use pulldown_cmark::{html, Options, Parser};

/// Tags allowed on top of ammonia's defaults.
const EXTRA_TAGS: &[&str] = &[
    "pre", "code", "table", "thead", "tbody", "tr", "th", "td", "blockquote", "hr", "img",
];

/// Renders markdown answers into safe HTML fragments.
pub struct MarkdownRenderer {
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut sanitizer = ammonia::Builder::default();
        sanitizer
            .add_tags(EXTRA_TAGS)
            .add_generic_attributes(&["title", "class"])
            .add_tag_attributes("a", &["href", "target"])
            .add_tag_attributes("img", &["src", "alt"]);
        Self { sanitizer }
    }

    /// Render `markdown` and sanitize the result.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);

        let parser = Parser::new_ext(markdown, options);
        let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut unsafe_html, parser);

        self.sanitizer.clean(&unsafe_html).to_string()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}
