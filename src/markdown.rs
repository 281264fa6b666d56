//! Markdown rendering for BHAP content
//!
//! Single newlines inside a paragraph are kept as line breaks.

use pulldown_cmark::{html, Event, Options, Parser};

/// Render markdown to HTML, turning soft line breaks into `<br />`
pub fn render(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_line_breaks() {
        assert_eq!(render("first\nsecond"), "<p>first<br />\nsecond</p>\n");
    }

    #[test]
    fn test_headings_and_emphasis() {
        let html = render("# Motivation\n\nThis is *important*.");
        assert!(html.contains("<h1>Motivation</h1>"));
        assert!(html.contains("<em>important</em>"));
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(render(""), "");
    }
}
