//! Markdown to sanitised HTML for post bodies.

use std::collections::{HashMap, HashSet};

use ammonia::Builder as AmmoniaBuilder;
use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::Options,
    parse_document,
};
use slug::slugify;
use thiserror::Error;

/// Headings deeper than this are left out of the table of contents.
const TOC_MAX_LEVEL: u8 = 3;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown formatting failed: {message}")]
    Markdown { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub anchor: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RenderedMarkdown {
    pub html: String,
    pub headings: Vec<Heading>,
    pub contains_code: bool,
}

impl RenderedMarkdown {
    /// Headings worth listing in a table of contents.
    pub fn toc(&self) -> impl Iterator<Item = &Heading> {
        self.headings
            .iter()
            .filter(|heading| (2..=TOC_MAX_LEVEL).contains(&heading.level))
    }
}

/// Comrak rendering with GitHub-flavoured extensions and Ammonia sanitisation.
pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> Result<RenderedMarkdown, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut slugger = AnchorSlugger::default();
        let mut headings = Vec::new();
        let mut contains_code = false;

        for node in root.descendants() {
            let (level, is_code) = {
                let data = node.data.borrow();
                match &data.value {
                    NodeValue::Heading(heading) => (Some(heading.level), false),
                    NodeValue::CodeBlock(_) => (None, true),
                    _ => (None, false),
                }
            };
            contains_code |= is_code;

            if let Some(level) = level {
                let text = collect_inline_text(node);
                let anchor = slugger.anchor_for(&text);
                self.anchor_heading(node, level, &anchor)?;
                headings.push(Heading {
                    level,
                    anchor,
                    text: text.trim().to_string(),
                });
            }
        }

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(RenderedMarkdown {
            html: self.sanitizer.clean(&html).to_string(),
            headings,
            contains_code,
        })
    }

    /// Replace the heading with raw HTML carrying an `id` so it can be linked.
    fn anchor_heading<'a>(
        &self,
        node: &'a AstNode<'a>,
        level: u8,
        anchor: &str,
    ) -> Result<(), RenderError> {
        let mut rendered = String::new();
        format_html(node, &self.options, &mut rendered).map_err(|err| {
            RenderError::Markdown {
                message: err.to_string(),
            }
        })?;

        let open = format!("<h{level}>");
        let literal = rendered.replacen(&open, &format!("<h{level} id=\"{anchor}\">"), 1);

        while let Some(child) = node.first_child() {
            child.detach();
        }
        node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal,
        });
        Ok(())
    }
}

#[derive(Default)]
struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
}

impl AnchorSlugger {
    /// Unique anchor for a heading; repeats get a numeric suffix.
    fn anchor_for(&mut self, heading: &str) -> String {
        let mut base = slugify(heading);
        if base.is_empty() {
            base = "section".to_string();
        }
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            base
        } else {
            format!("{base}-{}", *count)
        }
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.r#unsafe = true;
    render.figure_with_caption = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "dd",
        "del",
        "div",
        "dl",
        "dt",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "input",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "aria-hidden",
        "aria-label",
        "role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("img", &["width", "height", "alt", "loading", "decoding"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);

    builder.url_schemes(HashSet::from(["http", "https", "mailto", "tel"]));
    builder.link_rel(Some("noopener noreferrer"));

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_get_unique_anchors() {
        let renderer = MarkdownRenderer::new();
        let output = renderer
            .render("## Overview\n\ntext\n\n## Overview\n\n### Deep `dive`\n")
            .expect("render");

        assert!(output.html.contains("<h2 id=\"overview\">Overview</h2>"));
        assert!(output.html.contains("<h2 id=\"overview-2\">"));
        let anchors: Vec<&str> = output
            .toc()
            .map(|heading| heading.anchor.as_str())
            .collect();
        assert_eq!(anchors, vec!["overview", "overview-2", "deep-dive"]);
    }

    #[test]
    fn scripts_and_javascript_links_are_removed() {
        let renderer = MarkdownRenderer::new();
        let source = concat!(
            "<script>alert(1)</script>\n\n",
            "[click](javascript:alert(1)) <img src=x onerror=alert(1)>",
        );
        let output = renderer.render(source).expect("render");

        assert!(!output.html.contains("<script"));
        assert!(!output.html.contains("javascript:"));
        assert!(!output.html.contains("onerror"));
    }

    #[test]
    fn tables_and_code_blocks_render() {
        let renderer = MarkdownRenderer::new();
        let output = renderer
            .render("| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n")
            .expect("render");

        assert!(output.html.contains("<table>"));
        assert!(output.html.contains("<pre lang=\"rust\">"));
        assert!(output.contains_code);
    }

    #[test]
    fn links_carry_noopener() {
        let renderer = MarkdownRenderer::new();
        let output = renderer
            .render("[docs](https://docs.rs)")
            .expect("render");
        assert!(output.html.contains("rel=\"noopener noreferrer\""));
    }
}
