use std::sync::OnceLock;

use ammonia::Builder;
use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};

const URL_PREFIXES: [&str; 3] = ["https://", "http://", "www."];

/// Service for turning page markdown into display-safe HTML
#[derive(Clone, Copy, Default)]
pub struct MarkdownService;

impl MarkdownService {
    /// Create a new markdown service
    pub fn new() -> Self {
        Self
    }

    /// Render page content for display
    pub fn render(&self, content: &str) -> String {
        render_markdown(content)
    }

    /// Clean an arbitrary HTML fragment
    pub fn sanitize(&self, fragment: &str) -> String {
        sanitize_html(fragment)
    }
}

/// Markdown to HTML with the extended option set, then a sanitize pass.
///
/// Soft line breaks are emitted as hard breaks so that single newlines in the
/// editor show up as line breaks on the page. Bare `http://`, `https://` and
/// `www.` URLs in running text become links.
pub fn render_markdown(content: &str) -> String {
    let events = TextMergeStream::new(Parser::new_ext(content, markdown_options())).map(|event| {
        match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        }
    });
    let parser = autolink(events);

    let mut out = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut out, parser);
    sanitize_html(&out)
}

/// Strip scripts, event handlers, unsafe URL schemes and unknown tags
pub fn sanitize_html(fragment: &str) -> String {
    sanitizer().clean(fragment).to_string()
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Wrap bare URLs found in text events in links, leaving code blocks and existing links alone
fn autolink<'a>(events: impl Iterator<Item = Event<'a>>) -> impl Iterator<Item = Event<'a>> {
    let mut link_depth = 0usize;
    let mut in_code_block = false;

    events.flat_map(move |event| {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. }) => link_depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image) => link_depth = link_depth.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            _ => {}
        }

        match event {
            Event::Text(text) if link_depth == 0 && !in_code_block => link_bare_urls(text),
            other => vec![other],
        }
    })
}

fn link_bare_urls(text: CowStr<'_>) -> Vec<Event<'_>> {
    if next_url(&text).is_none() {
        return vec![Event::Text(text)];
    }

    let mut events = Vec::new();
    let mut rest: &str = &text;
    while let Some((start, end)) = next_url(rest) {
        if start > 0 {
            events.push(Event::Text(CowStr::from(rest[..start].to_string())));
        }
        let url = &rest[start..end];
        let dest = if url.starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(dest),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        events.push(Event::Text(CowStr::from(url.to_string())));
        events.push(Event::End(TagEnd::Link));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        events.push(Event::Text(CowStr::from(rest.to_string())));
    }
    events
}

/// Byte range of the first bare URL in `text`, if any
fn next_url(text: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    loop {
        let (start, prefix) = URL_PREFIXES
            .iter()
            .filter_map(|prefix| text[from..].find(prefix).map(|i| (from + i, *prefix)))
            .min_by_key(|(i, _)| *i)?;

        let starts_word = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && !matches!(c, '/' | '@' | '.'));

        let mut end = text[start..]
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"'))
            .map_or(text.len(), |i| start + i);
        end = trim_url_end(text, start, end);

        if starts_word && end > start + prefix.len() {
            return Some((start, end));
        }
        // prefixes start with an ASCII byte, so this stays on a char boundary
        from = start + 1;
    }
}

/// Drop trailing sentence punctuation and unbalanced closing parentheses
fn trim_url_end(text: &str, start: usize, mut end: usize) -> usize {
    while let Some(last) = text[start..end].chars().next_back() {
        let unbalanced_paren = last == ')'
            && text[start..end].matches(')').count() > text[start..end].matches('(').count();
        if matches!(last, '.' | ',' | ':' | ';' | '!' | '?' | '\'' | '*' | '_') || unbalanced_paren {
            end -= last.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn sanitizer() -> &'static Builder<'static> {
    static SANITIZER: OnceLock<Builder<'static>> = OnceLock::new();
    SANITIZER.get_or_init(|| {
        let mut builder = Builder::default();
        // task list checkboxes, footnote anchors and heading attributes
        builder
            .add_tags(["input"])
            .add_tag_attributes("input", ["type", "checked", "disabled"])
            .add_generic_attributes(["id", "class"]);
        builder
    })
}
