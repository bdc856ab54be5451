//! Page naming: the route tokenizer and the save-time name cleanup.
//!
//! The two paths stay separate. `normalize_slug` is what the
//! "Add New Page" box redirects to; `page_name_from_input` is what a page
//! save stores. They agree for ordinary titles but can differ for input
//! with punctuation or mixed scripts.

use crate::services::markdown_service::sanitize_html;

/// Turn arbitrary title text into a lowercase kebab-case slug.
///
/// Tokens are, in order of preference at each position: a run of two or more
/// capitals followed by a capitalised word or a word boundary, an optional
/// capital followed by lowercase letters and trailing digits, a lone capital,
/// or a digit run. Anything else separates tokens and is dropped.
pub fn normalize_slug(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match match_token(&chars, i) {
            Some(end) => {
                tokens.push(chars[i..end].iter().collect::<String>().to_lowercase());
                i = end;
            }
            None => i += 1,
        }
    }

    tokens.join("-")
}

/// Save-time cleanup of the submitted page name
pub fn page_name_from_input(input: &str) -> String {
    let proper = input.trim().replace(' ', "-").to_lowercase();
    sanitize_html(&proper)
}

/// `my-first-page` -> `My First Page`
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn match_token(chars: &[char], start: usize) -> Option<usize> {
    acronym_end(chars, start)
        .or_else(|| word_end(chars, start))
        .or_else(|| chars[start].is_ascii_uppercase().then_some(start + 1))
        .or_else(|| digits_end(chars, start))
}

/// Two or more capitals, backing off until the next char starts a word or a boundary follows
fn acronym_end(chars: &[char], start: usize) -> Option<usize> {
    let run = chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_uppercase())
        .count();

    (2..=run).rev().map(|len| start + len).find(|&end| {
        let capitalised_word = end + 1 < chars.len()
            && chars[end].is_ascii_uppercase()
            && chars[end + 1].is_ascii_lowercase();
        capitalised_word || is_word_boundary(chars, end)
    })
}

/// Optional capital, one or more lowercase letters, trailing digits
fn word_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    if chars[i].is_ascii_uppercase() {
        i += 1;
    }
    let lower = chars[i..]
        .iter()
        .take_while(|c| c.is_ascii_lowercase())
        .count();
    if lower == 0 {
        return None;
    }
    i += lower;
    i += chars[i..].iter().take_while(|c| c.is_ascii_digit()).count();
    Some(i)
}

fn digits_end(chars: &[char], start: usize) -> Option<usize> {
    let run = chars[start..].iter().take_while(|c| c.is_ascii_digit()).count();
    (run > 0).then_some(start + run)
}

fn is_word_boundary(chars: &[char], at: usize) -> bool {
    let before = at > 0 && is_word_char(chars[at - 1]);
    let after = at < chars.len() && is_word_char(chars[at]);
    before != after
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
