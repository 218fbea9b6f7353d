use std::{borrow::Cow, sync::OnceLock};

use regex::{Captures, Regex};

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(lt|gt|amp|quot|apos|#39|#x27|#34|#x22);")
            .expect("entity pattern must compile")
    })
}

/// Decodes HTML-entity-escaped punctuation in a single left-to-right pass.
///
/// The inference service has been seen to escape quotes and angle brackets
/// inside otherwise valid JSON, which breaks parsing unless undone first.
pub fn decode_html_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    entity_pattern().replace_all(text, |caps: &Captures<'_>| match &caps[1] {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "quot" | "#34" | "#x22" => "\"",
        _ => "'",
    })
}

pub fn strip_code_fence(text: &str) -> Option<&str> {
    let text = text.trim();
    if !text.starts_with("```") {
        return None;
    }
    let body_start = text.find('\n')? + 1;
    let body = &text[body_start..];
    let body_end = body.rfind("```").unwrap_or(body.len());
    Some(body[..body_end].trim())
}

/// Locates the first balanced top-level JSON object in free text.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = strip_code_fence(text).unwrap_or(text);
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
