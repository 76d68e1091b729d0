// HTML input sanitation for rich-text fields

pub const ALLOWED_HTML_TAGS_STRICT: &[&str] = &[
    "a", "img", "br", "p", "span", "blockquote", "strike", "del", "ins", "strong", "u", "em",
    "sup", "sub", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "ol", "ul", "li", "div", "table",
    "caption", "thead", "tbody", "tr", "th", "td", "b", "i", "s", "hr", "code",
];

pub const ALLOWED_HTML_TAGS_PERMISSIVE: &[&str] = &[
    "a", "img", "br", "p", "span", "blockquote", "strike", "del", "ins", "strong", "u", "em",
    "sup", "sub", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "ol", "ul", "li", "div", "table",
    "caption", "thead", "tbody", "tr", "th", "td", "b", "i", "s", "hr", "code", "video",
    "source", "iframe",
];

/// Escape every tag of `html` that is not in `allowed`.
///
/// Allowed tags keep their attributes unless an attribute is an event
/// handler (`on...`) or a `javascript:` url, in which case the whole tag is
/// escaped. Text between tags is kept as is, stray `<` and `>` are escaped.
pub fn validate_html(html: &str, allowed: &[&str]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find(['<', '>']) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if tail.starts_with('>') {
            out.push_str("&gt;");
            rest = &tail[1..];
            continue;
        }

        match tail[1..].find(['<', '>']) {
            Some(end) if tail.as_bytes()[end + 1] == b'>' => {
                let inner = &tail[1..end + 1];
                if is_allowed_tag(inner, allowed) {
                    out.push('<');
                    out.push_str(inner);
                    out.push('>');
                } else {
                    out.push_str("&lt;");
                    out.push_str(inner);
                    out.push_str("&gt;");
                }
                rest = &tail[end + 2..];
            }
            _ => {
                // no closing bracket before the next tag starts
                out.push_str("&lt;");
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_allowed_tag(inner: &str, allowed: &[&str]) -> bool {
    let body = inner.trim_start_matches('/').trim_end_matches('/');
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if name.is_empty() || !allowed.contains(&name.as_str()) {
        return false;
    }

    let attributes = body[name.len()..].to_ascii_lowercase();
    !has_event_handler(&attributes) && !attributes.contains("javascript:")
}

/// True if an `on...=` attribute starts anywhere browsers accept an attribute
/// name: after whitespace, after `/` or right after a quoted value.
fn has_event_handler(attributes: &str) -> bool {
    let bytes = attributes.as_bytes();
    attributes.match_indices("on").any(|(i, _)| {
        let boundary = i == 0
            || matches!(bytes[i - 1], b'/' | b'"' | b'\'' | b'`')
            || bytes[i - 1].is_ascii_whitespace();
        if !boundary {
            return false;
        }
        let rest = &attributes[i + 2..];
        let after = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-');
        after.len() < rest.len() && after.trim_start().starts_with('=')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_disallowed_tags() {
        assert_eq!(
            validate_html("comment<iframe></iframe>", ALLOWED_HTML_TAGS_STRICT),
            "comment&lt;iframe&gt;&lt;/iframe&gt;"
        );
    }

    #[test]
    fn test_keeps_allowed_tags() {
        let html = "<p>Hello <strong>world</strong><br/></p>";
        assert_eq!(validate_html(html, ALLOWED_HTML_TAGS_STRICT), html);
    }

    #[test]
    fn test_permissive_allows_iframe() {
        let html = "<iframe src=\"https://example.com\"></iframe>";
        assert_eq!(validate_html(html, ALLOWED_HTML_TAGS_PERMISSIVE), html);
    }

    #[test]
    fn test_event_handlers_are_escaped() {
        assert_eq!(
            validate_html("<p onclick=\"x()\">hi</p>", ALLOWED_HTML_TAGS_STRICT),
            "&lt;p onclick=\"x()\"&gt;hi</p>"
        );
    }

    #[test]
    fn test_event_handlers_after_slash_are_escaped() {
        assert_eq!(
            validate_html("<img/onerror=alert(1)>", ALLOWED_HTML_TAGS_STRICT),
            "&lt;img/onerror=alert(1)&gt;"
        );
        assert_eq!(
            validate_html("<img src=\"x\"/onerror=alert(1)>", ALLOWED_HTML_TAGS_STRICT),
            "&lt;img src=\"x\"/onerror=alert(1)&gt;"
        );
    }

    #[test]
    fn test_event_handler_after_quoted_value_is_escaped() {
        assert_eq!(
            validate_html("<img src=\"x\"onerror=alert(1)>", ALLOWED_HTML_TAGS_STRICT),
            "&lt;img src=\"x\"onerror=alert(1)&gt;"
        );
    }

    #[test]
    fn test_words_starting_with_on_are_kept() {
        let html = "<a href=\"https://example.com/online\" title=\"go online\">x</a>";
        assert_eq!(validate_html(html, ALLOWED_HTML_TAGS_STRICT), html);
    }

    #[test]
    fn test_stray_brackets() {
        assert_eq!(validate_html("1 < 2 > 0", ALLOWED_HTML_TAGS_STRICT), "1 &lt; 2 &gt; 0");
    }
}
