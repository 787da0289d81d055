//! Argument splitting for directive bodies.

use std::borrow::Cow;

/// Split a directive body on `separator` at nesting depth zero. Separators
/// inside `{{ }}`, `[[ ]]` or comments do not split.
pub fn split_args<'a>(body: &'a str, separator: &str) -> Vec<&'a str> {
    let bytes = body.as_bytes();
    let sep = separator.as_bytes();
    let mut parts = Vec::new();
    let (mut braces, mut brackets) = (0usize, 0usize);
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(b"<!--") {
            i = body[i..]
                .find("-->")
                .map(|j| i + j + 3)
                .unwrap_or(bytes.len());
        } else if rest.starts_with(b"{{") {
            braces += 1;
            i += 2;
        } else if rest.starts_with(b"}}") && braces > 0 {
            braces -= 1;
            i += 2;
        } else if rest.starts_with(b"[[") {
            brackets += 1;
            i += 2;
        } else if rest.starts_with(b"]]") && brackets > 0 {
            brackets -= 1;
            i += 2;
        } else if braces == 0 && brackets == 0 && !sep.is_empty() && rest.starts_with(sep) {
            parts.push(&body[start..i]);
            i += sep.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Remove `<!-- -->` comments; an unterminated comment runs to the end.
pub fn strip_comments(text: &str) -> Cow<'_, str> {
    if !text.contains("<!--") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("<!--") {
        out.push_str(&rest[..open]);
        match rest[open + 4..].find("-->") {
            Some(close) => rest = &rest[open + 4 + close + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Argument value as stored: comments removed, whitespace trimmed.
pub fn clean_value(raw: &str) -> String {
    strip_comments(raw).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_args("T|a|b", "|"), vec!["T", "a", "b"]);
        assert_eq!(split_args("T", "|"), vec!["T"]);
        assert_eq!(split_args("T||", "|"), vec!["T", "", ""]);
    }

    #[test]
    fn test_split_respects_nesting() {
        assert_eq!(
            split_args("T|{{x|y}}|[[P|label]]|z", "|"),
            vec!["T", "{{x|y}}", "[[P|label]]", "z"]
        );
        assert_eq!(split_args("T|a<!--|-->b", "|"), vec!["T", "a<!--|-->b"]);
    }

    #[test]
    fn test_split_multichar_separator() {
        assert_eq!(split_args("T;;a;b;;c", ";;"), vec!["T", "a;b", "c"]);
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("  Alice <!-- note --> "), "Alice");
        assert_eq!(clean_value("a<!--x-->b<!--y"), "ab");
        assert_eq!(clean_value(" plain "), "plain");
    }
}
