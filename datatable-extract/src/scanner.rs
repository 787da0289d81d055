//! Directive scanner
//!
//! Walks raw page text and yields the directive occurrences whose tag is
//! one of the two configured tags. Parser functions with other tags are
//! stepped into, so directives nested inside them are still found.

use datatable_core::ExtractError;

// ============================================================================
// SCANNER TYPES
// ============================================================================

/// Source location of a directive occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the opening `{{#`.
    pub start: usize,
    /// Byte offset just past the closing `}}`.
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Which directive an occurrence is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Write directive: one record per occurrence.
    Data,
    /// Render-time read.
    Select,
}

/// One directive occurrence before its arguments are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective<'a> {
    pub kind: DirectiveKind,
    /// Text between the tag's colon and the closing braces.
    pub body: &'a str,
    pub span: Span,
}

enum Marker {
    Directive,
    Comment,
    Nowiki,
}

const OPEN: &str = "{{#";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const NOWIKI_OPEN: &str = "<nowiki>";
const NOWIKI_CLOSE: &str = "</nowiki>";

// ============================================================================
// SCANNER IMPLEMENTATION
// ============================================================================

/// Lazy scanner over the directives of one page.
pub struct DirectiveScanner<'a> {
    source: &'a str,
    data_tag: &'a str,
    select_tag: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> DirectiveScanner<'a> {
    /// Create a scanner recognizing `{{#data_tag:...}}` and
    /// `{{#select_tag:...}}`. Tags match case-insensitively.
    pub fn new(source: &'a str, data_tag: &'a str, select_tag: &'a str) -> Self {
        Self {
            source,
            data_tag,
            select_tag,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn advance_to(&mut self, target: usize) {
        let target = target.min(self.source.len());
        for c in self.source[self.pos..target].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = target;
    }

    fn next_marker(&self) -> Option<(usize, Marker)> {
        let bytes = self.source.as_bytes();
        let mut i = self.pos;
        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes[i..].starts_with(OPEN.as_bytes()) => {
                    return Some((i, Marker::Directive))
                }
                b'<' if bytes[i..].starts_with(COMMENT_OPEN.as_bytes()) => {
                    return Some((i, Marker::Comment))
                }
                b'<' if starts_with_ci(&bytes[i..], NOWIKI_OPEN) => return Some((i, Marker::Nowiki)),
                _ => i += 1,
            }
        }
        None
    }

    fn kind_of(&self, name: &str) -> Option<DirectiveKind> {
        if name.eq_ignore_ascii_case(self.data_tag) {
            Some(DirectiveKind::Data)
        } else if name.eq_ignore_ascii_case(self.select_tag) {
            Some(DirectiveKind::Select)
        } else {
            None
        }
    }

    fn malformed(&self, line: usize, column: usize, reason: &str) -> ExtractError {
        ExtractError::MalformedDirective {
            line,
            column,
            reason: reason.to_string(),
        }
    }
}

impl<'a> Iterator for DirectiveScanner<'a> {
    type Item = Result<RawDirective<'a>, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (offset, marker) = self.next_marker()?;
            self.advance_to(offset);
            let rest = &self.source[offset..];

            match marker {
                Marker::Comment => {
                    let skip = find_from(rest, COMMENT_OPEN.len(), COMMENT_CLOSE)
                        .map(|i| i + COMMENT_CLOSE.len())
                        .unwrap_or(rest.len());
                    self.advance_to(offset + skip);
                }
                Marker::Nowiki => {
                    let skip = find_ci(&rest.as_bytes()[NOWIKI_OPEN.len()..], NOWIKI_CLOSE)
                        .map(|i| NOWIKI_OPEN.len() + i + NOWIKI_CLOSE.len())
                        .unwrap_or(rest.len());
                    self.advance_to(offset + skip);
                }
                Marker::Directive => {
                    let (line, column) = (self.line, self.column);
                    let after_open = offset + OPEN.len();
                    let head = &self.source[after_open..];
                    let name_len = head
                        .find(|c: char| matches!(c, ':' | '|' | '{' | '}' | '\n'))
                        .unwrap_or(head.len());

                    let Some(kind) = self.kind_of(head[..name_len].trim()) else {
                        self.advance_to(after_open);
                        continue;
                    };

                    if !head[name_len..].starts_with(':') {
                        self.advance_to(after_open);
                        return Some(Err(self.malformed(line, column, "missing table name")));
                    }

                    let body_start = after_open + name_len + 1;
                    return match find_close(&self.source[body_start..]) {
                        Some(body_len) => {
                            let end = body_start + body_len + 2;
                            self.advance_to(end);
                            Some(Ok(RawDirective {
                                kind,
                                body: &self.source[body_start..body_start + body_len],
                                span: Span {
                                    start: offset,
                                    end,
                                    line,
                                    column,
                                },
                            }))
                        }
                        None => {
                            self.advance_to(after_open);
                            Some(Err(self.malformed(line, column, "unterminated directive")))
                        }
                    };
                }
            }
        }
    }
}

/// Length of a directive body: offset of the `}}` that closes the
/// directive, honoring nested `{{ }}`, `[[ ]]` and comments.
pub(crate) fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut braces = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(COMMENT_OPEN.as_bytes()) {
            i = find_from(body, i + COMMENT_OPEN.len(), COMMENT_CLOSE)? + COMMENT_CLOSE.len();
        } else if rest.starts_with(b"{{") {
            braces += 1;
            i += 2;
        } else if rest.starts_with(b"}}") {
            if braces == 0 {
                return Some(i);
            }
            braces -= 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

fn find_from(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    haystack
        .get(from..)
        .and_then(|h| h.find(needle))
        .map(|i| from + i)
}

fn starts_with_ci(bytes: &[u8], prefix: &str) -> bool {
    bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn find_ci(bytes: &[u8], needle: &str) -> Option<usize> {
    bytes
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Result<RawDirective<'_>, ExtractError>> {
        DirectiveScanner::new(source, "data", "dataselect").collect()
    }

    #[test]
    fn test_finds_directives_in_order() {
        let src = "Intro\n{{#data:Employees|Alice|Kampala}}\ntext {{#DataSelect:Employees}}";
        let found = scan(src);
        assert_eq!(found.len(), 2);

        let first = found[0].as_ref().unwrap();
        assert_eq!(first.kind, DirectiveKind::Data);
        assert_eq!(first.body, "Employees|Alice|Kampala");
        assert_eq!((first.span.line, first.span.column), (2, 1));
        assert_eq!(&src[first.span.start..first.span.end], "{{#data:Employees|Alice|Kampala}}");

        let second = found[1].as_ref().unwrap();
        assert_eq!(second.kind, DirectiveKind::Select);
        assert_eq!((second.span.line, second.span.column), (3, 6));
    }

    #[test]
    fn test_nested_braces_and_links_stay_in_body() {
        let found = scan("{{#data:T|{{tpl|a}}|[[Link|label]]}}");
        assert_eq!(found[0].as_ref().unwrap().body, "T|{{tpl|a}}|[[Link|label]]");
    }

    #[test]
    fn test_other_parser_functions_are_stepped_into() {
        let found = scan("{{#if:yes|{{#data:T|x}}}}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_ref().unwrap().body, "T|x");
    }

    #[test]
    fn test_comments_and_nowiki_are_ignored() {
        let src = "<!-- {{#data:A|1}} -->\n<NoWiki>{{#data:B|2}}</nowiki>{{#data:C|3}}";
        let found = scan(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_ref().unwrap().body, "C|3");
    }

    #[test]
    fn test_unterminated_reports_position_and_continues() {
        let src = "ok\n  {{#data:A|1\n{{#data:B|2}}";
        let found = scan(src);
        assert_eq!(found.len(), 2);
        match &found[0] {
            Err(ExtractError::MalformedDirective { line, column, reason }) => {
                assert_eq!((*line, *column), (2, 3));
                assert!(reason.contains("unterminated"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(found[1].as_ref().unwrap().body, "B|2");
    }

    #[test]
    fn test_missing_colon_is_malformed() {
        let found = scan("{{#data}}");
        assert!(matches!(found[0], Err(ExtractError::MalformedDirective { .. })));
    }

    #[test]
    fn test_unicode_columns() {
        let found = scan("äöü {{#data:T|ü}}");
        let d = found[0].as_ref().unwrap();
        assert_eq!(d.span.column, 5);
        assert_eq!(d.body, "T|ü");
    }
}
