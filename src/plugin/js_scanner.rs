//! Lexical scanning primitives for plugin source text
//!
//! These helpers are the only "tokenizer" the converter has. They operate on
//! bytes because every character they care about is ASCII; multi-byte UTF-8
//! sequences are copied through untouched, so any index they return sits on a
//! character boundary.
//!
//! All functions are total: unterminated strings, comments or unbalanced
//! braces degrade to best-effort output instead of failing.

/// Characters after which a `/` starts a regular expression literal rather
/// than a division operator.
const REGEX_PRECEDERS: &[u8] = b"([{=:;,!&|^~?";

/// Remove `//` and `/* */` comments while keeping every newline.
///
/// String and template literals are copied verbatim (escape aware), and
/// regular expression literals are detected heuristically so that a `//`
/// inside `/https?:\/\//` is not mistaken for a comment. A `/` following an
/// identifier or closing paren is always treated as division.
pub fn strip_comments(code: &str) -> String {
    let bytes = code.as_bytes();
    let len = bytes.len();
    let mut out: Vec<u8> = Vec::with_capacity(len);
    let mut i = 0;

    while i < len {
        let c = bytes[i];

        // String, char and template literals
        if matches!(c, b'"' | b'\'' | b'`') {
            out.push(c);
            i += 1;
            while i < len {
                let sc = bytes[i];
                out.push(sc);
                if sc == b'\\' && i + 1 < len {
                    i += 1;
                    out.push(bytes[i]);
                } else if sc == c {
                    break;
                }
                i += 1;
            }
            i += 1;
            continue;
        }

        // Line comment
        if c == b'/' && i + 1 < len && bytes[i + 1] == b'/' {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            if i < len {
                out.push(b'\n');
                i += 1;
            }
            continue;
        }

        // Block comment
        if c == b'/' && i + 1 < len && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < len {
                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                    i += 2;
                    break;
                }
                if bytes[i] == b'\n' {
                    out.push(b'\n');
                }
                i += 1;
            }
            continue;
        }

        // Regular expression literal
        if c == b'/' && i + 1 < len && in_regex_context(&out) {
            out.push(c);
            i += 1;
            let mut in_class = false;
            while i < len {
                let rc = bytes[i];
                out.push(rc);
                if rc == b'\\' && i + 1 < len {
                    i += 1;
                    out.push(bytes[i]);
                } else if rc == b'[' {
                    in_class = true;
                } else if rc == b']' {
                    in_class = false;
                } else if rc == b'/' && !in_class {
                    break;
                }
                i += 1;
            }
            i += 1;
            // flags
            while i < len && bytes[i].is_ascii_alphabetic() {
                out.push(bytes[i]);
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    match String::from_utf8(out) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Whether the output produced so far leaves the scanner in a position where
/// a `/` opens a regex literal.
fn in_regex_context(emitted: &[u8]) -> bool {
    let mut end = emitted.len();
    while end > 0 && emitted[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let trimmed = &emitted[..end];
    match trimmed.last() {
        None => true,
        Some(last) => REGEX_PRECEDERS.contains(last) || trimmed.ends_with(b"return"),
    }
}

/// Find the `}` that closes a brace whose body starts at `start`.
///
/// `start` is the index just after an already consumed `{`, so scanning
/// begins at depth 1. Braces inside single or double quoted strings are
/// ignored. Returns `None` when the text ends before the depth returns to 0.
pub fn find_matching_brace(code: &str, start: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 1usize;
    let mut in_string = false;
    let mut string_char = 0u8;
    let mut i = start;

    while i < bytes.len() && depth > 0 {
        let ch = bytes[i];
        if (ch == b'"' || ch == b'\'') && !escaped_at(bytes, i) {
            if !in_string {
                in_string = true;
                string_char = ch;
            } else if ch == string_char {
                in_string = false;
            }
        } else if !in_string && ch == b'{' {
            depth += 1;
        } else if !in_string && ch == b'}' {
            depth -= 1;
        }
        i += 1;
    }

    if depth == 0 {
        Some(i - 1)
    } else {
        tracing::trace!(start, missing = depth, "Unbalanced braces");
        None
    }
}

/// Whether the character at `index` is escaped by an odd run of backslashes.
pub fn is_escaped(text: &str, index: usize) -> bool {
    escaped_at(text.as_bytes(), index)
}

fn escaped_at(bytes: &[u8], index: usize) -> bool {
    if index == 0 || index > bytes.len() {
        return false;
    }
    let backslashes = bytes[..index]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    backslashes % 2 == 1
}

/// Split on commas that are not nested inside `{}`, `[]` or a string literal.
///
/// Pieces are trimmed. Negative depth from stray closers is tolerated.
pub fn split_by_comma(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut brace_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut in_string = false;
    let mut string_char = 0u8;

    for (i, &ch) in bytes.iter().enumerate() {
        if matches!(ch, b'"' | b'\'' | b'`') && !escaped_at(bytes, i) {
            if !in_string {
                in_string = true;
                string_char = ch;
            } else if ch == string_char {
                in_string = false;
            }
            current.push(ch);
            continue;
        }
        if in_string {
            current.push(ch);
            continue;
        }
        match ch {
            b'{' => brace_depth += 1,
            b'}' => brace_depth -= 1,
            b'[' => bracket_depth += 1,
            b']' => bracket_depth -= 1,
            b',' if brace_depth == 0 && bracket_depth == 0 => {
                if !current.is_empty() {
                    pieces.push(finish_piece(&current));
                    current.clear();
                }
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if !current.is_empty() {
        pieces.push(finish_piece(&current));
    }
    pieces
}

fn finish_piece(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Slice `text[start..end]`, with both ends clamped to the text and moved back
/// onto character boundaries.
pub fn window(text: &str, start: usize, end: usize) -> &str {
    let start = floor_boundary(text, start);
    let end = floor_boundary(text, end).max(start);
    &text[start..end]
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_line_and_block_comments() {
        let code = "let a = 1; // trailing\n/* block\n spanning */let b = 2;";
        let stripped = strip_comments(code);
        assert_eq!(stripped, "let a = 1; \n\nlet b = 2;");
    }

    #[test]
    fn test_strip_keeps_comment_markers_inside_strings() {
        let code = r#"const url = "https://example.com/path"; const t = `/* not a comment */`;"#;
        assert_eq!(strip_comments(code), code);
    }

    #[test]
    fn test_strip_honours_escaped_quotes() {
        let code = r#"const s = "say \"//hi\""; // gone"#;
        assert_eq!(strip_comments(code), r#"const s = "say \"//hi\""; "#);
    }

    #[test]
    fn test_strip_keeps_regex_literals() {
        let code = "const re = /https?:\\/\\//gi; // comment";
        assert_eq!(strip_comments(code), "const re = /https?:\\/\\//gi; ");

        let code = "if (x) return /[/]*/.test(s);";
        assert_eq!(strip_comments(code), code);
    }

    #[test]
    fn test_division_after_identifier() {
        // `a / b` is division; the following `//` still starts a comment
        let code = "const c = a / b; // note";
        assert_eq!(strip_comments(code), "const c = a / b; ");
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert_eq!(strip_comments("a /* open\nb"), "a \nb");
    }

    #[test]
    fn test_find_matching_brace_nested() {
        let code = "{ a: { b: 1 }, c: '}' }";
        assert_eq!(find_matching_brace(code, 1), Some(code.len() - 1));
    }

    #[test]
    fn test_find_matching_brace_ignores_escaped_quote() {
        let code = r#"{ s: "x\"}" } tail"#;
        assert_eq!(find_matching_brace(code, 1), Some(12));
    }

    #[test]
    fn test_find_matching_brace_unbalanced() {
        assert_eq!(find_matching_brace("{ a: { b: 1 }", 1), None);
        assert_eq!(find_matching_brace("{", 5), None);
    }

    #[test]
    fn test_is_escaped() {
        let text = r#"a\"b\\"c"#;
        assert!(is_escaped(text, 2));
        assert!(!is_escaped(text, 6));
        assert!(!is_escaped(text, 0));
    }

    #[test]
    fn test_split_by_comma_flat_and_nested() {
        assert_eq!(split_by_comma("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_by_comma("{a,b},c"), vec!["{a,b}", "c"]);
        assert_eq!(
            split_by_comma(r#" x: [1, 2], y: "p,q" , z: {k: 1} "#),
            vec!["x: [1, 2]", r#"y: "p,q""#, "z: {k: 1}"]
        );
    }

    #[test]
    fn test_split_by_comma_tolerates_stray_closers() {
        // depth goes negative, so the comma is no longer top-level
        assert_eq!(split_by_comma("a},b"), vec!["a},b"]);
        assert_eq!(split_by_comma("a,,b"), vec!["a", "b"]);
        assert!(split_by_comma("").is_empty());
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let text = "ab日本";
        assert_eq!(window(text, 0, 3), "ab");
        assert_eq!(window(text, 1, 100), "b日本");
        assert_eq!(window(text, 50, 60), "");
    }

    proptest! {
        #[test]
        fn prop_strip_preserves_newlines(code in "[a-z0-9 =(/*'\"`\\\\\n;{}]{0,200}") {
            let stripped = strip_comments(&code);
            prop_assert_eq!(
                stripped.matches('\n').count(),
                code.matches('\n').count()
            );
            prop_assert!(stripped.len() <= code.len());
        }

        #[test]
        fn prop_matching_brace_finds_last(
            a in "[a-z0-9 ,:;()\n]{0,40}",
            b in "[a-z0-9 ,:;()\n]{0,40}",
            c in "[a-z0-9 ,:;()\n]{0,40}",
        ) {
            let code = format!("{{{}{{{}}}{}}}", a, b, c);
            prop_assert_eq!(find_matching_brace(&code, 1), Some(code.len() - 1));
        }

        #[test]
        fn prop_split_flat_list(items in proptest::collection::vec("[a-z0-9]{1,8}", 1..8)) {
            let joined = items.join(",");
            prop_assert_eq!(split_by_comma(&joined), items);
        }
    }
}
