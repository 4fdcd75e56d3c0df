//! Comment stripping and literal substitution (spec.md section 4.3).

use crate::compiler::intern::ConstantPool;
use crate::error::CompileResult;

#[derive(PartialEq)]
enum CommentState {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
}

/// Remove `//` and `/* ... */` comments, leaving string contents (and
/// comment-looking sequences inside them) untouched. Newlines that
/// terminate a single-line comment are preserved so line numbers in later
/// diagnostics still line up.
pub fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut state = CommentState::Normal;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match state {
            CommentState::Normal => match (c, next) {
                ('/', Some('/')) => {
                    state = CommentState::LineComment;
                    i += 2;
                    continue;
                }
                ('/', Some('*')) => {
                    state = CommentState::BlockComment;
                    i += 2;
                    continue;
                }
                ('\'', _) => {
                    out.push(c);
                    state = CommentState::SingleQuote;
                }
                ('"', _) => {
                    out.push(c);
                    state = CommentState::DoubleQuote;
                }
                _ => out.push(c),
            },
            CommentState::SingleQuote => {
                out.push(c);
                if c == '\'' {
                    state = CommentState::Normal;
                }
            }
            CommentState::DoubleQuote => {
                out.push(c);
                if c == '"' {
                    state = CommentState::Normal;
                }
            }
            CommentState::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = CommentState::Normal;
                }
            }
            CommentState::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = CommentState::Normal;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    out
}

/// Replace every string literal and every `$`-prefixed hexadecimal integer
/// literal with `%N%`, where `N` is a freshly interned constant-pool index.
///
/// Open question (b) from spec.md section 9 is resolved here: `$` literals
/// do not admit underscores, matching plain hex-digit runs only.
pub fn substitute_literals(source: &str, pool: &mut ConstantPool) -> CompileResult<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' || c == '"' {
            let quote = c;
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            let content: String = chars[start..j].iter().collect();
            let index = pool.intern_string(content.as_bytes())?;
            out.push('%');
            out.push_str(&index.to_string());
            out.push('%');
            i = if j < chars.len() { j + 1 } else { j };
            continue;
        }

        if c == '$' {
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j].is_ascii_hexdigit() {
                j += 1;
            }
            if j > start {
                let hex: String = chars[start..j].iter().collect();
                let value = u64::from_str_radix(&hex, 16).unwrap_or(0) as f64;
                let index = pool.intern_double(value)?;
                out.push('%');
                out.push_str(&index.to_string());
                out.push('%');
                i = j;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    Ok(out)
}

/// Full preprocessing pass: strip comments, then substitute literals.
pub fn preprocess(source: &str, pool: &mut ConstantPool) -> CompileResult<String> {
    let stripped = strip_comments(source);
    substitute_literals(&stripped, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_comment_is_removed_newline_preserved() {
        let src = "a = 1 // comment\nb = 2";
        let out = strip_comments(src);
        assert_eq!(out, "a = 1 \nb = 2");
    }

    #[test]
    fn block_comment_is_removed() {
        let src = "a = /* skip me */ 1;";
        let out = strip_comments(src);
        assert_eq!(out, "a =  1;");
    }

    #[test]
    fn comment_delimiter_inside_string_is_preserved() {
        let src = "a = \"http://example.com\";";
        let out = strip_comments(src);
        assert_eq!(out, src);
    }

    #[test]
    fn string_delimiter_inside_comment_is_literal() {
        let src = "// it's a trap\na = 1;";
        let out = strip_comments(src);
        assert_eq!(out, "\na = 1;");
    }

    #[test]
    fn preprocessing_is_idempotent_modulo_whitespace() {
        let src = "a = \"hi\" + $FF // trailing\n";
        let mut pool = ConstantPool::new();
        let once = preprocess(src, &mut pool).unwrap();
        let twice = preprocess(&once, &mut pool).unwrap();
        assert_eq!(once.trim(), twice.trim());
    }

    #[test]
    fn hex_literal_is_interned_as_a_double() {
        let mut pool = ConstantPool::new();
        let out = preprocess("a = $FF;", &mut pool).unwrap();
        assert!(out.contains('%'));
        assert_eq!(pool.get(0), Some(&crate::compiler::intern::Constant::Number(255.0)));
    }
}
