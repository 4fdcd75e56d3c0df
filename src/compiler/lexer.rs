//! Tokenizer for preprocessed script source (C6/C7 front end).
//!
//! Runs once, after [`crate::compiler::preprocess::preprocess`] has already
//! stripped comments and replaced literals with `%N%` placeholders, so this
//! lexer never has to think about strings or comments itself.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// A bare decimal or dotted numeric literal, raw text.
    Number(String),
    /// A `%N%` literal placeholder, already parsed to its pool index.
    PoolRef(u32),
    /// A punctuation operator, stored as its source text (`"+="`, `"=="`, ...).
    Op(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
}

/// The longest-match-first operator lexemes. Order matters: a lexeme must
/// come before any of its own prefixes.
const OPERATORS: &[&str] = &[
    "<<", ">>", "==", "!=", "<>", "<=", ">=", "&&", "||", "^^", "+=", "-=", "*=", "/=", "|=", "&=",
    "^=", "+", "-", "*", "/", "=", "<", ">", "&", "|", "^", "!", "~",
];

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    _src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { chars: src.chars().collect(), pos: 0, _src: src }
    }

    /// Tokenize the entire input, dropping whitespace.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        while let Some(tok) = self.next_token() {
            out.push(tok);
        }
        out
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next_token(&mut self) -> Option<Token> {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        let c = self.peek_char()?;

        if c == '%' {
            let start = self.pos + 1;
            let mut j = start;
            while j < self.chars.len() && self.chars[j].is_ascii_digit() {
                j += 1;
            }
            if j < self.chars.len() && self.chars[j] == '%' {
                let digits: String = self.chars[start..j].iter().collect();
                self.pos = j + 1;
                return Some(Token::PoolRef(digits.parse().unwrap_or(0)));
            }
        }

        if c.is_ascii_digit() {
            let start = self.pos;
            let mut j = start;
            while j < self.chars.len() && (self.chars[j].is_ascii_digit() || self.chars[j] == '.') {
                j += 1;
            }
            let text: String = self.chars[start..j].iter().collect();
            self.pos = j;
            return Some(Token::Number(text));
        }

        if c.is_alphabetic() || c == '_' {
            let start = self.pos;
            let mut j = start;
            while j < self.chars.len() && (self.chars[j].is_alphanumeric() || self.chars[j] == '_') {
                j += 1;
            }
            let text: String = self.chars[start..j].iter().collect();
            self.pos = j;
            return Some(Token::Ident(text));
        }

        match c {
            '(' => {
                self.pos += 1;
                return Some(Token::LParen);
            }
            ')' => {
                self.pos += 1;
                return Some(Token::RParen);
            }
            '{' => {
                self.pos += 1;
                return Some(Token::LBrace);
            }
            '}' => {
                self.pos += 1;
                return Some(Token::RBrace);
            }
            '[' => {
                self.pos += 1;
                return Some(Token::LBracket);
            }
            ']' => {
                self.pos += 1;
                return Some(Token::RBracket);
            }
            ',' => {
                self.pos += 1;
                return Some(Token::Comma);
            }
            ';' => {
                self.pos += 1;
                return Some(Token::Semicolon);
            }
            '.' => {
                self.pos += 1;
                return Some(Token::Dot);
            }
            _ => {}
        }

        for op in OPERATORS {
            let len = op.chars().count();
            if self.chars[self.pos..].iter().take(len).collect::<String>() == *op {
                self.pos += len;
                return Some(Token::Op((*op).to_string()));
            }
        }

        // Unrecognized character: skip it rather than stall the lexer. The
        // parser will surface a syntax error once it sees the resulting gap.
        self.pos += 1;
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_an_assignment() {
        let toks = Lexer::new("a += 1;").tokenize();
        assert_eq!(
            toks,
            vec![
                Token::Ident("a".into()),
                Token::Op("+=".into()),
                Token::Number("1".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn pool_ref_parses_its_index() {
        let toks = Lexer::new("x = %3%;").tokenize();
        assert_eq!(
            toks,
            vec![
                Token::Ident("x".into()),
                Token::Op("=".into()),
                Token::PoolRef(3),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn longest_operator_match_wins() {
        let toks = Lexer::new("a == b").tokenize();
        assert_eq!(toks[1], Token::Op("==".into()));
    }

    #[test]
    fn deref_chain_tokenizes_dots_and_brackets() {
        let toks = Lexer::new("a.b[1].c").tokenize();
        assert_eq!(
            toks,
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("b".into()),
                Token::LBracket,
                Token::Number("1".into()),
                Token::RBracket,
                Token::Dot,
                Token::Ident("c".into()),
            ]
        );
    }
}
