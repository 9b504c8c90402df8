use log::trace;
use std::fmt::{self, Display, Formatter};

use crate::error::{syntax_error, tokenizer_error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftSquare,
    RightSquare,

    Comma,
    Semicolon,
    Equal,

    Identifier(String),
    String(String),
    Integer(i64),
    Float(f64),

    True,
    False,

    EOF,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftSquare => write!(f, "["),
            TokenKind::RightSquare => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{:?}", n),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::EOF => write!(f, "<eof>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

pub fn tokenize(bytes: &[u8]) -> Result<Vec<Token>> {
    let n = bytes.len();
    let mut cursor = 0;
    let mut tokens = Vec::new();

    loop {
        let (leading, bytes_read, kind) = next_token(&bytes[cursor..], cursor)?;
        let token = Token {
            kind,
            start: cursor + leading,
            end: cursor + bytes_read,
        };
        cursor += bytes_read;

        if token.kind == TokenKind::EOF {
            tokens.push(token);
            debug_assert_eq!(cursor, n);
            trace!("tokenized {} bytes into {} tokens", n, tokens.len());
            return Ok(tokens);
        }

        tokens.push(token);
    }
}

fn skip_trivia(bytes: &[u8]) -> usize {
    let n = bytes.len();
    let mut cursor = 0;

    loop {
        cursor += bytes[cursor..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();

        if cursor + 1 < n && &bytes[cursor..cursor + 2] == b"//" {
            cursor += bytes[cursor..].iter().take_while(|&&b| b != b'\n').count();
        } else {
            return cursor;
        }
    }
}

/// Returns the whitespace skipped before the token, the total number of
/// bytes read and the token found. `base` only offsets error positions.
fn next_token(bytes: &[u8], base: usize) -> Result<(usize, usize, TokenKind)> {
    let n = bytes.len();
    let cursor = skip_trivia(bytes);

    if cursor == n {
        return Ok((cursor, cursor, TokenKind::EOF));
    }

    let punctuation = match bytes[cursor] {
        b'(' => Some(TokenKind::LeftParen),
        b')' => Some(TokenKind::RightParen),
        b'{' => Some(TokenKind::LeftBrace),
        b'}' => Some(TokenKind::RightBrace),
        b'[' => Some(TokenKind::LeftSquare),
        b']' => Some(TokenKind::RightSquare),
        b',' => Some(TokenKind::Comma),
        b';' => Some(TokenKind::Semicolon),
        b'=' => Some(TokenKind::Equal),
        _ => None,
    };

    if let Some(kind) = punctuation {
        return Ok((cursor, cursor + 1, kind));
    }

    if bytes[cursor] == b'"' {
        let mut end_byte = cursor + 1;

        while end_byte < n && bytes[end_byte] != b'"' {
            if bytes[end_byte] == b'\\' {
                end_byte += 1;
            }
            end_byte += 1;
        }

        if end_byte >= n {
            return tokenizer_error("unterminated string literal", base + cursor);
        }

        let quoted = String::from_utf8_lossy(&bytes[cursor..=end_byte]);
        let text = match snailquote::unescape(&quoted) {
            Ok(text) => text,
            Err(err) => return tokenizer_error(err.to_string(), base + cursor),
        };

        return Ok((cursor, end_byte + 1, TokenKind::String(text)));
    }

    let negative = bytes[cursor] == b'-';
    let digits_at = if negative { cursor + 1 } else { cursor };

    if digits_at < n && bytes[digits_at].is_ascii_digit() {
        let mut end_byte = digits_at;
        let mut is_float = false;

        while end_byte < n && bytes[end_byte].is_ascii_digit() {
            end_byte += 1;
        }

        if end_byte < n && bytes[end_byte] == b'.' {
            is_float = true;
            end_byte += 1;

            if end_byte >= n || !bytes[end_byte].is_ascii_digit() {
                return tokenizer_error("expected digit after '.'", base + end_byte);
            }

            while end_byte < n && bytes[end_byte].is_ascii_digit() {
                end_byte += 1;
            }
        }

        let text = String::from_utf8_lossy(&bytes[cursor..end_byte]);
        let kind = if is_float {
            TokenKind::Float(text.parse()?)
        } else {
            TokenKind::Integer(text.parse()?)
        };

        return Ok((cursor, end_byte, kind));
    }

    if bytes[cursor].is_ascii_alphabetic() || bytes[cursor] == b'_' {
        let mut end_byte = cursor + 1;

        while end_byte < n && (bytes[end_byte].is_ascii_alphanumeric() || bytes[end_byte] == b'_')
        {
            end_byte += 1;
        }

        let kind = match &bytes[cursor..end_byte] {
            b"true" => TokenKind::True,
            b"false" => TokenKind::False,
            word => TokenKind::Identifier(String::from_utf8_lossy(word).into_owned()),
        };

        return Ok((cursor, end_byte, kind));
    }

    tokenizer_error(
        format!("unexpected character '{}'", bytes[cursor].escape_ascii()),
        base + cursor,
    )
}

/// A cursor over a tokenized spec. The final token is always `EOF`, and
/// reading past it keeps returning it.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TokenStream {
    pub fn new(source: &str) -> Result<Self> {
        Ok(Self::from_tokens(tokenize(source.as_bytes())?))
    }

    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::EOF) {
            let end = tokens.last().map_or(0, |t| t.end);
            tokens.push(Token {
                kind: TokenKind::EOF,
                start: end,
                end,
            });
        }
        Self { tokens, cursor: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.peek().kind != TokenKind::EOF
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    pub fn peek_second(&self) -> &Token {
        &self.tokens[(self.cursor + 1).min(self.tokens.len() - 1)]
    }

    pub fn peek_prev(&self) -> Option<&Token> {
        self.cursor.checked_sub(1).map(|i| &self.tokens[i])
    }

    pub fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    /// Consumes the next token if it is `kind`, otherwise fails with a syntax
    /// error naming the offending token and its position.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek().kind != kind {
            return syntax_error(
                format!("expected '{}' but found \"{}\"", kind, self.peek().kind),
                self.peek_token_start(),
            );
        }
        Ok(self.next())
    }

    pub fn peek_token_start(&self) -> usize {
        self.peek().start
    }

    pub fn peek_prev_token_start(&self) -> usize {
        self.peek_prev().map_or(0, |t| t.start)
    }
}
