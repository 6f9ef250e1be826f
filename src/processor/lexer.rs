//! Hand-written lexer for the C0 source language.
//!
//! Tokens are produced lazily, one per `next_token` call. Comments never
//! reach the analyser and end-of-file is a real token that keeps being
//! returned once the input is exhausted.
//
//  Lexical items (informal):
//
//      Ident    ::= [letter_][letter digit _]*      (keywords carved out)
//      UInt     ::= [0-9]+                          (fits in u64)
//      Double   ::= [0-9]+ '.' [0-9]+ ([eE] [+-]? [0-9]+)?
//      String   ::= '"' (char | escape)* '"'
//      Char     ::= '\'' (char | escape) '\''
//      escape   ::= '\\' [\\"'nrt]
//      Comment  ::= '//' .* '\n'

use super::error::{LexError, LexErrorKind};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Line and column of a character, both starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Fn,
    Let,
    Const,
    As,
    While,
    If,
    Else,
    Return,
    Break,
    Continue,

    // Operators and punctuation
    Plus,      // `+`
    Minus,     // `-`
    Mul,       // `*`
    Div,       // `/`
    Assign,    // `=`
    Eq,        // `==`
    Neq,       // `!=`
    Lt,        // `<`
    Gt,        // `>`
    Le,        // `<=`
    Ge,        // `>=`
    LParen,    // `(`
    RParen,    // `)`
    LBrace,    // `{`
    RBrace,    // `}`
    Arrow,     // `->`
    Comma,     // `,`
    Colon,     // `:`
    Semicolon, // `;`

    Ident,
    UIntLiteral,
    DoubleLiteral,
    StringLiteral,
    CharLiteral,

    /// End-of-file
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        use TokenKind as T;
        Some(match word {
            "fn" => T::Fn,
            "let" => T::Let,
            "const" => T::Const,
            "as" => T::As,
            "while" => T::While,
            "if" => T::If,
            "else" => T::Else,
            "return" => T::Return,
            "break" => T::Break,
            "continue" => T::Continue,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenKind as T;
        let text = match self {
            T::Fn            => "'fn'",
            T::Let           => "'let'",
            T::Const         => "'const'",
            T::As            => "'as'",
            T::While         => "'while'",
            T::If            => "'if'",
            T::Else          => "'else'",
            T::Return        => "'return'",
            T::Break         => "'break'",
            T::Continue      => "'continue'",
            T::Plus          => "'+'",
            T::Minus         => "'-'",
            T::Mul           => "'*'",
            T::Div           => "'/'",
            T::Assign        => "'='",
            T::Eq            => "'=='",
            T::Neq           => "'!='",
            T::Lt            => "'<'",
            T::Gt            => "'>'",
            T::Le            => "'<='",
            T::Ge            => "'>='",
            T::LParen        => "'('",
            T::RParen        => "')'",
            T::LBrace        => "'{'",
            T::RBrace        => "'}'",
            T::Arrow         => "'->'",
            T::Comma         => "','",
            T::Colon         => "':'",
            T::Semicolon     => "';'",
            T::Ident         => "identifier",
            T::UIntLiteral   => "integer literal",
            T::DoubleLiteral => "double literal",
            T::StringLiteral => "string literal",
            T::CharLiteral   => "char literal",
            T::Eof           => "end of file",
        };
        f.write_str(text)
    }
}

/// Payload carried by identifiers and literals.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Ident(String),
    UInt(u64),
    Double(f64),
    Str(String),
    Char(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub start: Pos,
    pub end: Pos,
}

impl Token {
    /// Name of an identifier token, empty for everything else.
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Ident(name) => name,
            _ => "",
        }
    }
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            pos: Pos::default(),
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume the next character only when it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.next_char() {
            if c == '\n' {
                break;
            }
        }
    }

    fn make_token(&self, kind: TokenKind, value: TokenValue, start: Pos) -> Token {
        Token {
            kind,
            value,
            start,
            end: self.pos,
        }
    }

    /// Produce the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        use TokenKind as T;

        loop {
            self.skip_whitespace();

            let start = self.pos;
            let Some(c) = self.next_char() else {
                return Ok(self.make_token(T::Eof, TokenValue::None, start));
            };

            let kind = match c {
                c if c.is_ascii_digit() => return self.read_number(c, start),
                c if c.is_alphabetic() || c == '_' => return Ok(self.read_identifier(c, start)),
                '\'' => return self.read_char(start),
                '"' => return self.read_string(start),
                '+' => T::Plus,
                '*' => T::Mul,
                ';' => T::Semicolon,
                '(' => T::LParen,
                ')' => T::RParen,
                '{' => T::LBrace,
                '}' => T::RBrace,
                ',' => T::Comma,
                ':' => T::Colon,
                '-' => {
                    if self.eat('>') {
                        T::Arrow
                    } else {
                        T::Minus
                    }
                }
                '=' => {
                    if self.eat('=') {
                        T::Eq
                    } else {
                        T::Assign
                    }
                }
                '!' => {
                    if self.eat('=') {
                        T::Neq
                    } else {
                        return Err(LexError::new(LexErrorKind::InvalidCharacter('!'), start));
                    }
                }
                '<' => {
                    if self.eat('=') {
                        T::Le
                    } else {
                        T::Lt
                    }
                }
                '>' => {
                    if self.eat('=') {
                        T::Ge
                    } else {
                        T::Gt
                    }
                }
                '/' => {
                    if self.eat('/') {
                        self.skip_line();
                        continue;
                    }
                    T::Div
                }
                other => return Err(LexError::new(LexErrorKind::InvalidCharacter(other), start)),
            };

            return Ok(self.make_token(kind, TokenValue::None, start));
        }
    }

    fn read_identifier(&mut self, first: char, start: Pos) -> Token {
        let mut id = String::new();
        id.push(first);
        self.consume_while(|c| c.is_alphanumeric() || c == '_', &mut id);

        match TokenKind::keyword(&id) {
            Some(kind) => self.make_token(kind, TokenValue::None, start),
            None => self.make_token(TokenKind::Ident, TokenValue::Ident(id), start),
        }
    }

    fn read_number(&mut self, first: char, start: Pos) -> Result<Token, LexError> {
        let mut num = String::new();
        num.push(first);
        self.consume_while(|c| c.is_ascii_digit(), &mut num);

        if !self.eat('.') {
            let value: u64 = num
                .parse()
                .map_err(|_| LexError::new(LexErrorKind::MalformedNumber(num.clone()), start))?;
            return Ok(self.make_token(TokenKind::UIntLiteral, TokenValue::UInt(value), start));
        }

        num.push('.');
        self.require_digits(&mut num, start)?;

        if let Some(marker @ ('e' | 'E')) = self.peek_char() {
            self.next_char();
            num.push(marker);
            if let Some(sign @ ('+' | '-')) = self.peek_char() {
                self.next_char();
                num.push(sign);
            }
            self.require_digits(&mut num, start)?;
        }

        let value: f64 = num
            .parse()
            .map_err(|_| LexError::new(LexErrorKind::MalformedNumber(num.clone()), start))?;
        Ok(self.make_token(TokenKind::DoubleLiteral, TokenValue::Double(value), start))
    }

    /// Consume a non-empty run of digits into `num`.
    fn require_digits(&mut self, num: &mut String, start: Pos) -> Result<(), LexError> {
        match self.peek_char() {
            Some(c) if c.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit(), num);
                Ok(())
            }
            Some(c) => {
                num.push(c);
                Err(LexError::new(LexErrorKind::MalformedNumber(num.clone()), start))
            }
            None => Err(LexError::new(LexErrorKind::MalformedNumber(num.clone()), start)),
        }
    }

    /// Decode the character following a backslash.
    fn read_escape(&mut self) -> Result<char, LexError> {
        let at = self.pos;
        match self.next_char() {
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some(other) => Err(LexError::new(LexErrorKind::InvalidEscape(other), at)),
            None => Err(LexError::new(LexErrorKind::UnterminatedLiteral, at)),
        }
    }

    fn read_string(&mut self, start: Pos) -> Result<Token, LexError> {
        let mut txt = String::new();
        loop {
            match self.next_char() {
                Some('"') => break,
                Some('\\') => txt.push(self.read_escape()?),
                Some(c) => txt.push(c),
                None => return Err(LexError::new(LexErrorKind::UnterminatedLiteral, start)),
            }
        }
        Ok(self.make_token(TokenKind::StringLiteral, TokenValue::Str(txt), start))
    }

    fn read_char(&mut self, start: Pos) -> Result<Token, LexError> {
        let value = match self.next_char() {
            Some('\'') => return Err(LexError::new(LexErrorKind::EmptyCharLiteral, start)),
            Some('\\') => self.read_escape()?,
            Some(c) => c,
            None => return Err(LexError::new(LexErrorKind::UnterminatedLiteral, start)),
        };

        if !self.eat('\'') {
            return Err(LexError::new(LexErrorKind::UnterminatedLiteral, start));
        }
        Ok(self.make_token(TokenKind::CharLiteral, TokenValue::Char(value), start))
    }
}
