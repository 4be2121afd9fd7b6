//! Lexer for query string syntax
//!
//! Tokenizes user query strings into a stream of tokens. Operators are
//! recognised in uppercase only; `and`, `or` and `not` are ordinary words.

use crate::error::SearchSyncError;
use crate::Result;

/// Token types for query string parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unquoted word, possibly containing `*` or `?`
    Term(String),
    /// Double-quoted phrase
    QuotedString(String),

    And,
    Or,
    Not,
    /// Colon separator (field:value)
    Colon,

    /// A lone `*`, only meaningful as an open range bound
    Asterisk,

    /// Caret for boosting with optional boost value
    Caret(Option<f32>),

    /// Inclusive range start
    LeftBracket,
    /// Inclusive range end
    RightBracket,
    /// Exclusive range start
    LeftBrace,
    /// Exclusive range end
    RightBrace,
    To,

    LeftParen,
    RightParen,

    /// Required clause
    Plus,
    /// Excluded clause
    Minus,

    Eof,
}

/// Lexer for tokenizing query strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let Some(ch) = self.current_char() else {
            return Ok(Token::Eof);
        };

        let single = match ch {
            ':' => Some(Token::Colon),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' if !self.peek().is_some_and(Self::is_term_char) => Some(Token::Asterisk),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match ch {
            '^' => {
                self.advance();
                Ok(Token::Caret(self.read_float()))
            }
            '"' => {
                self.advance();
                self.read_quoted_string()
            }
            _ => Ok(self.read_term()),
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<Token> {
        let saved_position = self.position;
        let token = self.next_token();
        self.position = saved_position;
        token
    }

    /// Character offset of the next unread character
    pub fn position(&self) -> usize {
        self.position
    }

    fn read_term(&mut self) -> Token {
        let mut term = String::new();
        while let Some(ch) = self.current_char() {
            if !Self::is_term_char(ch) {
                break;
            }
            term.push(ch);
            self.advance();
        }

        match term.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "TO" => Token::To,
            _ => Token::Term(term),
        }
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let mut s = String::new();

        while let Some(ch) = self.current_char() {
            self.advance();
            match ch {
                '"' => return Ok(Token::QuotedString(s)),
                '\\' => match self.current_char() {
                    Some(escaped @ ('"' | '\\')) => {
                        s.push(escaped);
                        self.advance();
                    }
                    _ => s.push('\\'),
                },
                _ => s.push(ch),
            }
        }

        Err(SearchSyncError::parse("unterminated quoted string"))
    }

    fn read_float(&mut self) -> Option<f32> {
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
            } else if ch == '.' && !has_dot {
                has_dot = true;
                num_str.push(ch);
            } else {
                break;
            }
            self.advance();
        }

        num_str.parse().ok()
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Anything but whitespace and query syntax belongs to a term; `+` and
    /// `-` only act as operators at the start of a token
    fn is_term_char(ch: char) -> bool {
        !ch.is_whitespace() && !matches!(ch, ':' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '^')
    }
}
