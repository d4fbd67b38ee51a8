//! Lexer for the script language
//!
//! Transforms script source into a stream of tokens terminated by `Eof`.

use crate::error::{Result, ScriptError};
use std::iter::Peekable;
use std::str::Chars;

/// Token types for the script language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(i64),
    String(String),

    /// Alphanumeric, `_` and `.` run such as `form.name`
    Identifier(String),

    // Keywords
    Set,
    If,
    Else,
    For,
    End,
    Render,
    Redirect,
    SaveSession,
    AddCookie,

    // Operators
    Assign,   // =
    Equal,    // ==
    NotEqual, // !=
    Less,     // <
    Greater,  // >
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Colon,        // :
    Semicolon,    // ;
    Comma,        // ,

    Eof,
}

impl TokenKind {
    /// Keywords that begin a statement or close a block.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Set
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::End
                | TokenKind::Render
                | TokenKind::Redirect
                | TokenKind::SaveSession
                | TokenKind::AddCookie
        )
    }

    /// Command keywords and the name the interpreter dispatches on.
    pub fn command_name(&self) -> Option<&'static str> {
        match self {
            TokenKind::Render => Some("render"),
            TokenKind::Redirect => Some("redirect"),
            TokenKind::SaveSession => Some("save_session"),
            TokenKind::AddCookie => Some("add_cookie"),
            _ => None,
        }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "set" => TokenKind::Set,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "end" => TokenKind::End,
        "render" => TokenKind::Render,
        "redirect" => TokenKind::Redirect,
        "save_session" => TokenKind::SaveSession,
        "add_cookie" => TokenKind::AddCookie,
        _ => return None,
    };
    Some(kind)
}

/// A token with position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, lexeme: String) -> Self {
        Token {
            kind,
            line,
            column,
            lexeme,
        }
    }
}

/// Lexer for tokenizing script source
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Lex the whole source. The returned vector always ends with `Eof`.
    pub fn tokenize(self) -> Result<Vec<Token>> {
        self.collect()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<&char> {
        self.source.peek()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(&ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                return;
            }
        }
    }

    // No escape processing: everything up to the matching quote is content.
    // An unterminated string runs to end of input.
    fn scan_string(&mut self, quote: char, line: usize, column: usize) -> Token {
        let mut value = String::new();
        while let Some(ch) = self.advance() {
            if ch == quote {
                break;
            }
            value.push(ch);
        }
        let lexeme = format!("{}{}{}", quote, value, quote);
        Token::new(TokenKind::String(value), line, column, lexeme)
    }

    fn scan_number(&mut self, first: char, line: usize, column: usize) -> Result<Token> {
        let mut digits = String::from(first);
        while let Some(&ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.advance();
        }
        let value = digits.parse::<i64>().map_err(|_| ScriptError::LexerError {
            line,
            column,
            message: format!("Integer literal '{}' is out of range", digits),
        })?;
        Ok(Token::new(TokenKind::Number(value), line, column, digits))
    }

    fn scan_identifier(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut ident = String::from(first);
        while let Some(&ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = keyword(&ident).unwrap_or_else(|| TokenKind::Identifier(ident.clone()));
        Token::new(kind, line, column, ident)
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        let Some(ch) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, line, column, String::new()));
        };

        let single = |kind: TokenKind| Token::new(kind, line, column, ch.to_string());

        let token = match ch {
            '"' | '\'' => self.scan_string(ch, line, column),
            '0'..='9' => self.scan_number(ch, line, column)?,
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c, line, column),

            '=' => {
                if self.match_char('=') {
                    Token::new(TokenKind::Equal, line, column, "==".into())
                } else {
                    single(TokenKind::Assign)
                }
            }
            '!' => {
                if self.match_char('=') {
                    Token::new(TokenKind::NotEqual, line, column, "!=".into())
                } else {
                    return Err(ScriptError::LexerError {
                        line,
                        column,
                        message: "Expected '=' after '!'".to_string(),
                    });
                }
            }
            '<' => single(TokenKind::Less),
            '>' => single(TokenKind::Greater),
            '+' => single(TokenKind::Plus),
            '-' => single(TokenKind::Minus),
            '*' => single(TokenKind::Star),
            '/' => single(TokenKind::Slash),

            '(' => single(TokenKind::LeftParen),
            ')' => single(TokenKind::RightParen),
            '[' => single(TokenKind::LeftBracket),
            ']' => single(TokenKind::RightBracket),
            '{' => single(TokenKind::LeftBrace),
            '}' => single(TokenKind::RightBrace),
            ':' => single(TokenKind::Colon),
            ';' => single(TokenKind::Semicolon),
            ',' => single(TokenKind::Comma),

            other => {
                return Err(ScriptError::LexerError {
                    line,
                    column,
                    message: format!("Unexpected character '{}'", other),
                })
            }
        };

        Ok(token)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        match &token {
            Ok(t) if t.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            _ => {}
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("set x = 42"),
            vec![
                TokenKind::Set,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Number(42),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dotted_identifier() {
        assert_eq!(
            kinds("form.name"),
            vec![TokenKind::Identifier("form.name".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_keywords_are_exact() {
        assert_eq!(
            kinds("ender settle end"),
            vec![
                TokenKind::Identifier("ender".into()),
                TokenKind::Identifier("settle".into()),
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_literals_are_verbatim() {
        assert_eq!(
            kinds(r#""a\n'b'" 'say "hi"'"#),
            vec![
                TokenKind::String(r"a\n'b'".into()),
                TokenKind::String(r#"say "hi""#.into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        assert_eq!(
            kinds("\"open"),
            vec![TokenKind::String("open".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a == b != c = d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Equal,
                TokenKind::Identifier("b".into()),
                TokenKind::NotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::Assign,
                TokenKind::Identifier("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("# header\nset x = 1 # trailing\n\nrender 'a'")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Set);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[4].kind, TokenKind::Render);
        assert_eq!(tokens[4].line, 4);
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_unknown_character_is_an_error() {
        let err = Lexer::new("set x = 1\nset y = 2 @").tokenize().unwrap_err();
        match err {
            ScriptError::LexerError { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 11);
            }
            other => panic!("expected lexer error, got {:?}", other),
        }
    }

    #[test]
    fn test_lone_bang_is_an_error() {
        assert!(Lexer::new("a ! b").tokenize().is_err());
    }

    #[test]
    fn test_number_out_of_range() {
        assert!(Lexer::new("99999999999999999999").tokenize().is_err());
    }

    #[test]
    fn test_iterator_stops_after_eof() {
        let mut lexer = Lexer::new("x");
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Eof, .. }))));
        assert!(lexer.next().is_none());
    }
}
