use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::token::{Token, TokenType};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[{line}:{column}] Error: {message}")]
pub struct ScanError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ScanError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::SyntaxError,
            self.message.clone(),
            self.line,
            self.column,
        )
    }
}

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    start_line: usize,
    start_column: usize,
    line: usize,
    column: usize,
}

pub fn scan_tokens(source: &str) -> (Vec<Token>, Vec<ScanError>) {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        start_line: 1,
        start_column: 1,
        line: 1,
        column: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<ScanError> = Vec::new();

    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        scanner.start_line = scanner.line;
        scanner.start_column = scanner.column;
        match scanner.scan_token() {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => (),
            Err(e) => errors.push(e),
        }
    }
    tokens.push(Token::new(TokenType::EOF, "", scanner.line, scanner.column));
    (tokens, errors)
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token>, ScanError> {
        match self.advance()?.1 {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '?' => Ok(Some(self.token(TokenType::Question))),
            ':' => Ok(Some(self.token(TokenType::Colon))),
            '!' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::BangEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Bang)))
                }
            }
            '=' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::EqualEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Equal)))
                }
            }
            '<' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::LessEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Less)))
                }
            }
            '>' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::GreaterEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Greater)))
                }
            }
            '/' => {
                if self.next_if('/') {
                    while let Some((_, c)) = self.iter.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.advance()?;
                    }
                    Ok(None)
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' | '\n' => Ok(None),
            '"' => Ok(Some(self.string()?)),
            '0'..='9' => Ok(Some(self.number()?)),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier()?)),
            _ => Err(self.error("Unexpected character.")),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        let current = self.current();
        Token {
            tokentype: token_type,
            lexeme: self.source[self.start..current].to_string(),
            line: self.start_line,
            column: self.start_column,
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        match self.iter.peek() {
            Some((_, c)) if *c == expected => self.advance().is_ok(),
            _ => false,
        }
    }
    fn advance(&mut self) -> Result<(usize, char), ScanError> {
        let next = self.iter.next().ok_or_else(|| self.error("Failed to advance"))?;
        if next.1 == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Ok(next)
    }
    fn error(&self, message: &str) -> ScanError {
        ScanError {
            line: self.start_line,
            column: self.start_column,
            message: message.to_string(),
        }
    }
    fn string(&mut self) -> Result<Token, ScanError> {
        while let Some((_, c)) = self.iter.peek() {
            if *c == '"' {
                break;
            }
            self.advance()?;
        }
        if self.advance().is_err() {
            return Err(self.error("Unterminated string."));
        }
        let current = self.current();
        Ok(self.token(TokenType::String(
            self.source[self.start + 1..current - 1].to_string(),
        )))
    }
    fn digits(&mut self) -> Result<(), ScanError> {
        while let Some((_, c)) = self.iter.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.advance()?;
        }
        Ok(())
    }
    fn number(&mut self) -> Result<Token, ScanError> {
        self.digits()?;

        if let Some((_, '.')) = self.iter.peek() {
            let mut lookahead = self.iter.clone();
            lookahead.next();
            if let Some((_, c)) = lookahead.peek() {
                if c.is_ascii_digit() {
                    self.advance()?;
                    self.digits()?;
                }
            }
        }

        let current = self.current();
        let value = self.source[self.start..current]
            .parse()
            .map_err(|_| self.error("Invalid number literal."))?;
        Ok(self.token(TokenType::Number(value)))
    }
    fn identifier(&mut self) -> Result<Token, ScanError> {
        while let Some((_, c)) = self.iter.peek() {
            if !(c.is_ascii_alphanumeric() || *c == '_') {
                break;
            }
            self.advance()?;
        }
        let current = self.current();
        match KEYWORDS.get(&self.source[self.start..current]) {
            None => Ok(self.token(TokenType::Identifier(
                self.source[self.start..current].to_string(),
            ))),
            Some(x) => Ok(self.token(x.clone())),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "break" => TokenType::Break,
    "class" => TokenType::Class,
    "continue" => TokenType::Continue,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "return" => TokenType::Return,
    "static" => TokenType::Static,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[cfg(test)]
mod scanner_tests {
    use crate::scanner;
    use crate::token::TokenType;
    use pretty_assertions::assert_eq;

    #[test]
    fn basic_scanner_test() {
        let (tokens, errors) = scanner::scan_tokens("x = 2");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].tokentype, TokenType::Identifier("x".to_string()));
        assert_eq!(tokens[1].tokentype, TokenType::Equal);
        assert_eq!(tokens[2].tokentype, TokenType::Number(2.0));
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn number_parsing() {
        let (tokens, errors) = scanner::scan_tokens("1+2.5");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].tokentype, TokenType::Number(1.0));
        assert_eq!(tokens[1].tokentype, TokenType::Plus);
        assert_eq!(tokens[2].tokentype, TokenType::Number(2.5));
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        let (tokens, _) = scanner::scan_tokens("1.foo");
        assert_eq!(tokens[0].tokentype, TokenType::Number(1.0));
        assert_eq!(tokens[1].tokentype, TokenType::Dot);
        assert_eq!(tokens[2].tokentype, TokenType::Identifier("foo".to_string()));
    }

    #[test]
    fn keywords_and_positions() {
        let (tokens, errors) = scanner::scan_tokens("class A {\n  static f() {}\n}");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].tokentype, TokenType::Class);
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!(tokens[3].tokentype, TokenType::Static);
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!(tokens[4].lexeme, "f");
        assert_eq!((tokens[4].line, tokens[4].column), (2, 10));
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, errors) = scanner::scan_tokens("// nothing here\nnil");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].tokentype, TokenType::Nil);
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn string_literal_strips_quotes() {
        let (tokens, _) = scanner::scan_tokens("\"hi there\"");
        assert_eq!(tokens[0].tokentype, TokenType::String("hi there".to_string()));
        assert_eq!(tokens[0].lexeme, "\"hi there\"");
    }

    #[test]
    fn errors_do_not_stop_scanning() {
        let (tokens, errors) = scanner::scan_tokens("a # b \"open");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Unexpected character.");
        assert_eq!(errors[0].column, 3);
        assert_eq!(errors[1].message, "Unterminated string.");
        assert_eq!(tokens.len(), 3);
    }
}
