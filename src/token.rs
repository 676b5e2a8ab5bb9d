use std::fmt;

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,
    Question, Colon,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier(String), String(String), Number(f64),

    // Keywords.
    And, Break, Class, Continue, Else, False, Fun, For, If, Nil, Or,
    Return, Static, Super, This, True, Var, While,

    EOF
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(tokentype: TokenType, lexeme: &str, line: usize, column: usize) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            line,
            column,
        }
    }
    pub fn is_eof(&self) -> bool {
        self.tokentype == TokenType::EOF
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_eof() {
            write!(f, "end")
        } else {
            write!(f, "'{}'", self.lexeme)
        }
    }
}
