use super::ast::{ExprId, Expression, FunctionDecl, Literal, Statement};
use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::token::{Token, TokenType};
use std::rc::Rc;
use thiserror::Error;

pub const MAX_ARGUMENTS: usize = 255;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[{}:{}] Error at {}: {}", .token.line, .token.column, .token, .message)]
pub struct ParseError {
    pub message: String,
    pub token: Token,
}

impl ParseError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::at(DiagnosticKind::SyntaxError, self.message.clone(), &self.token)
    }
}

type ParseResult<T> = Result<T, ParseError>;

pub fn parse(tokens: &[Token]) -> (Vec<Statement>, Vec<ParseError>) {
    Parser::new(tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    errors: Vec<ParseError>,
    eof: Token,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        let eof = match tokens.last() {
            Some(last) => Token::new(TokenType::EOF, "", last.line, last.column),
            None => Token::new(TokenType::EOF, "", 1, 1),
        };
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            eof,
        }
    }
    pub fn parse(mut self) -> (Vec<Statement>, Vec<ParseError>) {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        (statements, self.errors)
    }
    fn declaration(&mut self) -> Option<Statement> {
        match self.try_declaration() {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.errors.push(err);
                self.synchronize();
                None
            }
        }
    }
    fn try_declaration(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            TokenType::Fun => {
                self.advance();
                Ok(Statement::Function(Rc::new(self.function("function", false)?)))
            }
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            _ => self.statement(),
        }
    }
    fn class_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume_identifier("Expect class name.")?;
        let superclass = if self.matches(&TokenType::Less) {
            Some(Expression::variable(
                self.consume_identifier("Expect superclass name.")?,
            ))
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.member()?));
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Statement::Class {
            name,
            superclass,
            methods,
        })
    }
    fn member(&mut self) -> ParseResult<FunctionDecl> {
        if !self.matches(&TokenType::Static) {
            return self.function("method", false);
        }
        let keyword = self.previous().clone();
        if self.matches(&TokenType::LeftBrace) {
            let body = self.block_statements()?;
            return Ok(FunctionDecl {
                name: keyword,
                params: Vec::new(),
                body,
                is_static: true,
                is_getter: false,
            });
        }
        self.function("method", true)
    }
    fn function(&mut self, kind: &str, is_static: bool) -> ParseResult<FunctionDecl> {
        let name = self.consume_identifier(&format!("Expect {} name.", kind))?;
        let mut params = Vec::new();
        let mut is_getter = false;
        if self.matches(&TokenType::LeftParen) {
            if !self.check(&TokenType::RightParen) {
                loop {
                    if params.len() >= MAX_ARGUMENTS {
                        self.report("Cannot have more than 255 parameters.");
                    }
                    params.push(self.consume_identifier("Expect parameter name.")?);
                    if !self.matches(&TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        } else if kind == "method" {
            is_getter = true;
        } else {
            self.report(&format!("Expect '(' after {} name.", kind));
        }
        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block_statements()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            is_static,
            is_getter,
        })
    }
    fn var_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume_identifier("Expect variable name.")?;
        let initializer = if self.matches(&TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block_statements()?))
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::Break => {
                self.advance();
                let keyword = self.previous().clone();
                self.consume(TokenType::Semicolon, "Expect ';' after 'break'.")?;
                Ok(Statement::Break(keyword))
            }
            TokenType::Continue => {
                self.advance();
                let keyword = self.previous().clone();
                self.consume(TokenType::Semicolon, "Expect ';' after 'continue'.")?;
                Ok(Statement::Continue(keyword))
            }
            _ => self.expression_statement(),
        }
    }
    // for (init; cond; incr) body
    //   => { init; while (true) { if (!cond) break; body; incr; } }
    fn for_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = if self.matches(&TokenType::Semicolon) {
            None
        } else if self.matches(&TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenType::Semicolon) {
            Expression::Literal(Literal::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        let exit = Statement::If {
            condition: Expression::Unary {
                operator: Token::new(TokenType::Bang, "!", keyword.line, keyword.column),
                right: Box::new(condition),
            },
            then_branch: Box::new(Statement::Break(keyword)),
            else_branch: None,
        };
        let mut iteration = vec![exit, body];
        if let Some(increment) = increment {
            iteration.push(Statement::Expression(increment));
        }
        let looped = Statement::While {
            condition: Expression::Literal(Literal::Boolean(true)),
            body: Box::new(Statement::Block(iteration)),
        };
        Ok(Statement::Block(
            initializer.into_iter().chain(Some(looped)).collect(),
        ))
    }
    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;
        let body = self.statement()?;
        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }
    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }
    fn return_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }
    fn block_statements(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    fn expression(&mut self) -> ParseResult<Expression> {
        let mut expr = self.assignment()?;
        while self.matches(&TokenType::Comma) {
            let right = self.assignment()?;
            expr = Expression::Comma {
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.or()?;
        if !self.matches(&TokenType::Equal) {
            return Ok(expr);
        }
        let equals = self.previous().clone();
        let value = Box::new(self.assignment()?);
        match expr {
            Expression::Variable { name, .. } => Ok(Expression::Assign {
                id: ExprId::fresh(),
                name,
                value,
            }),
            Expression::Get { object, name } => Ok(Expression::Set {
                object,
                name,
                value,
            }),
            _ => {
                self.errors
                    .push(error_at(&equals, "Invalid assignment target."));
                Ok(*value)
            }
        }
    }
    fn or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.and()?;
        while self.matches(&TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.ternary()?;
        while self.matches(&TokenType::And) {
            let operator = self.previous().clone();
            let right = self.ternary()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn ternary(&mut self) -> ParseResult<Expression> {
        let condition = self.equality()?;
        if !self.matches(&TokenType::Question) {
            return Ok(condition);
        }
        let then_branch = self.expression()?;
        self.consume(TokenType::Colon, "Expect ':' in ternary expression.")?;
        let else_branch = self.ternary()?;
        Ok(Expression::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }
    fn equality(&mut self) -> ParseResult<Expression> {
        const OPERATORS: &[TokenType] = &[TokenType::BangEqual, TokenType::EqualEqual];
        self.binary(OPERATORS, OPERATORS, Parser::comparison)
    }
    fn comparison(&mut self) -> ParseResult<Expression> {
        const OPERATORS: &[TokenType] = &[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ];
        self.binary(OPERATORS, OPERATORS, Parser::addition)
    }
    fn addition(&mut self) -> ParseResult<Expression> {
        // A leading '-' is negation, so only '+' is rejected.
        self.binary(
            &[TokenType::Plus],
            &[TokenType::Minus, TokenType::Plus],
            Parser::multiplication,
        )
    }
    fn multiplication(&mut self) -> ParseResult<Expression> {
        const OPERATORS: &[TokenType] = &[TokenType::Slash, TokenType::Star];
        self.binary(OPERATORS, OPERATORS, Parser::unary)
    }
    fn binary(
        &mut self,
        leading: &[TokenType],
        operators: &[TokenType],
        operand: fn(&mut Parser<'a>) -> ParseResult<Expression>,
    ) -> ParseResult<Expression> {
        if self.matches_any(leading) {
            let operator = self.previous().clone();
            operand(self)?;
            return Err(error_at(&operator, "Binary operator is missing its left operand."));
        }
        let mut expr = operand(self)?;
        while self.matches_any(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression> {
        match self.peek().tokentype {
            TokenType::Bang | TokenType::Minus => {
                self.advance();
                let operator = self.previous().clone();
                let right = self.unary()?;
                Ok(Expression::Unary {
                    operator,
                    right: Box::new(right),
                })
            }
            _ => self.call(),
        }
    }
    fn call(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&TokenType::Dot) {
                let name = self.consume_identifier("Expect property name after '.'.")?;
                expr = Expression::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }
    fn finish_call(&mut self, callee: Expression) -> ParseResult<Expression> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    self.report("Cannot have more than 255 arguments.");
                }
                arguments.push(self.assignment()?);
                if !self.matches(&TokenType::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expression::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }
    fn primary(&mut self) -> ParseResult<Expression> {
        let literal = match &self.peek().tokentype {
            TokenType::False => Some(Literal::Boolean(false)),
            TokenType::True => Some(Literal::Boolean(true)),
            TokenType::Nil => Some(Literal::Nil),
            TokenType::Number(x) => Some(Literal::Number(*x)),
            TokenType::String(x) => Some(Literal::String(x.clone())),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expression::Literal(literal));
        }
        match self.peek().tokentype {
            TokenType::This => {
                self.advance();
                Ok(Expression::This {
                    id: ExprId::fresh(),
                    keyword: self.previous().clone(),
                })
            }
            TokenType::Super => {
                self.advance();
                let keyword = self.previous().clone();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self.consume_identifier("Expect superclass method name.")?;
                Ok(Expression::Super {
                    id: ExprId::fresh(),
                    keyword,
                    method,
                })
            }
            TokenType::Identifier(_) => {
                self.advance();
                Ok(Expression::variable(self.previous().clone()))
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expression::Grouping(Box::new(expr)))
            }
            _ => Err(self.error("Expect expression.")),
        }
    }
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if let TokenType::Semicolon = self.previous().tokentype {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Return
                | TokenType::Break
                | TokenType::Continue => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn consume(&mut self, tokentype: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(&tokentype) {
            self.advance();
            Ok(self.previous().clone())
        } else {
            Err(self.error(message))
        }
    }
    fn consume_identifier(&mut self, message: &str) -> ParseResult<Token> {
        match self.peek().tokentype {
            TokenType::Identifier(_) => {
                self.advance();
                Ok(self.previous().clone())
            }
            _ => Err(self.error(message)),
        }
    }
    fn matches(&mut self, tokentype: &TokenType) -> bool {
        if self.check(tokentype) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn matches_any(&mut self, tokentypes: &[TokenType]) -> bool {
        tokentypes.iter().any(|t| self.matches(t))
    }
    fn check(&self, tokentype: &TokenType) -> bool {
        !self.is_at_end() && self.peek().tokentype == *tokentype
    }
    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }
    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }
    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&self.eof)
    }
    fn previous(&self) -> &Token {
        self.tokens
            .get(self.current.saturating_sub(1))
            .unwrap_or(&self.eof)
    }
    fn error(&self, message: &str) -> ParseError {
        error_at(self.peek(), message)
    }
    fn report(&mut self, message: &str) {
        let err = self.error(message);
        self.errors.push(err);
    }
}

fn error_at(token: &Token, message: &str) -> ParseError {
    ParseError {
        message: message.to_string(),
        token: token.clone(),
    }
}

#[cfg(test)]
mod parser_tests {
    use crate::ast::{Expression, Literal, Statement};
    use crate::parser::{self, ParseError};
    use crate::scanner;
    use crate::token::TokenType;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> (Vec<Statement>, Vec<ParseError>) {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty(), "{:?}", errors);
        parser::parse(&tokens)
    }

    fn messages(errors: &[ParseError]) -> Vec<&str> {
        errors.iter().map(|e| e.message.as_str()).collect()
    }

    fn only_expression(source: &str) -> Expression {
        let (mut statements, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(statements.len(), 1);
        match statements.remove(0) {
            Statement::Expression(expr) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match only_expression("1 + 2 * 3;") {
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                assert_eq!(operator.tokentype, TokenType::Plus);
                assert!(matches!(*left, Expression::Literal(Literal::Number(x)) if x == 1.0));
                assert!(matches!(*right, Expression::Binary { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn comma_is_lowest_precedence() {
        match only_expression("a = 1, b = 2;") {
            Expression::Comma { left, right } => {
                assert!(matches!(*left, Expression::Assign { .. }));
                assert!(matches!(*right, Expression::Assign { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ternary_sits_below_logical_and() {
        match only_expression("a ? b : c and d;") {
            Expression::Logical { left, operator, .. } => {
                assert_eq!(operator.tokentype, TokenType::And);
                assert!(matches!(*left, Expression::Ternary { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn call_and_member_chains_are_left_associative() {
        match only_expression("a.b(1).c;") {
            Expression::Get { object, name } => {
                assert_eq!(name.lexeme, "c");
                assert!(matches!(*object, Expression::Call { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn member_assignment_becomes_set() {
        assert!(matches!(
            only_expression("a.b = 1;"),
            Expression::Set { .. }
        ));
    }

    #[test]
    fn leading_binary_operator_is_reported() {
        let (statements, errors) = parse("+5;");
        assert!(statements.is_empty());
        assert_eq!(
            messages(&errors),
            vec!["Binary operator is missing its left operand."]
        );
        assert_eq!(errors[0].token.tokentype, TokenType::Plus);
    }

    #[test]
    fn leading_minus_is_negation() {
        assert!(matches!(only_expression("-5;"), Expression::Unary { .. }));
    }

    #[test]
    fn invalid_assignment_target_keeps_parsing() {
        let (statements, errors) = parse("1 + 2 = 3; var ok = 1;");
        assert_eq!(messages(&errors), vec!["Invalid assignment target."]);
        assert_eq!(statements.len(), 2);
        match &statements[0] {
            Statement::Expression(Expression::Literal(Literal::Number(x))) => {
                assert_eq!(*x, 3.0)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recovers_and_collects_multiple_errors() {
        let (statements, errors) = parse("var = 1; var b = ; var c = 3;");
        assert_eq!(
            messages(&errors),
            vec!["Expect variable name.", "Expect expression."]
        );
        assert_eq!(statements.len(), 1);
        assert!(matches!(&statements[0], Statement::Var { name, .. } if name.lexeme == "c"));
    }

    #[test]
    fn for_loop_desugars_to_while() {
        let (statements, errors) = parse("for (var i = 0; i < 3; i = i + 1) f(i);");
        assert!(errors.is_empty());
        let outer = match &statements[0] {
            Statement::Block(stmts) => stmts,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Statement::Var { .. }));
        let iteration = match &outer[1] {
            Statement::While {
                condition: Expression::Literal(Literal::Boolean(true)),
                body,
            } => match &**body {
                Statement::Block(stmts) => stmts,
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(iteration.len(), 3);
        assert!(matches!(iteration[0], Statement::If { .. }));
        assert!(matches!(
            iteration[2],
            Statement::Expression(Expression::Assign { .. })
        ));
    }

    #[test]
    fn empty_for_clauses() {
        let (statements, errors) = parse("for (;;) break;");
        assert!(errors.is_empty());
        match &statements[0] {
            Statement::Block(stmts) => {
                assert_eq!(stmts.len(), 1);
                assert!(matches!(stmts[0], Statement::While { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn class_member_shapes() {
        let source = "class A < B {
            method(a, b) {}
            static helper() {}
            area { return 1; }
            static { }
        }";
        let (statements, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors);
        match &statements[0] {
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                assert_eq!(name.lexeme, "A");
                assert!(superclass.is_some());
                let shapes: Vec<(&str, usize, bool, bool)> = methods
                    .iter()
                    .map(|m| (m.name.lexeme.as_str(), m.params.len(), m.is_static, m.is_getter))
                    .collect();
                assert_eq!(
                    shapes,
                    vec![
                        ("method", 2, false, false),
                        ("helper", 0, true, false),
                        ("area", 0, false, true),
                        ("static", 0, true, false),
                    ]
                );
                assert!(methods[3].is_static_block());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_needs_parameter_list() {
        let (statements, errors) = parse("fun f { }");
        assert_eq!(messages(&errors), vec!["Expect '(' after function name."]);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn argument_cap_is_non_fatal() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));
        let (statements, errors) = parse(&source);
        assert_eq!(messages(&errors), vec!["Cannot have more than 255 arguments."]);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn parameter_cap_is_non_fatal() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        let (statements, errors) = parse(&source);
        assert_eq!(messages(&errors), vec!["Cannot have more than 255 parameters."]);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn super_requires_method_name() {
        let (_, errors) = parse("super;");
        assert_eq!(messages(&errors), vec!["Expect '.' after 'super'."]);
    }

    #[test]
    fn error_inside_block_recovers_within_block() {
        let (statements, errors) = parse("{ var = 1; var x = 2; } var y = 3;");
        assert_eq!(errors.len(), 1);
        assert_eq!(statements.len(), 2);
        match &statements[0] {
            Statement::Block(stmts) => assert_eq!(stmts.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}
