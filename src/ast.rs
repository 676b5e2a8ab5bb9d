use super::token::{Token, TokenType};
use std::fmt;
use std::fmt::Formatter;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const INITIALIZER: &str = "init";

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::Boolean(x) => write!(f, "{}", x),
            Literal::Number(x) => write!(f, "{}", x),
            Literal::String(x) => write!(f, "{}", x),
        }
    }
}

/// Identity of an expression node that the resolver annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    pub fn fresh() -> ExprId {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Grouping(Box<Expression>),
    Unary {
        operator: Token,
        right: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Comma {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expression>,
    },
    Logical {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        paren: Token,
        arguments: Vec<Expression>,
    },
    Get {
        object: Box<Expression>,
        name: Token,
    },
    Set {
        object: Box<Expression>,
        name: Token,
        value: Box<Expression>,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

impl Expression {
    pub fn variable(name: Token) -> Expression {
        Expression::Variable {
            id: ExprId::fresh(),
            name,
        }
    }
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Statement>,
    pub is_static: bool,
    pub is_getter: bool,
}

impl FunctionDecl {
    pub fn is_static_block(&self) -> bool {
        self.name.tokentype == TokenType::Static
    }
    pub fn is_initializer(&self) -> bool {
        self.name.lexeme == INITIALIZER
    }
    /// The `super.init(...)` call heading this body, if the first statement is one.
    pub fn leading_super_init(&self) -> Option<ExprId> {
        match self.body.first() {
            Some(Statement::Expression(Expression::Call { callee, .. })) => match &**callee {
                Expression::Super { id, method, .. } if method.lexeme == INITIALIZER => Some(*id),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Expression),
    Var {
        name: Token,
        initializer: Option<Expression>,
    },
    Block(Vec<Statement>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expression>,
    },
    Break(Token),
    Continue(Token),
    Class {
        name: Token,
        superclass: Option<Expression>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
