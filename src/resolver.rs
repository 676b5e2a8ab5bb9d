use crate::ast::{ExprId, Expression, FunctionDecl, Statement, INITIALIZER};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::token::Token;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Scope distance for every resolved local reference. Missing ids are globals.
pub type Locals = BTreeMap<ExprId, usize>;

#[derive(Clone, Copy, Debug, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum VarState {
    Declared,
    Defined,
    Accessed,
}

#[derive(Debug)]
struct Binding {
    // None for the implicit `this` and `super`, which are never reported unused.
    token: Option<Token>,
    state: VarState,
}

pub struct Resolver {
    scopes: Vec<BTreeMap<String, Binding>>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
    allowed_super_init: Option<ExprId>,
    locals: Locals,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Resolver {
    fn default() -> Resolver {
        Resolver::new()
    }
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
            allowed_super_init: None,
            locals: Locals::new(),
            diagnostics: Vec::new(),
        }
    }
    /// Resolves a program, returning the errors and warnings it produced.
    pub fn resolve(&mut self, statements: &[Statement]) -> Vec<Diagnostic> {
        self.resolve_statements(statements);
        debug!(
            locals = self.locals.len(),
            diagnostics = self.diagnostics.len(),
            "resolved"
        );
        std::mem::take(&mut self.diagnostics)
    }
    pub fn locals(&self) -> &Locals {
        &self.locals
    }
    fn resolve_statements(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }
    fn resolve_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(expr) => self.resolve_expr(expr),
            Statement::Var { name, initializer } => {
                self.declare(name);
                if let Some(x) = initializer {
                    self.resolve_expr(x);
                }
                self.define(name);
            }
            Statement::Block(stmts) => {
                self.begin_scope();
                self.resolve_statements(stmts);
                self.end_scope();
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Statement::While { condition, body } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }
            Statement::Function(declaration) => {
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Statement::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Cannot return from top-level code.");
                }
                if let Some(x) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Cannot return a value from an initializer.");
                    }
                    self.resolve_expr(x);
                }
            }
            Statement::Break(keyword) | Statement::Continue(keyword) => {
                if self.loop_depth == 0 {
                    self.error(
                        keyword,
                        &format!("Cannot use '{}' outside of a loop.", keyword.lexeme),
                    );
                }
            }
            Statement::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }
    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expression>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;
        self.declare(name);
        self.define(name);
        if let Some(superclass) = superclass {
            if let Expression::Variable {
                name: superclass_name,
                ..
            } = superclass
            {
                if superclass_name.lexeme == name.lexeme {
                    self.error(superclass_name, "A class cannot inherit from itself.");
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);
            self.begin_scope();
            self.define_implicit("super");
        }
        self.begin_scope();
        self.define_implicit("this");
        for method in methods {
            let function_type = if method.is_initializer() {
                if method.is_static {
                    self.error(&method.name, "A class initializer cannot be static.");
                }
                if method.is_getter {
                    self.error(&method.name, "A class initializer must have a parameter list.");
                }
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, function_type);
        }
        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }
        self.current_class = enclosing_class;
    }
    fn resolve_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal(_) => (),
            Expression::Grouping(inner) => self.resolve_expr(inner),
            Expression::Unary { right, .. } => self.resolve_expr(right),
            Expression::Binary { left, right, .. }
            | Expression::Logical { left, right, .. }
            | Expression::Comma { left, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            Expression::Variable { id, name } => {
                let in_own_initializer = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .map_or(false, |binding| binding.state == VarState::Declared);
                if in_own_initializer {
                    self.error(name, "Cannot read local variable in its own initializer.");
                }
                self.resolve_local(*id, name, true);
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name, false);
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expression::Get { object, .. } => self.resolve_expr(object),
            Expression::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expression::This { id, keyword } => match self.current_class {
                ClassType::None => self.error(keyword, "Cannot use 'this' outside of a class."),
                ClassType::Class | ClassType::Subclass => self.resolve_local(*id, keyword, true),
            },
            Expression::Super {
                id,
                keyword,
                method,
            } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Cannot use 'super' outside of a class.")
                    }
                    ClassType::Class => {
                        self.error(keyword, "Cannot use 'super' in a class with no superclass.")
                    }
                    ClassType::Subclass => self.resolve_local(*id, keyword, true),
                }
                if method.lexeme == INITIALIZER && self.allowed_super_init != Some(*id) {
                    self.error(
                        keyword,
                        "Superclass initializer may only be called as the first statement of an initializer.",
                    );
                }
            }
        }
    }
    fn resolve_function(&mut self, declaration: &FunctionDecl, fn_type: FunctionType) {
        let enclosing_fn = self.current_function;
        let enclosing_loop_depth = self.loop_depth;
        let enclosing_super_init = self.allowed_super_init;
        self.current_function = fn_type;
        self.loop_depth = 0;
        self.allowed_super_init = match fn_type {
            FunctionType::Initializer => declaration.leading_super_init(),
            _ => None,
        };
        self.begin_scope();
        for param in declaration.params.iter() {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&declaration.body);
        self.end_scope();
        self.current_function = enclosing_fn;
        self.loop_depth = enclosing_loop_depth;
        self.allowed_super_init = enclosing_super_init;
    }
    fn begin_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }
    fn end_scope(&mut self) {
        let scope = match self.scopes.pop() {
            Some(scope) => scope,
            None => return,
        };
        let mut unused: Vec<Token> = scope
            .into_iter()
            .filter(|(_, binding)| binding.state != VarState::Accessed)
            .filter_map(|(_, binding)| binding.token)
            .collect();
        unused.sort_by_key(|token| (token.line, token.column));
        for token in unused {
            let message = format!("Local variable '{}' is never used.", token.lexeme);
            self.diagnostics
                .push(Diagnostic::at(DiagnosticKind::Warning, message, &token));
        }
    }
    fn declare(&mut self, name: &Token) {
        let redeclared = match self.scopes.last_mut() {
            Some(scope) => scope
                .insert(
                    name.lexeme.clone(),
                    Binding {
                        token: Some(name.clone()),
                        state: VarState::Declared,
                    },
                )
                .is_some(),
            None => false,
        };
        if redeclared {
            self.error(name, "Variable with this name already declared in this scope.");
        }
    }
    fn define(&mut self, name: &Token) {
        if let Some(binding) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.lexeme))
        {
            if binding.state == VarState::Declared {
                binding.state = VarState::Defined;
            }
        }
    }
    fn define_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    token: None,
                    state: VarState::Defined,
                },
            );
        }
    }
    // Writes alone don't count as a use.
    fn resolve_local(&mut self, id: ExprId, name: &Token, is_read: bool) {
        let depth = self.scopes.len();
        for (i, scope) in self.scopes.iter_mut().enumerate().rev() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                if is_read {
                    binding.state = VarState::Accessed;
                }
                let distance = depth - 1 - i;
                trace!(name = %name.lexeme, distance, "resolved local");
                self.locals.insert(id, distance);
                return;
            }
        }
    }
    fn error(&mut self, token: &Token, message: &str) {
        self.diagnostics.push(Diagnostic::at(
            DiagnosticKind::SemanticError,
            message.to_string(),
            token,
        ));
    }
}

#[cfg(test)]
mod resolver_error_tests {
    use super::Resolver;
    use crate::diagnostic::{Diagnostic, DiagnosticKind};
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn resolve(source: &str) -> (Resolver, Vec<Diagnostic>) {
        let (tokens, scan_errors) = scanner::scan_tokens(source);
        assert!(scan_errors.is_empty(), "{:?}", scan_errors);
        let (statements, parse_errors) = parser::parse(&tokens);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let mut resolver = Resolver::new();
        let diagnostics = resolver.resolve(&statements);
        (resolver, diagnostics)
    }

    fn errors(source: &str) -> Vec<String> {
        resolve(source)
            .1
            .into_iter()
            .filter(Diagnostic::is_error)
            .map(|d| d.message)
            .collect()
    }

    fn expect_error(source: &str, expected_error: &str) {
        let errors = errors(source);
        assert!(
            errors.iter().any(|e| e == expected_error),
            "expected {:?} in {:?}",
            expected_error,
            errors
        );
    }

    fn warnings(source: &str) -> Vec<String> {
        resolve(source)
            .1
            .into_iter()
            .filter(|d| d.kind == DiagnosticKind::Warning)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn variable_referenced_in_initializer() {
        expect_error(
            "{ var a = a; }",
            "Cannot read local variable in its own initializer.",
        );
    }

    #[test]
    fn multiple_declarations() {
        expect_error(
            "{ var a = 1; var a = 2; }",
            "Variable with this name already declared in this scope.",
        );
    }

    #[test]
    fn top_level_return() {
        expect_error("return 1;", "Cannot return from top-level code.");
    }

    #[test]
    fn initializer_return_value() {
        expect_error(
            "class A { init() { return 1; } }",
            "Cannot return a value from an initializer.",
        );
        assert_eq!(errors("class A { init() { return; } }"), Vec::<String>::new());
    }

    #[test]
    fn this_and_super_placement() {
        expect_error("this;", "Cannot use 'this' outside of a class.");
        expect_error("fun f() { super.g(); }", "Cannot use 'super' outside of a class.");
        expect_error(
            "class A { f() { super.f(); } }",
            "Cannot use 'super' in a class with no superclass.",
        );
        expect_error("class A < A {}", "A class cannot inherit from itself.");
    }

    #[test]
    fn initializer_shape() {
        expect_error("class A { static init() {} }", "A class initializer cannot be static.");
        expect_error(
            "class A { init { return; } }",
            "A class initializer must have a parameter list.",
        );
    }

    #[test]
    fn super_init_only_as_first_statement() {
        let message =
            "Superclass initializer may only be called as the first statement of an initializer.";
        assert_eq!(
            errors("class A { init(x) {} } class B < A { init(x) { super.init(x); } }"),
            Vec::<String>::new()
        );
        expect_error(
            "class A { init() {} } class B < A { init() { this.x = 1; super.init(); } }",
            message,
        );
        expect_error(
            "class A { init() {} } class B < A { f() { super.init(); } }",
            message,
        );
    }

    #[test]
    fn loop_control_outside_loop() {
        expect_error("break;", "Cannot use 'break' outside of a loop.");
        expect_error(
            "while (true) { fun f() { continue; } }",
            "Cannot use 'continue' outside of a loop.",
        );
        assert_eq!(errors("for (;;) { if (true) break; }"), Vec::<String>::new());
    }

    #[test]
    fn resolution_continues_after_errors() {
        let errors = errors("return 1; this; break;");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn unused_locals_are_warned_in_order() {
        assert_eq!(
            warnings("{ var b = 1; var a = 2; var used = 3; used; }"),
            vec![
                "Local variable 'b' is never used.".to_string(),
                "Local variable 'a' is never used.".to_string(),
            ]
        );
        // Writes don't count as uses.
        assert_eq!(
            warnings("{ var a; a = 1; }"),
            vec!["Local variable 'a' is never used.".to_string()]
        );
        assert_eq!(warnings("var global = 1; class A { f() { return this; } }"), Vec::<String>::new());
    }

    #[test]
    fn distances() {
        let source = "{ var a = 1; { fun f() { return a; } f(); } }";
        let (resolver, diagnostics) = resolve(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let mut distances: Vec<usize> = resolver.locals().values().cloned().collect();
        distances.sort();
        // `f` from its own block, `a` from inside f's body.
        assert_eq!(distances, vec![0, 2]);
    }

    #[test]
    fn resolving_twice_gives_same_table() {
        let (tokens, _) = scanner::scan_tokens("{ var a = 1; { var b = a; b; } }");
        let (statements, _) = parser::parse(&tokens);
        let mut resolver = Resolver::new();
        resolver.resolve(&statements);
        let first = resolver.locals().clone();
        resolver.resolve(&statements);
        assert_eq!(&first, resolver.locals());
    }
}
