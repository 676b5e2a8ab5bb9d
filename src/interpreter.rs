use crate::ast::{ExprId, Expression, FunctionDecl, Statement, INITIALIZER};
use crate::callable::{Callable, FunctionKind, LoxFunction, Receiver};
use crate::class::{undefined_property, Class, Member};
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::environment::Environment;
use crate::natives;
use crate::token::{Token, TokenType};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[{}:{}] RuntimeError: {}", .token.line, .token.column, .message)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::at(DiagnosticKind::RuntimeError, self.message.clone(), &self.token)
    }
}

/// How a statement finished. Non-local exits travel up as values, never as errors.
#[derive(Debug, Clone)]
pub enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Output sink that keeps everything written to it.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> SharedBuffer {
        SharedBuffer::default()
    }
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    globals: Environment,
    environment: Environment,
    locals: BTreeMap<ExprId, usize>,
    config: Config,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_config(Config::default())
    }
    pub fn with_config(config: Config) -> Interpreter {
        // Stdin buffers on its own; a second buffer here would swallow prompt lines.
        Interpreter::with_io(
            config,
            Box::new(io::stdout()),
            Box::new(io::BufReader::with_capacity(1, io::stdin())),
        )
    }
    pub fn with_io(config: Config, output: Box<dyn Write>, input: Box<dyn BufRead>) -> Interpreter {
        let globals = Environment::new();
        natives::define_globals(&globals);
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: BTreeMap::new(),
            config,
            output,
            input,
        }
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    /// Merges resolver output; entries from earlier runs stay valid.
    pub fn resolve_locals(&mut self, locals: &BTreeMap<ExprId, usize>) {
        self.locals
            .extend(locals.iter().map(|(id, depth)| (*id, *depth)));
    }
    pub fn interpret(&mut self, statements: &[Statement]) -> Result<(), RuntimeError> {
        debug!(statements = statements.len(), "interpret");
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }
    /// Runs `statements` in `environment`, restoring the current one however they finish.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        environment: Environment,
    ) -> Result<Completion, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }
    fn execute_all(&mut self, statements: &[Statement]) -> Result<Completion, RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                Completion::Normal => (),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }
    fn execute(&mut self, stmt: &Statement) -> Result<Completion, RuntimeError> {
        match stmt {
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Completion::Normal)
            }
            Statement::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        self.environment.define(&name.lexeme, true, value);
                    }
                    None => self.environment.define(&name.lexeme, false, Value::Nil),
                }
                Ok(Completion::Normal)
            }
            Statement::Block(statements) => {
                let environment = self.environment.new_child();
                self.execute_block(statements, environment)
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Completion::Normal | Completion::Continue => (),
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::Function(declaration) => {
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    self.environment.clone(),
                    FunctionKind::Function,
                );
                self.environment.define(
                    &declaration.name.lexeme,
                    true,
                    Value::Callable(Callable::Function(function)),
                );
                Ok(Completion::Normal)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Completion::Return(value))
            }
            Statement::Break(_) => Ok(Completion::Break),
            Statement::Continue(_) => Ok(Completion::Continue),
            Statement::Class {
                name,
                superclass,
                methods,
            } => self.define_class(name, superclass.as_ref(), methods),
        }
    }
    fn define_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expression>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Completion, RuntimeError> {
        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token = match expr {
                        Expression::Variable {
                            name: superclass_name,
                            ..
                        } => superclass_name,
                        _ => name,
                    };
                    return Err(RuntimeError::new(token, "Superclass must be a class."));
                }
            },
            None => None,
        };
        self.environment.define(&name.lexeme, false, Value::Nil);
        let closure = match &superclass {
            Some(superclass) => {
                let closure = self.environment.new_child();
                closure.define("super", true, Value::Class(superclass.clone()));
                closure
            }
            None => self.environment.clone(),
        };
        let mut table = BTreeMap::new();
        let mut static_blocks = Vec::new();
        for declaration in methods {
            if declaration.is_static_block() {
                static_blocks.push(LoxFunction::new(
                    Rc::clone(declaration),
                    closure.clone(),
                    FunctionKind::StaticMethod,
                ));
                continue;
            }
            let kind = FunctionKind::for_member(declaration);
            table.insert(
                declaration.name.lexeme.clone(),
                LoxFunction::new(Rc::clone(declaration), closure.clone(), kind),
            );
        }
        let class = Class::new(&name.lexeme, superclass, table);
        debug!(class = %name.lexeme, static_blocks = static_blocks.len(), "define class");
        self.environment.assign(name, Value::Class(class.clone()))?;
        for block in static_blocks {
            let bound = block.bind(Receiver::Class(class.clone()));
            Callable::Function(bound).call(self, &[], name)?;
        }
        Ok(Completion::Normal)
    }
    fn evaluate(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Literal(literal) => Ok(Value::from(literal)),
            Expression::Grouping(inner) => self.evaluate(inner),
            Expression::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => match right {
                        Value::Number(x) => Ok(Value::Number(-x)),
                        _ => Err(RuntimeError::new(operator, "Operand to '-' must be a number.")),
                    },
                    TokenType::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    _ => Err(unknown_operator(operator)),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(left, operator, right)
            }
            Expression::Comma { left, right } => {
                self.evaluate(left)?;
                self.evaluate(right)
            }
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expression::Variable { id, name } => self.look_up_variable(*id, name),
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(distance) => self.environment.assign_at(*distance, name, value.clone())?,
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator.tokentype {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Call {
                callee,
                paren,
                arguments,
            } => {
                if let Expression::Super {
                    id,
                    keyword,
                    method,
                } = &**callee
                {
                    if method.lexeme == INITIALIZER {
                        return self.super_init(*id, keyword, method, arguments, paren);
                    }
                }
                let callee = self.evaluate(callee)?;
                let values = self.evaluate_all(arguments)?;
                self.call_value(callee, &values, paren)
            }
            Expression::Get { object, name } => {
                let member = match self.evaluate(object)? {
                    Value::Instance(instance) => instance.get(name)?,
                    Value::Class(class) => class.get(name)?,
                    _ => {
                        return Err(RuntimeError::new(
                            name,
                            "Only instances and classes have properties.",
                        ))
                    }
                };
                self.member_value(member, name)
            }
            Expression::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                let policy = self.config.field_policy;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.set(name, value.clone(), policy)?;
                        Ok(value)
                    }
                    Value::Class(class) => {
                        let value = self.evaluate(value)?;
                        class.set(name, value.clone(), policy)?;
                        Ok(value)
                    }
                    _ => Err(RuntimeError::new(
                        name,
                        "Only instances and classes have fields.",
                    )),
                }
            }
            Expression::This { id, keyword } => self.look_up_variable(*id, keyword),
            Expression::Super {
                id,
                keyword,
                method,
            } => self.super_member(*id, keyword, method),
        }
    }
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(distance) => self.environment.get_at(*distance, name),
            None => self.globals.get(name),
        }
    }
    // `this` always sits one frame inside the frame holding `super`.
    fn super_target(&self, id: ExprId, keyword: &Token) -> Result<(Class, Receiver), RuntimeError> {
        let distance = *self.locals.get(&id).ok_or_else(|| {
            RuntimeError::new(keyword, "Cannot use 'super' in a class with no superclass.")
        })?;
        let superclass = match self.environment.get_at(distance, keyword)? {
            Value::Class(class) => class,
            _ => return Err(RuntimeError::new(keyword, "Superclass must be a class.")),
        };
        let this = Token::new(TokenType::This, "this", keyword.line, keyword.column);
        let receiver = match self.environment.get_at(distance.saturating_sub(1), &this)? {
            Value::Instance(instance) => Receiver::Instance(instance),
            Value::Class(class) => Receiver::Class(class),
            _ => return Err(RuntimeError::new(keyword, "Cannot use 'super' outside of a class.")),
        };
        Ok((superclass, receiver))
    }
    fn super_member(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let (superclass, receiver) = self.super_target(id, keyword)?;
        let found = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| undefined_property(method))?;
        self.member_value(Member::Method(found.bind(receiver)), method)
    }
    // `super.init(...)` on an instance runs the superclass's whole
    // initializer chain, the same one constructing the superclass runs.
    fn super_init(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
        arguments: &[Expression],
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        let (superclass, receiver) = self.super_target(id, keyword)?;
        let instance = match receiver {
            Receiver::Instance(instance) => instance,
            receiver => {
                let found = superclass
                    .find_method(&method.lexeme)
                    .ok_or_else(|| undefined_property(method))?;
                let callee = Value::Callable(Callable::Function(found.bind(receiver)));
                let values = self.evaluate_all(arguments)?;
                return self.call_value(callee, &values, paren);
            }
        };
        if superclass.find_method(&method.lexeme).is_none() {
            return Err(undefined_property(method));
        }
        let values = self.evaluate_all(arguments)?;
        superclass.initialize(self, &instance, &values, paren)?;
        Ok(Value::Instance(instance))
    }
    fn evaluate_all(&mut self, expressions: &[Expression]) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(expressions.len());
        for expression in expressions {
            values.push(self.evaluate(expression)?);
        }
        Ok(values)
    }
    // Getters run as soon as they are looked up.
    fn member_value(&mut self, member: Member, name: &Token) -> Result<Value, RuntimeError> {
        match member {
            Member::Field(value) => Ok(value),
            Member::Method(method) if method.kind().is_getter() => {
                Callable::Function(method).call(self, &[], name)
            }
            Member::Method(method) => Ok(Value::Callable(Callable::Function(method))),
        }
    }
    fn call_value(&mut self, callee: Value, arguments: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
        match callee {
            Value::Callable(callable) => callable.call(self, arguments, paren),
            Value::Class(class) => class.instantiate(self, arguments, paren),
            _ => Err(RuntimeError::new(paren, "Can only call functions and classes.")),
        }
    }
    pub(crate) fn write_output(&mut self, text: &str, token: &Token) -> Result<(), RuntimeError> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|e| RuntimeError::new(token, format!("Cannot write output: {}", e)))
    }
    /// Next input line without its terminator, or None at end of input.
    pub(crate) fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(|c: char| c == '\n' || c == '\r').len();
                line.truncate(trimmed);
                Some(line)
            }
        }
    }
}

fn unknown_operator(operator: &Token) -> RuntimeError {
    RuntimeError::new(operator, format!("Unknown operator {}.", operator))
}

fn binary(left: Value, operator: &Token, right: Value) -> Result<Value, RuntimeError> {
    match operator.tokentype {
        TokenType::EqualEqual => return Ok(Value::Boolean(left.equals(&right))),
        TokenType::BangEqual => return Ok(Value::Boolean(!left.equals(&right))),
        TokenType::Plus => {
            return match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", left, right)))
                }
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands to '+' must be two numbers or include a string.",
                )),
            }
        }
        _ => (),
    }
    let (l, r) = match (left, right) {
        (Value::Number(l), Value::Number(r)) => (l, r),
        _ => {
            return Err(RuntimeError::new(
                operator,
                format!("Operands to '{}' must be numbers.", operator.lexeme),
            ))
        }
    };
    match operator.tokentype {
        TokenType::Minus => Ok(Value::Number(l - r)),
        TokenType::Star => Ok(Value::Number(l * r)),
        TokenType::Slash => {
            if r == 0.0 {
                Err(RuntimeError::new(operator, "Division by zero in '/'."))
            } else {
                Ok(Value::Number(l / r))
            }
        }
        TokenType::Greater => Ok(Value::Boolean(l > r)),
        TokenType::GreaterEqual => Ok(Value::Boolean(l >= r)),
        TokenType::Less => Ok(Value::Boolean(l < r)),
        TokenType::LessEqual => Ok(Value::Boolean(l <= r)),
        _ => Err(unknown_operator(operator)),
    }
}

#[cfg(test)]
mod interpreter_tests {
    use super::{Interpreter, SharedBuffer};
    use crate::config::Config;
    use crate::parser::parse;
    use crate::resolver::Resolver;
    use crate::scanner::scan_tokens;
    use pretty_assertions::assert_eq;
    use std::io;

    fn interpreter() -> (Interpreter, SharedBuffer) {
        let output = SharedBuffer::new();
        let interpreter =
            Interpreter::with_io(Config::default(), Box::new(output.clone()), Box::new(io::empty()));
        (interpreter, output)
    }

    fn run(interpreter: &mut Interpreter, source: &str) -> Result<(), String> {
        let (tokens, scan_errors) = scan_tokens(source);
        assert!(scan_errors.is_empty(), "{:?}", scan_errors);
        let (statements, parse_errors) = parse(&tokens);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let mut resolver = Resolver::new();
        let diagnostics = resolver.resolve(&statements);
        assert!(diagnostics.iter().all(|d| !d.is_error()), "{:?}", diagnostics);
        interpreter.resolve_locals(resolver.locals());
        interpreter.interpret(&statements).map_err(|e| e.message)
    }

    fn output_of(source: &str) -> String {
        let (mut interpreter, output) = interpreter();
        run(&mut interpreter, source).unwrap();
        output.contents()
    }

    fn error_of(source: &str) -> String {
        let (mut interpreter, _) = interpreter();
        run(&mut interpreter, source).unwrap_err()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(output_of("println(1 + 2 * 3 - 4 / 2);"), "5\n");
        assert_eq!(output_of("println(-(1 + 1.5));"), "-2.5\n");
        assert_eq!(output_of("println(!nil);"), "true\n");
        assert_eq!(output_of("println(2 >= 2 == 1 < 0);"), "false\n");
    }

    #[test]
    fn operand_errors() {
        assert_eq!(error_of("-\"a\";"), "Operand to '-' must be a number.");
        assert_eq!(error_of("1 < \"a\";"), "Operands to '<' must be numbers.");
        assert_eq!(
            error_of("true + 1;"),
            "Operands to '+' must be two numbers or include a string."
        );
        assert_eq!(error_of("1 / 0;"), "Division by zero in '/'.");
    }

    #[test]
    fn string_concatenation_formats_the_other_side() {
        assert_eq!(output_of("println(\"n\" + 1 + true + nil);"), "n1truenil\n");
        assert_eq!(output_of("println(2.5 + \"x\");"), "2.5x\n");
    }

    #[test]
    fn environment_is_restored_after_error_in_block() {
        let (mut interp, output) = interpreter();
        assert!(run(&mut interp, "var a = \"outer\"; { var a = \"inner\"; nope; }").is_err());
        run(&mut interp, "println(a);").unwrap();
        assert_eq!(output.contents(), "outer\n");
    }

    #[test]
    fn return_unwinds_nested_loops() {
        let source = "
            fun find() {
              for (var i = 0; i < 10; i = i + 1) {
                while (true) {
                  if (i == 3) return i;
                  break;
                }
              }
              return -1;
            }
            println(find());";
        assert_eq!(output_of(source), "3\n");
    }

    #[test]
    fn methods_are_inherited_and_overridable() {
        let source = "
            class A { f() { return \"A.f\"; } g() { return \"A.g\"; } }
            class B < A { g() { return \"B.g\"; } }
            var b = B();
            println(b.f());
            println(b.g());";
        assert_eq!(output_of(source), "A.f\nB.g\n");
    }

    #[test]
    fn non_class_superclass() {
        assert_eq!(error_of("var A = 1; class B < A {}"), "Superclass must be a class.");
    }

    #[test]
    fn properties_on_non_objects() {
        assert_eq!(error_of("var x = 1; x.y;"), "Only instances and classes have properties.");
        assert_eq!(error_of("var x = 1; x.y = 2;"), "Only instances and classes have fields.");
    }
}
