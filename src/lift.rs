//! Render a [`Program`] as script source.
//!
//! Phis become `let` bindings so merges can reassign them; every other
//! defined variable is a `const`. Increment and decrement are rendered as
//! additions so they never write to a `const`.

use std::fmt::Write;

use crate::program::{FunctionKind, Operation, Program, UnaryOperator, Variable};

const INDENT: &str = "    ";

/// Lift `program` to source text, one statement per line.
pub fn lift(program: &Program) -> String {
    let mut out = Lifter::default();
    for op in program.operations() {
        out.operation(op);
    }
    out.text
}

#[derive(Default)]
struct Lifter {
    text: String,
    depth: usize,
    /// Closing text for every open function body.
    function_closers: Vec<&'static str>,
}

impl Lifter {
    fn line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.text.push_str(INDENT);
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn open(&mut self, line: impl AsRef<str>) {
        self.line(line);
        self.depth += 1;
    }

    fn close(&mut self, line: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(line);
    }

    /// `} else {`-style lines that close one block and open the next.
    fn reopen(&mut self, line: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.open(line);
    }

    fn operation(&mut self, op: &Operation) {
        use Operation::*;
        match op {
            LoadInt { output, value } => self.line(format!("const {output} = {value};")),
            LoadBigInt { output, value } => self.line(format!("const {output} = {value}n;")),
            LoadFloat { output, value } => {
                self.line(format!("const {output} = {};", float_literal(*value)))
            }
            LoadString { output, value } => {
                self.line(format!("const {output} = {};", quote(value)))
            }
            LoadBool { output, value } => self.line(format!("const {output} = {value};")),
            LoadUndefined { output } => self.line(format!("const {output} = undefined;")),
            LoadNull { output } => self.line(format!("const {output} = null;")),
            LoadRegExp {
                output,
                pattern,
                flags,
            } => self.line(format!("const {output} = /{pattern}/{flags};")),
            LoadBuiltin { output, name } => self.line(format!("const {output} = {name};")),

            CreateObject {
                output,
                properties,
                spreads,
            } => {
                let fields: Vec<String> = properties
                    .iter()
                    .map(|(name, value)| format!("{}: {value}", quote(name)))
                    .chain(spreads.iter().map(|v| format!("...{v}")))
                    .collect();
                self.line(format!("const {output} = {{{}}};", fields.join(", ")));
            }
            CreateArray {
                output,
                elements,
                spreads,
            } => self.line(format!(
                "const {output} = [{}];",
                spread_list(elements, spreads)
            )),

            BeginFunction {
                output,
                kind,
                parameters,
                has_rest,
            } => {
                let params = parameter_list(parameters, *has_rest);
                let (head, closer) = match kind {
                    FunctionKind::Plain | FunctionKind::Strict => {
                        (format!("function {output}({params}) {{"), "}")
                    }
                    FunctionKind::Arrow => (format!("const {output} = ({params}) => {{"), "};"),
                    FunctionKind::Generator => (format!("function* {output}({params}) {{"), "}"),
                    FunctionKind::Async => {
                        (format!("async function {output}({params}) {{"), "}")
                    }
                };
                self.function_closers.push(closer);
                self.open(head);
                if *kind == FunctionKind::Strict {
                    self.line("'use strict';");
                }
            }
            EndFunction => {
                let closer = self.function_closers.pop().unwrap_or("}");
                self.close(closer);
            }
            Return { value } => self.line(format!("return {value};")),
            Yield { value, delegate } => {
                let star = if *delegate { "*" } else { "" };
                self.line(format!("yield{star} {value};"));
            }
            Await { output, value } => self.line(format!("const {output} = await {value};")),

            LoadProperty {
                output,
                object,
                name,
            } => self.line(format!("const {output} = {object}{};", member(name))),
            StoreProperty {
                object,
                name,
                value,
            } => self.line(format!("{object}{} = {value};", member(name))),
            DeleteProperty { object, name } => {
                self.line(format!("delete {object}{};", member(name)))
            }
            LoadElement {
                output,
                object,
                index,
            } => self.line(format!("const {output} = {object}[{index}];")),
            StoreElement {
                object,
                index,
                value,
            } => self.line(format!("{object}[{index}] = {value};")),
            DeleteElement { object, index } => self.line(format!("delete {object}[{index}];")),
            LoadComputedProperty {
                output,
                object,
                name,
            } => self.line(format!("const {output} = {object}[{name}];")),
            StoreComputedProperty {
                object,
                name,
                value,
            } => self.line(format!("{object}[{name}] = {value};")),
            DeleteComputedProperty { object, name } => {
                self.line(format!("delete {object}[{name}];"))
            }

            TypeOf { output, value } => self.line(format!("const {output} = typeof {value};")),
            InstanceOf {
                output,
                value,
                constructor,
            } => self.line(format!("const {output} = {value} instanceof {constructor};")),
            In {
                output,
                property,
                object,
            } => self.line(format!("const {output} = {property} in {object};")),

            CallMethod {
                output,
                object,
                method,
                arguments,
            } => self.line(format!(
                "const {output} = {object}{}({});",
                member(method),
                join(arguments)
            )),
            CallFunction {
                output,
                function,
                arguments,
                spreads,
            } => self.line(format!(
                "const {output} = {function}({});",
                spread_list(arguments, spreads)
            )),
            Construct {
                output,
                constructor,
                arguments,
            } => self.line(format!(
                "const {output} = new {constructor}({});",
                join(arguments)
            )),

            Unary { output, op, value } => {
                let expr = match op {
                    UnaryOperator::Inc => format!("{value} + 1"),
                    UnaryOperator::Dec => format!("{value} - 1"),
                    other => format!("{}{value}", other.token()),
                };
                self.line(format!("const {output} = {expr};"));
            }
            Binary {
                output,
                lhs,
                op,
                rhs,
            } => self.line(format!("const {output} = {lhs} {} {rhs};", op.token())),
            Compare {
                output,
                lhs,
                comparator,
                rhs,
            } => self.line(format!(
                "const {output} = {lhs} {} {rhs};",
                comparator.token()
            )),

            Phi { output, initial } => self.line(format!("let {output} = {initial};")),
            Copy { target, value } => self.line(format!("{target} = {value};")),

            BeginIf { condition } => self.open(format!("if ({condition}) {{")),
            BeginElse => self.reopen("} else {"),
            EndIf | EndWhile | EndFor | EndForIn | EndForOf | EndTryCatch | EndWith => {
                self.close("}")
            }
            BeginWhile {
                lhs,
                comparator,
                rhs,
            } => self.open(format!("while ({lhs} {} {rhs}) {{", comparator.token())),
            BeginDoWhile => self.open("do {"),
            EndDoWhile {
                lhs,
                comparator,
                rhs,
            } => self.close(format!("}} while ({lhs} {} {rhs});", comparator.token())),
            BeginFor {
                counter,
                comparator,
                end,
                op,
                step,
            } => self.open(format!(
                "for (; {counter} {} {end}; {counter} = {counter} {} {step}) {{",
                comparator.token(),
                op.token()
            )),
            BeginForIn { output, object } => {
                self.open(format!("for (const {output} in {object}) {{"))
            }
            BeginForOf { output, iterable } => {
                self.open(format!("for (const {output} of {iterable}) {{"))
            }
            Break => self.line("break;"),
            Continue => self.line("continue;"),

            BeginTry => self.open("try {"),
            BeginCatch { exception } => self.reopen(format!("}} catch ({exception}) {{")),
            Throw { value } => self.line(format!("throw {value};")),

            BeginWith { object } => self.open(format!("with ({object}) {{")),
            LoadFromScope { output, name } => self.line(format!("const {output} = {name};")),
            StoreToScope { name, value } => self.line(format!("{name} = {value};")),
        }
    }
}

fn join(vars: &[Variable]) -> String {
    vars.iter()
        .map(Variable::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn spread_list(vars: &[Variable], spreads: &[bool]) -> String {
    vars.iter()
        .enumerate()
        .map(|(i, v)| {
            if spreads.get(i).copied().unwrap_or(false) {
                format!("...{v}")
            } else {
                v.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parameter_list(parameters: &[Variable], has_rest: bool) -> String {
    let mut list = join(parameters);
    if has_rest {
        // The rest parameter gets a name of its own; nothing reads it.
        if !list.is_empty() {
            list.push_str(", ");
        }
        list.push_str("...rest");
    }
    list
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `.name` for identifiers, `["name"]` otherwise.
fn member(name: &str) -> String {
    if is_identifier(name) {
        format!(".{name}")
    } else {
        format!("[{}]", quote(name))
    }
}

fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 && value.is_sign_negative() {
        "-0".to_string()
    } else {
        format!("{value:?}")
    }
}

/// Double-quoted string literal.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
