//! Custom underwriting formulas.
//!
//! A formula is an arithmetic expression over named decimal variables:
//!
//! ```text
//! arv * 0.75 - repair_costs - max(holding_costs, 5000)
//! ```
//!
//! Supported: decimal literals, lowercase identifiers (`[a-z_][a-z0-9_]*`), `+ - * /`, unary minus,
//! parentheses and the functions `min`, `max`, `abs`, `floor` and
//! `round(x)` / `round(x, dp)`. Evaluation uses checked decimal
//! arithmetic, so overflow and division by zero are errors, not panics.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use thiserror::Error;

/// Longest accepted formula source, in bytes
const MAX_SOURCE_LEN: usize = 1_000;

/// Deepest accepted nesting of parentheses, calls and unary minus
const MAX_DEPTH: usize = 64;

/// Largest `dp` argument accepted by `round`
const MAX_ROUND_DP: u32 = 10;

/// Error types for formula parsing and evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(Decimal),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

fn parse_error(position: usize, message: impl Into<String>) -> FormulaError {
    FormulaError::Parse {
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
            }
            b'+' | b'-' | b'*' | b'/' | b'(' | b')' | b',' => {
                let token = match c {
                    b'+' => Token::Plus,
                    b'-' => Token::Minus,
                    b'*' => Token::Star,
                    b'/' => Token::Slash,
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    _ => Token::Comma,
                };
                tokens.push((i, token));
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                let mut seen_dot = false;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    if bytes[i] == b'.' {
                        if seen_dot {
                            return Err(parse_error(i, "unexpected second decimal point"));
                        }
                        seen_dot = true;
                    }
                    i += 1;
                }
                let text = &source[start..i];
                let value = Decimal::from_str(text)
                    .map_err(|_| parse_error(start, format!("invalid number '{}'", text)))?;
                tokens.push((start, Token::Number(value)));
            }
            b'a'..=b'z' | b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push((start, Token::Ident(source[start..i].to_string())));
            }
            b'A'..=b'Z' => {
                return Err(parse_error(
                    i,
                    "identifiers are lowercase letters, digits and underscores",
                ));
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('?');
                return Err(parse_error(i, format!("unexpected character '{}'", ch)));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), FormulaError> {
        let position = self.position();
        match self.advance() {
            Some(ref token) if *token == expected => Ok(()),
            _ => Err(parse_error(position, format!("expected {}", what))),
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(parse_error(self.position(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            self.enter()?;
            let inner = self.unary()?;
            self.leave();
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Var(name));
                }
                self.advance();
                self.enter()?;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(Token::RParen, "')' after function arguments")?;
                self.leave();
                check_call(&name, args.len())?;
                Ok(Expr::Call(name, args))
            }
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                self.leave();
                Ok(inner)
            }
            Some(_) => Err(parse_error(position, "expected a number, variable or '('")),
            None => Err(parse_error(position, "unexpected end of formula")),
        }
    }
}

fn check_call(name: &str, found: usize) -> Result<(), FormulaError> {
    let (ok, expected) = match name {
        "min" | "max" => (found >= 1, "at least 1"),
        "abs" | "floor" => (found == 1, "1"),
        "round" => (found == 1 || found == 2, "1 or 2"),
        _ => return Err(FormulaError::UnknownFunction(name.to_string())),
    };

    if ok {
        Ok(())
    } else {
        Err(FormulaError::Arity {
            function: name.to_string(),
            expected,
            found,
        })
    }
}

/// A parsed, reusable formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse formula source text
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(parse_error(
                MAX_SOURCE_LEN,
                format!("formula longer than {} characters", MAX_SOURCE_LEN),
            ));
        }

        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(parse_error(0, "formula is empty"));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.expression()?;

        if parser.pos < parser.tokens.len() {
            return Err(parse_error(parser.position(), "unexpected trailing input"));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// All variable names the formula references
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_vars(&self.expr, &mut names);
        names
    }

    /// Fail with the first variable not in `known`
    pub fn check_variables(&self, known: &[&str]) -> Result<(), FormulaError> {
        match self
            .variables()
            .into_iter()
            .find(|name| !known.contains(&name.as_str()))
        {
            Some(unknown) => Err(FormulaError::UnknownVariable(unknown)),
            None => Ok(()),
        }
    }

    /// Evaluate against variable bindings
    pub fn evaluate(&self, vars: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
        eval(&self.expr, vars)
    }
}

fn collect_vars(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Var(name) => {
            names.insert(name.clone());
        }
        Expr::Neg(inner) => collect_vars(inner, names),
        Expr::Binary(_, left, right) => {
            collect_vars(left, names);
            collect_vars(right, names);
        }
        Expr::Call(_, args) => args.iter().for_each(|arg| collect_vars(arg, names)),
    }
}

fn eval(expr: &Expr, vars: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Var(name) => vars
            .get(name)
            .copied()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::Neg(inner) => Ok(-eval(inner, vars)?),
        Expr::Binary(op, left, right) => {
            let l = eval(left, vars)?;
            let r = eval(right, vars)?;
            match op {
                BinOp::Add => l.checked_add(r).ok_or(FormulaError::Overflow),
                BinOp::Sub => l.checked_sub(r).ok_or(FormulaError::Overflow),
                BinOp::Mul => l.checked_mul(r).ok_or(FormulaError::Overflow),
                BinOp::Div => {
                    if r.is_zero() {
                        Err(FormulaError::DivisionByZero)
                    } else {
                        l.checked_div(r).ok_or(FormulaError::Overflow)
                    }
                }
            }
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, vars))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &values)
        }
    }
}

fn call(name: &str, args: &[Decimal]) -> Result<Decimal, FormulaError> {
    check_call(name, args.len())?;
    match name {
        "min" => Ok(args.iter().copied().fold(args[0], Decimal::min)),
        "max" => Ok(args.iter().copied().fold(args[0], Decimal::max)),
        "abs" => Ok(args[0].abs()),
        "floor" => Ok(args[0].floor()),
        "round" => {
            let dp = match args.get(1) {
                None => 0,
                Some(dp) => {
                    if !dp.fract().is_zero() || *dp < Decimal::ZERO || *dp > Decimal::from(MAX_ROUND_DP)
                    {
                        return Err(FormulaError::InvalidArgument(format!(
                            "round places must be a whole number between 0 and {}",
                            MAX_ROUND_DP
                        )));
                    }
                    dp.to_u32().unwrap_or(0)
                }
            };
            Ok(args[0].round_dp(dp))
        }
        _ => Err(FormulaError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, i64)]) -> HashMap<String, Decimal> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Decimal::from(*v)))
            .collect()
    }

    fn eval_str(source: &str, bindings: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
        Formula::parse(source)?.evaluate(bindings)
    }

    #[test]
    fn test_precedence_and_associativity() {
        let empty = HashMap::new();
        assert_eq!(eval_str("1 + 2 * 3", &empty).unwrap(), Decimal::from(7));
        assert_eq!(eval_str("(1 + 2) * 3", &empty).unwrap(), Decimal::from(9));
        assert_eq!(eval_str("10 - 4 - 3", &empty).unwrap(), Decimal::from(3));
        assert_eq!(eval_str("100 / 10 / 5", &empty).unwrap(), Decimal::from(2));
        assert_eq!(eval_str("-2 * -3", &empty).unwrap(), Decimal::from(6));
    }

    #[test]
    fn test_mao_as_custom_formula() {
        let bindings = vars(&[
            ("arv", 300_000),
            ("repair_costs", 20_000),
            ("holding_costs", 9_000),
            ("closing_costs", 5_000),
        ]);
        let result = eval_str(
            "max(arv * (1 - 0.20) - repair_costs - holding_costs - closing_costs, 0)",
            &bindings,
        )
        .unwrap();
        assert_eq!(result, Decimal::from(206_000));
    }

    #[test]
    fn test_functions() {
        let empty = HashMap::new();
        assert_eq!(eval_str("min(5, 2, 9)", &empty).unwrap(), Decimal::from(2));
        assert_eq!(eval_str("max(5, 2, 9)", &empty).unwrap(), Decimal::from(9));
        assert_eq!(eval_str("abs(-4)", &empty).unwrap(), Decimal::from(4));
        assert_eq!(eval_str("floor(4.9)", &empty).unwrap(), Decimal::from(4));
        assert_eq!(eval_str("round(2.5)", &empty).unwrap(), Decimal::from(2));
        assert_eq!(
            eval_str("round(10 / 3, 2)", &empty).unwrap(),
            Decimal::new(333, 2)
        );
    }

    #[test]
    fn test_identifiers_are_lowercase() {
        let bindings = vars(&[("arv", 10)]);
        assert_eq!(eval_str("arv * 2", &bindings).unwrap(), Decimal::from(20));
        assert_eq!(
            Formula::parse("ARV * 2"),
            Err(FormulaError::Parse {
                position: 0,
                message: "identifiers are lowercase letters, digits and underscores".to_string(),
            })
        );
        assert!(matches!(
            Formula::parse("arv - Repair_costs"),
            Err(FormulaError::Parse { position: 6, .. })
        ));
        assert!(matches!(
            Formula::parse("MAX(arv, 1)"),
            Err(FormulaError::Parse { .. })
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let bindings = vars(&[("profit", 0)]);
        assert_eq!(
            eval_str("100 / profit", &bindings),
            Err(FormulaError::DivisionByZero)
        );
    }

    #[test]
    fn test_unknown_variable_at_evaluation() {
        assert_eq!(
            eval_str("cap_rate * 2", &HashMap::new()),
            Err(FormulaError::UnknownVariable("cap_rate".to_string()))
        );
    }

    #[test]
    fn test_check_variables() {
        let formula = Formula::parse("arv - repairs").unwrap();
        assert_eq!(
            formula.check_variables(&["arv", "repair_costs"]),
            Err(FormulaError::UnknownVariable("repairs".to_string()))
        );

        let formula = Formula::parse("arv - repair_costs").unwrap();
        assert!(formula.check_variables(&["arv", "repair_costs"]).is_ok());
        assert_eq!(formula.variables().len(), 2);
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(
            Formula::parse("sqrt(4)"),
            Err(FormulaError::UnknownFunction("sqrt".to_string()))
        );
        assert!(matches!(
            Formula::parse("abs(1, 2)"),
            Err(FormulaError::Arity { found: 2, .. })
        ));
        assert!(matches!(
            Formula::parse("max()"),
            Err(FormulaError::Arity { found: 0, .. })
        ));
    }

    #[test]
    fn test_parse_errors_report_position() {
        assert_eq!(
            Formula::parse("1 + "),
            Err(FormulaError::Parse {
                position: 4,
                message: "unexpected end of formula".to_string()
            })
        );
        assert!(matches!(
            Formula::parse("2 $ 3"),
            Err(FormulaError::Parse { position: 2, .. })
        ));
        assert!(matches!(
            Formula::parse("(1 + 2"),
            Err(FormulaError::Parse { .. })
        ));
        assert!(matches!(
            Formula::parse("1 2"),
            Err(FormulaError::Parse { position: 2, .. })
        ));
        assert!(matches!(Formula::parse("   "), Err(FormulaError::Parse { .. })));
        assert!(matches!(
            Formula::parse("1.2.3"),
            Err(FormulaError::Parse { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            Formula::parse(&deep),
            Err(FormulaError::Parse { .. })
        ));

        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(Formula::parse(&shallow).is_ok());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let bindings = vars(&[("big", i64::MAX)]);
        assert_eq!(
            eval_str("big * big * big * big", &bindings),
            Err(FormulaError::Overflow)
        );
    }

    #[test]
    fn test_round_rejects_bad_places() {
        let empty = HashMap::new();
        assert!(matches!(
            eval_str("round(1.234, 1.5)", &empty),
            Err(FormulaError::InvalidArgument(_))
        ));
        assert!(matches!(
            eval_str("round(1.234, 50)", &empty),
            Err(FormulaError::InvalidArgument(_))
        ));
    }
}
