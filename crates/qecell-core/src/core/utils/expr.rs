use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Malformed number '{0}'")]
    InvalidNumber(String),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Expression does not evaluate to a finite number")]
    NonFinite,
}

/// Evaluates a coordinate expression such as `1/3`, `-0.25d0` or `sqrt(3)/2`.
///
/// Supported syntax: decimal numbers with optional `e`/`d` exponents, the binary
/// operators `+ - * / ^` (`^` binds tightest and is right-associative), unary signs,
/// parentheses, the constant `pi`, and the functions `sqrt`, `exp`, `log`, `sin`,
/// `cos`, `tan` and `abs`. Identifiers are case-insensitive.
///
/// # Errors
///
/// Returns an [`ExprError`] when the text does not parse or the result is not finite.
pub fn evaluate(text: &str) -> Result<f64, ExprError> {
    let mut parser = Parser::new(text);
    parser.skip_whitespace();
    if parser.peek().is_none() {
        return Err(ExprError::Empty);
    }
    let value = parser.expression()?;
    parser.skip_whitespace();
    if let Some(ch) = parser.peek() {
        return Err(ExprError::UnexpectedChar {
            ch,
            pos: parser.pos,
        });
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExprError::NonFinite)
    }
}

/// Formats a value with a fixed number of decimals, never producing `-0.000`.
pub fn format_value(value: f64, precision: usize) -> String {
    let text = format!("{value:.precision$}");
    match text.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => text,
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExprError> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(ch) => Err(ExprError::UnexpectedChar { ch, pos: self.pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                value /= self.unary()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<f64, ExprError> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ExprError::UnexpectedEnd),
            Some('(') => {
                self.pos += 1;
                let value = self.expression()?;
                self.expect(')')?;
                Ok(value)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.number(),
            Some(ch) if ch.is_ascii_alphabetic() => self.identifier(),
            Some(ch) => Err(ExprError::UnexpectedChar { ch, pos: self.pos }),
        }
    }

    fn number(&mut self) -> Result<f64, ExprError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if self.peek().is_some_and(|c| matches!(c, 'e' | 'E' | 'd' | 'D')) {
            let mark = self.pos;
            self.pos += 1;
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.pos += 1;
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                // Not an exponent after all, e.g. the start of an identifier.
                self.pos = mark;
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        raw.replace(['d', 'D'], "e")
            .parse::<f64>()
            .map_err(|_| ExprError::InvalidNumber(raw))
    }

    fn identifier(&mut self) -> Result<f64, ExprError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        let lowered = name.to_ascii_lowercase();
        if lowered == "pi" {
            return Ok(PI);
        }
        let function: fn(f64) -> f64 = match lowered.as_str() {
            "sqrt" => f64::sqrt,
            "exp" => f64::exp,
            "log" => f64::ln,
            "sin" => f64::sin,
            "cos" => f64::cos,
            "tan" => f64::tan,
            "abs" => f64::abs,
            _ => return Err(ExprError::UnknownIdentifier(name)),
        };
        self.expect('(')?;
        let argument = self.expression()?;
        self.expect(')')?;
        Ok(function(argument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(text: &str, expected: f64) {
        let value = evaluate(text).unwrap_or_else(|e| panic!("{text}: {e}"));
        assert!((value - expected).abs() < 1e-12, "{text}: {value} != {expected}");
    }

    mod numbers {
        use super::*;

        #[test]
        fn plain_and_scientific_numbers_parse() {
            close("0.25", 0.25);
            close(".5", 0.5);
            close("3", 3.0);
            close("1.5e-2", 0.015);
            close("  -2.0E+1 ", -20.0);
        }

        #[test]
        fn fortran_double_precision_exponents_parse() {
            close("1.0d-3", 1e-3);
            close("2.5D2", 250.0);
        }

        #[test]
        fn malformed_numbers_are_rejected() {
            assert!(matches!(evaluate("1.2.3"), Err(ExprError::InvalidNumber(_))));
            assert!(evaluate("1e").is_err());
        }
    }

    mod operators {
        use super::*;

        #[test]
        fn precedence_follows_arithmetic_conventions() {
            close("1 + 2 * 3", 7.0);
            close("(1 + 2) * 3", 9.0);
            close("1/3 + 1/3", 2.0 / 3.0);
            close("2^3^2", 512.0);
            close("-2^2", -4.0);
        }

        #[test]
        fn unary_signs_nest() {
            close("--1", 1.0);
            close("-+-0.5", 0.5);
            close("1 - -1", 2.0);
        }
    }

    mod functions {
        use super::*;

        #[test]
        fn constants_and_functions_evaluate() {
            close("sqrt(3)/2", 3f64.sqrt() / 2.0);
            close("cos(pi/3)", 0.5);
            close("ABS(-0.1)", 0.1);
            close("log(exp(2))", 2.0);
        }

        #[test]
        fn unknown_identifiers_are_rejected() {
            assert_eq!(
                evaluate("foo(1)"),
                Err(ExprError::UnknownIdentifier("foo".to_string()))
            );
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn empty_and_blank_input_is_an_error() {
            assert_eq!(evaluate(""), Err(ExprError::Empty));
            assert_eq!(evaluate("   "), Err(ExprError::Empty));
        }

        #[test]
        fn dangling_operators_and_parentheses_fail() {
            assert_eq!(evaluate("1 +"), Err(ExprError::UnexpectedEnd));
            assert_eq!(evaluate("(1 + 2"), Err(ExprError::UnexpectedEnd));
            assert!(matches!(
                evaluate("1 + 2)"),
                Err(ExprError::UnexpectedChar { ch: ')', pos: 5 })
            ));
            assert!(matches!(
                evaluate("0.5x"),
                Err(ExprError::UnexpectedChar { ch: 'x', .. })
            ));
        }

        #[test]
        fn non_finite_results_are_rejected() {
            assert_eq!(evaluate("1/0"), Err(ExprError::NonFinite));
            assert_eq!(evaluate("sqrt(-1)"), Err(ExprError::NonFinite));
        }
    }

    #[test]
    fn format_value_uses_fixed_precision_without_negative_zero() {
        assert_eq!(format_value(0.5, 4), "0.5000");
        assert_eq!(format_value(-1e-12, 6), "0.000000");
        assert_eq!(format_value(-0.25, 2), "-0.25");
    }
}
