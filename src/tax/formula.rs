//! Sandboxed arithmetic evaluator for rulebook formulas
//!
//! The grammar is closed: decimal numbers, named variables, `+ - * /`, unary
//! minus and parentheses. The whole formula is tokenized before anything is
//! evaluated, so a formula containing any other character, or a name that is
//! not in the variable context, is rejected outright.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | NAME | '(' expr ')'
//! ```

use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::utils::decimal::zero;

/// Variable name to value bindings for one evaluation
pub type Variables = HashMap<String, BigDecimal>;

pub const MAX_FORMULA_LEN: usize = 2048;
pub const MAX_NESTING: usize = 64;

/// Errors from parsing or evaluating a formula
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("formula exceeds {MAX_FORMULA_LEN} characters")]
    TooLong,
    #[error("character {ch:?} at position {position} is not allowed")]
    DisallowedCharacter { ch: char, position: usize },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("formula ended unexpectedly")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("parentheses nested deeper than {MAX_NESTING}")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(BigDecimal),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => format!("number {value}"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
        }
    }
}

/// Turn the formula into tokens, resolving variables as whole words
fn tokenize(formula: &str, variables: &Variables) -> Result<Vec<(Token, usize)>, FormulaError> {
    let chars: Vec<char> = formula.chars().collect();
    let mut tokens = Vec::new();
    let mut position = 0;

    while position < chars.len() {
        let ch = chars[position];
        let start = position;

        match ch {
            c if c.is_whitespace() => {
                position += 1;
                continue;
            }
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '*' => tokens.push((Token::Star, start)),
            '/' => tokens.push((Token::Slash, start)),
            '(' => tokens.push((Token::Open, start)),
            ')' => tokens.push((Token::Close, start)),
            c if c.is_ascii_digit() || c == '.' => {
                while position < chars.len()
                    && (chars[position].is_ascii_digit() || chars[position] == '.')
                {
                    position += 1;
                }
                let text: String = chars[start..position].iter().collect();
                let value = BigDecimal::from_str(&text)
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while position < chars.len()
                    && (chars[position].is_ascii_alphanumeric() || chars[position] == '_')
                {
                    position += 1;
                }
                let name: String = chars[start..position].iter().collect();
                let value = variables
                    .get(&name)
                    .ok_or(FormulaError::UnknownVariable(name))?;
                tokens.push((Token::Number(value.clone()), start));
                continue;
            }
            other => {
                return Err(FormulaError::DisallowedCharacter {
                    ch: other,
                    position: start,
                })
            }
        }
        position += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<BigDecimal, FormulaError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.cursor += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.cursor += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<BigDecimal, FormulaError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.cursor += 1;
                    value = value * self.unary()?;
                }
                Some(Token::Slash) => {
                    self.cursor += 1;
                    let divisor = self.unary()?;
                    if divisor == zero() {
                        return Err(FormulaError::DivisionByZero);
                    }
                    value = value / divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<BigDecimal, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                self.nested(|parser| parser.unary()).map(|value| zero() - value)
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.nested(|parser| parser.unary())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<BigDecimal, FormulaError> {
        match self.next() {
            Some((Token::Number(value), _)) => Ok(value),
            Some((Token::Open, _)) => {
                let value = self.nested(|parser| parser.expr())?;
                match self.next() {
                    Some((Token::Close, _)) => Ok(value),
                    Some((token, position)) => Err(FormulaError::UnexpectedToken {
                        found: token.describe(),
                        position,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((token, position)) => Err(FormulaError::UnexpectedToken {
                found: token.describe(),
                position,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, FormulaError>,
    ) -> Result<T, FormulaError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::TooDeep);
        }
        let result = inner(self);
        self.depth -= 1;
        result
    }
}

/// Evaluates rulebook formulas against a variable context
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEvaluator;

impl FormulaEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `formula` with the given variables
    pub fn evaluate(&self, formula: &str, variables: &Variables) -> Result<BigDecimal, FormulaError> {
        if formula.len() > MAX_FORMULA_LEN {
            return Err(FormulaError::TooLong);
        }

        let tokens = tokenize(formula, variables)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }

        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
        };
        let value = parser.expr()?;

        match parser.next() {
            None => Ok(value),
            Some((token, position)) => Err(FormulaError::UnexpectedToken {
                found: token.describe(),
                position,
            }),
        }
    }
}

/// Build a variable context from name/value pairs
pub fn variables<I, K>(pairs: I) -> Variables
where
    I: IntoIterator<Item = (K, BigDecimal)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(formula: &str, pairs: &[(&str, i64)]) -> Result<BigDecimal, FormulaError> {
        let context = variables(
            pairs
                .iter()
                .map(|(name, value)| (*name, BigDecimal::from(*value))),
        );
        FormulaEvaluator::new().evaluate(formula, &context)
    }

    #[test]
    fn test_salary_formula() {
        assert_eq!(
            eval("salary * 0.1 + 5000", &[("salary", 200000)]).unwrap(),
            BigDecimal::from(25000)
        );
    }

    #[test]
    fn test_shell_text_rejected() {
        assert!(eval("rm -rf", &[]).is_err());
        assert!(matches!(
            eval("1; drop", &[]),
            Err(FormulaError::DisallowedCharacter { ch: ';', position: 1 })
        ));
        assert!(matches!(
            eval("process.exit(1)", &[]),
            Err(FormulaError::UnknownVariable(name)) if name == "process"
        ));
    }

    #[test]
    fn test_whole_word_substitution() {
        // "salary" must not replace the prefix of "salary_bonus"
        let value = eval(
            "salary + salary_bonus",
            &[("salary", 100), ("salary_bonus", 7)],
        )
        .unwrap();
        assert_eq!(value, BigDecimal::from(107));

        assert!(matches!(
            eval("salaryx", &[("salary", 100)]),
            Err(FormulaError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(eval("2 + 3 * 4", &[]).unwrap(), BigDecimal::from(14));
        assert_eq!(eval("(2 + 3) * 4", &[]).unwrap(), BigDecimal::from(20));
        assert_eq!(eval("10 - 4 - 3", &[]).unwrap(), BigDecimal::from(3));
        assert_eq!(eval("-x + 10", &[("x", 4)]).unwrap(), BigDecimal::from(6));
        assert_eq!(eval("100 / 8", &[]).unwrap(), BigDecimal::from_str("12.5").unwrap());
    }

    #[test]
    fn test_malformed_formulas() {
        assert_eq!(eval("", &[]), Err(FormulaError::Empty));
        assert_eq!(eval("   ", &[]), Err(FormulaError::Empty));
        assert_eq!(eval("1 +", &[]), Err(FormulaError::UnexpectedEnd));
        assert_eq!(eval("(1 + 2", &[]), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(
            eval("1 2", &[]),
            Err(FormulaError::UnexpectedToken { position: 2, .. })
        ));
        assert!(matches!(eval("1.2.3", &[]), Err(FormulaError::InvalidNumber(_))));
        assert_eq!(eval("5 / (2 - 2)", &[]), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(eval(&deep, &[]), Err(FormulaError::TooDeep));

        let fine = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval(&fine, &[]).unwrap(), BigDecimal::from(1));
    }
}
