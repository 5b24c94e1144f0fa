//! Literal expressions bound to vertex parameters.
//!
//! Numeric literals are small arithmetic expressions over the run's
//! [`GenerationContext`], e.g. `mapSize / 8` or `-(radius + 0.5)`. Enum
//! parameters take the variant name, strings take an optionally quoted text.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::value::{ParamType, Value};
use crate::mask::NeighborPolicy;
use crate::symmetry::{Symmetry, SymmetrySource};

// =============================================================================
// Generation context
// =============================================================================

/// Variables visible to literal expressions during one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationContext {
  pub seed: u64,
  pub map_size: usize,
  pub spawn_count: usize,
  pub num_teams: usize,
  /// Extra named values, e.g. tuning knobs from the run configuration.
  pub variables: BTreeMap<String, f64>,
}

impl Default for GenerationContext {
  fn default() -> Self {
    Self {
      seed: 0,
      map_size: 512,
      spawn_count: 2,
      num_teams: 2,
      variables: BTreeMap::new(),
    }
  }
}

impl GenerationContext {
  pub fn new(seed: u64, map_size: usize) -> Self {
    Self {
      seed,
      map_size,
      ..Default::default()
    }
  }

  pub fn with_variable(mut self, name: impl Into<String>, value: f64) -> Self {
    self.variables.insert(name.into(), value);
    self
  }

  pub fn variable(&self, name: &str) -> Option<f64> {
    match name {
      "mapSize" | "map_size" => Some(self.map_size as f64),
      "seed" => Some(self.seed as f64),
      "spawnCount" | "spawn_count" => Some(self.spawn_count as f64),
      "numTeams" | "num_teams" => Some(self.num_teams as f64),
      other => self.variables.get(other).copied(),
    }
  }
}

// =============================================================================
// Arithmetic
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
  Number(f64),
  Variable(String),
  Neg(Box<Expr>),
  Binary(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl Expr {
  pub fn parse(source: &str) -> Result<Expr, String> {
    let mut parser = Parser {
      chars: source.chars().peekable(),
    };
    let expr = parser.sum()?;
    parser.skip_whitespace();
    match parser.chars.peek() {
      None => Ok(expr),
      Some(c) => Err(format!("unexpected `{c}`")),
    }
  }

  pub fn is_constant(&self) -> bool {
    match self {
      Expr::Number(_) => true,
      Expr::Variable(_) => false,
      Expr::Neg(inner) => inner.is_constant(),
      Expr::Binary(lhs, _, rhs) => lhs.is_constant() && rhs.is_constant(),
    }
  }

  pub fn eval(&self, context: &GenerationContext) -> Result<f64, String> {
    match self {
      Expr::Number(v) => Ok(*v),
      Expr::Variable(name) => context
        .variable(name)
        .ok_or_else(|| format!("unknown variable `{name}`")),
      Expr::Neg(inner) => Ok(-inner.eval(context)?),
      Expr::Binary(lhs, op, rhs) => {
        let (a, b) = (lhs.eval(context)?, rhs.eval(context)?);
        match op {
          BinOp::Add => Ok(a + b),
          BinOp::Sub => Ok(a - b),
          BinOp::Mul => Ok(a * b),
          BinOp::Div if b == 0.0 => Err("division by zero".to_string()),
          BinOp::Div => Ok(a / b),
        }
      }
    }
  }
}

struct Parser<'a> {
  chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
  fn skip_whitespace(&mut self) {
    while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
  }

  fn eat(&mut self, expected: char) -> bool {
    self.skip_whitespace();
    self.chars.next_if_eq(&expected).is_some()
  }

  fn sum(&mut self) -> Result<Expr, String> {
    let mut lhs = self.product()?;
    loop {
      let op = if self.eat('+') {
        BinOp::Add
      } else if self.eat('-') {
        BinOp::Sub
      } else {
        return Ok(lhs);
      };
      lhs = Expr::Binary(Box::new(lhs), op, Box::new(self.product()?));
    }
  }

  fn product(&mut self) -> Result<Expr, String> {
    let mut lhs = self.unary()?;
    loop {
      let op = if self.eat('*') {
        BinOp::Mul
      } else if self.eat('/') {
        BinOp::Div
      } else {
        return Ok(lhs);
      };
      lhs = Expr::Binary(Box::new(lhs), op, Box::new(self.unary()?));
    }
  }

  fn unary(&mut self) -> Result<Expr, String> {
    if self.eat('-') {
      return Ok(Expr::Neg(Box::new(self.unary()?)));
    }
    if self.eat('(') {
      let inner = self.sum()?;
      if !self.eat(')') {
        return Err("missing `)`".to_string());
      }
      return Ok(inner);
    }
    self.atom()
  }

  fn atom(&mut self) -> Result<Expr, String> {
    self.skip_whitespace();
    match self.chars.peek().copied() {
      Some(c) if c.is_ascii_digit() || c == '.' => {
        let mut text = String::new();
        while let Some(c) = self
          .chars
          .next_if(|c| c.is_ascii_digit() || matches!(*c, '.' | 'e' | 'E' | '_'))
        {
          if c != '_' {
            text.push(c);
          }
        }
        // Type suffixes such as `1.5f` or `2L`
        self.chars.next_if(|c| matches!(*c, 'f' | 'F' | 'L' | 'l' | 'd' | 'D'));
        text
          .parse::<f64>()
          .map(Expr::Number)
          .map_err(|_| format!("bad number `{text}`"))
      }
      Some(c) if c.is_ascii_alphabetic() || c == '_' => {
        let mut name = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
          name.push(c);
        }
        Ok(Expr::Variable(name))
      }
      Some(c) => Err(format!("unexpected `{c}`")),
      None => Err("unexpected end of expression".to_string()),
    }
  }
}

// =============================================================================
// Literals
// =============================================================================

/// Parsed literal, checked against its parameter type when bound.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Literal {
  Int(Expr),
  Float(Expr),
  Bool(bool),
  Text(String),
  Symmetry(Symmetry),
  SymmetrySource(SymmetrySource),
  NeighborPolicy(NeighborPolicy),
}

impl Literal {
  /// Parse `expression` for a parameter of the resolved type `ty`.
  pub fn parse(expression: &str, ty: ParamType) -> Result<Literal, String> {
    let trimmed = expression.trim();
    match ty {
      ParamType::Int => {
        let expr = Expr::parse(trimmed)?;
        if expr.is_constant() {
          as_integer(expr.eval(&GenerationContext::default())?)?;
        }
        Ok(Literal::Int(expr))
      }
      ParamType::Float => Expr::parse(trimmed).map(Literal::Float),
      ParamType::Bool => match trimmed.to_ascii_lowercase().as_str() {
        "true" => Ok(Literal::Bool(true)),
        "false" => Ok(Literal::Bool(false)),
        _ => Err(format!("`{trimmed}` is not a boolean")),
      },
      ParamType::Text => {
        let unquoted = trimmed
          .strip_prefix('"')
          .and_then(|s| s.strip_suffix('"'))
          .unwrap_or(trimmed);
        Ok(Literal::Text(unquoted.to_string()))
      }
      ParamType::Symmetry => trimmed
        .parse::<Symmetry>()
        .map(Literal::Symmetry)
        .map_err(|err| err.to_string()),
      ParamType::SymmetrySource => match trimmed.to_ascii_uppercase().as_str() {
        "TERRAIN" => Ok(Literal::SymmetrySource(SymmetrySource::Terrain)),
        "TEAM" => Ok(Literal::SymmetrySource(SymmetrySource::Team)),
        "SPAWN" => Ok(Literal::SymmetrySource(SymmetrySource::Spawn)),
        _ => Err(format!("`{trimmed}` is not a symmetry source")),
      },
      ParamType::NeighborPolicy => trimmed.parse().map(Literal::NeighborPolicy),
      ParamType::SelfMask | ParamType::Cell | ParamType::Mask(_) => {
        Err(format!("{ty} parameters can only be bound through an edge"))
      }
    }
  }

  pub fn value(&self, context: &GenerationContext) -> Result<Value, String> {
    Ok(match self {
      Literal::Int(expr) => Value::Int(as_integer(expr.eval(context)?)?),
      Literal::Float(expr) => Value::Float(expr.eval(context)?),
      Literal::Bool(v) => Value::Bool(*v),
      Literal::Text(v) => Value::Text(v.clone()),
      Literal::Symmetry(v) => Value::Symmetry(*v),
      Literal::SymmetrySource(v) => Value::SymmetrySource(*v),
      Literal::NeighborPolicy(v) => Value::NeighborPolicy(*v),
    })
  }
}

fn as_integer(value: f64) -> Result<i64, String> {
  if value.is_finite() && value.fract() == 0.0 {
    Ok(value as i64)
  } else {
    Err(format!("{value} is not an integer"))
  }
}

/// Evaluate a standalone expression for a parameter type.
pub fn evaluate(
  expression: &str,
  ty: ParamType,
  context: &GenerationContext,
) -> Result<Value, GraphError> {
  let wrap = |reason: String| GraphError::Expression {
    expression: expression.to_string(),
    reason,
  };
  Literal::parse(expression, ty)
    .and_then(|literal| literal.value(context))
    .map_err(wrap)
}
