//! Parameter types and runtime values flowing through a graph.

use std::fmt;

use crate::error::GraphError;
use crate::mask::{BooleanMask, FloatMask, IntegerMask, Mask, NeighborPolicy};
use crate::raster::{Cell, MaskKind};
use crate::symmetry::{Symmetry, SymmetrySource};

// =============================================================================
// ParamType
// =============================================================================

/// Formal parameter type of a registered executable.
///
/// `SelfMask` and `Cell` are generic: they resolve against the mask class
/// a vertex is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
  Int,
  Float,
  Bool,
  Text,
  Symmetry,
  SymmetrySource,
  NeighborPolicy,
  /// Mask of the vertex's own class.
  SelfMask,
  /// Cell value of the vertex's own class.
  Cell,
  Mask(MaskKind),
}

impl ParamType {
  pub fn type_name(self) -> &'static str {
    match self {
      ParamType::Int => "int",
      ParamType::Float => "float",
      ParamType::Bool => "boolean",
      ParamType::Text => "String",
      ParamType::Symmetry => "Symmetry",
      ParamType::SymmetrySource => "SymmetrySource",
      ParamType::NeighborPolicy => "NeighborPolicy",
      ParamType::SelfMask => "SELF",
      ParamType::Cell => "T",
      ParamType::Mask(kind) => kind.class_name(),
    }
  }

  pub fn from_type_name(name: &str) -> Option<Self> {
    let ty = match name {
      "int" => ParamType::Int,
      "float" => ParamType::Float,
      "boolean" => ParamType::Bool,
      "String" => ParamType::Text,
      "Symmetry" => ParamType::Symmetry,
      "SymmetrySource" => ParamType::SymmetrySource,
      "NeighborPolicy" => ParamType::NeighborPolicy,
      "SELF" => ParamType::SelfMask,
      "T" => ParamType::Cell,
      other => ParamType::Mask(MaskKind::from_class_name(other)?),
    };
    Some(ty)
  }

  /// Concrete type for a vertex bound to `class`.
  pub fn resolve(self, class: MaskKind) -> ParamType {
    match self {
      ParamType::SelfMask => ParamType::Mask(class),
      ParamType::Cell => match class {
        MaskKind::Boolean => ParamType::Bool,
        MaskKind::Float => ParamType::Float,
        MaskKind::Integer => ParamType::Int,
      },
      other => other,
    }
  }

  pub fn is_mask(self) -> bool {
    matches!(self, ParamType::Mask(_) | ParamType::SelfMask)
  }

  /// Whether a value of type `actual` may bind here. Integers widen to floats.
  pub fn accepts(self, actual: ParamType) -> bool {
    self == actual || (self == ParamType::Float && actual == ParamType::Int)
  }
}

impl fmt::Display for ParamType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name())
  }
}

// =============================================================================
// Values
// =============================================================================

/// Mask handle of any class.
#[derive(Clone, Debug)]
pub enum MaskValue {
  Boolean(BooleanMask),
  Float(FloatMask),
  Integer(IntegerMask),
}

/// Dispatch over the typed mask inside a [`MaskValue`], aliasing its cell
/// type as `$t` in `$body`.
macro_rules! each_mask {
  ($value:expr, |$m:ident: $t:ident| $body:expr) => {
    match $value {
      $crate::graph::value::MaskValue::Boolean($m) => {
        #[allow(dead_code)]
        type $t = bool;
        $body
      }
      $crate::graph::value::MaskValue::Float($m) => {
        #[allow(dead_code)]
        type $t = f32;
        $body
      }
      $crate::graph::value::MaskValue::Integer($m) => {
        #[allow(dead_code)]
        type $t = i32;
        $body
      }
    }
  };
}
pub(crate) use each_mask;

impl MaskValue {
  pub fn kind(&self) -> MaskKind {
    match self {
      MaskValue::Boolean(_) => MaskKind::Boolean,
      MaskValue::Float(_) => MaskKind::Float,
      MaskValue::Integer(_) => MaskKind::Integer,
    }
  }
}

/// Value bound to a parameter or produced as a result.
#[derive(Clone, Debug)]
pub enum Value {
  Int(i64),
  Float(f64),
  Bool(bool),
  Text(String),
  Symmetry(Symmetry),
  SymmetrySource(SymmetrySource),
  NeighborPolicy(NeighborPolicy),
  Mask(MaskValue),
}

impl Value {
  pub fn param_type(&self) -> ParamType {
    match self {
      Value::Int(_) => ParamType::Int,
      Value::Float(_) => ParamType::Float,
      Value::Bool(_) => ParamType::Bool,
      Value::Text(_) => ParamType::Text,
      Value::Symmetry(_) => ParamType::Symmetry,
      Value::SymmetrySource(_) => ParamType::SymmetrySource,
      Value::NeighborPolicy(_) => ParamType::NeighborPolicy,
      Value::Mask(mask) => ParamType::Mask(mask.kind()),
    }
  }

  pub fn as_mask(&self) -> Option<&MaskValue> {
    match self {
      Value::Mask(mask) => Some(mask),
      _ => None,
    }
  }
}

impl<T: GraphCell> From<Mask<T>> for Value {
  fn from(mask: Mask<T>) -> Self {
    Value::Mask(T::wrap_mask(mask))
  }
}

// =============================================================================
// Typed access
// =============================================================================

/// Cell types a graph can carry, linking [`MaskValue`] variants to `T`.
pub trait GraphCell: Cell {
  fn wrap_mask(mask: Mask<Self>) -> MaskValue;
  fn mask_ref(value: &MaskValue) -> Option<&Mask<Self>>;
  fn from_value(value: &Value) -> Option<Self>;
}

impl GraphCell for bool {
  fn wrap_mask(mask: Mask<Self>) -> MaskValue {
    MaskValue::Boolean(mask)
  }

  fn mask_ref(value: &MaskValue) -> Option<&Mask<Self>> {
    match value {
      MaskValue::Boolean(mask) => Some(mask),
      _ => None,
    }
  }

  fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::Bool(v) => Some(*v),
      _ => None,
    }
  }
}

impl GraphCell for f32 {
  fn wrap_mask(mask: Mask<Self>) -> MaskValue {
    MaskValue::Float(mask)
  }

  fn mask_ref(value: &MaskValue) -> Option<&Mask<Self>> {
    match value {
      MaskValue::Float(mask) => Some(mask),
      _ => None,
    }
  }

  fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::Float(v) => Some(*v as f32),
      Value::Int(v) => Some(*v as f32),
      _ => None,
    }
  }
}

impl GraphCell for i32 {
  fn wrap_mask(mask: Mask<Self>) -> MaskValue {
    MaskValue::Integer(mask)
  }

  fn mask_ref(value: &MaskValue) -> Option<&Mask<Self>> {
    match value {
      MaskValue::Integer(mask) => Some(mask),
      _ => None,
    }
  }

  fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::Int(v) => i32::try_from(*v).ok(),
      _ => None,
    }
  }
}

/// Arguments of one invocation, checked positionally against the
/// executable's resolved parameter types before the call.
pub(crate) struct Args<'a> {
  pub vertex: u32,
  pub names: &'a [&'static str],
  pub values: &'a [Value],
}

impl Args<'_> {
  pub(crate) fn mismatch(&self, index: usize, expected: &str) -> GraphError {
    GraphError::TypeMismatch {
      vertex: self.vertex,
      parameter: self.names.get(index).copied().unwrap_or("?").to_string(),
      expected: expected.to_string(),
      actual: self
        .values
        .get(index)
        .map_or("nothing".to_string(), |v| v.param_type().to_string()),
    }
  }

  pub fn float(&self, index: usize) -> Result<f64, GraphError> {
    match self.values.get(index) {
      Some(Value::Float(v)) => Ok(*v),
      Some(Value::Int(v)) => Ok(*v as f64),
      _ => Err(self.mismatch(index, "float")),
    }
  }

  pub fn int(&self, index: usize) -> Result<i64, GraphError> {
    match self.values.get(index) {
      Some(Value::Int(v)) => Ok(*v),
      _ => Err(self.mismatch(index, "int")),
    }
  }

  /// Non-negative integer, as sizes and radii take it.
  pub fn count(&self, index: usize) -> Result<usize, GraphError> {
    usize::try_from(self.int(index)?).map_err(|_| self.mismatch(index, "non-negative int"))
  }

  pub fn seed(&self, index: usize) -> Result<u64, GraphError> {
    Ok(self.int(index)? as u64)
  }

  pub fn text(&self, index: usize) -> Result<&str, GraphError> {
    match self.values.get(index) {
      Some(Value::Text(v)) => Ok(v),
      _ => Err(self.mismatch(index, "String")),
    }
  }

  pub fn source(&self, index: usize) -> Result<SymmetrySource, GraphError> {
    match self.values.get(index) {
      Some(Value::SymmetrySource(v)) => Ok(*v),
      _ => Err(self.mismatch(index, "SymmetrySource")),
    }
  }

  pub fn policy(&self, index: usize) -> Result<NeighborPolicy, GraphError> {
    match self.values.get(index) {
      Some(Value::NeighborPolicy(v)) => Ok(*v),
      _ => Err(self.mismatch(index, "NeighborPolicy")),
    }
  }

  pub fn cell<T: GraphCell>(&self, index: usize) -> Result<T, GraphError> {
    self
      .values
      .get(index)
      .and_then(T::from_value)
      .ok_or_else(|| self.mismatch(index, ParamType::Cell.resolve(T::KIND).type_name()))
  }

  pub fn mask_value(&self, index: usize) -> Result<&MaskValue, GraphError> {
    self
      .values
      .get(index)
      .and_then(Value::as_mask)
      .ok_or_else(|| self.mismatch(index, "mask"))
  }

  pub fn mask<T: GraphCell>(&self, index: usize) -> Result<&Mask<T>, GraphError> {
    self
      .values
      .get(index)
      .and_then(Value::as_mask)
      .and_then(T::mask_ref)
      .ok_or_else(|| self.mismatch(index, T::KIND.class_name()))
  }
}
