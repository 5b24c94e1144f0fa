//! Graph vertices and their parameter bindings.

use serde::{Deserialize, Serialize};

use crate::graph::expr::Literal;
use crate::graph::registry::{Executable, Parameter};
use crate::graph::value::{ParamType, Value};
use crate::raster::MaskKind;

/// Name of the single result every vertex produces.
pub const SELF_RESULT: &str = "SELF";

const OUTPUT_PARAMETERS: &[Parameter] = &[Parameter {
  name: "value",
  ty: ParamType::SelfMask,
}];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
  Constructor,
  Method,
  MapMethod,
  Input,
  Output,
}

impl VertexKind {
  pub fn is_endpoint(self) -> bool {
    matches!(self, VertexKind::Input | VertexKind::Output)
  }
}

#[derive(Clone, Debug)]
pub(crate) enum Binding {
  Unbound,
  Literal { expression: String, literal: Literal },
  Edge { source: u32 },
}

/// One invocation, or one named endpoint, in a [`PipelineGraph`](super::PipelineGraph).
#[derive(Clone, Debug)]
pub struct Vertex {
  pub(crate) id: u32,
  pub(crate) kind: VertexKind,
  pub(crate) mask_class: MaskKind,
  pub(crate) executable: Option<&'static Executable>,
  pub(crate) endpoint: Option<String>,
  pub(crate) bindings: Vec<Binding>,
  pub(crate) result: Option<Value>,
}

impl Vertex {
  pub(crate) fn new(
    id: u32,
    kind: VertexKind,
    mask_class: MaskKind,
    executable: Option<&'static Executable>,
    endpoint: Option<String>,
  ) -> Self {
    let mut vertex = Self {
      id,
      kind,
      mask_class,
      executable,
      endpoint,
      bindings: Vec::new(),
      result: None,
    };
    vertex.bindings = vec![Binding::Unbound; vertex.formal_parameters().len()];
    vertex
  }

  pub fn id(&self) -> u32 {
    self.id
  }

  pub fn kind(&self) -> VertexKind {
    self.kind
  }

  pub fn mask_class(&self) -> MaskKind {
    self.mask_class
  }

  pub fn executable(&self) -> Option<&'static Executable> {
    self.executable
  }

  pub fn endpoint_name(&self) -> Option<&str> {
    self.endpoint.as_deref()
  }

  pub(crate) fn formal_parameters(&self) -> &'static [Parameter] {
    match (self.kind, self.executable) {
      (VertexKind::Output, _) => OUTPUT_PARAMETERS,
      (VertexKind::Input, _) | (_, None) => &[],
      (_, Some(executable)) => executable.parameters,
    }
  }

  pub(crate) fn parameter_index(&self, name: &str) -> Option<usize> {
    self.formal_parameters().iter().position(|p| p.name == name)
  }

  pub fn parameter_names(&self) -> Vec<&'static str> {
    self.formal_parameters().iter().map(|p| p.name).collect()
  }

  /// Parameter types resolved against this vertex's mask class.
  pub fn parameter_types(&self) -> Vec<ParamType> {
    self
      .formal_parameters()
      .iter()
      .map(|p| p.ty.resolve(self.mask_class))
      .collect()
  }

  pub fn result_type(&self) -> ParamType {
    match self.executable {
      Some(executable) if !self.kind.is_endpoint() => executable.result_type(self.mask_class),
      _ => ParamType::Mask(self.mask_class),
    }
  }

  /// Literal expression bound to `parameter`, if any.
  pub fn literal(&self, parameter: &str) -> Option<&str> {
    match self.bindings.get(self.parameter_index(parameter)?)? {
      Binding::Literal { expression, .. } => Some(expression),
      _ => None,
    }
  }

  pub fn unbound_parameters(&self) -> Vec<String> {
    self
      .formal_parameters()
      .iter()
      .zip(&self.bindings)
      .filter(|(_, binding)| matches!(binding, Binding::Unbound))
      .map(|(p, _)| p.name.to_string())
      .collect()
  }

  pub fn is_fully_defined(&self) -> bool {
    self.bindings.iter().all(|b| !matches!(b, Binding::Unbound))
  }

  pub fn is_computed(&self) -> bool {
    self.result.is_some()
  }
}
