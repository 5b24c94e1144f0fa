//! Serializable pipeline graphs.
//!
//! A [`PipelineGraph`] is an explicit DAG of vertices, each bound to an
//! executable from the closed [`registry`]. Parameters take literal
//! expressions or edges from other vertices' `SELF` result. Evaluation walks
//! the graph in topological order, drives the same mask operations a
//! hand-written generator would call, and memoizes each vertex so a second
//! evaluation appends nothing.

mod document;
mod expr;
pub mod registry;
mod value;
mod vertex;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info_span};

use crate::error::GraphError;
use crate::pipeline::Pipeline;
use crate::raster::MaskKind;

pub use document::{EdgeDocument, GraphDocument, VertexDocument};
pub use expr::{evaluate, GenerationContext};
use expr::Literal;
pub use registry::{Executable, Output, Parameter};
use registry::Call;
pub use value::{GraphCell, MaskValue, ParamType, Value};
use value::{each_mask, Args};
use vertex::Binding;
pub use vertex::{Vertex, VertexKind, SELF_RESULT};

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Edge from one vertex's result to another vertex's parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
  pub source: u32,
  pub result: String,
  pub target: u32,
  pub parameter: String,
}

#[derive(Clone, Debug, Default)]
pub struct PipelineGraph {
  vertices: BTreeMap<u32, Vertex>,
  edges: Vec<Edge>,
  next_id: u32,
  generator: Option<String>,
  endpoints: BTreeMap<String, u32>,
  /// Pipeline the memoized results belong to.
  run: Option<Pipeline>,
}

impl PipelineGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Graph exported as a named generator.
  pub fn with_generator(generator: impl Into<String>) -> Self {
    Self {
      generator: Some(generator.into()),
      ..Default::default()
    }
  }

  pub fn generator(&self) -> Option<&str> {
    self.generator.as_deref()
  }

  // ---------------------------------------------------------------------------
  // Composition
  // ---------------------------------------------------------------------------

  fn insert(&mut self, vertex: Vertex) -> u32 {
    let id = vertex.id;
    self.next_id = self.next_id.max(id + 1);
    self.vertices.insert(id, vertex);
    id
  }

  fn next_vertex_id(&mut self) -> u32 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  fn bind_executable(
    &mut self,
    kind: VertexKind,
    class: MaskKind,
    name: &str,
    parameter_types: &[&str],
  ) -> Result<u32> {
    let executable = registry::find(kind, class, name, parameter_types)?;
    let id = self.next_vertex_id();
    Ok(self.insert(Vertex::new(id, kind, class, Some(executable), None)))
  }

  /// Vertex building a fresh mask of `class`.
  pub fn add_constructor(&mut self, class: MaskKind, parameter_types: &[&str]) -> Result<u32> {
    self.bind_executable(VertexKind::Constructor, class, "new", parameter_types)
  }

  /// Vertex calling a method on a receiver of `class`.
  pub fn add_method(&mut self, class: MaskKind, name: &str, parameter_types: &[&str]) -> Result<u32> {
    self.bind_executable(VertexKind::Method, class, name, parameter_types)
  }

  pub fn add_map_method(
    &mut self,
    class: MaskKind,
    name: &str,
    parameter_types: &[&str],
  ) -> Result<u32> {
    self.bind_executable(VertexKind::MapMethod, class, name, parameter_types)
  }

  fn add_endpoint(&mut self, kind: VertexKind, name: String, class: MaskKind) -> Result<u32> {
    if self.endpoints.contains_key(&name) {
      return Err(GraphError::DuplicateEndpoint(name));
    }
    let id = self.next_vertex_id();
    self.endpoints.insert(name.clone(), id);
    Ok(self.insert(Vertex::new(id, kind, class, None, Some(name))))
  }

  /// Named entry point supplied at evaluation time.
  pub fn add_input(&mut self, name: impl Into<String>, class: MaskKind) -> Result<u32> {
    self.add_endpoint(VertexKind::Input, name.into(), class)
  }

  /// Named exit point forwarding its `value` parameter.
  pub fn add_output(&mut self, name: impl Into<String>, class: MaskKind) -> Result<u32> {
    self.add_endpoint(VertexKind::Output, name.into(), class)
  }

  fn vertex_mut(&mut self, id: u32) -> Result<&mut Vertex> {
    self.vertices.get_mut(&id).ok_or(GraphError::UnknownVertex(id))
  }

  fn unbound_index(&self, id: u32, parameter: &str) -> Result<usize> {
    let vertex = self.vertex(id)?;
    let index = vertex
      .parameter_index(parameter)
      .ok_or_else(|| GraphError::UnknownParameter {
        vertex: id,
        parameter: parameter.to_string(),
      })?;
    if !matches!(vertex.bindings[index], Binding::Unbound) {
      return Err(GraphError::AlreadyBound {
        vertex: id,
        parameter: parameter.to_string(),
      });
    }
    Ok(index)
  }

  /// Bind a literal expression, checked against the parameter's resolved type.
  pub fn bind_literal(&mut self, vertex: u32, parameter: &str, expression: &str) -> Result<()> {
    let index = self.unbound_index(vertex, parameter)?;
    let ty = self.vertex(vertex)?.parameter_types()[index];
    if ty.is_mask() {
      return Err(GraphError::TypeMismatch {
        vertex,
        parameter: parameter.to_string(),
        expected: ty.to_string(),
        actual: "literal".to_string(),
      });
    }
    let literal = Literal::parse(expression, ty).map_err(|reason| GraphError::Expression {
      expression: expression.to_string(),
      reason,
    })?;
    self.invalidate(vertex);
    self.vertex_mut(vertex)?.bindings[index] = Binding::Literal {
      expression: expression.to_string(),
      literal,
    };
    Ok(())
  }

  /// Bind `target.parameter` to `source.result`.
  pub fn connect(&mut self, source: u32, result: &str, target: u32, parameter: &str) -> Result<()> {
    let produced = self.vertex(source)?;
    if result != SELF_RESULT {
      return Err(GraphError::UnknownResult {
        vertex: source,
        result: result.to_string(),
      });
    }
    let produced = produced.result_type();
    let index = self.unbound_index(target, parameter)?;
    let expected = self.vertex(target)?.parameter_types()[index];
    if !expected.accepts(produced) {
      return Err(GraphError::TypeMismatch {
        vertex: target,
        parameter: parameter.to_string(),
        expected: expected.to_string(),
        actual: produced.to_string(),
      });
    }
    if source == target || self.downstream(target).contains(&source) {
      return Err(GraphError::Cycle(target));
    }

    self.invalidate(target);
    if self.edges.iter().any(|e| e.source == source) {
      // A second consumer switches in-place receivers to copies
      self.invalidate(source);
    }
    self.edges.push(Edge {
      source,
      result: result.to_string(),
      target,
      parameter: parameter.to_string(),
    });
    self.vertex_mut(target)?.bindings[index] = Binding::Edge { source };
    Ok(())
  }

  /// Clear a parameter binding, removing its edge if it had one.
  pub fn unbind(&mut self, vertex: u32, parameter: &str) -> Result<()> {
    let index = self
      .vertex(vertex)?
      .parameter_index(parameter)
      .ok_or_else(|| GraphError::UnknownParameter {
        vertex,
        parameter: parameter.to_string(),
      })?;
    self.invalidate(vertex);
    self
      .edges
      .retain(|e| !(e.target == vertex && e.parameter == parameter));
    self.vertex_mut(vertex)?.bindings[index] = Binding::Unbound;
    Ok(())
  }

  /// Remove a vertex along with every edge touching it.
  pub fn remove_vertex(&mut self, id: u32) -> Result<Vertex> {
    self.vertex(id)?;
    self.invalidate(id);
    let consumers: Vec<(u32, String)> = self
      .edges
      .iter()
      .filter(|e| e.source == id)
      .map(|e| (e.target, e.parameter.clone()))
      .collect();
    for (target, parameter) in consumers {
      self.unbind(target, &parameter)?;
    }
    self.edges.retain(|e| e.target != id);
    self.endpoints.retain(|_, vertex| *vertex != id);
    self.vertices.remove(&id).ok_or(GraphError::UnknownVertex(id))
  }

  // ---------------------------------------------------------------------------
  // Inspection
  // ---------------------------------------------------------------------------

  pub fn vertex(&self, id: u32) -> Result<&Vertex> {
    self.vertices.get(&id).ok_or(GraphError::UnknownVertex(id))
  }

  pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
    self.vertices.values()
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn endpoints(&self) -> &BTreeMap<String, u32> {
    &self.endpoints
  }

  pub fn endpoint(&self, name: &str) -> Result<u32> {
    self
      .endpoints
      .get(name)
      .copied()
      .ok_or_else(|| GraphError::UnknownEndpoint(name.to_string()))
  }

  /// Vertices reachable from `id` along edges, `id` excluded.
  fn downstream(&self, id: u32) -> BTreeSet<u32> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([id]);
    while let Some(next) = queue.pop_front() {
      for edge in self.edges.iter().filter(|e| e.source == next) {
        if seen.insert(edge.target) {
          queue.push_back(edge.target);
        }
      }
    }
    seen
  }

  /// Receiver a method vertex mutates in place, if it does not copy it.
  fn in_place_receiver(&self, id: u32) -> Option<u32> {
    let vertex = self.vertices.get(&id)?;
    let executable = vertex.executable?;
    if vertex.kind != VertexKind::Method || executable.output != Output::Receiver || self.fans_out(id) {
      return None;
    }
    self
      .edges
      .iter()
      .find(|e| e.target == id && e.parameter == "this")
      .map(|e| e.source)
  }

  /// Drop memoized results of `id` and everything that consumed it.
  ///
  /// Producers whose mask was mutated in place by a stale vertex hold the
  /// same handle and go stale with it.
  fn invalidate(&mut self, id: u32) {
    let mut stale = self.downstream(id);
    stale.insert(id);
    let mut pending: Vec<u32> = stale.iter().copied().collect();
    while let Some(next) = pending.pop() {
      if let Some(source) = self.in_place_receiver(next) {
        if stale.insert(source) {
          pending.push(source);
        }
      }
    }
    for id in stale {
      if let Some(vertex) = self.vertices.get_mut(&id) {
        vertex.result = None;
      }
    }
  }

  /// Vertex ids with every producer before its consumers.
  pub fn topological_order(&self) -> Result<Vec<u32>> {
    let mut indegree: BTreeMap<u32, usize> = self.vertices.keys().map(|&id| (id, 0)).collect();
    for edge in &self.edges {
      *indegree.entry(edge.target).or_default() += 1;
    }
    let mut ready: VecDeque<u32> = indegree
      .iter()
      .filter(|(_, &degree)| degree == 0)
      .map(|(&id, _)| id)
      .collect();

    let mut order = Vec::with_capacity(self.vertices.len());
    while let Some(id) = ready.pop_front() {
      order.push(id);
      for edge in self.edges.iter().filter(|e| e.source == id) {
        if let Some(degree) = indegree.get_mut(&edge.target) {
          *degree -= 1;
          if *degree == 0 {
            ready.push_back(edge.target);
          }
        }
      }
    }

    if order.len() < indegree.len() {
      let stuck = indegree
        .iter()
        .find(|(id, &degree)| degree > 0 && !order.contains(*id))
        .map_or(0, |(&id, _)| id);
      return Err(GraphError::Cycle(stuck));
    }
    Ok(order)
  }

  /// Memoized `result` of `vertex`.
  ///
  /// Distinguishes a vertex with unbound parameters from one that is fully
  /// defined but not yet evaluated.
  pub fn result(&self, vertex: u32, result: &str) -> Result<&Value> {
    let v = self.vertex(vertex)?;
    if result != SELF_RESULT {
      return Err(GraphError::UnknownResult {
        vertex,
        result: result.to_string(),
      });
    }
    if let Some(value) = &v.result {
      return Ok(value);
    }
    if !v.is_fully_defined() {
      return Err(GraphError::NotFullyDefined {
        vertex,
        missing: v.unbound_parameters(),
      });
    }
    Err(GraphError::NotComputed { vertex })
  }

  /// Value forwarded by the output endpoint `name`.
  pub fn output(&self, name: &str) -> Result<&Value> {
    let id = self.endpoint(name)?;
    if self.vertex(id)?.kind != VertexKind::Output {
      return Err(GraphError::UnknownEndpoint(name.to_string()));
    }
    self.result(id, SELF_RESULT)
  }

  // ---------------------------------------------------------------------------
  // Evaluation
  // ---------------------------------------------------------------------------

  /// Forget every memoized result.
  pub fn reset(&mut self) {
    for vertex in self.vertices.values_mut() {
      vertex.result = None;
    }
    self.run = None;
  }

  /// Evaluate every vertex not evaluated yet, appending its stages to
  /// `pipeline`.
  ///
  /// Results memoized against another pipeline are discarded first.
  pub fn evaluate(
    &mut self,
    pipeline: &Pipeline,
    context: &GenerationContext,
    inputs: &BTreeMap<String, Value>,
  ) -> Result<()> {
    let _span = info_span!("graph_evaluate", vertices = self.vertices.len()).entered();
    if !self.run.as_ref().is_some_and(|run| run.same_run(pipeline)) {
      self.reset();
      self.run = Some(pipeline.clone());
    }

    for id in self.topological_order()? {
      if self.vertex(id)?.is_computed() {
        continue;
      }
      let value = self.compute(id, pipeline, context, inputs)?;
      self.vertex_mut(id)?.result = Some(value);
    }
    Ok(())
  }

  fn compute(
    &self,
    id: u32,
    pipeline: &Pipeline,
    context: &GenerationContext,
    inputs: &BTreeMap<String, Value>,
  ) -> Result<Value> {
    let vertex = self.vertex(id)?;
    if !vertex.is_fully_defined() {
      return Err(GraphError::NotFullyDefined {
        vertex: id,
        missing: vertex.unbound_parameters(),
      });
    }

    let mut values = Vec::with_capacity(vertex.bindings.len());
    for binding in &vertex.bindings {
      let value = match binding {
        Binding::Literal { expression, literal } => {
          literal
            .value(context)
            .map_err(|reason| GraphError::Expression {
              expression: expression.clone(),
              reason,
            })?
        }
        Binding::Edge { source } => self.result(*source, SELF_RESULT)?.clone(),
        Binding::Unbound => continue,
      };
      values.push(value);
    }

    match vertex.kind {
      VertexKind::Input => {
        let name = vertex.endpoint.clone().unwrap_or_default();
        let value = inputs.get(&name).ok_or(GraphError::MissingInput(name.clone()))?;
        let expected = vertex.result_type();
        if value.param_type() != expected {
          return Err(GraphError::TypeMismatch {
            vertex: id,
            parameter: name,
            expected: expected.to_string(),
            actual: value.param_type().to_string(),
          });
        }
        Ok(value.clone())
      }
      VertexKind::Output => values.pop().ok_or(GraphError::NotFullyDefined {
        vertex: id,
        missing: vec!["value".to_string()],
      }),
      VertexKind::Constructor | VertexKind::Method | VertexKind::MapMethod => {
        let Some(executable) = vertex.executable else {
          return Err(GraphError::UnresolvedOperation {
            operation: "<none>".to_string(),
            class: vertex.mask_class.class_name().to_string(),
          });
        };
        if vertex.kind == VertexKind::Method
          && executable.output == Output::Receiver
          && self.fans_out(id)
        {
          // Sibling consumers must each see the receiver unmodified
          if let Some(Value::Mask(receiver)) = values.first() {
            let copied: Value = each_mask!(receiver, |m: T| m.copy()?.into());
            values[0] = copied;
          }
        }

        debug!(vertex = id, operation = %executable, class = vertex.mask_class.class_name(), "graph invoke");
        let names = vertex.parameter_names();
        executable.invoke(&Call {
          pipeline,
          class: vertex.mask_class,
          args: Args {
            vertex: id,
            names: &names,
            values: &values,
          },
        })
      }
    }
  }

  /// Whether the receiver feeding method vertex `id` has other consumers.
  fn fans_out(&self, id: u32) -> bool {
    let Some(edge) = self
      .edges
      .iter()
      .find(|e| e.target == id && e.parameter == "this")
    else {
      return false;
    };
    self.edges.iter().filter(|e| e.source == edge.source).count() > 1
  }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
