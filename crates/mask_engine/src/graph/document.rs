//! JSON form of a [`PipelineGraph`].
//!
//! Vertices record the key their executable was resolved by, so loading a
//! document re-resolves the exact overload or fails naming the operation and
//! class that no longer exist. Memoized results are never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::vertex::{Binding, Vertex, VertexKind};
use crate::graph::{registry, PipelineGraph, Result};
use crate::raster::MaskKind;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub generator: Option<String>,
  pub vertices: BTreeMap<u32, VertexDocument>,
  #[serde(default)]
  pub edges: Vec<EdgeDocument>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub endpoints: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexDocument {
  pub kind: VertexKind,
  pub mask_class: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub declaring_executable_class: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub executable_name: Option<String>,
  #[serde(default)]
  pub parameter_type_names: Vec<String>,
  /// One entry per parameter; `None` where the parameter is fed by an edge.
  #[serde(default)]
  pub parameter_literal_expressions: Vec<Option<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDocument {
  pub result_name: String,
  pub parameter_name: String,
  pub source_vertex_id: u32,
  pub target_vertex_id: u32,
}

impl PipelineGraph {
  pub fn to_document(&self) -> GraphDocument {
    let vertices = self
      .vertices
      .values()
      .map(|vertex| (vertex.id, vertex_document(vertex)))
      .collect();
    let edges = self
      .edges
      .iter()
      .map(|edge| EdgeDocument {
        result_name: edge.result.clone(),
        parameter_name: edge.parameter.clone(),
        source_vertex_id: edge.source,
        target_vertex_id: edge.target,
      })
      .collect();
    GraphDocument {
      generator: self.generator.clone(),
      vertices,
      edges,
      endpoints: self.endpoints.clone(),
    }
  }

  /// Rebuild a graph, re-resolving every executable and re-checking every
  /// binding.
  pub fn from_document(document: &GraphDocument) -> Result<Self> {
    let mut graph = PipelineGraph {
      generator: document.generator.clone(),
      ..Default::default()
    };

    let mut endpoint_names: BTreeMap<u32, &str> = BTreeMap::new();
    for (name, &id) in &document.endpoints {
      let vertex = document.vertices.get(&id).ok_or(GraphError::UnknownVertex(id))?;
      if !vertex.kind.is_endpoint() {
        return Err(GraphError::UnknownEndpoint(name.clone()));
      }
      endpoint_names.insert(id, name);
    }

    for (&id, record) in &document.vertices {
      let class = MaskKind::from_class_name(&record.mask_class)
        .ok_or_else(|| GraphError::UnknownMaskClass(record.mask_class.clone()))?;
      let vertex = if record.kind.is_endpoint() {
        let name = endpoint_names
          .get(&id)
          .ok_or_else(|| GraphError::UnknownEndpoint(format!("<vertex {id}>")))?;
        graph.endpoints.insert(name.to_string(), id);
        Vertex::new(id, record.kind, class, None, Some(name.to_string()))
      } else {
        Vertex::new(id, record.kind, class, Some(resolve(record, class)?), None)
      };

      let parameters = vertex.parameter_names();
      if record.parameter_literal_expressions.len() > parameters.len() {
        return Err(GraphError::ArityMismatch {
          vertex: id,
          expected: parameters.len(),
          actual: record.parameter_literal_expressions.len(),
        });
      }
      graph.insert(vertex);
      for (parameter, expression) in parameters.iter().zip(&record.parameter_literal_expressions) {
        if let Some(expression) = expression {
          graph.bind_literal(id, parameter, expression)?;
        }
      }
    }

    for edge in &document.edges {
      graph.connect(
        edge.source_vertex_id,
        &edge.result_name,
        edge.target_vertex_id,
        &edge.parameter_name,
      )?;
    }
    Ok(graph)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(&self.to_document())?)
  }

  pub fn from_json(json: &str) -> Result<Self> {
    let document: GraphDocument = serde_json::from_str(json)?;
    Self::from_document(&document)
  }
}

fn vertex_document(vertex: &Vertex) -> VertexDocument {
  let executable = vertex.executable.filter(|_| !vertex.kind.is_endpoint());
  let parameter_type_names = vertex
    .formal_parameters()
    .iter()
    .map(|p| p.ty.type_name().to_string())
    .collect();
  let parameter_literal_expressions = vertex
    .bindings
    .iter()
    .map(|binding| match binding {
      Binding::Literal { expression, .. } => Some(expression.clone()),
      Binding::Edge { .. } | Binding::Unbound => None,
    })
    .collect();
  VertexDocument {
    kind: vertex.kind,
    mask_class: vertex.mask_class.class_name().to_string(),
    declaring_executable_class: executable.map(|e| e.declaring_class.to_string()),
    executable_name: executable.map(|e| e.name.to_string()),
    parameter_type_names,
    parameter_literal_expressions,
  }
}

fn resolve(record: &VertexDocument, class: MaskKind) -> Result<&'static registry::Executable> {
  let declaring = record.declaring_executable_class.as_deref().unwrap_or_default();
  let name = record.executable_name.as_deref().unwrap_or_default();
  for type_name in &record.parameter_type_names {
    if crate::graph::ParamType::from_type_name(type_name).is_none() {
      return Err(GraphError::UnknownParameterType(type_name.clone()));
    }
  }
  let types: Vec<&str> = record.parameter_type_names.iter().map(String::as_str).collect();
  let executable = registry::resolve(declaring, name, &types)?;
  if executable.kind != record.kind || !executable.supports(class) {
    return Err(GraphError::UnresolvedOperation {
      operation: executable.to_string(),
      class: class.class_name().to_string(),
    });
  }
  Ok(executable)
}
