use super::*;
use crate::mask::BooleanMask;
use crate::pipeline::MaskSpec;

const SEED: u64 = 4242;

fn bool_constructor(graph: &mut PipelineGraph, size: &str, seed: &str, name: &str) -> u32 {
  let id = graph
    .add_constructor(MaskKind::Boolean, &["int", "int", "String"])
    .unwrap();
  graph.bind_literal(id, "size", size).unwrap();
  graph.bind_literal(id, "seed", seed).unwrap();
  graph.bind_literal(id, "name", name).unwrap();
  id
}

/// `new(16, SEED) -> randomize(0.5) -> inflate(1) -> smooth(4) -> output "land"`.
fn island_graph() -> (PipelineGraph, [u32; 4]) {
  let mut graph = PipelineGraph::with_generator("island");
  let land = bool_constructor(&mut graph, "16", &SEED.to_string(), "\"land\"");

  let randomize = graph
    .add_method(MaskKind::Boolean, "randomize", &["SELF", "float"])
    .unwrap();
  graph.connect(land, SELF_RESULT, randomize, "this").unwrap();
  graph.bind_literal(randomize, "density", "0.5").unwrap();

  let inflate = graph
    .add_method(MaskKind::Boolean, "inflate", &["SELF", "float"])
    .unwrap();
  graph.connect(randomize, SELF_RESULT, inflate, "this").unwrap();
  graph.bind_literal(inflate, "radius", "1").unwrap();

  let smooth = graph
    .add_method(MaskKind::Boolean, "smooth", &["SELF", "int"])
    .unwrap();
  graph.connect(inflate, SELF_RESULT, smooth, "this").unwrap();
  graph.bind_literal(smooth, "radius", "4").unwrap();

  let output = graph.add_output("land", MaskKind::Boolean).unwrap();
  graph.connect(smooth, SELF_RESULT, output, "value").unwrap();
  (graph, [land, randomize, inflate, smooth])
}

fn boolean_output(graph: &PipelineGraph, name: &str) -> BooleanMask {
  match graph.output(name).unwrap() {
    Value::Mask(MaskValue::Boolean(mask)) => mask.clone(),
    other => panic!("expected a boolean mask, got {other:?}"),
  }
}

fn evaluate_fresh(graph: &mut PipelineGraph, root_seed: u64) -> Vec<bool> {
  let pipeline = Pipeline::with_seed(root_seed).unwrap();
  graph
    .evaluate(&pipeline, &GenerationContext::new(root_seed, 16), &BTreeMap::new())
    .unwrap();
  boolean_output(graph, "land")
    .final_raster()
    .unwrap()
    .as_slice()
    .to_vec()
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_round_trip_matches_direct_chain() {
  let direct = {
    let pipeline = Pipeline::with_seed(1).unwrap();
    let land = pipeline
      .create::<bool>(MaskSpec::new(16, "land").seed(SEED))
      .unwrap();
    land.randomize(0.5).unwrap().inflate(1.0).unwrap().smooth(4).unwrap();
    land.final_raster().unwrap().as_slice().to_vec()
  };

  let (mut graph, _) = island_graph();
  assert_eq!(evaluate_fresh(&mut graph, 2), direct);

  let json = graph.to_json().unwrap();
  let mut reloaded = PipelineGraph::from_json(&json).unwrap();
  assert_eq!(reloaded.to_document(), graph.to_document());
  assert_eq!(reloaded.generator(), Some("island"));
  assert_eq!(evaluate_fresh(&mut reloaded, 3), direct);
}

#[test]
fn test_document_records_resolution_key() {
  let (graph, [land, _, inflate, _]) = island_graph();
  let document = graph.to_document();

  let constructor = &document.vertices[&land];
  assert_eq!(constructor.kind, VertexKind::Constructor);
  assert_eq!(constructor.mask_class, "BooleanMask");
  assert_eq!(constructor.declaring_executable_class.as_deref(), Some("Mask"));
  assert_eq!(constructor.parameter_type_names, vec!["int", "int", "String"]);

  let method = &document.vertices[&inflate];
  assert_eq!(method.executable_name.as_deref(), Some("inflate"));
  assert_eq!(method.parameter_type_names, vec!["SELF", "float"]);
  assert_eq!(
    method.parameter_literal_expressions,
    vec![None, Some("1".to_string())]
  );
  assert!(document
    .edges
    .iter()
    .any(|e| e.target_vertex_id == inflate && e.parameter_name == "this"));
  assert_eq!(document.endpoints.get("land").copied(), graph.endpoint("land").ok());

  let json = serde_json::to_value(&document).unwrap();
  assert!(json["vertices"][land.to_string()]["maskClass"].is_string());
  assert!(json["edges"][0]["sourceVertexId"].is_number());
}

#[test]
fn test_import_reports_unresolved_operation() {
  let (graph, [_, _, inflate, _]) = island_graph();
  let mut document = graph.to_document();
  if let Some(vertex) = document.vertices.get_mut(&inflate) {
    vertex.executable_name = Some("dilate".to_string());
  }

  let err = PipelineGraph::from_document(&document).unwrap_err();
  assert_eq!(
    err.to_string(),
    "could not resolve operation dilate(SELF, float) on class Mask"
  );
}

#[test]
fn test_import_rejects_unknown_class_and_bad_arity() {
  let (graph, [land, ..]) = island_graph();

  let mut document = graph.to_document();
  if let Some(vertex) = document.vertices.get_mut(&land) {
    vertex.mask_class = "HeightMask".to_string();
  }
  assert!(matches!(
    PipelineGraph::from_document(&document),
    Err(GraphError::UnknownMaskClass(name)) if name == "HeightMask"
  ));

  let mut document = graph.to_document();
  if let Some(vertex) = document.vertices.get_mut(&land) {
    vertex.parameter_literal_expressions.push(Some("1".to_string()));
  }
  assert!(matches!(
    PipelineGraph::from_document(&document),
    Err(GraphError::ArityMismatch { expected: 3, actual: 4, .. })
  ));

  assert!(matches!(
    PipelineGraph::from_json("{ not json"),
    Err(GraphError::Json(_))
  ));
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn test_bind_time_type_checks() {
  let mut graph = PipelineGraph::new();
  let height = graph
    .add_constructor(MaskKind::Float, &["int", "int", "String"])
    .unwrap();
  let randomize = graph
    .add_method(MaskKind::Boolean, "randomize", &["SELF", "float"])
    .unwrap();

  assert!(matches!(
    graph.connect(height, SELF_RESULT, randomize, "this"),
    Err(GraphError::TypeMismatch { expected, actual, .. })
      if expected == "BooleanMask" && actual == "FloatMask"
  ));
  assert!(matches!(
    graph.bind_literal(randomize, "this", "1"),
    Err(GraphError::TypeMismatch { .. })
  ));
  assert!(matches!(
    graph.bind_literal(height, "size", "1.5"),
    Err(GraphError::Expression { .. })
  ));
  assert!(matches!(
    graph.bind_literal(randomize, "chance", "0.5"),
    Err(GraphError::UnknownParameter { .. })
  ));
  assert!(matches!(
    graph.connect(height, "RESULT", randomize, "this"),
    Err(GraphError::UnknownResult { .. })
  ));

  graph.bind_literal(randomize, "density", "0.5").unwrap();
  assert!(matches!(
    graph.bind_literal(randomize, "density", "0.2"),
    Err(GraphError::AlreadyBound { .. })
  ));
}

#[test]
fn test_generic_parameters_resolve_against_class() {
  let mut graph = PipelineGraph::new();
  let fill_bool = graph
    .add_method(MaskKind::Boolean, "fill", &["SELF", "T"])
    .unwrap();
  let fill_int = graph
    .add_method(MaskKind::Integer, "fill", &["SELF", "T"])
    .unwrap();

  assert_eq!(
    graph.vertex(fill_bool).unwrap().parameter_types(),
    vec![ParamType::Mask(MaskKind::Boolean), ParamType::Bool]
  );
  assert!(graph.bind_literal(fill_bool, "value", "3").is_err());
  graph.bind_literal(fill_bool, "value", "true").unwrap();
  assert!(graph.bind_literal(fill_int, "value", "2.5").is_err());
  graph.bind_literal(fill_int, "value", "7").unwrap();
}

#[test]
fn test_unknown_overload_names_mask_class() {
  let mut graph = PipelineGraph::new();
  let err = graph
    .add_method(MaskKind::Float, "outline", &["SELF"])
    .unwrap_err();
  assert_eq!(
    err.to_string(),
    "could not resolve operation outline(SELF) on class FloatMask"
  );
}

// =============================================================================
// Evaluation
// =============================================================================

#[test]
fn test_not_fully_defined_vs_not_computed() {
  let mut graph = PipelineGraph::new();
  let land = graph
    .add_constructor(MaskKind::Boolean, &["int", "int", "String"])
    .unwrap();
  graph.bind_literal(land, "size", "8").unwrap();

  match graph.result(land, SELF_RESULT) {
    Err(GraphError::NotFullyDefined { missing, .. }) => assert_eq!(missing, vec!["seed", "name"]),
    other => panic!("unexpected {other:?}"),
  }

  graph.bind_literal(land, "seed", "1").unwrap();
  graph.bind_literal(land, "name", "land").unwrap();
  assert!(matches!(
    graph.result(land, SELF_RESULT),
    Err(GraphError::NotComputed { .. })
  ));

  let pipeline = Pipeline::with_seed(1).unwrap();
  graph
    .evaluate(&pipeline, &GenerationContext::default(), &BTreeMap::new())
    .unwrap();
  assert!(graph.result(land, SELF_RESULT).is_ok());
}

#[test]
fn test_evaluate_rejects_incomplete_graph() {
  let mut graph = PipelineGraph::new();
  let land = bool_constructor(&mut graph, "8", "1", "land");
  let inflate = graph
    .add_method(MaskKind::Boolean, "inflate", &["SELF", "float"])
    .unwrap();
  graph.connect(land, SELF_RESULT, inflate, "this").unwrap();

  let pipeline = Pipeline::with_seed(1).unwrap();
  let err = graph
    .evaluate(&pipeline, &GenerationContext::default(), &BTreeMap::new())
    .unwrap_err();
  assert!(matches!(err, GraphError::NotFullyDefined { vertex, .. } if vertex == inflate));
}

#[test]
fn test_evaluation_is_memoized() {
  let (mut graph, _) = island_graph();
  let pipeline = Pipeline::with_seed(9).unwrap();
  let context = GenerationContext::new(9, 16);

  graph.evaluate(&pipeline, &context, &BTreeMap::new()).unwrap();
  let appended = pipeline.stats().appended;
  assert_eq!(appended, 3);

  graph.evaluate(&pipeline, &context, &BTreeMap::new()).unwrap();
  assert_eq!(pipeline.stats().appended, appended);
}

#[test]
fn test_rebinding_invalidates_downstream() {
  let (mut graph, [_, _, inflate, smooth]) = island_graph();
  let pipeline = Pipeline::with_seed(9).unwrap();
  let context = GenerationContext::new(9, 16);
  graph.evaluate(&pipeline, &context, &BTreeMap::new()).unwrap();

  graph.unbind(inflate, "radius").unwrap();
  assert!(matches!(
    graph.result(smooth, SELF_RESULT),
    Err(GraphError::NotComputed { .. })
  ));
  assert!(matches!(
    graph.result(inflate, SELF_RESULT),
    Err(GraphError::NotFullyDefined { .. })
  ));

  // The whole in-place chain reruns, so the result matches a fresh chain
  graph.bind_literal(inflate, "radius", "2").unwrap();
  graph.evaluate(&pipeline, &context, &BTreeMap::new()).unwrap();
  let rerun = boolean_output(&graph, "land").final_raster().unwrap();

  let direct = pipeline
    .create::<bool>(MaskSpec::new(16, "direct").seed(SEED))
    .unwrap();
  direct.randomize(0.5).unwrap().inflate(2.0).unwrap().smooth(4).unwrap();
  assert_eq!(rerun.as_slice(), direct.final_raster().unwrap().as_slice());
}

#[test]
fn test_cycles_are_rejected() {
  let mut graph = PipelineGraph::new();
  let first = graph
    .add_method(MaskKind::Boolean, "combine", &["SELF", "SELF"])
    .unwrap();
  let second = graph
    .add_method(MaskKind::Boolean, "combine", &["SELF", "SELF"])
    .unwrap();
  graph.connect(first, SELF_RESULT, second, "this").unwrap();

  assert!(matches!(
    graph.connect(second, SELF_RESULT, first, "other"),
    Err(GraphError::Cycle(_))
  ));
  assert!(matches!(
    graph.connect(first, SELF_RESULT, first, "other"),
    Err(GraphError::Cycle(_))
  ));
  assert_eq!(graph.topological_order().unwrap(), vec![first, second]);
}

#[test]
fn test_context_expressions_and_map_methods() {
  let mut graph = PipelineGraph::new();
  let float_mask = |graph: &mut PipelineGraph, name: &str, value: &str| {
    let id = graph
      .add_constructor(MaskKind::Float, &["int", "int", "String"])
      .unwrap();
    graph.bind_literal(id, "size", "mapSize / 8").unwrap();
    graph.bind_literal(id, "seed", "seed + 1").unwrap();
    graph.bind_literal(id, "name", name).unwrap();
    let fill = graph
      .add_method(MaskKind::Float, "fill", &["SELF", "T"])
      .unwrap();
    graph.connect(id, SELF_RESULT, fill, "this").unwrap();
    graph.bind_literal(fill, "value", value).unwrap();
    fill
  };
  let low = float_mask(&mut graph, "low", "1");
  let high = float_mask(&mut graph, "high", "weight * 2");

  let maximum = graph
    .add_map_method(MaskKind::Float, "maximum", &["SELF", "SELF", "String"])
    .unwrap();
  graph.connect(low, SELF_RESULT, maximum, "first").unwrap();
  graph.connect(high, SELF_RESULT, maximum, "second").unwrap();
  graph.bind_literal(maximum, "name", "\"peak\"").unwrap();

  let pipeline = Pipeline::with_seed(5).unwrap();
  let context = GenerationContext::new(5, 128).with_variable("weight", 1.5);
  graph.evaluate(&pipeline, &context, &BTreeMap::new()).unwrap();

  let Value::Mask(MaskValue::Float(peak)) = graph.result(maximum, SELF_RESULT).unwrap() else {
    panic!("expected a float mask");
  };
  assert_eq!(peak.name().unwrap(), "peak");
  assert_eq!(peak.size().unwrap(), 16);
  assert_eq!(peak.average().unwrap(), 3.0);
}

#[test]
fn test_fanned_out_receiver_is_copied() {
  let mut graph = PipelineGraph::new();
  let land = bool_constructor(&mut graph, "8", "1", "land");
  let fill = graph
    .add_method(MaskKind::Boolean, "fill", &["SELF", "T"])
    .unwrap();
  graph.connect(land, SELF_RESULT, fill, "this").unwrap();
  graph.bind_literal(fill, "value", "true").unwrap();

  let invert = graph
    .add_method(MaskKind::Boolean, "invert", &["SELF"])
    .unwrap();
  graph.connect(fill, SELF_RESULT, invert, "this").unwrap();
  let kept = graph.add_output("kept", MaskKind::Boolean).unwrap();
  graph.connect(fill, SELF_RESULT, kept, "value").unwrap();
  let inverted = graph.add_output("inverted", MaskKind::Boolean).unwrap();
  graph.connect(invert, SELF_RESULT, inverted, "value").unwrap();

  let pipeline = Pipeline::with_seed(1).unwrap();
  graph
    .evaluate(&pipeline, &GenerationContext::default(), &BTreeMap::new())
    .unwrap();
  assert_eq!(boolean_output(&graph, "kept").count().unwrap(), 64);
  assert_eq!(boolean_output(&graph, "inverted").count().unwrap(), 0);
}

#[test]
fn test_input_endpoints() {
  let mut graph = PipelineGraph::new();
  let base = graph.add_input("base", MaskKind::Boolean).unwrap();
  let invert = graph
    .add_method(MaskKind::Boolean, "invert", &["SELF"])
    .unwrap();
  graph.connect(base, SELF_RESULT, invert, "this").unwrap();
  let out = graph.add_output("inverted", MaskKind::Boolean).unwrap();
  graph.connect(invert, SELF_RESULT, out, "value").unwrap();

  assert!(matches!(
    graph.add_input("base", MaskKind::Boolean),
    Err(GraphError::DuplicateEndpoint(_))
  ));

  let pipeline = Pipeline::with_seed(3).unwrap();
  let context = GenerationContext::default();
  assert!(matches!(
    graph.evaluate(&pipeline, &context, &BTreeMap::new()),
    Err(GraphError::MissingInput(name)) if name == "base"
  ));

  let mask = pipeline.boolean_mask(16, "supplied").unwrap();
  mask.randomize(0.5).unwrap();
  let before = mask.count().unwrap();
  let inputs = BTreeMap::from([("base".to_string(), Value::from(mask))]);
  graph.evaluate(&pipeline, &context, &inputs).unwrap();
  assert_eq!(boolean_output(&graph, "inverted").count().unwrap(), 256 - before);

  let reloaded = PipelineGraph::from_json(&graph.to_json().unwrap()).unwrap();
  assert_eq!(reloaded.endpoint("base").unwrap(), base);
  assert_eq!(reloaded.vertex(base).unwrap().endpoint_name(), Some("base"));
}

#[test]
fn test_remove_vertex_unbinds_consumers() {
  let (mut graph, [_, randomize, inflate, smooth]) = island_graph();
  let removed = graph.remove_vertex(inflate).unwrap();
  assert_eq!(removed.kind(), VertexKind::Method);

  assert!(graph.edges().iter().all(|e| e.source != inflate && e.target != inflate));
  assert_eq!(
    graph.vertex(smooth).unwrap().unbound_parameters(),
    vec!["this".to_string()]
  );
  graph.connect(randomize, SELF_RESULT, smooth, "this").unwrap();
  assert!(graph.vertex(smooth).unwrap().is_fully_defined());
}

#[test]
fn test_oversized_enlarge_literal_fails_evaluation() {
  let mut graph = PipelineGraph::new();
  let land = bool_constructor(&mut graph, "16", "1", "\"land\"");
  let enlarge = graph
    .add_method(MaskKind::Boolean, "enlarge", &["SELF", "int"])
    .unwrap();
  graph.connect(land, SELF_RESULT, enlarge, "this").unwrap();
  graph
    .bind_literal(enlarge, "factor", "2 * 1000000000000000000")
    .unwrap();

  let pipeline = Pipeline::with_seed(1).unwrap();
  let err = graph
    .evaluate(&pipeline, &GenerationContext::new(1, 16), &BTreeMap::new())
    .unwrap_err();
  assert!(matches!(
    err,
    GraphError::Mask(crate::error::MaskError::IncompatibleResize { from: 16, .. })
  ));
  assert_eq!(pipeline.stats().appended, 0);
}
