//! Closed registry of executables a graph vertex can bind.
//!
//! Each entry is keyed by its declaring class, name and formal parameter
//! type names, so a serialized graph re-resolves the exact overload it was
//! built with. Nothing is discovered at runtime: a document naming an
//! executable outside this table fails to load.

use std::fmt;

use crate::error::GraphError;
use crate::graph::value::{each_mask, Args, MaskValue, ParamType, Value};
use crate::graph::VertexKind;
use crate::mask::{NeighborPolicy, DEFAULT_SMOOTH_DENSITY};
use crate::pipeline::{MaskSpec, Pipeline};
use crate::raster::MaskKind;

/// Declaring class of the generic mask operations.
pub const MASK_CLASS: &str = "Mask";
/// Declaring class of the map methods.
pub const PIPELINE_CLASS: &str = "Pipeline";

const ALL: &[MaskKind] = &MaskKind::ALL;
const BOOLEAN: &[MaskKind] = &[MaskKind::Boolean];
const NUMERIC: &[MaskKind] = &[MaskKind::Float, MaskKind::Integer];

// =============================================================================
// Executables
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameter {
  pub name: &'static str,
  pub ty: ParamType,
}

macro_rules! param {
  ($name:literal, $ty:expr) => {
    Parameter {
      name: $name,
      ty: $ty,
    }
  };
}

const THIS: Parameter = param!("this", ParamType::SelfMask);
const OTHER: Parameter = param!("other", ParamType::SelfMask);
const POLICY: Parameter = param!("policy", ParamType::NeighborPolicy);
const RADIUS: Parameter = param!("radius", ParamType::Float);
const NAME: Parameter = param!("name", ParamType::Text);

/// What a vertex bound to an executable produces as its `SELF` result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
  /// The receiver, mutated in place.
  Receiver,
  /// A new mask of the vertex's class.
  SameClass,
  /// A new mask of a fixed class.
  Class(MaskKind),
}

pub(crate) struct Call<'a> {
  pub pipeline: &'a Pipeline,
  pub class: MaskKind,
  pub args: Args<'a>,
}

type Invoke = fn(&Call<'_>) -> Result<Value, GraphError>;

pub struct Executable {
  pub kind: VertexKind,
  pub declaring_class: &'static str,
  pub name: &'static str,
  /// Mask classes a vertex may bind this executable for.
  pub classes: &'static [MaskKind],
  pub parameters: &'static [Parameter],
  pub output: Output,
  invoke: Invoke,
}

impl Executable {
  pub fn parameter_type_names(&self) -> Vec<&'static str> {
    self.parameters.iter().map(|p| p.ty.type_name()).collect()
  }

  pub fn supports(&self, class: MaskKind) -> bool {
    self.classes.contains(&class)
  }

  pub fn result_type(&self, class: MaskKind) -> ParamType {
    match self.output {
      Output::Receiver | Output::SameClass => ParamType::Mask(class),
      Output::Class(kind) => ParamType::Mask(kind),
    }
  }

  pub(crate) fn invoke(&self, call: &Call<'_>) -> Result<Value, GraphError> {
    (self.invoke)(call)
  }

  fn matches(&self, name: &str, parameter_types: &[&str]) -> bool {
    self.name == name
      && self.parameters.len() == parameter_types.len()
      && self
        .parameters
        .iter()
        .zip(parameter_types)
        .all(|(p, ty)| p.ty.type_name() == *ty)
  }
}

impl fmt::Debug for Executable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{self}", self.declaring_class)
  }
}

impl fmt::Display for Executable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", signature(self.name, &self.parameter_type_names()))
  }
}

fn signature(name: &str, parameter_types: &[&str]) -> String {
  format!("{name}({})", parameter_types.join(", "))
}

// =============================================================================
// Lookup
// =============================================================================

pub fn executables() -> &'static [Executable] {
  REGISTRY
}

/// Exact lookup by the key a serialized graph records.
pub fn resolve(
  declaring_class: &str,
  name: &str,
  parameter_types: &[&str],
) -> Result<&'static Executable, GraphError> {
  REGISTRY
    .iter()
    .find(|e| e.declaring_class == declaring_class && e.matches(name, parameter_types))
    .ok_or_else(|| GraphError::UnresolvedOperation {
      operation: signature(name, parameter_types),
      class: declaring_class.to_string(),
    })
}

/// Find the overload of `name` a vertex of `kind` and `class` can bind.
pub fn find(
  kind: VertexKind,
  class: MaskKind,
  name: &str,
  parameter_types: &[&str],
) -> Result<&'static Executable, GraphError> {
  REGISTRY
    .iter()
    .find(|e| e.kind == kind && e.supports(class) && e.matches(name, parameter_types))
    .ok_or_else(|| GraphError::UnresolvedOperation {
      operation: signature(name, parameter_types),
      class: class.class_name().to_string(),
    })
}

// =============================================================================
// Invocations
// =============================================================================

macro_rules! numeric_mask {
  ($args:expr, $index:expr, |$m:ident: $t:ident| $body:expr) => {
    match $args.mask_value($index)? {
      MaskValue::Float($m) => {
        #[allow(dead_code)]
        type $t = f32;
        $body
      }
      MaskValue::Integer($m) => {
        #[allow(dead_code)]
        type $t = i32;
        $body
      }
      MaskValue::Boolean(_) => return Err($args.mismatch($index, "FloatMask or IntegerMask")),
    }
  };
}

macro_rules! boolean_mask {
  ($args:expr, $index:expr) => {
    match $args.mask_value($index)? {
      MaskValue::Boolean(mask) => mask,
      _ => return Err($args.mismatch($index, "BooleanMask")),
    }
  };
}

fn receiver(args: &Args<'_>) -> Result<Value, GraphError> {
  Ok(Value::Mask(args.mask_value(0)?.clone()))
}

fn construct(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let mut spec = MaskSpec::new(a.count(0)?, a.text(2)?).seed(a.seed(1)?);
  if a.values.len() > 3 {
    spec = spec.symmetry(a.source(3)?);
  }
  Ok(match call.class {
    MaskKind::Boolean => call.pipeline.create::<bool>(spec)?.into(),
    MaskKind::Float => call.pipeline.create::<f32>(spec)?.into(),
    MaskKind::Integer => call.pipeline.create::<i32>(spec)?.into(),
  })
}

fn fill(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.fill(a.cell::<T>(1)?)?;
  });
  receiver(a)
}

fn init(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.init_from(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn combine(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.combine(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn intersect(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.intersect(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn subtract(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.subtract(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn invert(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.invert()?;
  });
  receiver(a)
}

/// Optional trailing neighbor policy at `index`.
fn policy_at(a: &Args<'_>, index: usize) -> Result<NeighborPolicy, GraphError> {
  if a.values.len() > index {
    a.policy(index)
  } else {
    Ok(Default::default())
  }
}

fn inflate(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let (radius, policy) = (a.float(1)?, policy_at(a, 2)?);
  each_mask!(a.mask_value(0)?, |m: T| {
    m.inflate_with(radius, policy)?;
  });
  receiver(a)
}

fn deflate(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let (radius, policy) = (a.float(1)?, policy_at(a, 2)?);
  each_mask!(a.mask_value(0)?, |m: T| {
    m.deflate_with(radius, policy)?;
  });
  receiver(a)
}

fn smooth(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let radius = a.count(1)?;
  let density = if a.values.len() > 2 {
    a.float(2)?
  } else {
    DEFAULT_SMOOTH_DENSITY
  };
  let policy = policy_at(a, 3)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.smooth_with(radius, density, policy)?;
  });
  receiver(a)
}

fn fill_edge(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let width = a.count(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.fill_edge(width, a.cell::<T>(2)?)?;
  });
  receiver(a)
}

fn fill_center(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let extent = a.float(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.fill_center(extent, a.cell::<T>(2)?)?;
  });
  receiver(a)
}

fn set_size(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let size = a.count(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.set_size(size)?;
  });
  receiver(a)
}

fn enlarge(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let factor = a.count(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.enlarge(factor)?;
  });
  receiver(a)
}

fn shrink(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let factor = a.count(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.shrink(factor)?;
  });
  receiver(a)
}

fn resample(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let size = a.count(1)?;
  each_mask!(a.mask_value(0)?, |m: T| {
    m.resample(size)?;
  });
  receiver(a)
}

fn copy(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  Ok(each_mask!(a.mask_value(0)?, |m: T| m.copy()?.into()))
}

fn distance_field(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  Ok(each_mask!(a.mask_value(0)?, |m: T| m.distance_field()?.into()))
}

fn randomize_density(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  boolean_mask!(a, 0).randomize(a.float(1)?)?;
  receiver(a)
}

fn outline(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  boolean_mask!(a, 0).outline_with(policy_at(a, 1)?)?;
  receiver(a)
}

fn acid(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  boolean_mask!(a, 0).acid_with(a.float(1)?, a.float(2)?, policy_at(a, 3)?)?;
  receiver(a)
}

fn init_threshold(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let mask = boolean_mask!(a, 0);
  let threshold = a.float(2)?;
  numeric_mask!(a, 1, |source: T| {
    mask.init_from_float(source, threshold)?;
  });
  receiver(a)
}

fn randomize_range(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.randomize_range(a.cell::<T>(1)?, a.cell::<T>(2)?)?;
  });
  receiver(a)
}

fn add_perlin_noise(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.add_perlin_noise(a.float(1)?, a.float(2)?)?;
  });
  receiver(a)
}

fn add_gaussian_noise(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.add_gaussian_noise(a.float(1)?)?;
  });
  receiver(a)
}

fn add(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.add(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn multiply(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.multiply(a.mask::<T>(1)?)?;
  });
  receiver(a)
}

fn add_scalar(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.add_scalar(a.cell::<T>(1)?)?;
  });
  receiver(a)
}

fn multiply_scalar(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.multiply_scalar(a.cell::<T>(1)?)?;
  });
  receiver(a)
}

fn clamp(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  numeric_mask!(a, 0, |m: T| {
    m.clamp(a.cell::<T>(1)?, a.cell::<T>(2)?)?;
  });
  receiver(a)
}

fn init_boolean(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let source = boolean_mask!(a, 1);
  numeric_mask!(a, 0, |m: T| {
    m.init_from_boolean(source, a.cell::<T>(2)?, a.cell::<T>(3)?)?;
  });
  receiver(a)
}

fn select(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let selector = boolean_mask!(a, 0);
  let name = a.text(3)?;
  Ok(each_mask!(a.mask_value(1)?, |when_set: T| {
    call
      .pipeline
      .select(selector, when_set, a.mask::<T>(2)?, name)?
      .into()
  }))
}

fn maximum(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let last = a.values.len() - 1;
  let name = a.text(last)?;
  Ok(each_mask!(a.mask_value(0)?, |first: T| {
    let mut masks = vec![first];
    for index in 1..last {
      masks.push(a.mask::<T>(index)?);
    }
    call.pipeline.maximum(&masks, name)?.into()
  }))
}

fn union(call: &Call<'_>) -> Result<Value, GraphError> {
  let a = &call.args;
  let (first, second) = (boolean_mask!(a, 0), boolean_mask!(a, 1));
  Ok(call.pipeline.union(&[first, second], a.text(2)?)?.into())
}

// =============================================================================
// Table
// =============================================================================

const fn constructor(parameters: &'static [Parameter]) -> Executable {
  Executable {
    kind: VertexKind::Constructor,
    declaring_class: MASK_CLASS,
    name: "new",
    classes: ALL,
    parameters,
    output: Output::SameClass,
    invoke: construct,
  }
}

const fn method(
  name: &'static str,
  classes: &'static [MaskKind],
  parameters: &'static [Parameter],
  invoke: Invoke,
) -> Executable {
  Executable {
    kind: VertexKind::Method,
    declaring_class: MASK_CLASS,
    name,
    classes,
    parameters,
    output: Output::Receiver,
    invoke,
  }
}

const fn derive(
  name: &'static str,
  output: Output,
  parameters: &'static [Parameter],
  invoke: Invoke,
) -> Executable {
  Executable {
    kind: VertexKind::Method,
    declaring_class: MASK_CLASS,
    name,
    classes: ALL,
    parameters,
    output,
    invoke,
  }
}

const fn map_method(
  name: &'static str,
  classes: &'static [MaskKind],
  parameters: &'static [Parameter],
  invoke: Invoke,
) -> Executable {
  Executable {
    kind: VertexKind::MapMethod,
    declaring_class: PIPELINE_CLASS,
    name,
    classes,
    parameters,
    output: Output::SameClass,
    invoke,
  }
}

use ParamType as P;

static REGISTRY: &[Executable] = &[
  constructor(&[param!("size", P::Int), param!("seed", P::Int), NAME]),
  constructor(&[
    param!("size", P::Int),
    param!("seed", P::Int),
    NAME,
    param!("symmetry", P::SymmetrySource),
  ]),
  // Shared by every mask class
  method("fill", ALL, &[THIS, param!("value", P::Cell)], fill),
  method("init", ALL, &[THIS, OTHER], init),
  method("combine", ALL, &[THIS, OTHER], combine),
  method("intersect", ALL, &[THIS, OTHER], intersect),
  method("subtract", ALL, &[THIS, OTHER], subtract),
  method("invert", ALL, &[THIS], invert),
  method("inflate", ALL, &[THIS, RADIUS], inflate),
  method("inflate", ALL, &[THIS, RADIUS, POLICY], inflate),
  method("deflate", ALL, &[THIS, RADIUS], deflate),
  method("deflate", ALL, &[THIS, RADIUS, POLICY], deflate),
  method("smooth", ALL, &[THIS, param!("radius", P::Int)], smooth),
  method(
    "smooth",
    ALL,
    &[THIS, param!("radius", P::Int), param!("density", P::Float), POLICY],
    smooth,
  ),
  method(
    "fill_edge",
    ALL,
    &[THIS, param!("width", P::Int), param!("value", P::Cell)],
    fill_edge,
  ),
  method(
    "fill_center",
    ALL,
    &[THIS, param!("extent", P::Float), param!("value", P::Cell)],
    fill_center,
  ),
  method("set_size", ALL, &[THIS, param!("size", P::Int)], set_size),
  method("enlarge", ALL, &[THIS, param!("factor", P::Int)], enlarge),
  method("shrink", ALL, &[THIS, param!("factor", P::Int)], shrink),
  method("resample", ALL, &[THIS, param!("size", P::Int)], resample),
  derive("copy", Output::SameClass, &[THIS], copy),
  derive("distance_field", Output::Class(MaskKind::Float), &[THIS], distance_field),
  // BooleanMask
  method("randomize", BOOLEAN, &[THIS, param!("density", P::Float)], randomize_density),
  method("outline", BOOLEAN, &[THIS], outline),
  method("outline", BOOLEAN, &[THIS, POLICY], outline),
  method(
    "acid",
    BOOLEAN,
    &[THIS, param!("strength", P::Float), RADIUS],
    acid,
  ),
  method(
    "acid",
    BOOLEAN,
    &[THIS, param!("strength", P::Float), RADIUS, POLICY],
    acid,
  ),
  method(
    "init",
    BOOLEAN,
    &[THIS, param!("other", P::Mask(MaskKind::Float)), param!("threshold", P::Float)],
    init_threshold,
  ),
  method(
    "init",
    BOOLEAN,
    &[THIS, param!("other", P::Mask(MaskKind::Integer)), param!("threshold", P::Float)],
    init_threshold,
  ),
  // FloatMask and IntegerMask
  method(
    "randomize",
    NUMERIC,
    &[THIS, param!("min", P::Cell), param!("max", P::Cell)],
    randomize_range,
  ),
  method(
    "add_perlin_noise",
    NUMERIC,
    &[THIS, param!("resolution", P::Float), param!("scale", P::Float)],
    add_perlin_noise,
  ),
  method(
    "add_gaussian_noise",
    NUMERIC,
    &[THIS, param!("scale", P::Float)],
    add_gaussian_noise,
  ),
  method("add", NUMERIC, &[THIS, OTHER], add),
  method("multiply", NUMERIC, &[THIS, OTHER], multiply),
  method("add_scalar", NUMERIC, &[THIS, param!("value", P::Cell)], add_scalar),
  method("multiply_scalar", NUMERIC, &[THIS, param!("value", P::Cell)], multiply_scalar),
  method(
    "clamp",
    NUMERIC,
    &[THIS, param!("min", P::Cell), param!("max", P::Cell)],
    clamp,
  ),
  method(
    "init",
    NUMERIC,
    &[
      THIS,
      param!("other", P::Mask(MaskKind::Boolean)),
      param!("low", P::Cell),
      param!("high", P::Cell),
    ],
    init_boolean,
  ),
  // Map methods
  map_method(
    "select",
    ALL,
    &[
      param!("selector", P::Mask(MaskKind::Boolean)),
      param!("when_set", P::SelfMask),
      param!("otherwise", P::SelfMask),
      NAME,
    ],
    select,
  ),
  map_method(
    "maximum",
    ALL,
    &[param!("first", P::SelfMask), param!("second", P::SelfMask), NAME],
    maximum,
  ),
  map_method(
    "maximum",
    ALL,
    &[
      param!("first", P::SelfMask),
      param!("second", P::SelfMask),
      param!("third", P::SelfMask),
      NAME,
    ],
    maximum,
  ),
  map_method(
    "union",
    BOOLEAN,
    &[
      param!("first", P::Mask(MaskKind::Boolean)),
      param!("second", P::Mask(MaskKind::Boolean)),
      NAME,
    ],
    union,
  ),
];
