//! Pipeline throughput benchmarks.
//!
//! - **stages**: single neighborhood operations on one mask, per symmetry
//! - **chains**: independent masks scheduled together (worker pool fan-out)
//! - **graph**: evaluating a serialized graph versus the same direct chain

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mask_engine::{
  GenerationContext, MaskKind, NeighborPolicy, Pipeline, PipelineConfig, PipelineGraph, Symmetry,
  SymmetrySettings,
};

const SIZE: usize = 256;

fn pipeline(symmetry: Symmetry) -> Pipeline {
  Pipeline::new(PipelineConfig::new(7, SymmetrySettings::uniform(symmetry))).unwrap()
}

// =============================================================================
// Single stages
// =============================================================================

fn bench_stages(c: &mut Criterion) {
  let mut group = c.benchmark_group("stages");
  group.throughput(Throughput::Elements((SIZE * SIZE) as u64));
  group.sample_size(20);

  for symmetry in [Symmetry::None, Symmetry::Point2, Symmetry::Quad, Symmetry::Point6] {
    let name = format!("{symmetry:?}");

    group.bench_with_input(BenchmarkId::new("randomize", &name), &symmetry, |b, &s| {
      b.iter(|| {
        let p = pipeline(s);
        let mask = p.boolean_mask(SIZE, "bench").unwrap();
        mask.randomize(black_box(0.5)).unwrap();
        black_box(mask.count().unwrap())
      })
    });

    group.bench_with_input(BenchmarkId::new("inflate_r4", &name), &symmetry, |b, &s| {
      b.iter(|| {
        let p = pipeline(s);
        let mask = p.boolean_mask(SIZE, "bench").unwrap();
        mask.randomize(0.05).unwrap().inflate(black_box(4.0)).unwrap();
        black_box(mask.count().unwrap())
      })
    });

    group.bench_with_input(BenchmarkId::new("smooth_r8", &name), &symmetry, |b, &s| {
      b.iter(|| {
        let p = pipeline(s);
        let mask = p.float_mask(SIZE, "bench").unwrap();
        mask.randomize_range(0.0, 1.0).unwrap().smooth(black_box(8)).unwrap();
        black_box(mask.sum().unwrap())
      })
    });
  }

  // Canonical-only skips the mirrored reads but pays a re-symmetrize
  group.bench_function("inflate_r4/canonical_only", |b| {
    b.iter(|| {
      let p = pipeline(Symmetry::Point4);
      let mask = p.boolean_mask(SIZE, "bench").unwrap();
      mask
        .randomize(0.05)
        .unwrap()
        .inflate_with(4.0, NeighborPolicy::CanonicalOnly)
        .unwrap();
      black_box(mask.count().unwrap())
    })
  });

  group.bench_function("distance_field", |b| {
    b.iter(|| {
      let p = pipeline(Symmetry::Point2);
      let mask = p.boolean_mask(SIZE, "bench").unwrap();
      mask.randomize(0.01).unwrap();
      black_box(mask.distance_field().unwrap().max().unwrap())
    })
  });

  group.finish();
}

// =============================================================================
// Independent chains
// =============================================================================

fn bench_chains(c: &mut Criterion) {
  let mut group = c.benchmark_group("chains");
  group.sample_size(10);

  for masks in [1usize, 4, 16] {
    group.throughput(Throughput::Elements(masks as u64));
    group.bench_with_input(BenchmarkId::new("island", masks), &masks, |b, &masks| {
      b.iter(|| {
        let p = pipeline(Symmetry::Point2);
        for i in 0..masks {
          p.boolean_mask(SIZE, format!("land_{i}"))
            .unwrap()
            .randomize(0.45)
            .unwrap()
            .smooth(4)
            .unwrap()
            .inflate(1.0)
            .unwrap();
        }
        p.await_all().unwrap();
        black_box(p.stats())
      })
    });
  }

  group.finish();
}

// =============================================================================
// Graph evaluation
// =============================================================================

fn island_graph() -> PipelineGraph {
  let mut graph = PipelineGraph::with_generator("bench");
  let land = graph
    .add_constructor(MaskKind::Boolean, &["int", "int", "String"])
    .unwrap();
  graph.bind_literal(land, "size", "mapSize").unwrap();
  graph.bind_literal(land, "seed", "seed").unwrap();
  graph.bind_literal(land, "name", "\"land\"").unwrap();

  let mut previous = land;
  for (name, types, parameter, literal) in [
    ("randomize", ["SELF", "float"], "density", "0.45"),
    ("smooth", ["SELF", "int"], "radius", "4"),
    ("inflate", ["SELF", "float"], "radius", "1"),
  ] {
    let id = graph.add_method(MaskKind::Boolean, name, &types).unwrap();
    graph.connect(previous, "SELF", id, "this").unwrap();
    graph.bind_literal(id, parameter, literal).unwrap();
    previous = id;
  }
  let output = graph.add_output("land", MaskKind::Boolean).unwrap();
  graph.connect(previous, "SELF", output, "value").unwrap();
  graph
}

fn bench_graph(c: &mut Criterion) {
  let mut group = c.benchmark_group("graph");
  group.sample_size(10);
  let json = island_graph().to_json().unwrap();
  let context = GenerationContext::new(7, SIZE);

  group.bench_function("load_and_evaluate", |b| {
    b.iter(|| {
      let p = pipeline(Symmetry::Point2);
      let mut graph = PipelineGraph::from_json(black_box(&json)).unwrap();
      graph.evaluate(&p, &context, &BTreeMap::new()).unwrap();
      p.await_all().unwrap();
      black_box(p.stats())
    })
  });

  group.bench_function("direct_chain", |b| {
    b.iter(|| {
      let p = pipeline(Symmetry::Point2);
      p.boolean_mask(SIZE, "land")
        .unwrap()
        .randomize(0.45)
        .unwrap()
        .smooth(4)
        .unwrap()
        .inflate(1.0)
        .unwrap();
      p.await_all().unwrap();
      black_box(p.stats())
    })
  });

  group.finish();
}

criterion_group!(stages, bench_stages, bench_chains);
criterion_group!(graph, bench_graph);

criterion_main!(stages, graph);
