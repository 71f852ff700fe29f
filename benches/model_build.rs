//! Benchmarks for fact grouping and model building.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use quarry::client::Term;
use quarry::config::DEFAULT_ONTOLOGY_PREFIX;
use quarry::model::ModelBuilder;
use quarry::observe::{FactBundle, FactCodec, ObservationKind, Observations, Slot};
use quarry::postprocess::PostprocessPipeline;
use quarry::vocab::{XSD_INTEGER, XSD_STRING};

/// `classes` classes with eight attributes and two associations each.
fn synthetic(classes: usize) -> Observations {
    let class = |i: usize| format!("http://bench.org/class/C{i}");
    let mut facts = Vec::new();
    for i in 0..classes {
        facts.push(FactBundle::new(
            ObservationKind::ClassFact,
            [
                (Slot::DescribedClass, Term::iri(class(i))),
                (Slot::NumberOfInstances, Term::typed("100", XSD_INTEGER)),
            ],
        ));
        for p in 0..8 {
            let property = format!("http://bench.org/prop/p{p}");
            facts.push(FactBundle::new(
                ObservationKind::AttributeFact,
                [
                    (Slot::AttributeSourceClass, Term::iri(class(i))),
                    (Slot::DescribedAttribute, Term::iri(&property)),
                    (Slot::TargetLiteral, Term::typed("x", XSD_STRING)),
                ],
            ));
            facts.push(FactBundle::new(
                ObservationKind::PropertyCountFact,
                [
                    (Slot::CountedPropertySourceClass, Term::iri(class(i))),
                    (Slot::CountedProperty, Term::iri(&property)),
                    (Slot::NumberOfPropertyInstances, Term::typed("100", XSD_INTEGER)),
                ],
            ));
        }
        for a in 0..2 {
            facts.push(FactBundle::new(
                ObservationKind::AssociationFact,
                [
                    (Slot::AssociationSourceClass, Term::iri(class(i))),
                    (Slot::DescribedAssociation, Term::iri(format!("http://bench.org/assoc/a{a}"))),
                    (Slot::TargetClass, Term::iri(class((i + a + 1) % classes))),
                ],
            ));
        }
    }
    let mut out = Observations::new();
    for fact in facts {
        out.entry(fact.kind()).or_default().push(fact);
    }
    out
}

fn bench_group(c: &mut Criterion) {
    let codec = FactCodec::new(DEFAULT_ONTOLOGY_PREFIX);
    let mut group = c.benchmark_group("group_facts");
    for classes in [10, 100] {
        let triples = codec.to_triples(&synthetic(classes));
        group.bench_with_input(BenchmarkId::from_parameter(classes), &triples, |bench, triples| {
            bench.iter(|| black_box(codec.group(triples).unwrap()))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let builder = ModelBuilder::new();
    let postprocess = PostprocessPipeline::default();
    let mut group = c.benchmark_group("build_model");
    for classes in [10, 100] {
        let facts = synthetic(classes);
        group.bench_with_input(BenchmarkId::from_parameter(classes), &facts, |bench, facts| {
            bench.iter(|| {
                let mut model = builder.build(facts).unwrap();
                postprocess.run(&mut model);
                black_box(model)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_group, bench_build);
criterion_main!(benches);
