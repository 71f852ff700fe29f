//! Conversion between flat triples and typed fact bundles.
//!
//! On the wire every fact is a subject (usually a blank node) with one
//! `rdf:type` triple naming its [`ObservationKind`] and one triple per
//! [`Slot`]. The durable form is N-Triples.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use oxigraph::io::RdfFormat;

use crate::client::http::parse_graph;
use crate::client::{RawTriple, Term};
use crate::error::{CodecError, CodecResult};
use crate::vocab::RDF_TYPE;

use super::{FactBundle, ObservationKind, Observations, Slot};

/// Groups, encodes and decodes facts for one ontology prefix.
#[derive(Debug, Clone)]
pub struct FactCodec {
    prefix: String,
}

impl FactCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Group the triples of one response by subject into fact bundles.
    ///
    /// Blank-node subjects are only meaningful within one response, so each
    /// response must be grouped on its own.
    pub fn group(&self, triples: &[RawTriple]) -> CodecResult<Observations> {
        let mut by_subject: BTreeMap<&Term, Vec<&RawTriple>> = BTreeMap::new();
        for triple in triples {
            by_subject.entry(&triple.subject).or_default().push(triple);
        }

        let mut observations = Observations::new();
        for (subject, subject_triples) in by_subject {
            let mut kind = None;
            let mut slots = BTreeMap::new();
            for triple in subject_triples {
                if triple.predicate == RDF_TYPE {
                    let found = self.kind_of(&triple.object)?;
                    if kind.is_some_and(|k| k != found) {
                        return Err(CodecError::ConflictingObservationKind {
                            subject: subject.to_string(),
                        });
                    }
                    kind = Some(found);
                } else {
                    let slot = Slot::from_iri(&self.prefix, &triple.predicate).ok_or_else(|| {
                        CodecError::UnknownObservationVocabulary {
                            iri: triple.predicate.clone(),
                        }
                    })?;
                    slots.insert(slot, triple.object.clone());
                }
            }
            let kind = kind.ok_or_else(|| CodecError::MissingObservationKind {
                subject: subject.to_string(),
            })?;
            observations
                .entry(kind)
                .or_default()
                .push(FactBundle::new(kind, slots));
        }
        Ok(observations)
    }

    fn kind_of(&self, object: &Term) -> CodecResult<ObservationKind> {
        object
            .as_iri()
            .and_then(|iri| ObservationKind::from_iri(&self.prefix, iri))
            .ok_or_else(|| CodecError::UnknownObservationVocabulary {
                iri: object.lexical().to_string(),
            })
    }

    /// Flatten facts back into triples with fresh blank-node subjects.
    pub fn to_triples(&self, observations: &Observations) -> Vec<RawTriple> {
        let mut triples = Vec::new();
        let mut next = 0usize;
        for (kind, facts) in observations {
            for fact in facts {
                let subject = Term::Blank(format!("f{next}"));
                next += 1;
                triples.push(RawTriple::new(
                    subject.clone(),
                    RDF_TYPE,
                    Term::iri(kind.iri(&self.prefix)),
                ));
                for (slot, value) in fact.slots() {
                    triples.push(RawTriple::new(subject.clone(), slot.iri(&self.prefix), value.clone()));
                }
            }
        }
        triples
    }

    /// Encode facts as N-Triples.
    pub fn encode(&self, observations: &Observations) -> String {
        let mut out = String::new();
        for triple in self.to_triples(observations) {
            // Writing into a String cannot fail.
            let _ = writeln!(
                out,
                "{} <{}> {} .",
                triple.subject, triple.predicate, triple.object
            );
        }
        out
    }

    /// Decode N-Triples produced by [`FactCodec::encode`].
    pub fn decode(&self, text: &str) -> CodecResult<Observations> {
        let triples = parse_graph(RdfFormat::NTriples, text.as_bytes()).map_err(|e| {
            CodecError::Syntax {
                message: e.to_string(),
            }
        })?;
        self.group(&triples)
    }
}
