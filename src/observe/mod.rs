//! Observation of an endpoint through dependency-triggered probes.
//!
//! Probes query the endpoint and describe what they find as *facts*: small
//! records in a fixed vocabulary, one [`ObservationKind`] per record, with
//! named [`Slot`]s holding identifiers, literals and counts. The
//! [`ObservationOrchestrator`] runs the init probes, then feeds every non-empty
//! batch of facts to the probes subscribed to that kind.

pub mod codec;
pub mod orchestrator;
pub mod probe;
pub mod probes;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::Term;
use crate::error::{ModelError, ModelResult};

pub use codec::FactCodec;
pub use orchestrator::ObservationOrchestrator;
pub use probe::{Probe, ProbeContext};

/// The closed set of fact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObservationKind {
    ClassFact,
    AttributeFact,
    AssociationFact,
    PropertyExistenceFact,
    PropertyCountFact,
    PropertyIsScalarFact,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 6] = [
        ObservationKind::ClassFact,
        ObservationKind::AttributeFact,
        ObservationKind::AssociationFact,
        ObservationKind::PropertyExistenceFact,
        ObservationKind::PropertyCountFact,
        ObservationKind::PropertyIsScalarFact,
    ];

    /// Local name within the observation ontology.
    pub fn local_name(self) -> &'static str {
        match self {
            ObservationKind::ClassFact => "ClassObservation",
            ObservationKind::AttributeFact => "AttributeObservation",
            ObservationKind::AssociationFact => "AssociationObservation",
            ObservationKind::PropertyExistenceFact => "PropertyExistenceObservation",
            ObservationKind::PropertyCountFact => "PropertyCountObservation",
            ObservationKind::PropertyIsScalarFact => "PropertyIsAPartialFunctionObservation",
        }
    }

    pub fn iri(self, prefix: &str) -> String {
        format!("{prefix}{}", self.local_name())
    }

    pub fn from_iri(prefix: &str, iri: &str) -> Option<Self> {
        let local = iri.strip_prefix(prefix)?;
        Self::ALL.into_iter().find(|k| k.local_name() == local)
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The closed set of slot names a fact may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    DescribedClass,
    NumberOfInstances,
    DescribedAttribute,
    AttributeSourceClass,
    TargetLiteral,
    DescribedAssociation,
    AssociationSourceClass,
    TargetClass,
    PropertyOf,
    PropertyIri,
    CountedProperty,
    CountedPropertySourceClass,
    NumberOfPropertyInstances,
    ScalarProperty,
}

impl Slot {
    pub const ALL: [Slot; 14] = [
        Slot::DescribedClass,
        Slot::NumberOfInstances,
        Slot::DescribedAttribute,
        Slot::AttributeSourceClass,
        Slot::TargetLiteral,
        Slot::DescribedAssociation,
        Slot::AssociationSourceClass,
        Slot::TargetClass,
        Slot::PropertyOf,
        Slot::PropertyIri,
        Slot::CountedProperty,
        Slot::CountedPropertySourceClass,
        Slot::NumberOfPropertyInstances,
        Slot::ScalarProperty,
    ];

    pub fn local_name(self) -> &'static str {
        match self {
            Slot::DescribedClass => "describedClass",
            Slot::NumberOfInstances => "numberOfInstances",
            Slot::DescribedAttribute => "describedAttribute",
            Slot::AttributeSourceClass => "attributeSourceClass",
            Slot::TargetLiteral => "targetLiteral",
            Slot::DescribedAssociation => "describedAssociation",
            Slot::AssociationSourceClass => "associationSourceClass",
            Slot::TargetClass => "targetClass",
            Slot::PropertyOf => "propertyOf",
            Slot::PropertyIri => "propertyIri",
            Slot::CountedProperty => "countedProperty",
            Slot::CountedPropertySourceClass => "countedPropertySourceClass",
            Slot::NumberOfPropertyInstances => "numberOfPropertyInstances",
            Slot::ScalarProperty => "partialFunctionProperty",
        }
    }

    pub fn iri(self, prefix: &str) -> String {
        format!("{prefix}{}", self.local_name())
    }

    pub fn from_iri(prefix: &str, iri: &str) -> Option<Self> {
        let local = iri.strip_prefix(prefix)?;
        Self::ALL.into_iter().find(|s| s.local_name() == local)
    }
}

/// One immutable fact about one subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactBundle {
    kind: ObservationKind,
    slots: BTreeMap<Slot, Term>,
}

impl FactBundle {
    pub fn new(kind: ObservationKind, slots: impl IntoIterator<Item = (Slot, Term)>) -> Self {
        Self {
            kind,
            slots: slots.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> ObservationKind {
        self.kind
    }

    pub fn slots(&self) -> &BTreeMap<Slot, Term> {
        &self.slots
    }

    pub fn get(&self, slot: Slot) -> Option<&Term> {
        self.slots.get(&slot)
    }

    /// A slot that must be present.
    pub fn require(&self, slot: Slot) -> ModelResult<&Term> {
        self.get(slot).ok_or_else(|| ModelError::MissingSlot {
            kind: self.kind.to_string(),
            slot: slot.local_name().to_string(),
        })
    }

    /// A slot that must hold an IRI.
    pub fn iri(&self, slot: Slot) -> ModelResult<&str> {
        let term = self.require(slot)?;
        term.as_iri().ok_or_else(|| ModelError::BadSlotValue {
            slot: slot.local_name().to_string(),
            value: term.to_string(),
        })
    }

    /// A slot that must hold a non-negative integer literal.
    pub fn count(&self, slot: Slot) -> ModelResult<u64> {
        let term = self.require(slot)?;
        match term {
            Term::Literal { value, .. } => {
                value.trim().parse().map_err(|_| ModelError::BadSlotValue {
                    slot: slot.local_name().to_string(),
                    value: term.to_string(),
                })
            }
            _ => Err(ModelError::BadSlotValue {
                slot: slot.local_name().to_string(),
                value: term.to_string(),
            }),
        }
    }
}

/// Facts grouped by kind. Kinds with no facts may be absent.
pub type Observations = BTreeMap<ObservationKind, Vec<FactBundle>>;

/// Append every fact of `more` into `into`.
pub fn merge_observations(into: &mut Observations, more: Observations) {
    for (kind, facts) in more {
        into.entry(kind).or_default().extend(facts);
    }
}

/// Total number of facts across all kinds.
pub fn fact_count(observations: &Observations) -> usize {
    observations.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ONTOLOGY_PREFIX;

    #[test]
    fn vocabulary_roundtrips_through_iris() {
        for kind in ObservationKind::ALL {
            let iri = kind.iri(DEFAULT_ONTOLOGY_PREFIX);
            assert_eq!(ObservationKind::from_iri(DEFAULT_ONTOLOGY_PREFIX, &iri), Some(kind));
        }
        for slot in Slot::ALL {
            let iri = slot.iri(DEFAULT_ONTOLOGY_PREFIX);
            assert_eq!(Slot::from_iri(DEFAULT_ONTOLOGY_PREFIX, &iri), Some(slot));
        }
        assert_eq!(
            Slot::from_iri("http://other.org/", &Slot::TargetClass.iri(DEFAULT_ONTOLOGY_PREFIX)),
            None
        );
    }

    #[test]
    fn slot_accessors_validate_values() {
        let fact = FactBundle::new(
            ObservationKind::ClassFact,
            [
                (Slot::DescribedClass, Term::iri("http://ex.org/Cat")),
                (Slot::NumberOfInstances, Term::typed("12", crate::vocab::XSD_INTEGER)),
            ],
        );
        assert_eq!(fact.iri(Slot::DescribedClass).unwrap(), "http://ex.org/Cat");
        assert_eq!(fact.count(Slot::NumberOfInstances).unwrap(), 12);
        assert!(matches!(
            fact.iri(Slot::NumberOfInstances),
            Err(ModelError::BadSlotValue { .. })
        ));
        assert!(matches!(
            fact.require(Slot::TargetClass),
            Err(ModelError::MissingSlot { .. })
        ));
    }

    #[test]
    fn merge_appends_without_dropping_duplicates() {
        let fact = FactBundle::new(
            ObservationKind::PropertyIsScalarFact,
            [(Slot::ScalarProperty, Term::iri("http://ex.org/p"))],
        );
        let mut acc = Observations::new();
        merge_observations(&mut acc, Observations::from([(fact.kind(), vec![fact.clone()])]));
        merge_observations(&mut acc, Observations::from([(fact.kind(), vec![fact])]));
        assert_eq!(fact_count(&acc), 2);
    }
}
