//! The typed class/property model inferred from facts.
//!
//! Classes live in an arena ([`DataModel`]) and are addressed by [`ClassId`].
//! Associations refer to their target classes by id, so the class reference
//! graph may contain cycles (A -> B -> A) without any ownership cycles.

pub mod builder;
pub mod checkpoint;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use builder::ModelBuilder;

/// Index of a class within its [`DataModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(pub usize);

/// Fields shared by attributes and associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub iri: String,
    /// Schema-friendly name, unique within the owning class.
    pub name: String,
    /// Number of occurrences; 0 means unknown.
    pub count: u64,
    /// False only when proven to hold at most one value per subject.
    pub is_array: bool,
}

impl PropertyDescriptor {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            name: String::new(),
            count: 0,
            is_array: true,
        }
    }
}

/// A property whose values are literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    #[serde(flatten)]
    pub property: PropertyDescriptor,
    /// Datatype IRIs of the sampled literals.
    pub types: BTreeSet<String>,
    /// Language tags of the sampled language-tagged literals.
    pub languages: BTreeSet<String>,
}

impl AttributeDescriptor {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            property: PropertyDescriptor::new(iri),
            types: BTreeSet::new(),
            languages: BTreeSet::new(),
        }
    }

    pub fn is_lang_string(&self) -> bool {
        !self.languages.is_empty()
    }
}

/// A property whose values are instances of other classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub property: PropertyDescriptor,
    /// Ordered, de-duplicated set of target classes.
    pub target_classes: Vec<ClassId>,
}

impl AssociationDescriptor {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            property: PropertyDescriptor::new(iri),
            target_classes: Vec::new(),
        }
    }

    pub fn add_target(&mut self, target: ClassId) -> bool {
        if self.target_classes.contains(&target) {
            return false;
        }
        self.target_classes.push(target);
        true
    }

    pub fn is_polymorphic(&self) -> bool {
        self.target_classes.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub id: ClassId,
    pub iri: String,
    /// Schema-friendly name, unique within the model.
    pub name: String,
    pub instance_count: u64,
    pub attributes: Vec<AttributeDescriptor>,
    pub associations: Vec<AssociationDescriptor>,
}

impl ClassDescriptor {
    pub fn new(id: ClassId, iri: impl Into<String>, instance_count: u64) -> Self {
        Self {
            id,
            iri: iri.into(),
            name: String::new(),
            instance_count,
            attributes: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn attribute(&self, iri: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.property.iri == iri)
    }

    pub fn association(&self, iri: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.property.iri == iri)
    }

    pub fn has_property(&self, iri: &str) -> bool {
        self.attribute(iri).is_some() || self.association(iri).is_some()
    }

    /// Every attribute and association, attributes first.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.attributes
            .iter()
            .map(|a| &a.property)
            .chain(self.associations.iter().map(|a| &a.property))
    }

    pub(crate) fn properties_mut(&mut self) -> impl Iterator<Item = &mut PropertyDescriptor> {
        self.attributes
            .iter_mut()
            .map(|a| &mut a.property)
            .chain(self.associations.iter_mut().map(|a| &mut a.property))
    }
}

/// The full set of class descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataModel {
    classes: Vec<ClassDescriptor>,
}

impl DataModel {
    /// Wrap descriptors, re-numbering ids to match their arena position.
    ///
    /// Association targets must already use the new positions.
    pub fn from_classes(mut classes: Vec<ClassDescriptor>) -> Self {
        for (index, class) in classes.iter_mut().enumerate() {
            class.id = ClassId(index);
        }
        Self { classes }
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut [ClassDescriptor] {
        &mut self.classes
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(id.0)
    }

    pub fn class_by_iri(&self, iri: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.iri == iri)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Largest observed property count across the whole model.
    pub fn max_property_count(&self) -> u64 {
        self.classes
            .iter()
            .flat_map(|c| c.properties())
            .map(|p| p.count)
            .max()
            .unwrap_or(0)
    }

    /// Whether every association target resolves within this model.
    pub fn is_consistent(&self) -> bool {
        self.classes.iter().all(|c| {
            c.associations
                .iter()
                .all(|a| a.target_classes.iter().all(|t| t.0 < self.classes.len()))
        })
    }

    pub(crate) fn push(&mut self, iri: &str, instance_count: u64) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(ClassDescriptor::new(id, iri, instance_count));
        id
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> Option<&mut ClassDescriptor> {
        self.classes.get_mut(id.0)
    }
}
