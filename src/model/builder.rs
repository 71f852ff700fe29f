//! Facts -> [`DataModel`].
//!
//! The passes run in a fixed order: classes, attributes, associations,
//! property placeholders, counts, scalar flags. Counts and scalar flags
//! annotate properties, so every property must exist before they run.

use std::collections::HashMap;

use crate::client::Term;
use crate::error::ModelResult;
use crate::observe::{FactBundle, ObservationKind, Observations, Slot};
use crate::vocab::XSD_STRING;

use super::{AssociationDescriptor, AttributeDescriptor, ClassId, DataModel};

/// Builds a model from accumulated facts. Stateless between builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelBuilder;

impl ModelBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, facts: &Observations) -> ModelResult<DataModel> {
        let mut pass = BuildPass::default();
        let of = |kind: ObservationKind| facts.get(&kind).map(Vec::as_slice).unwrap_or(&[]);

        pass.classes(of(ObservationKind::ClassFact))?;
        pass.attributes(of(ObservationKind::AttributeFact))?;
        pass.associations(of(ObservationKind::AssociationFact))?;
        pass.placeholders(of(ObservationKind::PropertyExistenceFact))?;
        pass.counts(of(ObservationKind::PropertyCountFact))?;
        pass.scalars(of(ObservationKind::PropertyIsScalarFact))?;

        tracing::info!(
            classes = pass.model.len(),
            max_property_count = pass.model.max_property_count(),
            "model built"
        );
        Ok(pass.model)
    }
}

#[derive(Default)]
struct BuildPass {
    model: DataModel,
    by_iri: HashMap<String, ClassId>,
}

impl BuildPass {
    fn lookup(&self, iri: &str) -> Option<ClassId> {
        self.by_iri.get(iri).copied()
    }

    fn classes(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let iri = fact.iri(Slot::DescribedClass)?;
            let count = fact.count(Slot::NumberOfInstances)?;
            if self.by_iri.contains_key(iri) {
                continue;
            }
            let id = self.model.push(iri, count);
            self.by_iri.insert(iri.to_string(), id);
        }
        Ok(())
    }

    fn attributes(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let class_iri = fact.iri(Slot::AttributeSourceClass)?;
            let property = fact.iri(Slot::DescribedAttribute)?;
            let Some(class) = self.lookup(class_iri).and_then(|id| self.model.class_mut(id)) else {
                tracing::warn!(class = class_iri, property, "attribute of unknown class, skipping");
                continue;
            };

            let index = match class.attributes.iter().position(|a| a.property.iri == property) {
                Some(index) => index,
                None => {
                    class.attributes.push(AttributeDescriptor::new(property));
                    class.attributes.len() - 1
                }
            };
            let attribute = &mut class.attributes[index];
            if let Term::Literal {
                datatype, language, ..
            } = fact.require(Slot::TargetLiteral)?
            {
                attribute.types.insert(datatype.clone());
                if let Some(language) = language {
                    attribute.languages.insert(language.clone());
                }
            }
        }
        Ok(())
    }

    fn associations(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let class_iri = fact.iri(Slot::AssociationSourceClass)?;
            let property = fact.iri(Slot::DescribedAssociation)?;
            let target_iri = fact.iri(Slot::TargetClass)?;

            let Some(target) = self.lookup(target_iri) else {
                tracing::warn!(
                    class = class_iri,
                    property,
                    target = target_iri,
                    "association target is not a known class, skipping"
                );
                continue;
            };
            let Some(class) = self.lookup(class_iri).and_then(|id| self.model.class_mut(id)) else {
                tracing::warn!(class = class_iri, property, "association of unknown class, skipping");
                continue;
            };

            match class
                .associations
                .iter_mut()
                .find(|a| a.property.iri == property)
            {
                Some(association) => {
                    association.add_target(target);
                }
                None => {
                    let mut association = AssociationDescriptor::new(property);
                    association.add_target(target);
                    class.associations.push(association);
                }
            }
        }
        Ok(())
    }

    /// Surface properties that were never sampled as attribute or association.
    fn placeholders(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let class_iri = fact.iri(Slot::PropertyOf)?;
            let property = fact.iri(Slot::PropertyIri)?;
            let Some(class) = self.lookup(class_iri).and_then(|id| self.model.class_mut(id)) else {
                tracing::warn!(class = class_iri, property, "property of unknown class, skipping");
                continue;
            };
            if class.has_property(property) {
                continue;
            }
            let mut attribute = AttributeDescriptor::new(property);
            attribute.types.insert(XSD_STRING.to_string());
            class.attributes.push(attribute);
        }
        Ok(())
    }

    /// Counts are best effort: a count for an unknown property is logged and skipped.
    fn counts(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let class_iri = fact.iri(Slot::CountedPropertySourceClass)?;
            let property = fact.iri(Slot::CountedProperty)?;
            let count = fact.count(Slot::NumberOfPropertyInstances)?;
            let Some(class) = self.lookup(class_iri).and_then(|id| self.model.class_mut(id)) else {
                tracing::warn!(class = class_iri, property, "count for unknown class, skipping");
                continue;
            };
            let mut found = false;
            for descriptor in class.properties_mut().filter(|p| p.iri == property) {
                descriptor.count = count;
                found = true;
            }
            if !found {
                tracing::warn!(class = class_iri, property, "missing descriptor for counted property");
            }
        }
        Ok(())
    }

    fn scalars(&mut self, facts: &[FactBundle]) -> ModelResult<()> {
        for fact in facts {
            let property = fact.iri(Slot::ScalarProperty)?;
            let mut found = false;
            for class in self.model.classes_mut() {
                for descriptor in class.properties_mut().filter(|p| p.iri == property) {
                    descriptor.is_array = false;
                    found = true;
                }
            }
            if !found {
                tracing::warn!(property, "scalar fact for unknown property, skipping");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{RDF_LANG_STRING, XSD_INTEGER};

    const CAT: &str = "http://ex.org/Cat";
    const DOG: &str = "http://ex.org/Dog";
    const LEGS: &str = "http://ex.org/legs";
    const FRIEND: &str = "http://ex.org/friend";

    fn class_fact(iri: &str, n: u64) -> FactBundle {
        FactBundle::new(
            ObservationKind::ClassFact,
            [
                (Slot::DescribedClass, Term::iri(iri)),
                (Slot::NumberOfInstances, Term::typed(n.to_string(), XSD_INTEGER)),
            ],
        )
    }

    fn attribute_fact(class: &str, property: &str, literal: Term) -> FactBundle {
        FactBundle::new(
            ObservationKind::AttributeFact,
            [
                (Slot::AttributeSourceClass, Term::iri(class)),
                (Slot::DescribedAttribute, Term::iri(property)),
                (Slot::TargetLiteral, literal),
            ],
        )
    }

    fn association_fact(class: &str, property: &str, target: &str) -> FactBundle {
        FactBundle::new(
            ObservationKind::AssociationFact,
            [
                (Slot::AssociationSourceClass, Term::iri(class)),
                (Slot::DescribedAssociation, Term::iri(property)),
                (Slot::TargetClass, Term::iri(target)),
            ],
        )
    }

    fn count_fact(class: &str, property: &str, n: u64) -> FactBundle {
        FactBundle::new(
            ObservationKind::PropertyCountFact,
            [
                (Slot::CountedPropertySourceClass, Term::iri(class)),
                (Slot::CountedProperty, Term::iri(property)),
                (Slot::NumberOfPropertyInstances, Term::typed(n.to_string(), XSD_INTEGER)),
            ],
        )
    }

    fn scalar_fact(property: &str) -> FactBundle {
        FactBundle::new(
            ObservationKind::PropertyIsScalarFact,
            [(Slot::ScalarProperty, Term::iri(property))],
        )
    }

    fn observations(facts: Vec<FactBundle>) -> Observations {
        let mut out = Observations::new();
        for fact in facts {
            out.entry(fact.kind()).or_default().push(fact);
        }
        out
    }

    fn cat_and_dog() -> Vec<FactBundle> {
        vec![
            class_fact(CAT, 1),
            class_fact(DOG, 2),
            attribute_fact(CAT, LEGS, Term::typed("4", XSD_INTEGER)),
            association_fact(CAT, FRIEND, DOG),
            count_fact(CAT, LEGS, 13),
        ]
    }

    #[test]
    fn builds_classes_attributes_and_associations() {
        let model = ModelBuilder::new().build(&observations(cat_and_dog())).unwrap();
        assert_eq!(model.len(), 2);
        let cat = model.class_by_iri(CAT).unwrap();
        assert_eq!(cat.instance_count, 1);
        let legs = cat.attribute(LEGS).unwrap();
        assert_eq!(legs.property.count, 13);
        assert!(legs.property.is_array);
        let friend = cat.association(FRIEND).unwrap();
        assert_eq!(friend.target_classes, vec![model.class_by_iri(DOG).unwrap().id]);
    }

    #[test]
    fn attribute_types_are_unioned() {
        let facts = vec![
            class_fact(CAT, 1),
            attribute_fact(CAT, LEGS, Term::typed("4", XSD_INTEGER)),
            attribute_fact(CAT, LEGS, Term::string("four")),
            attribute_fact(CAT, LEGS, Term::typed("5", XSD_INTEGER)),
        ];
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let legs = model.class_by_iri(CAT).unwrap().attribute(LEGS).unwrap();
        assert_eq!(
            legs.types.iter().map(String::as_str).collect::<Vec<_>>(),
            vec![XSD_INTEGER, XSD_STRING]
        );
    }

    #[test]
    fn language_tags_are_collected() {
        let name = "http://ex.org/name";
        let facts = vec![
            class_fact(CAT, 1),
            attribute_fact(CAT, name, Term::lang_string("Tom", "en")),
            attribute_fact(CAT, name, Term::lang_string("Tomáš", "cs")),
        ];
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let attr = model.class_by_iri(CAT).unwrap().attribute(name).unwrap();
        assert!(attr.is_lang_string());
        assert!(attr.types.contains(RDF_LANG_STRING));
        assert_eq!(attr.languages.len(), 2);
    }

    #[test]
    fn scalar_flag_applies_regardless_of_order() {
        // Scalar fact listed before the attribute it refers to.
        let mut facts = vec![scalar_fact(LEGS)];
        facts.extend(cat_and_dog());
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let legs = model.class_by_iri(CAT).unwrap().attribute(LEGS).unwrap();
        assert!(!legs.property.is_array);
    }

    #[test]
    fn unknown_counts_and_targets_are_skipped() {
        let mut facts = cat_and_dog();
        facts.push(count_fact(CAT, "http://ex.org/ghost", 7));
        facts.push(count_fact("http://ex.org/Nothing", LEGS, 7));
        facts.push(association_fact(CAT, "http://ex.org/owner", "http://ex.org/Human"));
        facts.push(scalar_fact("http://ex.org/ghost"));
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let cat = model.class_by_iri(CAT).unwrap();
        assert!(cat.association("http://ex.org/owner").is_none());
        assert!(model.is_consistent());
    }

    #[test]
    fn bare_properties_become_string_placeholders() {
        let mut facts = cat_and_dog();
        facts.push(FactBundle::new(
            ObservationKind::PropertyExistenceFact,
            [
                (Slot::PropertyOf, Term::iri(DOG)),
                (Slot::PropertyIri, Term::iri("http://ex.org/mystery")),
            ],
        ));
        facts.push(FactBundle::new(
            ObservationKind::PropertyExistenceFact,
            [(Slot::PropertyOf, Term::iri(CAT)), (Slot::PropertyIri, Term::iri(LEGS))],
        ));
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let dog = model.class_by_iri(DOG).unwrap();
        let mystery = dog.attribute("http://ex.org/mystery").unwrap();
        assert!(mystery.types.contains(XSD_STRING));
        assert_eq!(model.class_by_iri(CAT).unwrap().attributes.len(), 1);
    }

    #[test]
    fn polymorphic_targets_accumulate() {
        let mut facts = cat_and_dog();
        facts.push(association_fact(CAT, FRIEND, CAT));
        facts.push(association_fact(CAT, FRIEND, DOG));
        let model = ModelBuilder::new().build(&observations(facts)).unwrap();
        let friend = model.class_by_iri(CAT).unwrap().association(FRIEND).unwrap();
        assert_eq!(friend.target_classes.len(), 2);
        assert!(friend.is_polymorphic());
    }

    #[test]
    fn build_is_idempotent() {
        let facts = observations(cat_and_dog());
        let builder = ModelBuilder::new();
        assert_eq!(builder.build(&facts).unwrap(), builder.build(&facts).unwrap());
    }

    #[test]
    fn missing_slot_is_an_error() {
        let facts = observations(vec![FactBundle::new(
            ObservationKind::ClassFact,
            [(Slot::DescribedClass, Term::iri(CAT))],
        )]);
        assert!(ModelBuilder::new().build(&facts).is_err());
    }
}
