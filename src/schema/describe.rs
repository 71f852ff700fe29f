//! Human-readable descriptions attached to generated types and fields.

use crate::model::{ClassDescriptor, PropertyDescriptor};

fn plural(n: u64) -> &'static str {
    if n == 1 { "" } else { "s" }
}

pub fn class_description(class: &ClassDescriptor) -> String {
    let count = match class.instance_count {
        0 => "an unknown number of".to_string(),
        n => n.to_string(),
    };
    format!(
        "Generated SPARQL class with {count} instance{}.\n\nOriginal IRI is {}.",
        plural(class.instance_count),
        class.iri
    )
}

/// `kind` is "attribute" or "association". A count equal to the probe cap is
/// a lower bound and gets a `+`.
pub fn property_description(property: &PropertyDescriptor, kind: &str, max_property_count: Option<u64>) -> String {
    let count = match property.count {
        0 => "an unknown number of".to_string(),
        n if Some(n) == max_property_count => format!("{n}+"),
        n => n.to_string(),
    };
    format!(
        "This {kind} has {count} occurrence{}.\n\nOriginal IRI is {}.",
        plural(property.count),
        property.iri
    )
}

pub const SORT_BY_IDENTIFIER: &str = "Sort by instance IRI.\n\nAllowed values are \"ASC\" and \"DESC\" for ascending and descending sort respectively.\n\nIf you want pagination to return values in a stable order, you should also sort them.";
pub const SORT_BY_VALUE: &str = "Sort by value.\n\nAllowed values are \"ASC\" and \"DESC\" for ascending and descending sort respectively.\n\nIf you want pagination to return values in a stable order, you should also sort them.";
pub const FILTER: &str = "Only return the instance with the given IRI.";
pub const SOURCE_IDENTIFIER: &str = "IRI representing this particular object.";
pub const SOURCE_KIND: &str = "IRI representing the RDF type of this object.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassId;

    #[test]
    fn counts_read_naturally() {
        let mut class = ClassDescriptor::new(ClassId(0), "http://ex.org/Cat", 1);
        assert!(class_description(&class).starts_with("Generated SPARQL class with 1 instance."));
        class.instance_count = 0;
        assert!(class_description(&class).contains("an unknown number of instances"));

        let mut legs = PropertyDescriptor::new("http://ex.org/legs");
        legs.count = 13;
        assert!(property_description(&legs, "attribute", Some(1000)).contains("has 13 occurrences"));
        legs.count = 1000;
        assert!(property_description(&legs, "attribute", Some(1000)).contains("has 1000+ occurrences"));
        assert!(property_description(&legs, "attribute", None).contains("http://ex.org/legs"));
    }
}
