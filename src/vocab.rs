//! Well-known RDF and XSD identifiers.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

/// XSD datatypes whose values fit a 32-bit signed GraphQL `Int` when in range.
const INTEGER_FAMILY: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

/// Whether `datatype` is one of the XSD integer types.
pub fn is_integer_datatype(datatype: &str) -> bool {
    datatype
        .strip_prefix(XSD)
        .is_some_and(|local| INTEGER_FAMILY.contains(&local))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_family() {
        assert!(is_integer_datatype(XSD_INTEGER));
        assert!(is_integer_datatype("http://www.w3.org/2001/XMLSchema#unsignedByte"));
        assert!(!is_integer_datatype(XSD_STRING));
        assert!(!is_integer_datatype("http://example.org/integer"));
    }
}
