//! SPARQL compiled at request time.

use std::fmt::Write;

use crate::error::{ResolveError, ResolveResult};
use crate::vocab::RDF_TYPE;

use super::ListArgs;

/// Characters that may not appear inside an `<...>` IRI reference.
const FORBIDDEN_IRI_CHARS: &[char] = &['<', '>', '"', '{', '}', '|', '^', '`', '\\'];

/// Check that `value` can be embedded as `<value>`.
pub fn validate_iri(value: &str) -> ResolveResult<&str> {
    let has_scheme = value
        .split_once(':')
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)));
    if !has_scheme || value.chars().any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_IRI_CHARS.contains(&c)) {
        return Err(ResolveError::InvalidIdentifier {
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Distinct IRI instances of `class`.
///
/// Each of `required` must be present on a returned instance. Sorting,
/// filtering and slicing are pushed into the query.
pub fn discover(class: &str, required: &[&str], args: &ListArgs) -> String {
    let mut q = String::new();
    let _ = writeln!(q, "SELECT DISTINCT ?instance WHERE {{");
    let _ = writeln!(q, "  ?instance <{RDF_TYPE}> <{class}> .");
    let _ = writeln!(q, "  FILTER(isIRI(?instance))");
    for property in required {
        let _ = writeln!(q, "  ?instance <{property}> [] .");
    }
    if let Some(filter) = &args.filter {
        let _ = writeln!(q, "  FILTER(?instance = <{filter}>)");
    }
    q.push('}');
    if let Some(sort) = args.sort {
        let _ = write!(q, "\nORDER BY {}(?instance)", sort.keyword());
    }
    if let Some(limit) = args.limit {
        let _ = write!(q, "\nLIMIT {limit}");
    }
    if let Some(offset) = args.offset {
        let _ = write!(q, "\nOFFSET {offset}");
    }
    q
}

/// Values of `properties` on one subject, one row per value.
pub fn fetch(subject: &str, properties: &[&str]) -> String {
    let values: Vec<String> = properties.iter().map(|p| format!("<{p}>")).collect();
    format!(
        "SELECT ?property ?value WHERE {{\n  VALUES ?property {{ {} }}\n  <{subject}> ?property ?value .\n}}",
        values.join(" ")
    )
}

/// Which of `candidates` the subject is typed with.
pub fn resolve_type(subject: &str, candidates: &[&str]) -> String {
    let values: Vec<String> = candidates.iter().map(|c| format!("<{c}>")).collect();
    format!(
        "SELECT DISTINCT ?class WHERE {{\n  VALUES ?class {{ {} }}\n  <{subject}> <{RDF_TYPE}> ?class .\n}}",
        values.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::SortDirection;

    #[test]
    fn iri_validation() {
        assert!(validate_iri("http://ex.org/tom").is_ok());
        assert!(validate_iri("urn:isbn:123").is_ok());
        for bad in ["", "tom", "http://ex.org/a b", "http://ex.org/>", ":x", "http://ex.org/\"x"] {
            assert!(validate_iri(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn discovery_without_args() {
        let q = discover("http://ex.org/Cat", &[], &ListArgs::default());
        assert!(q.starts_with("SELECT DISTINCT ?instance"));
        assert!(q.contains("<http://ex.org/Cat>"));
        assert!(!q.contains("ORDER BY"));
        assert!(!q.contains("LIMIT"));
    }

    #[test]
    fn discovery_pushes_down_modifiers() {
        let args = ListArgs {
            limit: Some(5),
            offset: Some(10),
            sort: Some(SortDirection::Desc),
            filter: Some("http://ex.org/tom".into()),
        };
        let q = discover("http://ex.org/Cat", &["http://ex.org/legs"], &args);
        assert!(q.contains("?instance <http://ex.org/legs> [] ."));
        assert!(q.contains("FILTER(?instance = <http://ex.org/tom>)"));
        assert!(q.ends_with("ORDER BY DESC(?instance)\nLIMIT 5\nOFFSET 10"));
    }

    #[test]
    fn fetch_uses_values_block() {
        let q = fetch("http://ex.org/tom", &["http://ex.org/legs", "http://ex.org/friend"]);
        assert!(q.contains("VALUES ?property { <http://ex.org/legs> <http://ex.org/friend> }"));
        assert!(q.contains("<http://ex.org/tom> ?property ?value"));
    }
}
