//! Schema-friendly names derived from IRIs.
//!
//! A descriptor gets the last IRI segment (after `/` or `#`) with accents
//! folded and every character outside `[_A-Za-z0-9]` replaced by `_`. When
//! several descriptors in one group would share that short name, all of them
//! get the long name built from the whole IRI instead. Whatever still collides
//! after that gets a numeric suffix.

use std::collections::{BTreeMap, HashSet};

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::model::{ClassDescriptor, PropertyDescriptor};

use super::NamedDescriptor;

/// Type names that a class must not take.
const RESERVED_TYPE_NAMES: &[&str] = &["Query", "Mutation", "Subscription", "String", "Int", "Float", "Boolean", "ID"];

/// Field names every object type already carries.
pub const SOURCE_IDENTIFIER_FIELD: &str = "_source_identifier";
pub const SOURCE_KIND_FIELD: &str = "_source_kind";

/// Fold accents: `Příliš` -> `Prilis`.
pub fn deburr(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Replace anything a schema identifier cannot hold.
pub fn sanitize(text: &str) -> String {
    let mut name: String = deburr(text)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    // Double underscore prefixes are reserved for introspection.
    while name.starts_with("__") {
        name.remove(0);
    }
    name
}

pub fn short_name(iri: &str) -> String {
    let segment = iri.rsplit(['/', '#']).next().unwrap_or(iri);
    let name = sanitize(segment);
    if name.is_empty() || name == "_" {
        long_name(iri)
    } else {
        name
    }
}

pub fn long_name(iri: &str) -> String {
    let name = sanitize(iri);
    if name.is_empty() { "_".to_string() } else { name }
}

/// Assign unique names to one group of descriptors.
pub fn derive_names(descriptors: &mut [&mut dyn NamedDescriptor]) {
    let mut by_short: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        by_short.entry(short_name(descriptor.iri())).or_default().push(index);
    }

    let mut proposed = vec![String::new(); descriptors.len()];
    for (short, indices) in by_short {
        if indices.len() == 1 {
            proposed[indices[0]] = short;
        } else {
            for index in indices {
                proposed[index] = long_name(descriptors[index].iri());
            }
        }
    }

    let mut taken = HashSet::new();
    for (descriptor, name) in descriptors.iter_mut().zip(proposed) {
        descriptor.set_name(unique(name, &mut taken));
    }
}

fn unique(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name}_{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Keep class names clear of the built-in schema type names.
pub fn avoid_reserved_type_names(classes: &mut [ClassDescriptor]) {
    let mut taken: HashSet<String> = classes.iter().map(|c| c.name.clone()).collect();
    for class in classes.iter_mut() {
        if RESERVED_TYPE_NAMES.contains(&class.name.as_str()) {
            let renamed = unique(format!("{}_", class.name), &mut taken);
            tracing::debug!(from = %class.name, to = %renamed, "renamed class with reserved name");
            class.name = renamed;
        }
    }
}

/// Keep property names clear of the implicit source fields.
pub fn avoid_reserved_field_names(properties: &mut [&mut PropertyDescriptor]) {
    let mut taken: HashSet<String> = properties.iter().map(|p| p.name.clone()).collect();
    taken.insert(SOURCE_IDENTIFIER_FIELD.to_string());
    taken.insert(SOURCE_KIND_FIELD.to_string());
    for property in properties.iter_mut() {
        if property.name == SOURCE_IDENTIFIER_FIELD || property.name == SOURCE_KIND_FIELD {
            property.name = unique(format!("{}_", property.name), &mut taken);
        }
    }
}
