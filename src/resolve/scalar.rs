//! Value-shaping resolvers for literal fields.
//!
//! These never query the endpoint; the parent instance already holds the raw
//! literals fetched for the field.

use std::collections::{BTreeMap, BTreeSet};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::client::Term;
use crate::error::ResolveResult;
use crate::model::AttributeDescriptor;
use crate::postprocess::names::sanitize;
use crate::vocab::{XSD_BOOLEAN, is_integer_datatype};

use super::{FieldOutput, FieldResolver, ResolveContext, ResolveRequest, ScalarValue};

/// Field name for values without a language tag.
pub const NO_LANGUAGE_FIELD: &str = "_no_language";

/// The schema scalar an attribute is exposed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Int,
    Boolean,
}

impl ScalarKind {
    /// `Int` or `Boolean` only when every observed datatype agrees.
    pub fn for_attribute(attribute: &AttributeDescriptor) -> Self {
        let types = &attribute.types;
        if types.is_empty() {
            ScalarKind::String
        } else if types.iter().all(|t| is_integer_datatype(t)) {
            ScalarKind::Int
        } else if types.iter().all(|t| t == XSD_BOOLEAN) {
            ScalarKind::Boolean
        } else {
            ScalarKind::String
        }
    }

    /// `None` when the lexical form does not fit the kind. Integers outside
    /// the 32-bit range count as unparsable.
    pub fn parse(self, lexical: &str) -> Option<ScalarValue> {
        match self {
            ScalarKind::String => Some(ScalarValue::String(lexical.to_string())),
            // GraphQL Int is a signed 32-bit integer.
            ScalarKind::Int => lexical.trim().parse::<i32>().ok().map(|n| ScalarValue::Int(n.into())),
            ScalarKind::Boolean => Some(ScalarValue::Boolean(matches!(lexical.trim(), "true" | "1"))),
        }
    }
}

/// String, Int and Boolean attributes.
#[derive(Debug, Clone)]
pub struct ScalarFieldResolver {
    field: String,
    kind: ScalarKind,
    is_array: bool,
}

impl ScalarFieldResolver {
    pub fn new(field: impl Into<String>, kind: ScalarKind, is_array: bool) -> Self {
        Self {
            field: field.into(),
            kind,
            is_array,
        }
    }

    pub fn shape(&self, raw: &[Term]) -> FieldOutput {
        if raw.is_empty() {
            return FieldOutput::Null;
        }
        let values = raw
            .iter()
            .filter_map(|term| {
                let parsed = self.kind.parse(term.lexical());
                if parsed.is_none() {
                    tracing::debug!(field = %self.field, value = %term, "dropping unparsable literal");
                }
                parsed.map(FieldOutput::Value)
            })
            .collect();
        FieldOutput::from_values(values, self.is_array)
    }
}

impl FieldResolver for ScalarFieldResolver {
    fn resolve<'a>(
        &'a self,
        _ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        let raw = request.parent.map(|p| p.values(&self.field)).unwrap_or(&[]);
        let output = self.shape(raw);
        async move { Ok(output) }.boxed()
    }
}

/// Schema field name for a language tag.
pub fn language_field(tag: &str) -> String {
    if tag.is_empty() {
        NO_LANGUAGE_FIELD.to_string()
    } else {
        sanitize(tag)
    }
}

/// Language-tagged strings grouped into one object keyed by language.
///
/// Only languages the schema object has a field for are kept. Values in other
/// languages, or untagged values when no untagged datatype was observed, are
/// dropped and logged at debug level.
#[derive(Debug, Clone)]
pub struct LangStringFieldResolver {
    field: String,
    is_array: bool,
    languages: BTreeSet<String>,
}

impl LangStringFieldResolver {
    /// `languages` holds schema field names as produced by [`language_field`].
    pub fn new(field: impl Into<String>, is_array: bool, languages: BTreeSet<String>) -> Self {
        Self {
            field: field.into(),
            is_array,
            languages,
        }
    }

    pub fn shape(&self, raw: &[Term]) -> FieldOutput {
        if raw.is_empty() {
            return FieldOutput::Null;
        }
        let mut grouped: BTreeMap<String, Vec<FieldOutput>> = BTreeMap::new();
        for term in raw {
            let tag = match term {
                Term::Literal { language: Some(language), .. } => language.as_str(),
                _ => "",
            };
            let language = language_field(tag);
            if !self.languages.contains(&language) {
                tracing::debug!(field = %self.field, language = %language, value = %term, "dropping literal without a language field");
                continue;
            }
            grouped
                .entry(language)
                .or_default()
                .push(FieldOutput::Value(ScalarValue::String(term.lexical().to_string())));
        }
        FieldOutput::LangString(
            grouped
                .into_iter()
                .map(|(field, values)| (field, FieldOutput::from_values(values, self.is_array)))
                .collect(),
        )
    }
}

impl FieldResolver for LangStringFieldResolver {
    fn resolve<'a>(
        &'a self,
        _ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        let raw = request.parent.map(|p| p.values(&self.field)).unwrap_or(&[]);
        let output = self.shape(raw);
        async move { Ok(output) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{XSD_INTEGER, XSD_STRING};

    fn int(n: i64) -> FieldOutput {
        FieldOutput::Value(ScalarValue::Int(n))
    }

    fn text(s: &str) -> FieldOutput {
        FieldOutput::Value(ScalarValue::String(s.into()))
    }

    #[test]
    fn kind_follows_datatypes() {
        let mut attr = AttributeDescriptor::new("http://ex.org/legs");
        assert_eq!(ScalarKind::for_attribute(&attr), ScalarKind::String);
        attr.types.insert(XSD_INTEGER.into());
        attr.types.insert(format!("{}nonNegativeInteger", crate::vocab::XSD));
        assert_eq!(ScalarKind::for_attribute(&attr), ScalarKind::Int);
        attr.types.insert(XSD_STRING.into());
        assert_eq!(ScalarKind::for_attribute(&attr), ScalarKind::String);

        let mut flag = AttributeDescriptor::new("http://ex.org/indoor");
        flag.types.insert(XSD_BOOLEAN.into());
        assert_eq!(ScalarKind::for_attribute(&flag), ScalarKind::Boolean);
    }

    #[test]
    fn int_list_and_first_value() {
        let raw = [Term::typed("4", XSD_INTEGER), Term::typed("3", XSD_INTEGER)];
        let list = ScalarFieldResolver::new("legs", ScalarKind::Int, true);
        assert_eq!(list.shape(&raw), FieldOutput::List(vec![int(4), int(3)]));
        let single = ScalarFieldResolver::new("legs", ScalarKind::Int, false);
        assert_eq!(single.shape(&raw), int(4));
        assert_eq!(single.shape(&[]), FieldOutput::Null);
    }

    #[test]
    fn unparsable_ints_are_dropped() {
        let raw = [Term::typed("four", XSD_INTEGER), Term::typed("4", XSD_INTEGER)];
        let resolver = ScalarFieldResolver::new("legs", ScalarKind::Int, true);
        assert_eq!(resolver.shape(&raw), FieldOutput::List(vec![int(4)]));
    }

    #[test]
    fn booleans_accept_true_and_one() {
        let resolver = ScalarFieldResolver::new("indoor", ScalarKind::Boolean, true);
        let raw = [
            Term::typed("true", XSD_BOOLEAN),
            Term::typed("1", XSD_BOOLEAN),
            Term::typed("false", XSD_BOOLEAN),
        ];
        let b = |v| FieldOutput::Value(ScalarValue::Boolean(v));
        assert_eq!(resolver.shape(&raw), FieldOutput::List(vec![b(true), b(true), b(false)]));
    }

    #[test]
    fn lang_strings_group_by_language() {
        let raw = [
            Term::lang_string("Lazy Fox", "en"),
            Term::lang_string("Líná Liška", "cs"),
            Term::lang_string("Sly Fox", "en"),
            Term::string("Fox"),
            Term::lang_string("Fuchs", "de-AT"),
        ];
        let languages: BTreeSet<String> = ["en", "cs", "de_AT", NO_LANGUAGE_FIELD].map(String::from).into();
        let single = LangStringFieldResolver::new("label", false, languages.clone()).shape(&raw);
        let FieldOutput::LangString(map) = single else {
            panic!("expected a language map");
        };
        assert_eq!(map["en"], text("Lazy Fox"));
        assert_eq!(map["cs"], text("Líná Liška"));
        assert_eq!(map["de_AT"], text("Fuchs"));
        assert_eq!(map[NO_LANGUAGE_FIELD], text("Fox"));

        let FieldOutput::LangString(map) = LangStringFieldResolver::new("label", true, languages).shape(&raw) else {
            panic!("expected a language map");
        };
        assert_eq!(map["en"], FieldOutput::List(vec![text("Lazy Fox"), text("Sly Fox")]));
    }

    #[test]
    fn lang_strings_without_a_field_are_dropped() {
        let raw = [
            Term::lang_string("Fox", "en"),
            Term::string("Fox"),
            Term::lang_string("Renard", "fr"),
        ];
        let resolver = LangStringFieldResolver::new("label", false, ["en".to_string()].into());
        let FieldOutput::LangString(map) = resolver.shape(&raw) else {
            panic!("expected a language map");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map["en"], text("Fox"));
    }

    #[test]
    fn ints_outside_graphql_range_are_dropped() {
        let raw = [
            Term::typed("2147483647", XSD_INTEGER),
            Term::typed("2147483648", XSD_INTEGER),
            Term::typed("-2147483649", XSD_INTEGER),
            Term::typed("-2147483648", XSD_INTEGER),
        ];
        let resolver = ScalarFieldResolver::new("population", ScalarKind::Int, true);
        assert_eq!(
            resolver.shape(&raw),
            FieldOutput::List(vec![int(i32::MAX.into()), int(i32::MIN.into())])
        );
    }
}
