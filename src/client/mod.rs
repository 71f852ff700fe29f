//! The narrow boundary to the data source.
//!
//! A [`FactClient`] executes one SPARQL query string and returns either graph
//! triples (CONSTRUCT, used by observation probes) or variable bindings (SELECT,
//! used by resolvers). Everything above this module is protocol agnostic apart
//! from the query strings it builds.

pub mod http;
pub mod local;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term as OxTerm};
use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;
use crate::error::{ClientError, ClientResult};
use crate::vocab::{RDF_LANG_STRING, XSD_STRING};

pub use http::HttpFactClient;
pub use local::LocalStoreClient;

/// A protocol-native value: an IRI, a blank node or a literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::typed(value, XSD_STRING)
    }

    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: RDF_LANG_STRING.into(),
            language: Some(language.into()),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// The IRI, blank node label, or literal lexical form.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(s) | Term::Blank(s) => s,
            Term::Literal { value, .. } => value,
        }
    }

    pub(crate) fn to_oxigraph(&self) -> OxTerm {
        match self {
            Term::Iri(iri) => NamedNode::new_unchecked(iri.as_str()).into(),
            Term::Blank(id) => BlankNode::new_unchecked(id.as_str()).into(),
            Term::Literal {
                value,
                language: Some(language),
                ..
            } => Literal::new_language_tagged_literal_unchecked(value.as_str(), language.as_str())
                .into(),
            Term::Literal {
                value, datatype, ..
            } => Literal::new_typed_literal(value.as_str(), NamedNode::new_unchecked(datatype.as_str()))
                .into(),
        }
    }
}

impl From<OxTerm> for Term {
    fn from(term: OxTerm) -> Self {
        match term {
            OxTerm::NamedNode(node) => Term::Iri(node.into_string()),
            OxTerm::BlankNode(node) => Term::Blank(node.into_string()),
            OxTerm::Literal(literal) => Term::Literal {
                value: literal.value().to_owned(),
                datatype: literal.datatype().as_str().to_owned(),
                language: literal.language().map(str::to_owned),
            },
            // Quoted triples only appear with RDF 1.2 support enabled.
            #[allow(unreachable_patterns)]
            other => Term::string(other.to_string()),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_oxigraph())
    }
}

/// One triple of a CONSTRUCT response.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawTriple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl RawTriple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

/// One row of a SELECT response. Unbound variables are absent.
pub type Solution = BTreeMap<String, Term>;

/// Executes protocol queries against one endpoint.
pub trait FactClient: Send + Sync {
    /// Endpoint identifier for logs and errors.
    fn endpoint(&self) -> &str;

    /// Run a CONSTRUCT query.
    fn construct<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<RawTriple>>>;

    /// Run a SELECT query.
    fn select<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<Solution>>>;
}

/// Open the client described by the endpoint configuration.
///
/// A local `dataset` takes precedence over `url`.
pub fn connect(config: &EndpointConfig) -> ClientResult<Arc<dyn FactClient>> {
    if let Some(dataset) = &config.dataset {
        let client = LocalStoreClient::from_file(dataset)?;
        tracing::info!(dataset = %dataset.display(), "serving from local dataset");
        return Ok(Arc::new(client));
    }
    match &config.url {
        Some(url) => {
            tracing::info!(endpoint = %url, name = %config.name, "using SPARQL endpoint");
            Ok(Arc::new(HttpFactClient::new(url, config)?))
        }
        None => Err(ClientError::Transport {
            endpoint: config.name.clone(),
            message: "no endpoint URL or dataset configured".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_ntriples_syntax() {
        assert_eq!(Term::iri("http://ex.org/a").to_string(), "<http://ex.org/a>");
        assert_eq!(
            Term::typed("4", crate::vocab::XSD_INTEGER).to_string(),
            "\"4\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(Term::lang_string("kočka", "cs").to_string(), "\"kočka\"@cs");
    }

    #[test]
    fn oxigraph_conversion_preserves_literals() {
        let original = Term::lang_string("chat", "fr");
        assert_eq!(Term::from(original.to_oxigraph()), original);
        let typed = Term::typed("true", crate::vocab::XSD_BOOLEAN);
        assert_eq!(Term::from(typed.to_oxigraph()), typed);
    }

    #[test]
    fn connect_without_source_fails() {
        let config = EndpointConfig::default();
        assert!(matches!(connect(&config), Err(ClientError::Transport { .. })));
    }
}
