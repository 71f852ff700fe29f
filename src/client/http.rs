//! SPARQL 1.1 protocol client over HTTP.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use oxigraph::io::{RdfFormat, RdfParser};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;

use crate::config::EndpointConfig;
use crate::error::{ClientError, ClientResult};
use crate::vocab::{RDF_LANG_STRING, XSD_STRING};

use super::{FactClient, RawTriple, Solution, Term};

const GRAPH_ACCEPT: &str = "application/n-triples, text/turtle;q=0.9";
const RESULTS_ACCEPT: &str = "application/sparql-results+json";

/// Talks to a remote endpoint with form-encoded POST requests.
pub struct HttpFactClient {
    url: String,
    http: reqwest::Client,
    max_retries: u32,
}

impl HttpFactClient {
    pub fn new(url: &str, config: &EndpointConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Transport {
                endpoint: url.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            url: url.to_string(),
            http,
            max_retries: config.max_retries,
        })
    }

    /// POST the query, retrying transport failures with linear backoff.
    async fn post(&self, query: &str, accept: &str) -> ClientResult<(Option<String>, Vec<u8>)> {
        let mut attempt = 0;
        loop {
            match self.post_once(query, accept).await {
                Err(ClientError::Transport { message, .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        endpoint = %self.url,
                        attempt,
                        error = %message,
                        "endpoint request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }

    async fn post_once(&self, query: &str, accept: &str) -> ClientResult<(Option<String>, Vec<u8>)> {
        let transport = |e: reqwest::Error| ClientError::Transport {
            endpoint: self.url.clone(),
            message: e.to_string(),
        };
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, accept)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ClientError::Rejected {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).chars().take(512).collect(),
            });
        }
        Ok((content_type, body.to_vec()))
    }
}

impl FactClient for HttpFactClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn construct<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<RawTriple>>> {
        Box::pin(async move {
            let (content_type, body) = self.post(query, GRAPH_ACCEPT).await?;
            let format = content_type
                .as_deref()
                .and_then(RdfFormat::from_media_type)
                .unwrap_or(RdfFormat::NTriples);
            parse_graph(format, &body)
        })
    }

    fn select<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<Solution>>> {
        Box::pin(async move {
            let (_, body) = self.post(query, RESULTS_ACCEPT).await?;
            parse_results_json(&body)
        })
    }
}

/// Parse a graph response body into raw triples.
pub(crate) fn parse_graph(format: RdfFormat, body: &[u8]) -> ClientResult<Vec<RawTriple>> {
    let mut triples = Vec::new();
    for quad in RdfParser::from_format(format).for_reader(body) {
        let quad = quad.map_err(|e| ClientError::Response {
            message: format!("invalid {} body: {e}", format.name()),
        })?;
        triples.push(RawTriple {
            subject: Term::from(oxigraph::model::Term::from(quad.subject)),
            predicate: quad.predicate.into_string(),
            object: Term::from(quad.object),
        });
    }
    Ok(triples)
}

// ---------------------------------------------------------------------------
// SPARQL 1.1 Query Results JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ResultsDocument {
    results: ResultsBody,
}

#[derive(Deserialize)]
struct ResultsBody {
    bindings: Vec<BTreeMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
    datatype: Option<String>,
}

impl From<JsonTerm> for Term {
    fn from(t: JsonTerm) -> Self {
        match t.kind.as_str() {
            "uri" => Term::Iri(t.value),
            "bnode" => Term::Blank(t.value),
            _ => match t.lang {
                Some(language) => Term::Literal {
                    value: t.value,
                    datatype: RDF_LANG_STRING.into(),
                    language: Some(language),
                },
                None => Term::typed(t.value, t.datatype.unwrap_or_else(|| XSD_STRING.into())),
            },
        }
    }
}

pub(crate) fn parse_results_json(body: &[u8]) -> ClientResult<Vec<Solution>> {
    let doc: ResultsDocument = serde_json::from_slice(body).map_err(|e| ClientError::Response {
        message: format!("invalid SPARQL JSON results: {e}"),
    })?;
    Ok(doc
        .results
        .bindings
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, Term::from(v))).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_json() {
        let body = br#"{
            "head": {"vars": ["s", "label", "n"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": "http://ex.org/a"},
                 "label": {"type": "literal", "value": "cat", "xml:lang": "en"},
                 "n": {"type": "typed-literal", "value": "4",
                       "datatype": "http://www.w3.org/2001/XMLSchema#integer"}},
                {"s": {"type": "bnode", "value": "b0"}}
            ]}
        }"#;
        let rows = parse_results_json(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["s"], Term::iri("http://ex.org/a"));
        assert_eq!(rows[0]["label"], Term::lang_string("cat", "en"));
        assert_eq!(rows[0]["n"], Term::typed("4", crate::vocab::XSD_INTEGER));
        assert_eq!(rows[1]["s"], Term::Blank("b0".into()));
        assert!(!rows[1].contains_key("label"));
    }

    #[test]
    fn plain_literal_defaults_to_string() {
        let body = br#"{"head":{"vars":["x"]},"results":{"bindings":[
            {"x":{"type":"literal","value":"v"}}]}}"#;
        let rows = parse_results_json(body).unwrap();
        assert_eq!(rows[0]["x"], Term::string("v"));
    }

    #[test]
    fn rejects_garbage_results() {
        assert!(matches!(
            parse_results_json(b"<html>"),
            Err(ClientError::Response { .. })
        ));
    }

    #[test]
    fn parses_ntriples_graph() {
        let body = b"<http://ex.org/a> <http://ex.org/p> \"x\"@en .\n_:b <http://ex.org/q> <http://ex.org/c> .\n";
        let triples = parse_graph(RdfFormat::NTriples, body).unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].subject, Term::iri("http://ex.org/a"));
        assert_eq!(triples[0].object, Term::lang_string("x", "en"));
        assert!(matches!(triples[1].subject, Term::Blank(_)));
    }
}
