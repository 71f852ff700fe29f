//! In-process endpoint backed by an oxigraph store.
//!
//! Serves an RDF file without a network hop. Used for offline schema inference
//! and by the integration tests.

use std::path::Path;

use futures_util::future::BoxFuture;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{ClientError, ClientResult};

use super::{FactClient, RawTriple, Solution, Term};

/// A [`FactClient`] that evaluates queries against an in-memory store.
#[derive(Clone)]
pub struct LocalStoreClient {
    store: Store,
    label: String,
}

impl LocalStoreClient {
    /// Create an empty in-memory store.
    pub fn in_memory() -> ClientResult<Self> {
        let store = Store::new().map_err(|e| ClientError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self {
            store,
            label: "local:memory".into(),
        })
    }

    /// Load a Turtle, N-Triples or other RDF file chosen by extension.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .unwrap_or(RdfFormat::Turtle);
        let data = std::fs::read(path).map_err(|e| ClientError::Store {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let mut client = Self::in_memory()?;
        client.label = format!("local:{}", path.display());
        client.load(format, &data)?;
        Ok(client)
    }

    /// Parse `data` and insert every quad into the store.
    pub fn load(&self, format: RdfFormat, data: &[u8]) -> ClientResult<usize> {
        let mut count = 0;
        for quad in RdfParser::from_format(format).for_reader(data) {
            let quad = quad.map_err(|e| ClientError::Store {
                message: format!("parse failed: {e}"),
            })?;
            self.store.insert(&quad).map_err(|e| ClientError::Store {
                message: format!("insert failed: {e}"),
            })?;
            count += 1;
        }
        tracing::debug!(quads = count, "loaded dataset into local store");
        Ok(count)
    }

    /// Convenience for tests and fixtures.
    pub fn load_turtle(&self, turtle: &str) -> ClientResult<usize> {
        self.load(RdfFormat::Turtle, turtle.as_bytes())
    }

    async fn evaluate<T, F>(&self, query: &str, shape: F) -> ClientResult<T>
    where
        T: Send + 'static,
        F: FnOnce(QueryResults) -> ClientResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || {
            let results = store.query(query.as_str()).map_err(|e| ClientError::Store {
                message: format!("SPARQL query failed: {e}"),
            })?;
            shape(results)
        })
        .await
        .map_err(|e| ClientError::Store {
            message: format!("query task failed: {e}"),
        })?
    }
}

fn collect_graph(results: QueryResults) -> ClientResult<Vec<RawTriple>> {
    match results {
        QueryResults::Graph(triples) => {
            let mut out = Vec::new();
            for triple in triples {
                let triple = triple.map_err(|e| ClientError::Store {
                    message: format!("triple error: {e}"),
                })?;
                out.push(RawTriple {
                    subject: Term::from(oxigraph::model::Term::from(triple.subject)),
                    predicate: triple.predicate.into_string(),
                    object: Term::from(triple.object),
                });
            }
            Ok(out)
        }
        _ => Err(ClientError::Store {
            message: "expected a graph result from CONSTRUCT query".into(),
        }),
    }
}

fn collect_solutions(results: QueryResults) -> ClientResult<Vec<Solution>> {
    match results {
        QueryResults::Solutions(solutions) => {
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|e| ClientError::Store {
                    message: format!("solution error: {e}"),
                })?;
                let row: Solution = solution
                    .iter()
                    .map(|(var, term)| (var.as_str().to_string(), Term::from(term.clone())))
                    .collect();
                rows.push(row);
            }
            Ok(rows)
        }
        _ => Err(ClientError::Store {
            message: "expected solutions from SELECT query".into(),
        }),
    }
}

impl FactClient for LocalStoreClient {
    fn endpoint(&self) -> &str {
        &self.label
    }

    fn construct<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<RawTriple>>> {
        Box::pin(self.evaluate(query, collect_graph))
    }

    fn select<'a>(&'a self, query: &'a str) -> BoxFuture<'a, ClientResult<Vec<Solution>>> {
        Box::pin(self.evaluate(query, collect_solutions))
    }
}
