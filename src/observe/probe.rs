//! The probe abstraction and the shared context probes run in.

use std::sync::Arc;

use futures_util::future::{BoxFuture, try_join_all};
use tokio::sync::Semaphore;

use crate::client::FactClient;
use crate::config::ObservationConfig;
use crate::error::{ClientError, QuarryResult};

use super::{FactBundle, FactCodec, ObservationKind, Observations, merge_observations};

/// A unit that queries the endpoint for one kind of fact.
///
/// A probe with no triggers is an init probe. A triggered probe receives
/// exactly the newly produced facts of the kind that triggered it.
pub trait Probe: Send + Sync {
    /// Unique name, used for subscription management and diagnostics.
    fn name(&self) -> &str;

    /// Observation kinds this probe consumes.
    fn triggers(&self) -> &[ObservationKind];

    /// Observation kinds this probe may produce.
    fn produces(&self) -> &[ObservationKind];

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>>;
}

/// Everything a probe needs to talk to the endpoint.
pub struct ProbeContext {
    client: Arc<dyn FactClient>,
    config: ObservationConfig,
    codec: FactCodec,
    permits: Arc<Semaphore>,
}

impl ProbeContext {
    pub fn new(client: Arc<dyn FactClient>, config: ObservationConfig) -> Self {
        let codec = FactCodec::new(config.ontology_prefix_iri.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            client,
            config,
            codec,
            permits,
        }
    }

    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    pub fn codec(&self) -> &FactCodec {
        &self.codec
    }

    /// `PREFIX` line for the observation vocabulary.
    pub fn prefix_declaration(&self) -> String {
        format!("PREFIX se: <{}>", self.config.ontology_prefix_iri)
    }

    /// Run one CONSTRUCT query and group its answer into facts.
    pub async fn construct(&self, query: &str) -> QuarryResult<Observations> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ClientError::Transport {
                endpoint: self.client.endpoint().to_string(),
                message: "probe worker pool was closed".into(),
            })?;
        let triples = self.client.construct(query).await?;
        Ok(self.codec.group(&triples)?)
    }

    /// Build one query per input fact and run them concurrently.
    ///
    /// `build` returns `None` for facts that need no query.
    pub async fn construct_each<F>(&self, input: &[FactBundle], build: F) -> QuarryResult<Observations>
    where
        F: Fn(&FactBundle) -> QuarryResult<Option<String>>,
    {
        let mut queries = Vec::with_capacity(input.len());
        for fact in input {
            if let Some(query) = build(fact)? {
                queries.push(query);
            }
        }
        let results = try_join_all(queries.iter().map(|q| self.construct(q))).await?;
        let mut merged = Observations::new();
        for result in results {
            merge_observations(&mut merged, result);
        }
        Ok(merged)
    }
}
