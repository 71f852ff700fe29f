//! Dependency-driven probe scheduling.
//!
//! Init probes run first. Every non-empty batch of facts they produce is
//! appended to the accumulator and handed to the probes subscribed to its
//! kind; whatever those produce is queued in turn. The queue is processed
//! breadth first. Empty batches stop propagation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::client::FactClient;
use crate::config::ObservationConfig;
use crate::error::{ObserveError, ObserveResult};

use super::probe::{Probe, ProbeContext};
use super::probes::{
    AssociationProbe, AttributeProbe, ClassProbe, PropertyCountProbe, PropertyProbe, ScalarProbe,
};
use super::{FactBundle, ObservationKind, Observations, fact_count};

/// Registry of probes plus the scheduler that runs them.
#[derive(Default)]
pub struct ObservationOrchestrator {
    init: Vec<Arc<dyn Probe>>,
    subscribed: BTreeMap<ObservationKind, Vec<Arc<dyn Probe>>>,
}

impl ObservationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An orchestrator with the built-in probe chain registered.
    pub fn with_default_probes() -> Self {
        let mut orchestrator = Self::new();
        orchestrator.subscribe_init(Arc::new(ClassProbe));
        orchestrator.subscribe(Arc::new(PropertyProbe));
        orchestrator.subscribe(Arc::new(AttributeProbe));
        orchestrator.subscribe(Arc::new(AssociationProbe));
        orchestrator.subscribe(Arc::new(PropertyCountProbe));
        orchestrator.subscribe(Arc::new(ScalarProbe));
        orchestrator
    }

    /// Register a probe that runs without prerequisites.
    pub fn subscribe_init(&mut self, probe: Arc<dyn Probe>) {
        self.init.push(probe);
    }

    pub fn unsubscribe_init(&mut self, name: &str) {
        self.init.retain(|p| p.name() != name);
    }

    /// Register a probe under each of its trigger kinds.
    pub fn subscribe(&mut self, probe: Arc<dyn Probe>) {
        for trigger in probe.triggers() {
            self.subscribed
                .entry(*trigger)
                .or_default()
                .push(Arc::clone(&probe));
        }
    }

    /// Remove a triggered probe from every kind it was subscribed to.
    pub fn unsubscribe(&mut self, name: &str) {
        for probes in self.subscribed.values_mut() {
            probes.retain(|p| p.name() != name);
        }
    }

    /// Probes that would run for facts of `kind`.
    pub fn subscribers(&self, kind: ObservationKind) -> &[Arc<dyn Probe>] {
        self.subscribed.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fail with [`ObserveError::CyclicTriggerGraph`] if any probe can
    /// transitively trigger itself through declared `produces`/`triggers`.
    pub fn check_acyclic(&self) -> ObserveResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            probe: &Arc<dyn Probe>,
            subscribed: &BTreeMap<ObservationKind, Vec<Arc<dyn Probe>>>,
            marks: &mut BTreeMap<String, Mark>,
            path: &mut Vec<String>,
        ) -> ObserveResult<()> {
            let name = probe.name().to_string();
            match marks.get(&name).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    path.push(name);
                    return Err(ObserveError::CyclicTriggerGraph {
                        path: path.join(" -> "),
                    });
                }
                Mark::Unvisited => {}
            }
            marks.insert(name.clone(), Mark::InProgress);
            path.push(name.clone());
            for kind in probe.produces() {
                for next in subscribed.get(kind).into_iter().flatten() {
                    visit(next, subscribed, marks, path)?;
                }
            }
            path.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let roots = self
            .init
            .iter()
            .chain(self.subscribed.values().flatten());
        for probe in roots {
            visit(probe, &self.subscribed, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Run every reachable probe against the endpoint and return all facts.
    pub async fn run(
        &self,
        client: Arc<dyn FactClient>,
        config: &ObservationConfig,
    ) -> ObserveResult<Observations> {
        self.check_acyclic()?;

        let endpoint = client.endpoint().to_string();
        let ctx = ProbeContext::new(client, config.clone());
        tracing::info!(endpoint = %endpoint, init_probes = self.init.len(), "starting observation");

        let init_results =
            try_join_all(self.init.iter().map(|probe| run_probe(probe, &ctx, &[]))).await?;

        let mut queue: VecDeque<(usize, Observations)> =
            init_results.into_iter().map(|obs| (1, obs)).collect();
        let mut accumulated = Observations::new();

        while let Some((depth, batch)) = queue.pop_front() {
            for (kind, facts) in batch {
                if facts.is_empty() {
                    continue;
                }
                tracing::debug!(%kind, facts = facts.len(), depth, "new facts");
                let probes = self.subscribers(kind);
                if !probes.is_empty() && depth >= config.max_trigger_depth {
                    return Err(ObserveError::CyclicTriggerGraph {
                        path: format!(
                            "{kind} still triggering probes at depth {depth} (limit {})",
                            config.max_trigger_depth
                        ),
                    });
                }

                let results =
                    try_join_all(probes.iter().map(|probe| run_probe(probe, &ctx, &facts))).await?;
                accumulated.entry(kind).or_default().extend(facts);
                queue.extend(results.into_iter().map(|obs| (depth + 1, obs)));
            }
        }

        tracing::info!(facts = fact_count(&accumulated), "observation finished");
        Ok(accumulated)
    }
}

async fn run_probe(
    probe: &Arc<dyn Probe>,
    ctx: &ProbeContext,
    input: &[FactBundle],
) -> ObserveResult<Observations> {
    tracing::debug!(probe = probe.name(), input = input.len(), "running probe");
    let produced = probe
        .observe(ctx, input)
        .await
        .map_err(|e| ObserveError::Probe {
            probe: probe.name().to_string(),
            source: Box::new(e),
        })?;
    for (kind, facts) in &produced {
        if !facts.is_empty() && !probe.produces().contains(kind) {
            return Err(ObserveError::UndeclaredKind {
                probe: probe.name().to_string(),
                kind: kind.to_string(),
            });
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;

    use super::*;
    use crate::client::{LocalStoreClient, Term};
    use crate::error::QuarryResult;
    use crate::observe::Slot;

    /// Emits a fixed batch of facts and counts its invocations.
    struct StubProbe {
        name: &'static str,
        triggers: Vec<ObservationKind>,
        produces: Vec<ObservationKind>,
        emit: usize,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn new(
            name: &'static str,
            triggers: Vec<ObservationKind>,
            produces: Vec<ObservationKind>,
            emit: usize,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                triggers,
                produces,
                emit,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Probe for StubProbe {
        fn name(&self) -> &str {
            self.name
        }

        fn triggers(&self) -> &[ObservationKind] {
            &self.triggers
        }

        fn produces(&self) -> &[ObservationKind] {
            &self.produces
        }

        fn observe<'a>(
            &'a self,
            _ctx: &'a ProbeContext,
            input: &'a [FactBundle],
        ) -> BoxFuture<'a, QuarryResult<Observations>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let mut out = Observations::new();
                for kind in &self.produces {
                    let facts = (0..self.emit)
                        .map(|i| {
                            FactBundle::new(
                                *kind,
                                [(
                                    Slot::DescribedClass,
                                    Term::iri(format!("http://ex.org/{}/{i}/{}", self.name, input.len())),
                                )],
                            )
                        })
                        .collect();
                    out.insert(*kind, facts);
                }
                Ok(out)
            })
        }
    }

    fn client() -> Arc<dyn FactClient> {
        Arc::new(LocalStoreClient::in_memory().unwrap())
    }

    #[tokio::test]
    async fn propagates_through_the_trigger_chain() {
        use ObservationKind::*;
        let init = StubProbe::new("init", vec![], vec![ClassFact], 2);
        let props = StubProbe::new("props", vec![ClassFact], vec![PropertyExistenceFact], 3);
        let attrs = StubProbe::new("attrs", vec![PropertyExistenceFact], vec![AttributeFact], 1);

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(init.clone());
        orchestrator.subscribe(props.clone());
        orchestrator.subscribe(attrs.clone());

        let facts = orchestrator
            .run(client(), &ObservationConfig::default())
            .await
            .unwrap();
        assert_eq!(facts[&ClassFact].len(), 2);
        assert_eq!(facts[&PropertyExistenceFact].len(), 3);
        assert_eq!(facts[&AttributeFact].len(), 1);
        assert_eq!((init.calls(), props.calls(), attrs.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn empty_batches_do_not_trigger_subscribers() {
        use ObservationKind::*;
        let init = StubProbe::new("init", vec![], vec![ClassFact], 0);
        let props = StubProbe::new("props", vec![ClassFact], vec![PropertyExistenceFact], 3);

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(init.clone());
        orchestrator.subscribe(props.clone());

        let facts = orchestrator
            .run(client(), &ObservationConfig::default())
            .await
            .unwrap();
        assert_eq!(fact_count(&facts), 0);
        assert_eq!(init.calls(), 1);
        assert_eq!(props.calls(), 0);
    }

    #[tokio::test]
    async fn unsubscribed_probes_do_not_run() {
        use ObservationKind::*;
        let init = StubProbe::new("init", vec![], vec![ClassFact], 1);
        let props = StubProbe::new("props", vec![ClassFact], vec![PropertyExistenceFact], 1);

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(init.clone());
        orchestrator.subscribe(props.clone());
        orchestrator.unsubscribe("props");

        let facts = orchestrator
            .run(client(), &ObservationConfig::default())
            .await
            .unwrap();
        assert_eq!(facts[&ClassFact].len(), 1);
        assert!(!facts.contains_key(&PropertyExistenceFact));
        assert_eq!(props.calls(), 0);
    }

    #[tokio::test]
    async fn cycles_fail_before_any_probe_runs() {
        use ObservationKind::*;
        let init = StubProbe::new("init", vec![], vec![ClassFact], 1);
        let a = StubProbe::new("a", vec![ClassFact], vec![PropertyExistenceFact], 1);
        let b = StubProbe::new("b", vec![PropertyExistenceFact], vec![ClassFact], 1);

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(init.clone());
        orchestrator.subscribe(a);
        orchestrator.subscribe(b);

        match orchestrator.run(client(), &ObservationConfig::default()).await {
            Err(ObserveError::CyclicTriggerGraph { path }) => {
                assert!(path.contains("a") && path.contains("b"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert_eq!(init.calls(), 0);
    }

    #[tokio::test]
    async fn depth_guard_stops_long_chains() {
        use ObservationKind::*;
        let init = StubProbe::new("init", vec![], vec![ClassFact], 1);
        let props = StubProbe::new("props", vec![ClassFact], vec![PropertyExistenceFact], 1);
        let attrs = StubProbe::new("attrs", vec![PropertyExistenceFact], vec![AttributeFact], 1);

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(init);
        orchestrator.subscribe(props);
        orchestrator.subscribe(attrs);

        let config = ObservationConfig {
            max_trigger_depth: 2,
            ..Default::default()
        };
        assert!(matches!(
            orchestrator.run(client(), &config).await,
            Err(ObserveError::CyclicTriggerGraph { .. })
        ));
    }

    #[tokio::test]
    async fn undeclared_output_is_rejected() {
        use ObservationKind::*;
        struct Liar;
        impl Probe for Liar {
            fn name(&self) -> &str {
                "liar"
            }
            fn triggers(&self) -> &[ObservationKind] {
                &[]
            }
            fn produces(&self) -> &[ObservationKind] {
                &[]
            }
            fn observe<'a>(
                &'a self,
                _ctx: &'a ProbeContext,
                _input: &'a [FactBundle],
            ) -> BoxFuture<'a, QuarryResult<Observations>> {
                Box::pin(async {
                    let fact = FactBundle::new(
                        ClassFact,
                        [(Slot::DescribedClass, Term::iri("http://ex.org/x"))],
                    );
                    Ok(Observations::from([(ClassFact, vec![fact])]))
                })
            }
        }

        let mut orchestrator = ObservationOrchestrator::new();
        orchestrator.subscribe_init(Arc::new(Liar));
        assert!(matches!(
            orchestrator.run(client(), &ObservationConfig::default()).await,
            Err(ObserveError::UndeclaredKind { .. })
        ));
    }

    #[test]
    fn default_chain_is_acyclic() {
        let orchestrator = ObservationOrchestrator::with_default_probes();
        assert!(orchestrator.check_acyclic().is_ok());
        assert_eq!(orchestrator.subscribers(ObservationKind::PropertyExistenceFact).len(), 3);
    }
}
