//! Hot reload: rebuild the schema with a growing probe budget while serving.
//!
//! Requests read the live schema through [`LiveSchema::current`], which hands
//! out an `Arc` to one complete [`ServedSchema`]. A reload builds the next
//! schema off to the side and swaps the `Arc` in one write, so a request sees
//! either the old schema or the new one, never a mix.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, watch};

use crate::config::{HotReloadConfig, ObservationConfig};
use crate::error::{ReloadError, ReloadResult};
use crate::model::DataModel;
use crate::pipeline::{Pipeline, ServedSchema};

// ---------------------------------------------------------------------------
// Live schema
// ---------------------------------------------------------------------------

/// The schema currently being served.
pub struct LiveSchema {
    current: RwLock<Arc<ServedSchema>>,
}

impl LiveSchema {
    pub fn new(initial: ServedSchema) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub async fn current(&self) -> Arc<ServedSchema> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the served schema, bumping its generation. Returns the new one.
    pub async fn swap(&self, mut next: ServedSchema) -> Arc<ServedSchema> {
        let mut current = self.current.write().await;
        next.generation = current.generation + 1;
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        tracing::info!(generation = next.generation, classes = next.model.len(), "swapped live schema");
        next
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReloadState {
    Idle,
    Reloading { iteration: usize },
    Stopped { reason: StopReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Disabled,
    /// The convergence predicate asked to stop.
    Converged,
    IterationLimit,
    Shutdown,
    Failed(String),
}

/// Derives the next probe budget from the previous one.
pub type Escalation = Box<dyn Fn(&ObservationConfig) -> ObservationConfig + Send + Sync>;

/// Given the previous and the new model, whether to keep reloading.
pub type Convergence = Box<dyn Fn(&DataModel, &DataModel) -> bool + Send + Sync>;

/// Multiply the property count cap and the sample size by `multiplier`.
pub fn escalate_by(multiplier: u64) -> Escalation {
    Box::new(move |previous| ObservationConfig {
        max_property_count: previous.max_property_count.map(|n| n.saturating_mul(multiplier)),
        property_sample_size: previous.property_sample_size.saturating_mul(multiplier),
        ..previous.clone()
    })
}

/// Keep going while the largest property count in the model still grows.
pub fn max_count_increased(previous: &DataModel, next: &DataModel) -> bool {
    next.max_property_count() > previous.max_property_count()
}

/// Drives repeated rebuilds: Idle -> Reloading -> (Idle | Stopped).
pub struct HotReloadController {
    pipeline: Arc<Pipeline>,
    live: Arc<LiveSchema>,
    config: HotReloadConfig,
    escalate: Escalation,
    should_continue: Convergence,
    state: watch::Sender<ReloadState>,
    shutdown: watch::Receiver<bool>,
}

impl HotReloadController {
    /// Default escalation and convergence from `config`.
    pub fn new(
        pipeline: Arc<Pipeline>,
        live: Arc<LiveSchema>,
        config: HotReloadConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state, _) = watch::channel(ReloadState::Idle);
        Self {
            pipeline,
            live,
            escalate: escalate_by(config.property_count_multiplier),
            should_continue: Box::new(max_count_increased),
            config,
            state,
            shutdown,
        }
    }

    pub fn with_escalation(mut self, escalate: Escalation) -> Self {
        self.escalate = escalate;
        self
    }

    pub fn with_convergence(mut self, should_continue: Convergence) -> Self {
        self.should_continue = should_continue;
        self
    }

    /// Follow state changes. Valid after `run` consumes the controller.
    pub fn state(&self) -> watch::Receiver<ReloadState> {
        self.state.subscribe()
    }

    fn stop(&self, reason: StopReason) -> StopReason {
        tracing::info!(reason = ?reason, "hot reload stopped");
        self.state.send_replace(ReloadState::Stopped { reason: reason.clone() });
        reason
    }

    /// Reload until disabled, converged, limited, shut down or failed.
    ///
    /// A failed iteration leaves the served schema untouched.
    pub async fn run(mut self) -> ReloadResult<StopReason> {
        if !self.config.enabled {
            return Ok(self.stop(StopReason::Disabled));
        }

        let mut iteration = 0;
        loop {
            if *self.shutdown.borrow() {
                return Ok(self.stop(StopReason::Shutdown));
            }
            if self.config.max_iterations.is_some_and(|max| iteration >= max) {
                return Ok(self.stop(StopReason::IterationLimit));
            }
            iteration += 1;

            let previous = self.live.current().await;
            let observation = (self.escalate)(&previous.observation);
            tracing::info!(
                iteration,
                max_property_count = ?observation.max_property_count,
                property_sample_size = observation.property_sample_size,
                "hot reload iteration"
            );
            self.state.send_replace(ReloadState::Reloading { iteration });

            let pipeline = Arc::clone(&self.pipeline);
            let result = tokio::select! {
                result = pipeline.rebuild(observation) => Some(result),
                _ = self.shutdown.changed() => None,
            };
            let next = match result {
                None => return Ok(self.stop(StopReason::Shutdown)),
                Some(Ok(next)) => next,
                Some(Err(e)) => {
                    tracing::error!(iteration, error = %e, "hot reload iteration failed");
                    self.stop(StopReason::Failed(e.to_string()));
                    return Err(ReloadError::Iteration {
                        iteration,
                        source: Box::new(e),
                    });
                }
            };

            let next = self.live.swap(next).await;
            if !(self.should_continue)(&previous.model, &next.model) {
                return Ok(self.stop(StopReason::Converged));
            }
            self.state.send_replace(ReloadState::Idle);
        }
    }
}
