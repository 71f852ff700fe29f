//! Observation -> model -> postprocess -> schema, as one unit.
//!
//! The first build may come from a model checkpoint; every later build (hot
//! reload) observes the endpoint again.

use std::sync::Arc;

use async_graphql::dynamic::Schema;

use crate::client::FactClient;
use crate::config::{ObservationConfig, QuarryConfig};
use crate::error::QuarryResult;
use crate::model::{DataModel, ModelBuilder, checkpoint};
use crate::observe::{ObservationOrchestrator, Observations, fact_count};
use crate::postprocess::PostprocessPipeline;
use crate::schema::SchemaCompiler;

/// A compiled schema together with the model and budget it came from.
pub struct ServedSchema {
    pub schema: Schema,
    pub model: Arc<DataModel>,
    pub observation: ObservationConfig,
    /// Incremented by every swap into a live schema.
    pub generation: u64,
}

impl std::fmt::Debug for ServedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServedSchema")
            .field("classes", &self.model.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

pub struct Pipeline {
    client: Arc<dyn FactClient>,
    config: QuarryConfig,
    orchestrator: ObservationOrchestrator,
    builder: ModelBuilder,
    postprocess: PostprocessPipeline,
}

impl Pipeline {
    /// Default probes and default postprocessing hooks.
    pub fn new(client: Arc<dyn FactClient>, config: QuarryConfig) -> Self {
        Self {
            client,
            config,
            orchestrator: ObservationOrchestrator::with_default_probes(),
            builder: ModelBuilder::new(),
            postprocess: PostprocessPipeline::default(),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: ObservationOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_postprocess(mut self, postprocess: PostprocessPipeline) -> Self {
        self.postprocess = postprocess;
        self
    }

    pub fn client(&self) -> &Arc<dyn FactClient> {
        &self.client
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    pub async fn observe(&self, observation: &ObservationConfig) -> QuarryResult<Observations> {
        let facts = self
            .orchestrator
            .run(Arc::clone(&self.client), observation)
            .await?;
        tracing::debug!(facts = fact_count(&facts), "observation finished");
        Ok(facts)
    }

    /// Build and postprocess a model from facts.
    pub fn model_from(&self, facts: &Observations) -> QuarryResult<DataModel> {
        let mut model = self.builder.build(facts)?;
        self.postprocess.run(&mut model);
        tracing::debug!(
            classes = model.len(),
            max_property_count = model.max_property_count(),
            "model built"
        );
        Ok(model)
    }

    pub async fn build_model(&self, observation: &ObservationConfig) -> QuarryResult<DataModel> {
        let facts = self.observe(observation).await?;
        self.model_from(&facts)
    }

    /// The model for the first schema: from the checkpoint when enabled and
    /// present, otherwise observed and then checkpointed.
    pub async fn initial_model(&self) -> QuarryResult<DataModel> {
        if let Some(model) = checkpoint::load_from_file(&self.config.model_checkpoint)? {
            return Ok(model);
        }
        let model = self.build_model(&self.config.observation).await?;
        checkpoint::save_to_file(&model, &self.config.model_checkpoint)?;
        Ok(model)
    }

    pub fn compile(&self, model: DataModel, observation: ObservationConfig) -> QuarryResult<ServedSchema> {
        let model = Arc::new(model);
        let compiler = SchemaCompiler::new(self.config.schema.clone(), observation.max_property_count);
        let schema = compiler.compile(Arc::clone(&model), Arc::clone(&self.client))?;
        Ok(ServedSchema {
            schema,
            model,
            observation,
            generation: 0,
        })
    }

    pub async fn initial(&self) -> QuarryResult<ServedSchema> {
        let model = self.initial_model().await?;
        self.compile(model, self.config.observation.clone())
    }

    /// A fresh build with `observation`; checkpoints are neither read nor written.
    pub async fn rebuild(&self, observation: ObservationConfig) -> QuarryResult<ServedSchema> {
        let model = self.build_model(&observation).await?;
        self.compile(model, observation)
    }
}
