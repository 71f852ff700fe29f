//! quarry CLI: observe a SPARQL endpoint, build its model, print or query its schema.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use quarry::client;
use quarry::config::{ObservationOverrides, QuarryConfig, apply_defaults};
use quarry::model::{DataModel, ModelBuilder, checkpoint};
use quarry::observe::{FactCodec, fact_count};
use quarry::pipeline::Pipeline;
use quarry::postprocess::PostprocessPipeline;

#[derive(Parser)]
#[command(
    name = "quarry",
    version,
    about = "Infer a GraphQL schema from a SPARQL endpoint"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SPARQL endpoint URL.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Turtle or N-Triples file to serve from an in-process store instead.
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(flatten)]
    observation: ObservationFlags,

    #[command(subcommand)]
    command: Commands,
}

/// Probe budget overrides.
#[derive(Args)]
struct ObservationFlags {
    /// Namespace of the observation vocabulary.
    #[arg(long, global = true)]
    ontology_prefix: Option<String>,

    /// Ceiling for property counting (0 counts without a ceiling).
    #[arg(long, global = true, conflicts_with = "unbounded_count")]
    max_property_count: Option<u64>,

    /// Count properties without a ceiling.
    #[arg(long, global = true)]
    unbounded_count: bool,

    /// Values sampled per property when inferring types.
    #[arg(long, global = true)]
    sample_size: Option<u64>,

    /// Skip property counting (and with it scalar detection).
    #[arg(long, global = true)]
    no_count: bool,

    /// Treat every property as a list.
    #[arg(long, global = true)]
    no_scalar_detection: bool,

    /// Maximum probe queries in flight.
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

impl ObservationFlags {
    fn overrides(&self) -> ObservationOverrides {
        let max_property_count = if self.unbounded_count {
            Some(None)
        } else {
            self.max_property_count.map(|n| (n > 0).then_some(n))
        };
        ObservationOverrides {
            ontology_prefix_iri: self.ontology_prefix.clone(),
            max_property_count,
            property_sample_size: self.sample_size,
            should_count_properties: self.no_count.then_some(false),
            should_detect_non_array_properties: self.no_scalar_detection.then_some(false),
            max_concurrency: self.concurrency,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probes and write the observed facts as N-Triples.
    Observe {
        /// Output file (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Build the data model and write it as a checkpoint.
    Model {
        /// Build from facts written by `observe` instead of querying the endpoint.
        #[arg(long)]
        facts: Option<PathBuf>,

        /// Checkpoint file to write.
        #[arg(long, default_value = "model-checkpoint.json")]
        output: PathBuf,

        /// Replace an existing checkpoint.
        #[arg(long)]
        force: bool,
    },

    /// Print the generated GraphQL schema.
    Schema {
        /// Compile from a checkpoint instead of observing the endpoint.
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Also write the schema to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run one GraphQL query and print the JSON response.
    Query {
        /// The GraphQL document.
        query: String,

        /// Variables as a JSON object.
        #[arg(long)]
        variables: Option<String>,

        /// Compile from a checkpoint instead of observing the endpoint.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Observe { output } => {
            let config = load_config(&cli, true)?;
            let pipeline = Pipeline::new(client::connect(&config.endpoint)?, config.clone());
            let facts = pipeline.observe(&config.observation).await?;
            let text = FactCodec::new(&config.observation.ontology_prefix_iri).encode(&facts);
            match output {
                Some(path) => {
                    std::fs::write(path, text).into_diagnostic()?;
                    eprintln!("Wrote {} facts to {}", fact_count(&facts), path.display());
                }
                None => print!("{text}"),
            }
        }

        Commands::Model {
            facts,
            output,
            force,
        } => {
            let model = match facts {
                Some(path) => {
                    let config = load_config(&cli, false)?;
                    let text = std::fs::read_to_string(path).into_diagnostic()?;
                    let facts = FactCodec::new(&config.observation.ontology_prefix_iri).decode(&text)?;
                    let mut model = ModelBuilder::new().build(&facts)?;
                    PostprocessPipeline::default().run(&mut model);
                    model
                }
                None => {
                    let config = load_config(&cli, true)?;
                    let pipeline = Pipeline::new(client::connect(&config.endpoint)?, config.clone());
                    pipeline.build_model(&config.observation).await?
                }
            };
            checkpoint::write(&model, output, *force)?;
            println!("Wrote model with {} classes to {}", model.len(), output.display());
            print_model(&model);
        }

        Commands::Schema {
            checkpoint: from_checkpoint,
            output,
        } => {
            let mut config = load_config(&cli, from_checkpoint.is_none())?;
            if output.is_some() {
                config.schema.graphql_schema_output_path = output.clone();
            }
            let pipeline = pipeline_for(config, from_checkpoint.is_some())?;
            let served = match from_checkpoint {
                Some(path) => {
                    let model = checkpoint::read(path)?;
                    pipeline.compile(model, pipeline.config().observation.clone())?
                }
                None => pipeline.initial().await?,
            };
            println!("{}", served.schema.sdl());
        }

        Commands::Query {
            query,
            variables,
            checkpoint: from_checkpoint,
        } => {
            // Resolvers always need the endpoint, even when the model is checkpointed.
            let config = load_config(&cli, true)?;
            let pipeline = pipeline_for(config, false)?;
            let served = match from_checkpoint {
                Some(path) => {
                    let model = checkpoint::read(path)?;
                    pipeline.compile(model, pipeline.config().observation.clone())?
                }
                None => pipeline.initial().await?,
            };
            let mut request = async_graphql::Request::new(query.as_str());
            if let Some(variables) = variables {
                let json: serde_json::Value = serde_json::from_str(variables).into_diagnostic()?;
                request = request.variables(async_graphql::Variables::from_json(json));
            }
            let response = served.schema.execute(request).await;
            println!("{}", serde_json::to_string_pretty(&response).into_diagnostic()?);
            if response.is_err() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// The configuration file (or defaults) with CLI flags on top.
fn load_config(cli: &Cli, needs_endpoint: bool) -> Result<QuarryConfig> {
    let mut config = match &cli.config {
        Some(path) => QuarryConfig::load(path)?,
        None => QuarryConfig::default(),
    };
    if cli.endpoint.is_some() {
        config.endpoint.url = cli.endpoint.clone();
    }
    if cli.dataset.is_some() {
        config.endpoint.dataset = cli.dataset.clone();
    }
    config.observation = apply_defaults(config.observation, cli.observation.overrides());
    if needs_endpoint {
        config.validate()?;
    }
    Ok(config)
}

/// A pipeline over the configured endpoint. Offline compilation gets an empty
/// in-process store so no endpoint is contacted.
fn pipeline_for(config: QuarryConfig, offline: bool) -> Result<Pipeline> {
    let client: Arc<dyn client::FactClient> = if offline {
        Arc::new(client::LocalStoreClient::in_memory()?)
    } else {
        client::connect(&config.endpoint)?
    };
    Ok(Pipeline::new(client, config))
}

fn print_model(model: &DataModel) {
    for class in model.classes() {
        println!(
            "  {} ({} instances) <{}>",
            class.name, class.instance_count, class.iri
        );
        for attribute in &class.attributes {
            let types: Vec<&str> = attribute.types.iter().map(String::as_str).collect();
            println!(
                "    .{}{} : {}",
                attribute.property.name,
                if attribute.property.is_array { "[]" } else { "" },
                types.join(" | ")
            );
        }
        for association in &class.associations {
            let targets: Vec<&str> = association
                .target_classes
                .iter()
                .filter_map(|id| model.class(*id).map(|c| c.name.as_str()))
                .collect();
            println!(
                "    .{}{} -> {}",
                association.property.name,
                if association.property.is_array { "[]" } else { "" },
                targets.join(" | ")
            );
        }
    }
}
