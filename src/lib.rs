// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # quarry
//!
//! Infer a typed schema from an untyped SPARQL endpoint and serve it as a
//! GraphQL API.
//!
//! ## Architecture
//!
//! - **Fact clients** (`client`): SPARQL protocol over HTTP, or an in-process oxigraph store
//! - **Observation** (`observe`): probes that query the endpoint and emit typed facts
//! - **Model** (`model`): facts folded into classes, attributes and associations
//! - **Postprocessing** (`postprocess`): ordered hooks that name and adjust the model
//! - **Schema** (`schema`): the model compiled into a dynamic GraphQL schema
//! - **Resolvers** (`resolve`): GraphQL fields answered by SPARQL queries
//! - **Hot reload** (`reload`): rebuilds with a growing probe budget while serving
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quarry::client::LocalStoreClient;
//! use quarry::config::QuarryConfig;
//! use quarry::pipeline::Pipeline;
//!
//! # async fn run() -> quarry::error::QuarryResult<()> {
//! let client = LocalStoreClient::from_file("cats.ttl".as_ref())?;
//! let pipeline = Pipeline::new(Arc::new(client), QuarryConfig::default());
//! let served = pipeline.initial().await?;
//! println!("{}", served.schema.sdl());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod observe;
pub mod pipeline;
pub mod postprocess;
pub mod reload;
pub mod resolve;
pub mod schema;
pub mod vocab;
