//! Configuration for observation, schema compilation, serving and hot reload.
//!
//! Configuration is plain data loaded from a TOML file (every key optional) and
//! passed explicitly down the call chain. CLI flags are merged in through
//! [`ObservationOverrides`] and [`apply_defaults`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Namespace of the observation vocabulary used by the built-in probes.
pub const DEFAULT_ONTOLOGY_PREFIX: &str = "http://skodapetr.eu/ontology/sparql-endpoint/";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuarryConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub observation: ObservationConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hot_reload: HotReloadConfig,
    #[serde(default)]
    pub model_checkpoint: CheckpointConfig,
}

impl QuarryConfig {
    /// Load a configuration file. Missing keys take their defaults.
    ///
    /// Not validated: CLI flags may still supply the endpoint.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Reject values that can never work.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.url.is_none() && self.endpoint.dataset.is_none() {
            return Err(ConfigError::Invalid {
                message: "either endpoint.url or endpoint.dataset must be set".into(),
            });
        }
        if self.observation.max_concurrency == 0 || self.schema.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "max_concurrency must be at least 1".into(),
            });
        }
        if self.observation.property_sample_size == 0 {
            return Err(ConfigError::Invalid {
                message: "observation.property_sample_size must be at least 1".into(),
            });
        }
        if self.hot_reload.property_count_multiplier < 2 {
            return Err(ConfigError::Invalid {
                message: "hot_reload.property_count_multiplier must be at least 2".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where facts come from: a remote SPARQL endpoint or a local RDF file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    /// SPARQL 1.1 protocol endpoint URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Human-readable endpoint name, used in logs and the health report.
    #[serde(default = "default_endpoint_name")]
    pub name: String,
    /// Turtle or N-Triples file served from an in-process store instead of `url`.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for transport failures (not for rejected queries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_endpoint_name() -> String {
    "endpoint".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            name: default_endpoint_name(),
            dataset: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Probe budget knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationConfig {
    #[serde(default = "default_ontology_prefix_iri")]
    pub ontology_prefix_iri: String,
    /// Ceiling for property counting. `None` counts without a ceiling,
    /// written as `0` in TOML.
    #[serde(
        default = "default_max_property_count",
        deserialize_with = "zero_is_unbounded",
        serialize_with = "unbounded_is_zero"
    )]
    pub max_property_count: Option<u64>,
    /// How many values to sample per property when inferring types.
    #[serde(default = "default_property_sample_size")]
    pub property_sample_size: u64,
    #[serde(default = "default_true")]
    pub should_count_properties: bool,
    #[serde(default = "default_true")]
    pub should_detect_non_array_properties: bool,
    /// Maximum number of probe queries in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Longest allowed chain of triggered probes.
    #[serde(default = "default_max_trigger_depth")]
    pub max_trigger_depth: usize,
}

fn default_ontology_prefix_iri() -> String {
    DEFAULT_ONTOLOGY_PREFIX.into()
}
fn default_max_property_count() -> Option<u64> {
    Some(1000)
}
fn zero_is_unbounded<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ceiling = u64::deserialize(deserializer)?;
    Ok((ceiling > 0).then_some(ceiling))
}
fn unbounded_is_zero<S>(ceiling: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(ceiling.unwrap_or(0))
}
fn default_property_sample_size() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_max_concurrency() -> usize {
    8
}
fn default_max_trigger_depth() -> usize {
    16
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            ontology_prefix_iri: default_ontology_prefix_iri(),
            max_property_count: default_max_property_count(),
            property_sample_size: default_property_sample_size(),
            should_count_properties: true,
            should_detect_non_array_properties: true,
            max_concurrency: default_max_concurrency(),
            max_trigger_depth: default_max_trigger_depth(),
        }
    }
}

/// Partial observation settings, typically from CLI flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationOverrides {
    pub ontology_prefix_iri: Option<String>,
    pub max_property_count: Option<Option<u64>>,
    pub property_sample_size: Option<u64>,
    pub should_count_properties: Option<bool>,
    pub should_detect_non_array_properties: Option<bool>,
    pub max_concurrency: Option<usize>,
}

/// Merge overrides on top of a base configuration.
pub fn apply_defaults(base: ObservationConfig, overrides: ObservationOverrides) -> ObservationConfig {
    ObservationConfig {
        ontology_prefix_iri: overrides
            .ontology_prefix_iri
            .unwrap_or(base.ontology_prefix_iri),
        max_property_count: overrides
            .max_property_count
            .unwrap_or(base.max_property_count),
        property_sample_size: overrides
            .property_sample_size
            .unwrap_or(base.property_sample_size),
        should_count_properties: overrides
            .should_count_properties
            .unwrap_or(base.should_count_properties),
        should_detect_non_array_properties: overrides
            .should_detect_non_array_properties
            .unwrap_or(base.should_detect_non_array_properties),
        max_concurrency: overrides.max_concurrency.unwrap_or(base.max_concurrency),
        max_trigger_depth: base.max_trigger_depth,
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaConfig {
    /// When false, root queries only return instances that have every selected field.
    #[serde(default)]
    pub are_root_properties_optional: bool,
    /// Where to write the generated schema definition, if anywhere.
    #[serde(default)]
    pub graphql_schema_output_path: Option<PathBuf>,
    /// Maximum number of per-subject fetch queries in flight for one field.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            are_root_properties_optional: false,
            graphql_schema_output_path: None,
            max_concurrency: default_max_concurrency(),
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hot reload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotReloadConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Factor applied to the probe budget on each iteration.
    #[serde(default = "default_multiplier")]
    pub property_count_multiplier: u64,
    /// Upper bound on reload iterations. `None` runs until convergence.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

fn default_multiplier() -> u64 {
    10
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            property_count_multiplier: default_multiplier(),
            max_iterations: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Model checkpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub load_model_from_checkpoint: bool,
    #[serde(default)]
    pub save_model_to_file: bool,
    #[serde(default)]
    pub overwrite_file: bool,
    #[serde(default = "default_checkpoint_file_path")]
    pub checkpoint_file_path: PathBuf,
}

fn default_checkpoint_file_path() -> PathBuf {
    PathBuf::from("model-checkpoint.json")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            load_model_from_checkpoint: false,
            save_model_to_file: false,
            overwrite_file: false,
            checkpoint_file_path: default_checkpoint_file_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_takes_defaults() {
        let cfg: QuarryConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, QuarryConfig::default());
        assert_eq!(cfg.observation.max_property_count, Some(1000));
        assert_eq!(cfg.observation.ontology_prefix_iri, DEFAULT_ONTOLOGY_PREFIX);
        assert_eq!(cfg.server.port, 4000);
        assert!(!cfg.hot_reload.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: QuarryConfig = toml::from_str(
            r#"
            [endpoint]
            url = "https://example.org/sparql"

            [observation]
            property_sample_size = 50
            should_count_properties = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.endpoint.url.as_deref(), Some("https://example.org/sparql"));
        assert_eq!(cfg.endpoint.timeout_secs, 60);
        assert_eq!(cfg.observation.property_sample_size, 50);
        assert!(!cfg.observation.should_count_properties);
        assert!(cfg.observation.should_detect_non_array_properties);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_requires_a_source() {
        let cfg = QuarryConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = ObservationConfig::default();
        let merged = apply_defaults(
            base.clone(),
            ObservationOverrides {
                max_property_count: Some(None),
                max_concurrency: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(merged.max_property_count, None);
        assert_eq!(merged.max_concurrency, 2);
        assert_eq!(merged.property_sample_size, base.property_sample_size);
        assert_eq!(merged.ontology_prefix_iri, base.ontology_prefix_iri);
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[observation]\nmax_concurrency = \"lots\"\n").unwrap();
        match QuarryConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert!(p.ends_with("quarry.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn zero_ceiling_means_unbounded_counting() {
        let cfg: QuarryConfig = toml::from_str("[observation]\nmax_property_count = 0\n").unwrap();
        assert_eq!(cfg.observation.max_property_count, None);

        let cfg: QuarryConfig = toml::from_str("[observation]\nmax_property_count = 50\n").unwrap();
        assert_eq!(cfg.observation.max_property_count, Some(50));

        let unbounded = ObservationConfig {
            max_property_count: None,
            ..Default::default()
        };
        let text = toml::to_string(&unbounded).unwrap();
        assert!(text.contains("max_property_count = 0"));
        let back: ObservationConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, unbounded);
    }
}
