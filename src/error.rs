//! Rich diagnostic error types for quarry.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! so a failed observation run, a broken checkpoint or a rejected query argument
//! tells the user what went wrong and where to look.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for quarry.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum QuarryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Observe(#[from] ObserveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reload(#[from] ReloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Endpoint client errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("endpoint request to {endpoint} failed: {message}")]
    #[diagnostic(
        code(quarry::client::transport),
        help(
            "The SPARQL endpoint could not be reached. Check the endpoint URL, \
             your network connection, or raise `endpoint.timeout_secs`."
        )
    )]
    Transport { endpoint: String, message: String },

    #[error("endpoint {endpoint} rejected the query (HTTP {status}): {message}")]
    #[diagnostic(
        code(quarry::client::rejected),
        help(
            "The endpoint answered with an error status. Some public endpoints \
             limit query complexity; lowering `observation.property_sample_size` \
             or `observation.max_property_count` may help."
        )
    )]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("malformed endpoint response: {message}")]
    #[diagnostic(
        code(quarry::client::response),
        help("The endpoint returned a body that is not valid N-Triples or SPARQL JSON results.")
    )]
    Response { message: String },

    #[error("local store error: {message}")]
    #[diagnostic(
        code(quarry::client::store),
        help("The in-process store failed to load the dataset or evaluate the query.")
    )]
    Store { message: String },
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Fact codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    #[error("unknown observation vocabulary: {iri}")]
    #[diagnostic(
        code(quarry::codec::unknown_vocabulary),
        help(
            "A fact uses an observation kind or slot outside the known vocabulary. \
             Check that `observation.ontology_prefix_iri` matches the prefix the \
             facts were produced with."
        )
    )]
    UnknownObservationVocabulary { iri: String },

    #[error("subject {subject} declares no observation kind")]
    #[diagnostic(
        code(quarry::codec::missing_kind),
        help("Every fact subject must carry exactly one rdf:type triple naming its observation kind.")
    )]
    MissingObservationKind { subject: String },

    #[error("subject {subject} declares more than one observation kind")]
    #[diagnostic(
        code(quarry::codec::conflicting_kind),
        help("A fact subject must have exactly one observation kind.")
    )]
    ConflictingObservationKind { subject: String },

    #[error("fact encoding failed: {message}")]
    #[diagnostic(
        code(quarry::codec::syntax),
        help("The durable fact file must be valid N-Triples.")
    )]
    Syntax { message: String },
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Observation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ObserveError {
    #[error("probe trigger graph contains a cycle through: {path}")]
    #[diagnostic(
        code(quarry::observe::cyclic_trigger_graph),
        help(
            "A probe is (transitively) triggered by an observation kind it produces. \
             Unsubscribe one of the probes on the cycle."
        )
    )]
    CyclicTriggerGraph { path: String },

    #[error("probe {probe} failed")]
    #[diagnostic(code(quarry::observe::probe))]
    Probe {
        probe: String,
        #[source]
        source: Box<QuarryError>,
    },

    #[error("probe {probe} produced facts of undeclared kind {kind}")]
    #[diagnostic(
        code(quarry::observe::undeclared_kind),
        help("A probe must list every observation kind it can produce in `produces()`.")
    )]
    UndeclaredKind { probe: String, kind: String },
}

pub type ObserveResult<T> = std::result::Result<T, ObserveError>;

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("fact of kind {kind} is missing slot {slot}")]
    #[diagnostic(
        code(quarry::model::missing_slot),
        help("The fact bundle is incomplete. Re-run observation against the endpoint.")
    )]
    MissingSlot { kind: String, slot: String },

    #[error("slot {slot} holds an unusable value: {value}")]
    #[diagnostic(
        code(quarry::model::bad_slot_value),
        help("Class and property slots must be IRIs; count slots must be integer literals.")
    )]
    BadSlotValue { slot: String, value: String },
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

// ---------------------------------------------------------------------------
// Checkpoint errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint references unknown class {iri}")]
    #[diagnostic(
        code(quarry::checkpoint::dangling_class),
        help("The checkpoint is inconsistent. Delete it and rebuild the model from the endpoint.")
    )]
    DanglingClassReference { iri: String },

    #[error("checkpoint (de)serialization failed: {message}")]
    #[diagnostic(
        code(quarry::checkpoint::format),
        help("The checkpoint file is not a model written by this version of quarry.")
    )]
    Format { message: String },

    #[error("checkpoint I/O error at {path}: {message}")]
    #[diagnostic(
        code(quarry::checkpoint::io),
        help("Check that the checkpoint directory exists and is writable.")
    )]
    Io { path: String, message: String },

    #[error("checkpoint file {path} already exists")]
    #[diagnostic(
        code(quarry::checkpoint::exists),
        help("Set `model_checkpoint.overwrite_file = true`, or pass `--force` to `quarry model`, to replace it.")
    )]
    AlreadyExists { path: String },
}

pub type CheckpointResult<T> = std::result::Result<T, CheckpointError>;

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("the model contains no classes")]
    #[diagnostic(
        code(quarry::schema::empty_model),
        help("Observation found no typed instances. Check the endpoint URL and that its data uses rdf:type.")
    )]
    EmptyModel,

    #[error("duplicate {what} name {name}")]
    #[diagnostic(
        code(quarry::schema::duplicate_name),
        help("Name derivation hooks must produce unique type names and unique field names per type.")
    )]
    DuplicateName { what: String, name: String },

    #[error("association {association} on {class} targets unknown class id {target}")]
    #[diagnostic(
        code(quarry::schema::dangling_target),
        help("Every association target must be a class of the same model.")
    )]
    DanglingTarget {
        class: String,
        association: String,
        target: usize,
    },

    #[error("schema construction failed: {message}")]
    #[diagnostic(code(quarry::schema::build))]
    Build { message: String },

    #[error("failed to write schema definition to {path}: {message}")]
    #[diagnostic(code(quarry::schema::io))]
    Io { path: String, message: String },
}

pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

// ---------------------------------------------------------------------------
// Resolver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("invalid sort direction {value:?}")]
    #[diagnostic(
        code(quarry::resolve::invalid_sort),
        help("`sort` accepts only \"ASC\" or \"DESC\".")
    )]
    InvalidSort { value: String },

    #[error("type {class} has no field {field}")]
    #[diagnostic(
        code(quarry::resolve::unknown_field),
        help("The requested field does not exist on this type.")
    )]
    UnknownField { class: String, field: String },

    #[error("invalid resource identifier {value:?}")]
    #[diagnostic(
        code(quarry::resolve::invalid_identifier),
        help("Identifiers passed to `filter` must be absolute IRIs without spaces, quotes or angle brackets.")
    )]
    InvalidIdentifier { value: String },

    #[error("class #{class} is not part of the served model")]
    #[diagnostic(
        code(quarry::resolve::unknown_class),
        help("A resolver was compiled against a different model than the one it is serving.")
    )]
    UnknownClass { class: usize },

    #[error("could not determine the concrete type of {identifier}")]
    #[diagnostic(
        code(quarry::resolve::unresolved_type),
        help("The target resource has no rdf:type among the association's candidate classes.")
    )]
    UnresolvedType { identifier: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

// ---------------------------------------------------------------------------
// Hot-reload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReloadError {
    #[error("hot-reload iteration {iteration} failed")]
    #[diagnostic(
        code(quarry::reload::iteration),
        help("Hot reload has stopped; the previously served schema remains active.")
    )]
    Iteration {
        iteration: usize,
        #[source]
        source: Box<QuarryError>,
    },
}

pub type ReloadResult<T> = std::result::Result<T, ReloadError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    #[diagnostic(code(quarry::config::io))]
    Io { path: String, message: String },

    #[error("invalid config file {path}: {message}")]
    #[diagnostic(
        code(quarry::config::parse),
        help("See the `QuarryConfig` documentation for the accepted TOML keys.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(quarry::config::invalid))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias used across the crate.
pub type QuarryResult<T> = std::result::Result<T, QuarryError>;
