//! Request-time query translation.
//!
//! Every schema field is backed by a [`FieldResolver`]. Class resolvers turn a
//! field selection into an identifier-discovery query plus one property-fetch
//! query per instance, association resolvers delegate to class resolvers
//! pinned to one identifier, and scalar resolvers only reshape values the
//! parent instance already holds. The output is a [`FieldOutput`] tree that the
//! schema layer converts into GraphQL values.

pub mod association;
pub mod class;
pub mod paginate;
pub mod query;
pub mod scalar;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::client::{FactClient, Solution, Term};
use crate::error::{ClientError, ResolveError, ResolveResult};
use crate::model::{ClassDescriptor, ClassId, DataModel};
use crate::postprocess::names::{SOURCE_IDENTIFIER_FIELD, SOURCE_KIND_FIELD};

pub use association::{MonomorphicAssociationResolver, PolymorphicAssociationResolver};
pub use class::ClassFieldResolver;
pub use paginate::{PaginatedResolver, paginate};
pub use scalar::{LangStringFieldResolver, ScalarFieldResolver, ScalarKind};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = ResolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(ResolveError::InvalidSort {
                value: other.to_string(),
            }),
        }
    }
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Validated `limit`, `offset`, `sort` and `filter` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<SortDirection>,
    /// Only the instance with this identifier.
    pub filter: Option<String>,
}

impl ListArgs {
    /// Validate raw argument values. Negative numbers clamp to zero.
    pub fn parse(
        limit: Option<i64>,
        offset: Option<i64>,
        sort: Option<&str>,
        filter: Option<&str>,
    ) -> ResolveResult<Self> {
        let sort = sort.map(SortDirection::from_str).transpose()?;
        let filter = filter
            .map(|f| query::validate_iri(f).map(str::to_string))
            .transpose()?;
        Ok(Self {
            limit: limit.map(|n| usize::try_from(n).unwrap_or(0)),
            offset: offset.map(|n| usize::try_from(n).unwrap_or(0)),
            sort,
            filter,
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One instance fetched from the endpoint, keyed by schema field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedInstance {
    pub identifier: String,
    pub class: ClassId,
    pub class_iri: String,
    pub values: BTreeMap<String, Vec<Term>>,
}

impl ShapedInstance {
    pub fn new(identifier: impl Into<String>, class: &ClassDescriptor) -> Self {
        Self {
            identifier: identifier.into(),
            class: class.id,
            class_iri: class.iri.clone(),
            values: BTreeMap::new(),
        }
    }

    /// Raw values of one field, empty when the field was not fetched.
    pub fn values(&self, field: &str) -> &[Term] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalarValue {
    Boolean(bool),
    Int(i64),
    String(String),
}

/// What a resolver hands back to the schema layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutput {
    Null,
    Value(ScalarValue),
    Instance(ShapedInstance),
    /// Values grouped by language field name.
    LangString(BTreeMap<String, FieldOutput>),
    List(Vec<FieldOutput>),
}

impl FieldOutput {
    /// A single value or a list, depending on the field's cardinality.
    pub fn from_values(mut values: Vec<FieldOutput>, is_array: bool) -> Self {
        if is_array {
            FieldOutput::List(values)
        } else if values.is_empty() {
            FieldOutput::Null
        } else {
            values.swap_remove(0)
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            FieldOutput::Instance(instance) => Some(&instance.identifier),
            _ => None,
        }
    }

    /// Instances by identifier, scalars by value.
    pub fn compare(a: &FieldOutput, b: &FieldOutput) -> Ordering {
        match (a, b) {
            (FieldOutput::Instance(x), FieldOutput::Instance(y)) => x.identifier.cmp(&y.identifier),
            (FieldOutput::Value(x), FieldOutput::Value(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver plumbing
// ---------------------------------------------------------------------------

/// Everything resolvers share while one schema is served.
pub struct ResolveContext {
    client: Arc<dyn FactClient>,
    model: Arc<DataModel>,
    permits: Arc<Semaphore>,
}

impl ResolveContext {
    pub fn new(client: Arc<dyn FactClient>, model: Arc<DataModel>, max_concurrency: usize) -> Self {
        Self {
            client,
            model,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn model(&self) -> &DataModel {
        &self.model
    }

    pub fn class(&self, id: ClassId) -> ResolveResult<&ClassDescriptor> {
        self.model
            .class(id)
            .ok_or(ResolveError::UnknownClass { class: id.0 })
    }

    /// Run one SELECT query inside the worker pool.
    pub async fn select(&self, query: &str) -> ResolveResult<Vec<Solution>> {
        let _permit = self.permits.acquire().await.map_err(|_| ClientError::Transport {
            endpoint: self.client.endpoint().to_string(),
            message: "resolver worker pool was closed".into(),
        })?;
        tracing::trace!(query, "resolver query");
        Ok(self.client.select(query).await?)
    }
}

/// Field names requested below the resolved field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<String>,
}

impl Selection {
    /// Keep data fields only: introspection and source fields need no query.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name.starts_with("__")
                || name == SOURCE_IDENTIFIER_FIELD
                || name == SOURCE_KIND_FIELD
                || fields.contains(&name)
            {
                continue;
            }
            fields.push(name);
        }
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Only the fields `class` actually has.
    pub fn restricted_to(&self, class: &ClassDescriptor) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|name| class.properties().any(|p| &p.name == *name))
                .cloned()
                .collect(),
        }
    }
}

/// One invocation of a field resolver.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// The instance owning the field; `None` at the query root.
    pub parent: Option<&'a ShapedInstance>,
    pub args: &'a ListArgs,
    pub selection: &'a Selection,
}

/// A compiled field.
pub trait FieldResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>>;
}
