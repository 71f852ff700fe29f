//! Resolvers for fields whose values are other instances.
//!
//! The parent instance holds the target identifiers. List arguments are
//! applied to those identifiers before anything is fetched, so `limit: 2`
//! costs two fetches no matter how many targets the parent has.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};

use crate::client::Term;
use crate::error::{ResolveError, ResolveResult};
use crate::model::ClassId;

use super::{
    ClassFieldResolver, FieldOutput, FieldResolver, ListArgs, ResolveContext, ResolveRequest, Selection,
    paginate, query,
};

/// Target identifiers of the field on the parent, after list arguments.
fn target_identifiers<'a>(field: &str, request: &ResolveRequest<'a>) -> Vec<&'a str> {
    let Some(parent) = request.parent else {
        return Vec::new();
    };
    let raw = parent.values(field);
    let mut identifiers = Vec::with_capacity(raw.len());
    for term in raw {
        match term {
            Term::Iri(iri) if !identifiers.contains(&iri.as_str()) => identifiers.push(iri.as_str()),
            Term::Iri(_) => {}
            other => tracing::debug!(field, value = %other, "skipping non-IRI association target"),
        }
    }
    paginate(identifiers, request.args, |iri| Some(*iri), |a, b| a.cmp(b))
}

/// Fetch one target through a class resolver pinned to it.
async fn fetch_pinned(
    ctx: &ResolveContext,
    class: ClassId,
    identifier: &str,
    selection: &Selection,
) -> ResolveResult<FieldOutput> {
    let args = ListArgs::default();
    let request = ResolveRequest {
        parent: None,
        args: &args,
        selection,
    };
    ClassFieldResolver::pinned(class, identifier).resolve(ctx, request).await
}

/// Every target is an instance of the one range class.
#[derive(Debug, Clone)]
pub struct MonomorphicAssociationResolver {
    field: String,
    target: ClassId,
    is_array: bool,
}

impl MonomorphicAssociationResolver {
    pub fn new(field: impl Into<String>, target: ClassId, is_array: bool) -> Self {
        Self {
            field: field.into(),
            target,
            is_array,
        }
    }
}

impl FieldResolver for MonomorphicAssociationResolver {
    fn resolve<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        async move {
            let identifiers = target_identifiers(&self.field, &request);
            let fetched = try_join_all(
                identifiers
                    .into_iter()
                    .map(|iri| fetch_pinned(ctx, self.target, iri, request.selection)),
            )
            .await?;
            let instances = fetched.into_iter().filter(|o| *o != FieldOutput::Null).collect();
            Ok(FieldOutput::from_values(instances, self.is_array))
        }
        .boxed()
    }
}

/// Targets may belong to any of several classes.
#[derive(Debug, Clone)]
pub struct PolymorphicAssociationResolver {
    field: String,
    candidates: Vec<ClassId>,
    is_array: bool,
}

impl PolymorphicAssociationResolver {
    pub fn new(field: impl Into<String>, candidates: Vec<ClassId>, is_array: bool) -> Self {
        Self {
            field: field.into(),
            candidates,
            is_array,
        }
    }

    /// The first candidate, in range order, that the target is typed with.
    async fn concrete_class(&self, ctx: &ResolveContext, identifier: &str) -> ResolveResult<ClassId> {
        let mut candidates = Vec::with_capacity(self.candidates.len());
        for id in &self.candidates {
            candidates.push((*id, ctx.class(*id)?.iri.as_str()));
        }
        let iris: Vec<&str> = candidates.iter().map(|(_, iri)| *iri).collect();
        let rows = ctx.select(&query::resolve_type(identifier, &iris)).await?;
        let found: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("class").and_then(Term::as_iri))
            .collect();
        candidates
            .iter()
            .find(|(_, iri)| found.contains(iri))
            .map(|(id, _)| *id)
            .ok_or_else(|| ResolveError::UnresolvedType {
                identifier: identifier.to_string(),
            })
    }

    async fn fetch(&self, ctx: &ResolveContext, identifier: &str, selection: &Selection) -> ResolveResult<FieldOutput> {
        query::validate_iri(identifier)?;
        let class = self.concrete_class(ctx, identifier).await?;
        // Fields of the other union members are not part of this type.
        let selection = selection.restricted_to(ctx.class(class)?);
        fetch_pinned(ctx, class, identifier, &selection).await
    }
}

impl FieldResolver for PolymorphicAssociationResolver {
    fn resolve<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        async move {
            let identifiers = target_identifiers(&self.field, &request);
            let fetched = try_join_all(
                identifiers
                    .into_iter()
                    .map(|iri| self.fetch(ctx, iri, request.selection)),
            )
            .await?;
            let instances = fetched.into_iter().filter(|o| *o != FieldOutput::Null).collect();
            Ok(FieldOutput::from_values(instances, self.is_array))
        }
        .boxed()
    }
}
