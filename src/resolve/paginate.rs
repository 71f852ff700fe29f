//! `filter`, `sort`, `offset` and `limit` over any list.
//!
//! The steps always run in that order. Sorting is stable; `DESC` swaps the
//! comparator's operands instead of reversing the result, so equal elements
//! keep their relative order.

use std::cmp::Ordering;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::ResolveResult;

use super::{FieldOutput, FieldResolver, ListArgs, ResolveContext, ResolveRequest, SortDirection};

/// Apply `args` to `items`.
///
/// `identifier` exposes the value `filter` compares against; items without one
/// never match a filter. `compare` must order ascending.
pub fn paginate<T>(
    mut items: Vec<T>,
    args: &ListArgs,
    identifier: impl Fn(&T) -> Option<&str>,
    compare: impl Fn(&T, &T) -> Ordering,
) -> Vec<T> {
    if let Some(filter) = &args.filter {
        items.retain(|item| identifier(item) == Some(filter.as_str()));
    }
    match args.sort {
        Some(SortDirection::Asc) => items.sort_by(|a, b| compare(a, b)),
        Some(SortDirection::Desc) => items.sort_by(|a, b| compare(b, a)),
        None => {}
    }
    let offset = args.offset.unwrap_or(0).min(items.len());
    items.drain(..offset);
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }
    items
}

/// Decorates a list-returning resolver with the four list arguments.
pub struct PaginatedResolver<R> {
    inner: R,
    compare: fn(&FieldOutput, &FieldOutput) -> Ordering,
}

impl<R: FieldResolver> PaginatedResolver<R> {
    pub fn new(inner: R, compare: fn(&FieldOutput, &FieldOutput) -> Ordering) -> Self {
        Self { inner, compare }
    }

    /// Instances by identifier, values by value.
    pub fn natural(inner: R) -> Self {
        Self::new(inner, FieldOutput::compare)
    }
}

impl<R: FieldResolver> FieldResolver for PaginatedResolver<R> {
    fn resolve<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        async move {
            match self.inner.resolve(ctx, request).await? {
                FieldOutput::List(items) => Ok(FieldOutput::List(paginate(
                    items,
                    request.args,
                    FieldOutput::identifier,
                    self.compare,
                ))),
                single => Ok(single),
            }
        }
        .boxed()
    }
}
