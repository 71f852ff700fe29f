//! Glue between resolvers and the dynamic GraphQL schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, ResolverContext, TypeRef};
use async_graphql::{ErrorExtensions, Value};
use miette::Diagnostic;

use crate::error::ResolveError;
use crate::model::DataModel;
use crate::resolve::{FieldOutput, FieldResolver, ListArgs, ResolveContext, ResolveRequest, ScalarValue, Selection, ShapedInstance};

use super::describe;

/// Language map carried as the parent of a `_LangString` object.
pub type LangStringValue = BTreeMap<String, FieldOutput>;

/// Which list arguments a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSet {
    None,
    /// `limit`, `offset` and `sort` by value.
    Values,
    /// `limit`, `offset`, `sort` and `filter` by identifier.
    Instances,
}

impl ArgSet {
    pub fn apply(self, field: Field) -> Field {
        match self {
            ArgSet::None => field,
            ArgSet::Values => field
                .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
                .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
                .argument(InputValue::new("sort", TypeRef::named(TypeRef::STRING)).description(describe::SORT_BY_VALUE)),
            ArgSet::Instances => field
                .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
                .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
                .argument(
                    InputValue::new("sort", TypeRef::named(TypeRef::STRING)).description(describe::SORT_BY_IDENTIFIER),
                )
                .argument(InputValue::new("filter", TypeRef::named(TypeRef::STRING)).description(describe::FILTER)),
        }
    }
}

/// Turn a resolver error into a GraphQL error carrying the diagnostic code.
pub fn graphql_error(err: ResolveError) -> async_graphql::Error {
    let code = err.code().map(|c| c.to_string());
    let error = async_graphql::Error::new(err.to_string());
    match code {
        Some(code) => error.extend_with(|_, ext| ext.set("code", code.as_str())),
        None => error,
    }
}

fn list_args(ctx: &ResolverContext<'_>) -> async_graphql::Result<ListArgs> {
    let int = |name: &str| -> async_graphql::Result<Option<i64>> {
        ctx.args
            .get(name)
            .filter(|v| !v.is_null())
            .map(|v| v.i64())
            .transpose()
    };
    let string = |name: &str| -> async_graphql::Result<Option<String>> {
        ctx.args
            .get(name)
            .filter(|v| !v.is_null())
            .map(|v| v.string().map(str::to_string))
            .transpose()
    };
    let (limit, offset) = (int("limit")?, int("offset")?);
    let (sort, filter) = (string("sort")?, string("filter")?);
    ListArgs::parse(limit, offset, sort.as_deref(), filter.as_deref()).map_err(graphql_error)
}

fn selection(ctx: &ResolverContext<'_>) -> Selection {
    Selection::new(ctx.ctx.field().selection_set().map(|f| f.name().to_string()))
}

/// Convert resolver output. Instances returned into a union are tagged with
/// their concrete type name.
pub fn into_field_value<'a>(output: FieldOutput, model: &DataModel, union: bool) -> Option<FieldValue<'a>> {
    match output {
        FieldOutput::Null => None,
        FieldOutput::Value(ScalarValue::String(s)) => Some(FieldValue::value(Value::from(s))),
        FieldOutput::Value(ScalarValue::Int(n)) => Some(FieldValue::value(Value::from(n))),
        FieldOutput::Value(ScalarValue::Boolean(b)) => Some(FieldValue::value(Value::from(b))),
        FieldOutput::LangString(map) => Some(FieldValue::owned_any(map)),
        FieldOutput::Instance(instance) => {
            let type_name = model.class(instance.class).map(|c| c.name.clone());
            let value = FieldValue::owned_any(instance);
            match type_name {
                Some(name) if union => Some(value.with_type(name)),
                _ => Some(value),
            }
        }
        FieldOutput::List(items) => Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| into_field_value(item, model, union).unwrap_or(FieldValue::value(Value::Null))),
        )),
    }
}

/// A field backed by a [`FieldResolver`].
pub fn resolver_field(
    name: &str,
    ty: TypeRef,
    resolver: Arc<dyn FieldResolver>,
    context: Arc<ResolveContext>,
    union: bool,
) -> Field {
    Field::new(name, ty, move |ctx| {
        let resolver = Arc::clone(&resolver);
        let context = Arc::clone(&context);
        FieldFuture::new(async move {
            let args = list_args(&ctx)?;
            let selection = selection(&ctx);
            let request = ResolveRequest {
                parent: ctx.parent_value.downcast_ref::<ShapedInstance>(),
                args: &args,
                selection: &selection,
            };
            let output = resolver.resolve(&context, request).await.map_err(graphql_error)?;
            Ok(into_field_value(output, context.model(), union))
        })
    })
}

/// `_source_identifier` or `_source_kind`.
pub fn source_field(name: &str, description: &str, read: fn(&ShapedInstance) -> &str) -> Field {
    Field::new(name, TypeRef::named_nn(TypeRef::STRING), move |ctx| {
        FieldFuture::new(async move {
            let instance = ctx.parent_value.try_downcast_ref::<ShapedInstance>()?;
            Ok(Some(FieldValue::value(Value::from(read(instance).to_string()))))
        })
    })
    .description(description)
}

/// One language of a `_LangString` object.
pub fn language_field(name: &str, is_array: bool) -> Field {
    let key = name.to_string();
    let ty = if is_array {
        TypeRef::named_list(TypeRef::STRING)
    } else {
        TypeRef::named(TypeRef::STRING)
    };
    Field::new(name, ty, move |ctx| {
        let key = key.clone();
        FieldFuture::new(async move {
            let map = ctx.parent_value.try_downcast_ref::<LangStringValue>()?;
            Ok(map.get(&key).cloned().and_then(language_value))
        })
    })
}

fn language_value<'a>(output: FieldOutput) -> Option<FieldValue<'a>> {
    match output {
        FieldOutput::Value(ScalarValue::String(s)) => Some(FieldValue::value(Value::from(s))),
        FieldOutput::List(items) => Some(FieldValue::list(
            items.into_iter().filter_map(language_value),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_diagnostic_codes() {
        let err = graphql_error(ResolveError::InvalidSort { value: "UP".into() });
        assert!(err.message.contains("UP"));
        assert!(err.extensions.is_some());
    }
}
