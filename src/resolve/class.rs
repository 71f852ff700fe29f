//! Resolver for fields whose values are instances of one class.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};

use crate::client::Term;
use crate::error::{ResolveError, ResolveResult};
use crate::model::{ClassDescriptor, ClassId, PropertyDescriptor};

use super::{FieldOutput, FieldResolver, ResolveContext, ResolveRequest, Selection, ShapedInstance, query};

/// Discovers instances of a class and fetches the requested fields of each.
#[derive(Debug, Clone)]
pub struct ClassFieldResolver {
    class: ClassId,
    is_array: bool,
    fields_optional: bool,
    pinned: Option<String>,
}

impl ClassFieldResolver {
    pub fn new(class: ClassId, is_array: bool, fields_optional: bool) -> Self {
        Self {
            class,
            is_array,
            fields_optional,
            pinned: None,
        }
    }

    /// The root field of a class: a list of every instance.
    pub fn root(class: ClassId, fields_optional: bool) -> Self {
        Self::new(class, true, fields_optional)
    }

    /// Exactly the instance `identifier`, with every field optional.
    pub fn pinned(class: ClassId, identifier: impl Into<String>) -> Self {
        Self {
            class,
            is_array: false,
            fields_optional: true,
            pinned: Some(identifier.into()),
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Resolve the selection into shaped instances, in discovery order.
    pub async fn instances(
        &self,
        ctx: &ResolveContext,
        request: ResolveRequest<'_>,
    ) -> ResolveResult<Vec<ShapedInstance>> {
        let class = ctx.class(self.class)?;
        let properties = requested_properties(class, request.selection)?;
        let identifiers = self.identifiers(ctx, class, &properties, request).await?;
        tracing::debug!(
            class = %class.name,
            instances = identifiers.len(),
            fields = properties.len(),
            "resolving class instances"
        );
        try_join_all(
            identifiers
                .into_iter()
                .map(|identifier| fetch_instance(ctx, class, &properties, identifier)),
        )
        .await
    }

    async fn identifiers(
        &self,
        ctx: &ResolveContext,
        class: &ClassDescriptor,
        properties: &[RequestedProperty<'_>],
        request: ResolveRequest<'_>,
    ) -> ResolveResult<Vec<String>> {
        if let Some(pinned) = &self.pinned {
            query::validate_iri(pinned)?;
            if self.fields_optional {
                // Nothing to discover: the identifier is known and no field is mandatory.
                let excluded = request.args.filter.as_ref().is_some_and(|f| f != pinned);
                return Ok(if excluded { Vec::new() } else { vec![pinned.clone()] });
            }
        }

        let required: Vec<&str> = if self.fields_optional {
            Vec::new()
        } else {
            properties.iter().map(|p| p.descriptor.iri.as_str()).collect()
        };
        let mut args = request.args.clone();
        if let Some(pinned) = &self.pinned {
            if args.filter.as_ref().is_some_and(|f| f != pinned) {
                return Ok(Vec::new());
            }
            args.filter = Some(pinned.clone());
        }
        let solutions = ctx.select(&query::discover(&class.iri, &required, &args)).await?;
        Ok(solutions
            .into_iter()
            .filter_map(|mut row| match row.remove("instance") {
                Some(Term::Iri(iri)) => Some(iri),
                _ => None,
            })
            .collect())
    }
}

impl FieldResolver for ClassFieldResolver {
    fn resolve<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        request: ResolveRequest<'a>,
    ) -> BoxFuture<'a, ResolveResult<FieldOutput>> {
        async move {
            let instances = self.instances(ctx, request).await?;
            Ok(FieldOutput::from_values(
                instances.into_iter().map(FieldOutput::Instance).collect(),
                self.is_array,
            ))
        }
        .boxed()
    }
}

/// A selected field together with the kind of value it holds.
#[derive(Debug, Clone, Copy)]
struct RequestedProperty<'c> {
    descriptor: &'c PropertyDescriptor,
    /// Attributes hold literals, associations hold resources.
    literal: bool,
}

impl RequestedProperty<'_> {
    fn accepts(&self, property: &str, value: &Term) -> bool {
        self.descriptor.iri == property && value.is_literal() == self.literal
    }
}

/// Map selected field names onto the class's properties.
///
/// One IRI may back both an attribute and an association of the class, each
/// under its own field name.
fn requested_properties<'c>(
    class: &'c ClassDescriptor,
    selection: &Selection,
) -> ResolveResult<Vec<RequestedProperty<'c>>> {
    selection
        .fields()
        .iter()
        .map(|name| {
            let attribute = class
                .attributes
                .iter()
                .find(|a| &a.property.name == name)
                .map(|a| RequestedProperty {
                    descriptor: &a.property,
                    literal: true,
                });
            let association = || {
                class
                    .associations
                    .iter()
                    .find(|a| &a.property.name == name)
                    .map(|a| RequestedProperty {
                        descriptor: &a.property,
                        literal: false,
                    })
            };
            attribute.or_else(association).ok_or_else(|| ResolveError::UnknownField {
                class: class.name.clone(),
                field: name.clone(),
            })
        })
        .collect()
}

async fn fetch_instance(
    ctx: &ResolveContext,
    class: &ClassDescriptor,
    properties: &[RequestedProperty<'_>],
    identifier: String,
) -> ResolveResult<ShapedInstance> {
    let mut instance = ShapedInstance::new(identifier, class);
    if properties.is_empty() {
        return Ok(instance);
    }
    let mut iris: Vec<&str> = Vec::with_capacity(properties.len());
    for requested in properties {
        if !iris.contains(&requested.descriptor.iri.as_str()) {
            iris.push(&requested.descriptor.iri);
        }
    }
    let rows = ctx.select(&query::fetch(&instance.identifier, &iris)).await?;
    for mut row in rows {
        let (Some(Term::Iri(property)), Some(value)) = (row.remove("property"), row.remove("value")) else {
            continue;
        };
        for requested in properties.iter().filter(|r| r.accepts(&property, &value)) {
            instance
                .values
                .entry(requested.descriptor.name.clone())
                .or_default()
                .push(value.clone());
        }
    }
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::LocalStoreClient;
    use crate::model::{AssociationDescriptor, AttributeDescriptor, DataModel};
    use crate::resolve::{ListArgs, SortDirection};

    const DATA: &str = r#"
        @prefix ex: <http://ex.org/> .
        ex:tom a ex:Cat ; ex:name "Tom" ; ex:legs 4 .
        ex:kitty a ex:Cat ; ex:name "Kitty" .
        ex:felix a ex:Cat ; ex:legs 3, 4 .
        _:anon a ex:Cat ; ex:name "Nobody" .
    "#;

    fn context() -> ResolveContext {
        let client = LocalStoreClient::in_memory().unwrap();
        client.load_turtle(DATA).unwrap();

        let mut cat = ClassDescriptor::new(ClassId(0), "http://ex.org/Cat", 4);
        cat.name = "Cat".into();
        for (iri, name) in [("http://ex.org/name", "name"), ("http://ex.org/legs", "legs")] {
            let mut attr = AttributeDescriptor::new(iri);
            attr.property.name = name.into();
            cat.attributes.push(attr);
        }
        let model = DataModel::from_classes(vec![cat]);
        ResolveContext::new(Arc::new(client), Arc::new(model), 4)
    }

    fn identifiers(instances: &[ShapedInstance]) -> Vec<&str> {
        instances.iter().map(|i| i.identifier.as_str()).collect()
    }

    #[tokio::test]
    async fn root_lists_iri_instances_only() {
        let ctx = context();
        let args = ListArgs {
            sort: Some(SortDirection::Asc),
            ..Default::default()
        };
        let selection = Selection::default();
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let found = ClassFieldResolver::root(ClassId(0), true)
            .instances(&ctx, request)
            .await
            .unwrap();
        assert_eq!(
            identifiers(&found),
            ["http://ex.org/felix", "http://ex.org/kitty", "http://ex.org/tom"]
        );
    }

    #[tokio::test]
    async fn mandatory_fields_exclude_instances() {
        let ctx = context();
        let args = ListArgs {
            sort: Some(SortDirection::Asc),
            ..Default::default()
        };
        let selection = Selection::new(["name", "legs"]);
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let found = ClassFieldResolver::root(ClassId(0), false)
            .instances(&ctx, request)
            .await
            .unwrap();
        assert_eq!(identifiers(&found), ["http://ex.org/tom"]);
        assert_eq!(found[0].values("name"), [Term::string("Tom")]);
        assert_eq!(found[0].values("legs").len(), 1);
    }

    #[tokio::test]
    async fn optional_fields_keep_partial_instances() {
        let ctx = context();
        let args = ListArgs {
            sort: Some(SortDirection::Desc),
            limit: Some(2),
            ..Default::default()
        };
        let selection = Selection::new(["legs"]);
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let found = ClassFieldResolver::root(ClassId(0), true)
            .instances(&ctx, request)
            .await
            .unwrap();
        assert_eq!(identifiers(&found), ["http://ex.org/tom", "http://ex.org/kitty"]);
        assert!(found[1].values("legs").is_empty());
    }

    #[tokio::test]
    async fn pinned_resolver_returns_single_instance() {
        let ctx = context();
        let args = ListArgs::default();
        let selection = Selection::new(["legs"]);
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let output = ClassFieldResolver::pinned(ClassId(0), "http://ex.org/felix")
            .resolve(&ctx, request)
            .await
            .unwrap();
        let FieldOutput::Instance(felix) = output else {
            panic!("expected an instance, got {output:?}");
        };
        assert_eq!(felix.values("legs").len(), 2);
        assert_eq!(felix.class_iri, "http://ex.org/Cat");
    }

    #[tokio::test]
    async fn unknown_field_is_rejected() {
        let ctx = context();
        let args = ListArgs::default();
        let selection = Selection::new(["whiskers"]);
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let err = ClassFieldResolver::root(ClassId(0), true)
            .resolve(&ctx, request)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn shared_iri_splits_literals_from_resources() {
        let client = LocalStoreClient::in_memory().unwrap();
        client
            .load_turtle(
                r#"
                @prefix ex: <http://ex.org/> .
                ex:a a ex:A ; ex:rel "lit", ex:b .
                ex:b a ex:B .
                "#,
            )
            .unwrap();

        let mut a = ClassDescriptor::new(ClassId(0), "http://ex.org/A", 1);
        a.name = "A".into();
        let mut attr = AttributeDescriptor::new("http://ex.org/rel");
        attr.property.name = "rel".into();
        a.attributes.push(attr);
        let mut link = AssociationDescriptor::new("http://ex.org/rel");
        link.property.name = "rel_2".into();
        link.add_target(ClassId(1));
        a.associations.push(link);
        let mut b = ClassDescriptor::new(ClassId(1), "http://ex.org/B", 1);
        b.name = "B".into();
        let model = DataModel::from_classes(vec![a, b]);
        let ctx = ResolveContext::new(Arc::new(client), Arc::new(model), 4);

        let args = ListArgs::default();
        let selection = Selection::new(["rel", "rel_2"]);
        let request = ResolveRequest {
            parent: None,
            args: &args,
            selection: &selection,
        };
        let found = ClassFieldResolver::root(ClassId(0), false)
            .instances(&ctx, request)
            .await
            .unwrap();
        assert_eq!(identifiers(&found), ["http://ex.org/a"]);
        assert_eq!(found[0].values("rel"), [Term::string("lit")]);
        assert_eq!(found[0].values("rel_2"), [Term::iri("http://ex.org/b")]);
    }
}
