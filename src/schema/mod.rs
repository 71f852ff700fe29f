//! Compile a [`DataModel`] into an executable GraphQL schema.
//!
//! Every class becomes an object type and a root `Query` field. Attributes
//! become scalar fields (or `_<Class>_<attr>_LangString` objects for
//! language-tagged text) and associations become object fields, typed as
//! `_<Class>_<assoc>_Union` when the range has more than one class. Each
//! field is backed by a resolver from [`crate::resolve`].

pub mod describe;
pub mod fields;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_graphql::dynamic::{Object, Schema, TypeRef, Union};

use crate::client::FactClient;
use crate::config::SchemaConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::model::{AssociationDescriptor, AttributeDescriptor, ClassDescriptor, DataModel};
use crate::postprocess::names::{SOURCE_IDENTIFIER_FIELD, SOURCE_KIND_FIELD};
use crate::resolve::scalar::{NO_LANGUAGE_FIELD, language_field};
use crate::resolve::{
    ClassFieldResolver, FieldResolver, LangStringFieldResolver, MonomorphicAssociationResolver,
    PaginatedResolver, PolymorphicAssociationResolver, ResolveContext, ScalarFieldResolver, ScalarKind,
    ShapedInstance,
};
use crate::vocab::RDF_LANG_STRING;

use fields::{ArgSet, resolver_field, source_field};

pub const QUERY_TYPE: &str = "Query";

pub fn lang_string_type_name(class: &ClassDescriptor, attribute: &AttributeDescriptor) -> String {
    format!("_{}_{}_LangString", class.name, attribute.property.name)
}

pub fn union_type_name(class: &ClassDescriptor, association: &AssociationDescriptor) -> String {
    format!("_{}_{}_Union", class.name, association.property.name)
}

fn source_identifier(instance: &ShapedInstance) -> &str {
    &instance.identifier
}

fn source_kind(instance: &ShapedInstance) -> &str {
    &instance.class_iri
}

/// Builds schemas with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    config: SchemaConfig,
    /// Probe cap the model was observed with; counts equal to it are lower bounds.
    max_property_count: Option<u64>,
}

impl SchemaCompiler {
    pub fn new(config: SchemaConfig, max_property_count: Option<u64>) -> Self {
        Self {
            config,
            max_property_count,
        }
    }

    /// Validate `model` and build its schema. Resolvers query through `client`.
    pub fn compile(&self, model: Arc<DataModel>, client: Arc<dyn FactClient>) -> SchemaResult<Schema> {
        validate(&model)?;
        let context = Arc::new(ResolveContext::new(
            client,
            Arc::clone(&model),
            self.config.max_concurrency,
        ));

        let mut query = Object::new(QUERY_TYPE);
        let mut objects = Vec::new();
        let mut unions = Vec::new();
        for class in model.classes() {
            let root: Arc<dyn FieldResolver> = Arc::new(ClassFieldResolver::root(
                class.id,
                self.config.are_root_properties_optional,
            ));
            let field = resolver_field(&class.name, TypeRef::named_list_nn(&class.name), root, Arc::clone(&context), false)
                .description(describe::class_description(class));
            query = query.field(ArgSet::Instances.apply(field));

            let mut object = Object::new(&class.name)
                .description(describe::class_description(class))
                .field(source_field(SOURCE_IDENTIFIER_FIELD, describe::SOURCE_IDENTIFIER, source_identifier))
                .field(source_field(SOURCE_KIND_FIELD, describe::SOURCE_KIND, source_kind));
            for attribute in &class.attributes {
                let (field, lang_object) = self.attribute_field(class, attribute, &context);
                object = object.field(field);
                objects.extend(lang_object);
            }
            for association in &class.associations {
                let (field, union) = self.association_field(&model, class, association, &context);
                object = object.field(field);
                unions.extend(union);
            }
            objects.push(object);
        }

        let mut builder = Schema::build(QUERY_TYPE, None, None).register(query);
        for object in objects {
            builder = builder.register(object);
        }
        for union in unions {
            builder = builder.register(union);
        }
        let schema = builder.finish().map_err(|e| SchemaError::Build {
            message: e.to_string(),
        })?;
        tracing::info!(classes = model.len(), "compiled GraphQL schema");

        if let Some(path) = &self.config.graphql_schema_output_path {
            export_sdl(&schema, path)?;
        }
        Ok(schema)
    }

    fn attribute_field(
        &self,
        class: &ClassDescriptor,
        attribute: &AttributeDescriptor,
        context: &Arc<ResolveContext>,
    ) -> (async_graphql::dynamic::Field, Option<Object>) {
        let name = &attribute.property.name;
        let is_array = attribute.property.is_array;
        let description = describe::property_description(&attribute.property, "attribute", self.max_property_count);

        if attribute.is_lang_string() {
            let type_name = lang_string_type_name(class, attribute);
            let mut object = Object::new(&type_name);
            let mut languages: BTreeSet<String> = attribute.languages.iter().map(|l| language_field(l)).collect();
            if attribute.types.iter().any(|t| t != RDF_LANG_STRING) {
                languages.insert(NO_LANGUAGE_FIELD.to_string());
            }
            for language in &languages {
                object = object.field(fields::language_field(language, is_array));
            }
            let resolver: Arc<dyn FieldResolver> = Arc::new(LangStringFieldResolver::new(name, is_array, languages));
            let field = resolver_field(name, TypeRef::named(&type_name), resolver, Arc::clone(context), false)
                .description(description);
            return (field, Some(object));
        }

        let kind = ScalarKind::for_attribute(attribute);
        let scalar = match kind {
            ScalarKind::String => TypeRef::STRING,
            ScalarKind::Int => TypeRef::INT,
            ScalarKind::Boolean => TypeRef::BOOLEAN,
        };
        let ty = if is_array {
            TypeRef::named_list(scalar)
        } else {
            TypeRef::named(scalar)
        };
        let inner = ScalarFieldResolver::new(name, kind, is_array);
        // Ordering booleans is meaningless.
        let (resolver, args): (Arc<dyn FieldResolver>, ArgSet) = if kind == ScalarKind::Boolean {
            (Arc::new(inner), ArgSet::None)
        } else {
            (Arc::new(PaginatedResolver::natural(inner)), ArgSet::Values)
        };
        let field = resolver_field(name, ty, resolver, Arc::clone(context), false).description(description);
        (args.apply(field), None)
    }

    fn association_field(
        &self,
        model: &DataModel,
        class: &ClassDescriptor,
        association: &AssociationDescriptor,
        context: &Arc<ResolveContext>,
    ) -> (async_graphql::dynamic::Field, Option<Union>) {
        let name = &association.property.name;
        let is_array = association.property.is_array;
        let description = describe::property_description(&association.property, "association", self.max_property_count);

        let (type_name, resolver, union): (String, Arc<dyn FieldResolver>, Option<Union>) =
            if association.is_polymorphic() {
                let type_name = union_type_name(class, association);
                let mut union = Union::new(&type_name);
                for target in model.classes().iter().filter(|c| association.target_classes.contains(&c.id)) {
                    union = union.possible_type(&target.name);
                }
                let resolver = PolymorphicAssociationResolver::new(name, association.target_classes.clone(), is_array);
                (type_name, Arc::new(resolver), Some(union))
            } else {
                // Validation guarantees exactly one resolvable target here.
                let target = association.target_classes[0];
                let type_name = model.class(target).map(|c| c.name.clone()).unwrap_or_default();
                let resolver = MonomorphicAssociationResolver::new(name, target, is_array);
                (type_name, Arc::new(resolver), None)
            };

        let ty = if is_array {
            TypeRef::named_list(&type_name)
        } else {
            TypeRef::named(&type_name)
        };
        let field = resolver_field(name, ty, resolver, Arc::clone(context), union.is_some()).description(description);
        (ArgSet::Instances.apply(field), union)
    }
}

/// Reject models the schema cannot represent.
pub fn validate(model: &DataModel) -> SchemaResult<()> {
    if model.is_empty() {
        return Err(SchemaError::EmptyModel);
    }

    let mut types: HashSet<String> = HashSet::from([QUERY_TYPE.to_string()]);
    let mut claim_type = |name: String| {
        if types.insert(name.clone()) {
            Ok(())
        } else {
            Err(SchemaError::DuplicateName {
                what: "type".into(),
                name,
            })
        }
    };

    for class in model.classes() {
        if class.name.is_empty() {
            return Err(SchemaError::Build {
                message: format!("class {} has no name", class.iri),
            });
        }
        claim_type(class.name.clone())?;

        let mut fields: HashSet<&str> = HashSet::from([SOURCE_IDENTIFIER_FIELD, SOURCE_KIND_FIELD]);
        for property in class.properties() {
            if property.name.is_empty() {
                return Err(SchemaError::Build {
                    message: format!("property {} of {} has no name", property.iri, class.name),
                });
            }
            if !fields.insert(&property.name) {
                return Err(SchemaError::DuplicateName {
                    what: format!("field of {}", class.name),
                    name: property.name.clone(),
                });
            }
        }

        for attribute in class.attributes.iter().filter(|a| a.is_lang_string()) {
            claim_type(lang_string_type_name(class, attribute))?;
        }
        for association in &class.associations {
            if association.target_classes.is_empty() {
                return Err(SchemaError::Build {
                    message: format!("association {} of {} has no target class", association.property.iri, class.name),
                });
            }
            if let Some(target) = association.target_classes.iter().find(|t| model.class(**t).is_none()) {
                return Err(SchemaError::DanglingTarget {
                    class: class.name.clone(),
                    association: association.property.name.clone(),
                    target: target.0,
                });
            }
            if association.is_polymorphic() {
                claim_type(union_type_name(class, association))?;
            }
        }
    }
    Ok(())
}

/// Write the schema definition language text to `path`.
pub fn export_sdl(schema: &Schema, path: &Path) -> SchemaResult<()> {
    std::fs::write(path, schema.sdl()).map_err(|e| SchemaError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "wrote GraphQL schema definition");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalStoreClient;
    use crate::model::ClassId;
    use crate::vocab::{XSD_BOOLEAN, XSD_INTEGER, XSD_STRING};

    /// Cat { legs: [Int], indoor: Boolean, label: LangString, friend: [Cat | Dog], owner: Dog }, Dog {}.
    fn model() -> DataModel {
        let mut cat = ClassDescriptor::new(ClassId(0), "http://ex.org/Cat", 2);
        cat.name = "Cat".into();
        let mut legs = AttributeDescriptor::new("http://ex.org/legs");
        legs.property.name = "legs".into();
        legs.property.count = 1000;
        legs.types.insert(XSD_INTEGER.into());
        let mut indoor = AttributeDescriptor::new("http://ex.org/indoor");
        indoor.property.name = "indoor".into();
        indoor.property.is_array = false;
        indoor.types.insert(XSD_BOOLEAN.into());
        let mut label = AttributeDescriptor::new("http://ex.org/label");
        label.property.name = "label".into();
        label.types.insert(RDF_LANG_STRING.into());
        label.types.insert(XSD_STRING.into());
        label.languages.insert("en".into());
        label.languages.insert("de-AT".into());
        cat.attributes.extend([legs, indoor, label]);

        let mut friend = AssociationDescriptor::new("http://ex.org/friend");
        friend.property.name = "friend".into();
        friend.add_target(ClassId(0));
        friend.add_target(ClassId(1));
        let mut owner = AssociationDescriptor::new("http://ex.org/owner");
        owner.property.name = "owner".into();
        owner.property.is_array = false;
        owner.add_target(ClassId(1));
        cat.associations.extend([friend, owner]);

        let mut dog = ClassDescriptor::new(ClassId(1), "http://ex.org/Dog", 0);
        dog.name = "Dog".into();
        DataModel::from_classes(vec![cat, dog])
    }

    fn client() -> Arc<dyn FactClient> {
        Arc::new(LocalStoreClient::in_memory().unwrap())
    }

    fn compile(model: DataModel) -> SchemaResult<Schema> {
        SchemaCompiler::new(SchemaConfig::default(), Some(1000)).compile(Arc::new(model), client())
    }

    #[test]
    fn sdl_contains_generated_types() {
        let sdl = compile(model()).unwrap().sdl();
        assert!(sdl.contains("type Cat"));
        assert!(sdl.contains("type Dog"));
        assert!(sdl.contains("union _Cat_friend_Union = Cat | Dog"));
        assert!(sdl.contains("type _Cat_label_LangString"));
        assert!(sdl.contains("_no_language: [String]"));
        assert!(sdl.contains("de_AT: [String]"));
        assert!(sdl.contains("indoor: Boolean"));
        assert!(sdl.contains("): Dog"));
        assert!(sdl.contains("_source_identifier: String!"));
        assert!(sdl.contains("): [Cat]!"));
        assert!(sdl.contains("1000+ occurrences"));
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(matches!(compile(DataModel::default()), Err(SchemaError::EmptyModel)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut model = model();
        model.classes_mut()[1].name = "Cat".into();
        assert!(matches!(
            validate(&model),
            Err(SchemaError::DuplicateName { ref what, .. }) if what == "type"
        ));

        let mut model = self::model();
        model.classes_mut()[0].attributes[0].property.name = "friend".into();
        assert!(matches!(validate(&model), Err(SchemaError::DuplicateName { .. })));

        let mut model = self::model();
        model.classes_mut()[0].attributes[0].property.name = SOURCE_KIND_FIELD.into();
        assert!(matches!(validate(&model), Err(SchemaError::DuplicateName { .. })));
    }

    #[test]
    fn dangling_target_is_rejected() {
        let mut model = model();
        model.classes_mut()[0].associations[1].target_classes = vec![ClassId(7)];
        assert!(matches!(
            validate(&model),
            Err(SchemaError::DanglingTarget { target: 7, .. })
        ));
    }

    #[test]
    fn sdl_is_exported_when_configured() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.graphql");
        let config = SchemaConfig {
            graphql_schema_output_path: Some(path.clone()),
            ..Default::default()
        };
        SchemaCompiler::new(config, None)
            .compile(Arc::new(model()), client())
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("type Query"));
    }
}
