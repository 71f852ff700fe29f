//! Ordered mutation hooks over a freshly built model.
//!
//! Hooks are grouped by the descriptors they accept. [`PostprocessPipeline::run`]
//! applies them in a fixed order: `named` and `class` hooks over all classes,
//! then for each class `named` and `property` hooks over its properties,
//! `association` hooks over its associations and `attribute` hooks over its
//! attributes. Within a category, hooks run in registration order.

pub mod names;

use crate::model::{
    AssociationDescriptor, AttributeDescriptor, ClassDescriptor, DataModel, PropertyDescriptor,
};

/// Anything with an IRI and a derived name.
pub trait NamedDescriptor {
    fn iri(&self) -> &str;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

impl NamedDescriptor for ClassDescriptor {
    fn iri(&self) -> &str {
        &self.iri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl NamedDescriptor for PropertyDescriptor {
    fn iri(&self) -> &str {
        &self.iri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

pub type NamedHook = Box<dyn Fn(&mut [&mut dyn NamedDescriptor]) + Send + Sync>;
pub type ClassHook = Box<dyn Fn(&mut [ClassDescriptor]) + Send + Sync>;
pub type PropertyHook = Box<dyn Fn(&mut [&mut PropertyDescriptor]) + Send + Sync>;
pub type AssociationHook = Box<dyn Fn(&mut [AssociationDescriptor]) + Send + Sync>;
pub type AttributeHook = Box<dyn Fn(&mut [AttributeDescriptor]) + Send + Sync>;

/// Hooks by category.
#[derive(Default)]
pub struct HookRegistry {
    named: Vec<NamedHook>,
    class: Vec<ClassHook>,
    property: Vec<PropertyHook>,
    association: Vec<AssociationHook>,
    attribute: Vec<AttributeHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name derivation plus reserved-name avoidance.
    pub fn with_default_hooks() -> Self {
        let mut hooks = Self::new();
        hooks.add_named(Box::new(names::derive_names));
        hooks.add_class(Box::new(names::avoid_reserved_type_names));
        hooks.add_property(Box::new(names::avoid_reserved_field_names));
        hooks
    }

    pub fn add_named(&mut self, hook: NamedHook) {
        self.named.push(hook);
    }

    pub fn add_class(&mut self, hook: ClassHook) {
        self.class.push(hook);
    }

    pub fn add_property(&mut self, hook: PropertyHook) {
        self.property.push(hook);
    }

    pub fn add_association(&mut self, hook: AssociationHook) {
        self.association.push(hook);
    }

    pub fn add_attribute(&mut self, hook: AttributeHook) {
        self.attribute.push(hook);
    }
}

/// Runs a [`HookRegistry`] over a model.
pub struct PostprocessPipeline {
    hooks: HookRegistry,
}

impl Default for PostprocessPipeline {
    fn default() -> Self {
        Self::new(HookRegistry::with_default_hooks())
    }
}

impl PostprocessPipeline {
    pub fn new(hooks: HookRegistry) -> Self {
        Self { hooks }
    }

    pub fn run(&self, model: &mut DataModel) {
        let hooks = &self.hooks;
        {
            let mut named: Vec<&mut dyn NamedDescriptor> = model
                .classes_mut()
                .iter_mut()
                .map(|c| c as &mut dyn NamedDescriptor)
                .collect();
            for hook in &hooks.named {
                hook(named.as_mut_slice());
            }
        }
        for hook in &hooks.class {
            hook(model.classes_mut());
        }

        for class in model.classes_mut() {
            {
                let mut named: Vec<&mut dyn NamedDescriptor> = class
                    .properties_mut()
                    .map(|p| p as &mut dyn NamedDescriptor)
                    .collect();
                for hook in &hooks.named {
                    hook(named.as_mut_slice());
                }
            }
            {
                let mut properties: Vec<&mut PropertyDescriptor> = class.properties_mut().collect();
                for hook in &hooks.property {
                    hook(properties.as_mut_slice());
                }
            }
            for hook in &hooks.association {
                hook(class.associations.as_mut_slice());
            }
            for hook in &hooks.attribute {
                hook(class.attributes.as_mut_slice());
            }
        }
        tracing::debug!(classes = model.len(), "postprocessing finished");
    }
}
