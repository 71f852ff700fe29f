//! Model checkpoints.
//!
//! A checkpoint is the model as JSON with association targets written as class
//! IRIs. Loading re-links targets by IRI, so a class that references itself or
//! a class that references it back comes out pointing at the same arena slot.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::CheckpointConfig;
use crate::error::{CheckpointError, CheckpointResult};

use super::{
    AssociationDescriptor, AttributeDescriptor, ClassDescriptor, ClassId, DataModel,
    PropertyDescriptor,
};

#[derive(Serialize, Deserialize)]
struct StoredClass {
    iri: String,
    name: String,
    instance_count: u64,
    attributes: Vec<AttributeDescriptor>,
    associations: Vec<StoredAssociation>,
}

#[derive(Serialize, Deserialize)]
struct StoredAssociation {
    #[serde(flatten)]
    property: PropertyDescriptor,
    target_classes: Vec<String>,
}

/// Serialize a model.
pub fn save(model: &DataModel) -> CheckpointResult<String> {
    let mut stored = Vec::with_capacity(model.len());
    for class in model.classes() {
        let mut associations = Vec::with_capacity(class.associations.len());
        for association in &class.associations {
            let mut targets = Vec::with_capacity(association.target_classes.len());
            for target in &association.target_classes {
                let target = model.class(*target).ok_or_else(|| CheckpointError::DanglingClassReference {
                    iri: format!("#{}", target.0),
                })?;
                targets.push(target.iri.clone());
            }
            associations.push(StoredAssociation {
                property: association.property.clone(),
                target_classes: targets,
            });
        }
        stored.push(StoredClass {
            iri: class.iri.clone(),
            name: class.name.clone(),
            instance_count: class.instance_count,
            attributes: class.attributes.clone(),
            associations,
        });
    }
    serde_json::to_string_pretty(&stored).map_err(|e| CheckpointError::Format {
        message: e.to_string(),
    })
}

/// Deserialize a model written by [`save`].
pub fn load(json: &str) -> CheckpointResult<DataModel> {
    let stored: Vec<StoredClass> = serde_json::from_str(json).map_err(|e| CheckpointError::Format {
        message: e.to_string(),
    })?;

    let ids: HashMap<&str, ClassId> = stored
        .iter()
        .enumerate()
        .map(|(i, c)| (c.iri.as_str(), ClassId(i)))
        .collect();

    let mut classes = Vec::with_capacity(stored.len());
    for (index, class) in stored.iter().enumerate() {
        let mut associations = Vec::with_capacity(class.associations.len());
        for association in &class.associations {
            let mut descriptor = AssociationDescriptor {
                property: association.property.clone(),
                target_classes: Vec::new(),
            };
            for iri in &association.target_classes {
                let id = ids.get(iri.as_str()).copied().ok_or_else(|| {
                    CheckpointError::DanglingClassReference { iri: iri.clone() }
                })?;
                descriptor.add_target(id);
            }
            associations.push(descriptor);
        }
        classes.push(ClassDescriptor {
            id: ClassId(index),
            iri: class.iri.clone(),
            name: class.name.clone(),
            instance_count: class.instance_count,
            attributes: class.attributes.clone(),
            associations,
        });
    }
    Ok(DataModel::from_classes(classes))
}

/// Write the checkpoint file if enabled. Returns whether a file was written.
pub fn save_to_file(model: &DataModel, config: &CheckpointConfig) -> CheckpointResult<bool> {
    if !config.save_model_to_file {
        tracing::debug!("model checkpointing disabled, not saving");
        return Ok(false);
    }
    let path = &config.checkpoint_file_path;
    if path.exists() && !config.overwrite_file {
        tracing::info!(path = %path.display(), "checkpoint exists and overwrite is off, not saving");
        return Ok(false);
    }
    write(model, path, true)?;
    tracing::info!(path = %path.display(), classes = model.len(), "saved model checkpoint");
    Ok(true)
}

/// Load the checkpoint file if enabled and present.
pub fn load_from_file(config: &CheckpointConfig) -> CheckpointResult<Option<DataModel>> {
    if !config.load_model_from_checkpoint {
        return Ok(None);
    }
    let path = &config.checkpoint_file_path;
    if !path.exists() {
        tracing::info!(path = %path.display(), "model checkpoint file does not exist");
        return Ok(None);
    }
    let model = read(path)?;
    tracing::info!(path = %path.display(), classes = model.len(), "loaded model from checkpoint");
    Ok(Some(model))
}

/// Write `model` to `path`. An existing file is only replaced when `overwrite` is set.
pub fn write(model: &DataModel, path: &Path, overwrite: bool) -> CheckpointResult<()> {
    if !overwrite && path.exists() {
        return Err(CheckpointError::AlreadyExists {
            path: path.display().to_string(),
        });
    }
    let json = save(model)?;
    std::fs::write(path, json).map_err(|e| CheckpointError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Unconditionally read a model from `path`.
pub fn read(path: &Path) -> CheckpointResult<DataModel> {
    let json = std::fs::read_to_string(path).map_err(|e| CheckpointError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load(&json)
}
