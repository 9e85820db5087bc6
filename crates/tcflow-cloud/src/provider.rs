//! Managed resource trait and local state commit rules
//!
//! Every resource type exposes the four CRUD entry points. The helpers in
//! this module decide what reaches local state:
//!
//! - a failed create commits nothing, so the next apply starts from scratch
//! - a failed update keeps the prior state; the next read reconciles it
//! - a read that finds nothing clears the entry

use crate::error::{CloudError, Result};
use crate::state::{GlobalState, ResourceState};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// CRUD surface of one resource type
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Desired configuration
    type Config: Send + Sync;

    /// Observed remote state, as stored in local state attributes
    type Observed: Serialize + Send;

    /// Resource type name (e.g. "elasticsearch_instance")
    fn resource_type(&self) -> &str;

    /// Create the entity and wait until it is usable; returns its id
    async fn create(&self, config: &Self::Config) -> Result<String>;

    /// Observe the entity; `None` when it does not exist
    async fn read(&self, id: &str) -> Result<Option<Self::Observed>>;

    /// Drive the entity from `old` to `new` configuration
    async fn update(&self, id: &str, old: &Self::Config, new: &Self::Config) -> Result<()>;

    /// Delete the entity and wait until it is gone
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Local state key of a managed resource
pub fn state_key(resource_type: &str, name: &str) -> String {
    format!("{}:{}", resource_type, name)
}

fn attributes_of<T: Serialize>(observed: &T) -> Result<HashMap<String, serde_json::Value>> {
    match serde_json::to_value(observed)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Ok(HashMap::from([("value".to_string(), other)])),
    }
}

fn record<R: ManagedResource + ?Sized>(
    resource: &R,
    name: &str,
    id: &str,
    observed: &R::Observed,
    state: &mut GlobalState,
) -> Result<()> {
    let key = state_key(resource.resource_type(), name);
    let mut entry = state
        .get_resource(&key)
        .filter(|existing| existing.id == id)
        .cloned()
        .unwrap_or_else(|| ResourceState::new(id, resource.resource_type()));
    entry.replace_attributes(attributes_of(observed)?);
    state.set_resource(key, entry);
    Ok(())
}

fn committed_id(state: &GlobalState, resource_type: &str, name: &str) -> Result<String> {
    state
        .get_resource(&state_key(resource_type, name))
        .map(|r| r.id.clone())
        .ok_or_else(|| CloudError::ResourceNotFound(state_key(resource_type, name)))
}

/// Create, read back, and commit the new id
pub async fn create_and_commit<R: ManagedResource + ?Sized>(
    resource: &R,
    name: &str,
    config: &R::Config,
    state: &mut GlobalState,
) -> Result<String> {
    let id = resource.create(config).await?;
    let observed = resource
        .read(&id)
        .await?
        .ok_or_else(|| CloudError::ResourceNotFound(id.clone()))?;
    record(resource, name, &id, &observed, state)?;
    tracing::info!(resource_type = resource.resource_type(), name, id = %id, "created");
    Ok(id)
}

/// Read the committed entity, clearing local state when it is gone
pub async fn read_and_reconcile<R: ManagedResource + ?Sized>(
    resource: &R,
    name: &str,
    state: &mut GlobalState,
) -> Result<Option<R::Observed>> {
    let key = state_key(resource.resource_type(), name);
    let Some(id) = state.get_resource(&key).map(|r| r.id.clone()) else {
        return Ok(None);
    };

    let observed = match resource.read(&id).await {
        Ok(observed) => observed,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    match observed {
        Some(observed) => {
            record(resource, name, &id, &observed, state)?;
            Ok(Some(observed))
        }
        None => {
            tracing::warn!(resource_type = resource.resource_type(), name, id = %id, "resource is gone, clearing state");
            state.remove_resource(&key);
            Ok(None)
        }
    }
}

/// Update the committed entity and refresh its attributes
pub async fn update_and_commit<R: ManagedResource + ?Sized>(
    resource: &R,
    name: &str,
    old: &R::Config,
    new: &R::Config,
    state: &mut GlobalState,
) -> Result<()> {
    let id = committed_id(state, resource.resource_type(), name)?;
    resource.update(&id, old, new).await?;
    read_and_reconcile(resource, name, state).await?;
    Ok(())
}

/// Delete the committed entity and drop it from local state
pub async fn delete_and_commit<R: ManagedResource + ?Sized>(
    resource: &R,
    name: &str,
    state: &mut GlobalState,
) -> Result<()> {
    let id = committed_id(state, resource.resource_type(), name)?;
    resource.delete(&id).await?;
    state.remove_resource(&state_key(resource.resource_type(), name));
    tracing::info!(resource_type = resource.resource_type(), name, id = %id, "deleted");
    Ok(())
}
