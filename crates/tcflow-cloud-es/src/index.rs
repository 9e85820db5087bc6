//! Elasticsearch index resource
//!
//! Index metadata (settings and mappings) is a free-form JSON document. The
//! update API only accepts the changed branches, so updates diff the backend's
//! current document against the desired one and send the folded result.

use crate::api::{CreateIndexRequest, EsApi, UpdateIndexRequest};
use crate::model::{IndexHealth, IndexMetaField, IndexState};
use crate::service::{ElasticsearchService, Timeouts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tcflow_cloud::patch::{NUMERIC_STRING_SETTINGS, build_partial_update_coerced, coerce_numeric_strings, parse_document};
use tcflow_cloud::retry::invoke;
use tcflow_cloud::waiter::WaitSpec;
use tcflow_cloud::{CloudError, ManagedResource, Result, id, orchestrate};

pub const RESOURCE_TYPE: &str = "elasticsearch_index";

const CREATE_ABSENT_TOLERANCE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub instance_id: String,
    #[serde(default = "default_index_type")]
    pub index_type: String,
    pub index_name: String,
    /// Settings and mappings as a JSON object
    #[serde(default = "empty_document")]
    pub index_meta_json: String,
}

fn default_index_type() -> String {
    "normal".to_string()
}

fn empty_document() -> String {
    "{}".to_string()
}

pub struct ElasticsearchIndex<A: ?Sized> {
    service: ElasticsearchService<A>,
    timeouts: Timeouts,
}

/// Keep only the branches of `doc` that also exist in `shape`
///
/// The backend reports defaults nobody configured (uuid, creation date, ...);
/// diffing against them would turn every one into a removal.
fn project(doc: &Value, shape: &Value) -> Value {
    match (doc, shape) {
        (Value::Object(doc), Value::Object(shape)) => Value::Object(
            doc.iter()
                .filter_map(|(key, value)| shape.get(key).map(|s| (key.clone(), project(value, s))))
                .collect::<Map<String, Value>>(),
        ),
        _ => doc.clone(),
    }
}

fn raw_meta(field: &IndexMetaField) -> Result<Value> {
    match field.index_meta_json.as_deref() {
        Some(text) if !text.trim().is_empty() => parse_document(text),
        _ => Ok(Value::Object(Map::new())),
    }
}

impl<A: EsApi + ?Sized> ElasticsearchIndex<A> {
    pub fn new(service: ElasticsearchService<A>, timeouts: Timeouts) -> Self {
        Self { service, timeouts }
    }

    async fn describe_raw(&self, instance_id: &str, index_type: &str, index_name: &str) -> Result<Option<IndexMetaField>> {
        invoke(&self.timeouts.read, "DescribeIndexMeta", || {
            self.service.describe_index(instance_id, index_type, index_name)
        })
        .await
    }

    async fn describe(&self, instance_id: &str, index_type: &str, index_name: &str) -> Result<Option<IndexState>> {
        let Some(field) = self.describe_raw(instance_id, index_type, index_name).await? else {
            return Ok(None);
        };
        let mut meta = raw_meta(&field)?;
        coerce_numeric_strings(&mut meta, NUMERIC_STRING_SETTINGS);
        Ok(Some(IndexState {
            instance_id: instance_id.to_string(),
            index_type: field.index_type,
            index_name: field.index_name,
            health: field.index_status.unwrap_or_default(),
            meta,
        }))
    }

    fn ready_wait(&self) -> WaitSpec<IndexHealth> {
        WaitSpec::reach([IndexHealth::Green, IndexHealth::Yellow], self.timeouts.read.max_elapsed)
            .tolerate_absent(CREATE_ABSENT_TOLERANCE)
            .poll_every(self.timeouts.poll_interval)
    }
}

#[async_trait]
impl<A: EsApi + ?Sized> ManagedResource for ElasticsearchIndex<A> {
    type Config = IndexConfig;
    type Observed = IndexState;

    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &IndexConfig) -> Result<String> {
        // reject bad documents before anything is submitted
        parse_document(&config.index_meta_json)?;
        let request = CreateIndexRequest {
            instance_id: config.instance_id.clone(),
            index_type: config.index_type.clone(),
            index_name: config.index_name.clone(),
            index_meta_json: config.index_meta_json.clone(),
        };
        let index_id = id::compose(&[&config.instance_id, &config.index_type, &config.index_name]);
        orchestrate(
            &format!("{} {}", RESOURCE_TYPE, index_id),
            "CreateIndex",
            &self.timeouts.write,
            || self.service.create_index(&request),
            &self.ready_wait(),
            || self.describe(&config.instance_id, &config.index_type, &config.index_name),
        )
        .await?;
        Ok(index_id)
    }

    async fn read(&self, index_id: &str) -> Result<Option<IndexState>> {
        let [instance_id, index_type, index_name] = id::split::<3>(index_id)?;
        self.describe(instance_id, index_type, index_name).await
    }

    async fn update(&self, index_id: &str, old: &IndexConfig, new: &IndexConfig) -> Result<()> {
        let [instance_id, index_type, index_name] = id::split::<3>(index_id)?;
        if old.instance_id != new.instance_id || old.index_type != new.index_type || old.index_name != new.index_name {
            return Err(CloudError::InvalidConfig(
                "instance_id, index_type and index_name cannot be changed in place".into(),
            ));
        }

        let desired = parse_document(&new.index_meta_json)?;
        let applied = parse_document(&old.index_meta_json)?;
        let field = self
            .describe_raw(instance_id, index_type, index_name)
            .await?
            .ok_or_else(|| CloudError::ResourceNotFound(index_id.to_string()))?;
        let current = project(&raw_meta(&field)?, &applied);

        let partial = build_partial_update_coerced(&current, &desired, NUMERIC_STRING_SETTINGS)?;
        if partial.as_object().is_some_and(Map::is_empty) {
            tracing::debug!(index_id, "index metadata unchanged");
            return Ok(());
        }

        let request = UpdateIndexRequest {
            instance_id: instance_id.to_string(),
            index_type: index_type.to_string(),
            index_name: index_name.to_string(),
            update_meta_json: serde_json::to_string(&partial)?,
        };
        tracing::info!(index_id, update = %request.update_meta_json, "updating index metadata");
        orchestrate(
            &format!("{} {}", RESOURCE_TYPE, index_id),
            "UpdateIndex",
            &self.timeouts.write,
            || self.service.update_index(&request),
            &self.ready_wait(),
            || self.describe(instance_id, index_type, index_name),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, index_id: &str) -> Result<()> {
        let [instance_id, index_type, index_name] = id::split::<3>(index_id)?;
        let spec = WaitSpec::absent(self.timeouts.read.max_elapsed).poll_every(self.timeouts.poll_interval);
        orchestrate(
            &format!("{} {}", RESOURCE_TYPE, index_id),
            "DeleteIndex",
            &self.timeouts.write,
            || self.service.delete_index(instance_id, index_type, index_name),
            &spec,
            || self.describe(instance_id, index_type, index_name),
        )
        .await?;
        Ok(())
    }
}
