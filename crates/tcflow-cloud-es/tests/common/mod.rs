#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tcflow_cloud::ApiError;
use tcflow_cloud::patch::{NUMERIC_STRING_SETTINGS, merge_partial_update};
use tcflow_cloud::retry::RetryPolicy;
use tcflow_cloud_es::model::NodeInfo;
use tcflow_cloud_es::{ElasticsearchService, EsApi, InstanceConfig, Timeouts};

/// Short budgets so that timeout paths finish quickly under paused time
pub fn timeouts() -> Timeouts {
    Timeouts {
        write: RetryPolicy::new(Duration::from_secs(30)),
        read: RetryPolicy::new(Duration::from_secs(60)),
        poll_interval: Duration::from_secs(1),
    }
}

pub fn service(fake: &Arc<FakeEs>) -> ElasticsearchService<FakeEs> {
    ElasticsearchService::new(Arc::clone(fake))
}

pub fn instance_config(name: &str) -> InstanceConfig {
    InstanceConfig {
        instance_name: name.to_string(),
        availability_zone: "ap-guangzhou-3".to_string(),
        version: "7.10.1".to_string(),
        vpc_id: "vpc-4owdpnwr".to_string(),
        subnet_id: "subnet-4o0zd840".to_string(),
        password: "Tencent@2024".to_string(),
        license_type: "platinum".to_string(),
        basic_security_type: None,
        charge_type: "POSTPAID_BY_HOUR".to_string(),
        node_info_list: vec![NodeInfo {
            r#type: "hotData".to_string(),
            node_num: 2,
            node_type: "ES.SA2.MEDIUM4".to_string(),
            disk_type: Some("CLOUD_SSD".to_string()),
            disk_size: Some(100),
        }],
        es_acl: None,
        protocol: None,
        kibana_public_access: None,
        kibana_private_access: None,
        web_node_type_info: None,
    }
}

pub fn api_error(code: &str) -> ApiError {
    ApiError::new(code, format!("{} (injected)", code)).with_request_id("req-fake")
}

/// Scripted in-memory Elasticsearch backend
///
/// Status codes listed in a script are reported by successive describe calls
/// before the entity falls back to its settled status.
#[derive(Default)]
pub struct FakeEs {
    inner: Mutex<Backend>,
}

#[derive(Default)]
struct Backend {
    next_id: u32,
    calls: Vec<(String, Value)>,
    failures: HashMap<String, VecDeque<ApiError>>,

    /// Statuses reported after create and after every mutation
    create_script: Vec<i64>,
    mutation_script: Vec<i64>,
    /// Describes that miss a freshly created instance
    create_invisible: u32,
    /// Describes that still see an instance after delete was accepted
    delete_lag: u32,
    /// Statuses reported after a pipeline deploy; two "deploying" polls when unset
    pipeline_script: Option<Vec<i64>>,

    scripts: HashMap<String, VecDeque<i64>>,
    invisible: HashMap<String, u32>,
    deleting: HashMap<String, u32>,

    instances: BTreeMap<String, Value>,
    plugins: HashMap<String, Vec<String>>,
    indices: BTreeMap<String, Value>,
    logstash: BTreeMap<String, Value>,
    pipelines: BTreeMap<String, Value>,
}

impl FakeEs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Backend) -> T) -> T {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn set_create_script(&self, statuses: &[i64]) {
        self.with(|b| b.create_script = statuses.to_vec());
    }

    pub fn set_mutation_script(&self, statuses: &[i64]) {
        self.with(|b| b.mutation_script = statuses.to_vec());
    }

    pub fn set_create_invisible(&self, describes: u32) {
        self.with(|b| b.create_invisible = describes);
    }

    pub fn set_pipeline_script(&self, statuses: &[i64]) {
        self.with(|b| b.pipeline_script = Some(statuses.to_vec()));
    }

    pub fn set_delete_lag(&self, describes: u32) {
        self.with(|b| b.delete_lag = describes);
    }

    /// Fail the next call of `action` with `code`
    pub fn fail_next(&self, action: &str, code: &str) {
        self.with(|b| {
            b.failures
                .entry(action.to_string())
                .or_default()
                .push_back(api_error(code))
        });
    }

    pub fn calls(&self, action: &str) -> Vec<Value> {
        self.with(|b| {
            b.calls
                .iter()
                .filter(|(a, _)| a == action)
                .map(|(_, body)| body.clone())
                .collect()
        })
    }

    pub fn call_count(&self, action: &str) -> usize {
        self.calls(action).len()
    }

    /// Actions other than describes, in call order
    pub fn mutations(&self) -> Vec<String> {
        self.with(|b| {
            b.calls
                .iter()
                .map(|(a, _)| a.clone())
                .filter(|a| !a.starts_with("Describe"))
                .collect()
        })
    }

    pub fn instance(&self, id: &str) -> Option<Value> {
        self.with(|b| b.instances.get(id).cloned())
    }

    pub fn seed_instance(&self, id: &str, name: &str) {
        self.with(|b| {
            b.instances.insert(
                id.to_string(),
                json!({"InstanceId": id, "InstanceName": name, "Status": 1}),
            )
        });
    }

    /// Stored index metadata document, as the backend keeps it
    pub fn index_meta(&self, key: &str) -> Option<Value> {
        self.with(|b| {
            b.indices
                .get(key)
                .and_then(|i| i["IndexMetaJson"].as_str().map(|s| serde_json::from_str(s).unwrap()))
        })
    }

    pub fn set_index_status(&self, key: &str, status: &str) {
        self.with(|b| {
            if let Some(index) = b.indices.get_mut(key) {
                index["IndexStatus"] = json!(status);
            }
        });
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::new("ResourceNotFound", format!("{} does not exist", what))
}

fn str_field<'a>(request: &'a Value, key: &str) -> &'a str {
    request[key].as_str().unwrap_or_default()
}

/// Numeric index settings are stored and echoed back as strings
fn stringify_settings(doc: &mut Value) {
    match doc {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if NUMERIC_STRING_SETTINGS.contains(&key.as_str()) && value.is_number() {
                    *value = Value::String(value.to_string());
                } else {
                    stringify_settings(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(stringify_settings),
        _ => {}
    }
}

impl Backend {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    fn start_script(&mut self, key: &str, statuses: &[i64]) {
        self.scripts
            .insert(key.to_string(), statuses.iter().copied().collect());
    }

    fn observe_status(&mut self, key: &str, settled: i64) -> i64 {
        self.scripts
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(settled)
    }

    /// Visibility of `key` to one describe call, with its reported status
    fn observe(&mut self, key: &str, settled: i64) -> Option<i64> {
        if let Some(n) = self.invisible.get_mut(key).filter(|n| **n > 0) {
            *n -= 1;
            return None;
        }
        if let Some(n) = self.deleting.get_mut(key) {
            if *n == 0 {
                self.deleting.remove(key);
                self.instances.remove(key);
                self.logstash.remove(key);
                return None;
            }
            *n -= 1;
            return Some(-2);
        }
        Some(self.observe_status(key, settled))
    }

    fn mutate_instance(&mut self, request: &Value, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<Value, ApiError> {
        let id = str_field(request, "InstanceId").to_string();
        let instance = self
            .instances
            .get_mut(&id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| not_found(&id))?;
        apply(instance);
        let script = self.mutation_script.clone();
        self.start_script(&id, &script);
        Ok(json!({}))
    }

    fn handle(&mut self, action: &str, request: &Value) -> Result<Value, ApiError> {
        match action {
            "CreateInstance" => {
                let id = self.new_id("es");
                self.instances.insert(
                    id.clone(),
                    json!({
                        "InstanceId": id,
                        "InstanceName": request["InstanceName"],
                        "Status": 1,
                        "Zone": request["Zone"],
                        "EsVersion": request["EsVersion"],
                        "LicenseType": request["LicenseType"],
                        "VpcId": request["VpcId"],
                        "SubnetId": request["SubnetId"],
                        "ChargeType": request["ChargeType"],
                        "NodeInfoList": request["NodeInfoList"],
                        "Protocol": request.get("Protocol").cloned().unwrap_or(json!("http")),
                        "WebNodeTypeInfo": request.get("WebNodeTypeInfo").cloned().unwrap_or(Value::Null),
                        "KibanaPublicAccess": "OPEN",
                        "KibanaPrivateAccess": "CLOSE",
                    }),
                );
                let script = self.create_script.clone();
                self.start_script(&id, &script);
                self.invisible.insert(id.clone(), self.create_invisible);
                Ok(json!({"InstanceId": id}))
            }
            "DescribeInstances" => {
                let wanted: Vec<String> = request["InstanceIds"]
                    .as_array()
                    .map(|ids| ids.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                let keys: Vec<String> = if wanted.is_empty() {
                    self.instances.keys().cloned().collect()
                } else {
                    wanted
                };
                let mut list = Vec::new();
                for key in keys {
                    let Some(settled) = self.instances.get(&key).map(|i| i["Status"].as_i64().unwrap_or(1)) else {
                        continue;
                    };
                    if let Some(status) = self.observe(&key, settled) {
                        let mut info = self.instances[&key].clone();
                        info["Status"] = json!(status);
                        list.push(info);
                    }
                }
                let total = list.len();
                let offset = request["Offset"].as_u64().unwrap_or(0) as usize;
                let limit = request["Limit"].as_u64().unwrap_or(20) as usize;
                let page: Vec<Value> = list.into_iter().skip(offset).take(limit).collect();
                Ok(json!({"TotalCount": total, "InstanceList": page}))
            }
            "UpdateInstance" => self.mutate_instance(request, |instance| {
                for (from, to) in [
                    ("InstanceName", "InstanceName"),
                    ("NodeInfoList", "NodeInfoList"),
                    ("EsAcl", "EsAcl"),
                    ("BasicSecurityType", "SecurityType"),
                    ("Protocol", "Protocol"),
                    ("KibanaPublicAccess", "KibanaPublicAccess"),
                    ("KibanaPrivateAccess", "KibanaPrivateAccess"),
                    ("WebNodeTypeInfo", "WebNodeTypeInfo"),
                ] {
                    if let Some(value) = request.get(from) {
                        instance.insert(to.to_string(), value.clone());
                    }
                }
            }),
            "UpgradeInstance" => self.mutate_instance(request, |instance| {
                instance.insert("EsVersion".into(), request["EsVersion"].clone());
            }),
            "UpgradeLicense" => self.mutate_instance(request, |instance| {
                instance.insert("LicenseType".into(), request["LicenseType"].clone());
            }),
            "RestartInstance" => self.mutate_instance(request, |_| {}),
            "UpdatePlugins" => {
                let id = str_field(request, "InstanceId").to_string();
                self.mutate_instance(request, |_| {})?;
                let plugins = self.plugins.entry(id).or_default();
                let names = |key: &str| -> Vec<String> {
                    request[key]
                        .as_array()
                        .map(|l| l.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default()
                };
                plugins.retain(|p| !names("RemovePluginList").contains(p));
                plugins.extend(names("InstallPluginList"));
                Ok(json!({}))
            }
            "DescribeInstancePluginList" => {
                let id = str_field(request, "InstanceId");
                let list: Vec<Value> = self
                    .plugins
                    .get(id)
                    .into_iter()
                    .flatten()
                    .map(|p| json!({"PluginName": p, "PluginVersion": "7.10.1"}))
                    .collect();
                Ok(json!({"PluginList": list}))
            }
            "DeleteInstance" => {
                let id = str_field(request, "InstanceId").to_string();
                if !self.instances.contains_key(&id) || self.deleting.contains_key(&id) {
                    return Err(not_found(&id));
                }
                self.scripts.remove(&id);
                self.deleting.insert(id, self.delete_lag);
                Ok(json!({}))
            }

            "CreateIndex" | "DescribeIndexMeta" | "UpdateIndex" | "DeleteIndex" => {
                let key = format!(
                    "{}#{}#{}",
                    str_field(request, "InstanceId"),
                    str_field(request, "IndexType"),
                    str_field(request, "IndexName")
                );
                self.handle_index(action, &key, request)
            }

            "CreateLogstashInstance" => {
                let id = self.new_id("ls");
                let mut info = request.clone();
                info["InstanceId"] = json!(id);
                info["Status"] = json!(1);
                self.logstash.insert(id.clone(), info);
                let script = self.create_script.clone();
                self.start_script(&id, &script);
                Ok(json!({"InstanceId": id}))
            }
            "DescribeLogstashInstances" => {
                let mut list = Vec::new();
                for key in request["InstanceIds"].as_array().cloned().unwrap_or_default() {
                    let key = key.as_str().unwrap_or_default().to_string();
                    let Some(settled) = self.logstash.get(&key).map(|i| i["Status"].as_i64().unwrap_or(1)) else {
                        continue;
                    };
                    if let Some(status) = self.observe(&key, settled) {
                        let mut info = self.logstash[&key].clone();
                        info["Status"] = json!(status);
                        list.push(info);
                    }
                }
                Ok(json!({"InstanceList": list}))
            }
            "UpdateLogstashInstance" => {
                let id = str_field(request, "InstanceId").to_string();
                let info = self
                    .logstash
                    .get_mut(&id)
                    .and_then(Value::as_object_mut)
                    .ok_or_else(|| not_found(&id))?;
                for (key, value) in request.as_object().into_iter().flatten() {
                    info.insert(key.clone(), value.clone());
                }
                let script = self.mutation_script.clone();
                self.start_script(&id, &script);
                Ok(json!({}))
            }
            "DeleteLogstashInstance" => {
                let id = str_field(request, "InstanceId").to_string();
                if !self.logstash.contains_key(&id) {
                    return Err(not_found(&id));
                }
                self.deleting.insert(id, self.delete_lag);
                Ok(json!({}))
            }

            "SaveAndDeployLogstashPipeline" => {
                let instance_id = str_field(request, "InstanceId");
                let mut pipeline = request["Pipeline"].clone();
                let key = format!("{}#{}", instance_id, str_field(&pipeline, "PipelineId"));
                pipeline["Status"] = json!(1);
                self.pipelines.insert(key.clone(), pipeline);
                let script = self.pipeline_script.clone().unwrap_or_else(|| vec![0, 0]);
                self.start_script(&key, &script);
                Ok(json!({}))
            }
            "DescribeLogstashPipelines" => {
                let prefix = format!("{}#", str_field(request, "InstanceId"));
                let keys: Vec<String> = self
                    .pipelines
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect();
                let mut list = Vec::new();
                for key in keys {
                    let mut pipeline = self.pipelines[&key].clone();
                    let settled = pipeline["Status"].as_i64().unwrap_or(1);
                    pipeline["Status"] = json!(self.observe_status(&key, settled));
                    list.push(pipeline);
                }
                Ok(json!({"LogstashPipelineList": list}))
            }
            "StartLogstashPipelines" | "StopLogstashPipelines" | "DeleteLogstashPipelines" => {
                let instance_id = str_field(request, "InstanceId").to_string();
                for pid in request["PipelineIds"].as_array().cloned().unwrap_or_default() {
                    let key = format!("{}#{}", instance_id, pid.as_str().unwrap_or_default());
                    if action == "DeleteLogstashPipelines" {
                        self.pipelines.remove(&key).ok_or_else(|| not_found(&key))?;
                        continue;
                    }
                    let pipeline = self.pipelines.get_mut(&key).ok_or_else(|| not_found(&key))?;
                    pipeline["Status"] = json!(if action == "StartLogstashPipelines" { 1 } else { 2 });
                }
                Ok(json!({}))
            }
            other => Err(ApiError::new("UnsupportedOperation", format!("unknown action {}", other))),
        }
    }

    fn handle_index(&mut self, action: &str, key: &str, request: &Value) -> Result<Value, ApiError> {
        match action {
            "CreateIndex" => {
                let mut meta: Value = serde_json::from_str(str_field(request, "IndexMetaJson"))
                    .map_err(|e| ApiError::new("InvalidParameter", e.to_string()))?;
                stringify_settings(&mut meta);
                self.indices.insert(
                    key.to_string(),
                    json!({
                        "IndexName": request["IndexName"],
                        "IndexType": request["IndexType"],
                        "IndexStatus": "green",
                        "IndexMetaJson": meta.to_string(),
                    }),
                );
                Ok(json!({}))
            }
            "DescribeIndexMeta" => Ok(match self.indices.get(key) {
                Some(index) => json!({"IndexMetaField": index}),
                None => json!({}),
            }),
            "UpdateIndex" => {
                let index = self.indices.get_mut(key).ok_or_else(|| not_found(key))?;
                let update: Value = serde_json::from_str(str_field(request, "UpdateMetaJson"))
                    .map_err(|e| ApiError::new("InvalidParameter", e.to_string()))?;
                let mut meta: Value = serde_json::from_str(index["IndexMetaJson"].as_str().unwrap_or("{}"))
                    .map_err(|e| ApiError::new("InternalError", e.to_string()))?;
                merge_partial_update(&mut meta, &update);
                stringify_settings(&mut meta);
                index["IndexMetaJson"] = json!(meta.to_string());
                Ok(json!({}))
            }
            _ => {
                self.indices.remove(key).ok_or_else(|| not_found(key))?;
                Ok(json!({}))
            }
        }
    }
}

#[async_trait]
impl EsApi for FakeEs {
    async fn call(&self, action: &str, request: Value) -> Result<Value, ApiError> {
        let mut backend = self.inner.lock().unwrap();
        backend.calls.push((action.to_string(), request.clone()));
        if let Some(err) = backend.failures.get_mut(action).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        backend.handle(action, &request)
    }
}
