//! 集群任务记录（自定义资源）的读写和监听

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use inspection_core::{InspectionError, InspectionResult, TaskRecordConfig};
use inspection_domain::entities::format_time;
use inspection_domain::{Job, JobStatus, TaskEvent, TaskRecordClient, TaskSpec};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
    CustomResourceDefinitionVersion, CustomResourceValidation, JSONSchemaProps,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams, WatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, WatchEvent};
use kube::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use super::kube_error;

/// 监听从头开始时的 resourceVersion
const WATCH_FROM_START: &str = "0";

pub struct KubeTaskRecordClient {
    client: Client,
    definition: CustomResourceDefinition,
    api: Api<DynamicObject>,
    resource: ApiResource,
    namespace: String,
    resource_version: Arc<Mutex<String>>,
}

impl KubeTaskRecordClient {
    pub fn new(client: Client, config: &TaskRecordConfig) -> Self {
        let resource = task_resource(config);
        Self {
            definition: task_definition(config),
            api: Api::namespaced_with(client.clone(), &config.namespace, &resource),
            client,
            resource,
            namespace: config.namespace.clone(),
            resource_version: Arc::new(Mutex::new(WATCH_FROM_START.to_string())),
        }
    }
}

impl KubeTaskRecordClient {
    /// 管理集群上缺少任务记录的 CRD 时创建，返回是否新建
    pub async fn ensure_definition(&self) -> InspectionResult<bool> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let name = self.definition.metadata.name.clone().unwrap_or_default();
        if api.get_opt(&name).await.map_err(kube_error)?.is_some() {
            debug!("CRD {} 已存在", name);
            return Ok(false);
        }

        api.create(&PostParams::default(), &self.definition)
            .await
            .map_err(kube_error)?;
        info!("已创建任务记录 CRD {}", name);
        Ok(true)
    }
}

/// 任务记录的 CRD，spec 字段不做结构校验
pub fn task_definition(config: &TaskRecordConfig) -> CustomResourceDefinition {
    let open_object = JSONSchemaProps {
        type_: Some("object".to_string()),
        x_kubernetes_preserve_unknown_fields: Some(true),
        ..Default::default()
    };
    let schema = JSONSchemaProps {
        type_: Some("object".to_string()),
        properties: Some(BTreeMap::from([("spec".to_string(), open_object)])),
        ..Default::default()
    };

    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(format!("{}.{}", config.plural, config.group)),
            ..Default::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: config.group.clone(),
            names: CustomResourceDefinitionNames {
                kind: config.kind.clone(),
                plural: config.plural.clone(),
                singular: Some(config.kind.to_lowercase()),
                ..Default::default()
            },
            scope: "Namespaced".to_string(),
            versions: vec![CustomResourceDefinitionVersion {
                name: config.version.clone(),
                served: true,
                storage: true,
                schema: Some(CustomResourceValidation {
                    open_api_v3_schema: Some(schema),
                }),
                ..Default::default()
            }],
            ..Default::default()
        },
        status: None,
    }
}

pub fn task_resource(config: &TaskRecordConfig) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&config.group, &config.version, &config.kind);
    ApiResource::from_gvk_with_plural(&gvk, &config.plural)
}

/// 取出自定义资源中的 spec
pub fn decode_spec(object: &DynamicObject) -> InspectionResult<TaskSpec> {
    let spec = object
        .data
        .get("spec")
        .cloned()
        .ok_or_else(|| InspectionError::Serialization("任务记录缺少spec".to_string()))?;
    Ok(serde_json::from_value(spec)?)
}

fn remember_version(slot: &Mutex<String>, version: Option<&String>) {
    if let (Some(version), Ok(mut guard)) = (version, slot.lock()) {
        *guard = version.clone();
    }
}

fn to_task_event(
    event: WatchEvent<DynamicObject>,
    slot: &Mutex<String>,
) -> Option<InspectionResult<TaskEvent>> {
    let decode = |object: DynamicObject, wrap: fn(TaskSpec) -> TaskEvent| {
        remember_version(slot, object.metadata.resource_version.as_ref());
        Some(decode_spec(&object).map(wrap))
    };
    match event {
        WatchEvent::Added(object) => decode(object, TaskEvent::Added),
        WatchEvent::Modified(object) => decode(object, TaskEvent::Modified),
        WatchEvent::Deleted(object) => decode(object, TaskEvent::Deleted),
        WatchEvent::Bookmark(bookmark) => {
            remember_version(slot, Some(&bookmark.metadata.resource_version));
            None
        }
        WatchEvent::Error(err) => {
            // 410 表示版本过期，下次从头监听
            if err.code == 410 {
                if let Ok(mut guard) = slot.lock() {
                    *guard = WATCH_FROM_START.to_string();
                }
            }
            Some(Err(InspectionError::Kubernetes(format!(
                "监听任务记录出错: {} ({})",
                err.message, err.code
            ))))
        }
    }
}

#[async_trait]
impl TaskRecordClient for KubeTaskRecordClient {
    async fn create(&self, job: &Job) -> InspectionResult<()> {
        let spec = serde_json::to_value(TaskSpec::from(job))?;
        let object = DynamicObject::new(&job.job_id, &self.resource)
            .within(&self.namespace)
            .data(json!({ "spec": spec }));

        self.api
            .create(&PostParams::default(), &object)
            .await
            .map_err(kube_error)?;
        debug!("已创建任务记录 {}", job.job_id);
        Ok(())
    }

    async fn watch(&self) -> InspectionResult<BoxStream<'static, InspectionResult<TaskEvent>>> {
        let version = self
            .resource_version
            .lock()
            .map(|v| (*v).clone())
            .unwrap_or_else(|_| WATCH_FROM_START.to_string());
        let stream = self
            .api
            .watch(&WatchParams::default(), &version)
            .await
            .map_err(kube_error)?;

        let slot = Arc::clone(&self.resource_version);
        Ok(stream
            .filter_map(move |item| {
                let slot = Arc::clone(&slot);
                async move {
                    match item {
                        Ok(event) => to_task_event(event, &slot),
                        Err(err) => Some(Err(kube_error(err))),
                    }
                }
            })
            .boxed())
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()> {
        let mut object = self.api.get(job_id).await.map_err(kube_error)?;
        let Some(spec) = object.data.get_mut("spec").and_then(|s| s.as_object_mut()) else {
            warn!("任务记录 {} 缺少spec，跳过状态同步", job_id);
            return Err(InspectionError::Serialization(format!(
                "任务记录 {job_id} 缺少spec"
            )));
        };
        spec.insert("status".to_string(), json!(status.as_str()));
        if let Some(finish) = finish_time {
            spec.insert("finish_time".to_string(), json!(format_time(&finish)));
        }

        self.api
            .replace(job_id, &PostParams::default(), &object)
            .await
            .map_err(kube_error)?;
        Ok(())
    }
}
