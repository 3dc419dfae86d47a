//! Task sync endpoints

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::plans::parse_server_version;
use super::response::TOTAL_RECORDS;
use super::{parse_flag, ApiResponse, JsonCodec};
use crate::catalog::StoreResult;
use crate::config::TaskConfig;
use crate::error::{ApiError, ApiResult};

/// JSON body of a task sync call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSyncRequest {
    #[serde(default)]
    pub plan: Vec<String>,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub server_version: u64,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, rename = "return_count")]
    pub return_count: bool,
}

/// Query parameters of the older GET form of task sync
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyTaskSyncParams<'a> {
    /// Comma-separated plan identifiers
    pub plan: Option<&'a str>,
    /// Comma-separated group (jurisdiction) identifiers
    pub group: Option<&'a str>,
    pub server_version: Option<&'a str>,
    pub owner: Option<&'a str>,
    pub return_count: Option<&'a str>,
}

impl From<LegacyTaskSyncParams<'_>> for TaskSyncRequest {
    fn from(params: LegacyTaskSyncParams<'_>) -> Self {
        let split = |raw: Option<&str>| -> Vec<String> {
            raw.unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };
        Self {
            plan: split(params.plan),
            group: split(params.group),
            server_version: parse_server_version(params.server_version),
            owner: params.owner.map(String::from),
            return_count: parse_flag(params.return_count),
        }
    }
}

/// What a sync call selects tasks by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSyncQuery {
    ByGroup {
        plan: String,
        group: String,
        server_version: u64,
    },
    ByOwner {
        plan: String,
        owner: String,
        server_version: u64,
    },
}

impl TaskSyncRequest {
    /// Group wins over owner; a plan is always required
    pub fn query(&self) -> ApiResult<TaskSyncQuery> {
        let plan = self.plan.join(",");
        if plan.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Plan Identifier is missing".to_string()));
        }

        let group = self.group.join(",");
        if !group.trim().is_empty() {
            return Ok(TaskSyncQuery::ByGroup {
                plan,
                group,
                server_version: self.server_version,
            });
        }

        match self.owner.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => Ok(TaskSyncQuery::ByOwner {
                plan,
                owner: owner.to_string(),
                server_version: self.server_version,
            }),
            _ => Err(ApiError::InvalidRequest(
                "Either owner or group identifier field is missing".to_string(),
            )),
        }
    }
}

/// Task ids after a server version, with the last version seen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdentifiers {
    pub identifiers: Vec<String>,
    pub last_server_version: u64,
}

/// Status change for one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub identifier: String,
    pub status: String,
    #[serde(default)]
    pub business_status: Option<String>,
}

/// Optional window on when tasks were last modified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Bounds as sent in query parameters; an unreadable bound is ignored
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: from.and_then(parse_date_time),
            to: to.and_then(parse_date_time),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|at| at.and_utc()),
        Err(_) => {
            warn!("date {:?} is not readable, ignoring it", raw);
            None
        }
    }
}

/// Task storage
pub trait TaskService: Send + Sync {
    fn tasks(&self, query: &TaskSyncQuery) -> StoreResult<Vec<Value>>;

    fn count(&self, query: &TaskSyncQuery) -> StoreResult<u64>;

    fn task(&self, identifier: &str) -> StoreResult<Option<Value>>;

    /// Tasks ordered by server version, starting after `server_version`
    fn all_tasks(&self, server_version: u64, limit: usize) -> StoreResult<Vec<Value>>;

    fn task_ids(
        &self,
        server_version: u64,
        limit: usize,
        window: DateWindow,
    ) -> StoreResult<TaskIdentifiers>;

    fn add_task(&self, task: Value) -> StoreResult<()>;

    fn update_task(&self, task: Value) -> StoreResult<()>;

    /// Add or update each task; returns the identifiers that could not be saved
    fn save_tasks(&self, tasks: Vec<Value>) -> StoreResult<BTreeSet<String>>;

    /// Apply status changes; returns the identifiers that were updated
    fn update_task_status(&self, updates: &[TaskUpdate]) -> StoreResult<Vec<String>>;
}

pub struct TaskApi {
    service: Arc<dyn TaskService>,
    codec: JsonCodec,
    limits: TaskConfig,
}

impl TaskApi {
    pub fn new(service: Arc<dyn TaskService>, codec: JsonCodec, limits: TaskConfig) -> Self {
        Self {
            service,
            codec,
            limits,
        }
    }

    /// Sync from a JSON request body
    pub fn sync(&self, body: &str) -> ApiResponse {
        self.codec
            .decode::<TaskSyncRequest>(body)
            .and_then(|request| self.try_sync(&request))
            .unwrap_or_else(ApiResponse::from)
    }

    pub fn sync_legacy(&self, params: LegacyTaskSyncParams<'_>) -> ApiResponse {
        self.try_sync(&params.into())
            .unwrap_or_else(ApiResponse::from)
    }

    fn try_sync(&self, request: &TaskSyncRequest) -> ApiResult<ApiResponse> {
        let query = request.query()?;
        debug!("Task sync {:?}", query);

        let tasks = self.service.tasks(&query)?;
        let mut response = ApiResponse::ok(self.codec.encode(&tasks)?);
        if request.return_count {
            response = response.with_header(TOTAL_RECORDS, self.service.count(&query)?);
        }
        Ok(response)
    }

    pub fn get(&self, identifier: &str) -> ApiResponse {
        let result: ApiResult<ApiResponse> = self.service.task(identifier).map_err(Into::into).and_then(
            |task| match task {
                Some(task) => Ok(ApiResponse::ok(self.codec.encode(&task)?)),
                None => Ok(ApiResponse::not_found()),
            },
        );
        result.unwrap_or_else(ApiResponse::from)
    }

    /// Page through all tasks; `limit` defaults to the configured page size
    pub fn get_all(&self, server_version: u64, limit: Option<usize>) -> ApiResponse {
        let limit = limit.unwrap_or(self.limits.default_limit);
        self.service
            .all_tasks(server_version, limit)
            .map_err(ApiError::from)
            .and_then(|tasks| self.codec.encode(&tasks))
            .map(ApiResponse::ok)
            .unwrap_or_else(ApiResponse::from)
    }

    /// Task ids after `server_version`, optionally limited to a modification window
    pub fn find_ids(
        &self,
        server_version: u64,
        from_date: Option<&str>,
        to_date: Option<&str>,
    ) -> ApiResponse {
        let window = DateWindow::parse(from_date, to_date);
        self.service
            .task_ids(server_version, self.limits.max_ids_limit, window)
            .map_err(ApiError::from)
            .and_then(|ids| self.codec.encode(&ids))
            .map(ApiResponse::ok)
            .unwrap_or_else(ApiResponse::from)
    }

    pub fn create(&self, body: &str) -> ApiResponse {
        self.write(body, |task| self.service.add_task(task))
    }

    pub fn update(&self, body: &str) -> ApiResponse {
        self.write(body, |task| self.service.update_task(task))
    }

    fn write(&self, body: &str, save: impl FnOnce(Value) -> StoreResult<()>) -> ApiResponse {
        let result = self.codec.decode::<Map<String, Value>>(body).and_then(|task| {
            debug!("Saving task {}", task.get("identifier").unwrap_or(&serde_json::Value::Null));
            save(Value::Object(task))?;
            Ok(ApiResponse::created(None))
        });
        result.unwrap_or_else(ApiResponse::from)
    }

    /// Save a list of tasks; tasks that fail are named in the reply
    pub fn batch_save(&self, body: &str) -> ApiResponse {
        let result = self.codec.decode::<Vec<Map<String, Value>>>(body).and_then(|tasks| {
            let tasks: Vec<Value> = tasks.into_iter().map(Value::Object).collect();
            info!("Saving {} tasks", tasks.len());
            let failed = self.service.save_tasks(tasks)?;
            let message = if failed.is_empty() {
                "All Tasks  processed".to_string()
            } else {
                let failed: Vec<String> = failed.into_iter().collect();
                format!("Tasks with identifiers not processed: {}", failed.join(","))
            };
            Ok(ApiResponse::created(Some(message)))
        });
        result.unwrap_or_else(ApiResponse::from)
    }

    pub fn update_status(&self, body: &str) -> ApiResponse {
        let result = self.codec.decode::<Vec<TaskUpdate>>(body).and_then(|updates| {
            let updated = self.service.update_task_status(&updates)?;
            if updated.is_empty() {
                return Ok(ApiResponse::created(Some("Tasks not Updated: ".to_string())));
            }
            let body = self.codec.encode(&json!({ "task_ids": updated }))?;
            Ok(ApiResponse::created(Some(body)))
        });
        result.unwrap_or_else(ApiResponse::from)
    }
}
