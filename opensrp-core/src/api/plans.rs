//! Plan definition endpoints
//!
//! Plans are passed through as JSON documents. Clients may ask for a subset of
//! fields; only names on the plan allow-list can be requested.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::{ApiResponse, JsonCodec};
use crate::catalog::StoreResult;
use crate::error::{ApiError, ApiResult};

/// Field names of a plan definition a client may request
pub const PLAN_FIELDS: &[&str] = &[
    "identifier",
    "description",
    "version",
    "name",
    "title",
    "status",
    "date",
    "effectivePeriod",
    "useContext",
    "jurisdiction",
    "serverVersion",
    "goal",
    "action",
    "experimental",
];

/// Plan storage
pub trait PlanStore: Send + Sync {
    fn all_plans(&self) -> StoreResult<Vec<Value>>;

    fn plans_by_identifiers(&self, identifiers: &[String]) -> StoreResult<Vec<Value>>;

    /// Plans changed after `server_version` in any of the operational areas
    fn plans_by_server_version_and_area(
        &self,
        server_version: u64,
        operational_area_ids: &[String],
    ) -> StoreResult<Vec<Value>>;

    fn add_plan(&self, plan: Value) -> StoreResult<()>;

    fn update_plan(&self, plan: Value) -> StoreResult<()>;
}

/// Reject the first requested field that is not a plan field
pub fn check_fields(fields: &[String]) -> ApiResult<()> {
    match fields.iter().find(|f| !PLAN_FIELDS.contains(&f.as_str())) {
        Some(field) => Err(ApiError::InvalidRequest(format!("{} field is invalid", field))),
        None => Ok(()),
    }
}

/// Keep only the requested fields of a plan; no fields keeps everything
pub fn project(plan: Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return plan;
    }
    match plan {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| fields.iter().any(|f| f == key))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Server version sent as a query parameter; anything unparsable means "from the start"
pub fn parse_server_version(raw: Option<&str>) -> u64 {
    match raw.map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("server version {:?} is not a number", raw);
            0
        }),
    }
}

pub struct PlanApi {
    store: Arc<dyn PlanStore>,
    codec: JsonCodec,
}

impl PlanApi {
    pub fn new(store: Arc<dyn PlanStore>, codec: JsonCodec) -> Self {
        Self { store, codec }
    }

    pub fn list(&self) -> ApiResponse {
        self.store
            .all_plans()
            .map_err(ApiError::from)
            .and_then(|plans| self.codec.encode(&plans))
            .map(ApiResponse::ok)
            .unwrap_or_else(ApiResponse::from)
    }

    /// Store a new plan definition sent as a JSON object
    pub fn create(&self, body: &str) -> ApiResponse {
        self.write(body, |plan| self.store.add_plan(plan))
    }

    /// Replace a stored plan definition
    pub fn update(&self, body: &str) -> ApiResponse {
        self.write(body, |plan| self.store.update_plan(plan))
    }

    fn write(&self, body: &str, save: impl FnOnce(Value) -> StoreResult<()>) -> ApiResponse {
        let result = self.codec.decode::<Map<String, Value>>(body).and_then(|plan| {
            info!("Saving plan {}", plan.get("identifier").unwrap_or(&serde_json::Value::Null));
            save(Value::Object(plan))?;
            Ok(ApiResponse::created(None))
        });
        result.unwrap_or_else(ApiResponse::from)
    }

    /// Plans by identifier, reduced to the requested fields
    pub fn find_by_ids_with_fields(&self, identifiers: &[String], fields: &[String]) -> ApiResponse {
        self.try_find(identifiers, fields)
            .unwrap_or_else(ApiResponse::from)
    }

    /// A single plan, reduced to the requested fields
    ///
    /// Field names are not checked against the allow-list here; unknown
    /// names simply select nothing.
    pub fn get(&self, identifier: &str, fields: &[String]) -> ApiResponse {
        if identifier.trim().is_empty() {
            return ApiError::InvalidRequest("Plan Id is required".to_string()).into();
        }
        self.select(&[identifier.to_string()], fields)
            .unwrap_or_else(ApiResponse::from)
    }

    fn try_find(&self, identifiers: &[String], fields: &[String]) -> ApiResult<ApiResponse> {
        check_fields(fields)?;
        self.select(identifiers, fields)
    }

    fn select(&self, identifiers: &[String], fields: &[String]) -> ApiResult<ApiResponse> {
        let plans: Vec<Value> = self
            .store
            .plans_by_identifiers(identifiers)?
            .into_iter()
            .map(|plan| project(plan, fields))
            .collect();
        Ok(ApiResponse::ok(self.codec.encode(&plans)?))
    }

    /// Plans for the given operational areas changed since `server_version`
    pub fn sync(&self, server_version: Option<&str>, operational_area_ids: &[String]) -> ApiResponse {
        let server_version = parse_server_version(server_version);
        if operational_area_ids.is_empty() {
            return ApiError::InvalidRequest("Juridiction Ids required".to_string()).into();
        }
        self.store
            .plans_by_server_version_and_area(server_version, operational_area_ids)
            .map_err(ApiError::from)
            .and_then(|plans| self.codec.encode(&plans))
            .map(ApiResponse::ok)
            .unwrap_or_else(ApiResponse::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::RwLock;

    struct FixedPlans(RwLock<Vec<Value>>);

    impl FixedPlans {
        fn new(plans: Vec<Value>) -> Self {
            Self(RwLock::new(plans))
        }

        fn plans(&self) -> Vec<Value> {
            self.0.read().unwrap().clone()
        }
    }

    impl PlanStore for FixedPlans {
        fn all_plans(&self) -> StoreResult<Vec<Value>> {
            Ok(self.plans())
        }

        fn plans_by_identifiers(&self, identifiers: &[String]) -> StoreResult<Vec<Value>> {
            Ok(self
                .plans()
                .into_iter()
                .filter(|p| identifiers.iter().any(|id| p["identifier"] == id.as_str()))
                .collect())
        }

        fn plans_by_server_version_and_area(
            &self,
            server_version: u64,
            operational_area_ids: &[String],
        ) -> StoreResult<Vec<Value>> {
            Ok(self
                .plans()
                .into_iter()
                .filter(|p| p["serverVersion"].as_u64().unwrap_or(0) > server_version)
                .filter(|p| {
                    operational_area_ids
                        .iter()
                        .any(|area| p["jurisdiction"][0]["code"] == area.as_str())
                })
                .collect())
        }

        fn add_plan(&self, plan: Value) -> StoreResult<()> {
            let mut plans = self.0.write().unwrap();
            if plans.iter().any(|p| p["identifier"] == plan["identifier"]) {
                return Err(StoreError::Conflict(format!("plan {}", plan["identifier"])));
            }
            plans.push(plan);
            Ok(())
        }

        fn update_plan(&self, plan: Value) -> StoreResult<()> {
            let mut plans = self.0.write().unwrap();
            match plans.iter_mut().find(|p| p["identifier"] == plan["identifier"]) {
                Some(existing) => {
                    *existing = plan;
                    Ok(())
                }
                None => Err(StoreError::Conflict(format!("no plan {}", plan["identifier"]))),
            }
        }
    }

    fn api() -> PlanApi {
        PlanApi::new(
            Arc::new(FixedPlans::new(vec![
                json!({"identifier": "p1", "title": "IRS", "status": "active", "serverVersion": 3,
                       "jurisdiction": [{"code": "area-1"}]}),
                json!({"identifier": "p2", "title": "MDA", "status": "draft", "serverVersion": 8,
                       "jurisdiction": [{"code": "area-2"}]}),
            ])),
            JsonCodec::default(),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let response = api().find_by_ids_with_fields(&strings(&["p1"]), &strings(&["title", "colour"]));
        assert_eq!(response.status, 400);
        assert_eq!(response.body_str(), "colour field is invalid");
    }

    #[test]
    fn test_projection() {
        let response = api().find_by_ids_with_fields(&strings(&["p1"]), &strings(&["identifier", "title"]));
        let plans: Value = serde_json::from_str(response.body_str()).unwrap();
        assert_eq!(plans, json!([{"identifier": "p1", "title": "IRS"}]));

        let full = project(json!({"a": 1}), &[]);
        assert_eq!(full, json!({"a": 1}));
    }

    #[test]
    fn test_get_requires_identifier() {
        assert_eq!(api().get(" ", &[]).status, 400);
        assert_eq!(api().get("p2", &[]).status, 200);
    }

    #[test]
    fn test_get_does_not_check_fields() {
        let response = api().get("p1", &strings(&["title", "colour"]));
        assert_eq!(response.status, 200);
        let plans: Value = serde_json::from_str(response.body_str()).unwrap();
        assert_eq!(plans, json!([{"title": "IRS"}]));
    }

    #[test]
    fn test_create_and_update() {
        let api = api();

        let response = api.create(r#"{"identifier": "p3", "title": "SMC", "status": "draft"}"#);
        assert_eq!(response.status, 201);
        let plans: Value = serde_json::from_str(api.get("p3", &[]).body_str()).unwrap();
        assert_eq!(plans, json!([{"identifier": "p3", "title": "SMC", "status": "draft"}]));

        let response = api.update(r#"{"identifier": "p3", "title": "SMC", "status": "active"}"#);
        assert_eq!(response.status, 201);
        let plans: Value = serde_json::from_str(api.get("p3", &strings(&["status"])).body_str()).unwrap();
        assert_eq!(plans, json!([{"status": "active"}]));
    }

    #[test]
    fn test_plan_writes_reject_bad_bodies() {
        let api = api();
        assert_eq!(api.create("{\"identifier\": ").status, 400);
        assert_eq!(api.create("[]").status, 400);
        assert_eq!(api.update("not json").status, 400);

        assert_eq!(api.create(r#"{"identifier": "p1"}"#).status, 500);
        assert_eq!(api.update(r#"{"identifier": "p9"}"#).status, 500);
    }

    #[test]
    fn test_sync() {
        let api = api();
        let response = api.sync(Some("abc"), &strings(&["area-1", "area-2"]));
        let plans: Vec<Value> = serde_json::from_str(response.body_str()).unwrap();
        assert_eq!(plans.len(), 2);

        let response = api.sync(Some("5"), &strings(&["area-1", "area-2"]));
        let plans: Vec<Value> = serde_json::from_str(response.body_str()).unwrap();
        assert_eq!(plans.len(), 1);

        let response = api.sync(None, &[]);
        assert_eq!(response.status, 400);
        assert_eq!(response.body_str(), "Juridiction Ids required");
    }

    #[test]
    fn test_parse_server_version() {
        assert_eq!(parse_server_version(Some("42")), 42);
        assert_eq!(parse_server_version(Some("-1")), 0);
        assert_eq!(parse_server_version(None), 0);
    }
}
