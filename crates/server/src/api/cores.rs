//! # Cores API
//!
//! Registered Cores, their Units and their lifecycle.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use legionn_core::{Error, SharedCore, SharedUnit};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiError, ApiResponse, ErrorResponse, SharedState};

/// A registered Core
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CoreResponse {
    pub core_id: String,
    pub description: String,
}

/// A Unit of a Core
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnitResponse {
    pub unit_id: String,
}

/// Message handed to a Unit verb
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UnitRequest {
    pub msg: Option<String>,
}

/// Request to create a Unit. Without `unit_id` a free name is generated.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateUnitRequest {
    pub unit_id: Option<String>,
}

/// Answer of a Unit
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnitReplyResponse {
    pub unit_id: String,
    pub reply: String,
}

/// Resolve a Core without holding the platform lock afterwards.
async fn lookup_core(state: &SharedState, core_id: &str) -> Result<SharedCore, ApiError> {
    Ok(state.legionn.read().await.core(core_id)?)
}

async fn lookup_unit(
    state: &SharedState,
    core_id: &str,
    unit_id: &str,
) -> Result<SharedUnit, ApiError> {
    let core = lookup_core(state, core_id).await?;
    core.units().get(unit_id).ok_or_else(|| {
        ApiError(Error::UnitNotFound {
            core: core_id.to_string(),
            unit: unit_id.to_string(),
        })
    })
}

/// List registered Cores
#[utoipa::path(
    get,
    path = "/api/1/cores",
    tag = "core",
    responses(
        (status = 200, description = "Cores sorted by id", body = [CoreResponse])
    )
)]
pub async fn list_cores(State(state): State<SharedState>) -> Json<Vec<CoreResponse>> {
    let cores = state.legionn.read().await.cores();
    Json(
        cores
            .into_iter()
            .map(|c| CoreResponse {
                core_id: c.core_id,
                description: c.description,
            })
            .collect(),
    )
}

/// List the Units of a Core
#[utoipa::path(
    get,
    path = "/api/1/cores/{core_id}/units",
    tag = "unit",
    params(("core_id" = String, Path, description = "Core id")),
    responses(
        (status = 200, description = "Units sorted by id", body = [UnitResponse]),
        (status = 404, description = "Unknown Core", body = ErrorResponse)
    )
)]
pub async fn list_units(
    State(state): State<SharedState>,
    Path(core_id): Path<String>,
) -> Result<Json<Vec<UnitResponse>>, ApiError> {
    let units = state.legionn.read().await.units_of(&core_id)?;
    Ok(Json(
        units
            .into_iter()
            .map(|u| UnitResponse { unit_id: u.unit_id })
            .collect(),
    ))
}

/// Create a Unit through the Core
#[utoipa::path(
    post,
    path = "/api/1/cores/{core_id}/units",
    tag = "unit",
    params(("core_id" = String, Path, description = "Core id")),
    request_body = CreateUnitRequest,
    responses(
        (status = 201, description = "Unit created", body = UnitResponse),
        (status = 404, description = "Unknown Core", body = ErrorResponse),
        (status = 409, description = "Unit name taken", body = ErrorResponse),
        (status = 501, description = "Core does not create Units", body = ErrorResponse)
    )
)]
pub async fn create_unit(
    State(state): State<SharedState>,
    Path(core_id): Path<String>,
    body: Option<Json<CreateUnitRequest>>,
) -> Result<(StatusCode, Json<UnitResponse>), ApiError> {
    let core = lookup_core(&state, &core_id).await?;
    let unit = core.create_unit()?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let unit_id = match req.unit_id {
        Some(unit_id) => {
            core.add_unit(unit, &unit_id)?;
            unit_id
        }
        None => core.units().add_generated(unit),
    };
    tracing::info!(core = %core_id, unit = %unit_id, "Unit created");
    Ok((StatusCode::CREATED, Json(UnitResponse { unit_id })))
}

/// Send `get` to a Unit
#[utoipa::path(
    get,
    path = "/api/1/cores/{core_id}/units/{unit_id}",
    tag = "unit",
    params(
        ("core_id" = String, Path, description = "Core id"),
        ("unit_id" = String, Path, description = "Unit id"),
        ("msg" = Option<String>, Query, description = "Message for the Unit")
    ),
    responses(
        (status = 200, description = "Unit answer", body = UnitReplyResponse),
        (status = 404, description = "Unknown Core or Unit", body = ErrorResponse),
        (status = 501, description = "Verb not implemented", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn unit_get(
    State(state): State<SharedState>,
    Path((core_id, unit_id)): Path<(String, String)>,
    Query(req): Query<UnitRequest>,
) -> Result<Json<UnitReplyResponse>, ApiError> {
    let unit = lookup_unit(&state, &core_id, &unit_id).await?;
    let reply = unit.get(req.msg.as_deref()).await?;
    Ok(Json(UnitReplyResponse { unit_id, reply }))
}

/// Send `post` to a Unit
#[utoipa::path(
    post,
    path = "/api/1/cores/{core_id}/units/{unit_id}",
    tag = "unit",
    params(
        ("core_id" = String, Path, description = "Core id"),
        ("unit_id" = String, Path, description = "Unit id")
    ),
    request_body = UnitRequest,
    responses(
        (status = 200, description = "Unit answer", body = UnitReplyResponse),
        (status = 400, description = "Unit rejected the message", body = ErrorResponse),
        (status = 404, description = "Unknown Core or Unit", body = ErrorResponse),
        (status = 501, description = "Verb not implemented", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn unit_post(
    State(state): State<SharedState>,
    Path((core_id, unit_id)): Path<(String, String)>,
    body: Option<Json<UnitRequest>>,
) -> Result<Json<UnitReplyResponse>, ApiError> {
    let unit = lookup_unit(&state, &core_id, &unit_id).await?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let reply = unit.post(req.msg.as_deref()).await?;
    Ok(Json(UnitReplyResponse { unit_id, reply }))
}

/// Send `put` to a Unit
#[utoipa::path(
    put,
    path = "/api/1/cores/{core_id}/units/{unit_id}",
    tag = "unit",
    params(
        ("core_id" = String, Path, description = "Core id"),
        ("unit_id" = String, Path, description = "Unit id")
    ),
    request_body = UnitRequest,
    responses(
        (status = 200, description = "Unit answer", body = UnitReplyResponse),
        (status = 404, description = "Unknown Core or Unit", body = ErrorResponse),
        (status = 501, description = "Verb not implemented", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn unit_put(
    State(state): State<SharedState>,
    Path((core_id, unit_id)): Path<(String, String)>,
    body: Option<Json<UnitRequest>>,
) -> Result<Json<UnitReplyResponse>, ApiError> {
    let unit = lookup_unit(&state, &core_id, &unit_id).await?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let reply = unit.put(req.msg.as_deref()).await?;
    Ok(Json(UnitReplyResponse { unit_id, reply }))
}

/// Remove a Unit from its Core
#[utoipa::path(
    delete,
    path = "/api/1/cores/{core_id}/units/{unit_id}",
    tag = "unit",
    params(
        ("core_id" = String, Path, description = "Core id"),
        ("unit_id" = String, Path, description = "Unit id")
    ),
    responses(
        (status = 204, description = "Unit removed"),
        (status = 404, description = "Unknown Core or Unit", body = ErrorResponse)
    )
)]
pub async fn delete_unit(
    State(state): State<SharedState>,
    Path((core_id, unit_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let core = lookup_core(&state, &core_id).await?;
    match core.remove_unit(&unit_id) {
        Some(_) => {
            tracing::info!(core = %core_id, unit = %unit_id, "Unit removed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError(Error::UnitNotFound {
            core: core_id,
            unit: unit_id,
        })),
    }
}

/// Activate a Core
#[utoipa::path(
    post,
    path = "/api/1/cores/{core_id}/activate",
    tag = "core",
    params(("core_id" = String, Path, description = "Core id")),
    responses(
        (status = 200, description = "Core activated", body = ApiResponse),
        (status = 404, description = "Unknown Core", body = ErrorResponse),
        (status = 502, description = "Core failed to come up", body = ErrorResponse)
    )
)]
pub async fn activate_core(
    State(state): State<SharedState>,
    Path(core_id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let core = lookup_core(&state, &core_id).await?;
    core.activate().await?;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Core {} activated", core_id),
    }))
}

/// Deactivate a Core
#[utoipa::path(
    post,
    path = "/api/1/cores/{core_id}/deactivate",
    tag = "core",
    params(("core_id" = String, Path, description = "Core id")),
    responses(
        (status = 200, description = "Core deactivated", body = ApiResponse),
        (status = 404, description = "Unknown Core", body = ErrorResponse)
    )
)]
pub async fn deactivate_core(
    State(state): State<SharedState>,
    Path(core_id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let core = lookup_core(&state, &core_id).await?;
    core.deactivate().await?;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Core {} deactivated", core_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_cores_sorted() {
        let (status, json) = send(test_app(), "GET", "/api/1/cores", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!([
                {"core_id": "alpha", "description": "test core"},
                {"core_id": "beta", "description": "test core"}
            ])
        );
    }

    #[tokio::test]
    async fn test_list_units() {
        let (status, json) = send(test_app(), "GET", "/api/1/cores/alpha/units", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!([{"unit_id": "u1"}, {"unit_id": "u2"}]));

        let (status, json) = send(test_app(), "GET", "/api/1/cores/beta/units", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_core() {
        let (status, json) = send(test_app(), "GET", "/api/1/cores/ghost/units", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Core ghost not found");
    }

    #[tokio::test]
    async fn test_create_unit_generated_and_named() {
        let app = test_app();
        let (status, json) = send(app.clone(), "POST", "/api/1/cores/alpha/units", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["unit_id"], "unit-1");

        let body = json!({"unit_id": "named"});
        let (status, json) =
            send(app.clone(), "POST", "/api/1/cores/alpha/units", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["unit_id"], "named");

        let (status, _) = send(app.clone(), "POST", "/api/1/cores/alpha/units", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, json) = send(app, "GET", "/api/1/cores/alpha/units", None).await;
        assert_eq!(json.as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn test_unit_verbs() {
        let app = test_app();
        let uri = "/api/1/cores/alpha/units/u1";

        let (status, json) = send(app.clone(), "POST", uri, Some(json!({"msg": "hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"unit_id": "u1", "reply": "olleh"}));

        let (status, json) = send(app.clone(), "POST", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "invalid request: msg is required");

        let (status, json) = send(app.clone(), "PUT", uri, Some(json!({"msg": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(json["message"], "reverser.put is not implemented");

        let (status, _) = send(app, "GET", &format!("{uri}?msg=hi"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_unit() {
        let (status, json) =
            send(test_app(), "POST", "/api/1/cores/alpha/units/nope", Some(json!({"msg": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Unit nope not found in Core alpha");
    }

    #[tokio::test]
    async fn test_delete_unit() {
        let app = test_app();
        let uri = "/api/1/cores/alpha/units/u2";
        let (status, _) = send(app.clone(), "DELETE", uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app, "DELETE", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_core_lifecycle() {
        let app = test_app();
        let (status, json) = send(app.clone(), "POST", "/api/1/cores/beta/activate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"success": true, "message": "Core beta activated"}));

        let (status, json) = send(app.clone(), "POST", "/api/1/cores/beta/deactivate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (status, _) = send(app, "POST", "/api/1/cores/ghost/activate", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
