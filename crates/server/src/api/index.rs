//! # Index API
//!
//! Server name and version.

use axum::{extract::State, Json};
use legionn_core::ServerInfo;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::SharedState;

/// Server info group
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerInfoResponse {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

impl From<ServerInfo> for ServerInfoResponse {
    fn from(info: ServerInfo) -> Self {
        Self {
            name: info.name,
            version: info.version,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
    pub server: ServerInfoResponse,
}

/// Fetch server info
#[utoipa::path(
    get,
    path = "/api/1/",
    tag = "info",
    responses(
        (status = 200, description = "Server name and version", body = InfoResponse)
    )
)]
pub async fn get_info(State(state): State<SharedState>) -> Json<InfoResponse> {
    let info = state.legionn.read().await.server_info();
    Json(InfoResponse {
        server: info.into(),
    })
}
