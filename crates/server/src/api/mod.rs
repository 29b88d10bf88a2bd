//! # Legionn REST API
//!
//! Routes, shared state, error mapping and the OpenAPI document.
//!
//! ```text
//! GET    /api/1/                                  server info
//! GET    /api/1/cores                             registered Cores
//! GET    /api/1/cores/:core_id/units              Units of a Core
//! POST   /api/1/cores/:core_id/units              create a Unit
//! GET    /api/1/cores/:core_id/units/:unit_id     Unit.get   (?msg=)
//! POST   /api/1/cores/:core_id/units/:unit_id     Unit.post  {"msg": ...}
//! PUT    /api/1/cores/:core_id/units/:unit_id     Unit.put   {"msg": ...}
//! DELETE /api/1/cores/:core_id/units/:unit_id     remove a Unit
//! POST   /api/1/cores/:core_id/activate|deactivate
//! GET    /api/1/openapi.json
//! ```

pub mod cores;
pub mod index;

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use legionn_core::{Error, Legionn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub legionn: RwLock<Legionn>,
}

impl AppState {
    pub fn new(legionn: Legionn) -> Self {
        Self {
            legionn: RwLock::new(legionn),
        }
    }
}

pub type SharedState = Arc<AppState>;

// === Shared API Types ===

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Error body, same shape for every failing route
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// `legionn_core::Error` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::CoreNotFound(_) | Error::UnitNotFound { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateCore(_) | Error::DuplicateUnit { .. } => StatusCode::CONFLICT,
            Error::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Chatbot(_) | Error::Transport(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Io(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Legionn API",
        version = "0.2",
        description = "Main Core of Legionn platform",
        contact(name = "Tom Trval")
    ),
    paths(
        index::get_info,
        cores::list_cores,
        cores::list_units,
        cores::create_unit,
        cores::unit_get,
        cores::unit_post,
        cores::unit_put,
        cores::delete_unit,
        cores::activate_core,
        cores::deactivate_core
    ),
    components(
        schemas(
            ApiResponse,
            ErrorResponse,
            index::InfoResponse,
            index::ServerInfoResponse,
            cores::CoreResponse,
            cores::UnitResponse,
            cores::UnitRequest,
            cores::CreateUnitRequest,
            cores::UnitReplyResponse
        )
    ),
    tags(
        (name = "info", description = "Server information"),
        (name = "core", description = "Registered Cores and their lifecycle"),
        (name = "unit", description = "Units of a Core")
    )
)]
pub struct ApiDoc;

/// A serialized document as a JSON response; a serialization failure is a 500.
fn json_document<E: Into<Error>>(
    doc: Result<String, E>,
) -> Result<impl IntoResponse, ApiError> {
    let body = doc.map_err(|e| ApiError(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn serve_openapi() -> Result<impl IntoResponse, ApiError> {
    json_document(ApiDoc::openapi().to_json())
}

/// All API routes under `/<url_prefix>`.
pub fn router(state: SharedState, url_prefix: &str) -> Router {
    let prefix = url_prefix.trim_matches('/');
    let base = if prefix.is_empty() {
        String::new()
    } else {
        format!("/{prefix}")
    };
    let at = |path: &str| format!("{base}{path}");

    let mut app = Router::new()
        .route(&at("/"), get(index::get_info))
        .route(&at("/index"), get(index::get_info))
        .route(&at("/cores"), get(cores::list_cores))
        .route(
            &at("/cores/:core_id/units"),
            get(cores::list_units).post(cores::create_unit),
        )
        .route(
            &at("/cores/:core_id/units/:unit_id"),
            get(cores::unit_get)
                .post(cores::unit_post)
                .put(cores::unit_put)
                .delete(cores::delete_unit),
        )
        .route(&at("/cores/:core_id/activate"), post(cores::activate_core))
        .route(&at("/cores/:core_id/deactivate"), post(cores::deactivate_core))
        .route(&at("/openapi.json"), get(serve_openapi));

    if !base.is_empty() {
        app = app.route(&base, get(index::get_info));
    }

    app.with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use legionn_core::{Core, Result, SharedUnit, Unit, UnitRegistry};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    /// Unit answering `post` with the message reversed.
    pub(crate) struct Reverser;

    #[async_trait]
    impl Unit for Reverser {
        fn kind(&self) -> &'static str {
            "reverser"
        }

        async fn post(&self, msg: Option<&str>) -> Result<String> {
            match msg {
                Some(msg) => Ok(msg.chars().rev().collect()),
                None => Err(Error::invalid_request("msg is required")),
            }
        }

        async fn get(&self, _msg: Option<&str>) -> Result<String> {
            Err(Error::chatbot("upstream is down"))
        }
    }

    pub(crate) struct TestCore {
        name: String,
        units: UnitRegistry,
        active: AtomicBool,
    }

    impl TestCore {
        pub(crate) fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                units: UnitRegistry::new(name),
                active: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Core for TestCore {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "test core"
        }

        fn units(&self) -> &UnitRegistry {
            &self.units
        }

        async fn activate(&self) -> Result<()> {
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn deactivate(&self) -> Result<()> {
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn create_unit(&self) -> Result<SharedUnit> {
            Ok(Arc::new(Reverser))
        }
    }

    /// Router over a platform holding `alpha` (units `u1`, `u2`) and `beta`.
    pub(crate) fn test_app() -> Router {
        let mut legionn = Legionn::default();
        let alpha = TestCore::new("alpha");
        alpha.add_unit(Arc::new(Reverser), "u2").unwrap();
        alpha.add_unit(Arc::new(Reverser), "u1").unwrap();
        legionn.add(Arc::new(TestCore::new("beta")), None).unwrap();
        legionn.add(Arc::new(alpha), None).unwrap();
        router(Arc::new(AppState::new(legionn)), "api/1")
    }

    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError(Error::CoreNotFound("x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError(Error::DuplicateCore("x".into())).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError(Error::unsupported("get")).status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(ApiError(Error::invalid_request("x")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError(Error::transport("x")).status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (status, json) = send(test_app(), "GET", "/api/1/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["info"]["title"], "Legionn API");
        assert!(json["paths"]["/api/1/cores"].is_object());
    }

    #[test]
    fn test_unserializable_document_is_500() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let response = json_document(Err(err)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = json_document::<Error>(Ok("{}".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _) = send(test_app(), "GET", "/api/2/cores", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_empty_prefix() {
        let state = Arc::new(AppState::new(Legionn::default()));
        // must not panic on overlapping routes
        let _ = router(state, "/");
    }
}
