//! Small, mostly-static HTTP handlers: root banner, device description,
//! SCPDs, and the SUBSCRIBE/UNSUBSCRIBE eventing stubs.

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::state::AppState;
use crate::web::xml;

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/xml; charset=\"utf-8\"",
        )],
        body,
    )
        .into_response()
}

pub async fn root_handler() -> &'static str {
    "OpenDLNA media server"
}

pub async fn description_handler(State(state): State<AppState>) -> Response {
    let uuid = state.identity.uuid().await;
    xml_response(xml::generate_description_xml(
        &state.config.server_name,
        &uuid,
    ))
}

pub async fn content_directory_scpd() -> Response {
    xml_response(xml::generate_cd_scpd_xml())
}

pub async fn connection_manager_scpd() -> Response {
    xml_response(xml::generate_cm_scpd_xml())
}

/// `SUBSCRIBE`/`UNSUBSCRIBE` against `/events`: acknowledge with a SID
/// and timeout but never deliver NOTIFY events — no control point state
/// is tracked.
pub async fn event_subscribe(method: Method, _headers: HeaderMap) -> Response {
    match method.as_str() {
        "SUBSCRIBE" => (
            StatusCode::OK,
            [
                ("SID", format!("uuid:{}", Uuid::new_v4())),
                ("TIMEOUT", "Second-1800".to_string()),
            ],
        )
            .into_response(),
        "UNSUBSCRIBE" => StatusCode::OK.into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Answers an OPTIONS preflight with permissive CORS headers so browser
/// based control points can call the SOAP endpoints cross-origin.
pub async fn cors_preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET, HEAD, POST, OPTIONS, SUBSCRIBE, UNSUBSCRIBE"),
            ("Access-Control-Allow-Headers", "SOAPAction, Content-Type, Range"),
        ],
    )
        .into_response()
}
