//! SOAP action dispatch for the single `/control` endpoint, routed by the
//! `SOAPAction` header (or, failing that, the action name itself) to the
//! ContentDirectory or ConnectionManager service.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;
use crate::web::browse::{self, BrowseFlag, BrowseRequest};
use crate::web::xml;

const CONTENT_DIRECTORY_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
const CONNECTION_MANAGER_TYPE: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

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

/// Extract the action name from the `SOAPACTION` header (`"urn:...#Action"`),
/// falling back to a substring search over the body for lenient clients.
fn action_name(headers: &HeaderMap, body: &str) -> Option<String> {
    if let Some(header) = headers.get("SOAPACTION").and_then(|v| v.to_str().ok()) {
        if let Some((_, action)) = header.trim_matches('"').rsplit_once('#') {
            return Some(action.to_string());
        }
    }
    // Lenient fallback: find the first `<u:ActionName` or `<ActionName` tag.
    for candidate in [
        "Browse",
        "GetSearchCapabilities",
        "GetSortCapabilities",
        "GetSystemUpdateID",
        "GetProtocolInfo",
        "GetCurrentConnectionIDs",
        "GetCurrentConnectionInfo",
    ] {
        if body.contains(&format!(":{candidate}")) || body.contains(&format!("<{candidate}")) {
            return Some(candidate.to_string());
        }
    }
    None
}

fn extract_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open_prefix = format!("<{tag}");
    let start = body.find(&open_prefix)?;
    let after_open = body[start..].find('>')? + start + 1;
    let close = format!("</{tag}>");
    let end = body[after_open..].find(&close)? + after_open;
    Some(body[after_open..end].trim())
}

const CONNECTION_MANAGER_ACTIONS: &[&str] = &[
    "GetProtocolInfo",
    "GetCurrentConnectionIDs",
    "GetCurrentConnectionInfo",
];

/// Single `/control` entry point: decide ContentDirectory vs.
/// ConnectionManager from the `SOAPAction` header (or, failing that, the
/// action name itself) and dispatch to the matching handler.
pub async fn control(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let soap_action = headers
        .get("SOAPACTION")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let action = action_name(&headers, &body).ok_or(AppError::InvalidAction)?;

    let is_connection_manager = soap_action.contains("ConnectionManager")
        || (!soap_action.contains("ContentDirectory")
            && CONNECTION_MANAGER_ACTIONS.contains(&action.as_str()));

    if is_connection_manager {
        connection_manager_control(headers, body).await
    } else {
        content_directory_control(State(state), headers, body).await
    }
}

pub async fn content_directory_control(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let action = action_name(&headers, &body).ok_or(AppError::InvalidAction)?;

    match action.as_str() {
        "Browse" => {
            let object_id = extract_tag(&body, "ObjectID").unwrap_or("0").to_string();
            let browse_flag = extract_tag(&body, "BrowseFlag").unwrap_or("BrowseDirectChildren");
            let starting_index: u32 = extract_tag(&body, "StartingIndex")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let requested_count: u32 = extract_tag(&body, "RequestedCount")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);

            let flag = if browse_flag == "BrowseMetadata" {
                BrowseFlag::Metadata
            } else {
                BrowseFlag::DirectChildren
            };

            let result = browse::browse(
                &state,
                BrowseRequest {
                    object_id,
                    flag,
                    starting_index,
                    requested_count,
                },
            )
            .await;

            Ok(xml_response(xml::generate_browse_response(
                &result.didl,
                result.number_returned,
                result.total_matches,
                result.update_id,
            )))
        }
        "GetSearchCapabilities" => Ok(xml_response(xml::soap_response(
            CONTENT_DIRECTORY_TYPE,
            "GetSearchCapabilities",
            &[(
                "SearchCaps",
                "dc:title,dc:creator,upnp:class,upnp:genre,dc:date".to_string(),
            )],
        ))),
        "GetSortCapabilities" => Ok(xml_response(xml::soap_response(
            CONTENT_DIRECTORY_TYPE,
            "GetSortCapabilities",
            &[(
                "SortCaps",
                "dc:title,dc:creator,dc:date,upnp:class".to_string(),
            )],
        ))),
        "GetSystemUpdateID" => {
            let id = state.identity.system_update_id();
            Ok(xml_response(xml::soap_response(
                CONTENT_DIRECTORY_TYPE,
                "GetSystemUpdateID",
                &[("Id", id.to_string())],
            )))
        }
        _ => Err(AppError::InvalidAction),
    }
}

pub async fn connection_manager_control(
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let action = action_name(&headers, &body).ok_or(AppError::InvalidAction)?;

    match action.as_str() {
        "GetProtocolInfo" => Ok(xml_response(xml::soap_response(
            CONNECTION_MANAGER_TYPE,
            "GetProtocolInfo",
            &[
                ("Source", xml::all_protocol_infos()),
                ("Sink", String::new()),
            ],
        ))),
        "GetCurrentConnectionIDs" => Ok(xml_response(xml::soap_response(
            CONNECTION_MANAGER_TYPE,
            "GetCurrentConnectionIDs",
            &[("ConnectionIDs", "0".to_string())],
        ))),
        "GetCurrentConnectionInfo" => Ok(xml_response(xml::soap_response(
            CONNECTION_MANAGER_TYPE,
            "GetCurrentConnectionInfo",
            &[
                ("RcsID", "-1".to_string()),
                ("AVTransportID", "-1".to_string()),
                ("ProtocolInfo", String::new()),
                ("PeerConnectionManager", String::new()),
                ("PeerConnectionID", "-1".to_string()),
                ("Direction", "Output".to_string()),
                ("Status", "OK".to_string()),
            ],
        ))),
        _ => Err(AppError::InvalidAction),
    }
}
