//! XML generation: device description, SCPDs, DIDL-Lite fragments, SOAP
//! envelopes and faults.

use crate::object_id::{MEDIA_ROOT_ID, VIRTUAL_ROOT_ID};

/// 32 hex-digit DLNA.ORG_FLAGS value for streamable video/audio: byte-seek +
/// streaming transfer mode + DLNA v1.5, zero-padded to 32 digits. Always the
/// correct length — the well-known 33-digit variant some servers emit is
/// never produced here.
const DLNA_FLAGS_AV: &str = "01700000000000000000000000000000";

/// 32 hex-digit DLNA.ORG_FLAGS value for images.
const DLNA_FLAGS_IMAGE: &str = "00D00000000000000000000000000000";

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn get_upnp_class(mime_type: &str) -> &'static str {
    if mime_type.starts_with("video/") {
        "object.item.videoItem"
    } else if mime_type.starts_with("audio/") {
        "object.item.audioItem"
    } else if mime_type.starts_with("image/") {
        "object.item.imageItem"
    } else {
        "object.item"
    }
}

/// The DLNA.ORG_PN profile token for a MIME type, if one is defined.
fn dlna_profile(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "video/mp4" => Some("AVC_MP4_MP_SD_AAC_MULT5"),
        "video/x-msvideo" => Some("AVI"),
        "video/x-matroska" => Some("MATROSKA"),
        "audio/mpeg" => Some("MP3"),
        "audio/wav" => Some("LPCM"),
        "audio/mp4" | "audio/x-m4a" => Some("AAC_ISO_320"),
        "image/jpeg" => Some("JPEG_LRG"),
        "image/png" => Some("PNG_LRG"),
        _ => None,
    }
}

fn dlna_flags_for(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        DLNA_FLAGS_IMAGE
    } else {
        DLNA_FLAGS_AV
    }
}

/// All `http-get:*:<mime>:<profile>` entries this server can advertise,
/// in the MIME-table order of the DLNA profile table.
pub const KNOWN_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/x-msvideo",
    "video/x-matroska",
    "audio/mpeg",
    "audio/wav",
    "audio/mp4",
    "image/jpeg",
    "image/png",
];

/// Static `resolution`/`bitrate` `<res>` attributes advertised for a MIME
/// type's profile, per the DLNA profile table. These are nominal values
/// for the declared profile, not measured from the actual file.
fn res_attrs(mime_type: &str) -> (Option<&'static str>, Option<&'static str>) {
    match mime_type {
        "video/mp4" => (Some("1280x720"), Some("4000000")),
        "video/x-msvideo" => (Some("720x576"), Some("1500000")),
        "video/x-matroska" => (Some("1920x1080"), Some("8000000")),
        "audio/mpeg" => (None, Some("320000")),
        "audio/wav" => (None, Some("1411200")),
        "audio/mp4" | "audio/x-m4a" => (None, Some("320000")),
        "image/jpeg" | "image/png" => (Some("1920x1080"), None),
        _ => (None, None),
    }
}

/// Build the `protocolInfo` attribute for a `<res>` element.
pub fn protocol_info(mime_type: &str) -> String {
    match dlna_profile(mime_type) {
        Some(pn) => format!(
            "http-get:*:{mime_type}:DLNA.ORG_PN={pn};DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS={}",
            dlna_flags_for(mime_type)
        ),
        None => format!("http-get:*:{mime_type}:*"),
    }
}

/// Build `contentFeatures.dlna.org` / `ContentFeatures.DLNA.ORG` header
/// value for a media response. `DLNA.ORG_CI=0` is included unconditionally
/// since this server never transcodes.
pub fn content_features(mime_type: &str) -> String {
    match dlna_profile(mime_type) {
        Some(pn) => format!(
            "DLNA.ORG_PN={pn};DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS={}",
            dlna_flags_for(mime_type)
        ),
        None => "DLNA.ORG_OP=01;DLNA.ORG_CI=0".to_string(),
    }
}

/// Comma-joined `protocolInfo` entries for every profile this server
/// advertises, used as the `Source` value in `GetProtocolInfo`.
pub fn all_protocol_infos() -> String {
    KNOWN_MIME_TYPES
        .iter()
        .map(|mime| protocol_info(mime))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn generate_description_xml(friendly_name: &str, uuid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0" xmlns:dlna="urn:schemas-dlna-org:device-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <friendlyName>{name}</friendlyName>
        <manufacturer>OpenDLNA</manufacturer>
        <modelName>OpenDLNA Server</modelName>
        <modelNumber>1.0</modelNumber>
        <UDN>uuid:{uuid}</UDN>
        <dlna:X_DLNADOC>DMS-1.50</dlna:X_DLNADOC>
        <serviceList>
            <service>
                <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
                <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
                <SCPDURL>/cd_scpd.xml</SCPDURL>
                <controlURL>/control</controlURL>
                <eventSubURL>/events</eventSubURL>
            </service>
            <service>
                <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
                <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
                <SCPDURL>/cm_scpd.xml</SCPDURL>
                <controlURL>/control</controlURL>
                <eventSubURL>/events</eventSubURL>
            </service>
        </serviceList>
    </device>
</root>"#,
        name = xml_escape(friendly_name),
        uuid = uuid
    )
}

pub fn generate_cd_scpd_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <actionList>
        <action>
            <name>Browse</name>
            <argumentList>
                <argument><name>ObjectID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ObjectID</relatedStateVariable></argument>
                <argument><name>BrowseFlag</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_BrowseFlag</relatedStateVariable></argument>
                <argument><name>Filter</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Filter</relatedStateVariable></argument>
                <argument><name>StartingIndex</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Index</relatedStateVariable></argument>
                <argument><name>RequestedCount</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>SortCriteria</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_SortCriteria</relatedStateVariable></argument>
                <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
                <argument><name>NumberReturned</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>TotalMatches</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>UpdateID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_UpdateID</relatedStateVariable></argument>
            </argumentList>
        </action>
        <action>
            <name>GetSearchCapabilities</name>
            <argumentList>
                <argument><name>SearchCaps</name><direction>out</direction><relatedStateVariable>SearchCapabilities</relatedStateVariable></argument>
            </argumentList>
        </action>
        <action>
            <name>GetSortCapabilities</name>
            <argumentList>
                <argument><name>SortCaps</name><direction>out</direction><relatedStateVariable>SortCapabilities</relatedStateVariable></argument>
            </argumentList>
        </action>
        <action>
            <name>GetSystemUpdateID</name>
            <argumentList>
                <argument><name>Id</name><direction>out</direction><relatedStateVariable>SystemUpdateID</relatedStateVariable></argument>
            </argumentList>
        </action>
    </actionList>
    <serviceStateTable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ObjectID</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_BrowseFlag</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Filter</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Index</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Count</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_SortCriteria</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Result</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_UpdateID</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>SearchCapabilities</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>SortCapabilities</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="yes"><name>SystemUpdateID</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="yes"><name>ContainerUpdateIDs</name><dataType>string</dataType></stateVariable>
    </serviceStateTable>
</scpd>"#
        .to_string()
}

pub fn generate_cm_scpd_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <actionList>
        <action>
            <name>GetProtocolInfo</name>
            <argumentList>
                <argument><name>Source</name><direction>out</direction><relatedStateVariable>SourceProtocolInfo</relatedStateVariable></argument>
                <argument><name>Sink</name><direction>out</direction><relatedStateVariable>SinkProtocolInfo</relatedStateVariable></argument>
            </argumentList>
        </action>
        <action>
            <name>GetCurrentConnectionIDs</name>
            <argumentList>
                <argument><name>ConnectionIDs</name><direction>out</direction><relatedStateVariable>CurrentConnectionIDs</relatedStateVariable></argument>
            </argumentList>
        </action>
        <action>
            <name>GetCurrentConnectionInfo</name>
            <argumentList>
                <argument><name>ConnectionID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ConnectionID</relatedStateVariable></argument>
                <argument><name>RcsID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_RcsID</relatedStateVariable></argument>
                <argument><name>AVTransportID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_AVTransportID</relatedStateVariable></argument>
                <argument><name>ProtocolInfo</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ProtocolInfo</relatedStateVariable></argument>
                <argument><name>PeerConnectionManager</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionManager</relatedStateVariable></argument>
                <argument><name>PeerConnectionID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionID</relatedStateVariable></argument>
                <argument><name>Direction</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Direction</relatedStateVariable></argument>
                <argument><name>Status</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionStatus</relatedStateVariable></argument>
            </argumentList>
        </action>
    </actionList>
    <serviceStateTable>
        <stateVariable sendEvents="no"><name>SourceProtocolInfo</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>SinkProtocolInfo</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>CurrentConnectionIDs</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionID</name><dataType>i4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_RcsID</name><dataType>i4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_AVTransportID</name><dataType>i4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ProtocolInfo</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionManager</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Direction</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionStatus</name><dataType>string</dataType></stateVariable>
    </serviceStateTable>
</scpd>"#
        .to_string()
}

/// A browsable directory, rendered as a DIDL-Lite `<container>`.
pub struct DidlContainer {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub child_count: usize,
}

/// A single playable file, rendered as a DIDL-Lite `<item>`.
pub struct DidlItem {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub mime_type: String,
    pub size: u64,
    pub url: String,
    pub duration: Option<String>,
}

pub fn generate_didl(containers: &[DidlContainer], items: &[DidlItem]) -> String {
    let mut didl = String::from(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#,
    );

    for c in containers {
        didl.push_str(&format!(
            r#"<container id="{id}" parentID="{parent}" restricted="1" childCount="{count}"><dc:title>{title}</dc:title><upnp:class>object.container.storageFolder</upnp:class></container>"#,
            id = xml_escape(&c.id),
            parent = xml_escape(&c.parent_id),
            count = c.child_count,
            title = xml_escape(&c.title),
        ));
    }

    for item in items {
        let upnp_class = get_upnp_class(&item.mime_type);
        let duration_attr = item
            .duration
            .as_ref()
            .map(|d| format!(" duration=\"{d}\""))
            .unwrap_or_default();
        let (resolution, bitrate) = res_attrs(&item.mime_type);
        let resolution_attr = resolution
            .map(|r| format!(" resolution=\"{r}\""))
            .unwrap_or_default();
        let bitrate_attr = bitrate
            .map(|b| format!(" bitrate=\"{b}\""))
            .unwrap_or_default();
        didl.push_str(&format!(
            r#"<item id="{id}" parentID="{parent}" restricted="1"><dc:title>{title}</dc:title><upnp:class>{class}</upnp:class><res protocolInfo="{info}" size="{size}"{duration}{resolution_attr}{bitrate_attr}>{url}</res></item>"#,
            id = xml_escape(&item.id),
            parent = xml_escape(&item.parent_id),
            title = xml_escape(&item.title),
            class = upnp_class,
            info = xml_escape(&protocol_info(&item.mime_type)),
            size = item.size,
            duration = duration_attr,
            url = xml_escape(&item.url),
        ));
    }

    didl.push_str("</DIDL-Lite>");
    didl
}

pub fn generate_browse_response(
    didl: &str,
    number_returned: usize,
    total_matches: usize,
    update_id: u32,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
            <Result>{result}</Result>
            <NumberReturned>{number_returned}</NumberReturned>
            <TotalMatches>{total_matches}</TotalMatches>
            <UpdateID>{update_id}</UpdateID>
        </u:BrowseResponse>
    </s:Body>
</s:Envelope>"#,
        result = xml_escape(didl),
    )
}

pub fn soap_response(service_type: &str, action: &str, fields: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!("<{name}>{}</{name}>", xml_escape(value)));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action}Response xmlns:u="{service_type}">{body}</u:{action}Response>
    </s:Body>
</s:Envelope>"#
    )
}

/// A SOAP Fault wrapping a `UPnPError`, per the UPnP Device Architecture.
pub fn soap_fault(code: u32, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <s:Fault>
            <faultcode>s:Client</faultcode>
            <faultstring>UPnPError</faultstring>
            <detail>
                <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                    <errorCode>{code}</errorCode>
                    <errorDescription>{desc}</errorDescription>
                </UPnPError>
            </detail>
        </s:Fault>
    </s:Body>
</s:Envelope>"#,
        desc = xml_escape(description)
    )
}

pub fn root_ids_for_flag(object_id: &str) -> bool {
    object_id == VIRTUAL_ROOT_ID || object_id == MEDIA_ROOT_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_flags_are_32_digits() {
        assert_eq!(DLNA_FLAGS_AV.len(), 32);
        assert_eq!(DLNA_FLAGS_IMAGE.len(), 32);
    }

    #[test]
    fn image_profile_uses_image_flags() {
        assert!(protocol_info("image/jpeg").contains(DLNA_FLAGS_IMAGE));
        assert!(protocol_info("video/mp4").contains(DLNA_FLAGS_AV));
    }

    #[test]
    fn protocol_info_includes_known_profile() {
        assert!(protocol_info("video/mp4").contains("AVC_MP4_MP_SD_AAC_MULT5"));
        assert!(protocol_info("application/octet-stream").contains("http-get:*:"));
    }

    #[test]
    fn didl_escapes_titles() {
        let items = vec![DidlItem {
            id: "2".into(),
            parent_id: "1".into(),
            title: "A & B.mp4".into(),
            mime_type: "video/mp4".into(),
            size: 10,
            url: "http://host/media/a".into(),
            duration: None,
        }];
        let didl = generate_didl(&[], &items);
        assert!(didl.contains("A &amp; B.mp4"));
    }

    #[test]
    fn soap_fault_carries_error_code() {
        let fault = soap_fault(401, "Invalid Action");
        assert!(fault.contains("<errorCode>401</errorCode>"));
    }

    #[test]
    fn res_attrs_include_resolution_and_bitrate() {
        let items = vec![DidlItem {
            id: "2".into(),
            parent_id: "1".into(),
            title: "a.mp4".into(),
            mime_type: "video/mp4".into(),
            size: 10,
            url: "http://host/media/a.mp4".into(),
            duration: None,
        }];
        let didl = generate_didl(&[], &items);
        assert!(didl.contains(r#"resolution="1280x720""#));
        assert!(didl.contains(r#"bitrate="4000000""#));
    }
}
