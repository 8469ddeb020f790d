//! SSDP discovery: multicast NOTIFY announcements and unicast M-SEARCH
//! responses, on UDP port 1900 / group 239.255.255.250.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SSDP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;
const NOTIFY_MAX_AGE: u32 = 300;
const SEARCH_RESPONSE_MAX_AGE: u32 = 1800;
const FAST_ANNOUNCE_ROUNDS: u32 = 30;
const FAST_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(3);
const STEADY_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);
const FACET_SPACING: Duration = Duration::from_millis(100);

struct Facet {
    nt: String,
    usn: String,
}

fn facets(uuid: &str) -> Vec<Facet> {
    vec![
        Facet {
            nt: "upnp:rootdevice".to_string(),
            usn: format!("uuid:{uuid}::upnp:rootdevice"),
        },
        Facet {
            nt: format!("uuid:{uuid}"),
            usn: format!("uuid:{uuid}"),
        },
        Facet {
            nt: "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
            usn: format!("uuid:{uuid}::urn:schemas-upnp-org:device:MediaServer:1"),
        },
        Facet {
            nt: "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
            usn: format!("uuid:{uuid}::urn:schemas-upnp-org:service:ContentDirectory:1"),
        },
        Facet {
            nt: "urn:schemas-upnp-org:service:ConnectionManager:1".to_string(),
            usn: format!("uuid:{uuid}::urn:schemas-upnp-org:service:ConnectionManager:1"),
        },
    ]
}

/// The root/uuid/device-type facets only, used for the byebye batch sent
/// on shutdown.
fn byebye_facets(uuid: &str) -> Vec<Facet> {
    facets(uuid).into_iter().take(3).collect()
}

fn bind_socket() -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if let Err(err) = socket.set_reuse_port(true) {
        warn!("SO_REUSEPORT unavailable, continuing without it: {err}");
    }
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&SSDP_ADDR, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_nonblocking(true)?;
    Ok(UdpSocket::from_std(socket.into())?)
}

fn http_date() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn alive_message(facet: &Facet, location: &str, server_header: &str) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {SSDP_ADDR}:{SSDP_PORT}\r\n\
         CACHE-CONTROL: max-age={NOTIFY_MAX_AGE}\r\n\
         LOCATION: {location}\r\n\
         NT: {}\r\n\
         NTS: ssdp:alive\r\n\
         SERVER: {server_header}\r\n\
         USN: {}\r\n\r\n",
        facet.nt, facet.usn
    )
}

fn byebye_message(facet: &Facet) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {SSDP_ADDR}:{SSDP_PORT}\r\n\
         NT: {}\r\n\
         NTS: ssdp:byebye\r\n\
         USN: {}\r\n\r\n",
        facet.nt, facet.usn
    )
}

fn search_response(st: &str, usn: &str, location: &str, server_header: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={SEARCH_RESPONSE_MAX_AGE}\r\n\
         DATE: {}\r\n\
         EXT:\r\n\
         LOCATION: {location}\r\n\
         SERVER: {server_header}\r\n\
         ST: {st}\r\n\
         USN: {usn}\r\n\r\n",
        http_date(),
    )
}

/// Decide whether a `ST:` search target is one we answer, and if so what
/// `(ST, USN)` pair to reply with. Mirrors the reference server: any
/// generic `urn:schemas-upnp-org:service:*` target and `ssdp:all` are both
/// accepted, but since neither names a concrete facet they fall back to
/// the `upnp:rootdevice` reply. Matching is case-insensitive.
fn search_reply(st: &str, uuid: &str) -> Option<(String, String)> {
    let lower = st.to_ascii_lowercase();
    let is_service = lower.starts_with("urn:schemas-upnp-org:service:");
    let is_uuid_target = lower == format!("uuid:{uuid}").to_ascii_lowercase();
    let accepted = lower == "upnp:rootdevice"
        || lower == "urn:schemas-upnp-org:device:mediaserver:1"
        || is_service
        || lower == "ssdp:all"
        || is_uuid_target;
    if !accepted {
        return None;
    }

    if lower == "upnp:rootdevice" {
        Some((
            "upnp:rootdevice".to_string(),
            format!("uuid:{uuid}::upnp:rootdevice"),
        ))
    } else if lower.contains("mediaserver") {
        Some((
            "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
            format!("uuid:{uuid}::urn:schemas-upnp-org:device:MediaServer:1"),
        ))
    } else if lower.contains("contentdirectory") {
        Some((
            "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
            format!("uuid:{uuid}::urn:schemas-upnp-org:service:ContentDirectory:1"),
        ))
    } else if lower.contains("connectionmanager") {
        Some((
            "urn:schemas-upnp-org:service:ConnectionManager:1".to_string(),
            format!("uuid:{uuid}::urn:schemas-upnp-org:service:ConnectionManager:1"),
        ))
    } else if lower.starts_with("uuid:") {
        Some((format!("uuid:{uuid}"), format!("uuid:{uuid}")))
    } else {
        // ssdp:all, or another service type we don't advertise a concrete
        // facet for (e.g. AVTransport) — answer as the root device.
        Some((
            "upnp:rootdevice".to_string(),
            format!("uuid:{uuid}::upnp:rootdevice"),
        ))
    }
}

async fn send_batch(socket: &UdpSocket, dest: SocketAddr, messages: Vec<String>) {
    for message in messages {
        if let Err(err) = socket.send_to(message.as_bytes(), dest).await {
            warn!("SSDP send to {dest} failed: {err}");
        }
        tokio::time::sleep(FACET_SPACING).await;
    }
}

async fn announce_alive(socket: &UdpSocket, uuid: &str, location: &str, server_header: &str) {
    let dest = SocketAddr::new(SSDP_ADDR.into(), SSDP_PORT);
    let messages = facets(uuid)
        .iter()
        .map(|f| alive_message(f, location, server_header))
        .collect();
    send_batch(socket, dest, messages).await;
}

async fn announce_byebye(socket: &UdpSocket, uuid: &str) {
    let dest = SocketAddr::new(SSDP_ADDR.into(), SSDP_PORT);
    let messages = byebye_facets(uuid).iter().map(byebye_message).collect();
    send_batch(socket, dest, messages).await;
}

async fn responder_loop(
    socket: &UdpSocket,
    uuid: &str,
    location: &str,
    server_header: &str,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; 2048];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut buf) => {
                let Ok((len, peer)) = result else { continue };
                let Ok(text) = std::str::from_utf8(&buf[..len]) else { continue };
                if !text.starts_with("M-SEARCH") {
                    continue;
                }
                let Some(st) = text
                    .lines()
                    .find(|l| l.to_ascii_uppercase().starts_with("ST:"))
                    .map(|l| l[3..].trim().to_string())
                else {
                    continue;
                };
                let Some((reply_st, reply_usn)) = search_reply(&st, uuid) else {
                    debug!("M-SEARCH from {peer} for unmatched ST {st}");
                    continue;
                };
                let response = search_response(&reply_st, &reply_usn, location, server_header);
                if let Err(err) = socket.send_to(response.as_bytes(), peer).await {
                    warn!("SSDP search response to {peer} failed: {err}");
                }
            }
        }
    }
}

async fn announcer_loop(
    socket: &UdpSocket,
    uuid: &str,
    location: &str,
    server_header: &str,
    mut shutdown: watch::Receiver<bool>,
) {
    for _ in 0..FAST_ANNOUNCE_ROUNDS {
        announce_alive(socket, uuid, location, server_header).await;
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(FAST_ANNOUNCE_INTERVAL) => {}
        }
        if *shutdown.borrow() {
            return;
        }
    }
    loop {
        announce_alive(socket, uuid, location, server_header).await;
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(STEADY_ANNOUNCE_INTERVAL) => {}
        }
        if *shutdown.borrow() {
            return;
        }
    }
}

/// Run the SSDP responder and announcer until `shutdown` is signalled,
/// then send a final byebye batch.
pub async fn run(
    uuid: String,
    server_ip: String,
    port: u16,
    server_name: String,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let socket = bind_socket()?;
    let location = format!("http://{server_ip}:{port}/description.xml");
    let server_header = format!("OpenDLNA/1.0 UPnP/1.0 {server_name}");

    info!("SSDP listening on {SSDP_ADDR}:{SSDP_PORT}, advertising {location}");

    tokio::join!(
        responder_loop(&socket, &uuid, &location, &server_header, shutdown.clone()),
        announcer_loop(&socket, &uuid, &location, &server_header, shutdown.clone()),
    );

    announce_byebye(&socket, &uuid).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssdp_all_yields_a_single_rootdevice_reply() {
        let (st, usn) = search_reply("ssdp:all", "abc").unwrap();
        assert_eq!(st, "upnp:rootdevice");
        assert_eq!(usn, "uuid:abc::upnp:rootdevice");
    }

    #[test]
    fn uuid_target_matches_exactly_one_facet() {
        let (st, usn) = search_reply("uuid:abc", "abc").unwrap();
        assert_eq!(st, "uuid:abc");
        assert_eq!(usn, "uuid:abc");
    }

    #[test]
    fn generic_service_target_is_answered_as_rootdevice() {
        let (st, usn) = search_reply("urn:schemas-upnp-org:service:AVTransport:1", "abc").unwrap();
        assert_eq!(st, "upnp:rootdevice");
        assert_eq!(usn, "uuid:abc::upnp:rootdevice");
    }

    #[test]
    fn st_matching_is_case_insensitive() {
        let (st, _) = search_reply("UPNP:ROOTDEVICE", "abc").unwrap();
        assert_eq!(st, "upnp:rootdevice");
        let (st, _) = search_reply(
            "urn:schemas-upnp-org:device:MEDIASERVER:1",
            "abc",
        )
        .unwrap();
        assert_eq!(st, "urn:schemas-upnp-org:device:MediaServer:1");
    }

    #[test]
    fn unknown_target_is_not_answered() {
        assert!(search_reply("urn:some-other-vendor:device:Foo:1", "abc").is_none());
    }

    #[test]
    fn byebye_facets_are_first_three() {
        let all = facets("abc");
        let bye = byebye_facets("abc");
        assert_eq!(bye.len(), 3);
        assert_eq!(bye[0].nt, all[0].nt);
        assert_eq!(bye[2].nt, all[2].nt);
    }
}
