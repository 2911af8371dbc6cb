//! SSDP announcement: periodic NOTIFY alive, NOTIFY byebye on shutdown, and
//! a listener answering M-SEARCH discovery requests. Advertises only the
//! `MediaServer` device and its two services; no `AVTransport`/
//! `MediaRenderer`, since this server never renders media itself.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::HttpError;

const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
const SSDP_ALIVE_INTERVAL_SECS: u64 = 1800;

const NOTIFICATION_TYPES: &[&str] = &[
    "upnp:rootdevice",
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:service:ContentDirectory:1",
    "urn:schemas-upnp-org:service:ConnectionManager:1",
];

#[async_trait]
pub trait SsdpAdvertiser {
    async fn notify_alive(&self) -> Result<(), HttpError>;
    async fn notify_byebye(&self) -> Result<(), HttpError>;
}

pub struct UdpSsdpAdvertiser {
    pub device_uuid: String,
    pub port: u16,
}

#[async_trait]
impl SsdpAdvertiser for UdpSsdpAdvertiser {
    async fn notify_alive(&self) -> Result<(), HttpError> {
        let local_ip = get_local_ip()?;
        let location = format!("http://{}:{}/rootDesc.xml", local_ip, self.port);
        for nt in NOTIFICATION_TYPES {
            let usn = usn_for(&self.device_uuid, nt);
            let message = format!(
                "NOTIFY * HTTP/1.1\r\n\
                 HOST: {SSDP_MULTICAST_ADDR}\r\n\
                 CACHE-CONTROL: max-age={SSDP_ALIVE_INTERVAL_SECS}\r\n\
                 LOCATION: {location}\r\n\
                 NT: {nt}\r\n\
                 NTS: ssdp:alive\r\n\
                 SERVER: dms/1.0 UPnP/1.0\r\n\
                 USN: {usn}\r\n\
                 \r\n"
            );
            send_multicast(&message)?;
        }
        Ok(())
    }

    async fn notify_byebye(&self) -> Result<(), HttpError> {
        for nt in NOTIFICATION_TYPES {
            let usn = usn_for(&self.device_uuid, nt);
            let message = format!(
                "NOTIFY * HTTP/1.1\r\n\
                 HOST: {SSDP_MULTICAST_ADDR}\r\n\
                 NT: {nt}\r\n\
                 NTS: ssdp:byebye\r\n\
                 USN: {usn}\r\n\
                 \r\n"
            );
            send_multicast(&message)?;
        }
        Ok(())
    }
}

fn usn_for(device_uuid: &str, nt: &str) -> String {
    if nt == device_uuid {
        device_uuid.to_string()
    } else {
        format!("{device_uuid}::{nt}")
    }
}

/// Runs until aborted: sends NOTIFY alive once on entry, then again every
/// [`SSDP_ALIVE_INTERVAL_SECS`].
pub async fn run_periodic_notify(advertiser: impl SsdpAdvertiser) {
    if let Err(err) = advertiser.notify_alive().await {
        tracing::warn!(%err, "initial SSDP NOTIFY alive failed");
    }
    loop {
        tokio::time::sleep(Duration::from_secs(SSDP_ALIVE_INTERVAL_SECS)).await;
        if let Err(err) = advertiser.notify_alive().await {
            tracing::warn!(%err, "periodic SSDP NOTIFY alive failed");
        }
    }
}

/// Runs until aborted: answers M-SEARCH requests on the SSDP multicast
/// group with a unicast 200 OK naming our device/services.
pub async fn run_msearch_responder(device_uuid: String, port: u16) -> Result<(), HttpError> {
    let socket = create_msearch_listener()?;
    let mut buf = [0u8; 2048];
    loop {
        let (len, addr) = socket.recv_from(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..len]).into_owned();
        if !request.starts_with("M-SEARCH") {
            continue;
        }
        let st = extract_search_target(&request);
        if should_respond_to_st(&st, &device_uuid) {
            if let Err(err) = send_msearch_response(&socket, addr, &device_uuid, &st, port).await {
                tracing::warn!(%err, %st, "failed to send M-SEARCH response");
            }
        }
    }
}

fn create_msearch_listener() -> Result<UdpSocket, HttpError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(HttpError::Io)?;
    socket.set_reuse_address(true).map_err(HttpError::Io)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(HttpError::Io)?;
    let addr: SocketAddr = "0.0.0.0:1900".parse().expect("valid socket addr");
    socket.bind(&addr.into()).map_err(HttpError::Io)?;
    socket.set_nonblocking(true).map_err(HttpError::Io)?;

    let std_socket: StdUdpSocket = socket.into();
    std_socket
        .join_multicast_v4(&Ipv4Addr::new(239, 255, 255, 250), &Ipv4Addr::UNSPECIFIED)
        .map_err(HttpError::Io)?;
    UdpSocket::from_std(std_socket).map_err(HttpError::Io)
}

async fn send_msearch_response(
    socket: &UdpSocket,
    dest: SocketAddr,
    device_uuid: &str,
    st: &str,
    port: u16,
) -> Result<(), HttpError> {
    let local_ip = get_local_ip()?;
    let location = format!("http://{local_ip}:{port}/rootDesc.xml");
    let usn = usn_for(device_uuid, st);
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={SSDP_ALIVE_INTERVAL_SECS}\r\n\
         EXT:\r\n\
         LOCATION: {location}\r\n\
         SERVER: dms/1.0 UPnP/1.0\r\n\
         ST: {st}\r\n\
         USN: {usn}\r\n\
         \r\n"
    );
    socket.send_to(response.as_bytes(), dest).await?;
    Ok(())
}

fn extract_search_target(request: &str) -> String {
    for line in request.lines() {
        if line.len() >= 3 && line[..3].eq_ignore_ascii_case("ST:") {
            return line.split_once(':').map(|(_, v)| v.trim().to_string()).unwrap_or_default();
        }
    }
    String::new()
}

fn should_respond_to_st(st: &str, device_uuid: &str) -> bool {
    match st {
        "ssdp:all" => true,
        "upnp:rootdevice" => true,
        st if st == device_uuid => true,
        "urn:schemas-upnp-org:device:MediaServer:1" => true,
        "urn:schemas-upnp-org:service:ContentDirectory:1" => true,
        "urn:schemas-upnp-org:service:ConnectionManager:1" => true,
        _ => false,
    }
}

fn send_multicast(message: &str) -> Result<(), HttpError> {
    let socket = StdUdpSocket::bind("0.0.0.0:0")?;
    socket.set_multicast_ttl_v4(2)?;
    let addr: SocketAddr = SSDP_MULTICAST_ADDR.parse().expect("valid multicast addr");
    socket.send_to(message.as_bytes(), addr)?;
    Ok(())
}

fn get_local_ip() -> Result<std::net::IpAddr, HttpError> {
    let socket = StdUdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responds_to_rootdevice_and_our_services_only() {
        let uuid = "uuid:12345678-1234-1234-1234-123456789012";
        assert!(should_respond_to_st("ssdp:all", uuid));
        assert!(should_respond_to_st("upnp:rootdevice", uuid));
        assert!(should_respond_to_st(uuid, uuid));
        assert!(should_respond_to_st("urn:schemas-upnp-org:device:MediaServer:1", uuid));
        assert!(!should_respond_to_st("urn:schemas-upnp-org:service:AVTransport:1", uuid));
        assert!(!should_respond_to_st("some:other:device", uuid));
    }

    #[test]
    fn extracts_search_target_case_insensitively() {
        let req = "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nst: upnp:rootdevice\r\n\r\n";
        assert_eq!(extract_search_target(req), "upnp:rootdevice");
    }

    #[test]
    fn usn_matches_bare_uuid_for_uuid_search_target() {
        let uuid = "uuid:abc";
        assert_eq!(usn_for(uuid, uuid), "uuid:abc");
        assert_eq!(usn_for(uuid, "upnp:rootdevice"), "uuid:abc::upnp:rootdevice");
    }
}
