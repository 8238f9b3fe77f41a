//! Host address helpers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Best guess at the host's LAN address.
///
/// Connecting a UDP socket selects the outbound interface without sending a
/// packet.  Falls back to `127.0.0.1` when there is no route.
pub fn detect_lan_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

/// True for loopback peers, including IPv4-mapped IPv6 loopback.
pub fn is_loopback(peer: &SocketAddr) -> bool {
    match peer.ip() {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}
