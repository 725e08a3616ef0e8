use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::{debug, info};

const FALLBACK_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Finds the IPv4 address other machines on the LAN can reach this host on.
///
/// Asks the OS which local address it would route an outbound UDP datagram
/// through. Connecting a UDP socket sends nothing. Falls back to 127.0.0.1
/// when the host has no route.
pub fn machine_ipv4() -> Ipv4Addr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(IpAddr::V4(ip)) if !ip.is_loopback() && !ip.is_unspecified() => ip,
        Ok(other) => {
            debug!(address = %other, "No usable IPv4 route address, using fallback");
            FALLBACK_ADDRESS
        }
        Err(e) => {
            debug!(error = %e, "Machine address lookup failed, using fallback");
            FALLBACK_ADDRESS
        }
    }
}

/// Underlines `s` on ANSI terminals.
pub fn underline(s: &str) -> String {
    format!("\x1b[4m{}\x1b[0m", s)
}

pub fn banner_lines(port: u16, ip: Ipv4Addr) -> Vec<String> {
    vec![
        "Edp Web start.".to_string(),
        format!(
            "Visit {} or {}",
            underline(&format!("http://localhost:{}", port)),
            underline(&format!("http://{}:{}", ip, port))
        ),
        "To stop, Press Ctrl+C".to_string(),
    ]
}

pub fn log_banner(port: u16, ip: Ipv4Addr) {
    for line in banner_lines(port, ip) {
        info!("{}", line);
    }
}
