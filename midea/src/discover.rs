//! UDP broadcast discovery: probe the LAN, classify replies by protocol
//! version (V1 plaintext XML / V2 AES-ECB / V3 header-stripped AES), and
//! build [`DeviceDescriptor`]s (spec §6).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::cloud::CloudClient;
use crate::crypto::{aes_ecb_decrypt, app_key};
use crate::error::{InvalidFrameError, Result};

pub const DISCOVERY_PORTS: [u16; 2] = [6445, 20086];
const DEFAULT_BROADCAST: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);
const DEFAULT_PROBE_COUNT: u32 = 3;
const PROBE_PAYLOAD: &[u8] = &[
    0x5a, 0x5a, 0x01, 0x11, 0x48, 0x00, 0x92, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
    V3,
}

/// Everything learned about a device from its discovery reply (spec §3
/// "DeviceDescriptor"). `token`/`key` are populated later, by
/// `cloud::authenticate()`, for V3 devices only — V2 devices never carry
/// them, and `protocol_version == 3` with either absent means the device is
/// unusable until authentication succeeds.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub id: String,
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: ProtocolVersion,
    pub device_type: u8,
    pub name: String,
    pub serial: String,
    pub token: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub target: IpAddr,
    pub probes: u32,
    pub per_probe_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            target: IpAddr::V4(DEFAULT_BROADCAST),
            probes: DEFAULT_PROBE_COUNT,
            per_probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Broadcast discovery probes on both well-known ports and collect replies,
/// deduplicating by source IP (spec §6: a device may answer on more than one
/// port, or with more than one protocol version, for a single probe round).
pub async fn discover(opts: &DiscoveryOptions) -> Result<Vec<DeviceDescriptor>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(|e| {
        crate::error::TransportError::Connect(e)
    })?;
    socket.set_broadcast(true).ok();

    let mut found = Vec::new();
    let mut seen_ips = std::collections::HashSet::new();

    for _ in 0..opts.probes {
        for &port in &DISCOVERY_PORTS {
            let dest = SocketAddr::new(opts.target, port);
            if let Err(e) = socket.send_to(PROBE_PAYLOAD, dest).await {
                warn!(?e, "discovery probe send failed");
            }
        }

        let mut buf = [0u8; 512];
        let deadline = tokio::time::Instant::now() + opts.per_probe_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
                Ok(Ok((n, from))) => {
                    if !seen_ips.insert(from.ip()) {
                        continue;
                    }
                    match parse_reply(&buf[..n], from) {
                        Ok(descriptor) => found.push(descriptor),
                        Err(e) => debug!(?e, %from, "unparseable discovery reply"),
                    }
                }
                Ok(Err(e)) => {
                    warn!(?e, "discovery recv failed");
                    break;
                }
                Err(_) => break,
            }
        }
    }

    Ok(found)
}

/// Resolve `token`/`key` for every V3 descriptor that's missing them,
/// mirroring `discover.py`'s `_get_device()` -> `_authenticate_device()`
/// pattern: discovery alone never carries a V3 device's AES credentials,
/// they have to be fetched from the vendor cloud once the device's id is
/// known. Descriptors that fail authentication are left with `token`/`key`
/// unset and a warning logged; per spec §3 they remain unusable.
pub async fn authenticate_v3_devices(descriptors: &mut [DeviceDescriptor], cloud: &dyn CloudClient) {
    for descriptor in descriptors.iter_mut() {
        if descriptor.protocol != ProtocolVersion::V3 || descriptor.token.is_some() {
            continue;
        }
        match crate::cloud::authenticate(cloud, &descriptor.id).await {
            Ok((token, key)) => {
                descriptor.token = Some(token);
                descriptor.key = Some(key);
            }
            Err(e) => warn!(id = %descriptor.id, %e, "V3 device authentication failed"),
        }
    }
}

/// Classify and parse one discovery reply (spec §4.6). V1 is plaintext XML;
/// V2 starts with `0x5A 0x5A`; V3 starts with `0x83 0x70` and wraps the same
/// V2-shaped body inside an 8-byte header and a 16-byte trailing hash.
fn parse_reply(raw: &[u8], from: SocketAddr) -> Result<DeviceDescriptor> {
    if raw.len() > 40 && &raw[..2] == b"<m" {
        return parse_v1_xml(raw, from);
    }
    match raw.get(..2) {
        Some([0x5a, 0x5a]) => parse_v2(raw, from),
        Some([0x83, 0x70]) => parse_v3(raw, from),
        _ => Err(InvalidFrameError::new("unrecognized discovery reply version", 0).into()),
    }
}

/// V1 replies are plaintext XML; used only by very old firmware. The full
/// device record requires a further TCP query this crate doesn't implement
/// (spec's V1 support is discovery-only), so `name`/`serial` are left empty
/// when the reply doesn't carry them.
fn parse_v1_xml(raw: &[u8], from: SocketAddr) -> Result<DeviceDescriptor> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| InvalidFrameError::new("V1 reply is not valid UTF-8", 0))?;
    let id = extract_xml_field(text, "id").ok_or_else(|| InvalidFrameError::new("V1 reply missing id", 0))?;
    let device_type = extract_xml_field(text, "apc")
        .and_then(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0xAC);

    Ok(DeviceDescriptor {
        id,
        ip: from.ip(),
        port: from.port(),
        protocol: ProtocolVersion::V1,
        device_type,
        name: extract_xml_field(text, "SSID").unwrap_or_default(),
        serial: String::new(),
        token: None,
        key: None,
    })
}

fn extract_xml_field<'a>(text: &'a str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].to_string())
}

/// V2 replies: device id lives in the outer (still-encrypted-adjacent)
/// buffer at bytes 20..26, little-endian; the AES-ECB ciphertext (shared
/// application key) is at bytes 40..-16.
fn parse_v2(raw: &[u8], from: SocketAddr) -> Result<DeviceDescriptor> {
    decode_outer_buffer(raw, from, ProtocolVersion::V2)
}

/// V3 replies strip an 8-byte outer header and 16-byte trailing hash, then
/// decode exactly like V2.
fn parse_v3(raw: &[u8], from: SocketAddr) -> Result<DeviceDescriptor> {
    if raw.len() < 24 {
        return Err(InvalidFrameError::new("V3 discovery reply too short", 0).into());
    }
    decode_outer_buffer(&raw[8..raw.len() - 16], from, ProtocolVersion::V3)
}

fn decode_outer_buffer(outer: &[u8], from: SocketAddr, protocol: ProtocolVersion) -> Result<DeviceDescriptor> {
    if outer.len() < 42 {
        return Err(InvalidFrameError::new("discovery reply too short", 0).into());
    }

    let id = u64::from_le_bytes({
        let mut buf = [0u8; 8];
        buf[..6].copy_from_slice(&outer[20..26]);
        buf
    });

    let encrypted = &outer[40..outer.len() - 16];
    let decrypted = aes_ecb_decrypt(&app_key(), encrypted)?;
    decode_descriptor_body(&decrypted, id, from, protocol)
}

fn decode_descriptor_body(body: &[u8], id: u64, from: SocketAddr, protocol: ProtocolVersion) -> Result<DeviceDescriptor> {
    if body.len() < 41 {
        return Err(InvalidFrameError::new("decrypted discovery body too short", 0).into());
    }

    let ip = IpAddr::V4(Ipv4Addr::new(body[3], body[2], body[1], body[0]));
    if ip != from.ip() {
        warn!(reported = %ip, actual = %from.ip(), "discovery reply IP does not match received address");
    }
    let port = u16::from_le_bytes([body[4], body[5]]);

    let serial = std::str::from_utf8(&body[8..40])
        .map_err(|_| InvalidFrameError::new("discovery body serial is not valid UTF-8", 8))?
        .trim_end_matches('\0')
        .to_string();

    let name_len = body[40] as usize;
    if body.len() < 41 + name_len {
        return Err(InvalidFrameError::new("discovery body name truncated", 40).into());
    }
    let name = std::str::from_utf8(&body[41..41 + name_len])
        .map_err(|_| InvalidFrameError::new("discovery body name is not valid UTF-8", 41))?
        .to_string();

    let device_type = name
        .split('_')
        .nth(1)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .unwrap_or(0xAC);

    Ok(DeviceDescriptor {
        id: format!("{id:012x}"),
        ip,
        port,
        protocol,
        device_type,
        name,
        serial,
        token: None,
        key: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes_ecb_encrypt;

    #[test]
    fn extracts_xml_fields() {
        let xml = "<msg><id>1234</id><apc>0xac</apc></msg>";
        assert_eq!(extract_xml_field(xml, "id"), Some("1234".to_string()));
        assert_eq!(extract_xml_field(xml, "apc"), Some("0xac".to_string()));
        assert_eq!(extract_xml_field(xml, "missing"), None);
    }

    /// Builds a complete V2/V3-shaped outer buffer so tests exercise the
    /// real decode path: outer id field + 40-byte pad + AES-ECB(app key) of
    /// a decrypted-body plaintext laid out per spec §4.6 / `discover.py`.
    fn build_outer_body(device_id: u64, ip: Ipv4Addr, port: u16, serial: &str, name: &str) -> Vec<u8> {
        assert_eq!(serial.len(), 32);
        let octets = ip.octets();

        let mut plaintext = vec![0u8; 41 + name.len()];
        plaintext[0] = octets[3];
        plaintext[1] = octets[2];
        plaintext[2] = octets[1];
        plaintext[3] = octets[0];
        plaintext[4..6].copy_from_slice(&port.to_le_bytes());
        plaintext[8..40].copy_from_slice(serial.as_bytes());
        plaintext[40] = name.len() as u8;
        plaintext[41..41 + name.len()].copy_from_slice(name.as_bytes());

        let encrypted = aes_ecb_encrypt(&app_key(), &plaintext);

        let mut outer = vec![0u8; 40];
        outer[20..26].copy_from_slice(&device_id.to_le_bytes()[..6]);
        outer.extend_from_slice(&encrypted);
        outer
    }

    #[test]
    fn v2_reply_decrypts_id_ip_port_serial_name_and_device_type() {
        let ip = Ipv4Addr::new(10, 100, 1, 239);
        let outer = build_outer_body(
            0x0123_4567_89AB,
            ip,
            6444,
            "000000P0000000Q1B88C29C963BA0000",
            "net_ac_63BA",
        );
        let mut raw = outer.clone();
        raw[0] = 0x5a;
        raw[1] = 0x5a;
        raw.extend_from_slice(&[0u8; 16]); // trailing bytes, unused by the V2 path

        let from: SocketAddr = "10.100.1.239:6445".parse().unwrap();
        let descriptor = parse_reply(&raw, from).unwrap();

        assert_eq!(descriptor.protocol, ProtocolVersion::V2);
        assert_eq!(descriptor.device_type, 0xAC);
        assert_eq!(descriptor.id, "0123456789ab");
        assert_eq!(descriptor.ip, IpAddr::V4(ip));
        assert_eq!(descriptor.port, 6444);
        assert_eq!(descriptor.serial, "000000P0000000Q1B88C29C963BA0000");
        assert_eq!(descriptor.name, "net_ac_63BA");
        assert!(descriptor.token.is_none());
        assert!(descriptor.key.is_none());
    }

    #[test]
    fn v3_reply_strips_header_and_hash_before_decoding() {
        let ip = Ipv4Addr::new(10, 100, 1, 239);
        let outer = build_outer_body(
            0x7d3b_a34a_5685,
            ip,
            6444,
            "000000P0000000Q1B88C29C963BA0000",
            "net_ac_63BA",
        );

        let mut raw = vec![0x83, 0x70, 0, 0, 0, 0, 0, 0]; // 8-byte V3 header
        raw.extend_from_slice(&outer);
        raw.extend_from_slice(&[0u8; 16]); // trailing signature

        let from: SocketAddr = "10.100.1.239:6444".parse().unwrap();
        let descriptor = parse_reply(&raw, from).unwrap();

        assert_eq!(descriptor.protocol, ProtocolVersion::V3);
        assert_eq!(descriptor.device_type, 0xAC);
        assert_eq!(descriptor.id, "7d3ba34a5685");
        assert_eq!(descriptor.ip, IpAddr::V4(ip));
        assert_eq!(descriptor.name, "net_ac_63BA");
    }

    #[tokio::test]
    async fn authenticate_v3_devices_populates_token_and_key() {
        use async_trait::async_trait;

        struct StubCloud;
        #[async_trait]
        impl CloudClient for StubCloud {
            async fn login(&mut self) -> Result<()> {
                Ok(())
            }
            async fn get_token(&self, _udp_id_hex: &str) -> Result<(String, String)> {
                Ok(("tok".to_string(), "key".to_string()))
            }
        }

        let mut descriptors = vec![DeviceDescriptor {
            id: "0123456789ab".to_string(),
            ip: IpAddr::V4(Ipv4Addr::new(10, 100, 1, 239)),
            port: 6444,
            protocol: ProtocolVersion::V3,
            device_type: 0xAC,
            name: "net_ac_63BA".to_string(),
            serial: "000000P0000000Q1B88C29C963BA0000".to_string(),
            token: None,
            key: None,
        }];

        authenticate_v3_devices(&mut descriptors, &StubCloud).await;
        assert_eq!(descriptors[0].token.as_deref(), Some("tok"));
        assert_eq!(descriptors[0].key.as_deref(), Some("key"));
    }
}
