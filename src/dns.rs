//! 通配 DNS 应答
//!
//! 只实现门户需要的 RFC 1035 子集：解析标准查询的第一个问题，
//! 用指向本机的 A 记录回答。

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use anyhow::Context;

const DNS_HEADER_SIZE: usize = 12;
/// Plain DNS over UDP without EDNS.
const MAX_PACKET_SIZE: usize = 512;
/// Datagrams drained per service round.
const MAX_QUERIES_PER_ROUND: usize = 8;

pub const QTYPE_A: u16 = 1;
pub const QTYPE_AAAA: u16 = 28;
pub const QTYPE_ANY: u16 = 255;
const QCLASS_IN: u16 = 1;

pub const DEFAULT_TTL: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub flags: u16,
    /// lower-cased, dot separated
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
    /// raw first question, echoed back in the answer
    pub question: Vec<u8>,
}

/// Parse the header and first question of a standard query.
///
/// Returns `None` for responses, non-zero opcodes, empty question sections and
/// anything truncated.
pub fn parse_query(packet: &[u8]) -> Option<DnsQuery> {
    let header = packet.get(..DNS_HEADER_SIZE)?;

    let id = u16::from_be_bytes([header[0], header[1]]);
    let flags = u16::from_be_bytes([header[2], header[3]]);
    let qdcount = u16::from_be_bytes([header[4], header[5]]);

    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0xF;
    if is_response || opcode != 0 || qdcount == 0 {
        return None;
    }

    let mut pos = DNS_HEADER_SIZE;
    let mut labels: Vec<String> = Vec::new();
    loop {
        let len = *packet.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        // 0xC0 and friends are compression pointers, never valid in a question
        if len > 63 {
            return None;
        }
        let label = packet.get(pos..pos + len)?;
        labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
        pos += len;
    }

    let tail = packet.get(pos..pos + 4)?;
    let qtype = u16::from_be_bytes([tail[0], tail[1]]);
    let qclass = u16::from_be_bytes([tail[2], tail[3]]);

    Some(DnsQuery {
        id,
        flags,
        qname: labels.join("."),
        qtype,
        qclass,
        question: packet[DNS_HEADER_SIZE..pos + 4].to_vec(),
    })
}

/// Answer `query` with `address`.
///
/// A and ANY questions get one A record. Everything else (AAAA mostly) gets an
/// empty NOERROR answer so the client falls back to IPv4 and still ends up here.
pub fn build_answer(query: &DnsQuery, address: Ipv4Addr, ttl: u32) -> Vec<u8> {
    let answers = matches!(query.qtype, QTYPE_A | QTYPE_ANY);
    let mut resp = Vec::with_capacity(DNS_HEADER_SIZE + query.question.len() + 16);

    resp.extend_from_slice(&query.id.to_be_bytes());
    // QR=1 AA=1, RD echoed, RCODE=0
    let flags: u16 = 0x8000 | 0x0400 | (query.flags & 0x0100);
    resp.extend_from_slice(&flags.to_be_bytes());
    resp.extend_from_slice(&1u16.to_be_bytes());
    resp.extend_from_slice(&u16::from(answers).to_be_bytes());
    resp.extend_from_slice(&0u16.to_be_bytes());
    resp.extend_from_slice(&0u16.to_be_bytes());

    resp.extend_from_slice(&query.question);

    if answers {
        resp.extend_from_slice(&[0xC0, 0x0C]);
        resp.extend_from_slice(&QTYPE_A.to_be_bytes());
        resp.extend_from_slice(&QCLASS_IN.to_be_bytes());
        resp.extend_from_slice(&ttl.to_be_bytes());
        resp.extend_from_slice(&4u16.to_be_bytes());
        resp.extend_from_slice(&address.octets());
    }

    resp
}

/// The wildcard responder the portal drives from its poll task.
pub trait DnsResponder: Send + 'static {
    /// Bind `port` and answer every query with `address`.
    fn bind(&mut self, port: u16, address: Ipv4Addr) -> anyhow::Result<()>;

    /// Serve whatever is pending without blocking. Returns the number of
    /// queries answered.
    fn process_next_request(&mut self) -> anyhow::Result<usize>;

    fn unbind(&mut self);
}

/// [`DnsResponder`] on a non-blocking UDP socket.
pub struct UdpWildcardResponder {
    socket: Option<UdpSocket>,
    address: Ipv4Addr,
    ttl: u32,
    buf: [u8; MAX_PACKET_SIZE],
}

impl UdpWildcardResponder {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: u32) -> Self {
        Self {
            socket: None,
            address: Ipv4Addr::UNSPECIFIED,
            ttl,
            buf: [0; MAX_PACKET_SIZE],
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_bound(&self) -> bool {
        self.socket.is_some()
    }
}

impl Default for UdpWildcardResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResponder for UdpWildcardResponder {
    fn bind(&mut self, port: u16, address: Ipv4Addr) -> anyhow::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .with_context(|| format!("failed to bind DNS socket on port {}", port))?;
        socket
            .set_nonblocking(true)
            .context("failed to make DNS socket non-blocking")?;

        log::info!("DNS server started on port {} - responding with {}", port, address);

        self.socket = Some(socket);
        self.address = address;
        Ok(())
    }

    fn process_next_request(&mut self) -> anyhow::Result<usize> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(0);
        };

        let mut answered = 0;
        for _ in 0..MAX_QUERIES_PER_ROUND {
            let (len, remote) = match socket.recv_from(&mut self.buf) {
                Ok(r) => r,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                // ICMP port unreachable from an earlier reply shows up here on some stacks
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e).context("DNS receive failed"),
            };

            let packet = &self.buf[..len];
            let Some(query) = parse_query(packet) else {
                log::debug!("Dropping malformed DNS packet ({} bytes) from {}", len, remote);
                continue;
            };

            let resp = build_answer(&query, self.address, self.ttl);
            match socket.send_to(&resp, remote) {
                Ok(_) => {
                    log::debug!("DNS {} answered with {} for {}", query.qname, self.address, remote);
                    answered += 1;
                }
                Err(e) => log::warn!("DNS send error to {}: {:?}", remote, e),
            }
        }

        Ok(answered)
    }

    fn unbind(&mut self) {
        if self.socket.take().is_some() {
            log::info!("DNS server stopped");
        }
    }
}
