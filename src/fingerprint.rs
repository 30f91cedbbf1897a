//! Request/response fingerprint construction (§3 "Fingerprint", §4.A).
//!
//! A fingerprint identifies a DNS query/response pair irrespective of
//! direction: the endpoint pair is canonicalized (client before server,
//! by lexicographic byte order of `(ip, port)`) before hashing, so a
//! request and its matching response hash identically.

use sha2::{Digest, Sha256};
use std::net::IpAddr;

use crate::packet::Endpoint;

/// Fixed-length fingerprint key. Equality of fingerprints is the match
/// predicate (§3).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0[..8]))
    }
}

fn endpoint_key(ip: IpAddr, port: u16) -> ([u8; 16], u16) {
    let bytes = match ip {
        IpAddr::V4(v4) => {
            let mut b = [0u8; 16];
            b[12..16].copy_from_slice(&v4.octets());
            b
        }
        IpAddr::V6(v6) => v6.octets(),
    };
    (bytes, port)
}

/// Builds the canonical fingerprint for a DNS packet.
///
/// `is_response` only affects which side is `src`/`dst` here; the
/// canonicalization step below makes the result identical for a request
/// and its matching response, since the client/server pair of a
/// response is the mirror image of the pair in its request.
pub fn compute(
    src: &Endpoint,
    dst: &Endpoint,
    is_response: bool,
    txn_id: u16,
    qname: &str,
    qtype: u16,
    qclass: u16,
) -> Fingerprint {
    // Client is whichever side issued the request: for a request packet
    // that's `src`; for a response it's `dst` (the response is addressed
    // back to the client).
    let (client, server) = if is_response { (dst, src) } else { (src, dst) };

    let (client_bytes, client_port) = endpoint_key(client.ip, client.port);
    let (server_bytes, server_port) = endpoint_key(server.ip, server.port);

    let ((first_ip, first_port), (second_ip, second_port)) =
        if (client_bytes, client_port) <= (server_bytes, server_port) {
            ((client_bytes, client_port), (server_bytes, server_port))
        } else {
            ((server_bytes, server_port), (client_bytes, client_port))
        };

    let mut hasher = Sha256::new();
    hasher.update(first_ip);
    hasher.update(first_port.to_be_bytes());
    hasher.update(second_ip);
    hasher.update(second_port.to_be_bytes());
    hasher.update(txn_id.to_be_bytes());
    hasher.update(qname.as_bytes());
    hasher.update(qtype.to_be_bytes());
    hasher.update(qclass.to_be_bytes());

    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Fingerprint(out)
}
