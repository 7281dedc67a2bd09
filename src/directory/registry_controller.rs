//! Dispatches a raw directory request datagram to the registry and
//! produces the corresponding response datagram. REGISTER always uses
//! the datagram's source IP, never a client-supplied one.

use super::protocol::{DirectoryRequest, DirectoryResponse};
use super::registry::Registry;

/// Parses `request_bytes`, dispatches it against `registry`, and encodes
/// the response. `source_ip` is the UDP datagram's source address,
/// authoritative for REGISTER regardless of anything the client claims.
pub fn dispatch(registry: &Registry, request_bytes: &[u8], source_ip: String) -> Option<Vec<u8>> {
    let request: DirectoryRequest = match serde_json::from_slice(request_bytes) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "malformed directory request");
            return encode(&DirectoryResponse::Error {
                msg: "Malformed request".to_string(),
            });
        }
    };

    let result = match request {
        DirectoryRequest::Register { name, port, ttl } => {
            registry.register(&name, source_ip, port, ttl).map(|r| {
                serde_json::to_value(r).expect("Record always serializes")
            })
        }
        DirectoryRequest::Query { name } => registry
            .query(&name)
            .map(|r| serde_json::to_value(r).expect("Record always serializes")),
        DirectoryRequest::Deregister { name } => {
            registry.deregister(&name).map(|()| serde_json::json!({}))
        }
    };

    let response = match result {
        Ok(data) => DirectoryResponse::Ok { data },
        Err(err) => DirectoryResponse::Error {
            msg: err.to_string(),
        },
    };
    encode(&response)
}

fn encode(response: &DirectoryResponse) -> Option<Vec<u8>> {
    match serde_json::to_vec(response) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode directory response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> (Arc<Registry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        (Arc::new(Registry::load(path)), dir)
    }

    #[test]
    fn register_uses_source_ip_not_client_claim() {
        let (reg, _dir) = registry();
        let req = serde_json::to_vec(&DirectoryRequest::Register {
            name: "svc".into(),
            port: 9000,
            ttl: 60,
        })
        .unwrap();
        let resp_bytes = dispatch(&reg, &req, "10.0.0.5".into()).unwrap();
        let resp: DirectoryResponse = serde_json::from_slice(&resp_bytes).unwrap();
        match resp {
            DirectoryResponse::Ok { data } => assert_eq!(data["ip"], "10.0.0.5"),
            DirectoryResponse::Error { msg } => panic!("unexpected error: {msg}"),
        }
    }

    #[test]
    fn query_missing_name_returns_not_found_message() {
        let (reg, _dir) = registry();
        let req = serde_json::to_vec(&DirectoryRequest::Query { name: "nope".into() }).unwrap();
        let resp_bytes = dispatch(&reg, &req, "127.0.0.1".into()).unwrap();
        let resp: DirectoryResponse = serde_json::from_slice(&resp_bytes).unwrap();
        match resp {
            DirectoryResponse::Error { msg } => assert_eq!(msg, "Not found"),
            DirectoryResponse::Ok { .. } => panic!("expected error"),
        }
    }

    #[test]
    fn malformed_request_does_not_panic() {
        let (reg, _dir) = registry();
        let resp_bytes = dispatch(&reg, b"not json", "127.0.0.1".into()).unwrap();
        let resp: DirectoryResponse = serde_json::from_slice(&resp_bytes).unwrap();
        assert!(matches!(resp, DirectoryResponse::Error { .. }));
    }
}
