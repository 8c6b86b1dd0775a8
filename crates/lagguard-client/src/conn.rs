//! One-shot HTTP/1.1 requests over a fresh connection.

use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;

use crate::probe::ProbeError;

const USER_AGENT: &str = "lagguard/0.1";

/// Connect to `address` (host:port) and send a bodyless request.
///
/// `host` is the `host` header value, which differs from `address` when a
/// URL omits the default port. The connection is driven by a background
/// task and closes once the response body is dropped.
pub async fn send(
    method: &str,
    address: &str,
    host: &str,
    path: &str,
) -> Result<http::Response<Incoming>, ProbeError> {
    let stream = tokio::net::TcpStream::connect(address)
        .await
        .map_err(|e| ProbeError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ProbeError::Request(e.to_string()))?;

    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method(method)
        .uri(path)
        .header("host", host)
        .header("user-agent", USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| ProbeError::Request(e.to_string()))?;

    sender
        .send_request(req)
        .await
        .map_err(|e| ProbeError::Request(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_port_is_connect_error() {
        let err = send("GET", "127.0.0.1:1", "127.0.0.1:1", "/").await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect { address, .. } if address == "127.0.0.1:1"));
    }

    #[tokio::test]
    async fn invalid_method_is_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let err = send("NOT A METHOD", &address, &address, "/").await.unwrap_err();
        assert!(matches!(err, ProbeError::Request(_)));
    }
}
