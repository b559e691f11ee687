//! Request/response layer used once a connection is authenticated.
//!
//! Every request is one frame carrying `{id, method, params}` and is answered
//! by exactly one frame carrying `{id, result}` or `{id, error}`. Methods are
//! registered on an explicitly constructed [`Router`] that the server is
//! given at construction time.

use crate::codec::{Transport, WireCodec};
use crate::error::{ProbeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

type Handler = Box<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>;

/// A single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// The answer to the request with the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Method name to handler table. Read-only once built.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler under `method`, replacing any previous one.
    pub fn route<P, R, F>(mut self, method: &str, handler: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        let handler: Handler = Box::new(move |params| {
            let params: P =
                serde_json::from_value(params).map_err(|e| format!("invalid params: {e}"))?;
            serde_json::to_value(handler(params)).map_err(|e| format!("invalid result: {e}"))
        });
        self.handlers.insert(method.to_string(), handler);
        self
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Run the handler for `req`. Failures become error responses.
    pub fn dispatch(&self, req: Request) -> Response {
        let outcome = match self.handlers.get(&req.method) {
            Some(handler) => handler(req.params),
            None => Err(format!("unknown method: {}", req.method)),
        };

        match outcome {
            Ok(result) => Response {
                id: req.id,
                result: Some(result),
                error: None,
            },
            Err(error) => Response {
                id: req.id,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Answer requests until the peer disconnects (`Ok`) or a stream or decode
/// error occurs. The transport is dropped, and so closed, on return.
pub async fn serve<T>(mut transport: Transport<T>, router: &Router, codec: &WireCodec) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let req: Request = match codec.recv(&mut transport).await {
            Ok(req) => req,
            Err(ProbeError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        trace!(id = req.id, method = %req.method, "Dispatching request");

        let rsp = router.dispatch(req);
        codec.send(&mut transport, &rsp).await?;
    }
}

/// Calling side of the request/response layer. One call in flight at a time.
pub struct RpcClient<T> {
    transport: Transport<T>,
    codec: WireCodec,
    next_id: u64,
}

impl<T> RpcClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: Transport<T>, codec: WireCodec) -> Self {
        Self {
            transport,
            codec,
            next_id: 0,
        }
    }

    /// Send one request and wait for its response. No deadline is applied
    /// beyond what the transport itself enforces.
    pub async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.next_id = self.next_id.wrapping_add(1);
        let req = Request {
            id: self.next_id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        self.codec.send(&mut self.transport, &req).await?;

        let rsp: Response = self.codec.recv(&mut self.transport).await?;
        if rsp.id != req.id {
            return Err(ProbeError::Protocol(format!(
                "response id {} does not match request id {}",
                rsp.id, req.id
            )));
        }

        match (rsp.result, rsp.error) {
            (_, Some(error)) => Err(ProbeError::Rpc(error)),
            (Some(result), None) => Ok(serde_json::from_value(result)?),
            (None, None) => Err(ProbeError::Protocol("response carries no result".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new()
            .route("Math.Double", |n: i64| n * 2)
            .route("Text.Upper", |s: String| s.to_uppercase())
    }

    #[test]
    fn test_dispatch_known_method() {
        let rsp = router().dispatch(Request {
            id: 3,
            method: "Math.Double".into(),
            params: Value::from(21),
        });
        assert_eq!(rsp.id, 3);
        assert_eq!(rsp.result, Some(Value::from(42)));
        assert!(rsp.error.is_none());
    }

    #[test]
    fn test_dispatch_unknown_method() {
        let rsp = router().dispatch(Request {
            id: 1,
            method: "Nope".into(),
            params: Value::Null,
        });
        assert_eq!(rsp.error.as_deref(), Some("unknown method: Nope"));
        assert!(rsp.result.is_none());
    }

    #[test]
    fn test_dispatch_invalid_params() {
        let rsp = router().dispatch(Request {
            id: 1,
            method: "Math.Double".into(),
            params: Value::from("not a number"),
        });
        assert!(rsp.error.unwrap().starts_with("invalid params"));
    }

    #[tokio::test]
    async fn test_call_and_serve() {
        let codec = WireCodec::default();
        let (a, b) = tokio::io::duplex(4096);
        let router = router();
        let server = tokio::spawn(async move { serve(codec.framed(b), &router, &codec).await });

        let mut client = RpcClient::new(codec.framed(a), codec);
        let doubled: i64 = client.call("Math.Double", &5).await.unwrap();
        assert_eq!(doubled, 10);
        let upper: String = client.call("Text.Upper", &"hi").await.unwrap();
        assert_eq!(upper, "HI");

        let err = client.call::<_, i64>("Missing", &0).await.unwrap_err();
        assert!(matches!(err, ProbeError::Rpc(_)));

        // Peer disconnect ends serving cleanly.
        drop(client);
        tokio_test::assert_ok!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_serve_rejects_non_request_frames() {
        let codec = WireCodec::default();
        let (a, b) = tokio::io::duplex(4096);
        let mut peer = codec.framed(a);
        codec
            .send(&mut peer, &serde_json::json!({"version": "v1", "challenge": "x"}))
            .await
            .unwrap();

        let err = serve(codec.framed(b), &router(), &codec).await.unwrap_err();
        assert!(matches!(err, ProbeError::Decode(_)));
    }
}
