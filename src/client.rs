// REST client for the microVM control plane
//
// Firecracker exposes its API as HTTP/1.1 over a UNIX stream socket. The
// transport is a trait so tests (and callers with custom plumbing) can
// intercept the wire; the production transport performs one hyper handshake
// per request, which is cheap at this request volume.
//
// All mutations are issued as PUT on the wire. The endpoints documented as
// PATCH accept PUT with partial bodies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};

/// Raw response from the control-plane transport
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Wire-level seam for the control plane.
///
/// The production implementation speaks HTTP over the API socket; tests
/// substitute a recording fake.
#[async_trait]
pub trait VmmTransport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse>;
}

/// HTTP/1.1 over a UNIX stream socket
#[derive(Debug, Clone)]
pub struct UnixTransport {
    socket_path: PathBuf,
}

impl UnixTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

#[async_trait]
impl VmmTransport for UnixTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Transport(format!(
                "failed to connect to API socket {}: {e}",
                self.socket_path.display()
            ))
        })?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| Error::Transport(format!("HTTP handshake failed: {e}")))?;

        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                // Connections close after the response; nothing to surface.
                debug!("API connection closed: {err:?}");
            }
        });

        let req_body = match body {
            Some(value) => Full::new(Bytes::from(serde_json::to_vec(value)?)),
            None => Full::new(Bytes::new()),
        };

        // The Host header is mandatory in HTTP/1.1 but ignored over a UNIX socket.
        let req = Request::builder()
            .method(method)
            .uri(format!("http://localhost{path}"))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(req_body)
            .map_err(|e| Error::Transport(format!("failed to build request: {e}")))?;

        let res = sender
            .send_request(req)
            .await
            .map_err(|e| Error::Transport(format!("failed to send request: {e}")))?;

        let status = res.status();
        let body = res
            .collect()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        Ok(TransportResponse { status, body })
    }
}

/// Where request traces go
#[derive(Debug, Clone)]
pub enum TraceSink {
    /// Emit one debug-level log line per request
    Logger,
    /// Append one line per request to a file, best-effort
    File(PathBuf),
}

impl TraceSink {
    fn record(&self, method: &Method, path: &str, status: StatusCode) {
        match self {
            TraceSink::Logger => {
                debug!(%method, path, status = status.as_u16(), "API request");
            }
            TraceSink::File(trace_path) => {
                use std::io::Write;
                let line = format!("{method} {path} -> {}\n", status.as_u16());
                let _ = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(trace_path)
                    .and_then(|mut file| file.write_all(line.as_bytes()));
            }
        }
    }
}

/// GET-able views of the running microVM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeKind {
    /// Instance information at `/`
    Instance,
    Balloon,
    BalloonStatistics,
    MachineConfig,
    Mmds,
    /// The full exported VM configuration
    VmConfig,
    Version,
}

impl DescribeKind {
    fn path(self) -> &'static str {
        match self {
            DescribeKind::Instance => "/",
            DescribeKind::Balloon => "/balloon",
            DescribeKind::BalloonStatistics => "/balloon/statistics",
            DescribeKind::MachineConfig => "/machine-config",
            DescribeKind::Mmds => "/mmds",
            DescribeKind::VmConfig => "/vm/config",
            DescribeKind::Version => "/version",
        }
    }
}

/// Typed client over a [`VmmTransport`]
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn VmmTransport>,
    trace: Option<TraceSink>,
}

impl ApiClient {
    /// Client bound to the API socket at `socket_path`
    pub fn unix(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_transport(Arc::new(UnixTransport::new(socket_path)))
    }

    /// Client over a caller-supplied transport
    pub fn with_transport(transport: Arc<dyn VmmTransport>) -> Self {
        Self {
            transport,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Option<TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        let response = self.transport.request(method.clone(), path, body).await?;
        if let Some(trace) = &self.trace {
            trace.record(&method, path, response.status);
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.send(Method::GET, path, None).await?;
        if response.status != StatusCode::OK {
            return Err(decode_failure(&response));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| Error::Transport(format!("undecodable response from {path}: {e}")))
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<()> {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        match response.status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            _ => Err(decode_failure(&response)),
        }
    }

    /// GET one of the describable views, decoded as JSON
    pub async fn describe(&self, kind: DescribeKind) -> Result<Value> {
        self.get_json(kind.path()).await
    }

    /// PUT the full declarative body of a resource
    pub async fn put(&self, resource: &Resource) -> Result<()> {
        self.put_json(&resource.path(), &resource.body()).await
    }

    /// Update a resource on a running microVM with its post-boot fields.
    ///
    /// The balloon splits across two endpoints: the statistics interval goes
    /// to `/balloon/statistics` first, and the target size follows on
    /// `/balloon` only if that succeeded.
    pub async fn patch(&self, resource: &Resource) -> Result<()> {
        if resource.kind() == ResourceKind::Balloon {
            return self.patch_balloon(resource).await;
        }
        self.put_json(&resource.path(), &resource.patch_body()).await
    }

    async fn patch_balloon(&self, resource: &Resource) -> Result<()> {
        if let Some(interval) = resource.get("stats_polling_interval_s") {
            self.put_json(
                "/balloon/statistics",
                &json!({ "stats_polling_interval_s": interval }),
            )
            .await?;
        }
        if let Some(amount) = resource.get("amount_mib") {
            self.put_json("/balloon", &json!({ "amount_mib": amount }))
                .await?;
        }
        Ok(())
    }

    /// PUT `/actions` with the given action type
    pub async fn create_sync_action(&self, action_type: &str) -> Result<()> {
        self.put_json("/actions", &json!({ "action_type": action_type }))
            .await
    }

    /// PUT `/snapshot/create`
    pub async fn create_snapshot(&self, body: &Value) -> Result<()> {
        self.put_json("/snapshot/create", body).await
    }

    /// PUT `/snapshot/load`
    pub async fn load_snapshot(&self, body: &Value) -> Result<()> {
        self.put_json("/snapshot/load", body).await
    }

    /// Update the VM state at `/vm` (pause/resume)
    pub async fn patch_vm(&self, state: &str) -> Result<()> {
        self.put_json("/vm", &json!({ "state": state })).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

/// Map a non-success response to a typed error. Bodies carrying a
/// `fault_message` become API faults; everything else is a transport error.
fn decode_failure(response: &TransportResponse) -> Error {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&response.body) {
        if let Some(Value::String(fault_message)) = map.get("fault_message") {
            return Error::Api {
                fault_message: fault_message.clone(),
            };
        }
    }
    Error::Transport(format!("unexpected HTTP status {}", response.status))
}

/// Recording fake transport, shared by unit tests across the crate
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every request and replies from a scripted table
    pub(crate) struct FakeTransport {
        pub log: Mutex<Vec<(Method, String, Option<Value>)>>,
        /// `(path, status, body)` — first match wins, default 204 empty
        pub replies: Vec<(&'static str, u16, &'static str)>,
    }

    impl FakeTransport {
        pub fn ok() -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                replies: Vec::new(),
            }
        }

        pub fn with_replies(replies: Vec<(&'static str, u16, &'static str)>) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                replies,
            }
        }

        pub fn paths(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .map(|(_, path, _)| path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl VmmTransport for FakeTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<&Value>,
        ) -> Result<TransportResponse> {
            self.log
                .lock()
                .unwrap()
                .push((method, path.to_string(), body.cloned()));
            let (status, reply) = self
                .replies
                .iter()
                .find(|(p, _, _)| *p == path)
                .map(|(_, status, body)| (*status, *body))
                .unwrap_or((204, ""));
            Ok(TransportResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body: Bytes::from_static(reply.as_bytes()),
            })
        }
    }
}
