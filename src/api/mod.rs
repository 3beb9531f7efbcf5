//! Local HTTP surface for observers and operators.
//!
//! Read endpoints (`/health`, `/get_alert`, `/session`) need no credentials.
//! `/get_alert` only loads the shared flag, so it answers immediately even
//! while a session switch is joining the previous worker. Control endpoints
//! (`POST /session/...`) require `Authorization: Bearer <token>`.

use crate::alert::AlertReader;
use crate::ingest::SourceSpec;
use crate::session::SessionManager;
use anyhow::{anyhow, Result};
use rand::RngCore;
use serde_json::json;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub token_path: Option<PathBuf>,
    /// Device used by `POST /session/webcam` when no `device` is given.
    pub webcam_device: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8799".to_string(),
            token_path: None,
            webcam_device: "/dev/video0".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    pub token: String,
    pub token_path: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

/// Random bearer token guarding the control endpoints.
#[derive(Clone)]
pub struct ControlToken {
    token: [u8; 32],
}

impl ControlToken {
    pub fn generate() -> Self {
        let mut token = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut token);
        Self { token }
    }

    pub fn token_hex(&self) -> String {
        hex::encode(self.token)
    }

    pub fn validate(&self, presented: &str) -> Result<()> {
        let presented = parse_hex32(presented)?;
        // Compare every byte regardless of where the first mismatch is.
        let diff = presented
            .iter()
            .zip(self.token.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(anyhow!("control token invalid"));
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    sessions: Arc<SessionManager>,
}

struct ApiContext {
    cfg: ApiConfig,
    sessions: Arc<SessionManager>,
    alerts: AlertReader,
    token: ControlToken,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, sessions: Arc<SessionManager>) -> Self {
        Self { cfg, sessions }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let token = ControlToken::generate();
        let token_hex = token.token_hex();
        if let Some(path) = &self.cfg.token_path {
            write_token_file(path, &token_hex)?;
        }

        let token_path = self.cfg.token_path.clone();
        let ctx = Arc::new(ApiContext {
            alerts: self.sessions.reader(),
            cfg: self.cfg,
            sessions: self.sessions,
            token,
        });
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("firewatch-api".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, ctx, shutdown_thread) {
                    log::error!("api stopped: {}", err);
                }
            })?;

        log::info!("api listening on {}", addr);
        Ok(ApiHandle {
            addr,
            token: token_hex,
            token_path,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, ctx: Arc<ApiContext>, shutdown: Arc<AtomicBool>) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                let ctx = ctx.clone();
                let spawned = std::thread::Builder::new()
                    .name("firewatch-api-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, &ctx) {
                            log::warn!("api request rejected: {}", err);
                        }
                    });
                if let Err(err) = spawned {
                    log::warn!("api connection dropped: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, ctx: &ApiContext) -> Result<()> {
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/get_alert") => {
            let payload = serde_json::to_vec(&ctx.alerts.get_alert_status())?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("GET", "/session") => {
            let payload = serde_json::to_vec(&ctx.sessions.status()?)?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("POST", "/session/file" | "/session/webcam" | "/session/end") => {
            handle_control(&mut stream, ctx, &request)
        }
        (
            _,
            "/health" | "/get_alert" | "/session" | "/session/file" | "/session/webcam"
            | "/session/end",
        ) => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

fn handle_control(stream: &mut TcpStream, ctx: &ApiContext, request: &HttpRequest) -> Result<()> {
    if request.query_param("token").is_some() {
        write_json_response(
            stream,
            400,
            r#"{"error":"token_query_param_not_allowed"}"#,
        )?;
        return Ok(());
    }

    let token = match request.bearer_token() {
        Some(token) => token,
        None => {
            write_json_response(stream, 401, r#"{"error":"missing_token"}"#)?;
            return Ok(());
        }
    };
    if let Err(err) = ctx.token.validate(&token) {
        write_json_response(stream, 401, r#"{"error":"invalid_token"}"#)?;
        return Err(err);
    }

    let spec = match request.path.as_str() {
        "/session/end" => {
            let ended = ctx.sessions.end_session()?;
            let payload = serde_json::to_vec(&json!({ "ended": ended }))?;
            return write_response(stream, 200, "application/json", &payload);
        }
        "/session/file" => match request.query_param("path") {
            Some(path) if !path.trim().is_empty() => SourceSpec::File { path },
            _ => {
                write_json_response(stream, 400, r#"{"error":"missing_path"}"#)?;
                return Ok(());
            }
        },
        _ => SourceSpec::Webcam {
            device: request
                .query_param("device")
                .filter(|device| !device.trim().is_empty())
                .unwrap_or_else(|| ctx.cfg.webcam_device.clone()),
        },
    };

    match ctx.sessions.start_spec(&spec) {
        Ok(id) => {
            log::info!("api: session {} started for {}", id, spec);
            let payload = serde_json::to_vec(&json!({ "session_id": id, "source": spec }))?;
            write_response(stream, 200, "application/json", &payload)
        }
        Err(err) => {
            log::warn!("api: cannot start session for {}: {:#}", spec, err);
            let payload = serde_json::to_vec(&json!({
                "error": "invalid_source",
                "detail": format!("{:#}", err),
            }))?;
            write_response(stream, 400, "application/json", &payload)
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (raw_path, ""),
    };
    let query = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        headers,
        query,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        401 => "HTTP/1.1 401 Unauthorized",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
}

impl HttpRequest {
    fn bearer_token(&self) -> Option<String> {
        if let Some(value) = self.headers.get("authorization") {
            let parts: Vec<&str> = value.split_whitespace().collect();
            if parts.len() == 2 && parts[0].eq_ignore_ascii_case("bearer") {
                return Some(parts[1].to_string());
            }
        }
        None
    }

    fn query_param(&self, key: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

pub fn write_token_file(path: &Path, token: &str) -> Result<()> {
    std::fs::write(path, format!("{token}\n"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

fn parse_hex32(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value)?;
    if bytes.len() != 32 {
        return Err(anyhow!("token must be 32 bytes"));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_token_validates_only_itself() {
        let token = ControlToken::generate();
        assert_eq!(token.token_hex().len(), 64);
        token.validate(&token.token_hex()).unwrap();
        assert!(token.validate(&ControlToken::generate().token_hex()).is_err());
        assert!(token.validate("abcd").is_err());
        assert!(token.validate("not-hex").is_err());
    }

    #[test]
    fn query_params_are_decoded() {
        let request = HttpRequest {
            method: "POST".to_string(),
            path: "/session/file".to_string(),
            headers: HashMap::new(),
            query: url::form_urlencoded::parse(b"path=%2Fdata%2Fclip+1.mp4&x=1")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        };
        assert_eq!(request.query_param("path").as_deref(), Some("/data/clip 1.mp4"));
        assert!(request.query_param("token").is_none());
    }

    #[test]
    fn token_file_is_private() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("api.token");
        write_token_file(&path, "feed")?;
        assert_eq!(std::fs::read_to_string(&path)?, "feed\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        Ok(())
    }
}
