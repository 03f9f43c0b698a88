//! Test helpers: throwaway PKI, config fixtures, multipart parsing and mock
//! upload endpoints (plain HTTP via axum, and raw TLS via tokio-rustls).

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, State},
    http::{header, HeaderMap, Request, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use super::multipart::MultipartBody;
use crate::config::Config;

pub const UPLOAD_PATH: &str = "/secapi/mch/uploadmedia";

pub const SUCCESS_XML: &str =
    "<xml><return_code>SUCCESS</return_code><media_id>m1</media_id></xml>";

// ============================================================================
// PKI
// ============================================================================

pub struct TestCa {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
    pub cert_pem: String,
}

pub struct TestLeaf {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
    pub key_der: Vec<u8>,
}

pub fn generate_ca(name: &str) -> TestCa {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    TestCa {
        cert_pem: cert.pem(),
        cert,
        key,
    }
}

/// Leaf signed by `ca`; server leaves are valid for 127.0.0.1 and localhost.
pub fn generate_leaf(ca: &TestCa, name: &str, server: bool) -> TestLeaf {
    let mut params = if server {
        CertificateParams::new(vec!["127.0.0.1".to_string(), "localhost".to_string()]).unwrap()
    } else {
        CertificateParams::default()
    };
    params.distinguished_name.push(DnType::CommonName, name);
    params.extended_key_usages = vec![if server {
        ExtendedKeyUsagePurpose::ServerAuth
    } else {
        ExtendedKeyUsagePurpose::ClientAuth
    }];

    let key = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key, &ca.cert, &ca.key).unwrap();

    TestLeaf {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        cert_der: cert.der().clone(),
        key_der: key.serialize_der(),
    }
}

/// Write the client PEMs, CA and a media file into `dir` and return a
/// validated config pointing at them.
pub fn write_config(dir: &Path, client: &TestLeaf, ca: &TestCa, endpoint: &str) -> Config {
    let cert_file = dir.join("apiclient_cert.pem");
    let key_file = dir.join("apiclient_key.pem");
    let ca_file = dir.join("rootca.pem");
    let img_file = dir.join("image.jpg");

    std::fs::write(&cert_file, &client.cert_pem).unwrap();
    std::fs::write(&key_file, &client.key_pem).unwrap();
    std::fs::write(&ca_file, &ca.cert_pem).unwrap();
    std::fs::write(&img_file, b"Hello, World!").unwrap();

    let raw = serde_json::json!({
        "mch_id": "10000100",
        "key": "secretkey",
        "cert": {
            "cert_file": cert_file,
            "key_file": key_file,
            "ca": ca_file,
        },
        "img_file": img_file,
        "endpoint": endpoint,
        "timeout_secs": 10,
    });

    let config = Config::from_json(&raw.to_string()).unwrap();
    config.validate().unwrap();
    config
}

// ============================================================================
// Multipart parsing
// ============================================================================

#[derive(Debug, Clone)]
pub struct ParsedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub data: Bytes,
}

async fn collect_parts(mut multipart: Multipart) -> Vec<ParsedPart> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap();
        parts.push(ParsedPart {
            name,
            file_name,
            data,
        });
    }
    parts
}

/// Parse a finished body with axum's multipart extractor
pub async fn parse_multipart(body: &MultipartBody) -> Vec<ParsedPart> {
    let request = Request::builder()
        .method("POST")
        .uri(UPLOAD_PATH)
        .header(header::CONTENT_TYPE, body.content_type())
        .body(axum::body::Body::from(body.bytes().clone()))
        .unwrap();

    let multipart = Multipart::from_request(request, &()).await.unwrap();
    collect_parts(multipart).await
}

// ============================================================================
// Plain HTTP endpoint
// ============================================================================

#[derive(Debug, Clone)]
pub struct CapturedUpload {
    pub content_type: String,
    pub parts: Vec<ParsedPart>,
}

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    captured: Arc<Mutex<Vec<CapturedUpload>>>,
}

async fn handle_upload(
    State(state): State<EndpointState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> (StatusCode, &'static str) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let parts = collect_parts(multipart).await;

    state.captured.lock().await.push(CapturedUpload {
        content_type,
        parts,
    });

    (state.status, SUCCESS_XML)
}

/// Serve the upload path over plain HTTP, answering with `status`.
///
/// Returns the endpoint URL and the uploads received so far.
pub async fn spawn_upload_endpoint(
    status: StatusCode,
) -> (String, Arc<Mutex<Vec<CapturedUpload>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = EndpointState {
        status,
        captured: captured.clone(),
    };

    let app = Router::new()
        .route(UPLOAD_PATH, post(handle_upload))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}{}", addr, UPLOAD_PATH), captured)
}

/// Accept one plain connection, read the request and answer with `reply`
/// verbatim.
pub async fn spawn_raw_endpoint(reply: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_http_request(&mut stream).await;
        let _ = stream.write_all(reply).await;
        let _ = stream.shutdown().await;
    });

    addr
}

// ============================================================================
// TLS endpoint
// ============================================================================

/// What the TLS endpoint saw from its single connection
#[derive(Debug)]
pub enum TlsOutcome {
    HandshakeFailed,
    Served { request: Vec<u8> },
}

/// Server config presenting `server`; requires a client certificate issued
/// by `client_ca` when given.
pub fn tls_server_config(server: &TestLeaf, client_ca: Option<&TestCa>) -> Arc<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = match client_ca {
        Some(ca) => {
            let mut roots = RootCertStore::empty();
            roots.add(ca.cert.der().clone()).unwrap();
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .unwrap();
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(server.key_der.clone()));
    let config = builder
        .with_single_cert(vec![server.cert_der.clone()], key)
        .unwrap();

    Arc::new(config)
}

/// Accept one TLS connection, read one HTTP request and answer 200.
pub async fn spawn_tls_endpoint(
    config: Arc<ServerConfig>,
) -> (SocketAddr, JoinHandle<TlsOutcome>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(config);

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut tls = match acceptor.accept(stream).await {
            Ok(tls) => tls,
            Err(_) => return TlsOutcome::HandshakeFailed,
        };

        let request = read_http_request(&mut tls).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            SUCCESS_XML.len(),
            SUCCESS_XML
        );
        tls.write_all(response.as_bytes()).await.unwrap();
        let _ = tls.shutdown().await;

        TlsOutcome::Served { request }
    });

    (addr, handle)
}

async fn read_http_request<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return buf;
            }
        }

        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return buf;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
