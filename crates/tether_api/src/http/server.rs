use anyhow::{anyhow, Context, Result};
use axum::extract::Request;
use axum::Router;
use common::auth::PeerCertificate;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, info, warn};

/// HTTPS listener configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// PEM server certificate chain
    pub tls_cert_file: String,
    /// PEM private key for the server certificate
    pub tls_key_file: String,
    /// PEM CA bundle that device certificates must chain to
    pub tls_ca_file: String,
    /// Reject handshakes without a client certificate. When false, user
    /// clients may connect without one and only the device endpoint fails.
    pub require_client_cert: bool,
}

/// Upper bound on waiting for open connections to finish after shutdown
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Crypto provider used for every TLS config built here, independent of
/// which rustls provider features other crates enable
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open certificate file {}", path.display()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificates in {}", path.display()))?;

    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {}", path.display()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open key file {}", path.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("failed to parse private key in {}", path.display()))?
        .ok_or_else(|| anyhow!("no private key found in {}", path.display()))
}

/// Build a rustls server config that verifies client certificates against `client_ca_certs`
pub fn build_tls_config(
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    client_ca_certs: Vec<CertificateDer<'static>>,
    require_client_cert: bool,
) -> Result<Arc<ServerConfig>> {
    let mut roots = RootCertStore::empty();
    for cert in client_ca_certs {
        roots
            .add(cert)
            .map_err(|e| anyhow!("invalid client CA certificate: {}", e))?;
    }

    let provider = crypto_provider();
    let verifier_builder =
        WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone());
    let verifier = if require_client_cert {
        verifier_builder.build()
    } else {
        verifier_builder.allow_unauthenticated().build()
    }
    .map_err(|e| anyhow!("failed to build client verifier: {}", e))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("crypto provider does not support the default protocol versions")?
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .context("invalid server certificate or key")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Load PEM files named in the config and build the TLS config
pub fn load_tls_config(config: &HttpServerConfig) -> Result<Arc<ServerConfig>> {
    let cert_chain = load_certs(Path::new(&config.tls_cert_file))?;
    let key = load_private_key(Path::new(&config.tls_key_file))?;
    let client_ca_certs = load_certs(Path::new(&config.tls_ca_file))?;

    build_tls_config(cert_chain, key, client_ca_certs, config.require_client_cert)
}

fn peer_certificate_of(stream: &TlsStream<TcpStream>) -> Option<PeerCertificate> {
    let (_, session) = stream.get_ref();
    session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|leaf| PeerCertificate(leaf.as_ref().to_vec()))
}

async fn serve_connection(
    tls_stream: TlsStream<TcpStream>,
    router: Router,
    cancellation_token: CancellationToken,
) {
    let peer_certificate = peer_certificate_of(&tls_stream);

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        if let Some(certificate) = &peer_certificate {
            request.extensions_mut().insert(certificate.clone());
        }
        router.clone().call(request)
    });

    let builder = Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(tls_stream), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                debug!(error = %e, "connection closed with error");
            }
        }
        _ = cancellation_token.cancelled() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                debug!(error = %e, "connection closed with error during shutdown");
            }
        }
    }
}

/// Accept TLS connections on `listener` until the token is cancelled.
///
/// The leaf certificate of each connection, when presented, is attached to
/// every request on it as a `PeerCertificate` extension. On cancellation the
/// listener stops accepting and in-flight requests are drained before this
/// returns, bounded by `CONNECTION_DRAIN_TIMEOUT`.
pub async fn serve_tls(
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    router: Router,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(tls_config);
    let mut connections = JoinSet::new();

    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("HTTP server shutdown signal received");
                break;
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            }
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        let cancellation_token = cancellation_token.clone();

        connections.spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => serve_connection(tls_stream, router, cancellation_token).await,
                Err(e) => debug!(remote_addr = %remote_addr, error = %e, "TLS handshake failed"),
            }
        });
    }

    drop(listener);
    debug!(open_connections = connections.len(), "draining connections");

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, drain).await.is_err() {
        warn!(
            open_connections = connections.len(),
            "connections did not drain within {:?}, aborting", CONNECTION_DRAIN_TIMEOUT
        );
        connections.shutdown().await;
    }

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Bind the configured address and run the HTTPS server with graceful shutdown
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let tls_config = load_tls_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid server address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(
        require_client_cert = config.require_client_cert,
        "Starting HTTPS server on {}", addr
    );

    serve_tls(listener, tls_config, router, cancellation_token).await
}
