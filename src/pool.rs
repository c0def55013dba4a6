//! Connection Pool (spec §4.2): a process-wide cache of outbound HTTP and
//! gRPC client connections, keyed by upstream address.
//!
//! The HTTP side is grounded on the teacher's `upstream::cluster::build_cluster_http_client`
//! (a single `hyper_util::client::legacy::Client` with a tuned idle pool,
//! wrapped in `hyper-rustls` so both `http://` and `https://` upstreams work
//! through the same handle). The gRPC side is grounded on the original
//! `gateway/pools_grpc_conn.go::getGRPCConn` double-checked-locking cache.

use crate::proxy::context::BoxBody;
use dashmap::DashMap;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tonic::transport::Channel;

/// A rustls `ServerCertVerifier` that accepts any certificate. Used for
/// internal/mesh gRPC and HTTP traffic where encryption is wanted but
/// upstream identity verification is not — matches the original Go code's
/// `tls.Config{InsecureSkipVerify: true}` for `:443` upstreams.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

fn insecure_tls_connector(http: HttpConnector) -> HttpsConnector<HttpConnector> {
    let tls_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();

    hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

fn build_http_client() -> Client<HttpsConnector<HttpConnector>, BoxBody> {
    let mut http = HttpConnector::new();
    http.set_nodelay(true);
    http.set_keepalive(Some(Duration::from_secs(60)));
    http.set_connect_timeout(Some(Duration::from_secs(5)));
    http.enforce_http(false);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(2000)
        .build(insecure_tls_connector(http))
}

/// Process-wide outbound connection pool. One HTTP transport, shared by
/// every protocol adaptor that speaks HTTP; one gRPC channel cache, keyed by
/// `host:port`, double-checked on miss exactly as the original Go pool was.
#[derive(Clone)]
pub struct ConnectionPool {
    http: Client<HttpsConnector<HttpConnector>, BoxBody>,
    grpc_channels: Arc<DashMap<String, Channel>>,
    grpc_dial_lock: Arc<Mutex<()>>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            http: build_http_client(),
            grpc_channels: Arc::new(DashMap::new()),
            grpc_dial_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn http(&self) -> &Client<HttpsConnector<HttpConnector>, BoxBody> {
        &self.http
    }

    /// Fetch or dial a gRPC channel for `addr` (`host:port`). TLS is
    /// selected iff `addr` ends in `:443`, matching both the original Go
    /// pool and `register/txsservice.go::getClientTxs`.
    pub async fn grpc_channel(&self, addr: &str) -> Result<Channel, tonic::transport::Error> {
        if let Some(chan) = self.grpc_channels.get(addr) {
            return Ok(chan.clone());
        }

        let _guard = self.grpc_dial_lock.lock().await;
        // Double-checked: another task may have won the race while we waited.
        if let Some(chan) = self.grpc_channels.get(addr) {
            return Ok(chan.clone());
        }

        let uses_tls = addr.ends_with(":443");
        let uri = if uses_tls {
            format!("https://{addr}")
        } else {
            format!("http://{addr}")
        };

        let mut endpoint = Channel::from_shared(uri)?;

        if uses_tls {
            let tls = tonic::transport::ClientTlsConfig::new().domain_name(
                addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr).to_string(),
            );
            endpoint = endpoint.tls_config(tls)?;
        }

        let channel = endpoint.connect().await?;
        self.grpc_channels.insert(addr.to_string(), channel.clone());
        Ok(channel)
    }

    pub fn close(&self) {
        self.grpc_channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_starts_with_no_cached_channels() {
        let pool = ConnectionPool::new();
        assert_eq!(pool.grpc_channels.len(), 0);
    }
}
