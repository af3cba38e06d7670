use std::{fs, sync::Arc};

use anyhow::Result;
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore};

use crate::{global, TcpTransport};

/// Client config trusting the bundled web PKI roots.
pub fn default_client_config() -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(web_pki_roots())
        .with_no_client_auth()
}

/// Client config trusting the web PKI roots plus, optionally, one extra
/// DER-encoded certificate (typically a self-signed server certificate).
pub fn client_config(cert_path: Option<&str>) -> Result<ClientConfig> {
    let mut certs = web_pki_roots();

    if let Some(path) = cert_path {
        let cert = read_cert_from_file(path)?;
        certs.add(&cert)?;
    }

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(certs)
        .with_no_client_auth();

    Ok(config)
}

pub fn read_cert_from_file(cert_path: &str) -> Result<Certificate> {
    let cert_buf = fs::read(cert_path)?;
    Ok(Certificate(cert_buf))
}

fn web_pki_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();

    roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));

    roots
}

/// Replace the global transport with one whose TLS client config also trusts
/// the certificate at `cert_path`.
pub fn init_tls_client_config(cert_path: Option<&str>) -> Result<()> {
    let config = client_config(cert_path)?;

    global::set_transport(Arc::new(TcpTransport::new(Arc::new(config))));

    Ok(())
}
