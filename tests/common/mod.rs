//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use host_agent::nic::{LinkControl, LinkError, LiveInterface};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;

/// One simulated link: its live state and admin flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLink {
    pub iface: LiveInterface,
    pub up: bool,
}

/// In-memory host that records every link mutation.
///
/// Failures are injected per operation kind (`down`, `rename`, `mtu`, `up`)
/// and optionally restricted to one interface name or to a single hit.
#[derive(Debug, Default)]
pub struct FakeHost {
    links: Mutex<Vec<FakeLink>>,
    ops: Mutex<Vec<String>>,
    modules: Mutex<Vec<String>>,
    failures: Mutex<Vec<Failure>>,
}

#[derive(Debug)]
struct Failure {
    kind: &'static str,
    name: Option<String>,
    once: bool,
}

impl Failure {
    fn matches(&self, kind: &str, name: &str) -> bool {
        self.kind == kind && self.name.as_deref().map_or(true, |n| n == name)
    }
}

impl FakeHost {
    pub fn new(ifaces: Vec<LiveInterface>) -> Self {
        Self {
            links: Mutex::new(ifaces.into_iter().map(|iface| FakeLink { iface, up: true }).collect()),
            ..Default::default()
        }
    }

    /// Make every `kind` operation fail.
    pub fn fail_on(&self, kind: &'static str) {
        self.inject(kind, None, false);
    }

    /// Make `kind` operations on the interface currently called `name` fail.
    pub fn fail_on_interface(&self, kind: &'static str, name: &str) {
        self.inject(kind, Some(name), false);
    }

    /// Make only the next `kind` operation on `name` fail.
    pub fn fail_once(&self, kind: &'static str, name: &str) {
        self.inject(kind, Some(name), true);
    }

    fn inject(&self, kind: &'static str, name: Option<&str>, once: bool) {
        self.failures.lock().unwrap().push(Failure {
            kind,
            name: name.map(str::to_string),
            once,
        });
    }

    /// Kernel modules requested so far, in order.
    pub fn modules(&self) -> Vec<String> {
        self.modules.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn links(&self) -> Vec<FakeLink> {
        self.links.lock().unwrap().clone()
    }

    pub fn link(&self, mac: &str) -> FakeLink {
        self.links()
            .into_iter()
            .find(|l| l.iface.mac.as_deref() == Some(mac))
            .expect("no link with that MAC")
    }

    fn record(&self, op: String, kind: &'static str, name: &str) -> Result<(), LinkError> {
        self.ops.lock().unwrap().push(op.clone());
        let mut failures = self.failures.lock().unwrap();
        let hit = failures.iter().position(|f| f.matches(kind, name));
        if let Some(i) = hit {
            if failures[i].once {
                failures.remove(i);
            }
            return Err(LinkError::Command {
                command: op,
                status: "exit status: 2".into(),
                stderr: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn modify(&self, name: &str, f: impl FnOnce(&mut FakeLink)) {
        let mut links = self.links.lock().unwrap();
        let link = links
            .iter_mut()
            .find(|l| l.iface.name == name)
            .expect("unknown interface");
        f(link);
    }
}

impl LinkControl for FakeHost {
    fn set_down(&self, name: &str) -> Result<(), LinkError> {
        self.record(format!("down {name}"), "down", name)?;
        self.modify(name, |l| l.up = false);
        Ok(())
    }

    fn set_up(&self, name: &str) -> Result<(), LinkError> {
        self.record(format!("up {name}"), "up", name)?;
        self.modify(name, |l| l.up = true);
        Ok(())
    }

    fn set_name(&self, name: &str, new_name: &str) -> Result<(), LinkError> {
        self.record(format!("rename {name} {new_name}"), "rename", name)?;
        self.modify(name, |l| l.iface.name = new_name.to_string());
        Ok(())
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), LinkError> {
        self.record(format!("mtu {name} {mtu}"), "mtu", name)?;
        self.modify(name, |l| l.iface.mtu = mtu);
        Ok(())
    }

    fn interfaces(&self) -> Result<Vec<LiveInterface>, LinkError> {
        Ok(self.links().into_iter().map(|l| l.iface).collect())
    }

    fn load_module(&self, module: &str) -> Result<(), LinkError> {
        self.modules.lock().unwrap().push(module.to_string());
        Ok(())
    }
}

pub fn iface(name: &str, mac: &str, mtu: u32) -> LiveInterface {
    LiveInterface {
        name: name.to_string(),
        mac: Some(mac.to_string()),
        mtu,
    }
}

pub fn write_nic_config(dir: &Path, device: &str, json: &str) {
    std::fs::write(dir.join(format!("{device}.json")), json).unwrap();
}

/// A self-signed identity for `localhost`.
pub struct Identity {
    pub cert: CertificateDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
    key_der: Vec<u8>,
}

impl Identity {
    pub fn generate() -> Self {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Self {
            cert: CertificateDer::from(cert.cert.der().to_vec()),
            cert_pem: cert.cert.pem(),
            key_pem: cert.key_pair.serialize_pem(),
            key_der: cert.key_pair.serialize_der(),
        }
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()));
        host_agent::net::tls::build_server_config(vec![self.cert.clone()], key, None).unwrap()
    }

    pub fn write_to(&self, dir: &Path, name: &str) {
        std::fs::write(dir.join(format!("{name}.crt")), &self.cert_pem).unwrap();
        std::fs::write(dir.join(format!("{name}.key")), &self.key_pem).unwrap();
    }
}

/// Accepts any server certificate while still checking handshake signatures.
///
/// Test clients use it to observe which certificate the server presented.
#[derive(Debug)]
pub struct AcceptAnyServerCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

pub fn test_connector() -> tokio_rustls::TlsConnector {
    let config = rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth();
    tokio_rustls::TlsConnector::from(Arc::new(config))
}

/// Connect, complete the handshake and return the stream with the
/// certificate the server presented.
pub async fn connect(
    addr: std::net::SocketAddr,
) -> (tokio_rustls::client::TlsStream<tokio::net::TcpStream>, CertificateDer<'static>) {
    let tcp = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
    let stream = test_connector().connect(server_name, tcp).await.unwrap();
    let presented = stream.get_ref().1.peer_certificates().unwrap()[0].clone().into_owned();
    (stream, presented)
}
