//! TLS contexts and the client handshake, on top of rustls.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme, StreamOwned};

use crate::error::{Error, TlsError};
use crate::poll::Interest;

/// A client TLS session layered over a connected socket.
pub type TlsStream<S> = StreamOwned<ClientConnection, S>;

/// Where a PEM blob comes from.
#[derive(Clone)]
pub enum Pem {
	File(PathBuf),
	Inline(Vec<u8>),
}

impl Pem {
	fn source_name(&self) -> String {
		match self {
			Pem::File(path) => path.display().to_string(),
			Pem::Inline(_) => "inline PEM".into(),
		}
	}

	fn read(&self, what: &'static str) -> Result<Vec<u8>, TlsError> {
		match self {
			Pem::File(path) => std::fs::read(path).map_err(|source| TlsError::Pem {
				what,
				source_name: self.source_name(),
				source,
			}),
			Pem::Inline(bytes) => Ok(bytes.clone()),
		}
	}
}

impl fmt::Debug for Pem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Pem::File(path) => f.debug_tuple("File").field(path).finish(),
			// never print key material
			Pem::Inline(bytes) => write!(f, "Inline(<{} bytes>)", bytes.len()),
		}
	}
}

/// TLS settings shared by client and server contexts.
///
/// A client uses `ca` (or the bundled web PKI roots when unset) to verify the
/// server, and presents `cert_chain`/`private_key` when both are set. A server
/// requires `cert_chain` and `private_key`.
#[derive(Debug, Clone)]
pub struct TlsConfig {
	pub ca: Option<Pem>,
	pub cert_chain: Option<Pem>,
	pub private_key: Option<Pem>,
	pub verify: bool,
	pub alpn: Vec<Vec<u8>>,
}

impl Default for TlsConfig {
	fn default() -> Self {
		Self {
			ca: None,
			cert_chain: None,
			private_key: None,
			verify: true,
			alpn: Vec::new(),
		}
	}
}

impl TlsConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.ca = Some(Pem::File(path.into()));
		self
	}

	pub fn ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
		self.ca = Some(Pem::Inline(pem.into()));
		self
	}

	pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.cert_chain = Some(Pem::File(path.into()));
		self
	}

	pub fn cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
		self.cert_chain = Some(Pem::Inline(pem.into()));
		self
	}

	pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.private_key = Some(Pem::File(path.into()));
		self
	}

	pub fn key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
		self.private_key = Some(Pem::Inline(pem.into()));
		self
	}

	/// Turns server certificate verification on or off. Default: on.
	pub fn verify(mut self, enable: bool) -> Self {
		self.verify = enable;
		self
	}

	pub fn alpn<I, P>(mut self, protocols: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<Vec<u8>>,
	{
		self.alpn = protocols.into_iter().map(Into::into).collect();
		self
	}
}

fn provider() -> Arc<CryptoProvider> {
	Arc::new(rustls::crypto::ring::default_provider())
}

fn load_certs(pem: &Pem, what: &'static str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
	let bytes = pem.read(what)?;
	let certs = rustls_pemfile::certs(&mut bytes.as_slice())
		.collect::<Result<Vec<_>, _>>()
		.map_err(|source| TlsError::Pem {
			what,
			source_name: pem.source_name(),
			source,
		})?;
	if certs.is_empty() {
		return Err(TlsError::Empty { what, source_name: pem.source_name() });
	}
	Ok(certs)
}

fn load_key(pem: &Pem) -> Result<PrivateKeyDer<'static>, TlsError> {
	let what = "private key";
	let bytes = pem.read(what)?;
	rustls_pemfile::private_key(&mut bytes.as_slice())
		.map_err(|source| TlsError::Pem {
			what,
			source_name: pem.source_name(),
			source,
		})?
		.ok_or_else(|| TlsError::Empty { what, source_name: pem.source_name() })
}

/// Builds the client-side context.
pub fn client_context(config: &TlsConfig) -> Result<Arc<ClientConfig>, TlsError> {
	let provider = provider();
	let builder = ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

	let builder = if config.verify {
		let mut roots = RootCertStore::empty();
		match &config.ca {
			Some(ca) => {
				for cert in load_certs(ca, "CA certificate")? {
					roots.add(cert)?;
				}
			}
			None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
		}
		builder.with_root_certificates(roots)
	} else {
		builder
			.dangerous()
			.with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
	};

	let mut client = match (&config.cert_chain, &config.private_key) {
		(Some(chain), Some(key)) => builder.with_client_auth_cert(load_certs(chain, "certificate chain")?, load_key(key)?)?,
		_ => builder.with_no_client_auth(),
	};
	client.alpn_protocols = config.alpn.clone();
	Ok(Arc::new(client))
}

/// Builds the server-side context. Needs a certificate chain and a key.
pub fn server_context(config: &TlsConfig) -> Result<Arc<ServerConfig>, TlsError> {
	let (Some(chain), Some(key)) = (&config.cert_chain, &config.private_key) else {
		return Err(TlsError::MissingIdentity);
	};
	let certs = load_certs(chain, "certificate chain")?;
	let key = load_key(key)?;

	let mut server = ServerConfig::builder_with_provider(provider())
		.with_safe_default_protocol_versions()?
		.with_no_client_auth()
		.with_single_cert(certs, key)?;
	server.alpn_protocols = config.alpn.clone();
	Ok(Arc::new(server))
}

/// Runs the client handshake over `socket` until it completes.
///
/// On a nonblocking socket `wait` is called with the interest rustls needs
/// next whenever the socket would block; it returns an error once the
/// deadline is spent. On failure the socket is handed back so the caller can
/// close it.
pub(crate) fn client_handshake<S, W>(
	ctx: &Arc<ClientConfig>,
	socket: S,
	server_name: &str,
	mut wait: W,
) -> Result<TlsStream<S>, (Error, S)>
where
	S: Read + Write,
	W: FnMut(Interest) -> Result<(), Error>,
{
	let name = match ServerName::try_from(server_name.to_owned()) {
		Ok(name) => name,
		Err(_) => return Err((TlsError::ServerName(server_name.to_owned()).into(), socket)),
	};
	let conn = match ClientConnection::new(ctx.clone(), name) {
		Ok(conn) => conn,
		Err(err) => return Err((TlsError::from(err).into(), socket)),
	};

	let mut stream = StreamOwned::new(conn, socket);
	while stream.conn.is_handshaking() {
		match stream.conn.complete_io(&mut stream.sock) {
			Ok(_) => {}
			Err(err) if err.kind() == ErrorKind::WouldBlock => {
				let interest = if stream.conn.wants_write() {
					Interest::Writable
				} else {
					Interest::Readable
				};
				if let Err(err) = wait(interest) {
					return Err((err, stream.sock));
				}
			}
			Err(err) if err.kind() == ErrorKind::Interrupted => {}
			Err(err) => return Err((TlsError::Handshake(err).into(), stream.sock)),
		}
	}
	tracing::debug!(
		server_name,
		protocol = ?stream.conn.protocol_version(),
		alpn = ?stream.conn.alpn_protocol().map(String::from_utf8_lossy),
		"tls handshake complete"
	);
	Ok(stream)
}

/// Verifier used when `verify` is off: any certificate is accepted, but
/// handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.0.signature_verification_algorithms.supported_schemes()
	}
}
