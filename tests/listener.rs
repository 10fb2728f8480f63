mod common;

use common::{FakeNet, addr, init_tracing};
use tcplane::{Error, ErrorKind, Listener, ListenerOptions, ReuseConfig, SocketError, TlsConfig};

fn opts() -> ListenerOptions {
	ListenerOptions::new("*", 8443)
}

fn bind(net: &FakeNet, options: ListenerOptions) -> Result<Listener<FakeNet>, Error> {
	init_tracing();
	Listener::bind_with(options, net.clone())
}

#[test]
fn bad_tls_config_fails_before_any_socket() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let options = opts().tls(TlsConfig::new().cert_file("/nonexistent/chain.pem").key_file("/nonexistent/key.pem"));

	let err = bind(&net, options).err().expect("missing identity files");
	assert_eq!(err.kind(), ErrorKind::Tls);
	assert!(net.events().is_empty(), "{:?}", net.events());
}

#[test]
fn tls_without_identity_is_rejected() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let err = bind(&net, opts().tls(TlsConfig::new())).err().expect("server needs a certificate");
	assert_eq!(err.kind(), ErrorKind::Tls);
	assert!(net.created().is_empty());
}

#[test]
fn resolves_passively() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	bind(&net, opts()).unwrap();
	assert_eq!(net.events()[0], "resolve *:8443 passive=true");
}

#[test]
fn defaults_set_only_reuse_addr() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let listener = bind(&net, opts()).unwrap();

	assert_eq!(
		net.events()[1..],
		[
			"create 1 0.0.0.0:8443 nonblocking=false".to_string(),
			"SO_REUSEADDR 1 true".to_string(),
			"bind 1 0.0.0.0:8443".to_string(),
		]
	);
	assert!(!listener.is_nonblocking());
	assert_eq!(listener.local_addr().unwrap(), addr("0.0.0.0:8443"));
	assert!(listener.tls_context().is_none());
}

#[test]
fn disabled_reuse_is_not_applied() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	bind(&net, opts().reuse_addr(false)).unwrap();
	assert!(!net.saw("SO_REUSEADDR"));
	assert!(!net.saw("SO_REUSEPORT"));
}

#[test]
fn reuse_both_and_nodelay() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	bind(&net, opts().reuse(ReuseConfig::new().both()).tcp_nodelay(true)).unwrap();
	assert!(net.saw("SO_REUSEADDR 1 true"));
	assert!(net.saw("SO_REUSEPORT 1 true"));
	assert!(net.saw("TCP_NODELAY 1 true"));
}

#[test]
fn creation_failure_falls_through() {
	let net = FakeNet::resolving(&["[::]:8443", "0.0.0.0:8443"]).create_fails("[::]:8443", libc::EAFNOSUPPORT);
	let listener = bind(&net, opts()).unwrap();

	assert_eq!(listener.local_addr().unwrap(), addr("0.0.0.0:8443"));
	assert_eq!(net.open_sockets(), 1);
}

#[test]
fn all_creations_failing_returns_last_error() {
	let net = FakeNet::resolving(&["[::]:8443", "0.0.0.0:8443"])
		.create_fails("[::]:8443", libc::EAFNOSUPPORT)
		.create_fails("0.0.0.0:8443", libc::EMFILE);
	let err = bind(&net, opts()).err().expect("nothing could be created");
	assert!(matches!(err, Error::Socket(SocketError::Create { errno }) if errno == libc::EMFILE));
}

#[test]
fn option_failure_closes_socket_and_stops() {
	let net = FakeNet::resolving(&["[::]:8443", "0.0.0.0:8443"]).option_fails("SO_REUSEPORT", libc::ENOPROTOOPT);
	let err = bind(&net, opts().reuse_port(true)).err().expect("SO_REUSEPORT fails");

	assert!(matches!(err, Error::Socket(SocketError::SetOption { option: "SO_REUSEPORT", .. })));
	assert_eq!(net.created().len(), 1, "second candidate must not be tried");
	assert_eq!(net.closed(), vec![1]);
	assert!(!net.saw("bind"));
}

#[test]
fn bind_failure_closes_socket_and_stops() {
	let net = FakeNet::resolving(&["[::]:8443", "0.0.0.0:8443"]).bind_fails("[::]:8443", libc::EADDRINUSE);
	let err = bind(&net, opts()).err().expect("address in use");

	assert_eq!(err.errno(), Some(libc::EADDRINUSE));
	assert!(err.to_string().contains("address already in use"));
	assert_eq!(net.created().len(), 1);
	assert_eq!(net.open_sockets(), 0);
}

#[test]
fn empty_resolution_is_an_error() {
	let net = FakeNet::resolving(&[]);
	let err = bind(&net, opts()).err().expect("no candidates");
	assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn pollable_listener_is_nonblocking() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let listener = bind(&net, opts().pollable(true)).unwrap();
	assert!(net.created()[0].2);
	assert!(listener.is_nonblocking());
}

#[test]
fn listen_uses_configured_backlog() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let listener = bind(&net, opts().backlog(16)).unwrap();
	listener.listen().unwrap();
	assert!(net.saw("listen 1 16"));
}

#[test]
fn close_and_into_parts_release_the_socket() {
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	bind(&net, opts()).unwrap().close();
	assert_eq!(net.open_sockets(), 0);

	let (socket, tls) = bind(&net, opts()).unwrap().into_parts();
	assert_eq!(socket.id, 2);
	assert!(tls.is_none());
	assert_eq!(net.open_sockets(), 1);
	drop(socket);
	assert_eq!(net.open_sockets(), 0);
}

#[test]
fn tls_listener_keeps_server_context() {
	let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
	let net = FakeNet::resolving(&["0.0.0.0:8443"]);
	let config = TlsConfig::new().cert_pem(cert.pem()).key_pem(key_pair.serialize_pem()).alpn(["h2"]);

	let listener = bind(&net, opts().tls(config)).unwrap();
	let ctx = listener.tls_context().expect("server context");
	assert_eq!(ctx.alpn_protocols, vec![b"h2".to_vec()]);
	assert!(listener.tls_config().is_some());
}
