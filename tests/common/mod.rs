#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use tcplane::{CandidateAddress, Connect, Error, Interest, Net, Readiness, SocketError};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn addr(s: &str) -> SocketAddr {
	s.parse().unwrap()
}

/// What a scripted `connect()` does for one address.
#[derive(Debug, Clone, Copy)]
pub enum Step {
	Connected,
	InProgress,
	Fail(i32),
}

#[derive(Debug, Default)]
pub struct Ledger {
	next_id: usize,
	/// (socket id, address, created nonblocking)
	pub created: Vec<(usize, SocketAddr, bool)>,
	pub closed: Vec<usize>,
	pub events: Vec<String>,
}

/// A socket that exists only in the ledger. Dropping it records a close.
#[derive(Debug)]
pub struct FakeSocket {
	pub id: usize,
	pub addr: SocketAddr,
	ledger: Rc<RefCell<Ledger>>,
}

impl Drop for FakeSocket {
	fn drop(&mut self) {
		let mut ledger = self.ledger.borrow_mut();
		ledger.closed.push(self.id);
		ledger.events.push(format!("close {}", self.id));
	}
}

impl AsRawFd for FakeSocket {
	fn as_raw_fd(&self) -> RawFd {
		1000 + self.id as RawFd
	}
}

impl Read for FakeSocket {
	fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
		Ok(0)
	}
}

impl Write for FakeSocket {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.ledger.borrow_mut().events.push(format!("write {} {}", self.id, buf.len()));
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

/// A scripted `Net`: every call is logged, outcomes come from the script.
#[derive(Debug, Clone)]
pub struct FakeNet {
	pub ledger: Rc<RefCell<Ledger>>,
	resolved: Result<Vec<SocketAddr>, String>,
	create_errno: HashMap<SocketAddr, i32>,
	connect: Rc<RefCell<HashMap<SocketAddr, Step>>>,
	pending: HashMap<SocketAddr, i32>,
	readiness: Readiness,
	fail_option: Option<(&'static str, i32)>,
	bind_errno: HashMap<SocketAddr, i32>,
}

impl FakeNet {
	pub fn resolving(addrs: &[&str]) -> Self {
		Self {
			ledger: Rc::default(),
			resolved: Ok(addrs.iter().map(|a| addr(a)).collect()),
			create_errno: HashMap::new(),
			connect: Rc::default(),
			pending: HashMap::new(),
			readiness: Readiness::Ready,
			fail_option: None,
			bind_errno: HashMap::new(),
		}
	}

	pub fn unresolvable(reason: &str) -> Self {
		let mut net = Self::resolving(&[]);
		net.resolved = Err(reason.to_owned());
		net
	}

	pub fn create_fails(mut self, a: &str, errno: i32) -> Self {
		self.create_errno.insert(addr(a), errno);
		self
	}

	pub fn on_connect(self, a: &str, step: Step) -> Self {
		self.script_connect(a, step);
		self
	}

	/// Changes what later `connect()` calls to `a` do; clones share the script.
	pub fn script_connect(&self, a: &str, step: Step) {
		self.connect.borrow_mut().insert(addr(a), step);
	}

	pub fn pending_error(mut self, a: &str, errno: i32) -> Self {
		self.pending.insert(addr(a), errno);
		self
	}

	pub fn waits_time_out(mut self) -> Self {
		self.readiness = Readiness::TimedOut;
		self
	}

	pub fn option_fails(mut self, option: &'static str, errno: i32) -> Self {
		self.fail_option = Some((option, errno));
		self
	}

	pub fn bind_fails(mut self, a: &str, errno: i32) -> Self {
		self.bind_errno.insert(addr(a), errno);
		self
	}

	pub fn events(&self) -> Vec<String> {
		self.ledger.borrow().events.clone()
	}

	pub fn created(&self) -> Vec<(usize, SocketAddr, bool)> {
		self.ledger.borrow().created.clone()
	}

	pub fn closed(&self) -> Vec<usize> {
		self.ledger.borrow().closed.clone()
	}

	pub fn open_sockets(&self) -> usize {
		let ledger = self.ledger.borrow();
		ledger.created.len() - ledger.closed.len()
	}

	pub fn saw(&self, prefix: &str) -> bool {
		self.events().iter().any(|e| e.starts_with(prefix))
	}

	fn log(&self, event: String) {
		self.ledger.borrow_mut().events.push(event);
	}

	fn option(&self, socket: &FakeSocket, name: &'static str, enable: bool) -> Result<(), SocketError> {
		self.log(format!("{name} {} {enable}", socket.id));
		match self.fail_option {
			Some((option, errno)) if option == name => Err(SocketError::SetOption { errno, option }),
			_ => Ok(()),
		}
	}
}

impl Net for FakeNet {
	type Socket = FakeSocket;

	fn resolve(&self, host: &str, port: u16, passive: bool) -> Result<Vec<CandidateAddress>, Error> {
		self.log(format!("resolve {host}:{port} passive={passive}"));
		match &self.resolved {
			Ok(addrs) => Ok(addrs.iter().copied().map(CandidateAddress::tcp).collect()),
			Err(reason) => Err(Error::Resolution {
				host: host.to_owned(),
				port,
				reason: reason.clone(),
			}),
		}
	}

	fn create(&self, candidate: &CandidateAddress, nonblocking: bool) -> Result<FakeSocket, SocketError> {
		if let Some(&errno) = self.create_errno.get(&candidate.addr) {
			self.log(format!("create {} failed", candidate.addr));
			return Err(SocketError::Create { errno });
		}
		let mut ledger = self.ledger.borrow_mut();
		ledger.next_id += 1;
		let id = ledger.next_id;
		ledger.created.push((id, candidate.addr, nonblocking));
		ledger.events.push(format!("create {id} {} nonblocking={nonblocking}", candidate.addr));
		Ok(FakeSocket {
			id,
			addr: candidate.addr,
			ledger: self.ledger.clone(),
		})
	}

	fn set_nonblocking(&self, socket: &FakeSocket, nonblocking: bool) -> Result<(), SocketError> {
		self.log(format!("set_nonblocking {} {nonblocking}", socket.id));
		Ok(())
	}

	fn connect(&self, socket: &FakeSocket, candidate: &CandidateAddress) -> Result<Connect, SocketError> {
		self.log(format!("connect {}", socket.id));
		let step = self.connect.borrow().get(&candidate.addr).copied();
		match step.unwrap_or(Step::Connected) {
			Step::Connected => Ok(Connect::Connected),
			Step::InProgress => Ok(Connect::InProgress),
			Step::Fail(errno) => Err(SocketError::Connect {
				errno,
				addr: candidate.addr.to_string(),
			}),
		}
	}

	fn pending_error(&self, socket: &FakeSocket) -> Result<Option<i32>, SocketError> {
		self.log(format!("pending_error {}", socket.id));
		Ok(self.pending.get(&socket.addr).copied())
	}

	fn set_reuse_addr(&self, socket: &FakeSocket, enable: bool) -> Result<(), SocketError> {
		self.option(socket, "SO_REUSEADDR", enable)
	}

	fn set_reuse_port(&self, socket: &FakeSocket, enable: bool) -> Result<(), SocketError> {
		self.option(socket, "SO_REUSEPORT", enable)
	}

	fn set_nodelay(&self, socket: &FakeSocket, enable: bool) -> Result<(), SocketError> {
		self.option(socket, "TCP_NODELAY", enable)
	}

	fn bind(&self, socket: &FakeSocket, candidate: &CandidateAddress) -> Result<(), SocketError> {
		self.log(format!("bind {} {}", socket.id, candidate.addr));
		match self.bind_errno.get(&candidate.addr) {
			Some(&errno) => Err(SocketError::Bind {
				errno,
				addr: candidate.addr.to_string(),
			}),
			None => Ok(()),
		}
	}

	fn listen(&self, socket: &FakeSocket, backlog: i32) -> Result<(), SocketError> {
		self.log(format!("listen {} {backlog}", socket.id));
		Ok(())
	}

	fn local_addr(&self, socket: &FakeSocket) -> Result<SocketAddr, SocketError> {
		Ok(socket.addr)
	}

	fn wait_blocking(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		self.log(format!("wait_blocking {} {interest:?} {}", fd - 1000, deadline.is_some()));
		Ok(self.readiness)
	}

	fn wait_pollable(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		self.log(format!("wait_pollable {} {interest:?} {}", fd - 1000, deadline.is_some()));
		Ok(self.readiness)
	}
}
