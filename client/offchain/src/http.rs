// This file is part of Spindle.

// Copyright (C) Spindle Developers.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const LOG_TARGET: &str = "offchain-http";

/// The maximum number of concurrently tracked requests; ids are drawn
/// from `1..=MAX_CONCURRENT_REQUESTS`.
pub const MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Identifier of a tracked request.
pub type RequestId = i16;

/// Errors of the offchain HTTP set.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum HttpError {
	/// All request ids are in use.
	#[error("request id pool exhausted")]
	IdPoolExhausted,
	/// The request cannot be built from the given method or URI.
	#[error("request is invalid")]
	InvalidRequest,
	/// The request was already handed to the transport.
	#[error("request has already started")]
	RequestAlreadyStarted,
	/// The header key is not acceptable.
	#[error("invalid header key")]
	InvalidHeaderKey,
	/// The deadline was reached while writing the request body.
	#[error("deadline reached while writing request body")]
	TimeoutWriteBody,
	/// The deadline was reached while waiting for response data.
	#[error("deadline reached")]
	DeadlineReached,
	/// No request is tracked under the given id.
	#[error("request id not available")]
	InvalidId,
	/// The transport failed.
	#[error("i/o error: {0}")]
	Io(String),
	/// The owning task is gone; the node is shutting down.
	#[error("http set terminated")]
	Terminated,
}

/// Status code and headers of a completed response.
#[derive(Clone, Debug)]
pub struct ResponseInfo {
	/// The HTTP status code.
	pub code: u16,
	/// The response headers.
	pub headers: Vec<(String, String)>,
}

enum RequestState {
	Draft,
	Sent,
}

struct RequestEntry {
	method: reqwest::Method,
	url: reqwest::Url,
	headers: Vec<(String, String)>,
	body: Vec<u8>,
	state: RequestState,
	response: Option<ResponseInfo>,
	response_error: Option<HttpError>,
	response_buf: VecDeque<u8>,
	response_done: bool,
	waiting_reads: VecDeque<(usize, oneshot::Sender<Result<Vec<u8>, HttpError>>)>,
	waiting_info: Vec<oneshot::Sender<Result<ResponseInfo, HttpError>>>,
	transfer: Option<tokio::task::JoinHandle<()>>,
}

impl RequestEntry {
	fn new(method: reqwest::Method, url: reqwest::Url) -> Self {
		Self {
			method,
			url,
			headers: Vec::new(),
			body: Vec::new(),
			state: RequestState::Draft,
			response: None,
			response_error: None,
			response_buf: VecDeque::new(),
			response_done: false,
			waiting_reads: VecDeque::new(),
			waiting_info: Vec::new(),
			transfer: None,
		}
	}
}

enum Command {
	Start {
		method: String,
		uri: String,
		reply: oneshot::Sender<Result<RequestId, HttpError>>,
	},
	AddHeader {
		id: RequestId,
		name: String,
		value: String,
		reply: oneshot::Sender<Result<(), HttpError>>,
	},
	WriteBody {
		id: RequestId,
		chunk: Vec<u8>,
		reply: oneshot::Sender<Result<(), HttpError>>,
	},
	Send {
		id: RequestId,
		reply: oneshot::Sender<Result<(), HttpError>>,
	},
	ReadResponse {
		id: RequestId,
		max: usize,
		reply: oneshot::Sender<Result<Vec<u8>, HttpError>>,
	},
	Info {
		id: RequestId,
		reply: oneshot::Sender<Result<ResponseInfo, HttpError>>,
	},
	Remove {
		id: RequestId,
		reply: oneshot::Sender<Result<(), HttpError>>,
	},
	// Internal messages from transfer tasks.
	Arrived {
		id: RequestId,
		result: Result<ResponseInfo, HttpError>,
	},
	Chunk {
		id: RequestId,
		bytes: Vec<u8>,
	},
	BodyEnd {
		id: RequestId,
		error: Option<HttpError>,
	},
}

/// The offchain HTTP set. [`spawn`](Self::spawn) starts the owning task
/// and returns a cloneable handle; the task exits when every handle and
/// in-flight transfer is gone.
pub struct HttpSet;

impl HttpSet {
	/// Spawn the owning task onto the current tokio runtime.
	pub fn spawn() -> HttpSetHandle {
		let (tx, rx) = mpsc::channel(64);
		let worker = Worker {
			reqs: HashMap::new(),
			id_ring: (1..=MAX_CONCURRENT_REQUESTS as i16).collect(),
			client: reqwest::Client::new(),
			tx: tx.downgrade(),
		};
		tokio::spawn(worker.run(rx));
		HttpSetHandle { tx }
	}
}

struct Worker {
	reqs: HashMap<RequestId, RequestEntry>,
	id_ring: VecDeque<RequestId>,
	client: reqwest::Client,
	// Weak so that in-flight transfers and the worker itself do not keep
	// the command channel alive after the last handle is dropped.
	tx: mpsc::WeakSender<Command>,
}

impl Worker {
	async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
		while let Some(command) = rx.recv().await {
			self.handle(command);
		}
		log::debug!(target: LOG_TARGET, "http set terminated");
	}

	fn handle(&mut self, command: Command) {
		match command {
			Command::Start { method, uri, reply } => {
				let _ = reply.send(self.start(&method, &uri));
			},
			Command::AddHeader { id, name, value, reply } => {
				let _ = reply.send(self.add_header(id, name, value));
			},
			Command::WriteBody { id, chunk, reply } => {
				let _ = reply.send(self.write_body(id, chunk));
			},
			Command::Send { id, reply } => {
				let _ = reply.send(self.send(id));
			},
			Command::ReadResponse { id, max, reply } => self.read_response(id, max, reply),
			Command::Info { id, reply } => self.info(id, reply),
			Command::Remove { id, reply } => {
				let _ = reply.send(self.remove(id));
			},
			Command::Arrived { id, result } => self.arrived(id, result),
			Command::Chunk { id, bytes } => {
				if let Some(entry) = self.reqs.get_mut(&id) {
					entry.response_buf.extend(bytes);
					Self::serve_waiting_reads(entry);
				}
			},
			Command::BodyEnd { id, error } => {
				if let Some(entry) = self.reqs.get_mut(&id) {
					entry.response_done = true;
					if let Some(error) = error {
						entry.response_error = Some(error);
					}
					Self::serve_waiting_reads(entry);
				}
			},
		}
	}

	fn start(&mut self, method: &str, uri: &str) -> Result<RequestId, HttpError> {
		let id = self.id_ring.pop_front().ok_or(HttpError::IdPoolExhausted)?;
		debug_assert!(!self.reqs.contains_key(&id), "ids in the ring are never in use");

		let parsed = reqwest::Method::from_bytes(method.as_bytes())
			.map_err(|_| HttpError::InvalidRequest)
			.and_then(|method| {
				reqwest::Url::parse(uri)
					.map(|url| (method, url))
					.map_err(|_| HttpError::InvalidRequest)
			});
		let (method, url) = match parsed {
			Ok(parts) => parts,
			Err(e) => {
				// The id was never handed out, put it straight back.
				self.id_ring.push_back(id);
				return Err(e);
			},
		};

		self.reqs.insert(id, RequestEntry::new(method, url));
		Ok(id)
	}

	fn add_header(&mut self, id: RequestId, name: String, value: String) -> Result<(), HttpError> {
		let entry = self.reqs.get_mut(&id).ok_or(HttpError::InvalidId)?;
		if !matches!(entry.state, RequestState::Draft) {
			return Err(HttpError::RequestAlreadyStarted);
		}
		if name.is_empty() {
			return Err(HttpError::InvalidHeaderKey);
		}
		entry.headers.push((name, value));
		Ok(())
	}

	fn write_body(&mut self, id: RequestId, chunk: Vec<u8>) -> Result<(), HttpError> {
		let entry = self.reqs.get_mut(&id).ok_or(HttpError::InvalidId)?;
		if !matches!(entry.state, RequestState::Draft) {
			return Err(HttpError::RequestAlreadyStarted);
		}
		entry.body.extend_from_slice(&chunk);
		Ok(())
	}

	fn send(&mut self, id: RequestId) -> Result<(), HttpError> {
		let entry = self.reqs.get_mut(&id).ok_or(HttpError::InvalidId)?;
		if !matches!(entry.state, RequestState::Draft) {
			return Err(HttpError::RequestAlreadyStarted);
		}
		entry.state = RequestState::Sent;

		let mut request = self.client.request(entry.method.clone(), entry.url.clone());
		for (name, value) in &entry.headers {
			request = request.header(name, value);
		}
		request = request.body(entry.body.clone());

		let Some(tx) = self.tx.upgrade() else { return Err(HttpError::Terminated) };
		entry.transfer = Some(tokio::spawn(transfer(tx, id, request)));
		Ok(())
	}

	fn read_response(
		&mut self,
		id: RequestId,
		max: usize,
		reply: oneshot::Sender<Result<Vec<u8>, HttpError>>,
	) {
		let Some(entry) = self.reqs.get_mut(&id) else {
			let _ = reply.send(Err(HttpError::InvalidId));
			return;
		};
		if matches!(entry.state, RequestState::Draft) {
			let _ = reply.send(Err(HttpError::InvalidRequest));
			return;
		}
		entry.waiting_reads.push_back((max, reply));
		Self::serve_waiting_reads(entry);
	}

	fn info(&mut self, id: RequestId, reply: oneshot::Sender<Result<ResponseInfo, HttpError>>) {
		let Some(entry) = self.reqs.get_mut(&id) else {
			let _ = reply.send(Err(HttpError::InvalidId));
			return;
		};
		match (&entry.response, &entry.response_error, &entry.state) {
			(Some(info), _, _) => {
				let _ = reply.send(Ok(info.clone()));
			},
			(None, Some(error), _) => {
				let _ = reply.send(Err(error.clone()));
			},
			(None, None, RequestState::Sent) => entry.waiting_info.push(reply),
			(None, None, RequestState::Draft) => {
				let _ = reply.send(Err(HttpError::InvalidRequest));
			},
		}
	}

	fn remove(&mut self, id: RequestId) -> Result<(), HttpError> {
		let entry = self.reqs.remove(&id).ok_or(HttpError::InvalidId)?;
		if let Some(transfer) = entry.transfer {
			transfer.abort();
		}
		self.id_ring.push_back(id);
		Ok(())
	}

	fn arrived(&mut self, id: RequestId, result: Result<ResponseInfo, HttpError>) {
		let Some(entry) = self.reqs.get_mut(&id) else { return };
		match result {
			Ok(info) => {
				for waiter in entry.waiting_info.drain(..) {
					let _ = waiter.send(Ok(info.clone()));
				}
				entry.response = Some(info);
			},
			Err(error) => {
				entry.response_done = true;
				for waiter in entry.waiting_info.drain(..) {
					let _ = waiter.send(Err(error.clone()));
				}
				entry.response_error = Some(error);
				Self::serve_waiting_reads(entry);
			},
		}
	}

	/// Serve parked readers in arrival order with whatever is available.
	fn serve_waiting_reads(entry: &mut RequestEntry) {
		while let Some((max, reply)) = entry.waiting_reads.pop_front() {
			if let Some(error) = &entry.response_error {
				let _ = reply.send(Err(error.clone()));
				continue;
			}
			if !entry.response_buf.is_empty() {
				let take = max.min(entry.response_buf.len());
				let bytes: Vec<u8> = entry.response_buf.drain(..take).collect();
				let _ = reply.send(Ok(bytes));
				continue;
			}
			if entry.response_done {
				// EOF.
				let _ = reply.send(Ok(Vec::new()));
				continue;
			}
			// Nothing available yet, park again and stop.
			entry.waiting_reads.push_front((max, reply));
			break;
		}
	}
}

/// Drive a single request/response exchange, feeding results back to the
/// owning task.
async fn transfer(tx: mpsc::Sender<Command>, id: RequestId, request: reqwest::RequestBuilder) {
	let mut response = match request.send().await {
		Ok(response) => {
			let info = ResponseInfo {
				code: response.status().as_u16(),
				headers: response
					.headers()
					.iter()
					.map(|(name, value)| {
						(name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
					})
					.collect(),
			};
			let _ = tx.send(Command::Arrived { id, result: Ok(info) }).await;
			response
		},
		Err(error) => {
			let _ = tx
				.send(Command::Arrived { id, result: Err(HttpError::Io(error.to_string())) })
				.await;
			return;
		},
	};

	loop {
		match response.chunk().await {
			Ok(Some(bytes)) => {
				if tx.send(Command::Chunk { id, bytes: bytes.to_vec() }).await.is_err() {
					return;
				}
			},
			Ok(None) => {
				let _ = tx.send(Command::BodyEnd { id, error: None }).await;
				return;
			},
			Err(error) => {
				let _ = tx
					.send(Command::BodyEnd {
						id,
						error: Some(HttpError::Io(error.to_string())),
					})
					.await;
				return;
			},
		}
	}
}

/// A cloneable handle to the offchain HTTP set.
#[derive(Clone)]
pub struct HttpSetHandle {
	tx: mpsc::Sender<Command>,
}

impl HttpSetHandle {
	/// Begin a new draft request, drawing a fresh id from the pool.
	pub async fn start_request(&self, method: &str, uri: &str) -> Result<RequestId, HttpError> {
		let (reply, rx) = oneshot::channel();
		self.dispatch(Command::Start { method: method.into(), uri: uri.into(), reply }, rx).await
	}

	/// Append a header to a draft request.
	pub async fn add_header(
		&self,
		id: RequestId,
		name: &str,
		value: &str,
	) -> Result<(), HttpError> {
		let (reply, rx) = oneshot::channel();
		self.dispatch(
			Command::AddHeader { id, name: name.into(), value: value.into(), reply },
			rx,
		)
		.await
	}

	/// Append a chunk to the body of a draft request. A `deadline` bounds
	/// the time spent waiting for the write to be accepted; `None` blocks
	/// indefinitely.
	pub async fn write_body(
		&self,
		id: RequestId,
		chunk: &[u8],
		deadline: Option<Duration>,
	) -> Result<(), HttpError> {
		let (reply, rx) = oneshot::channel();
		let fut = self.dispatch(Command::WriteBody { id, chunk: chunk.to_vec(), reply }, rx);
		match deadline {
			None => fut.await,
			Some(deadline) => tokio::time::timeout(deadline, fut)
				.await
				.map_err(|_| HttpError::TimeoutWriteBody)?,
		}
	}

	/// Hand a draft request to the transport. The request transitions to
	/// the sent state; response data becomes readable as it arrives.
	pub async fn send(&self, id: RequestId) -> Result<(), HttpError> {
		let (reply, rx) = oneshot::channel();
		self.dispatch(Command::Send { id, reply }, rx).await
	}

	/// Status code and headers of the response, waiting for them to arrive
	/// if necessary.
	pub async fn response_info(
		&self,
		id: RequestId,
		deadline: Option<Duration>,
	) -> Result<ResponseInfo, HttpError> {
		let (reply, rx) = oneshot::channel();
		let fut = self.dispatch(Command::Info { id, reply }, rx);
		match deadline {
			None => fut.await,
			Some(deadline) => tokio::time::timeout(deadline, fut)
				.await
				.map_err(|_| HttpError::DeadlineReached)?,
		}
	}

	/// Read up to `max` bytes of the response body. Returns an empty
	/// vector at end of stream.
	pub async fn response_read(
		&self,
		id: RequestId,
		max: usize,
		deadline: Option<Duration>,
	) -> Result<Vec<u8>, HttpError> {
		let (reply, rx) = oneshot::channel();
		let fut = self.dispatch(Command::ReadResponse { id, max, reply }, rx);
		match deadline {
			None => fut.await,
			Some(deadline) => tokio::time::timeout(deadline, fut)
				.await
				.map_err(|_| HttpError::DeadlineReached)?,
		}
	}

	/// Drop a request and return its id to the pool.
	pub async fn remove(&self, id: RequestId) -> Result<(), HttpError> {
		let (reply, rx) = oneshot::channel();
		self.dispatch(Command::Remove { id, reply }, rx).await
	}

	async fn dispatch<T>(
		&self,
		command: Command,
		rx: oneshot::Receiver<Result<T, HttpError>>,
	) -> Result<T, HttpError> {
		self.tx.send(command).await.map_err(|_| HttpError::Terminated)?;
		rx.await.map_err(|_| HttpError::Terminated)?
	}
}
