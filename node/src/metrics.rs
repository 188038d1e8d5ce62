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

//! The prometheus metrics endpoint.

use crate::Error;
use hyper::{
	service::{make_service_fn, service_fn},
	Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "metrics";

/// Serve `GET /metrics` with the contents of `registry` until cancelled.
pub async fn run_metrics_server(
	addr: SocketAddr,
	registry: Registry,
	cancel: CancellationToken,
) -> Result<(), Error> {
	let make_service = make_service_fn(move |_conn| {
		let registry = registry.clone();
		async move {
			Ok::<_, hyper::Error>(service_fn(move |request| {
				serve_request(request, registry.clone())
			}))
		}
	});

	let server = Server::try_bind(&addr)
		.map_err(|e| Error::Metrics(e.to_string()))?
		.serve(make_service);
	log::info!(target: LOG_TARGET, "prometheus metrics on http://{addr}/metrics");

	server
		.with_graceful_shutdown(cancel.cancelled())
		.await
		.map_err(|e| Error::Metrics(e.to_string()))
}

async fn serve_request(
	request: Request<Body>,
	registry: Registry,
) -> Result<Response<Body>, hyper::Error> {
	if request.uri().path() != "/metrics" {
		return Ok(Response::builder()
			.status(StatusCode::NOT_FOUND)
			.body(Body::from("not found"))
			.expect("static response is well formed; qed"));
	}

	let metric_families = registry.gather();
	let mut buffer = Vec::new();
	if let Err(error) = TextEncoder::new().encode(&metric_families, &mut buffer) {
		log::warn!(target: LOG_TARGET, "failed to encode metrics: {error}");
		return Ok(Response::builder()
			.status(StatusCode::INTERNAL_SERVER_ERROR)
			.body(Body::from("encoding error"))
			.expect("static response is well formed; qed"));
	}

	Ok(Response::builder()
		.status(StatusCode::OK)
		.header(hyper::header::CONTENT_TYPE, "text/plain; version=0.0.4")
		.body(Body::from(buffer))
		.expect("metrics response is well formed; qed"))
}
