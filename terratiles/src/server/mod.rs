//! HTTP lifecycle and routing.
//!
//! The server composes three surfaces over one catalogue snapshot:
//! - `/ogc` answers WMS and WMTS KVP requests (with `/wms` and `/wmts`
//!   aliases),
//! - `/tms/1.0.0/...` answers path-addressed TMS requests,
//! - `/status` is a liveness probe.
//!
//! Global protection layers (timeout, concurrency cap, load shedding, panic
//! catching) wrap the router; a oneshot channel drives graceful shutdown.
//! Reloads build a fresh catalogue and swap it in atomically while in-flight
//! requests keep the snapshot they started with.

use crate::capabilities;
use crate::catalog::{Catalog, CatalogHolder};
use crate::config::Config;
use crate::planner::{
	self, Params, PlanOutput, TmsRequest, service_exception_body, to_service_error,
};
use anyhow::{Context, Result, anyhow};
use axum::error_handling::HandleErrorLayer;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Router, body::Body, routing::get};
use std::sync::Arc;
use std::time::Duration;
use terratiles_core::{Blob, ServiceError};
use terratiles_pyramid::WriteBackGuard;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::{ServiceBuilder, buffer::BufferLayer, limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer};
use tower_http::catch_panic::CatchPanicLayer;

#[derive(Clone)]
struct AppState {
	holder: Arc<CatalogHolder>,
	write_back: Arc<WriteBackGuard>,
}

/// The terratiles HTTP server.
pub struct TileServer {
	ip: String,
	port: u16,
	holder: Arc<CatalogHolder>,
	write_back: Arc<WriteBackGuard>,
	request_timeout: Duration,
	max_concurrent: usize,
	exit_signal: Option<oneshot::Sender<()>>,
	join: Option<tokio::task::JoinHandle<()>>,
	reconnect: Option<tokio::task::JoinHandle<()>>,
}

impl TileServer {
	/// Builds the catalogue, opens every storage context and prepares the
	/// server (not yet listening).
	pub async fn from_config(config: Config) -> Result<TileServer> {
		let catalog = Catalog::build(&config).await?;
		catalog
			.pool
			.connect_all()
			.await
			.map_err(|err| anyhow!("storage context check failed: {err}"))?;
		let holder = Arc::new(CatalogHolder::new(catalog));

		// Periodically revalidate object-store sessions.
		let reconnect_secs = config.services.reconnect_interval_seconds;
		let reconnect = if reconnect_secs > 0 {
			let holder = holder.clone();
			Some(tokio::spawn(async move {
				loop {
					tokio::time::sleep(Duration::from_secs(reconnect_secs)).await;
					holder.load().pool.revalidate().await;
				}
			}))
		} else {
			None
		};

		Ok(TileServer {
			ip: config.server.ip.clone(),
			port: config.server.port,
			holder,
			write_back: Arc::new(WriteBackGuard::new()),
			request_timeout: Duration::from_secs(config.server.request_timeout_seconds),
			max_concurrent: config.server.max_concurrent_requests,
			exit_signal: None,
			join: None,
			reconnect,
		})
	}

	/// Builds the next catalogue and swaps it in. Serving continues from the
	/// old snapshot until the swap; a failed build leaves it untouched.
	pub async fn reload(&self, config: &Config) -> Result<()> {
		let catalog = Catalog::build(config).await.context("building next catalogue")?;
		catalog
			.pool
			.connect_all()
			.await
			.map_err(|err| anyhow!("storage context check failed: {err}"))?;
		self.holder.swap(catalog);
		Ok(())
	}

	pub fn catalog(&self) -> Arc<Catalog> {
		self.holder.load()
	}

	/// Starts listening. Idempotent: a running instance is stopped first.
	pub async fn start(&mut self) -> Result<()> {
		if self.exit_signal.is_some() || self.join.is_some() {
			self.stop().await;
		}

		let state = AppState {
			holder: self.holder.clone(),
			write_back: self.write_back.clone(),
		};

		let router = Router::new()
			.route("/status", get(|| async { "ready!" }))
			.route("/ogc", get(ogc_handler))
			.route("/wms", get(ogc_handler))
			.route("/wmts", get(ogc_handler))
			.route("/tms/1.0.0", get(tms_root_handler))
			.route("/tms/1.0.0/{layer}", get(tms_layer_handler))
			.route("/tms/1.0.0/{layer}/{matrix}", get(tms_matrix_handler))
			.route("/tms/1.0.0/{layer}/{matrix}/{x}/{y}", get(tms_tile_handler))
			.with_state(state);

		// Protection layers, outermost first: map tower errors to 503, catch
		// panics, cap wall time, queue, cap in-flight work, shed overload.
		let overload_handler = HandleErrorLayer::new(|_err: BoxError| async move {
			let mut resp = (StatusCode::SERVICE_UNAVAILABLE, "Service overloaded, try later").into_response();
			resp.headers_mut().insert("Retry-After", "2".parse().expect("static header"));
			Ok::<_, std::convert::Infallible>(resp)
		});
		let protection = ServiceBuilder::new()
			.layer(overload_handler)
			.layer(CatchPanicLayer::new())
			.layer(TimeoutLayer::new(self.request_timeout))
			.layer(BufferLayer::new(self.max_concurrent * 2))
			.layer(ConcurrencyLimitLayer::new(self.max_concurrent))
			.layer(LoadShedLayer::new());
		let router = router.layer(protection);

		let addr = format!("{}:{}", self.ip, self.port);
		let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
		if self.port == 0 {
			self.port = listener.local_addr()?.port();
		}
		log::info!("serving on {}:{}", self.ip, self.port);

		let (tx, rx) = oneshot::channel::<()>();
		let handle = tokio::spawn(async move {
			if let Err(err) = axum::serve(listener, router.into_make_service())
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await
			{
				log::error!("server task exited with error: {err}");
			}
		});

		self.exit_signal = Some(tx);
		self.join = Some(handle);
		Ok(())
	}

	/// Graceful shutdown; waits for the serving task with a timeout.
	pub async fn stop(&mut self) {
		if self.exit_signal.is_none() && self.join.is_none() {
			return;
		}
		log::info!("stopping server");

		if let Some(tx) = self.exit_signal.take() {
			let _ = tx.send(());
		}
		if let Some(handle) = self.join.take() {
			match tokio::time::timeout(Duration::from_secs(10), handle).await {
				Ok(Err(join_err)) => log::warn!("server task join error: {join_err}"),
				Err(_) => log::warn!("server task did not shut down within timeout"),
				Ok(Ok(())) => {}
			}
		}
	}

	pub fn get_port(&self) -> u16 {
		self.port
	}
}

impl Drop for TileServer {
	fn drop(&mut self) {
		if let Some(task) = self.reconnect.take() {
			task.abort();
		}
	}
}

// --- handlers ----------------------------------------------------------------

fn exception_response(err: &ServiceError) -> Response<Body> {
	Response::builder()
		.status(err.http_status())
		.header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
		.body(Body::from(service_exception_body(err)))
		.expect("static exception response")
}

fn ok_response(output: PlanOutput) -> Response<Body> {
	Response::builder()
		.status(200)
		.header(header::CONTENT_TYPE, &output.mime)
		.body(Body::from(output.bytes.into_vec()))
		.expect("static ok response")
}

/// Renders a plan result, spawning deferred write-back after a success.
fn finish(state: &AppState, result: Result<PlanOutput>) -> Response<Body> {
	match result {
		Ok(mut output) => {
			if let Some(job) = output.write_back.take() {
				let guard = state.write_back.clone();
				tokio::spawn(async move {
					guard
						.persist(&job.pyramid_id, &job.level, job.col, job.row, job.blob)
						.await;
				});
			}
			ok_response(output)
		}
		Err(err) => {
			let service = to_service_error(err);
			log::debug!("request failed: {service}");
			exception_response(&service)
		}
	}
}

/// KVP endpoint: WMS and WMTS dispatch on SERVICE and REQUEST.
async fn ogc_handler(
	State(state): State<AppState>,
	Query(pairs): Query<Vec<(String, String)>>,
	RawQuery(raw): RawQuery,
) -> Response<Body> {
	let catalog = state.holder.load();

	let params = match Params::new(pairs) {
		Ok(params) => params,
		Err(err) => return exception_response(&err),
	};

	let service = params.get_or_empty("SERVICE").to_uppercase();
	let request = params.get_or_empty("REQUEST").to_string();
	log::debug!("KVP request: service='{service}', request='{request}'");

	let result: Result<PlanOutput> = match (service.as_str(), request.as_str()) {
		("WMS", "GetMap") => planner::get_map(&catalog, &params).await,
		("WMS", "GetCapabilities") => {
			let version = planner::negotiate_wms_version(params.get("VERSION"));
			Ok(PlanOutput::new(
				Blob::from(capabilities::wms_capabilities(&catalog, version)),
				"text/xml",
			))
		}
		("WMTS", "GetTile") => planner::get_tile(&catalog, &params).await,
		("WMTS", "GetCapabilities") => Ok(PlanOutput::new(
			Blob::from(capabilities::wmts_capabilities(&catalog)),
			"text/xml",
		)),
		("WMS" | "WMTS", "GetFeatureInfo") => {
			planner::get_feature_info(&catalog, &params, raw.as_deref().unwrap_or("")).await
		}
		("", _) => Err(anyhow!(ServiceError::MissingParameter {
			name: "SERVICE".to_string(),
		})),
		(_, "") => Err(anyhow!(ServiceError::MissingParameter {
			name: "REQUEST".to_string(),
		})),
		(service, request) => Err(anyhow!(ServiceError::UnsupportedOperation {
			operation: format!("{service} {request}"),
		})),
	};

	finish(&state, result)
}

async fn tms_root_handler(State(state): State<AppState>) -> Response<Body> {
	let catalog = state.holder.load();
	let result = planner::handle_tms(&catalog, TmsRequest::Root).await;
	finish(&state, result)
}

async fn tms_layer_handler(State(state): State<AppState>, Path(layer): Path<String>) -> Response<Body> {
	let catalog = state.holder.load();
	let result = planner::handle_tms(&catalog, TmsRequest::Layer(layer)).await;
	finish(&state, result)
}

async fn tms_matrix_handler(
	State(state): State<AppState>,
	Path((layer, matrix)): Path<(String, String)>,
) -> Response<Body> {
	let catalog = state.holder.load();
	let result = planner::handle_tms(&catalog, TmsRequest::Matrix { layer, matrix }).await;
	finish(&state, result)
}

async fn tms_tile_handler(
	State(state): State<AppState>,
	Path((layer, matrix, x, y)): Path<(String, String, String, String)>,
) -> Response<Body> {
	let catalog = state.holder.load();
	let segments = [layer.as_str(), matrix.as_str(), x.as_str(), y.as_str()];
	let result = match TmsRequest::parse(&segments) {
		Ok(request) => planner::handle_tms(&catalog, request).await,
		Err(err) => Err(anyhow::Error::new(err)),
	};
	finish(&state, result)
}
