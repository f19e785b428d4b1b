//! Network and worker-pool settings.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
	#[serde(default = "default_ip")]
	pub ip: String,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Worker threads of the runtime; 0 means one per core.
	#[serde(default)]
	pub worker_threads: usize,
	/// Hard wall-clock cap per request.
	#[serde(default = "default_timeout")]
	pub request_timeout_seconds: u64,
	/// In-flight request cap before load shedding.
	#[serde(default = "default_concurrency")]
	pub max_concurrent_requests: usize,
}

fn default_ip() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	8080
}

fn default_timeout() -> u64 {
	15
}

fn default_concurrency() -> usize {
	256
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			ip: default_ip(),
			port: default_port(),
			worker_threads: 0,
			request_timeout_seconds: default_timeout(),
			max_concurrent_requests: default_concurrency(),
		}
	}
}
