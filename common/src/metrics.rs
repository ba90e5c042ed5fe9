// Copyright (C) 2023 QuerentAI LLC.
// This file is part of Querent.

// The Licensed Work is licensed under the Business Source License 1.1 (BSL 1.1).
// You may use this file in compliance with the BSL 1.1, subject to the following restrictions:
// 1. You may not use the Licensed Work for AI-related services, database services,
//    or any service or product offering that provides database, big data, or analytics
//    services to third parties unless explicitly authorized by QuerentAI LLC.
// 2. For more details, see the LICENSE file or visit https://mariadb.com/bsl11/.

// For inquiries about alternative licensing arrangements, please contact contact@querent.xyz.

// The Licensed Work is provided "AS IS", WITHOUT WARRANTY OF ANY KIND, express or implied,
// including but not limited to the warranties of merchantability, fitness for a particular purpose,
// and non-infringement. See the Business Source License for more details.

// This software includes code developed by QuerentAI LLC (https://querent.xyz).

use prometheus::{Encoder, IntCounter as PrometheusIntCounter, IntGauge as PrometheusIntGauge, Opts, TextEncoder};
pub use prometheus::{IntCounter, IntGauge};

/// Creates a counter and registers it in the default Prometheus registry.
///
/// Panics on an invalid name or a duplicate registration: metric statics are
/// created once per process, so either is a programming error.
pub fn new_counter(name: &str, help: &str, namespace: &str) -> IntCounter {
	let counter_opts = Opts::new(name, help).namespace(namespace);
	let counter = PrometheusIntCounter::with_opts(counter_opts).expect("failed to create counter");
	prometheus::register(Box::new(counter.clone())).expect("failed to register counter");
	counter
}

/// Creates a gauge and registers it in the default Prometheus registry.
pub fn new_gauge(name: &str, help: &str, namespace: &str) -> IntGauge {
	let gauge_opts = Opts::new(name, help).namespace(namespace);
	let gauge = PrometheusIntGauge::with_opts(gauge_opts).expect("failed to create gauge");
	prometheus::register(Box::new(gauge.clone())).expect("failed to register gauge");
	gauge
}

/// Renders the default registry in the Prometheus text exposition format.
pub fn metrics_text_payload() -> String {
	let metric_families = prometheus::gather();
	let mut buffer = Vec::new();
	let encoder = TextEncoder::new();
	let _ = encoder.encode(&metric_families, &mut buffer);
	String::from_utf8_lossy(&buffer).to_string()
}
