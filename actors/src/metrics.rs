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

use common::metrics::{new_counter, new_gauge, IntCounter, IntGauge};
use once_cell::sync::Lazy;

/// Process-wide counters for the runtime. Shared by every troupe living in
/// the process.
pub struct TroupeMetrics {
	pub messages_processed: IntCounter,
	pub actors_spawned: IntCounter,
	pub mailbox_rejections: IntCounter,
	pub alive_actors: IntGauge,
}

impl Default for TroupeMetrics {
	fn default() -> Self {
		TroupeMetrics {
			messages_processed: new_counter(
				"messages_processed_total",
				"Number of messages dispatched to handlers.",
				"troupe",
			),
			actors_spawned: new_counter(
				"actors_spawned_total",
				"Number of actors ever registered.",
				"troupe",
			),
			mailbox_rejections: new_counter(
				"mailbox_rejections_total",
				"Number of sends refused because the target mailbox was full.",
				"troupe",
			),
			alive_actors: new_gauge(
				"alive_actors",
				"Number of actors not yet drained after dying.",
				"troupe",
			),
		}
	}
}

pub static TROUPE_METRICS: Lazy<TroupeMetrics> = Lazy::new(TroupeMetrics::default);
