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

use std::{sync::Arc, thread};

use signal_hook::{
	consts::{SIGINT, SIGTERM},
	iterator::Signals,
};
use tracing::{error, info};

use crate::troupe::SystemCore;

/// Dedicated thread turning interrupt signals into a graceful shutdown.
///
/// On `SIGINT`/`SIGTERM` the whole cast is marked dying: in-flight handlers
/// finish, queued messages keep draining (no new ones can be sent), and the
/// alive count reaches zero on its own, releasing whoever is joining the
/// troupe.
pub(crate) struct SignalWatcher {
	handle: signal_hook::iterator::Handle,
	thread: thread::JoinHandle<()>,
}

impl SignalWatcher {
	pub(crate) fn start(core: Arc<SystemCore>) -> SignalWatcher {
		let mut signals =
			Signals::new([SIGINT, SIGTERM]).expect("failed to register signal handlers");
		let handle = signals.handle();
		let thread = thread::Builder::new()
			.name("troupe-signals".to_string())
			.spawn(move || {
				for signal in signals.forever() {
					info!(signal, "caught-interrupt");
					core.initiate_shutdown();
				}
			})
			.expect("failed to spawn the signal thread");
		SignalWatcher { handle, thread }
	}

	/// Stops listening and waits for the thread.
	pub(crate) fn stop(self) {
		self.handle.close();
		if self.thread.join().is_err() {
			error!("the signal thread panicked");
		}
	}
}
