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

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Mutex, Weak,
};

use tracing::debug;

/// A one-way liveness switch.
///
/// Once killed, a signal never comes back to life. Child signals are killed
/// together with their parent, which makes a single parent `kill()` the way to
/// tell a whole group to wind down, while each member can still be killed
/// individually through its own child signal.
#[derive(Clone, Default)]
pub struct TerminateSignal {
	inner: Arc<Inner>,
}

struct Inner {
	alive: AtomicBool,
	children: Mutex<Vec<Weak<Inner>>>,
}

impl Default for Inner {
	fn default() -> Self {
		Self { alive: AtomicBool::new(true), children: Mutex::default() }
	}
}

impl TerminateSignal {
	pub fn is_alive(&self) -> bool {
		self.inner.alive.load(Ordering::Relaxed)
	}

	pub fn is_dead(&self) -> bool {
		!self.is_alive()
	}

	pub fn kill(&self) {
		self.inner.kill();
	}

	/// Creates a child signal.
	///
	/// A child born from a dead parent is dead on arrival.
	pub fn child(&self) -> TerminateSignal {
		let child_inner =
			Arc::new(Inner { alive: AtomicBool::new(self.is_alive()), ..Default::default() });
		let mut children = self.inner.children.lock().expect("terminate signal lock poisoned");
		children.retain(|weak_child| weak_child.strong_count() > 0);
		children.push(Arc::downgrade(&child_inner));
		TerminateSignal { inner: child_inner }
	}
}

impl Inner {
	fn kill(&self) {
		debug!("terminate-signal-killed");
		self.alive.store(false, Ordering::Relaxed);
		let mut children = self.children.lock().expect("terminate signal lock poisoned");
		for weak_child in children.drain(..) {
			if let Some(child) = weak_child.upgrade() {
				child.kill();
			}
		}
	}
}
