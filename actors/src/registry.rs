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

use std::sync::{Arc, Condvar, Mutex};

use common::TerminateSignal;
use tracing::debug;

use crate::{actor::ActorCell, metrics::TROUPE_METRICS, ActorId, Role, SpawnError};

/// Dense, append-only table of every actor ever registered, plus the alive
/// count that gates troupe shutdown.
///
/// An actor counts as alive from registration until it has been observed
/// drained while dying. The count lives under the registry mutex, and the
/// `all_drained` condvar pairs with that same mutex, so the join path, the
/// worker decrement site and the cast-wide kill are serialized against each
/// other.
pub(crate) struct Registry {
	inner: Mutex<RegistryInner>,
	all_drained: Condvar,
	/// Parent of every actor's dying signal.
	dying: TerminateSignal,
	cast_limit: usize,
	mailbox_capacity: usize,
}

struct RegistryInner {
	actors: Vec<Arc<ActorCell>>,
	alive: usize,
}

impl Registry {
	pub(crate) fn new(cast_limit: usize, mailbox_capacity: usize) -> Registry {
		Registry {
			inner: Mutex::new(RegistryInner { actors: Vec::new(), alive: 0 }),
			all_drained: Condvar::new(),
			dying: TerminateSignal::default(),
			cast_limit,
			mailbox_capacity,
		}
	}

	/// Adds an actor to the cast and counts it alive.
	///
	/// Ids are assigned densely in registration order. Registration is refused
	/// once the cast is winding down: the alive count must never climb back
	/// from zero.
	pub(crate) fn register(&self, role: Arc<Role>) -> Result<Arc<ActorCell>, SpawnError> {
		if role.nprompts() == 0 {
			return Err(SpawnError::EmptyRole);
		}
		let mut inner = self.lock_inner();
		if self.dying.is_dead() {
			return Err(SpawnError::ShuttingDown);
		}
		if inner.actors.len() >= self.cast_limit {
			return Err(SpawnError::CastFull(self.cast_limit));
		}
		let actor_id = inner.actors.len();
		let cell = ActorCell::new(actor_id, role, self.dying.child(), self.mailbox_capacity);
		inner.actors.push(cell.clone());
		inner.alive += 1;
		TROUPE_METRICS.actors_spawned.inc();
		TROUPE_METRICS.alive_actors.inc();
		debug!(actor_id, cast_size = inner.actors.len(), "register-actor");
		Ok(cell)
	}

	pub(crate) fn get(&self, actor_id: ActorId) -> Option<Arc<ActorCell>> {
		self.lock_inner().actors.get(actor_id).cloned()
	}

	pub(crate) fn cast_size(&self) -> usize {
		self.lock_inner().actors.len()
	}

	pub(crate) fn alive_count(&self) -> usize {
		self.lock_inner().alive
	}

	/// Subtracts a drained dying actor from the alive count.
	///
	/// The cell's reap latch makes the decrement single-shot per actor, so a
	/// message that slipped in just before the go-die dispatch can still be
	/// delivered later without the actor being counted down twice.
	pub(crate) fn reap(&self, cell: &ActorCell) {
		let mut inner = self.lock_inner();
		if !cell.mark_reaped() {
			return;
		}
		inner.alive = inner.alive.saturating_sub(1);
		TROUPE_METRICS.alive_actors.dec();
		debug!(actor_id = cell.id(), alive = inner.alive, "reap-actor");
		if inner.alive == 0 {
			self.all_drained.notify_all();
		}
	}

	/// Marks every actor dying and immediately reaps the idle ones, which no
	/// worker would ever visit again.
	///
	/// Actors still on stage keep draining on the pool (every send to them
	/// now fails, so their mailboxes only shrink) and are reaped by the worker
	/// that settles their last visit. Holding the registry mutex across the
	/// whole sweep keeps it atomic with respect to `register` and `reap`.
	pub(crate) fn kill_cast(&self) {
		let mut inner = self.lock_inner();
		self.dying.kill();
		let mut reaped = 0;
		for cell in &inner.actors {
			if cell.is_idle_and_drained() && cell.mark_reaped() {
				reaped += 1;
			}
		}
		if reaped > 0 {
			inner.alive = inner.alive.saturating_sub(reaped);
			TROUPE_METRICS.alive_actors.sub(reaped as i64);
		}
		debug!(cast_size = inner.actors.len(), alive = inner.alive, "kill-cast");
		if inner.alive == 0 {
			self.all_drained.notify_all();
		}
	}

	/// Blocks until the alive count reaches zero.
	pub(crate) fn wait_all_drained(&self) {
		let mut inner = self.lock_inner();
		while inner.alive > 0 {
			inner = self.all_drained.wait(inner).expect("registry lock poisoned");
		}
	}

	fn lock_inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
		self.inner.lock().expect("registry lock poisoned")
	}
}
