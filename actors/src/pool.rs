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

use std::{
	panic::{self, AssertUnwindSafe},
	sync::{Arc, Mutex},
	thread,
};

use tracing::{debug, error, warn};

use crate::{
	actor::{ActorCell, Settled},
	metrics::TROUPE_METRICS,
	troupe::SystemCore,
	HandlerContext, Message, Payload, SendError,
};

/// One entry of the runnable queue.
///
/// A `Run` entry means "this actor has at least one unprocessed message and no
/// worker is currently playing it"; the stage protocol guarantees an actor
/// appears at most once. `Terminate` entries are pushed once per worker at teardown;
/// because the queue is FIFO, every scheduled actor is visited first.
pub(crate) enum WorkItem {
	Run(Arc<ActorCell>),
	Terminate,
}

/// Fixed set of worker threads feeding off a shared runnable queue.
///
/// Workers pop one actor, dispatch exactly one of its messages, and hand the
/// actor back to the queue if its mailbox still holds work. Handlers therefore
/// interleave across actors at message granularity, while each single actor
/// runs strictly one handler at a time.
pub(crate) struct WorkerPool {
	queue_tx: flume::Sender<WorkItem>,
	queue_rx: flume::Receiver<WorkItem>,
	workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl WorkerPool {
	pub(crate) fn new() -> WorkerPool {
		let (queue_tx, queue_rx) = flume::unbounded();
		WorkerPool { queue_tx, queue_rx, workers: Mutex::new(Vec::new()) }
	}

	/// Spawns the worker threads. Called exactly once, right after the system
	/// core has been assembled.
	pub(crate) fn start(&self, core: &Arc<SystemCore>, num_workers: usize) {
		let mut workers = self.workers.lock().expect("worker pool lock poisoned");
		for worker_ord in 0..num_workers {
			let core = Arc::clone(core);
			let queue_rx = self.queue_rx.clone();
			let join_handle = thread::Builder::new()
				.name(format!("troupe-worker-{worker_ord}"))
				.spawn(move || worker_loop(core, queue_rx))
				.expect("failed to spawn a worker thread");
			workers.push(join_handle);
		}
		debug!(num_workers, "worker-pool-started");
	}

	/// Puts an actor on the runnable queue.
	pub(crate) fn schedule(&self, cell: Arc<ActorCell>) -> Result<(), SendError> {
		self.queue_tx.send(WorkItem::Run(cell)).map_err(|_| SendError::Disconnected)
	}

	/// Asks every worker to quit and waits for all of them.
	pub(crate) fn terminate(&self) {
		let workers = std::mem::take(&mut *self.workers.lock().expect("worker pool lock poisoned"));
		for _ in &workers {
			let _ = self.queue_tx.send(WorkItem::Terminate);
		}
		for join_handle in workers {
			if join_handle.join().is_err() {
				error!("a worker thread panicked outside of a handler");
			}
		}
		debug!("worker-pool-terminated");
	}
}

fn worker_loop(core: Arc<SystemCore>, queue_rx: flume::Receiver<WorkItem>) {
	loop {
		match queue_rx.recv() {
			Ok(WorkItem::Run(cell)) => visit_actor(&core, &cell),
			Ok(WorkItem::Terminate) | Err(flume::RecvError::Disconnected) => {
				debug!("worker-exit");
				return;
			},
		}
	}
}

/// Dispatches exactly one message of the given actor, then settles its
/// scheduling state.
fn visit_actor(core: &Arc<SystemCore>, cell: &Arc<ActorCell>) {
	let Some(message) = cell.take_next_message() else {
		error!(actor_id = cell.id(), "scheduled actor had an empty mailbox");
		return;
	};
	match message {
		Message::GoDie => {
			debug!(actor_id = cell.id(), "go-die");
			cell.go_die();
		},
		Message::Spawn(role) => {
			if let Err(spawn_error) = core.spawn_actor(Some(cell.id()), role) {
				warn!(actor_id = cell.id(), error = %spawn_error, "spawn-failed");
			}
		},
		Message::User { kind, payload } => invoke_handler(core, cell, kind, payload),
	}
	// Whatever piled up while the handler ran is on us: senders only take the
	// scheduling edge when they catch the actor off stage.
	match cell.settle_after_visit() {
		Settled::Requeue =>
			if core.pool.schedule(Arc::clone(cell)).is_err() {
				error!(actor_id = cell.id(), "runnable queue closed with messages pending");
			},
		Settled::Idle => {},
		Settled::Dead => core.registry.reap(cell),
	}
}

fn invoke_handler(core: &Arc<SystemCore>, cell: &Arc<ActorCell>, kind: usize, payload: Option<Payload>) {
	let Some(handler) = cell.role().handler(kind) else {
		// Unreachable through the public send path, which validates the kind
		// against the role table.
		error!(actor_id = cell.id(), kind, "no handler for message kind");
		return;
	};
	let ctx = HandlerContext::new(core, cell.id());
	let mut user_state = cell.lock_user_state();
	let unwind =
		panic::catch_unwind(AssertUnwindSafe(|| handler(&mut user_state, &ctx, payload)));
	TROUPE_METRICS.messages_processed.inc();
	if unwind.is_err() {
		error!(actor_id = cell.id(), kind, "handler panicked, actor goes down");
		cell.go_die();
	}
}
