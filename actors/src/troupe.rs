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
	Arc, Mutex,
};

use tracing::{debug, info};

use crate::{
	metrics::TROUPE_METRICS, pool::WorkerPool, registry::Registry, signal::SignalWatcher,
	ActorId, CreateError, Message, Role, SendError, SpawnError, TroupeConfig,
};

/// Shared guts of a running troupe: the registry and the worker pool. Workers
/// and the signal thread each hold an `Arc` to it.
pub(crate) struct SystemCore {
	pub(crate) registry: Registry,
	pub(crate) pool: WorkerPool,
}

impl SystemCore {
	/// Validates and queues one message, scheduling the target if the push
	/// caught it idle.
	///
	/// Validation order matters: the id is bounds-checked before the role
	/// table is consulted for the kind check.
	pub(crate) fn send_message(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		let cell = self.registry.get(target).ok_or(SendError::UnknownActor(target))?;
		if let Message::User { kind, .. } = &message {
			let nprompts = cell.role().nprompts();
			if *kind >= nprompts {
				return Err(SendError::InvalidMessageKind { kind: *kind, nprompts });
			}
		}
		let must_schedule = match cell.push_message(message) {
			Ok(must_schedule) => must_schedule,
			Err(send_error) => {
				if matches!(send_error, SendError::MailboxFull(_)) {
					TROUPE_METRICS.mailbox_rejections.inc();
				}
				return Err(send_error);
			},
		};
		if must_schedule {
			self.pool.schedule(cell)?;
		}
		Ok(())
	}

	/// Registers a new actor and welcomes it.
	///
	/// The hello is pushed before the actor id escapes anywhere, which makes
	/// it the first message the actor processes.
	pub(crate) fn spawn_actor(
		&self,
		parent: Option<ActorId>,
		role: Arc<Role>,
	) -> Result<ActorId, SpawnError> {
		let cell = self.registry.register(role)?;
		let actor_id = cell.id();
		debug!(actor_id, parent = ?parent, "spawn-actor");
		let seeded = match cell.push_message(Message::hello(parent)) {
			Ok(_must_schedule) => self.pool.schedule(cell.clone()).is_ok(),
			Err(_send_error) => false,
		};
		if !seeded {
			// The cast was killed (or the pool torn down) between the
			// registration and the hello. The actor will never run: take it
			// out of the alive count right here.
			self.registry.reap(&cell);
			return Err(SpawnError::ShuttingDown);
		}
		Ok(actor_id)
	}

	/// Graceful shutdown: marks the whole cast dying. Queued work keeps
	/// draining; once the last dying mailbox empties, joiners wake up.
	pub(crate) fn initiate_shutdown(&self) {
		info!("initiate-shutdown");
		self.registry.kill_cast();
	}
}

/// A troupe is a running actor system: a cast of actors, a fixed pool of
/// worker threads playing them, and a signal thread for interactive
/// shutdown.
///
/// It is not a singleton: every test can run its own troupe, and a process
/// can host several. Handlers reach their own troupe through the
/// [`crate::HandlerContext`] passed into every invocation.
///
/// The root actor is registered by [`Troupe::create`] and receives a hello
/// with no parent. The troupe lives until every actor has died (through
/// go-die messages, or collectively through an interrupt signal) and
/// [`Troupe::join`] has collected the workers.
pub struct Troupe {
	core: Arc<SystemCore>,
	root: ActorId,
	signal_watcher: Mutex<Option<SignalWatcher>>,
	join_started: AtomicBool,
}

impl Troupe {
	/// Creates a troupe with the default configuration and `role` as the root
	/// actor's role.
	pub fn create(role: Arc<Role>) -> Result<Troupe, CreateError> {
		Troupe::with_config(TroupeConfig::default(), role)
	}

	/// Creates a troupe with an explicit configuration.
	pub fn with_config(config: TroupeConfig, role: Arc<Role>) -> Result<Troupe, CreateError> {
		if config.workers == 0 {
			return Err(CreateError::NoWorkers);
		}
		if config.cast_limit == 0 {
			return Err(CreateError::CastFull);
		}
		if role.nprompts() == 0 {
			return Err(CreateError::EmptyRole);
		}
		let registry = Registry::new(config.cast_limit, config.mailbox_capacity);
		let pool = WorkerPool::new();
		let core = Arc::new(SystemCore { registry, pool });
		core.pool.start(&core, config.workers);
		let signal_watcher =
			config.catch_signals.then(|| SignalWatcher::start(Arc::clone(&core)));
		let root = core
			.spawn_actor(None, role)
			.expect("a freshly created troupe cannot refuse its root actor");
		info!(workers = config.workers, root, "troupe-created");
		Ok(Troupe {
			core,
			root,
			signal_watcher: Mutex::new(signal_watcher),
			join_started: AtomicBool::new(false),
		})
	}

	/// Id of the root actor.
	pub fn root(&self) -> ActorId {
		self.root
	}

	/// Posts a message to an actor of this troupe.
	pub fn send_message(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		self.core.send_message(target, message)
	}

	/// Number of actors registered since creation.
	pub fn cast_size(&self) -> usize {
		self.core.registry.cast_size()
	}

	/// Number of actors not yet drained after dying.
	pub fn alive_count(&self) -> usize {
		self.core.registry.alive_count()
	}

	/// Blocks until every actor has died and drained, then tears the pool and
	/// the signal thread down.
	///
	/// Idempotent, and guarded against reentry: a second call returns
	/// immediately, even one racing the first.
	pub fn join(&self) {
		if self.join_started.swap(true, Ordering::SeqCst) {
			return;
		}
		self.core.registry.wait_all_drained();
		self.core.pool.terminate();
		let signal_watcher = self.signal_watcher.lock().expect("signal watcher lock poisoned").take();
		if let Some(signal_watcher) = signal_watcher {
			signal_watcher.stop();
		}
		info!("troupe-joined");
	}
}

impl Drop for Troupe {
	fn drop(&mut self) {
		// An unjoined troupe winds down the way an interrupt would: the cast
		// is marked dying and the pool drains what is left.
		if !self.join_started.load(Ordering::SeqCst) {
			self.core.initiate_shutdown();
		}
		self.join();
	}
}
