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
	Arc, Mutex, MutexGuard, PoisonError,
};

use common::TerminateSignal;

use crate::{mailbox::Mailbox, Message, Role, SendError, UserState};

/// Stable identifier of an actor within its troupe. Ids are dense, assigned
/// at registration, and never reused.
pub type ActorId = usize;

/// Mailbox plus the on-stage flag, guarded together by one mutex.
///
/// `on_stage` is true while the actor sits on the runnable queue or a worker
/// is playing it. The invariant `!on_stage implies mailbox empty` holds at all
/// times: a sender that pushes into an idle actor raises the flag and owns the
/// scheduling; everything that arrives while the actor is on stage is picked
/// up by the worker's post-handler check. This is what keeps an actor on the
/// queue at most once and its handlers strictly serialized.
struct Stage {
	mailbox: Mailbox,
	on_stage: bool,
}

/// Outcome of a worker visit, decided under the stage mutex once the handler
/// has returned.
pub(crate) enum Settled {
	/// Messages are left (or arrived during the handler): the worker hands
	/// the actor straight back to the runnable queue.
	Requeue,
	/// Mailbox drained, actor leaves the stage.
	Idle,
	/// Mailbox drained and the actor is dying: the caller must reap it.
	Dead,
}

/// Everything the runtime keeps for one actor.
///
/// The user state mutex is only ever taken by the worker currently playing
/// the actor; the stage protocol keeps it uncontended.
pub(crate) struct ActorCell {
	id: ActorId,
	role: Arc<Role>,
	/// Dead means dying. Child of the troupe-wide signal, so a cast-wide kill
	/// reaches every actor; a go-die message kills only this one.
	dying: TerminateSignal,
	/// Latch ensuring this actor is subtracted from the alive count at most
	/// once.
	reaped: AtomicBool,
	stage: Mutex<Stage>,
	user_state: Mutex<UserState>,
}

impl std::fmt::Debug for ActorCell {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ActorCell").field("id", &self.id).finish()
	}
}

impl ActorCell {
	pub(crate) fn new(
		id: ActorId,
		role: Arc<Role>,
		dying: TerminateSignal,
		mailbox_capacity: usize,
	) -> Arc<ActorCell> {
		Arc::new(ActorCell {
			id,
			role,
			dying,
			reaped: AtomicBool::new(false),
			stage: Mutex::new(Stage { mailbox: Mailbox::new(mailbox_capacity), on_stage: false }),
			user_state: Mutex::new(None),
		})
	}

	pub(crate) fn id(&self) -> ActorId {
		self.id
	}

	pub(crate) fn role(&self) -> &Arc<Role> {
		&self.role
	}

	pub(crate) fn is_dying(&self) -> bool {
		self.dying.is_dead()
	}

	pub(crate) fn go_die(&self) {
		self.dying.kill();
	}

	/// Returns true the first time it is called. The caller owns the one
	/// alive-count decrement this actor will ever get.
	pub(crate) fn mark_reaped(&self) -> bool {
		!self.reaped.swap(true, Ordering::SeqCst)
	}

	/// Queues a message, refusing dying targets and full mailboxes.
	///
	/// `Ok(true)` means the push caught the actor idle: the caller took the
	/// scheduling edge and must put the actor on the runnable queue.
	pub(crate) fn push_message(&self, message: Message) -> Result<bool, SendError> {
		let mut stage = self.lock_stage();
		if self.dying.is_dead() {
			return Err(SendError::TargetDying(self.id));
		}
		stage.mailbox.push(message).map_err(|_rejected| SendError::MailboxFull(self.id))?;
		if stage.on_stage {
			return Ok(false);
		}
		stage.on_stage = true;
		Ok(true)
	}

	/// Removes the oldest message. Only the worker playing the actor calls
	/// this, exactly once per visit.
	pub(crate) fn take_next_message(&self) -> Option<Message> {
		self.lock_stage().mailbox.pop()
	}

	/// Post-handler bookkeeping: either the mailbox still holds work (some of
	/// it possibly queued while the handler ran) and the actor stays on
	/// stage, or it drained and the actor steps down.
	pub(crate) fn settle_after_visit(&self) -> Settled {
		let mut stage = self.lock_stage();
		if !stage.mailbox.is_empty() {
			return Settled::Requeue;
		}
		stage.on_stage = false;
		if self.dying.is_dead() {
			return Settled::Dead;
		}
		Settled::Idle
	}

	/// True for an actor that is off stage with an empty mailbox. Nothing
	/// will ever visit it unless a new message arrives.
	pub(crate) fn is_idle_and_drained(&self) -> bool {
		let stage = self.lock_stage();
		!stage.on_stage && stage.mailbox.is_empty()
	}

	/// A panicking handler poisons the user state mutex; the poison is
	/// shrugged off so the remaining queued messages can still drain.
	pub(crate) fn lock_user_state(&self) -> MutexGuard<'_, UserState> {
		self.user_state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_stage(&self) -> MutexGuard<'_, Stage> {
		self.stage.lock().expect("stage lock poisoned")
	}
}
