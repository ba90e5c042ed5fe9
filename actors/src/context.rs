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

use std::sync::Arc;

use tracing::debug;

use crate::{troupe::SystemCore, ActorId, Message, Role, SendError, SpawnError};

/// Handle a running handler uses to talk back to its troupe.
///
/// A fresh context is passed into every handler invocation; it is how a
/// handler learns which actor it is playing, sends messages, and spawns new
/// actors. It only lives for the duration of the invocation.
pub struct HandlerContext<'a> {
	core: &'a SystemCore,
	actor_id: ActorId,
}

impl<'a> HandlerContext<'a> {
	pub(crate) fn new(core: &'a Arc<SystemCore>, actor_id: ActorId) -> HandlerContext<'a> {
		HandlerContext { core: core.as_ref(), actor_id }
	}

	/// Id of the actor whose handler is currently running.
	pub fn actor_id(&self) -> ActorId {
		self.actor_id
	}

	/// Posts a message to any actor of the troupe. Fire-and-forget: delivery
	/// order is FIFO per target mailbox, nothing is promised across targets.
	pub fn send_message(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		debug!(from = self.actor_id, to = target, message = ?message, "send");
		self.core.send_message(target, message)
	}

	/// Posts a message to the actor itself. The message lands behind
	/// everything already queued in its own mailbox.
	pub fn send_self(&self, message: Message) -> Result<(), SendError> {
		self.send_message(self.actor_id, message)
	}

	/// Registers a new actor with the given role and welcomes it with a hello
	/// naming this actor as parent.
	///
	/// The hello is guaranteed to be the first message the new actor
	/// processes: nobody else holds its id before this method returns.
	pub fn spawn(&self, role: Arc<Role>) -> Result<ActorId, SpawnError> {
		self.core.spawn_actor(Some(self.actor_id), role)
	}
}
