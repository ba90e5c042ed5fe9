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

use std::{any::Any, fmt, sync::Arc};

use crate::{ActorId, Role};

/// Opaque message payload.
///
/// The payload is owned by the receiving handler: it is moved into the handler
/// invocation and dropped there unless the handler keeps it.
pub type Payload = Box<dyn Any + Send>;

/// The handler slot every role reserves for the welcome message an actor
/// receives right after registration.
pub const HELLO: usize = 0;

/// Payload of the welcome message.
///
/// `parent` is the actor that requested the spawn, or `None` for the root
/// actor of a troupe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hello {
	pub parent: Option<ActorId>,
}

/// A message addressed to one actor.
///
/// Messages are either one of the two runtime-reserved operations (`GoDie`,
/// `Spawn`) or a `User` message whose `kind` indexes the handler table of the
/// receiving actor's role.
pub enum Message {
	/// Marks the receiver as dying once dispatched. Messages already queued
	/// behind it are still delivered; new sends are refused.
	GoDie,
	/// Asks the receiver to spawn a new actor with the carried role. The new
	/// actor is welcomed with a [`Hello`] naming the receiver as parent.
	Spawn(Arc<Role>),
	/// A role-defined message.
	User { kind: usize, payload: Option<Payload> },
}

impl Message {
	pub fn go_die() -> Message {
		Message::GoDie
	}

	pub fn spawn(role: Arc<Role>) -> Message {
		Message::Spawn(role)
	}

	/// A user message carrying a payload. The payload is boxed here and handed
	/// to the handler as a [`Payload`].
	pub fn user<P: Any + Send>(kind: usize, payload: P) -> Message {
		Message::User { kind, payload: Some(Box::new(payload)) }
	}

	/// A payload-less user message.
	pub fn signal(kind: usize) -> Message {
		Message::User { kind, payload: None }
	}

	pub(crate) fn hello(parent: Option<ActorId>) -> Message {
		Message::user(HELLO, Hello { parent })
	}
}

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Message::GoDie => f.write_str("GoDie"),
			Message::Spawn(role) => f.debug_tuple("Spawn").field(role).finish(),
			Message::User { kind, payload } => f
				.debug_struct("User")
				.field("kind", kind)
				.field("payload", &payload.is_some())
				.finish(),
		}
	}
}

/// Extracts a payload of a concrete type.
///
/// Returns `None` when there is no payload or when it holds a different type.
pub fn payload_typed<M: 'static>(payload: Option<Payload>) -> Option<M> {
	let boxed_payload = payload?.downcast::<M>().ok()?;
	Some(*boxed_payload)
}
