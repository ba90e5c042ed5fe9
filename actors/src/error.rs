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

use thiserror::Error;

use crate::ActorId;

/// Error returned when a message could not be queued on its target actor.
///
/// All of these surface synchronously to the sender. A failed send has no side
/// effect: the message was not queued and the target actor was not scheduled.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SendError {
	/// The id does not (and never did) designate a registered actor.
	#[error("actor `{0}` is not registered")]
	UnknownActor(ActorId),
	/// The message kind is not covered by the target's role table.
	#[error("message kind `{kind}` is out of range for a role with {nprompts} handlers")]
	InvalidMessageKind { kind: usize, nprompts: usize },
	/// The target processed its go-die message (or the whole cast is winding
	/// down) and accepts no further messages.
	#[error("actor `{0}` is dying")]
	TargetDying(ActorId),
	/// The runnable queue is closed: the pool has been torn down.
	#[error("the worker pool is no longer accepting work")]
	Disconnected,
	/// The target's mailbox is at capacity.
	#[error("the mailbox of actor `{0}` is full")]
	MailboxFull(ActorId),
}

/// Error returned by [`crate::Troupe::create`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CreateError {
	#[error("a troupe needs at least one worker thread")]
	NoWorkers,
	#[error("a role must define at least the hello handler")]
	EmptyRole,
	#[error("the cast limit is zero, no actor can ever be registered")]
	CastFull,
}

/// Error returned when a new actor could not be added to the cast.
///
/// A failed spawn never affects the spawning actor: it stays alive and keeps
/// processing messages.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SpawnError {
	#[error("the cast is at its limit of {0} actors")]
	CastFull(usize),
	#[error("a role must define at least the hello handler")]
	EmptyRole,
	#[error("the troupe is shutting down")]
	ShuttingDown,
}
