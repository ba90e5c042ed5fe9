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

#![deny(clippy::disallowed_methods)]

//! actors is a small thread-pool actor runtime.
//!
//! It solves the following problem:
//! - run many lightweight actors on a fixed set of worker threads
//! - keep execution strictly serialized per actor, one handler at a time
//! - let handlers spawn new actors while the system is running
//! - wind the whole cast down cleanly once every actor has died
//!
//! An actor is a bounded mailbox, an opaque user state, and a shared [`Role`]
//! (its table of message handlers). Workers pull actors off a runnable queue
//! and dispatch one message per visit; an actor sits on that queue exactly
//! when its mailbox is non-empty and nobody is playing it.

use std::num::NonZeroUsize;

use once_cell::sync::Lazy;
use tracing::{info, warn};

mod actor;
mod context;
mod error;
mod mailbox;
mod message;
mod metrics;
mod pool;
mod registry;
mod role;
mod signal;
mod troupe;

#[cfg(test)]
pub(crate) mod tests;

pub use actor::ActorId;
pub use context::HandlerContext;
pub use error::{CreateError, SendError, SpawnError};
pub use message::{payload_typed, Hello, Message, Payload, HELLO};
pub use metrics::{TroupeMetrics, TROUPE_METRICS};
pub use role::{HandlerFn, Role, RoleBuilder, UserState};
pub use troupe::Troupe;

/// Default worker count:
/// - Derived from `TROUPE_POOL_SIZE` if set and valid.
/// - Defaults to the number of logical CPUs.
pub static DEFAULT_POOL_SIZE: Lazy<usize> =
	Lazy::new(|| usize_from_env_or("TROUPE_POOL_SIZE", num_cpus::get()));

/// Default per-mailbox capacity, overridable through `TROUPE_MAILBOX_CAPACITY`.
pub static DEFAULT_MAILBOX_CAPACITY: Lazy<usize> =
	Lazy::new(|| usize_from_env_or("TROUPE_MAILBOX_CAPACITY", 1024));

/// Default ceiling on the number of actors registered over a troupe's
/// lifetime, overridable through `TROUPE_CAST_LIMIT`.
pub static DEFAULT_CAST_LIMIT: Lazy<usize> =
	Lazy::new(|| usize_from_env_or("TROUPE_CAST_LIMIT", 1_048_576));

fn usize_from_env_or(env_key: &str, default_value: usize) -> usize {
	match std::env::var(env_key) {
		Ok(value_str) => {
			if let Ok(value) = value_str.parse::<NonZeroUsize>() {
				info!("set `{env_key}` to {value}");
				return value.get();
			}
			warn!(
				"failed to parse `{env_key}={value_str}` as an integer > 0, using the default \
				 ({default_value})"
			);
		},
		Err(std::env::VarError::NotUnicode(os_str)) => {
			warn!(
				"failed to parse `{env_key}={os_str:?}` as a valid unicode string, using the \
				 default ({default_value})"
			);
		},
		Err(std::env::VarError::NotPresent) => {},
	}
	default_value
}

/// Tunables of one troupe.
///
/// `Default` reads the `TROUPE_*` environment once per process and falls back
/// to built-in values.
#[derive(Clone, Debug)]
pub struct TroupeConfig {
	/// Number of worker threads. The pool size is fixed for the troupe's
	/// lifetime.
	pub workers: usize,
	/// Capacity of each actor mailbox; a send to a full mailbox fails.
	pub mailbox_capacity: usize,
	/// Maximum number of actors registered over the troupe's lifetime.
	pub cast_limit: usize,
	/// Whether to run the signal thread turning `SIGINT`/`SIGTERM` into a
	/// graceful shutdown. Tests switch this off.
	pub catch_signals: bool,
}

impl Default for TroupeConfig {
	fn default() -> Self {
		TroupeConfig {
			workers: *DEFAULT_POOL_SIZE,
			mailbox_capacity: *DEFAULT_MAILBOX_CAPACITY,
			cast_limit: *DEFAULT_CAST_LIMIT,
			catch_signals: true,
		}
	}
}
