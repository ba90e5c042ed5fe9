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

use std::collections::VecDeque;

use crate::Message;

/// Bounded FIFO of messages owned by exactly one actor.
///
/// The mailbox is not synchronized: it is always accessed under the owning
/// actor's stage mutex.
pub(crate) struct Mailbox {
	slots: VecDeque<Message>,
	capacity: usize,
}

impl Mailbox {
	pub(crate) fn new(capacity: usize) -> Mailbox {
		Mailbox { slots: VecDeque::new(), capacity }
	}

	/// Appends a message, or gives it back when the mailbox is at capacity.
	pub(crate) fn push(&mut self, message: Message) -> Result<(), Message> {
		if self.slots.len() >= self.capacity {
			return Err(message);
		}
		self.slots.push_back(message);
		Ok(())
	}

	/// Removes and returns the oldest message.
	pub(crate) fn pop(&mut self) -> Option<Message> {
		self.slots.pop_front()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.slots.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Message;

	fn kinds(mailbox: &mut Mailbox) -> Vec<usize> {
		let mut observed_kinds = Vec::new();
		while let Some(message) = mailbox.pop() {
			let Message::User { kind, .. } = message else {
				panic!("expected a user message");
			};
			observed_kinds.push(kind);
		}
		observed_kinds
	}

	#[test]
	fn test_mailbox_is_fifo() {
		let mut mailbox = Mailbox::new(8);
		for kind in 0..5 {
			mailbox.push(Message::signal(kind)).unwrap();
		}
		assert_eq!(kinds(&mut mailbox), vec![0, 1, 2, 3, 4]);
	}

	#[test]
	fn test_push_fails_exactly_at_capacity() {
		let mut mailbox = Mailbox::new(3);
		for kind in 0..3 {
			assert!(mailbox.push(Message::signal(kind)).is_ok());
		}
		let rejected = mailbox.push(Message::signal(3)).unwrap_err();
		assert!(matches!(rejected, Message::User { kind: 3, .. }));
		assert_eq!(mailbox.len(), 3);
		// Draining one slot makes room for exactly one message.
		mailbox.pop().unwrap();
		assert!(mailbox.push(Message::signal(4)).is_ok());
		assert!(mailbox.push(Message::signal(5)).is_err());
	}

	#[test]
	fn test_pop_on_empty() {
		let mut mailbox = Mailbox::new(2);
		assert!(mailbox.pop().is_none());
		mailbox.push(Message::go_die()).unwrap();
		assert!(mailbox.pop().is_some());
		assert!(mailbox.pop().is_none());
		assert!(mailbox.is_empty());
	}

	#[test]
	fn test_capacity_survives_wraparound() {
		let mut mailbox = Mailbox::new(2);
		for round in 0..100 {
			mailbox.push(Message::signal(round)).unwrap();
			mailbox.push(Message::signal(round)).unwrap();
			assert!(mailbox.push(Message::signal(round)).is_err());
			mailbox.pop().unwrap();
			mailbox.pop().unwrap();
		}
		assert!(mailbox.is_empty());
	}
}
