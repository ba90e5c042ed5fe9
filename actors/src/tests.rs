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
	collections::HashMap,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	thread,
	time::Duration,
};

use crate::{
	payload_typed, ActorId, CreateError, Hello, Message, Role, SendError, SpawnError, Troupe,
	TroupeConfig,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn test_config() -> TroupeConfig {
	TroupeConfig { workers: 2, mailbox_capacity: 64, cast_limit: 1024, catch_signals: false }
}

pub(crate) fn noop_role() -> Arc<Role> {
	Role::builder().handler(|_state, _ctx, _payload| {}).build()
}

fn setup_logging_for_tests() {
	use tracing_subscriber::EnvFilter;
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn drain<T>(rx: &flume::Receiver<T>) -> Vec<T> {
	rx.try_iter().collect()
}

#[test]
fn test_echo_round_trip() {
	let (report_tx, report_rx) = flume::unbounded::<String>();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(|state, _ctx, payload| {
			if let Some(text) = payload_typed::<String>(payload) {
				*state = Some(Box::new(text));
			}
		})
		.handler(move |state, _ctx, _payload| {
			let stored = state
				.as_ref()
				.and_then(|boxed_state| boxed_state.downcast_ref::<String>())
				.cloned()
				.unwrap_or_default();
			report_tx.send(stored).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), role).unwrap();
	let root = troupe.root();
	troupe.send_message(root, Message::user(1, "ping".to_string())).unwrap();
	troupe.send_message(root, Message::signal(2)).unwrap();
	troupe.send_message(root, Message::go_die()).unwrap();
	troupe.join();
	assert_eq!(report_rx.recv_timeout(RECV_TIMEOUT).unwrap(), "ping");
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_fan_out() {
	let (parent_tx, parent_rx) = flume::unbounded::<Option<ActorId>>();
	let hello_count = Arc::new(AtomicUsize::new(0));
	let child_hello_count = hello_count.clone();
	let child_role = Role::builder()
		.handler(move |_state, ctx, payload| {
			child_hello_count.fetch_add(1, Ordering::SeqCst);
			let hello = payload_typed::<Hello>(payload).unwrap();
			parent_tx.send(hello.parent).unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let root_hello_count = hello_count.clone();
	let root_role = Role::builder()
		.handler(move |_state, ctx, _payload| {
			root_hello_count.fetch_add(1, Ordering::SeqCst);
			// Half the children through the direct spawn call, half through
			// spawn messages posted to ourselves.
			for _ in 0..50 {
				ctx.spawn(child_role.clone()).unwrap();
			}
			for _ in 0..50 {
				ctx.send_self(Message::spawn(child_role.clone())).unwrap();
			}
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), root_role).unwrap();
	troupe.join();
	let parents = drain(&parent_rx);
	assert_eq!(parents.len(), 100);
	assert!(parents.iter().all(|parent| *parent == Some(0)));
	assert_eq!(hello_count.load(Ordering::SeqCst), 101);
	assert_eq!(troupe.cast_size(), 101);
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_root_hello_has_no_parent() {
	let (parent_tx, parent_rx) = flume::unbounded::<Option<ActorId>>();
	let role = Role::builder()
		.handler(move |_state, ctx, payload| {
			let hello = payload_typed::<Hello>(payload).unwrap();
			parent_tx.send(hello.parent).unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), role).unwrap();
	troupe.join();
	assert_eq!(parent_rx.recv_timeout(RECV_TIMEOUT).unwrap(), None);
}

#[test]
fn test_back_pressure_reports_mailbox_full() {
	let config = TroupeConfig { mailbox_capacity: 8, ..test_config() };
	let (started_tx, started_rx) = flume::unbounded::<()>();
	let (gate_tx, gate_rx) = flume::unbounded::<()>();
	let (record_tx, record_rx) = flume::unbounded::<u64>();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |_state, _ctx, payload| {
			started_tx.send(()).unwrap();
			gate_rx.recv().unwrap();
			record_tx.send(payload_typed::<u64>(payload).unwrap()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(config, role).unwrap();
	let root = troupe.root();
	// The first message is popped right away and its handler parks on the
	// gate, leaving the mailbox empty.
	troupe.send_message(root, Message::user(1, 0u64)).unwrap();
	started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	// Eight more sends fill the mailbox to its capacity.
	for seq in 1..=8u64 {
		troupe.send_message(root, Message::user(1, seq)).unwrap();
	}
	// The ninth unprocessed message does not fit, and the failed send has no
	// side effect.
	assert_eq!(
		troupe.send_message(root, Message::user(1, 9u64)),
		Err(SendError::MailboxFull(root))
	);
	for _ in 0..9 {
		gate_tx.send(()).unwrap();
	}
	let mut processed = Vec::new();
	for _ in 0..9 {
		processed.push(record_rx.recv_timeout(RECV_TIMEOUT).unwrap());
	}
	assert_eq!(processed, (0..=8u64).collect::<Vec<_>>());
	troupe.send_message(root, Message::go_die()).unwrap();
	troupe.join();
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_messages_queued_before_go_die_are_delivered() {
	let (started_tx, started_rx) = flume::unbounded::<()>();
	let (gate_tx, gate_rx) = flume::unbounded::<()>();
	let (record_tx, record_rx) = flume::unbounded::<u64>();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |_state, _ctx, payload| {
			started_tx.send(()).unwrap();
			gate_rx.recv().unwrap();
			record_tx.send(payload_typed::<u64>(payload).unwrap()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), role).unwrap();
	let root = troupe.root();
	troupe.send_message(root, Message::user(1, 1u64)).unwrap();
	started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	// The go-die only takes effect when dispatched: everything queued around
	// it is still accepted and delivered in order.
	troupe.send_message(root, Message::user(1, 2u64)).unwrap();
	troupe.send_message(root, Message::go_die()).unwrap();
	troupe.send_message(root, Message::user(1, 3u64)).unwrap();
	for _ in 0..3 {
		gate_tx.send(()).unwrap();
	}
	troupe.join();
	assert_eq!(drain(&record_rx), vec![1, 2, 3]);
	// Once the actor died, sends are refused.
	assert_eq!(
		troupe.send_message(root, Message::user(1, 4u64)),
		Err(SendError::TargetDying(root))
	);
}

#[test]
fn test_self_sends_queue_behind_pending_messages() {
	let (started_tx, started_rx) = flume::unbounded::<()>();
	let (gate_tx, gate_rx) = flume::unbounded::<()>();
	let (record_tx, record_rx) = flume::unbounded::<u64>();
	let first_record_tx = record_tx.clone();
	let third_record_tx = record_tx.clone();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |_state, ctx, _payload| {
			started_tx.send(()).unwrap();
			gate_rx.recv().unwrap();
			first_record_tx.send(1).unwrap();
			ctx.send_self(Message::signal(3)).unwrap();
		})
		.handler(move |_state, _ctx, _payload| {
			record_tx.send(2).unwrap();
		})
		.handler(move |_state, ctx, _payload| {
			third_record_tx.send(3).unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), role).unwrap();
	let root = troupe.root();
	troupe.send_message(root, Message::signal(1)).unwrap();
	started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	troupe.send_message(root, Message::signal(2)).unwrap();
	gate_tx.send(()).unwrap();
	troupe.join();
	// The self-send of kind 3 lands behind the already-queued kind 2.
	assert_eq!(drain(&record_rx), vec![1, 2, 3]);
}

#[test]
fn test_hello_is_the_first_message() {
	let (record_tx, record_rx) = flume::unbounded::<&'static str>();
	let hello_record_tx = record_tx.clone();
	let child_role = Role::builder()
		.handler(move |_state, _ctx, _payload| {
			hello_record_tx.send("hello").unwrap();
		})
		.handler(move |_state, ctx, _payload| {
			record_tx.send("one").unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let root_role = Role::builder()
		.handler(move |_state, ctx, _payload| {
			let child = ctx.spawn(child_role.clone()).unwrap();
			// Racing the child's own welcome: the hello was queued before the
			// child id ever escaped, so it cannot lose.
			ctx.send_message(child, Message::signal(1)).unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), root_role).unwrap();
	troupe.join();
	assert_eq!(drain(&record_rx), vec!["hello", "one"]);
}

#[test]
fn test_send_validation() {
	let troupe = Troupe::with_config(test_config(), noop_role()).unwrap();
	let root = troupe.root();
	assert_eq!(
		troupe.send_message(99, Message::signal(0)),
		Err(SendError::UnknownActor(99))
	);
	assert_eq!(
		troupe.send_message(root, Message::signal(5)),
		Err(SendError::InvalidMessageKind { kind: 5, nprompts: 1 })
	);
	troupe.send_message(root, Message::go_die()).unwrap();
	troupe.join();
}

#[test]
fn test_create_validation() {
	assert_eq!(
		Troupe::with_config(TroupeConfig { workers: 0, ..test_config() }, noop_role())
			.err()
			.unwrap(),
		CreateError::NoWorkers
	);
	assert_eq!(
		Troupe::with_config(TroupeConfig { cast_limit: 0, ..test_config() }, noop_role())
			.err()
			.unwrap(),
		CreateError::CastFull
	);
	assert_eq!(
		Troupe::with_config(test_config(), Role::builder().build()).err().unwrap(),
		CreateError::EmptyRole
	);
}

#[test]
fn test_spawn_failure_leaves_the_spawner_alive() {
	let config = TroupeConfig { cast_limit: 2, ..test_config() };
	let (spawned_tx, spawned_rx) = flume::unbounded::<Result<ActorId, SpawnError>>();
	let child_role = Role::builder()
		.handler(|_state, ctx, _payload| {
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |_state, ctx, _payload| {
			spawned_tx.send(ctx.spawn(child_role.clone())).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(config, role).unwrap();
	let root = troupe.root();
	troupe.send_message(root, Message::signal(1)).unwrap();
	assert_eq!(spawned_rx.recv_timeout(RECV_TIMEOUT).unwrap(), Ok(1));
	// Ids are never reused: the dead child still occupies its slot, so the
	// cast is full now.
	troupe.send_message(root, Message::signal(1)).unwrap();
	assert_eq!(spawned_rx.recv_timeout(RECV_TIMEOUT).unwrap(), Err(SpawnError::CastFull(2)));
	// The failed spawn left the root fully operational.
	troupe.send_message(root, Message::signal(1)).unwrap();
	assert_eq!(spawned_rx.recv_timeout(RECV_TIMEOUT).unwrap(), Err(SpawnError::CastFull(2)));
	troupe.send_message(root, Message::go_die()).unwrap();
	troupe.join();
}

#[test]
fn test_join_is_idempotent() {
	let troupe = Troupe::with_config(test_config(), noop_role()).unwrap();
	troupe.send_message(troupe.root(), Message::go_die()).unwrap();
	troupe.join();
	assert_eq!(troupe.alive_count(), 0);
	troupe.join();
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_drop_without_join_winds_the_troupe_down() {
	let troupe = Troupe::with_config(test_config(), noop_role()).unwrap();
	troupe.send_message(troupe.root(), Message::signal(0)).unwrap();
	// No join: dropping must mark the cast dying, drain, and collect the
	// workers without hanging.
	drop(troupe);
}

#[test]
fn test_panicking_handler_takes_its_actor_down() {
	let (started_tx, started_rx) = flume::unbounded::<()>();
	let (gate_tx, gate_rx) = flume::unbounded::<()>();
	let (witness_tx, witness_rx) = flume::unbounded::<()>();
	let role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |_state, _ctx, _payload| {
			started_tx.send(()).unwrap();
			gate_rx.recv().unwrap();
			panic!("scripted failure");
		})
		.handler(move |_state, _ctx, _payload| {
			witness_tx.send(()).unwrap();
		})
		.build();
	let troupe = Troupe::with_config(test_config(), role).unwrap();
	let root = troupe.root();
	troupe.send_message(root, Message::signal(1)).unwrap();
	started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	troupe.send_message(root, Message::signal(2)).unwrap();
	gate_tx.send(()).unwrap();
	troupe.join();
	// The message queued behind the panic still drained before the actor
	// went down.
	assert_eq!(drain(&witness_rx).len(), 1);
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_interrupt_signal_winds_the_troupe_down() {
	setup_logging_for_tests();
	let config = TroupeConfig { catch_signals: true, ..test_config() };
	let (tick_tx, tick_rx) = flume::unbounded::<()>();
	let role = Role::builder()
		.handler(|_state, ctx, _payload| {
			ctx.send_self(Message::signal(1)).unwrap();
		})
		.handler(move |_state, ctx, _payload| {
			let _ = tick_tx.send(());
			// Re-post forever; once the interrupt lands this send is refused
			// and the loop starves out.
			let _ = ctx.send_self(Message::signal(1));
		})
		.build();
	let troupe = Troupe::with_config(config, role).unwrap();
	for _ in 0..20 {
		tick_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	}
	signal_hook::low_level::raise(signal_hook::consts::SIGINT).unwrap();
	troupe.join();
	assert_eq!(troupe.alive_count(), 0);
}

#[test]
fn test_many_senders_keep_per_actor_fifo() {
	setup_logging_for_tests();
	const SENDERS: usize = 8;
	const MESSAGES_PER_SENDER: u64 = 500;
	let config = TroupeConfig { workers: 4, mailbox_capacity: 64, ..test_config() };
	let processed = Arc::new(AtomicUsize::new(0));
	let fifo_violations = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));
	let (targets_tx, targets_rx) = flume::unbounded::<Vec<ActorId>>();

	let handler_processed = processed.clone();
	let handler_fifo_violations = fifo_violations.clone();
	let handler_overlaps = overlaps.clone();
	let busy_flags: Arc<Vec<AtomicUsize>> =
		Arc::new((0..8).map(|_| AtomicUsize::new(0)).collect());
	let handler_busy_flags = busy_flags.clone();
	let counter_role = Role::builder()
		.handler(|_state, _ctx, _payload| {})
		.handler(move |state, ctx, payload| {
			// One handler at a time per actor: entering a busy cell twice
			// means two workers overlapped on the same actor.
			let busy_flag = &handler_busy_flags[ctx.actor_id()];
			if busy_flag.fetch_add(1, Ordering::SeqCst) != 0 {
				handler_overlaps.fetch_add(1, Ordering::SeqCst);
			}
			let (sender, seq) = payload_typed::<(usize, u64)>(payload).unwrap();
			let last_seen: &mut HashMap<usize, u64> = match state {
				Some(boxed_state) => boxed_state.downcast_mut().unwrap(),
				None => {
					*state = Some(Box::<HashMap<usize, u64>>::default());
					state.as_mut().unwrap().downcast_mut().unwrap()
				},
			};
			let expected = last_seen.get(&sender).map(|last| last + 1).unwrap_or(0);
			if seq != expected {
				handler_fifo_violations.fetch_add(1, Ordering::SeqCst);
			}
			last_seen.insert(sender, seq);
			handler_processed.fetch_add(1, Ordering::SeqCst);
			busy_flag.fetch_sub(1, Ordering::SeqCst);
		})
		.build();
	let root_role = Role::builder()
		.handler(move |_state, ctx, _payload| {
			let targets: Vec<ActorId> =
				(0..3).map(|_| ctx.spawn(counter_role.clone()).unwrap()).collect();
			targets_tx.send(targets).unwrap();
			ctx.send_self(Message::go_die()).unwrap();
		})
		.build();

	let troupe = Troupe::with_config(config, root_role).unwrap();
	let targets = targets_rx.recv_timeout(RECV_TIMEOUT).unwrap();
	thread::scope(|scope| {
		for sender in 0..SENDERS {
			let troupe = &troupe;
			let targets = &targets;
			scope.spawn(move || {
				use rand::Rng;
				let mut rng = rand::thread_rng();
				let mut next_seq: HashMap<ActorId, u64> = HashMap::new();
				for _ in 0..MESSAGES_PER_SENDER {
					let target = targets[rng.gen_range(0..targets.len())];
					let seq = next_seq.entry(target).or_insert(0);
					loop {
						match troupe.send_message(target, Message::user(1, (sender, *seq))) {
							Ok(()) => break,
							Err(SendError::MailboxFull(_)) => thread::yield_now(),
							Err(unexpected) => panic!("send failed: {unexpected}"),
						}
					}
					*seq += 1;
				}
			});
		}
	});
	for target in &targets {
		loop {
			match troupe.send_message(*target, Message::go_die()) {
				Ok(()) => break,
				Err(SendError::MailboxFull(_)) => thread::yield_now(),
				Err(unexpected) => panic!("go-die failed: {unexpected}"),
			}
		}
	}
	troupe.join();
	assert_eq!(processed.load(Ordering::SeqCst), SENDERS * MESSAGES_PER_SENDER as usize);
	assert_eq!(fifo_violations.load(Ordering::SeqCst), 0);
	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	assert_eq!(troupe.alive_count(), 0);
}
