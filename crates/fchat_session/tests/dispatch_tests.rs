use std::sync::Arc;
use std::time::Duration;

use fchat_protocol::{CommandCode, RawCommand};
use fchat_session::{CommandHandler, CommandQueue, Dispatcher, Disposition, MAX_DISPATCH_ATTEMPTS};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn command(code: &str, n: u64) -> RawCommand {
	let mut args = Map::new();
	args.insert("n".to_string(), json!(n));
	RawCommand::new(CommandCode::parse(code).expect("code"), args)
}

fn seq(raw: &RawCommand) -> u64 {
	raw.get("n").and_then(Value::as_u64).expect("sequence number")
}

/// Records every invocation and answers according to a per-code script.
#[derive(Clone, Default)]
struct Recorder {
	seen: Arc<Mutex<Vec<(String, u64)>>>,
	requeue_first: Arc<Mutex<Vec<u64>>>,
}

impl Recorder {
	fn seen(&self) -> Vec<(String, u64)> {
		self.seen.lock().clone()
	}
}

impl CommandHandler for Recorder {
	type Error = String;

	fn handle(&mut self, command: &RawCommand) -> Result<Disposition, String> {
		let n = seq(command);
		self.seen.lock().push((command.code.as_str().to_string(), n));

		if command.code.is("ERR") {
			return Err(format!("handler failed on {n}"));
		}
		if command.code.is("RQU") {
			return Ok(Disposition::Requeue);
		}
		let mut pending = self.requeue_first.lock();
		if let Some(pos) = pending.iter().position(|p| *p == n) {
			pending.remove(pos);
			return Ok(Disposition::Requeue);
		}
		Ok(Disposition::Done)
	}
}

proptest! {
	#[test]
	fn commands_are_handled_in_arrival_order(count in 0usize..64) {
		let (queue, rx) = CommandQueue::new();
		let recorder = Recorder::default();
		let mut dispatcher = Dispatcher::new(recorder.clone(), queue.clone(), rx);

		for n in 0..count as u64 {
			queue.enqueue(command("MSG", n));
		}
		prop_assert_eq!(dispatcher.drain_pending(), count);

		let order: Vec<u64> = recorder.seen().into_iter().map(|(_, n)| n).collect();
		prop_assert_eq!(order, (0..count as u64).collect::<Vec<_>>());
	}
}

#[test]
fn handler_errors_do_not_stop_the_queue() {
	let (queue, rx) = CommandQueue::new();
	let recorder = Recorder::default();
	let mut dispatcher = Dispatcher::new(recorder.clone(), queue.clone(), rx);

	queue.enqueue(command("MSG", 1));
	queue.enqueue(command("ERR", 2));
	queue.enqueue(command("MSG", 3));

	assert_eq!(dispatcher.drain_pending(), 3);
	let order: Vec<u64> = recorder.seen().into_iter().map(|(_, n)| n).collect();
	assert_eq!(order, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn unresolved_command_is_dropped_after_max_attempts() {
	let (queue, rx) = CommandQueue::new();
	let recorder = Recorder::default();
	tokio::spawn(Dispatcher::new(recorder.clone(), queue.clone(), rx).run());

	queue.enqueue(command("RQU", 7));
	tokio::time::sleep(Duration::from_secs(30)).await;

	assert_eq!(recorder.seen().len(), MAX_DISPATCH_ATTEMPTS as usize);
}

#[tokio::test(start_paused = true)]
async fn requeued_command_goes_behind_later_arrivals() {
	let (queue, rx) = CommandQueue::new();
	let recorder = Recorder::default();
	recorder.requeue_first.lock().push(1);
	tokio::spawn(Dispatcher::new(recorder.clone(), queue.clone(), rx).run());

	queue.enqueue(command("MSG", 1));
	queue.enqueue(command("MSG", 2));

	tokio::time::sleep(Duration::from_millis(100)).await;
	let early: Vec<u64> = recorder.seen().into_iter().map(|(_, n)| n).collect();
	assert_eq!(early, vec![1, 2]);

	tokio::time::sleep(Duration::from_secs(1)).await;
	let all: Vec<u64> = recorder.seen().into_iter().map(|(_, n)| n).collect();
	assert_eq!(all, vec![1, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn attempt_limit_is_configurable() {
	let (queue, rx) = CommandQueue::new();
	let recorder = Recorder::default();
	let dispatcher = Dispatcher::new(recorder.clone(), queue.clone(), rx)
		.with_max_attempts(2)
		.with_requeue_delay(Duration::from_millis(10));
	tokio::spawn(dispatcher.run());

	queue.enqueue(command("RQU", 1));
	tokio::time::sleep(Duration::from_secs(1)).await;

	assert_eq!(recorder.seen().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dispatcher_stops_once_every_queue_handle_is_dropped() {
	let (queue, rx) = CommandQueue::new();
	let recorder = Recorder::default();
	let task = tokio::spawn(Dispatcher::new(recorder.clone(), queue.clone(), rx).run());

	queue.enqueue(command("MSG", 1));
	drop(queue);

	tokio::time::timeout(Duration::from_secs(5), task)
		.await
		.expect("dispatcher still running")
		.expect("dispatcher panicked");
	assert_eq!(recorder.seen().len(), 1);
}
