//! Windowed batch scheduler. The queue is drained front-to-back in windows of
//! `batch_size`; every item in a window runs concurrently and the next window
//! only starts once the current one has fully settled. Each browser tab is an
//! expensive resource, so the window size is the hard concurrency cap.

use std::future::Future;

use futures::future::join_all;

/// Result of one lesson's pass through the download pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// Output file was already present, the fetch never started.
	Skipped,
	Saved,
	Failed(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
	pub saved: usize,
	pub skipped: usize,
	pub failed: usize,
}

impl Tally {
	pub fn record(&mut self, outcome: &Outcome) {
		match outcome {
			Outcome::Saved => self.saved += 1,
			Outcome::Skipped => self.skipped += 1,
			Outcome::Failed(_) => self.failed += 1,
		}
	}

	pub fn total(&self) -> usize {
		self.saved + self.skipped + self.failed
	}
}

/// Drains `queue`, invoking `process` once per item. Items never outlive their
/// window: a failure stays in its own `Outcome` and neither stops siblings nor
/// later windows. Outcomes are returned in queue order. An empty queue is a
/// no-op and `batch_size` 0 is treated as 1.
pub async fn drain<T, F, Fut>(mut queue: Vec<T>, batch_size: usize, mut process: F) -> Vec<Outcome>
where
	F: FnMut(T) -> Fut,
	Fut: Future<Output = Outcome>,
{
	let batch_size = batch_size.max(1);
	let mut outcomes = Vec::with_capacity(queue.len());
	while !queue.is_empty() {
		let take = batch_size.min(queue.len());
		let window = queue.drain(..take).collect::<Vec<_>>();
		outcomes.extend(join_all(window.into_iter().map(&mut process)).await);
	}
	outcomes
}
