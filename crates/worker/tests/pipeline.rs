use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use corral_barrier::strategy::{CorrelationIdStrategy, SequenceSizeStrategy};
use corral_barrier::{Barrier, BarrierConfig, Message, MessageGroupStore};
use corral_worker::{Poller, PollerConfig, PollerExit};
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequences_flow_from_producers_to_the_consumer() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let barrier_config = BarrierConfig::from_toml_str("token_policy = \"validated\"\n").unwrap();
	let barrier: Arc<Barrier<String, Message<String>>> =
		Arc::new(Barrier::from_config(&barrier_config, CorrelationIdStrategy, SequenceSizeStrategy));
	let poller_config = PollerConfig::from_toml_str("interval_ms = 1\nmax_messages_per_poll = 16\n").unwrap();

	let (tx, mut rx) = mpsc::channel(4);
	let handle = Poller::new(Arc::clone(&barrier), poller_config).unwrap().spawn(tx);

	let producers: Vec<_> = ["order-1", "order-2", "order-3"]
		.into_iter()
		.map(|order| {
			let barrier = Arc::clone(&barrier);
			tokio::task::spawn_blocking(move || {
				for n in 1..=3 {
					let msg = Message::builder(format!("{order}/{n}")).correlation_id(order).sequence(n, 3).build();
					barrier.admit(msg).unwrap();
				}
			})
		})
		.collect();
	for producer in producers {
		producer.await.unwrap();
	}

	let mut seen: HashMap<String, Vec<String>> = HashMap::new();
	for _ in 0..9 {
		let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
		let order = msg.headers().correlation_id().unwrap().to_owned();
		seen.entry(order).or_default().push(msg.payload().clone());
	}
	assert_eq!(seen.len(), 3);
	for (order, payloads) in &seen {
		let expected: Vec<_> = (1..=3).map(|n| format!("{order}/{n}")).collect();
		assert_eq!(payloads, &expected);
	}

	tokio::time::timeout(Duration::from_secs(5), async {
		while !barrier.pending_keys().is_empty() {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.unwrap();
	assert!(rx.try_recv().is_err());

	let report = handle.shutdown().await.unwrap();
	assert_eq!(report.released, 9);
	assert_eq!(report.exit, PollerExit::Cancelled);
	assert_eq!(barrier.store().group_count(), 0);
}
