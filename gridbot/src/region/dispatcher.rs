use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tracing::{Instrument, error, info, warn};

use corelib::models::RegionId;

use crate::logger::{region_span, warn_if_slow};
use crate::mastodon::Publisher;
use crate::metrics::Counters;

const SLOW_PUBLISH: Duration = Duration::from_secs(5);

/// Delivers one region's queued messages, one at a time.
///
/// A failed post is logged and forgotten. The worker has already recorded the
/// announcement, so the next interesting change produces a fresh message.
pub struct Dispatcher<P: Publisher> {
    region: RegionId,
    publisher: P,
    counters: Counters,
}

impl<P: Publisher> Dispatcher<P> {
    pub fn new(region: RegionId, publisher: P, counters: Counters) -> Self {
        Self {
            region,
            publisher,
            counters,
        }
    }

    /// Publishes a single message. Returns whether it went out.
    pub async fn dispatch(&mut self, status: &str) -> bool {
        match warn_if_slow("publish", SLOW_PUBLISH, self.publisher.publish(status)).await {
            Ok(()) => {
                Counters::incr(&self.counters.dispatch_succeeded);
                true
            }
            Err(e) => {
                Counters::incr(&self.counters.dispatch_failed);
                error!(region = %self.region, error = %e, "failed to send toot");
                false
            }
        }
    }

    /// Drains the queue until every sender is gone.
    pub async fn run(mut self, mut rx: Receiver<String>) {
        let span = region_span("dispatcher", self.region);

        async move {
            info!("dispatcher started");
            while let Some(status) = rx.recv().await {
                self.dispatch(&status).await;
            }
            warn!("dispatcher exiting");
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    use crate::mastodon::PublishError;

    struct FlakyPublisher {
        calls: Arc<AtomicUsize>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&mut self, _: &str) -> Result<(), PublishError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(n) {
                Err(PublishError::StatusRejected(503))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failure_is_logged_and_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counters = Counters::default();
        let mut dispatcher = Dispatcher::new(
            RegionId::Qld1,
            FlakyPublisher {
                calls: calls.clone(),
                fail_on_call: Some(1),
            },
            counters.clone(),
        );

        assert!(!dispatcher.dispatch("peak").await);

        assert_eq!(calls.load(Ordering::SeqCst), 1, "must not retry within a dispatch");
        assert_eq!(Counters::get(&counters.dispatch_failed), 1);
        assert!(logs_contain("failed to send toot"));
    }

    #[tokio::test]
    async fn keeps_draining_after_a_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counters = Counters::default();
        let dispatcher = Dispatcher::new(
            RegionId::Sa1,
            FlakyPublisher {
                calls: calls.clone(),
                fail_on_call: Some(2),
            },
            counters.clone(),
        );

        let (tx, rx) = mpsc::channel(8);
        for m in ["one", "two", "three"] {
            tx.send(m.to_string()).await.unwrap();
        }
        drop(tx);

        dispatcher.run(rx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(Counters::get(&counters.dispatch_succeeded), 2);
        assert_eq!(Counters::get(&counters.dispatch_failed), 1);
    }
}
