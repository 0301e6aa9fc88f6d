use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A coarse progress heartbeat: workers tick once per unit of work, and a
/// single consumer samples every `sample_every` ticks. The channel holds one
/// tick, so producers can only run ahead of the logger by a single unit;
/// that throttling of log noise is the point, not a correctness property.
pub(crate) struct ProgressTicker {
    tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ProgressTicker {
    pub(crate) fn spawn<F>(sample_every: usize, mut report: F) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(async move {
            let mut count = 0usize;
            while rx.recv().await.is_some() {
                count += 1;
                if count % sample_every == 0 {
                    report(count);
                }
            }
        });
        ProgressTicker { tx, task }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<()> {
        self.tx.clone()
    }

    /// Close the tick channel and wait for the consumer to drain.
    pub(crate) async fn finish(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn samples_every_nth_tick() {
        let samples = Arc::new(AtomicUsize::new(0));
        let seen = samples.clone();
        let ticker = ProgressTicker::spawn(4, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let tx = ticker.sender();
        for _ in 0..10 {
            tx.send(()).await.expect("tick");
        }
        drop(tx);
        ticker.finish().await;
        assert_eq!(samples.load(Ordering::SeqCst), 2);
    }
}
