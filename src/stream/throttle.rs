//! Latest-wins rate limiting for sample streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most once per `period`
    ///
    /// Items arriving between emissions replace each other; only the latest
    /// is yielded when the period elapses.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`]
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        upstream_done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval(period);
        // A late consumer gets one item, not a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, upstream_done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything ready, keeping only the latest
        while !*this.upstream_done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.upstream_done = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            return if *this.upstream_done { Poll::Ready(None) } else { Poll::Pending };
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(this.pending.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_latest() {
        let (tx, rx) = mpsc::channel(16);
        let mut throttled = ReceiverStream::new(rx).throttle(Duration::from_millis(100));

        tx.send(1).await.unwrap();
        // The first tick is immediate
        assert_eq!(throttled.next().await, Some(1));

        for i in 2..=5 {
            tx.send(i).await.unwrap();
        }
        let start = tokio::time::Instant::now();
        assert_eq!(throttled.next().await, Some(5));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_upstream_does_not_end_the_stream() {
        let (tx, rx) = mpsc::channel(4);
        let mut throttled = ReceiverStream::new(rx).throttle(Duration::from_millis(10));

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send(42).await.unwrap();
        });

        assert_eq!(throttled.next().await, Some(42));
        sender.await.unwrap();
        assert_eq!(throttled.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn final_item_is_delivered_after_upstream_ends() {
        let stream = futures::stream::iter(vec![1, 2, 3]).throttle(Duration::from_millis(50));
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![3]);
    }
}
