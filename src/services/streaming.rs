//! Streaming Channel: a bounded, ordered, single-consumer
//! channel of `PipelineEvent`s. Back-pressure is structural — the
//! orchestrator `.send().await`s and simply doesn't advance until the
//! channel accepts the event; a full buffer blocks the sender, never
//! drops an event.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::PipelineEvent;

pub const DEFAULT_BUFFER: usize = 16;

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PipelineEvent>,
}

impl EventSender {
    /// `Err` means the consumer has dropped the receiving end; callers
    /// must treat this as a cancellation signal.
    pub async fn send(&self, event: PipelineEvent) -> Result<(), ()> {
        self.tx.send(event).await.map_err(|_| ())
    }
}

pub fn channel(buffer: usize) -> (EventSender, ReceiverStream<PipelineEvent>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender { tx }, ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn events_are_received_in_send_order() {
        let (sender, mut stream) = channel(4);
        sender.send(PipelineEvent::connection("s1")).await.unwrap();
        sender.send(PipelineEvent::progress("intent_detection", "classifying", 10)).await.unwrap();
        drop(sender);

        let first = stream.next().await.unwrap();
        assert!(matches!(first, PipelineEvent::Connection { .. }));
        let second = stream.next().await.unwrap();
        assert_eq!(second.progress_value(), Some(10));
        assert!(stream.next().await.is_none());
    }
}
