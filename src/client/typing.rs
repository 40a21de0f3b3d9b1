use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::websocket::types::ClientEvent;

/// Trailing window after the last keystroke before `typing_stop` fires.
pub const TYPING_IDLE_WINDOW: Duration = Duration::from_secs(2);

/// Debounces outbound typing signals per conversation: `typing_start` on
/// the first keystroke after idle, `typing_stop` on send or after the idle
/// window, whichever comes first.
pub struct TypingDebouncer {
    outbound: mpsc::Sender<ClientEvent>,
    idle_window: Duration,
    pending: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl TypingDebouncer {
    pub fn new(outbound: mpsc::Sender<ClientEvent>) -> Self {
        Self::with_idle_window(outbound, TYPING_IDLE_WINDOW)
    }

    pub fn with_idle_window(outbound: mpsc::Sender<ClientEvent>, idle_window: Duration) -> Self {
        Self {
            outbound,
            idle_window,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn keystroke(&self, conversation_id: Uuid) {
        let was_idle = {
            let mut pending = self.pending.lock().await;

            let was_idle = match pending.remove(&conversation_id) {
                Some(timer) => {
                    // Still typing: reset the trailing timer.
                    timer.abort();
                    false
                }
                None => true,
            };

            let outbound = self.outbound.clone();
            let registry = Arc::clone(&self.pending);
            let window = self.idle_window;
            let timer = tokio::spawn(async move {
                tokio::time::sleep(window).await;
                registry.lock().await.remove(&conversation_id);
                let _ = outbound
                    .send(ClientEvent::TypingStop { conversation_id })
                    .await;
            });
            pending.insert(conversation_id, timer);

            was_idle
        };

        if was_idle {
            let _ = self
                .outbound
                .send(ClientEvent::TypingStart { conversation_id })
                .await;
        }
    }

    /// A message went out: stop immediately and cancel the trailing timer.
    pub async fn message_sent(&self, conversation_id: Uuid) {
        let pending_timer = self.pending.lock().await.remove(&conversation_id);

        if let Some(timer) = pending_timer {
            timer.abort();
            let _ = self
                .outbound
                .send(ClientEvent::TypingStop { conversation_id })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> (TypingDebouncer, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (
            TypingDebouncer::with_idle_window(tx, Duration::from_secs(2)),
            rx,
        )
    }

    async fn expect_event(rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
        // The paused clock auto-advances whenever every task is idle, so
        // waiting on the channel also waits out any pending timer.
        rx.recv().await.expect("expected a typing event")
    }

    #[tokio::test(start_paused = true)]
    async fn first_keystroke_starts_then_idle_stops() {
        let (debouncer, mut rx) = debouncer();
        let conversation_id = Uuid::new_v4();

        debouncer.keystroke(conversation_id).await;

        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStart { .. }
        ));
        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStop { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_keystrokes_emit_a_single_start() {
        let (debouncer, mut rx) = debouncer();
        let conversation_id = Uuid::new_v4();

        for _ in 0..5 {
            debouncer.keystroke(conversation_id).await;
            tokio::time::advance(Duration::from_millis(500)).await;
        }

        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStart { .. }
        ));
        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStop { .. }
        ));
        assert!(rx.try_recv().is_err(), "one start/stop pair per burst");
    }

    #[tokio::test(start_paused = true)]
    async fn send_stops_immediately_and_cancels_the_timer() {
        let (debouncer, mut rx) = debouncer();
        let conversation_id = Uuid::new_v4();

        debouncer.keystroke(conversation_id).await;
        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStart { .. }
        ));

        debouncer.message_sent(conversation_id).await;
        assert!(matches!(
            expect_event(&mut rx).await,
            ClientEvent::TypingStop { .. }
        ));

        // The aborted timer must not produce a second stop.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn send_without_typing_emits_nothing() {
        let (debouncer, mut rx) = debouncer();

        debouncer.message_sent(Uuid::new_v4()).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_are_debounced_independently() {
        let (debouncer, mut rx) = debouncer();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        debouncer.keystroke(first).await;
        debouncer.keystroke(second).await;

        let mut starts = Vec::new();
        for _ in 0..2 {
            match expect_event(&mut rx).await {
                ClientEvent::TypingStart { conversation_id } => starts.push(conversation_id),
                other => panic!("expected typing_start, got {:?}", other),
            }
        }
        assert!(starts.contains(&first) && starts.contains(&second));
    }
}
