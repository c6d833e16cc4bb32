//! Heart-beat pump: periodic EOLs so the broker sees a live client.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use eadms_protocol::frame::HEARTBEAT_EOL;

/// Sends a heart-beat every `period` until cancelled or the writer closes.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if write_tx.send(tungstenite::Message::text(HEARTBEAT_EOL)).await.is_err() {
                    break;
                }
                trace!("heart-beat sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            heartbeat_pump(tx, Duration::from_secs(4), c).await;
        });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test]
    async fn heartbeat_pump_sends_eol_each_period() {
        tokio::time::pause();
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(heartbeat_pump(tx, Duration::from_secs(4), cancel.clone()));

        tokio::time::advance(Duration::from_millis(4001)).await;
        assert_eq!(rx.recv().await, Some(tungstenite::Message::text("\n")));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(rx.recv().await, Some(tungstenite::Message::text("\n")));
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn heartbeat_pump_stops_when_writer_closes() {
        tokio::time::pause();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = tokio::spawn(heartbeat_pump(
            tx,
            Duration::from_secs(1),
            CancellationToken::new(),
        ));
        tokio::time::advance(Duration::from_secs(2)).await;
        handle.await.unwrap();
    }
}
