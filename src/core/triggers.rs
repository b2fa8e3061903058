//! Trigger sources feeding the controller's channel

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, trace};

use crate::types::Trigger;

/// Collapses bursts of input pokes into one [`Trigger::Input`] once the
/// input has been quiet for the debounce delay.
#[derive(Debug)]
pub struct Debouncer {
    pokes: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    pub fn spawn(delay: Duration, out: mpsc::Sender<Trigger>) -> Self {
        let (pokes, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    tokio::select! {
                        poke = rx.recv() => match poke {
                            Some(()) => trace!("debounce restarted"),
                            None => return,
                        },
                        _ = sleep(delay) => break,
                    }
                }
                debug!(delay_ms = delay.as_millis() as u64, "input settled");
                if out.send(Trigger::Input).await.is_err() {
                    return;
                }
            }
        });
        Self { pokes, task }
    }

    /// Record an input event; restarts the quiet period
    pub fn poke(&self) {
        let _ = self.pokes.send(());
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Emit [`Trigger::Poll`] every `period`, first one after a full period.
/// Stops when the receiving side is gone.
pub fn spawn_poller(period: Duration, out: mpsc::Sender<Trigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if out.send(Trigger::Poll).await.is_err() {
                debug!("poller stopped");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_burst_collapses_to_one_trigger() {
        let (tx, mut rx) = mpsc::channel(8);
        let debouncer = Debouncer::spawn(Duration::from_millis(40), tx);
        for _ in 0..5 {
            debouncer.poke();
        }
        let first = timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert_eq!(first, Some(Trigger::Input));
        assert!(timeout(Duration::from_millis(120), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_separate_bursts_emit_separately() {
        let (tx, mut rx) = mpsc::channel(8);
        let debouncer = Debouncer::spawn(Duration::from_millis(20), tx);
        debouncer.poke();
        let fired = timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert_eq!(fired, Some(Trigger::Input));
        debouncer.poke();
        let fired = timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert_eq!(fired, Some(Trigger::Input));
    }

    #[tokio::test]
    async fn test_poller_ticks() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_poller(Duration::from_millis(20), tx);
        for _ in 0..2 {
            let trigger = timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
            assert_eq!(trigger, Some(Trigger::Poll));
        }
        drop(rx);
        assert!(timeout(Duration::from_millis(500), handle).await.is_ok());
    }
}
