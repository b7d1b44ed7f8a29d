//! In-memory transport pairing for protocol tests.
//!
//! [`mock_pair`] wires a [`MockServerHalf`] and a [`MockClientHalf`] together
//! with three `tokio::sync::mpsc` channels, one per logical stream (§9),
//! each passing through an impairment relay task that can drop and reorder
//! datagrams deterministically (seeded `rand::rngs::StdRng`, per §8.1) — a
//! dropped item on a full queue, or one the impairment discards outright, is
//! equivalent to a network drop and the client/server retry logic handles
//! it exactly as it would a real loss.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use crate::error::TransportError;
use crate::traits::{ClientTransport, ServerTransport};

/// Bounded queue capacity for each logical channel's entrance.
const QUEUE_CAPACITY: usize = 256;

/// An initial, time-bounded drop rate applied before `Impairment`'s steady
/// state kicks in — e.g. "50% drop for the first 5 seconds, then clean".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialDrop {
    /// Drop probability in effect for the first `duration` of the relay's
    /// lifetime, measured from the moment `mock_pair` spawned it.
    pub probability: f64,
    pub duration: Duration,
}

/// Drop/reorder behavior applied uniformly to all three channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impairment {
    /// Steady-state probability in `[0.0, 1.0]` that an in-flight datagram
    /// is dropped, once any `initial_drop` window has elapsed.
    pub drop_probability: f64,
    /// Datagrams are held and emitted in random order within a window of
    /// this many outstanding items. `1` means no reordering.
    pub reorder_window: usize,
    /// Overrides `drop_probability` for a fixed duration at the start of
    /// the relay, then falls back to it. `None` means no such phase.
    pub initial_drop: Option<InitialDrop>,
}

impl Default for Impairment {
    fn default() -> Self {
        Self {
            drop_probability: 0.0,
            reorder_window: 1,
            initial_drop: None,
        }
    }
}

impl Impairment {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn drop_fraction(p: f64) -> Self {
        Self {
            drop_probability: p,
            reorder_window: 1,
            initial_drop: None,
        }
    }

    pub fn reorder(window: usize) -> Self {
        Self {
            drop_probability: 0.0,
            reorder_window: window,
            initial_drop: None,
        }
    }

    /// Drops at `probability` for the first `duration` of the transfer,
    /// then delivers cleanly — the "50% drop of the first 5 seconds of
    /// data, then clean" scenario.
    pub fn drop_then_clean(probability: f64, duration: Duration) -> Self {
        Self {
            drop_probability: 0.0,
            reorder_window: 1,
            initial_drop: Some(InitialDrop {
                probability,
                duration,
            }),
        }
    }
}

/// The server's half of an in-memory transport pair.
pub struct MockServerHalf {
    control_to_server_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    control_to_client_tx: mpsc::Sender<Vec<u8>>,
    data_tx: mpsc::Sender<Vec<u8>>,
}

/// The client's half of an in-memory transport pair.
pub struct MockClientHalf {
    control_to_server_tx: mpsc::Sender<Vec<u8>>,
    control_to_client_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    data_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

/// Builds a connected server/client pair, spawning one impairment relay
/// task per logical channel on the current tokio runtime.
///
/// `seed` makes the injected drop/reorder behavior reproducible across
/// runs — each of the three channels derives its own RNG from `seed` so
/// that reordering one channel doesn't perturb another's sequence.
pub fn mock_pair(impairment: Impairment, seed: u64) -> (MockServerHalf, MockClientHalf) {
    let (c2s_final_tx, c2s_final_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (c2s_raw_tx, c2s_raw_rx) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(relay(c2s_raw_rx, c2s_final_tx, impairment, seed ^ 0x1));

    let (c2c_final_tx, c2c_final_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (c2c_raw_tx, c2c_raw_rx) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(relay(c2c_raw_rx, c2c_final_tx, impairment, seed ^ 0x2));

    let (data_final_tx, data_final_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (data_raw_tx, data_raw_rx) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(relay(data_raw_rx, data_final_tx, impairment, seed ^ 0x3));

    let server = MockServerHalf {
        control_to_server_rx: Mutex::new(c2s_final_rx),
        control_to_client_tx: c2c_raw_tx,
        data_tx: data_raw_tx,
    };
    let client = MockClientHalf {
        control_to_server_tx: c2s_raw_tx,
        control_to_client_rx: Mutex::new(c2c_final_rx),
        data_rx: Mutex::new(data_final_rx),
    };
    (server, client)
}

/// The drop probability in effect `elapsed` after the relay started.
fn effective_drop_probability(impairment: &Impairment, elapsed: Duration) -> f64 {
    match impairment.initial_drop {
        Some(initial) if elapsed < initial.duration => initial.probability,
        _ => impairment.drop_probability,
    }
}

async fn relay(
    mut rx: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::Sender<Vec<u8>>,
    impairment: Impairment,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let window = impairment.reorder_window.max(1);
    let mut pending: Vec<Vec<u8>> = Vec::with_capacity(window);
    let started_at = Instant::now();

    while let Some(item) = rx.recv().await {
        let drop_probability = effective_drop_probability(&impairment, started_at.elapsed());
        if rng.r#gen::<f64>() < drop_probability {
            continue;
        }
        pending.push(item);
        if pending.len() >= window {
            let idx = rng.gen_range(0..pending.len());
            let picked = pending.remove(idx);
            if tx.send(picked).await.is_err() {
                return;
            }
        }
    }

    while !pending.is_empty() {
        let idx = rng.gen_range(0..pending.len());
        let picked = pending.remove(idx);
        if tx.send(picked).await.is_err() {
            return;
        }
    }
}

impl ServerTransport for MockServerHalf {
    async fn recv_control(&self) -> Result<Vec<u8>, TransportError> {
        self.control_to_server_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn send_control(&self, msg: &[u8]) -> Result<(), TransportError> {
        // A full queue is equivalent to a network drop, per §9.
        let _ = self.control_to_client_tx.try_send(msg.to_vec());
        Ok(())
    }

    async fn send_data(&self, msg: &[u8]) -> Result<(), TransportError> {
        let _ = self.data_tx.try_send(msg.to_vec());
        Ok(())
    }
}

impl ClientTransport for MockClientHalf {
    async fn send_control(&self, msg: &[u8]) -> Result<(), TransportError> {
        let _ = self.control_to_server_tx.try_send(msg.to_vec());
        Ok(())
    }

    async fn recv_control(&self) -> Result<Vec<u8>, TransportError> {
        self.control_to_client_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn recv_data(&self) -> Result<Vec<u8>, TransportError> {
        self.data_rx.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_impairment_delivers_everything_in_order() {
        let (server, client) = mock_pair(Impairment::none(), 42);

        for i in 0..10u8 {
            ServerTransport::send_data(&server, &[i]).await.unwrap();
        }
        for i in 0..10u8 {
            let got = ClientTransport::recv_data(&client).await.unwrap();
            assert_eq!(got, vec![i]);
        }
    }

    #[tokio::test]
    async fn full_drop_probability_delivers_nothing() {
        let (server, client) = mock_pair(Impairment::drop_fraction(1.0), 7);
        ServerTransport::send_data(&server, b"lost").await.unwrap();
        drop(server);
        assert!(ClientTransport::recv_data(&client).await.is_err());
    }

    #[test]
    fn effective_drop_probability_uses_initial_window_then_falls_back() {
        let impairment = Impairment::drop_then_clean(1.0, Duration::from_secs(5));
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_secs(0)),
            1.0
        );
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_millis(4999)),
            1.0
        );
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_secs(5)),
            0.0
        );
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_secs(10)),
            0.0
        );
    }

    #[test]
    fn no_initial_drop_always_uses_steady_state_probability() {
        let impairment = Impairment::drop_fraction(0.25);
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_secs(0)),
            0.25
        );
        assert_eq!(
            effective_drop_probability(&impairment, Duration::from_secs(100)),
            0.25
        );
    }

    #[tokio::test]
    async fn phased_drop_blocks_everything_during_the_window_then_delivers_cleanly() {
        let (server, client) =
            mock_pair(Impairment::drop_then_clean(1.0, Duration::from_millis(50)), 11);

        ServerTransport::send_data(&server, b"during-window").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(10), ClientTransport::recv_data(&client))
                .await
                .is_err(),
            "datagram sent during the drop window should not arrive"
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        ServerTransport::send_data(&server, b"after-window").await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), ClientTransport::recv_data(&client))
            .await
            .expect("datagram sent after the drop window should arrive")
            .unwrap();
        assert_eq!(got, b"after-window");
    }
}
