//! Fault-injecting transport for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the reliability
//! mechanisms without depending on actual network conditions, [`Simulator`]
//! wraps any [`Transport`] and intercepts sends, applying a fault model:
//!
//! | Fault       | Description                                            |
//! |-------------|--------------------------------------------------------|
//! | Script      | Explicit per-send [`Fault`]s, consumed first in order. |
//! | Packet loss | Drop a datagram with probability `loss_rate`.          |
//! | Duplication | Deliver a datagram twice with `duplicate_rate`.        |
//!
//! Randomness comes from a seeded [`StdRng`], so a failing run replays
//! exactly.  Receives pass straight through; wrap both ends to fault both
//! directions.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::socket::Transport;

/// What happens to a single outbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Deliver,
    Drop,
    Duplicate,
}

/// Configuration for the fault-injection model.
///
/// Probabilities are clamped to `[0.0, 1.0]` when the simulator is built.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a delivered datagram is sent twice.
    pub duplicate_rate: f64,
    /// Faults applied to the first sends, before the random model kicks in.
    pub script: Vec<Fault>,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            script: Vec::new(),
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Random loss and duplication with a fixed seed.
    pub fn lossy(loss_rate: f64, duplicate_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            duplicate_rate,
            seed,
            ..Self::default()
        }
    }

    /// Only the scripted faults; everything after the script is delivered.
    pub fn scripted(script: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Counters of what the simulator did to outbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulatorStats {
    /// Datagrams handed to the simulator.
    pub offered: u64,
    pub dropped: u64,
    pub duplicated: u64,
}

#[derive(Debug)]
struct FaultState {
    rng: StdRng,
    script: VecDeque<Fault>,
    stats: SimulatorStats,
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    loss_rate: f64,
    duplicate_rate: f64,
    state: Mutex<FaultState>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        Self {
            inner,
            loss_rate: probability(config.loss_rate),
            duplicate_rate: probability(config.duplicate_rate),
            state: Mutex::new(FaultState {
                rng: StdRng::seed_from_u64(config.seed),
                script: config.script.into(),
                stats: SimulatorStats::default(),
            }),
        }
    }

    pub fn stats(&self) -> SimulatorStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, FaultState> {
        // A panic while holding the lock cannot leave FaultState inconsistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_fault(&self) -> Fault {
        let mut state = self.lock();
        state.stats.offered += 1;
        let fault = match state.script.pop_front() {
            Some(fault) => fault,
            None if state.rng.gen_bool(self.loss_rate) => Fault::Drop,
            None if state.rng.gen_bool(self.duplicate_rate) => Fault::Duplicate,
            None => Fault::Deliver,
        };
        match fault {
            Fault::Drop => state.stats.dropped += 1,
            Fault::Duplicate => state.stats.duplicated += 1,
            Fault::Deliver => {}
        }
        fault
    }
}

/// Clamp a configured rate into `[0.0, 1.0]`; NaN means never.
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl<T: Transport> Transport for Simulator<T> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        match self.next_fault() {
            Fault::Drop => {
                log::trace!("[sim] drop {} bytes to {dest}", buf.len());
                Ok(buf.len())
            }
            Fault::Deliver => self.inner.send_to(buf, dest).await,
            Fault::Duplicate => {
                log::trace!("[sim] duplicate {} bytes to {dest}", buf.len());
                self.inner.send_to(buf, dest).await?;
                self.inner.send_to(buf, dest).await
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{recv_until, Socket};
    use std::time::Duration;
    use tokio::time::Instant;

    async fn pair(config: SimulatorConfig) -> (Simulator<Socket>, Socket) {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        (Simulator::new(a, config), b)
    }

    async fn drain(sock: &Socket) -> Vec<Vec<u8>> {
        let mut got = Vec::new();
        let mut buf = [0u8; 64];
        let deadline = Instant::now() + Duration::from_millis(100);
        while let Some((n, _)) = recv_until(sock, &mut buf, deadline).await.unwrap() {
            got.push(buf[..n].to_vec());
        }
        got
    }

    #[tokio::test]
    async fn script_is_applied_in_order() {
        let (sim, b) = pair(SimulatorConfig::scripted([
            Fault::Drop,
            Fault::Duplicate,
            Fault::Deliver,
        ]))
        .await;
        for msg in [b"one".as_slice(), b"two", b"three", b"four"] {
            sim.send_to(msg, b.local_addr).await.unwrap();
        }
        let got = drain(&b).await;
        assert_eq!(got, vec![b"two".to_vec(), b"two".to_vec(), b"three".to_vec(), b"four".to_vec()]);
        assert_eq!(
            sim.stats(),
            SimulatorStats {
                offered: 4,
                dropped: 1,
                duplicated: 1
            }
        );
    }

    #[tokio::test]
    async fn same_seed_same_faults() {
        let run = |seed| async move {
            let (sim, b) = pair(SimulatorConfig::lossy(0.3, 0.2, seed)).await;
            for i in 0..50u8 {
                sim.send_to(&[i], b.local_addr).await.unwrap();
            }
            sim.stats()
        };
        assert_eq!(run(7).await, run(7).await);
    }

    #[tokio::test]
    async fn out_of_range_rates_are_clamped() {
        let (sim, b) = pair(SimulatorConfig::lossy(1.5, -0.5, 3)).await;
        for i in 0..10u8 {
            sim.send_to(&[i], b.local_addr).await.unwrap();
        }
        assert_eq!(sim.stats().dropped, 10);
        assert!(drain(&b).await.is_empty());

        let (sim, b) = pair(SimulatorConfig::lossy(f64::NAN, -2.0, 3)).await;
        sim.send_to(b"kept", b.local_addr).await.unwrap();
        assert_eq!(drain(&b).await, vec![b"kept".to_vec()]);
    }

    #[tokio::test]
    async fn default_is_pass_through() {
        let (sim, b) = pair(SimulatorConfig::default()).await;
        sim.send_to(b"hello", b.local_addr).await.unwrap();
        assert_eq!(drain(&b).await, vec![b"hello".to_vec()]);
        assert_eq!(sim.stats().dropped, 0);
    }
}
