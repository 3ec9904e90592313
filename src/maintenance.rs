//! Background maintenance: idle cleanup, health checks and config hot reload
//!
//! One task per pool. It owns both periodic timers and the inbox of pending
//! configuration updates, so a reload is never applied in the middle of a
//! cleanup or health-check pass.

use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PoolConfiguration;
use crate::pool::PoolInner;

/// Upper bound on objects taken out of the store per maintenance pass
pub(crate) const MAINTENANCE_BATCH: usize = 100;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timer periods derived from a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cadence {
    cleanup: Duration,
    health_check: Option<Duration>,
}

impl Cadence {
    pub fn of<T>(config: &PoolConfiguration<T>) -> Self {
        Self {
            cleanup: (config.max_idle_time / 2).max(MIN_PERIOD),
            health_check: config
                .effective_health_check_interval()
                .map(|interval| interval.max(MIN_PERIOD)),
        }
    }
}

fn ticker(period: Duration) -> Interval {
    // First tick one period from now, not immediately.
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub(crate) fn spawn<T: Send + 'static>(
    runtime: &Handle,
    pool: Weak<PoolInner<T>>,
    inbox: mpsc::UnboundedReceiver<PoolConfiguration<T>>,
    shutdown: CancellationToken,
    cadence: Cadence,
) -> JoinHandle<()> {
    runtime.spawn(run(pool, inbox, shutdown, cadence))
}

async fn run<T: Send + 'static>(
    pool: Weak<PoolInner<T>>,
    mut inbox: mpsc::UnboundedReceiver<PoolConfiguration<T>>,
    shutdown: CancellationToken,
    mut cadence: Cadence,
) {
    let mut cleanup = ticker(cadence.cleanup);
    let mut health = cadence.health_check.map(ticker);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            update = inbox.recv() => {
                let Some(config) = update else { break };
                let Some(pool) = pool.upgrade() else { break };
                let next = Cadence::of(&config);
                pool.apply_config(config);

                cleanup = ticker(next.cleanup);
                if next.health_check != cadence.health_check {
                    health = next.health_check.map(ticker);
                }
                debug!(?next, "maintenance cadence updated");
                cadence = next;
            }
            _ = cleanup.tick() => {
                let Some(pool) = pool.upgrade() else { break };
                pool.evict_idle();
            }
            _ = next_tick(&mut health) => {
                let Some(pool) = pool.upgrade() else { break };
                pool.run_health_check();
            }
        }
    }
    debug!("pool maintenance stopped");
}
