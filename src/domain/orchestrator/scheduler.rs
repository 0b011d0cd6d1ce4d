use futures::future::join_all;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::clock::Clock;
use crate::domain::orchestrator::decision::{SchedulerPolicy, WindowClass, classify};
use crate::domain::orchestrator::manager::LabManager;
use crate::domain::reservation::Reservation;
use crate::domain::reservation_store::ReservationGateway;

/// The ticking control loop.
///
/// Every tick reads all reservations, classifies each one against the
/// current time, prunes long-expired records, and fans out one task per
/// actionable reservation. The fan-out is joined before the tick reports
/// its summary, so failures and stragglers are observable; the *loop* does
/// not wait for a tick before scheduling the next one, so a straggling tick
/// never delays its successor (idempotent sequences and the per-server lock
/// make the overlap safe).
#[derive(Debug)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
    shutdown: watch::Sender<bool>,
    loop_handle: StdMutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct OrchestratorInner {
    manager: Arc<LabManager>,
    reservations: Arc<dyn ReservationGateway>,
    clock: Arc<dyn Clock>,
    policy: SchedulerPolicy,
}

impl Orchestrator {
    pub fn new(manager: Arc<LabManager>, reservations: Arc<dyn ReservationGateway>, clock: Arc<dyn Clock>) -> Self {
        let policy = manager.policy().clone();
        let (shutdown, _) = watch::channel(false);
        Orchestrator { inner: Arc::new(OrchestratorInner { manager, reservations, clock, policy }), shutdown, loop_handle: StdMutex::new(None) }
    }

    /// Spawns the recurring tick loop. Calling `start` on a running
    /// orchestrator is a no-op.
    pub fn start(&self) {
        let mut handle_guard = self.loop_handle.lock().expect("Mutex poisoned");
        if handle_guard.is_some() {
            log::warn!("scheduler already running, ignoring start");
            return;
        }

        let inner = self.inner.clone();
        let _ = self.shutdown.send_replace(false);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.policy.tick_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::info!("scheduler loop started, tick period {:?}", inner.policy.tick_period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // Each tick runs as its own task so a straggler never
                        // delays the next tick.
                        let inner = inner.clone();
                        tokio::spawn(async move { inner.run_tick().await });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            log::info!("scheduler loop stopped");
        });

        *handle_guard = Some(handle);
    }

    /// Cooperative stop: halts the next scheduled tick. An in-flight tick
    /// finishes on its own; every network call inside it is bounded by its
    /// own timeout.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        // The loop exits via the watch signal on its own; clearing the slot
        // lets a later start() spawn a fresh loop.
        let _ = self.loop_handle.lock().expect("Mutex poisoned").take();
    }

    /// Runs a single tick to completion. Used by the tests and by callers
    /// that want an immediate evaluation outside the timer.
    pub async fn tick_once(&self) {
        self.inner.clone().run_tick().await;
    }
}

impl OrchestratorInner {
    async fn run_tick(self: Arc<Self>) {
        let now = self.clock.now();

        let reservations = match self.reservations.get_all() {
            Ok(reservations) => reservations,
            Err(e) => {
                // Fatal for this tick only; the timer carries on.
                log::error!("tick aborted: could not read reservations: {}", e);
                return;
            }
        };

        log::debug!("tick at {}: evaluating {} reservations", now.format("%Y-%m-%d %H:%M"), reservations.len());

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for reservation in reservations {
            match classify(&reservation, now, &self.policy) {
                WindowClass::Dormant => {}
                WindowClass::Prunable => self.prune(&reservation),
                WindowClass::ShouldBeRunning => {
                    let inner = self.clone();
                    tasks.push(tokio::spawn(async move { inner.drive(reservation, WindowClass::ShouldBeRunning).await }));
                }
                WindowClass::ShouldBeStopped => {
                    let inner = self.clone();
                    tasks.push(tokio::spawn(async move { inner.drive(reservation, WindowClass::ShouldBeStopped).await }));
                }
            }
        }

        if tasks.is_empty() {
            return;
        }

        let task_count = tasks.len();
        for result in join_all(tasks).await {
            if let Err(e) = result {
                // A panic in one reservation's task must not poison the tick.
                log::error!("reservation task aborted: {}", e);
            }
        }

        log::debug!("tick finished, {} reservation sequences evaluated", task_count);
    }

    /// Pruning is independent of any start/stop outcome: the record is long
    /// expired, delete it and move on.
    fn prune(&self, reservation: &Reservation) {
        match self.reservations.delete(reservation.id) {
            Ok(()) => log::info!("pruned reservation {} (user '{}', ended {})", reservation.id, reservation.user, reservation.end),
            Err(e) => log::error!("could not prune reservation {}: {}", reservation.id, e),
        }
    }

    /// One reservation's sequence. Failures are logged and die here; they
    /// never abort the evaluation of other reservations in the same tick.
    async fn drive(&self, reservation: Reservation, class: WindowClass) {
        let report = match class {
            WindowClass::ShouldBeRunning => self.manager.start_lab(reservation.server_id, &reservation.lab_id).await,
            WindowClass::ShouldBeStopped => self.manager.stop_lab(reservation.server_id, &reservation.lab_id).await,
            _ => return,
        };

        if !report.ok {
            log::warn!(
                "reservation {} (user '{}'): lab '{}' on server {} could not be driven to its booked state: {}",
                reservation.id,
                reservation.user,
                reservation.lab_id,
                reservation.server_id,
                report.reason.unwrap_or_else(|| "unspecified".to_string())
            );
        }
    }
}
