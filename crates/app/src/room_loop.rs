//! Per-room reconciliation loop.
//!
//! One task per room waits on its inbox, the deferred-pass and grace timers,
//! the next window boundary, and the in-flight dispatch. Passes are
//! serialized: at most one dispatch runs at a time, and a new value that
//! differs from the in-flight one supersedes it through the room's
//! [`PassSequence`].

use std::sync::Arc;

use thermo_domain::expr::StateLookup;
use thermo_domain::id::{ActorId, EntityId};
use thermo_domain::room::Room;
use thermo_domain::value::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::dispatcher::{ActorReport, DeliveryOutcome, Dispatch, PassSequence};
use crate::ports::{Actuator, Clock, StateStore};
use crate::reconcile::{Decision, Reconciler};
use crate::snapshot::Snapshot;

/// State the room must see in `enabled_entity` to be scheduled.
pub const ENABLED_STATE: &str = "on";

/// Messages routed to a room loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A watched entity changed.
    EntityChanged(EntityId),
    /// Events may have been lost; run a pass now.
    CatchUp,
}

/// Why a pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassReason {
    Startup,
    Deferred,
    Boundary,
    CatchUp,
}

impl PassReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Deferred => "deferred",
            Self::Boundary => "boundary",
            Self::CatchUp => "catch-up",
        }
    }
}

/// The reconciliation loop of one room.
pub struct RoomLoop<S, A, C> {
    room: Arc<Room>,
    store: Arc<S>,
    actuator: Arc<A>,
    clock: Arc<C>,
    inbox: mpsc::Receiver<RoomEvent>,
    reset_at_startup: bool,
    sequence: PassSequence,
    reconciler: Reconciler,
    in_flight: Option<Dispatch>,
    initial_state_logged: bool,
}

impl<S, A, C> RoomLoop<S, A, C>
where
    S: StateStore + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
{
    #[must_use]
    pub fn new(
        room: Arc<Room>,
        store: Arc<S>,
        actuator: Arc<A>,
        clock: Arc<C>,
        inbox: mpsc::Receiver<RoomEvent>,
        reset_at_startup: bool,
    ) -> Self {
        let reconciler = Reconciler::new(room.rescheduling_delay(), room.grace_period());
        Self {
            room,
            store,
            actuator,
            clock,
            inbox,
            reset_at_startup,
            sequence: PassSequence::default(),
            reconciler,
            in_flight: None,
            initial_state_logged: false,
        }
    }

    /// Run until the inbox closes.
    pub async fn run(mut self) {
        tracing::info!(
            room = %self.room.id(),
            actors = self.room.actors().len(),
            watched = self.room.watched_entities().len(),
            "room loop started"
        );

        if self.reset_at_startup {
            self.pass(PassReason::Startup, true).await;
        } else {
            self.reconciler.entity_changed(Instant::now());
        }

        loop {
            let wakeup = self.reconciler.next_wakeup();
            let boundary = self.next_boundary();

            tokio::select! {
                event = self.inbox.recv() => match event {
                    Some(RoomEvent::EntityChanged(entity_id)) => {
                        tracing::trace!(room = %self.room.id(), %entity_id, "watched entity changed");
                        self.reconciler.entity_changed(Instant::now());
                    }
                    Some(RoomEvent::CatchUp) => self.pass(PassReason::CatchUp, false).await,
                    None => break,
                },
                () = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                    self.pass(PassReason::Deferred, false).await;
                }
                () = sleep_until(boundary.unwrap_or_else(Instant::now)), if boundary.is_some() => {
                    self.pass(PassReason::Boundary, false).await;
                }
                report = next_report(self.in_flight.as_mut()), if self.in_flight.is_some() => {
                    match report {
                        Some(report) => self.handle_report(report),
                        None => self.in_flight = None,
                    }
                }
            }
        }

        tracing::info!(room = %self.room.id(), "room loop stopped");
    }

    /// Next schedule boundary as a tokio instant.
    fn next_boundary(&self) -> Option<Instant> {
        let now = self.clock.now();
        let boundary = self.room.schedule().next_boundary(&now)?;
        let wait = (boundary - now).to_std().unwrap_or_default();
        Some(Instant::now() + wait)
    }

    async fn pass(&mut self, reason: PassReason, force: bool) {
        self.reconciler.pass_started();

        let entities: Vec<EntityId> = self.room.watched_entities().iter().cloned().collect();
        let snapshot = Snapshot::capture(self.store.as_ref(), &entities, self.clock.now()).await;

        if !self.initial_state_logged {
            self.log_initial_state(&snapshot);
            self.initial_state_logged = true;
        }

        if let Some(entity_id) = self.room.enabled_entity() {
            let state = snapshot.state(entity_id.as_str()).ok();
            if state != Some(ENABLED_STATE) {
                tracing::debug!(
                    room = %self.room.id(),
                    %entity_id,
                    state = state.unwrap_or("unavailable"),
                    "room disabled, pass skipped"
                );
                return;
            }
        }

        let resolution = self.room.resolve(&snapshot);
        for error in &resolution.errors {
            tracing::warn!(
                room = %self.room.id(),
                rule = %error.path,
                expression = %error.expression,
                error = %error.error,
                "control rule failed, list stopped"
            );
        }
        tracing::debug!(
            room = %self.room.id(),
            reason = reason.as_str(),
            value = %resolution.value,
            source = %resolution.source,
            "schedule resolved"
        );

        if self.in_flight.is_none()
            && let Some(actor) = self.drifted_actor(&snapshot, &resolution.value)
        {
            tracing::info!(
                room = %self.room.id(),
                %actor,
                "actor state differs from the applied target"
            );
            self.reconciler.actor_drifted();
        }

        match self.reconciler.decide(&resolution.value, Instant::now(), force) {
            Decision::Send => self.dispatch(resolution.value).await,
            Decision::Unchanged => {
                tracing::trace!(room = %self.room.id(), value = %resolution.value, "value unchanged");
            }
            Decision::Suppressed { until } => {
                tracing::debug!(
                    room = %self.room.id(),
                    value = %resolution.value,
                    wait_secs = until.saturating_duration_since(Instant::now()).as_secs(),
                    "change held back by grace period"
                );
            }
        }
    }

    fn log_initial_state(&self, snapshot: &Snapshot) {
        tracing::info!(
            room = %self.room.id(),
            rescheduling_delay_secs = self.room.rescheduling_delay().as_secs(),
            grace_period_secs = self.room.grace_period().as_secs(),
            "room initialized"
        );
        for entity_id in self.room.watched_entities() {
            tracing::info!(
                room = %self.room.id(),
                %entity_id,
                state = snapshot.state(entity_id.as_str()).unwrap_or("unavailable"),
                "initial state"
            );
        }
    }

    /// First actor whose reported mode no longer matches what `value` asks of
    /// it. Actors without a usable state are not considered.
    fn drifted_actor(&self, snapshot: &Snapshot, value: &Value) -> Option<&ActorId> {
        self.room
            .actors()
            .iter()
            .find(|actor| {
                snapshot
                    .state(actor.id().as_str())
                    .is_ok_and(|mode| mode != actor.target_for(value).hvac_mode)
            })
            .map(|actor| actor.id())
    }

    async fn dispatch(&mut self, value: Value) {
        let pass = self.sequence.bump();

        if let Some(mut previous) = self.in_flight.take() {
            tracing::debug!(
                room = %self.room.id(),
                superseded = previous.pass(),
                pass,
                "waiting for superseded dispatch"
            );
            while let Some(report) = previous.next_report().await {
                self.handle_report(report);
            }
        }

        let commands: Vec<_> = self
            .room
            .actors()
            .iter()
            .map(|actor| (actor.clone(), actor.target_for(&value)))
            .collect();
        tracing::info!(room = %self.room.id(), %value, pass, "dispatching");

        self.reconciler.dispatch_started(value);
        self.in_flight = Some(Dispatch::start(
            &self.actuator,
            commands,
            &self.sequence,
            pass,
        ));
    }

    fn handle_report(&mut self, report: ActorReport) {
        match report.result {
            Ok(DeliveryOutcome::Delivered { attempts }) => {
                tracing::info!(
                    room = %self.room.id(),
                    actor = %report.actor,
                    target = %report.target,
                    attempts,
                    "actor updated"
                );
                self.reconciler.delivered(Instant::now());
            }
            Ok(DeliveryOutcome::Superseded { .. }) => {}
            Err(error) => {
                tracing::error!(
                    room = %self.room.id(),
                    actor = %report.actor,
                    error = %error,
                    "giving up on actor until the next pass"
                );
                self.reconciler.delivery_failed();
            }
        }
    }
}

async fn next_report(dispatch: Option<&mut Dispatch>) -> Option<ActorReport> {
    match dispatch {
        Some(dispatch) => dispatch.next_report().await,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde_json::json;
    use thermo_domain::expr::Environment;
    use thermo_domain::id::RoomId;
    use thermo_domain::room::RoomDef;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::ports::TokioClock;
    use crate::testing::{MemoryStore, RecordingActuator, monday_morning};

    struct Harness {
        started: Instant,
        store: Arc<MemoryStore>,
        actuator: Arc<RecordingActuator>,
        events: mpsc::Sender<RoomEvent>,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn start(def: serde_json::Value, reset_at_startup: bool, states: &[(&str, &str)]) -> Self {
            let room = serde_json::from_value::<RoomDef>(def)
                .unwrap()
                .build(RoomId::new("living"), Arc::new(Environment::default()))
                .unwrap();
            let store = Arc::new(MemoryStore::default());
            for (entity_id, state) in states {
                store.set(entity_id, state);
            }
            let actuator = Arc::new(RecordingActuator::default());
            let clock = Arc::new(TokioClock::starting_at(monday_morning()));
            let (events, inbox) = mpsc::channel(16);
            let room_loop = RoomLoop::new(
                Arc::new(room),
                Arc::clone(&store),
                Arc::clone(&actuator),
                clock,
                inbox,
                reset_at_startup,
            );
            Self {
                started: Instant::now(),
                store,
                actuator,
                events,
                task: tokio::spawn(room_loop.run()),
            }
        }

        async fn change(&self, entity_id: &str, state: &str) {
            self.store.set(entity_id, state);
            self.events
                .send(RoomEvent::EntityChanged(EntityId::new(entity_id)))
                .await
                .unwrap();
        }

        async fn advance_to(&self, secs: u64) {
            tokio::time::sleep_until(self.started + Duration::from_secs(secs)).await;
        }

        /// Attempts as (seconds since start, target).
        fn sent(&self) -> Vec<(u64, String)> {
            self.actuator
                .attempts()
                .into_iter()
                .map(|(at, _, target)| ((at - self.started).as_secs(), target))
                .collect()
        }

        async fn stop(self) {
            drop(self.events);
            self.task.await.unwrap();
        }
    }

    fn sent(entries: &[(u64, &str)]) -> Vec<(u64, String)> {
        entries
            .iter()
            .map(|(at, target)| (*at, (*target).to_string()))
            .collect()
    }

    fn presence_room(rescheduling_delay: u64, grace_period: u64) -> serde_json::Value {
        json!({
            "rescheduling_delay": rescheduling_delay,
            "grace_period": grace_period,
            "actors": { "climate.living": {} },
            "schedule": [
                { "x": "Mark(OFF, OVERLAY) if is_state('binary_sensor.door', 'on') else Next()" },
                { "x": "Mark(70) if is_state('person.owner', 'home') else Next()" },
                { "v": 62 },
            ],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn should_send_immediately_at_startup_when_resetting() {
        let harness = Harness::start(presence_room(30, 0), true, &[("person.owner", "away")]);

        harness.advance_to(1).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_coalesce_changes_into_one_deferred_pass() {
        let harness = Harness::start(presence_room(30, 0), false, &[("person.owner", "away")]);

        harness.advance_to(40).await;
        harness.change("person.owner", "home").await;
        harness.advance_to(50).await;
        harness.change("person.owner", "home").await;
        harness.advance_to(100).await;

        assert_eq!(harness.sent(), sent(&[(30, "heat 62"), (70, "heat 70")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_resend_unchanged_value() {
        let harness = Harness::start(presence_room(0, 0), true, &[("person.owner", "away")]);

        harness.advance_to(10).await;
        harness.change("binary_sensor.door", "off").await;
        harness.advance_to(20).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_hold_back_change_until_grace_period_ends() {
        let harness = Harness::start(presence_room(0, 120), true, &[("person.owner", "away")]);

        harness.advance_to(10).await;
        harness.change("person.owner", "home").await;
        harness.advance_to(200).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (120, "heat 70")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_send_overlay_during_grace_period() {
        let harness = Harness::start(presence_room(0, 120), true, &[("person.owner", "away")]);

        harness.advance_to(10).await;
        harness.change("binary_sensor.door", "on").await;
        harness.advance_to(20).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (10, "off")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_passes_while_room_is_disabled() {
        let mut def = presence_room(0, 0);
        def["enabled_entity"] = json!("input_boolean.living_heating");
        let harness = Harness::start(
            def,
            true,
            &[
                ("person.owner", "away"),
                ("input_boolean.living_heating", "off"),
            ],
        );

        harness.advance_to(10).await;
        assert!(harness.sent().is_empty());

        harness.change("input_boolean.living_heating", "on").await;
        harness.advance_to(20).await;

        assert_eq!(harness.sent(), sent(&[(10, "heat 62")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_supersede_failing_dispatch_with_new_value() {
        let mut def = presence_room(0, 0);
        def["actors"] = json!({
            "climate.living": { "send_retries": 7, "send_retry_interval": 1 }
        });
        let harness = Harness::start(def, true, &[("person.owner", "away")]);
        harness.actuator.failing.store(true, Ordering::SeqCst);

        tokio::time::sleep_until(harness.started + Duration::from_millis(2500)).await;
        harness.actuator.failing.store(false, Ordering::SeqCst);
        harness.change("person.owner", "home").await;
        harness.advance_to(10).await;

        assert_eq!(
            harness.sent(),
            sent(&[
                (0, "heat 62"),
                (1, "heat 62"),
                (2, "heat 62"),
                (3, "heat 70"),
            ])
        );
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_resend_after_delivery_gave_up() {
        let mut def = presence_room(0, 0);
        def["actors"] = json!({
            "climate.living": { "send_retries": 0, "send_retry_interval": 1 }
        });
        let harness = Harness::start(def, true, &[("person.owner", "away")]);
        harness.actuator.failing.store(true, Ordering::SeqCst);

        harness.advance_to(5).await;
        harness.actuator.failing.store(false, Ordering::SeqCst);
        harness.change("binary_sensor.door", "off").await;
        harness.advance_to(10).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (5, "heat 62")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_pass_at_window_boundary() {
        let def = json!({
            "actors": { "climate.living": {} },
            "schedule": [
                { "v": 70, "start": "10:01", "end": "11:00" },
                { "v": 62 },
            ],
        });
        let harness = Harness::start(def, true, &[]);

        harness.advance_to(120).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (60, "heat 70")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_pass_on_catch_up() {
        let harness = Harness::start(presence_room(300, 0), true, &[("person.owner", "away")]);

        harness.advance_to(10).await;
        harness.store.set("person.owner", "home");
        harness.events.send(RoomEvent::CatchUp).await.unwrap();
        harness.advance_to(20).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (10, "heat 70")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_read_watched_entity_named_at_runtime() {
        let def = json!({
            "watched_entities": ["sensor.outdoor"],
            "actors": { "climate.living": {} },
            "schedule": [
                { "x": "Mark(float(state('sensor.' + 'outdoor')))" },
                { "v": 62 },
            ],
        });
        let harness = Harness::start(def, true, &[("sensor.outdoor", "75")]);

        harness.advance_to(1).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 75")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_restore_actor_changed_by_hand_after_grace_period() {
        let harness = Harness::start(
            presence_room(0, 120),
            true,
            &[("person.owner", "away"), ("climate.living", "heat")],
        );

        harness.advance_to(10).await;
        harness.change("climate.living", "off").await;
        harness.advance_to(200).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62"), (120, "heat 62")]));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_leave_actor_alone_while_its_mode_matches() {
        let harness = Harness::start(
            presence_room(0, 0),
            true,
            &[("person.owner", "away"), ("climate.living", "heat")],
        );

        harness.advance_to(10).await;
        harness.change("climate.living", "heat").await;
        harness.advance_to(20).await;

        assert_eq!(harness.sent(), sent(&[(0, "heat 62")]));
        harness.stop().await;
    }
}
