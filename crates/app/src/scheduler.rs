//! Scheduler — compiles the rooms and routes state changes to them.
//!
//! Every room runs in its own [`RoomLoop`] task. A single router task reads
//! the event bus and forwards each change to the rooms watching the entity.
//! When the router falls behind the bus, every room gets a catch-up pass.

use std::sync::Arc;

use thermo_domain::error::ConfigError;
use thermo_domain::event::StateChanged;
use thermo_domain::expr::Environment;
use thermo_domain::id::RoomId;
use thermo_domain::room::{Room, RoomDef};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::ports::{Actuator, Clock, StateStore};
use crate::room_loop::{RoomEvent, RoomLoop};

/// Default capacity of each room inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Rooms that compiled, and rooms disabled by a configuration error.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub rooms: Vec<Arc<Room>>,
    pub disabled: Vec<(RoomId, ConfigError)>,
}

impl StartupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.disabled.is_empty()
    }
}

/// Compile every room definition.
///
/// A room that fails to compile is disabled and logged; the others are
/// unaffected.
#[must_use]
pub fn compile_rooms<'a, I>(defs: I, env: &Arc<Environment>) -> StartupReport
where
    I: IntoIterator<Item = (RoomId, &'a RoomDef)>,
{
    let mut report = StartupReport::default();
    for (id, def) in defs {
        match def.build(id.clone(), Arc::clone(env)) {
            Ok(room) => {
                tracing::debug!(
                    room = %id,
                    rules = room.schedule().rules().len(),
                    referenced = room.referenced_entities().len(),
                    "room compiled"
                );
                report.rooms.push(Arc::new(room));
            }
            Err(error) => {
                tracing::error!(room = %id, error = %error, "room disabled");
                report.disabled.push((id, error));
            }
        }
    }
    report
}

/// Starts room loops over shared ports.
pub struct Scheduler<S, A, C> {
    store: Arc<S>,
    actuator: Arc<A>,
    clock: Arc<C>,
    reset_at_startup: bool,
    inbox_capacity: usize,
}

impl<S, A, C> Scheduler<S, A, C>
where
    S: StateStore + 'static,
    A: Actuator + 'static,
    C: Clock + 'static,
{
    #[must_use]
    pub fn new(store: Arc<S>, actuator: Arc<A>, clock: Arc<C>) -> Self {
        Self {
            store,
            actuator,
            clock,
            reset_at_startup: false,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Send every room's value right away instead of after its first delay.
    #[must_use]
    pub fn with_reset_at_startup(mut self, reset_at_startup: bool) -> Self {
        self.reset_at_startup = reset_at_startup;
        self
    }

    #[must_use]
    pub fn with_inbox_capacity(mut self, inbox_capacity: usize) -> Self {
        self.inbox_capacity = inbox_capacity.max(1);
        self
    }

    /// Spawn one loop per room and the router reading `events`.
    #[must_use]
    pub fn start(
        self,
        rooms: Vec<Arc<Room>>,
        events: broadcast::Receiver<StateChanged>,
    ) -> SchedulerHandle {
        let mut loops = JoinSet::new();
        let mut routes = Vec::with_capacity(rooms.len());

        for room in rooms {
            let (sender, inbox) = mpsc::channel(self.inbox_capacity);
            let room_loop = RoomLoop::new(
                Arc::clone(&room),
                Arc::clone(&self.store),
                Arc::clone(&self.actuator),
                Arc::clone(&self.clock),
                inbox,
                self.reset_at_startup,
            );
            loops.spawn(room_loop.run());
            routes.push(Route { room, sender });
        }

        tracing::info!(rooms = routes.len(), "scheduler started");
        let router = tokio::spawn(route(BroadcastStream::new(events), routes));
        SchedulerHandle { router, loops }
    }
}

struct Route {
    room: Arc<Room>,
    sender: mpsc::Sender<RoomEvent>,
}

impl Route {
    fn forward(&self, event: RoomEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                // the room already has work queued and will read fresh states
                tracing::debug!(room = %self.room.id(), ?event, "room inbox full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(room = %self.room.id(), "room loop is gone");
            }
        }
    }
}

async fn route(mut events: BroadcastStream<StateChanged>, routes: Vec<Route>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                if !event.is_change() {
                    continue;
                }
                for route in routes
                    .iter()
                    .filter(|route| route.room.is_watching(&event.entity_id))
                {
                    route.forward(RoomEvent::EntityChanged(event.entity_id.clone()));
                }
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event bus lagged, scheduling catch-up passes");
                for route in &routes {
                    route.forward(RoomEvent::CatchUp);
                }
            }
        }
    }
    tracing::info!("event bus closed, router stopped");
}

/// Running scheduler tasks.
#[derive(Debug)]
pub struct SchedulerHandle {
    router: JoinHandle<()>,
    loops: JoinSet<()>,
}

impl SchedulerHandle {
    /// Stop routing events and wait for every room loop to finish.
    pub async fn shutdown(mut self) {
        self.router.abort();
        if let Err(error) = (&mut self.router).await
            && !error.is_cancelled()
        {
            tracing::error!(error = %error, "router task failed");
        }
        self.join_loops().await;
        tracing::info!("scheduler stopped");
    }

    /// Wait until the event bus closes and every room loop has finished.
    pub async fn wait(mut self) {
        if let Err(error) = (&mut self.router).await {
            tracing::error!(error = %error, "router task failed");
        }
        self.join_loops().await;
    }

    async fn join_loops(&mut self) {
        while let Some(result) = self.loops.join_next().await {
            if let Err(error) = result {
                tracing::error!(error = %error, "room loop failed");
            }
        }
    }
}
