//! Fixed-rate simulation loop shared by every room

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::util::time::tick_duration;
use crate::ws::protocol::ServerMsg;
use crate::ws::registry::ConnectionRegistry;

use super::store::RoomStore;

/// Drives ball physics and trail decay for all rooms
pub struct SimulationEngine {
    rooms: Arc<RoomStore>,
    connections: Arc<ConnectionRegistry>,
}

impl SimulationEngine {
    pub fn new(rooms: Arc<RoomStore>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, connections }
    }

    /// Run the tick loop forever
    pub async fn run(self) {
        let period = tick_duration();
        info!(period_ms = period.as_millis() as u64, "Simulation loop started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick_all();
        }
    }

    /// Step every room once and broadcast each room's new state.
    /// Returns the number of rooms stepped.
    pub fn tick_all(&self) -> usize {
        let handles = self.rooms.handles();

        for handle in &handles {
            let mut room = handle.lock();
            if room.is_empty() {
                continue;
            }
            room.tick();

            // Sent under the lock, ordered against input broadcasts
            let delivered = self
                .connections
                .broadcast(&room.id, &ServerMsg::StateUpdate(room.state.clone()));
            if delivered == 0 {
                debug!(room_id = %room.id, "Tick broadcast reached nobody");
            }
        }

        handles.len()
    }
}
