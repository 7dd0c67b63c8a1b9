// ==============================================================================
// state.rs — RENDER SNAPSHOTS + CLIENT FAN-OUT
// ------------------------------------------------------------------------------
// A RaceSnapshot is what a renderer needs for one tick: every part's world
// transform, texture and enabled flag, plus per-vehicle actuation and sensors.
// SharedRaceState holds the outgoing channel of every connected client.
// ==============================================================================

use log::error;
use rapier3d::prelude::*;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::car::{ActuationState, GameVersion, MeshPart, SensorReading, VehicleEntity};
use crate::control::ActuationCommand;
use crate::debug_builders::DebugOverlay;
use crate::physics::{PhysicsWorld, VehicleId, q4, v3};

#[derive(Debug, Clone, Serialize)]
pub struct PartSnapshot {
    pub name: String,
    pub texture: Option<u32>,
    pub enabled: bool,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl From<&MeshPart> for PartSnapshot {
    fn from(part: &MeshPart) -> Self {
        Self {
            name: part.name.clone(),
            texture: part.texture,
            enabled: part.enabled,
            position: v3(part.pose.translation.vector),
            rotation: q4(part.pose.rotation),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub name: String,
    pub version: GameVersion,
    pub controller: &'static str,
    pub population_id: Option<u32>,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub yaw_degrees: f32,
    pub speed_kmh: f32,
    pub command: ActuationCommand,
    pub actuation: ActuationState,
    pub sensors: SensorReading,
    pub parts: Vec<PartSnapshot>,
}

impl VehicleSnapshot {
    pub fn capture(vehicle: &VehicleEntity, world: &PhysicsWorld) -> Self {
        let pose = vehicle.pose();
        let forward = pose.rotation * vector![0.0, 0.0, 1.0];
        let speed_kmh = vehicle
            .linvel(world)
            .map_or(vehicle.rig().forward_speed(), |v| v.dot(&forward))
            * 3.6;

        Self {
            id: vehicle.id(),
            name: vehicle.name().to_string(),
            version: vehicle.version(),
            controller: vehicle.controller().kind(),
            population_id: vehicle.population_id(),
            position: v3(pose.translation.vector),
            rotation: q4(pose.rotation),
            yaw_degrees: vehicle.yaw_degrees(),
            speed_kmh,
            command: vehicle.command(),
            actuation: vehicle.actuation(),
            sensors: vehicle.sensors(),
            parts: vehicle.parts().map(PartSnapshot::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceSnapshot {
    pub tick: u64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub debug: DebugOverlay,
}

/// Everything the server pushes down a websocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage<'a> {
    Welcome { vehicle: VehicleId },
    Pong,
    Snapshot(&'a RaceSnapshot),
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Failed to encode server message: {e}");
                None
            }
        }
    }
}

#[derive(Default)]
pub struct SharedRaceState {
    pub tick: u64,
    pub clients: Vec<UnboundedSender<String>>,
}

impl SharedRaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    /// Sends the snapshot to every client. Clients whose channel closed are
    /// dropped.
    pub fn broadcast_snapshot(&mut self, snapshot: &RaceSnapshot) {
        self.tick = snapshot.tick;
        let Some(json) = ServerMessage::Snapshot(snapshot).to_json() else {
            return;
        };
        self.clients.retain(|tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn empty_snapshot(tick: u64) -> RaceSnapshot {
        RaceSnapshot { tick, vehicles: Vec::new(), debug: DebugOverlay::default() }
    }

    #[test]
    fn messages_are_tagged_by_type() {
        let welcome = ServerMessage::Welcome { vehicle: VehicleId(3) }.to_json().unwrap();
        assert_eq!(welcome, r#"{"type":"welcome","vehicle":3}"#);
        assert_eq!(ServerMessage::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);

        let snapshot = empty_snapshot(7);
        let json = ServerMessage::Snapshot(&snapshot).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "snapshot");
        assert_eq!(value["tick"], 7);
    }

    #[test]
    fn broadcast_drops_closed_clients() {
        let mut state = SharedRaceState::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        state.register_client(tx_a);
        state.register_client(tx_b);
        drop(rx_b);

        state.broadcast_snapshot(&empty_snapshot(1));
        assert_eq!(state.clients.len(), 1);
        assert_eq!(state.tick, 1);
        assert!(rx_a.try_recv().unwrap().contains(r#""tick":1"#));
    }
}
