// ==============================================================================
// net.rs — WEBSOCKET BRIDGE
// ------------------------------------------------------------------------------
// One human-driven vehicle per connection:
//   connect    → placeholder car spawned on the grid, welcome sent
//   "input"    → held key state replaced
//   "ping"     → "pong"
//   disconnect → vehicle removed
// Snapshots reach the client through the channel registered in
// SharedRaceState.
// ==============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::accept_async;
use tungstenite::Message;

use crate::car::{GameVersion, VehicleDesc, placeholder_car};
use crate::control::{Controller, HumanInput};
use crate::error::VehicleError;
use crate::physics::VehicleId;
use crate::race::Race;
use crate::state::{ServerMessage, SharedRaceState};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Input(HumanInput),
    Ping,
}

pub async fn start_websocket_server(
    addr: &str,
    race: Arc<Mutex<Race>>,
    state: Arc<Mutex<SharedRaceState>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding websocket listener on {addr}"))?;

    info!("WebSocket listening on ws://{addr}");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Accept failed: {e}");
                continue;
            }
        };

        tokio::spawn(handle_client(raw, peer, Arc::clone(&race), Arc::clone(&state)));
    }
}

async fn handle_client(
    raw: TcpStream,
    peer: SocketAddr,
    race: Arc<Mutex<Race>>,
    state: Arc<Mutex<SharedRaceState>>,
) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing message channel
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) Vehicle for this client
    // -------------------------------
    let desc = VehicleDesc::new(
        format!("player {peer}"),
        GameVersion::Nfs4,
        placeholder_car(),
        Controller::human(),
    );
    let vehicle = match join_race(&race, &state, desc, tx.clone()).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Could not spawn a vehicle for {peer}: {e}");
            return;
        }
    };
    info!("Player connected: {peer} drives vehicle {vehicle}");

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Input(input)) => {
                race.lock().await.set_human_input(vehicle, input);
            }
            Ok(ClientMessage::Ping) => {
                if let Some(pong) = ServerMessage::Pong.to_json() {
                    let _ = tx.send(pong);
                }
            }
            Err(e) => debug!("Ignoring message from {peer}: {e}"),
        }
    }

    info!("Player disconnected: {peer}");
    race.lock().await.remove_vehicle(vehicle);
}

/// Spawns the client's car, then subscribes `tx` to snapshots and greets it.
/// A failed spawn leaves the subscriber list untouched.
async fn join_race(
    race: &Mutex<Race>,
    state: &Mutex<SharedRaceState>,
    desc: VehicleDesc,
    tx: mpsc::UnboundedSender<String>,
) -> Result<VehicleId, VehicleError> {
    let vehicle = race.lock().await.add_vehicle(desc)?;

    if let Some(welcome) = (ServerMessage::Welcome { vehicle }).to_json() {
        let _ = tx.send(welcome);
    }
    state.lock().await.register_client(tx);
    Ok(vehicle)
}
