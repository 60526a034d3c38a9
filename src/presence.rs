use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use tessera_sync::{ClientId, SyncClient, SyncError};
use tessera_world::PlayerState;

pub type Roster = BTreeMap<ClientId, PlayerState>;

/// Publishes the local pose on a fixed period and hands back everyone else's.
pub struct Presence {
    pose: Arc<Mutex<PlayerState>>,
    roster_rx: Receiver<Roster>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Presence {
    pub fn spawn(client: Arc<SyncClient>, every: Duration, initial: PlayerState) -> io::Result<Self> {
        let pose = Arc::new(Mutex::new(initial));
        let (roster_tx, roster_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let shared = Arc::clone(&pose);
        let ticker = tick(every);
        let handle = thread::Builder::new()
            .name("tessera-presence".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {},
                    }
                    let state = *shared.lock().unwrap();
                    match client.update_player_state(state) {
                        Ok(players) => {
                            if roster_tx.send(players).is_err() {
                                break;
                            }
                        }
                        Err(SyncError::Disconnected) => break,
                        Err(e) => log::warn!(target: "sync", "player state not sent: {e}"),
                    }
                }
                log::debug!(target: "sync", "presence stopped");
            })?;
        Ok(Self {
            pose,
            roster_rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn publish(&self, state: PlayerState) {
        *self.pose.lock().unwrap() = state;
    }

    /// The most recent roster received since the last call, if any.
    pub fn latest(&self) -> Option<Roster> {
        self.roster_rx.try_iter().last()
    }

    pub fn stop(&mut self) {
        self.stop_tx = None;
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Presence {
    fn drop(&mut self) {
        self.stop();
    }
}
