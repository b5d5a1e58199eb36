//! Scriptable game instances for unit tests.

use crate::connection::ConnectionHandle;
use crate::error::GameError;
use crate::game::{GameFactory, GameInstance, PlayerId};
use crate::pool::SlotId;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Flags and call log shared between a [`StubGame`] and the test driving it.
#[derive(Debug)]
pub struct StubState {
    pub over: bool,
    pub stopped: bool,
    pub allow_join: bool,
    pub alive: usize,
    pub fail_messages: bool,
    pub added: Vec<PlayerId>,
    pub removed: Vec<PlayerId>,
    pub messages: Vec<(PlayerId, Vec<u8>)>,
    pub ticks: usize,
    pub stop_calls: usize,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            over: false,
            stopped: false,
            allow_join: true,
            alive: 0,
            fail_messages: false,
            added: Vec::new(),
            removed: Vec::new(),
            messages: Vec::new(),
            ticks: 0,
            stop_calls: 0,
        }
    }
}

pub type StubHandle = Arc<Mutex<StubState>>;

pub struct StubGame {
    state: StubHandle,
    next_player: u64,
}

impl GameInstance for StubGame {
    fn is_over(&self) -> bool {
        self.state.lock().unwrap().over
    }

    fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    fn allow_join(&self) -> bool {
        self.state.lock().unwrap().allow_join
    }

    fn alive_count(&self) -> usize {
        self.state.lock().unwrap().alive
    }

    fn add_player(&mut self, _connection: ConnectionHandle) -> PlayerId {
        self.next_player += 1;
        let player = PlayerId(self.next_player);
        let mut state = self.state.lock().unwrap();
        state.alive += 1;
        state.added.push(player);
        player
    }

    fn handle_message(&mut self, player: PlayerId, data: &[u8]) -> Result<(), GameError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_messages {
            return Err(GameError::InvalidMessage("scripted failure".to_string()));
        }
        state.messages.push((player, data.to_vec()));
        Ok(())
    }

    fn remove_player(&mut self, player: PlayerId) {
        let mut state = self.state.lock().unwrap();
        state.alive = state.alive.saturating_sub(1);
        state.removed.push(player);
    }

    fn tick(&mut self, _dt: Duration) {
        self.state.lock().unwrap().ticks += 1;
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().stop_calls += 1;
    }
}

/// Records every instance it creates so tests can flip their flags.
#[derive(Default)]
pub struct StubFactory {
    created: Mutex<Vec<(SlotId, StubHandle)>>,
}

impl StubFactory {
    /// State of the most recent instance created for `id`.
    pub fn latest(&self, id: SlotId) -> StubHandle {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(slot, _)| *slot == id)
            .map(|(_, state)| state.clone())
            .unwrap_or_else(|| panic!("no instance created for slot {id}"))
    }

    pub fn created_for(&self, id: SlotId) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(slot, _)| *slot == id)
            .count()
    }
}

impl GameFactory for StubFactory {
    fn create(&self, id: SlotId) -> Box<dyn GameInstance> {
        let state = StubHandle::default();
        self.created.lock().unwrap().push((id, state.clone()));
        Box::new(StubGame {
            state,
            next_player: 0,
        })
    }
}
