//! Minimal reference game used by the `arena` binary.
//!
//! `RelayGame` forwards every payload to the other players of the same
//! instance. It has no rules of its own; a match ends when its configured
//! duration runs out and the instance stops once the last player has left.

use super::{GameFactory, GameInstance, PlayerId};
use crate::connection::ConnectionHandle;
use crate::error::GameError;
use crate::pool::SlotId;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub struct RelayGame {
    id: SlotId,
    players: BTreeMap<PlayerId, ConnectionHandle>,
    next_player: u64,
    elapsed: Duration,
    match_duration: Option<Duration>,
    over: bool,
    stopped: bool,
}

impl RelayGame {
    /// A `match_duration` of `None` keeps the match running forever.
    pub fn new(id: SlotId, match_duration: Option<Duration>) -> Self {
        Self {
            id,
            players: BTreeMap::new(),
            next_player: 1,
            elapsed: Duration::ZERO,
            match_duration,
            over: false,
            stopped: false,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl GameInstance for RelayGame {
    fn is_over(&self) -> bool {
        self.over
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn allow_join(&self) -> bool {
        !self.over && !self.stopped
    }

    fn alive_count(&self) -> usize {
        self.players.len()
    }

    fn add_player(&mut self, connection: ConnectionHandle) -> PlayerId {
        let player = PlayerId(self.next_player);
        self.next_player += 1;
        self.players.insert(player, connection);
        player
    }

    fn handle_message(&mut self, player: PlayerId, data: &[u8]) -> Result<(), GameError> {
        if data.is_empty() {
            return Err(GameError::InvalidMessage("empty payload".to_string()));
        }
        if !self.players.contains_key(&player) {
            return Err(GameError::UnknownPlayer(player.0));
        }

        for (other, connection) in &self.players {
            if *other != player && !connection.send(data.to_vec()) {
                debug!(game = self.id, player = %other, "dropping frame for closed connection");
            }
        }
        Ok(())
    }

    fn remove_player(&mut self, player: PlayerId) {
        self.players.remove(&player);
        if self.over && self.players.is_empty() {
            self.stopped = true;
        }
    }

    fn tick(&mut self, dt: Duration) {
        if self.stopped {
            return;
        }
        self.elapsed += dt;
        if let Some(limit) = self.match_duration {
            if !self.over && self.elapsed >= limit {
                self.over = true;
            }
        }
        if self.over && self.players.is_empty() {
            self.stopped = true;
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.players.clear();
    }
}

/// Produces a [`RelayGame`] for every new slot.
#[derive(Debug, Clone, Default)]
pub struct RelayGameFactory {
    match_duration: Option<Duration>,
}

impl RelayGameFactory {
    pub fn new(match_duration: Option<Duration>) -> Self {
        Self { match_duration }
    }
}

impl GameFactory for RelayGameFactory {
    fn create(&self, id: SlotId) -> Box<dyn GameInstance> {
        Box::new(RelayGame::new(id, self.match_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;

    #[test]
    fn relays_to_everyone_but_the_sender() {
        let mut game = RelayGame::new(0, None);
        let (alice, mut alice_rx) = ConnectionHandle::new(1, "127.0.0.1:1000".parse().unwrap());
        let (bob, mut bob_rx) = ConnectionHandle::new(2, "127.0.0.1:1001".parse().unwrap());

        let alice_id = game.add_player(alice);
        game.add_player(bob);
        assert_eq!(game.alive_count(), 2);

        game.handle_message(alice_id, b"hello").unwrap();

        match bob_rx.try_recv() {
            Ok(Outbound::Frame(data)) => assert_eq!(data, b"hello"),
            other => panic!("expected a frame, got {other:?}"),
        }
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn rejects_empty_and_unknown_senders() {
        let mut game = RelayGame::new(0, None);
        let (handle, _rx) = ConnectionHandle::new(1, "127.0.0.1:1000".parse().unwrap());
        let player = game.add_player(handle);

        assert!(matches!(
            game.handle_message(player, b""),
            Err(GameError::InvalidMessage(_))
        ));
        assert!(matches!(
            game.handle_message(PlayerId(99), b"x"),
            Err(GameError::UnknownPlayer(99))
        ));
    }

    #[test]
    fn match_ends_after_duration_and_stops_when_empty() {
        let mut game = RelayGame::new(3, Some(Duration::from_secs(10)));
        let (handle, _rx) = ConnectionHandle::new(1, "127.0.0.1:1000".parse().unwrap());
        let player = game.add_player(handle);

        game.tick(Duration::from_secs(5));
        assert!(!game.is_over());
        assert!(game.allow_join());

        game.tick(Duration::from_secs(5));
        assert!(game.is_over());
        assert!(!game.allow_join());
        assert!(!game.is_stopped());

        game.remove_player(player);
        assert!(game.is_stopped());
    }

    #[test]
    fn endless_match_never_ends() {
        let mut game = RelayGame::new(0, None);
        game.tick(Duration::from_secs(86_400));
        assert!(!game.is_over());
        assert!(!game.is_stopped());
    }
}
