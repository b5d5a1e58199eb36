//! Fixed-capacity table of game instances.
//!
//! The pool is an arena of `max_games` slots. A slot is either empty or holds
//! exactly one [`InstanceSlot`] whose id equals its index. Ids are handed to
//! clients (they end up in match URLs), so slots are reused in place instead
//! of being compacted.

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::PoolError;
use crate::game::{GameFactory, GameInstance, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Index of a slot in the pool.
pub type SlotId = usize;

/// The pool as shared between the HTTP handlers, the gateway and the tick loop.
pub type SharedPool = Arc<Mutex<GamePool>>;

/// One occupied entry of the pool.
pub struct InstanceSlot {
    id: SlotId,
    generation: u64,
    instance: Box<dyn GameInstance>,
    connected: HashMap<ConnectionId, ConnectionHandle>,
    started_at: Instant,
}

impl InstanceSlot {
    fn new(id: SlotId, generation: u64, instance: Box<dyn GameInstance>) -> Self {
        Self {
            id,
            generation,
            instance,
            connected: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Pool-wide creation counter value of this instance.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_stopped(&self) -> bool {
        self.instance.is_stopped()
    }

    pub fn is_over(&self) -> bool {
        self.instance.is_over()
    }

    /// Matchmaking policy of the instance. A stopped instance never takes
    /// new players, whatever it reports.
    pub fn allow_join(&self) -> bool {
        !self.is_stopped() && self.instance.allow_join()
    }

    pub fn alive_count(&self) -> usize {
        self.instance.alive_count()
    }

    /// Number of connections currently bound to this slot.
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// Structural joinability: room left and the match still running.
    pub fn is_joinable(&self, capacity: usize) -> bool {
        self.alive_count() < capacity && !self.is_over()
    }

    pub fn instance_mut(&mut self) -> &mut dyn GameInstance {
        self.instance.as_mut()
    }

    /// Registers `connection` with the slot and its instance.
    pub(crate) fn bind(&mut self, connection: ConnectionHandle) -> PlayerId {
        self.connected.insert(connection.id(), connection.clone());
        self.instance.add_player(connection)
    }

    /// Reverses [`InstanceSlot::bind`].
    pub(crate) fn unbind(&mut self, connection: ConnectionId, player: PlayerId) {
        self.instance.remove_player(player);
        self.connected.remove(&connection);
    }

    fn teardown(&mut self) {
        self.instance.stop();
        for (_, connection) in self.connected.drain() {
            connection.terminate();
        }
    }
}

impl std::fmt::Debug for InstanceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceSlot")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("stopped", &self.is_stopped())
            .field("over", &self.is_over())
            .field("allow_join", &self.allow_join())
            .field("alive_count", &self.alive_count())
            .field("connected", &self.connected.len())
            .finish()
    }
}

/// The instance table.
pub struct GamePool {
    slots: Vec<Option<InstanceSlot>>,
    max_players_per_game: usize,
    factory: Arc<dyn GameFactory>,
    next_generation: u64,
}

impl GamePool {
    pub fn new(
        max_games: usize,
        max_players_per_game: usize,
        factory: Arc<dyn GameFactory>,
    ) -> Self {
        Self {
            slots: (0..max_games).map(|_| None).collect(),
            max_players_per_game,
            factory,
            next_generation: 0,
        }
    }

    /// Wraps the pool for sharing across tasks.
    pub fn into_shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    pub fn max_games(&self) -> usize {
        self.slots.len()
    }

    pub fn max_players_per_game(&self) -> usize {
        self.max_players_per_game
    }

    /// Installs a new instance.
    ///
    /// With a hint, only that slot is considered and it must be empty or
    /// stopped. Without one, the lowest empty-or-stopped index is used.
    pub fn create(&mut self, hint: Option<SlotId>) -> Result<SlotId, PoolError> {
        let id = match hint {
            Some(id) if self.is_free(id) => id,
            Some(_) => return Err(PoolError::NoCapacity),
            None => (0..self.slots.len())
                .find(|&id| self.is_free(id))
                .ok_or(PoolError::NoCapacity)?,
        };

        if let Some(previous) = self.slots[id].as_mut() {
            previous.teardown();
        }
        self.install(id);
        Ok(id)
    }

    /// Shuts down the instance at `id`, closing every bound connection, and
    /// either refills the slot straight away or leaves it empty.
    pub fn retire(&mut self, id: SlotId, recreate: bool) {
        let Some(mut slot) = self.slots.get_mut(id).and_then(Option::take) else {
            return;
        };

        let dropped = slot.connected.len();
        slot.teardown();
        info!(game = id, dropped, recreate, "🏁 Game retired");

        if recreate {
            self.install(id);
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&InstanceSlot> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut InstanceSlot> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Whether a new player may connect to `id`. Ignores `allow_join`.
    pub fn is_joinable(&self, id: SlotId) -> bool {
        self.get(id)
            .is_some_and(|slot| slot.is_joinable(self.max_players_per_game))
    }

    /// Occupied slots in index order.
    pub fn slots(&self) -> impl Iterator<Item = &InstanceSlot> {
        self.slots.iter().flatten()
    }

    /// Connections bound across every slot.
    pub fn player_count(&self) -> usize {
        self.slots().map(InstanceSlot::connected_count).sum()
    }

    /// Advances every running instance.
    pub fn tick(&mut self, dt: Duration) {
        for slot in self.slots.iter_mut().flatten() {
            if !slot.is_stopped() {
                slot.instance.tick(dt);
            }
        }
    }

    /// Empties every slot whose instance stopped on its own.
    pub fn reap_stopped(&mut self) -> Vec<SlotId> {
        let stopped: Vec<SlotId> = self
            .slots()
            .filter(|slot| slot.is_stopped())
            .map(InstanceSlot::id)
            .collect();

        for &id in &stopped {
            self.retire(id, false);
        }
        stopped
    }

    /// Retires every instance without replacement.
    pub fn shutdown(&mut self) {
        for id in 0..self.slots.len() {
            self.retire(id, false);
        }
    }

    fn is_free(&self, id: SlotId) -> bool {
        match self.slots.get(id) {
            Some(None) => true,
            Some(Some(slot)) => slot.is_stopped(),
            None => false,
        }
    }

    fn install(&mut self, id: SlotId) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let instance = self.factory.create(id);
        self.slots[id] = Some(InstanceSlot::new(id, generation, instance));
        debug!(game = id, generation, "🎮 Game created");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::testing::StubFactory;

    fn pool(max_games: usize) -> (GamePool, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory::default());
        (GamePool::new(max_games, 4, factory.clone()), factory)
    }

    #[test]
    fn create_fills_lowest_free_index() {
        let (mut pool, _) = pool(3);
        assert_eq!(pool.create(None), Ok(0));
        assert_eq!(pool.create(None), Ok(1));
        assert_eq!(pool.create(None), Ok(2));
        assert_eq!(pool.create(None), Err(PoolError::NoCapacity));

        pool.retire(1, false);
        assert_eq!(pool.create(None), Ok(1));
    }

    #[test]
    fn slot_ids_match_their_index() {
        let (mut pool, _) = pool(4);
        pool.create(Some(2)).unwrap();
        pool.create(None).unwrap();
        for slot in pool.slots() {
            assert_eq!(pool.get(slot.id()).map(InstanceSlot::id), Some(slot.id()));
        }
        let ids: Vec<_> = pool.slots().map(InstanceSlot::id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn hinted_create_requires_a_free_slot() {
        let (mut pool, _) = pool(2);
        assert_eq!(pool.create(Some(1)), Ok(1));
        assert_eq!(pool.create(Some(1)), Err(PoolError::NoCapacity));
        assert_eq!(pool.create(Some(5)), Err(PoolError::NoCapacity));
        assert_eq!(pool.create(None), Ok(0));
    }

    #[test]
    fn retire_then_create_reuses_every_id() {
        let (mut pool, _) = pool(4);
        for _ in 0..4 {
            pool.create(None).unwrap();
        }
        for id in 0..4 {
            pool.retire(id, false);
            assert!(pool.get(id).is_none());
            assert_eq!(pool.create(Some(id)), Ok(id));
        }
    }

    #[test]
    fn stopped_slots_are_reusable() {
        let (mut pool, factory) = pool(2);
        pool.create(None).unwrap();
        pool.create(None).unwrap();
        assert_eq!(pool.create(None), Err(PoolError::NoCapacity));

        let old = factory.latest(1);
        old.lock().unwrap().stopped = true;
        let old_generation = pool.get(1).unwrap().generation();

        assert_eq!(pool.create(None), Ok(1));
        assert!(pool.get(1).unwrap().generation() > old_generation);
        assert_eq!(old.lock().unwrap().stop_calls, 1);
        assert_eq!(factory.created_for(1), 2);
    }

    #[test]
    fn retire_terminates_connections_and_can_recreate() {
        let (mut pool, factory) = pool(2);
        pool.create(None).unwrap();

        let (alice, mut alice_rx) = ConnectionHandle::new(1, "127.0.0.1:1".parse().unwrap());
        let (bob, mut bob_rx) = ConnectionHandle::new(2, "127.0.0.1:2".parse().unwrap());
        let slot = pool.get_mut(0).unwrap();
        slot.bind(alice);
        slot.bind(bob);
        assert_eq!(pool.player_count(), 2);

        let first = factory.latest(0);
        let old_generation = pool.get(0).unwrap().generation();
        pool.retire(0, true);

        assert_eq!(alice_rx.try_recv().unwrap(), Outbound::Terminate);
        assert_eq!(bob_rx.try_recv().unwrap(), Outbound::Terminate);
        assert_eq!(first.lock().unwrap().stop_calls, 1);

        let fresh = pool.get(0).expect("slot refilled");
        assert!(fresh.generation() > old_generation);
        assert_eq!(fresh.connected_count(), 0);
        assert!(!fresh.is_stopped());
    }

    #[test]
    fn retire_of_absent_slot_is_a_noop() {
        let (mut pool, factory) = pool(2);
        pool.retire(0, false);
        pool.retire(0, true);
        pool.retire(42, true);
        assert!(pool.get(0).is_none());
        assert_eq!(factory.created_for(0), 0);
    }

    #[test]
    fn lookups_out_of_range_return_none() {
        let (mut pool, _) = pool(1);
        assert!(pool.get(1).is_none());
        assert!(pool.get_mut(usize::MAX).is_none());
        assert!(!pool.is_joinable(3));
    }

    #[test]
    fn joinability_checks_capacity_and_over_but_not_allow_join() {
        let (mut pool, factory) = pool(1);
        pool.create(None).unwrap();
        let flags = factory.latest(0);

        assert!(pool.is_joinable(0));

        flags.lock().unwrap().allow_join = false;
        assert!(pool.is_joinable(0));

        flags.lock().unwrap().alive = 4;
        assert!(!pool.is_joinable(0));

        flags.lock().unwrap().alive = 3;
        assert!(pool.is_joinable(0));

        flags.lock().unwrap().over = true;
        assert!(!pool.is_joinable(0));
    }

    #[test]
    fn self_stopped_instances_refuse_joins() {
        let (mut pool, factory) = pool(1);
        pool.create(None).unwrap();
        assert!(pool.get(0).unwrap().allow_join());

        factory.latest(0).lock().unwrap().stopped = true;
        let slot = pool.get(0).unwrap();
        assert!(slot.is_stopped());
        assert!(!slot.allow_join());
    }

    #[test]
    fn reap_empties_self_stopped_slots() {
        let (mut pool, factory) = pool(3);
        for _ in 0..3 {
            pool.create(None).unwrap();
        }
        factory.latest(0).lock().unwrap().stopped = true;
        factory.latest(2).lock().unwrap().stopped = true;

        assert_eq!(pool.reap_stopped(), vec![0, 2]);
        assert!(pool.get(0).is_none());
        assert!(pool.get(1).is_some());
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn tick_skips_stopped_instances() {
        let (mut pool, factory) = pool(2);
        pool.create(None).unwrap();
        pool.create(None).unwrap();
        factory.latest(1).lock().unwrap().stopped = true;

        pool.tick(Duration::from_millis(50));

        assert_eq!(factory.latest(0).lock().unwrap().ticks, 1);
        assert_eq!(factory.latest(1).lock().unwrap().ticks, 0);
    }

    #[test]
    fn closures_work_as_factories() {
        use crate::game::RelayGame;

        let factory = |id: SlotId| -> Box<dyn GameInstance> { Box::new(RelayGame::new(id, None)) };
        let mut pool = GamePool::new(2, 4, Arc::new(factory));
        assert_eq!(pool.create(Some(1)), Ok(1));
        assert!(pool.is_joinable(1));
    }

    #[test]
    fn shutdown_empties_the_pool() {
        let (mut pool, _) = pool(3);
        pool.create(None).unwrap();
        pool.create(None).unwrap();
        pool.shutdown();
        assert_eq!(pool.slots().count(), 0);
    }
}
