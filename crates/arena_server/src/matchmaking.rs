//! Picks the game a matchmaking request should be sent to.

use crate::config::RegionConfig;
use crate::error::MatchmakingError;
use crate::pool::{GamePool, InstanceSlot, SlotId};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Configured regions plus the fallback used for unknown keys.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: BTreeMap<String, RegionConfig>,
    default_region: Option<String>,
}

impl RegionTable {
    pub fn new(regions: BTreeMap<String, RegionConfig>, default_region: Option<String>) -> Self {
        Self {
            regions,
            default_region,
        }
    }

    /// Looks `key` up, falling back to the default region when the key is
    /// missing or unknown.
    pub fn resolve(&self, key: Option<&str>) -> Option<(&str, &RegionConfig)> {
        key.and_then(|key| self.regions.get_key_value(key))
            .or_else(|| {
                self.default_region
                    .as_deref()
                    .and_then(|key| self.regions.get_key_value(key))
            })
            .map(|(key, region)| (key.as_str(), region))
    }
}

/// Where a client should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTicket {
    pub game_id: SlotId,
    pub zone: String,
    pub region: RegionConfig,
}

/// Chooses a game for a player from `region`.
///
/// Open games are preferred in index order, then a brand new game, and when
/// the pool is saturated the most recently started game that is not over.
pub fn select_game(
    pool: &mut GamePool,
    regions: &RegionTable,
    region: Option<&str>,
) -> Result<MatchTicket, MatchmakingError> {
    let Some((zone, region_config)) = regions.resolve(region) else {
        warn!(requested = ?region, "no region and no default region configured");
        return Err(MatchmakingError::InvalidRegion);
    };

    let game_id = pick_slot(pool)?;
    Ok(MatchTicket {
        game_id,
        zone: zone.to_string(),
        region: region_config.clone(),
    })
}

fn pick_slot(pool: &mut GamePool) -> Result<SlotId, MatchmakingError> {
    let capacity = pool.max_players_per_game();
    if let Some(open) = pool
        .slots()
        .find(|slot| slot.is_joinable(capacity) && slot.allow_join())
    {
        return Ok(open.id());
    }

    if let Ok(id) = pool.create(None) {
        debug!(game = id, "started a new game for matchmaking");
        return Ok(id);
    }

    // Saturated: send the overflow to the newest match still running.
    pool.slots()
        .filter(|slot| !slot.is_over())
        .max_by_key(|slot| (slot.started_at(), slot.generation()))
        .map(InstanceSlot::id)
        .ok_or(MatchmakingError::NoAvailableGame)
}
