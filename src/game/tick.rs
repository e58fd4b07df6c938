//! Authoritative simulation tick.
//!
//! The ten-step per-tick pipeline (spec.md §4.6): drain inputs, resolve
//! combat actions, integrate physics, update projectiles, rebuild the
//! spatial grid, resolve collisions, advance status timers and resource
//! regen, check win/time conditions, then commit. Grounded on the
//! teacher's `tick()` in `game/tick.rs` — same phase-dispatch-then-
//! numbered-steps structure and doc-comment density — generalized from
//! the teacher's battle-royale ruleset (rune collection, shrine
//! capture, arena shrink) to this spec's combat ruleset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::collision::{self};
use super::combat;
use super::delta::{DeltaBatch, PlayerFieldChanges, ProjectileFieldChanges};
use super::grid::SpatialGrid;
use super::state::{Match, MatchStatus};
use crate::core::{MatchRng, PlayerId, Vec2};
use crate::config::ArenaConfig;

/// Base movement speed before power-up modifiers (units/sec).
const BASE_MOVE_SPEED: f64 = 220.0;

/// Cell size for the per-tick spatial grid rebuild.
const GRID_CELL_SIZE: f64 = 64.0;

/// Offset added to a projectile's own id to form its grid handle,
/// keeping player/projectile/power-up handle namespaces disjoint.
const PROJECTILE_HANDLE_OFFSET: u64 = 1_000_000_000;

/// Offset added to a power-up's own id to form its grid handle.
const POWERUP_HANDLE_OFFSET: u64 = 2_000_000_000;

/// One tick's worth of intent from a connected player (spec.md §6
/// `input` message, decoded).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Desired movement direction (not necessarily normalized).
    pub movement: Vec2,
    /// Aim/facing direction, used for ranged attacks.
    pub aim: Vec2,
    /// `true` if the attack action was requested this tick.
    pub attack: bool,
    /// `true` if the block action was requested this tick.
    pub block: bool,
    /// `true` if the dodge action was requested this tick.
    pub dodge: bool,
    /// `true` if the cast action was requested this tick.
    pub cast: bool,
}

/// Outcome of running one tick.
#[derive(Debug)]
pub struct TickReport {
    /// The committed delta batch for this tick.
    pub batch: DeltaBatch,
    /// `true` if the match transitioned `Waiting -> Active` this tick.
    pub started: bool,
    /// `true` if the match transitioned `Active -> Finished` this tick.
    pub finished: bool,
}

/// Run one simulation tick. A no-op pipeline (still committed, so the
/// tick clock advances) while `Waiting` or `Finished`; the full
/// ten-step pipeline while `Active`.
pub fn tick(
    state: &mut Match,
    inputs: &BTreeMap<PlayerId, PlayerInput>,
    rng: &mut MatchRng,
    config: &ArenaConfig,
    now: u64,
) -> TickReport {
    if state.status != MatchStatus::Active {
        let started = state.maybe_start(now);
        let batch = state.commit(now);
        return TickReport { batch, started, finished: false };
    }

    // 1. Drain input queue: translate movement intent into velocity.
    apply_movement_inputs(state, inputs, now);

    // 2. Combat resolver: attack/block/dodge/cast, in player-id order
    //    (deterministic FIFO tie-break via BTreeMap iteration).
    resolve_combat_actions(state, inputs, rng, now);

    // 3. Physics integration.
    integrate_players(state, config);

    // 4. Bounds enforcement happens inside integration (boundary clamp)
    //    and inside the projectile update below.
    // 5. Projectile update.
    update_projectiles(state, config);

    // 6. Grid rebuild.
    let (grid, player_handles, powerup_handles) = rebuild_grid(state);

    // 7. Collision resolver: separation, projectile hits, power-up pickups.
    resolve_collisions(state, &grid, &player_handles, &powerup_handles, rng, now);

    // 8. Status timer advance + resource regen.
    advance_status_and_regen(state, config, now);

    // 9. Win/time condition check.
    let finished = state.maybe_finish(now);

    // 10. Commit: harvest deltas, advance tick_count/last_tick.
    let batch = state.commit(now);

    TickReport { batch, started: false, finished }
}

fn apply_movement_inputs(state: &mut Match, inputs: &BTreeMap<PlayerId, PlayerInput>, now: u64) {
    for (id, input) in inputs {
        let Some(player) = state.players.get_mut(id) else {
            continue;
        };
        if !player.alive || player.status.is_casting(now) {
            player.velocity = Vec2::ZERO;
            continue;
        }
        let direction = input.movement.normalize();
        let mut speed = BASE_MOVE_SPEED;
        if player.has_speed_boost() {
            let modifier = player
                .power_ups
                .get(&super::powerup::PowerUpType::SpeedBoost)
                .map(|e| e.modifier)
                .unwrap_or(0.0);
            speed *= 1.0 + modifier;
        }
        player.velocity = direction.scale(speed);
    }
}

fn resolve_combat_actions(
    state: &mut Match,
    inputs: &BTreeMap<PlayerId, PlayerInput>,
    rng: &mut MatchRng,
    now: u64,
) {
    for (id, input) in inputs {
        if input.attack {
            resolve_attack(state, id, input, rng, now);
        }
        if input.block {
            if let Some(player) = state.players.get_mut(id) {
                let _ = combat::block(player, now);
            }
        }
        if input.dodge {
            if let Some(player) = state.players.get_mut(id) {
                let _ = combat::dodge(player, input.aim, now);
            }
        }
        if input.cast {
            resolve_cast(state, id, now);
        }
    }
}

fn resolve_attack(state: &mut Match, id: &PlayerId, input: &PlayerInput, rng: &mut MatchRng, now: u64) {
    let is_ranged = state
        .players
        .get(id)
        .map(|p| p.weapon.stats().projectile_speed > 0.0)
        .unwrap_or(false);

    if is_ranged {
        let mut spawned = None;
        if let Some(attacker) = state.players.get_mut(id) {
            if let Ok(projectile) = combat::fire_projectile(attacker, input.aim, 0, now) {
                spawned = Some(projectile);
            }
        }
        if let Some(mut projectile) = spawned {
            state.spawn_projectile(|new_id| {
                projectile.id = new_id;
                projectile.clone()
            });
        }
        return;
    }

    let max_range = state
        .players
        .get(id)
        .map(|p| p.weapon.stats().max_range)
        .unwrap_or(0.0);
    let Some(target_id) = nearest_target(state, id, max_range) else {
        return;
    };
    if let Some(mut target) = state.players.remove(&target_id) {
        if let Some(attacker) = state.players.get_mut(id) {
            let _ = combat::resolve_melee_attack(attacker, &mut target, now, rng);
        }
        state.players.insert(target_id, target);
    }
}

fn nearest_target(state: &Match, attacker_id: &PlayerId, max_range: f64) -> Option<PlayerId> {
    let attacker = state.players.get(attacker_id)?;
    if !attacker.alive {
        return None;
    }
    state
        .players
        .iter()
        .filter(|(id, p)| *id != attacker_id && p.alive)
        .map(|(id, p)| (id, attacker.position.distance(p.position)))
        .filter(|(_, dist)| *dist <= max_range)
        .min_by(|(ia, da), (ib, db)| da.partial_cmp(db).unwrap().then(ia.cmp(ib)))
        .map(|(id, _)| id.clone())
}

fn resolve_cast(state: &mut Match, id: &PlayerId, now: u64) {
    let effect = {
        let Some(player) = state.players.get_mut(id) else {
            return;
        };
        combat::cast(player, now)
    };
    let Ok(effect) = effect else {
        return;
    };

    match effect {
        combat::AbilityEffect::Heal(_) => {}
        combat::AbilityEffect::Blink { distance } => {
            let Some(player) = state.players.get_mut(id) else {
                return;
            };
            let direction = player.velocity.normalize();
            let fallback = if direction == Vec2::ZERO { Vec2::new(1.0, 0.0) } else { direction };
            let target = player.position.add(fallback.scale(distance));
            let radius = player.radius();
            player.position = state.bounds.clamp(target, radius).0;
        }
        combat::AbilityEffect::Nova { radius, damage } => {
            apply_nova(state, id, radius, damage, now);
        }
    }
}

fn apply_nova(state: &mut Match, caster_id: &PlayerId, radius: f64, damage: f64, now: u64) {
    let Some(center) = state.players.get(caster_id).map(|p| p.position) else {
        return;
    };
    let targets: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|(id, p)| *id != caster_id && p.alive && p.position.distance(center) <= radius)
        .map(|(id, _)| id.clone())
        .collect();
    for target_id in targets {
        if let Some(target) = state.players.get_mut(&target_id) {
            if !target.status.is_invulnerable(now) && !target.has_shield() {
                let new_health = target.apply_damage(damage.round() as i64, now);
                let _ = new_health;
            }
        }
    }
}

fn integrate_players(state: &mut Match, config: &ArenaConfig) {
    let dt = config.tick_duration().as_secs_f64();
    let mut updates = Vec::with_capacity(state.players.len());
    for (id, player) in &state.players {
        if !player.alive {
            continue;
        }
        let (new_pos, new_vel) = super::physics::integrate(
            player.position,
            player.velocity,
            player.radius(),
            dt,
            config.friction,
            config.max_velocity,
            &state.bounds,
        );
        updates.push((id.clone(), new_pos, new_vel));
    }
    for (id, position, velocity) in updates {
        state.apply_player_changes(
            &id,
            PlayerFieldChanges { position: Some(position), velocity: Some(velocity), ..Default::default() },
        );
    }
}

fn update_projectiles(state: &mut Match, config: &ArenaConfig) {
    let dt = config.tick_duration().as_secs_f64();
    let mut updates = Vec::new();
    let mut destroyed = Vec::new();

    for (id, projectile) in &state.projectiles {
        let travel = projectile.velocity.scale(dt);
        let new_pos = projectile.position.add(travel);
        let new_distance = projectile.distance_traveled + travel.length();

        if new_distance >= projectile.range || !state.bounds.contains(new_pos, projectile.size) {
            destroyed.push(*id);
            continue;
        }
        updates.push((*id, new_pos, new_distance));
    }

    for (id, position, distance_traveled) in updates {
        state.apply_projectile_changes(
            id,
            ProjectileFieldChanges { position: Some(position), distance_traveled: Some(distance_traveled) },
        );
    }
    for id in destroyed {
        state.destroy_projectile(id);
    }
}

fn rebuild_grid(state: &Match) -> (SpatialGrid, BTreeMap<u64, PlayerId>, BTreeMap<u64, u64>) {
    let mut grid = SpatialGrid::new(GRID_CELL_SIZE);
    let mut player_handles = BTreeMap::new();
    for (i, (id, player)) in state.players.iter().enumerate() {
        let handle = i as u64;
        grid.insert(handle, player.position, player.radius());
        player_handles.insert(handle, id.clone());
    }
    for (id, projectile) in &state.projectiles {
        grid.insert(PROJECTILE_HANDLE_OFFSET + id, projectile.position, projectile.size);
    }
    let mut powerup_handles = BTreeMap::new();
    for (id, power_up) in &state.power_ups {
        if !power_up.active {
            continue;
        }
        let handle = POWERUP_HANDLE_OFFSET + id;
        grid.insert(handle, power_up.position, power_up.radius());
        powerup_handles.insert(handle, *id);
    }
    (grid, player_handles, powerup_handles)
}

fn resolve_collisions(
    state: &mut Match,
    grid: &SpatialGrid,
    player_handles: &BTreeMap<u64, PlayerId>,
    powerup_handles: &BTreeMap<u64, u64>,
    rng: &mut MatchRng,
    now: u64,
) {
    // Player-player separation.
    let records = collision::check_player_collisions(&state.players, grid, player_handles, now);
    for record in &records {
        if let (collision::EntityId::Player(a), collision::EntityId::Player(b)) = (&record.a, &record.b) {
            if let Some(mut player_a) = state.players.remove(a) {
                if let Some(player_b) = state.players.get_mut(b) {
                    collision::separate_players(&mut player_a, player_b, record, &state.bounds);
                }
                state.players.insert(a.clone(), player_a);
            }
        }
    }

    // Projectile hits.
    let projectile_ids: Vec<u64> = state.projectiles.keys().copied().collect();
    for projectile_id in projectile_ids {
        let handle = PROJECTILE_HANDLE_OFFSET + projectile_id;
        let Some(projectile) = state.projectiles.get(&projectile_id).cloned() else {
            continue;
        };
        let Some(hit_id) =
            collision::find_projectile_hit(&projectile, &state.players, grid, handle, player_handles, now)
        else {
            continue;
        };
        let Some(owner) = state.players.get(&projectile.owner_id).cloned() else {
            state.destroy_projectile(projectile_id);
            continue;
        };
        if let Some(target) = state.players.get(&hit_id).cloned() {
            let outcome = combat::resolve_projectile_hit(&projectile, &owner, &target, projectile.position, rng);
            if let Some(target_mut) = state.players.get_mut(&hit_id) {
                target_mut.apply_damage(outcome.amount, now);
            }
        }
        state.destroy_projectile(projectile_id);
    }

    // Power-up pickups.
    let player_ids: Vec<PlayerId> = state.players.keys().cloned().collect();
    for (handle, id) in player_handles {
        if !player_ids.contains(id) {
            continue;
        }
        let Some(player) = state.players.get(id).cloned() else {
            continue;
        };
        let Some(powerup_id) = collision::find_powerup_pickup(&player, *handle, &state.power_ups, grid, powerup_handles)
        else {
            continue;
        };
        apply_power_up(state, id, powerup_id, now);
    }
}

fn apply_power_up(state: &mut Match, player_id: &PlayerId, powerup_id: u64, now: u64) {
    let Some(power_up) = state.power_ups.get_mut(&powerup_id) else {
        return;
    };
    let kind = power_up.kind;
    let magnitude = power_up.magnitude;
    let duration = power_up.duration;
    power_up.collect(now);
    state.record_power_up_state(powerup_id);

    let Some(player) = state.players.get_mut(player_id) else {
        return;
    };
    if kind == super::powerup::PowerUpType::HealthPack {
        player.heal(magnitude as i64);
    } else {
        player.power_ups.insert(
            kind,
            super::player::ActivePowerUpEffect { modifier: magnitude, end_time: now + duration },
        );
    }
}

fn advance_status_and_regen(state: &mut Match, config: &ArenaConfig, now: u64) {
    let regen_delay_ms = config.regen_delay.as_millis() as u64;
    let respawned: Vec<u64> = state
        .power_ups
        .iter_mut()
        .filter_map(|(id, p)| p.maybe_respawn(now).then_some(*id))
        .collect();
    for id in respawned {
        state.record_power_up_state(id);
    }

    let ids: Vec<PlayerId> = state.players.keys().cloned().collect();
    for id in ids {
        let Some(player) = state.players.get_mut(&id) else {
            continue;
        };
        player.status.clear_expired(now);
        player.expire_power_ups(now);
        if !player.alive {
            continue;
        }
        if now.saturating_sub(player.cooldowns.last_damage) >= regen_delay_ms {
            player.mana = (player.mana + 1).min(player.max_mana);
            player.stamina = (player.stamina + 2).min(player.max_stamina);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MatchId, WorldBounds};
    use crate::game::player::Player;
    use crate::game::weapon::WeaponType;

    fn sample_match() -> Match {
        let mut m = Match::new(MatchId::generate(), WorldBounds::new(1000.0, 1000.0), 2, 4, None, None);
        m.join(Player::new(PlayerId::new("a"), Vec2::new(100.0, 100.0), WeaponType::Rifle, 0)).unwrap();
        m.join(Player::new(PlayerId::new("b"), Vec2::new(120.0, 100.0), WeaponType::Rifle, 0)).unwrap();
        m
    }

    #[test]
    fn waiting_match_does_not_simulate_but_still_commits() {
        let mut m = Match::new(MatchId::generate(), WorldBounds::new(100.0, 100.0), 2, 4, None, None);
        m.join(Player::new(PlayerId::new("a"), Vec2::new(10.0, 10.0), WeaponType::Rifle, 0)).unwrap();
        let mut rng = MatchRng::from_seed(1);
        let config = ArenaConfig::default();
        let report = tick(&mut m, &BTreeMap::new(), &mut rng, &config, 0);
        assert_eq!(m.status, MatchStatus::Waiting);
        assert_eq!(report.batch.tick, 1);
    }

    #[test]
    fn match_starts_once_enough_players_join() {
        let mut m = sample_match();
        let mut rng = MatchRng::from_seed(1);
        let config = ArenaConfig::default();
        let report = tick(&mut m, &BTreeMap::new(), &mut rng, &config, 0);
        assert!(report.started);
        assert_eq!(m.status, MatchStatus::Active);
    }

    #[test]
    fn movement_input_moves_player_towards_direction() {
        let mut m = sample_match();
        let mut rng = MatchRng::from_seed(1);
        let config = ArenaConfig::default();
        tick(&mut m, &BTreeMap::new(), &mut rng, &config, 0);

        let mut inputs = BTreeMap::new();
        inputs.insert(
            PlayerId::new("a"),
            PlayerInput { movement: Vec2::new(1.0, 0.0), ..Default::default() },
        );
        let before = m.players[&PlayerId::new("a")].position.x;
        tick(&mut m, &inputs, &mut rng, &config, 16);
        let after = m.players[&PlayerId::new("a")].position.x;
        assert!(after > before);
    }

    #[test]
    fn melee_attack_on_adjacent_target_deals_damage() {
        let mut m = sample_match();
        let mut rng = MatchRng::from_seed(1);
        let config = ArenaConfig::default();
        tick(&mut m, &BTreeMap::new(), &mut rng, &config, 0);

        m.players.get_mut(&PlayerId::new("a")).unwrap().weapon = WeaponType::Melee;
        let mut inputs = BTreeMap::new();
        inputs.insert(
            PlayerId::new("a"),
            PlayerInput { attack: true, aim: Vec2::new(1.0, 0.0), ..Default::default() },
        );
        let before = m.players[&PlayerId::new("b")].health;
        tick(&mut m, &inputs, &mut rng, &config, 16);
        let after = m.players[&PlayerId::new("b")].health;
        assert!(after < before);
    }
}
