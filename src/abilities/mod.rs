//! Cooldown-gated special abilities layered on top of the grid engine.
//!
//! Each ability cycles `Locked → Available → Active → Cooldown → Available`.
//! Locked is only ever the initial phase: once the score passes an ability's
//! unlock threshold it stays unlocked for the rest of the session.
//!
//! The controller is tick-driven. All timers (cooldowns, active windows, the
//! combo idle reset) are plain millisecond countdowns advanced by
//! [`AbilityController::update`], so pausing is just not advancing them.
//!
//! ```
//! use nezha_2048::abilities::{AbilityController, AbilityId};
//! use nezha_2048::config::AbilityConfig;
//! use nezha_2048::engine::Grid;
//!
//! let mut grid = Grid::default();
//! let mut ctl = AbilityController::new(AbilityConfig::default());
//! grid.add_score(2_000);
//! ctl.update(16, &mut grid);
//! assert!(ctl.trigger_manual(AbilityId::FireSpear, &mut grid).is_ok());
//! assert_eq!(grid.score_multiplier(), 1.5);
//! // a second trigger is refused while the buff runs
//! assert!(ctl.trigger_manual(AbilityId::FireSpear, &mut grid).is_err());
//! ```

pub mod area;
pub mod pattern;

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::AbilityConfig;
use crate::engine::{Grid, MoveResult, Tile};
use pattern::{Pattern, PatternSummary};

/// The four abilities of the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityId {
    /// Instant area clear, fired by a merge combo.
    QiankunCircle,
    /// Instant pattern chain clear, fired when a pattern is on the board.
    HuntianSash,
    /// Timed merge score multiplier.
    FireSpear,
    /// Timed multi-direction turns.
    ThreeHeads,
}

impl AbilityId {
    pub const ALL: [AbilityId; 4] =
        [AbilityId::QiankunCircle, AbilityId::HuntianSash, AbilityId::FireSpear, AbilityId::ThreeHeads];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            AbilityId::QiankunCircle => 0,
            AbilityId::HuntianSash => 1,
            AbilityId::FireSpear => 2,
            AbilityId::ThreeHeads => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbilityId::QiankunCircle => "qiankun_circle",
            AbilityId::HuntianSash => "huntian_sash",
            AbilityId::FireSpear => "fire_spear",
            AbilityId::ThreeHeads => "three_heads",
        }
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AbilityId {
    type Err = TriggerRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbilityId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| TriggerRejection::UnknownAbility(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Manual,
    ComboThreshold,
    PatternDetected,
}

/// Static description of one ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: AbilityId,
    pub cooldown_ms: u64,
    /// 0 means the ability is instant.
    #[serde(default)]
    pub active_duration_ms: u64,
    pub trigger: TriggerKind,
    pub unlock_score: u64,
    #[serde(default)]
    pub combo_threshold: Option<u32>,
}

impl AbilityDefinition {
    pub fn default_for(id: AbilityId) -> Self {
        match id {
            AbilityId::QiankunCircle => AbilityDefinition {
                id,
                cooldown_ms: 15_000,
                active_duration_ms: 0,
                trigger: TriggerKind::ComboThreshold,
                unlock_score: 500,
                combo_threshold: Some(5),
            },
            AbilityId::HuntianSash => AbilityDefinition {
                id,
                cooldown_ms: 20_000,
                active_duration_ms: 0,
                trigger: TriggerKind::PatternDetected,
                unlock_score: 1_000,
                combo_threshold: None,
            },
            AbilityId::FireSpear => AbilityDefinition {
                id,
                cooldown_ms: 30_000,
                active_duration_ms: 10_000,
                trigger: TriggerKind::Manual,
                unlock_score: 2_000,
                combo_threshold: None,
            },
            AbilityId::ThreeHeads => AbilityDefinition {
                id,
                cooldown_ms: 45_000,
                active_duration_ms: 8_000,
                trigger: TriggerKind::Manual,
                unlock_score: 4_000,
                combo_threshold: None,
            },
        }
    }

    #[inline]
    pub fn is_instant(&self) -> bool { self.active_duration_ms == 0 }
}

/// Mutable per-ability state. Only the controller writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityState {
    pub unlocked: bool,
    pub available: bool,
    pub cooldown_remaining_ms: u64,
    pub active: bool,
    /// Controller clock reading at activation.
    pub activated_at_ms: Option<u64>,
    pub usage_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityPhase {
    Locked,
    Available,
    Active,
    Cooldown,
}

impl AbilityState {
    pub fn phase(&self) -> AbilityPhase {
        if !self.unlocked {
            AbilityPhase::Locked
        } else if self.active {
            AbilityPhase::Active
        } else if self.cooldown_remaining_ms > 0 || !self.available {
            AbilityPhase::Cooldown
        } else {
            AbilityPhase::Available
        }
    }
}

/// Transition and effect records emitted by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AbilityEvent {
    #[serde(rename = "abilityUnlocked")]
    Unlocked {
        #[serde(rename = "abilityId")]
        ability: AbilityId,
    },
    #[serde(rename = "abilityReady")]
    Ready {
        #[serde(rename = "abilityId")]
        ability: AbilityId,
    },
    #[serde(rename = "abilityActivated")]
    Activated {
        #[serde(rename = "abilityId")]
        ability: AbilityId,
    },
    #[serde(rename = "abilityDeactivated")]
    Deactivated {
        #[serde(rename = "abilityId")]
        ability: AbilityId,
    },
    #[serde(rename_all = "camelCase")]
    AreaCleared { cleared_tiles: Vec<Tile>, score: u64 },
    #[serde(rename_all = "camelCase")]
    ChainCleared { patterns: Vec<PatternSummary>, total_score: u64, total_cleared: usize },
    /// The consecutive-merge counter ran out of idle time.
    ComboReset,
}

/// Why a manual trigger was refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerRejection {
    #[error("unknown ability {0:?}")]
    UnknownAbility(String),
    #[error("{0} cannot be triggered manually")]
    NotManual(AbilityId),
    #[error("{0} is locked")]
    Locked(AbilityId),
    #[error("{0} is already active")]
    AlreadyActive(AbilityId),
    #[error("{0} is on cooldown ({1} ms left)")]
    OnCooldown(AbilityId, u64),
    #[error("{0} is not available")]
    Unavailable(AbilityId),
    #[error("the game is paused")]
    Paused,
}

/// Owns every [`AbilityState`] of one session and applies ability effects to a [`Grid`].
#[derive(Debug, Clone)]
pub struct AbilityController {
    config: AbilityConfig,
    definitions: Vec<AbilityDefinition>,
    states: Vec<AbilityState>,
    clock_ms: u64,
    consecutive_merges: u32,
    combo_idle_ms: u64,
    paused: bool,
    last_rejection: Option<TriggerRejection>,
}

impl AbilityController {
    pub fn new(config: AbilityConfig) -> Self {
        let definitions = AbilityId::ALL.iter().map(|&id| config.definition(id)).collect();
        Self {
            config,
            definitions,
            states: vec![AbilityState::default(); AbilityId::ALL.len()],
            clock_ms: 0,
            consecutive_merges: 0,
            combo_idle_ms: 0,
            paused: false,
            last_rejection: None,
        }
    }

    /// Back to the initial state for a new game. Definitions are kept.
    pub fn reset(&mut self) {
        self.states.iter_mut().for_each(|s| *s = AbilityState::default());
        self.clock_ms = 0;
        self.consecutive_merges = 0;
        self.combo_idle_ms = 0;
        self.paused = false;
        self.last_rejection = None;
    }

    pub fn config(&self) -> &AbilityConfig { &self.config }

    pub fn definition(&self, id: AbilityId) -> &AbilityDefinition { &self.definitions[id.index()] }

    pub fn state(&self, id: AbilityId) -> &AbilityState { &self.states[id.index()] }

    #[inline]
    pub fn is_active(&self, id: AbilityId) -> bool { self.state(id).active }

    /// While true, one logical turn slides in several directions.
    pub fn multi_direction_active(&self) -> bool { self.is_active(AbilityId::ThreeHeads) }

    pub fn consecutive_merges(&self) -> u32 { self.consecutive_merges }

    pub fn clock_ms(&self) -> u64 { self.clock_ms }

    pub fn unlocked_count(&self) -> usize { self.states.iter().filter(|s| s.unlocked).count() }

    /// Remaining cooldown of every ability, in roster order.
    pub fn cooldowns(&self) -> Vec<(AbilityId, u64)> {
        AbilityId::ALL.iter().map(|&id| (id, self.state(id).cooldown_remaining_ms)).collect()
    }

    pub fn pause(&mut self) { self.paused = true; }

    pub fn resume(&mut self) { self.paused = false; }

    pub fn is_paused(&self) -> bool { self.paused }

    /// Reason the most recent manual trigger failed, cleared by the next success.
    pub fn last_rejection(&self) -> Option<&TriggerRejection> { self.last_rejection.as_ref() }

    /// Advance every timer by `delta_ms`, then unlock and auto-trigger.
    pub fn update(&mut self, delta_ms: u64, grid: &mut Grid) -> Vec<AbilityEvent> {
        let mut events = Vec::new();
        if self.paused {
            return events;
        }
        self.clock_ms = self.clock_ms.saturating_add(delta_ms);

        for id in AbilityId::ALL {
            let state = &mut self.states[id.index()];
            if state.cooldown_remaining_ms > 0 {
                state.cooldown_remaining_ms = state.cooldown_remaining_ms.saturating_sub(delta_ms);
                if state.cooldown_remaining_ms == 0 && state.unlocked {
                    state.available = true;
                    events.push(AbilityEvent::Ready { ability: id });
                }
            }
        }

        for id in AbilityId::ALL {
            let def = &self.definitions[id.index()];
            let state = &self.states[id.index()];
            if !state.active || def.is_instant() {
                continue;
            }
            let elapsed = self.clock_ms.saturating_sub(state.activated_at_ms.unwrap_or(self.clock_ms));
            if elapsed >= def.active_duration_ms {
                self.deactivate(id, grid, &mut events);
            }
        }

        self.check_unlocks(grid.score(), &mut events);
        self.check_auto_triggers(grid, &mut events);

        if self.combo_idle_ms > 0 {
            self.combo_idle_ms = self.combo_idle_ms.saturating_sub(delta_ms);
            if self.combo_idle_ms == 0 && self.consecutive_merges > 0 {
                self.consecutive_merges = 0;
                events.push(AbilityEvent::ComboReset);
            }
        }
        events
    }

    /// Count a merge-producing move towards the combo and restart the idle timer.
    pub fn on_merge(&mut self, result: &MoveResult) {
        if result.merged.is_empty() {
            return;
        }
        self.consecutive_merges = self.consecutive_merges.saturating_add(1);
        self.combo_idle_ms = self.config.combo_idle_reset_ms;
    }

    /// Would a manual trigger of `id` succeed right now?
    pub fn check_trigger(&self, id: AbilityId) -> Result<(), TriggerRejection> {
        if self.paused {
            return Err(TriggerRejection::Paused);
        }
        if self.definition(id).trigger != TriggerKind::Manual {
            return Err(TriggerRejection::NotManual(id));
        }
        let state = self.state(id);
        if !state.unlocked {
            return Err(TriggerRejection::Locked(id));
        }
        if state.active {
            return Err(TriggerRejection::AlreadyActive(id));
        }
        if state.cooldown_remaining_ms > 0 {
            return Err(TriggerRejection::OnCooldown(id, state.cooldown_remaining_ms));
        }
        if !state.available {
            return Err(TriggerRejection::Unavailable(id));
        }
        Ok(())
    }

    /// Fire a manual ability. On refusal nothing changes and the reason is
    /// also kept for [`Self::last_rejection`].
    pub fn trigger_manual(&mut self, id: AbilityId, grid: &mut Grid) -> Result<Vec<AbilityEvent>, TriggerRejection> {
        if let Err(rejection) = self.check_trigger(id) {
            debug!("manual trigger of {} refused: {}", id, rejection);
            self.last_rejection = Some(rejection.clone());
            return Err(rejection);
        }
        self.last_rejection = None;
        let mut events = Vec::new();
        self.activate(id, grid, None, &mut events);
        Ok(events)
    }

    /// [`Self::trigger_manual`] keyed by the ability's string id.
    pub fn trigger_named(&mut self, name: &str, grid: &mut Grid) -> Result<Vec<AbilityEvent>, TriggerRejection> {
        match name.parse::<AbilityId>() {
            Ok(id) => self.trigger_manual(id, grid),
            Err(rejection) => {
                self.last_rejection = Some(rejection.clone());
                Err(rejection)
            }
        }
    }

    /// Rehydrate timers from a save. Unlocks follow `score` silently;
    /// cooldowns are clamped to each ability's configured cooldown.
    pub fn restore(&mut self, score: u64, cooldowns: &[(AbilityId, u64)], consecutive_merges: u32) {
        self.reset();
        for (state, def) in self.states.iter_mut().zip(&self.definitions) {
            if score >= def.unlock_score {
                state.unlocked = true;
                state.available = true;
            }
        }
        for &(id, remaining) in cooldowns {
            let cap = self.definitions[id.index()].cooldown_ms;
            let state = &mut self.states[id.index()];
            // Over-long saved cooldowns cap at the full cooldown rather than zero.
            state.cooldown_remaining_ms = remaining.min(cap);
            if state.cooldown_remaining_ms > 0 {
                state.available = false;
            }
        }
        self.consecutive_merges = consecutive_merges;
        if consecutive_merges > 0 {
            self.combo_idle_ms = self.config.combo_idle_reset_ms;
        }
    }

    fn is_ready(&self, id: AbilityId) -> bool {
        let s = self.state(id);
        s.unlocked && s.available && s.cooldown_remaining_ms == 0 && !s.active
    }

    fn check_unlocks(&mut self, score: u64, events: &mut Vec<AbilityEvent>) {
        for id in AbilityId::ALL {
            let unlock_score = self.definitions[id.index()].unlock_score;
            let state = &mut self.states[id.index()];
            if !state.unlocked && score >= unlock_score {
                state.unlocked = true;
                state.available = state.cooldown_remaining_ms == 0 && !state.active;
                info!("ability {} unlocked at score {}", id, score);
                events.push(AbilityEvent::Unlocked { ability: id });
            }
        }
    }

    fn check_auto_triggers(&mut self, grid: &mut Grid, events: &mut Vec<AbilityEvent>) {
        for id in AbilityId::ALL {
            if !self.is_ready(id) {
                continue;
            }
            let AbilityDefinition { trigger, combo_threshold, .. } = *self.definition(id);
            match trigger {
                TriggerKind::Manual => {}
                TriggerKind::ComboThreshold => {
                    let threshold = combo_threshold.unwrap_or(self.config.area.combo_bonus_threshold);
                    if self.consecutive_merges >= threshold {
                        self.activate(id, grid, None, events);
                    }
                }
                TriggerKind::PatternDetected => {
                    let found = pattern::detect_patterns(grid, &self.config.pattern);
                    if !found.is_empty() {
                        self.activate(id, grid, Some(found), events);
                    }
                }
            }
        }
    }

    fn activate(&mut self, id: AbilityId, grid: &mut Grid, patterns: Option<Vec<Pattern>>, events: &mut Vec<AbilityEvent>) {
        let def = self.definitions[id.index()].clone();
        let state = &mut self.states[id.index()];
        state.active = true;
        state.available = false;
        state.cooldown_remaining_ms = def.cooldown_ms;
        state.activated_at_ms = Some(self.clock_ms);
        state.usage_count = state.usage_count.saturating_add(1);
        debug!("ability {} activated (use #{})", id, state.usage_count);
        events.push(AbilityEvent::Activated { ability: id });

        match id {
            AbilityId::QiankunCircle => {
                let clear = area::clear_area(grid, &self.config.area, self.consecutive_merges);
                debug!("area clear removed {} tiles for {} points", clear.cleared.len(), clear.score);
                self.consecutive_merges = 0;
                self.combo_idle_ms = 0;
                events.push(AbilityEvent::AreaCleared { cleared_tiles: clear.cleared, score: clear.score });
            }
            AbilityId::HuntianSash => {
                let found = patterns.unwrap_or_else(|| pattern::detect_patterns(grid, &self.config.pattern));
                let chain = pattern::apply_chain(grid, &found);
                debug!("chain clear applied {} patterns for {} points", chain.patterns.len(), chain.total_score);
                events.push(AbilityEvent::ChainCleared {
                    total_cleared: chain.cleared.len(),
                    patterns: chain.patterns,
                    total_score: chain.total_score,
                });
            }
            AbilityId::FireSpear => grid.set_score_multiplier(self.config.score_multiplier),
            AbilityId::ThreeHeads => {}
        }

        if def.is_instant() {
            self.deactivate(id, grid, events);
        }
    }

    fn deactivate(&mut self, id: AbilityId, grid: &mut Grid, events: &mut Vec<AbilityEvent>) {
        let state = &mut self.states[id.index()];
        state.active = false;
        state.activated_at_ms = None;
        if id == AbilityId::FireSpear {
            grid.set_score_multiplier(1.0);
        }
        debug!("ability {} deactivated", id);
        events.push(AbilityEvent::Deactivated { ability: id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MergeEvent, Position};

    fn grid(rows: &[[u32; 4]; 4]) -> Grid {
        let rows: Vec<Vec<u32>> = rows.iter().map(|r| r.to_vec()).collect();
        Grid::from_rows(&rows).unwrap()
    }

    fn merge_move() -> MoveResult {
        MoveResult { moved: true, merged: vec![MergeEvent { position: Position::new(0, 0), value: 4 }], score: 4 }
    }

    /// A board with no progression, cluster or symmetry.
    fn quiet_board() -> Grid { grid(&[[2, 0, 0, 0], [0, 0, 0, 0], [0, 0, 128, 0], [0, 0, 0, 0]]) }

    #[test]
    fn unlock_threshold_is_inclusive() {
        let mut g = quiet_board();
        let mut ctl = AbilityController::new(AbilityConfig::default());
        g.set_score(1_999);
        ctl.update(10, &mut g);
        assert_eq!(ctl.state(AbilityId::FireSpear).phase(), AbilityPhase::Locked);
        assert_eq!(ctl.check_trigger(AbilityId::FireSpear), Err(TriggerRejection::Locked(AbilityId::FireSpear)));

        g.set_score(2_000);
        let events = ctl.update(10, &mut g);
        assert!(events.contains(&AbilityEvent::Unlocked { ability: AbilityId::FireSpear }));
        assert_eq!(ctl.state(AbilityId::FireSpear).phase(), AbilityPhase::Available);
        assert_eq!(ctl.check_trigger(AbilityId::FireSpear), Ok(()));
    }

    #[test]
    fn unlock_is_monotonic() {
        let mut g = quiet_board();
        let mut ctl = AbilityController::new(AbilityConfig::default());
        g.set_score(5_000);
        ctl.update(10, &mut g);
        g.set_score(0);
        let events = ctl.update(10, &mut g);
        assert!(events.is_empty());
        assert!(AbilityId::ALL.iter().all(|&id| ctl.state(id).unlocked));
    }

    #[test]
    fn refused_trigger_changes_nothing() {
        let mut g = quiet_board();
        g.set_score(1_999);
        let before = g.clone();
        let mut ctl = AbilityController::new(AbilityConfig::default());
        assert_eq!(ctl.trigger_manual(AbilityId::FireSpear, &mut g), Err(TriggerRejection::Locked(AbilityId::FireSpear)));
        assert_eq!(g, before);
        assert_eq!(ctl.state(AbilityId::FireSpear).usage_count, 0);
        assert_eq!(ctl.last_rejection(), Some(&TriggerRejection::Locked(AbilityId::FireSpear)));
    }

    #[test]
    fn auto_abilities_reject_manual_triggers() {
        let mut g = quiet_board();
        g.set_score(10_000);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        assert_eq!(
            ctl.trigger_manual(AbilityId::QiankunCircle, &mut g),
            Err(TriggerRejection::NotManual(AbilityId::QiankunCircle))
        );
        assert!(matches!(ctl.trigger_named("ring_of_fire", &mut g), Err(TriggerRejection::UnknownAbility(_))));
        assert!(matches!(ctl.last_rejection(), Some(TriggerRejection::UnknownAbility(_))));
    }

    #[test]
    fn buff_runs_for_its_duration_then_cools_down() {
        let mut g = quiet_board();
        g.set_score(2_000);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.update(0, &mut g);
        let events = ctl.trigger_named("fire_spear", &mut g).unwrap();
        assert_eq!(events, vec![AbilityEvent::Activated { ability: AbilityId::FireSpear }]);
        assert_eq!(ctl.state(AbilityId::FireSpear).phase(), AbilityPhase::Active);
        assert_eq!(g.score_multiplier(), 1.5);
        assert_eq!(
            ctl.trigger_manual(AbilityId::FireSpear, &mut g),
            Err(TriggerRejection::AlreadyActive(AbilityId::FireSpear))
        );

        let events = ctl.update(9_999, &mut g);
        assert!(events.is_empty());
        let events = ctl.update(1, &mut g);
        assert_eq!(events, vec![AbilityEvent::Deactivated { ability: AbilityId::FireSpear }]);
        assert_eq!(g.score_multiplier(), 1.0);
        assert_eq!(ctl.state(AbilityId::FireSpear).phase(), AbilityPhase::Cooldown);
        assert_eq!(
            ctl.trigger_manual(AbilityId::FireSpear, &mut g),
            Err(TriggerRejection::OnCooldown(AbilityId::FireSpear, 20_000))
        );

        let events = ctl.update(20_000, &mut g);
        assert_eq!(events, vec![AbilityEvent::Ready { ability: AbilityId::FireSpear }]);
        assert!(ctl.trigger_manual(AbilityId::FireSpear, &mut g).is_ok());
        assert_eq!(ctl.state(AbilityId::FireSpear).usage_count, 2);
    }

    #[test]
    fn combo_threshold_fires_area_clear() {
        let mut g = grid(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 64, 128]]);
        g.set_score(600);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        for _ in 0..4 {
            ctl.on_merge(&merge_move());
            let events = ctl.update(100, &mut g);
            assert!(!events.iter().any(|e| matches!(e, AbilityEvent::Activated { ability: AbilityId::QiankunCircle })));
        }
        ctl.on_merge(&merge_move());
        assert_eq!(ctl.consecutive_merges(), 5);
        let tiles_before = g.tiles().count();
        let events = ctl.update(100, &mut g);
        assert!(events.contains(&AbilityEvent::Activated { ability: AbilityId::QiankunCircle }));
        assert!(events.contains(&AbilityEvent::Deactivated { ability: AbilityId::QiankunCircle }));
        let cleared = events.iter().find_map(|e| match e {
            AbilityEvent::AreaCleared { cleared_tiles, .. } => Some(cleared_tiles.len()),
            _ => None,
        });
        assert_eq!(cleared, Some(4));
        assert_eq!(g.tiles().count(), tiles_before - 4);
        assert_eq!(ctl.consecutive_merges(), 0);
        assert_eq!(ctl.state(AbilityId::QiankunCircle).phase(), AbilityPhase::Cooldown);
    }

    #[test]
    fn combo_resets_after_idle_gap() {
        let mut g = quiet_board();
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.on_merge(&merge_move());
        ctl.on_merge(&MoveResult { moved: true, merged: vec![], score: 0 });
        assert_eq!(ctl.consecutive_merges(), 1);
        assert!(ctl.update(2_999, &mut g).is_empty());
        assert_eq!(ctl.consecutive_merges(), 1);
        assert_eq!(ctl.update(1, &mut g), vec![AbilityEvent::ComboReset]);
        assert_eq!(ctl.consecutive_merges(), 0);
    }

    #[test]
    fn pattern_on_board_fires_chain_clear() {
        let mut g = grid(&[[2, 4, 8, 0], [0; 4], [0; 4], [0; 4]]);
        g.set_score(1_000);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        let events = ctl.update(16, &mut g);
        let chain = events.iter().find_map(|e| match e {
            AbilityEvent::ChainCleared { total_score, total_cleared, patterns } => Some((*total_score, *total_cleared, patterns.len())),
            _ => None,
        });
        assert_eq!(chain, Some((28, 3, 1)));
        assert_eq!(g.score(), 1_028);
        assert!(g.tiles().next().is_none());
    }

    #[test]
    fn pause_freezes_every_timer() {
        let mut g = quiet_board();
        g.set_score(2_000);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.update(0, &mut g);
        ctl.trigger_manual(AbilityId::FireSpear, &mut g).unwrap();
        ctl.on_merge(&merge_move());

        ctl.pause();
        assert!(ctl.update(60_000, &mut g).is_empty());
        assert!(ctl.is_active(AbilityId::FireSpear));
        assert_eq!(ctl.state(AbilityId::FireSpear).cooldown_remaining_ms, 30_000);
        assert_eq!(ctl.consecutive_merges(), 1);
        assert_eq!(ctl.trigger_manual(AbilityId::ThreeHeads, &mut g), Err(TriggerRejection::Paused));

        ctl.resume();
        ctl.update(5_000, &mut g);
        assert!(ctl.is_active(AbilityId::FireSpear));
        assert_eq!(ctl.state(AbilityId::FireSpear).cooldown_remaining_ms, 25_000);
    }

    #[test]
    fn restore_clamps_cooldowns() {
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.restore(2_500, &[(AbilityId::FireSpear, 999_999), (AbilityId::QiankunCircle, 0)], 3);
        assert_eq!(ctl.state(AbilityId::FireSpear).cooldown_remaining_ms, 30_000);
        assert_eq!(ctl.state(AbilityId::FireSpear).phase(), AbilityPhase::Cooldown);
        assert_eq!(ctl.state(AbilityId::QiankunCircle).phase(), AbilityPhase::Available);
        assert_eq!(ctl.state(AbilityId::ThreeHeads).phase(), AbilityPhase::Locked);
        assert_eq!(ctl.unlocked_count(), 3);
        assert_eq!(ctl.consecutive_merges(), 3);
    }

    #[test]
    fn combo_count_saturates() {
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.restore(0, &[], u32::MAX);
        ctl.on_merge(&merge_move());
        assert_eq!(ctl.consecutive_merges(), u32::MAX);
    }

    #[test]
    fn reset_returns_to_locked() {
        let mut g = quiet_board();
        g.set_score(5_000);
        let mut ctl = AbilityController::new(AbilityConfig::default());
        ctl.update(1, &mut g);
        ctl.trigger_manual(AbilityId::ThreeHeads, &mut g).unwrap();
        assert!(ctl.multi_direction_active());
        ctl.reset();
        assert!(!ctl.multi_direction_active());
        assert!(AbilityId::ALL.iter().all(|&id| ctl.state(id).phase() == AbilityPhase::Locked));
    }
}
