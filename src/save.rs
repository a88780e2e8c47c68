//! Save blob for persistence collaborators.
//!
//! The JSON shape is
//! `{grid, score, moves, playTime, skillCooldowns, nezhaLevel, consecutiveMerges}`
//! with `grid` row-major (`grid[y][x]`) and `0` for an empty cell.
//!
//! Loading is lenient: missing fields default, numbers of the wrong sign or
//! kind collapse to 0, and [`SaveBlob::repair`] turns whatever survived into
//! state the engine can trust.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::abilities::AbilityId;
use crate::config::GameConfig;
use crate::engine::{is_tile_value, Grid, Position};

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed save: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveBlob {
    #[serde(deserialize_with = "lenient_grid")]
    pub grid: Option<Vec<Vec<u32>>>,
    #[serde(deserialize_with = "lenient_u64")]
    pub score: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub moves: u64,
    /// Milliseconds of unpaused play.
    #[serde(deserialize_with = "lenient_u64")]
    pub play_time: u64,
    /// Remaining cooldown per ability id, in milliseconds.
    #[serde(deserialize_with = "lenient_cooldowns")]
    pub skill_cooldowns: BTreeMap<String, u64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub nezha_level: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub consecutive_merges: u32,
}

/// Save contents after repair, ready to rehydrate a session.
#[derive(Debug, Clone)]
pub struct RepairedSave {
    pub grid: Grid,
    pub moves: u64,
    pub play_time_ms: u64,
    pub cooldowns: Vec<(AbilityId, u64)>,
    pub consecutive_merges: u32,
    pub nezha_level: u32,
}

impl SaveBlob {
    pub fn from_json_str(s: &str) -> Result<Self, SaveError> { Ok(serde_json::from_str(s)?) }

    pub fn to_json_string(&self) -> Result<String, SaveError> { Ok(serde_json::to_string(self)?) }

    /// Repair the blob against `config`.
    ///
    /// - a grid that is not `board_size` square is replaced by an empty board
    /// - cells that are not powers of two ≥ 2 are emptied
    /// - unknown ability ids are dropped; cooldowns are clamped later by the controller
    /// - `nezhaLevel` is clamped to `1..=1 + abilities`
    /// - `consecutiveMerges` is clamped to the largest combo threshold
    pub fn repair(&self, config: &GameConfig) -> RepairedSave {
        let mut grid = config.new_grid();
        match &self.grid {
            Some(rows) if rows.len() == grid.size() && rows.iter().all(|r| r.len() == grid.size()) => {
                for (y, row) in rows.iter().enumerate() {
                    for (x, &value) in row.iter().enumerate() {
                        if value == 0 {
                            continue;
                        }
                        if is_tile_value(value) {
                            grid.place_tile(Position::new(x, y), value);
                        } else {
                            warn!("save: dropping invalid tile value {} at ({}, {})", value, x, y);
                        }
                    }
                }
            }
            Some(_) => warn!("save: grid shape does not match a {0}x{0} board, starting empty", grid.size()),
            None => {}
        }
        grid.set_score(self.score);

        let cooldowns = self
            .skill_cooldowns
            .iter()
            .filter_map(|(name, &ms)| match name.parse::<AbilityId>() {
                Ok(id) => Some((id, ms)),
                Err(_) => {
                    warn!("save: ignoring cooldown for unknown ability {:?}", name);
                    None
                }
            })
            .collect();

        RepairedSave {
            grid,
            moves: self.moves,
            play_time_ms: self.play_time,
            cooldowns,
            consecutive_merges: self.consecutive_merges.min(max_combo(config)),
            nezha_level: self.nezha_level.clamp(1, 1 + AbilityId::ALL.len() as u32),
        }
    }
}

fn max_combo(config: &GameConfig) -> u32 {
    let abilities = &config.abilities;
    abilities
        .definitions
        .iter()
        .filter_map(|d| d.combo_threshold)
        .fold(abilities.area.combo_bonus_threshold, u32::max)
}

pub fn read_blob<P: AsRef<Path>>(path: P) -> Result<SaveBlob, SaveError> {
    let data = fs::read_to_string(path)?;
    SaveBlob::from_json_str(&data)
}

/// Write `blob` as JSON, creating parent directories as needed.
pub fn write_blob<P: AsRef<Path>>(path: P, blob: &SaveBlob) -> Result<(), SaveError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, blob.to_json_string()?)?;
    Ok(())
}

fn value_to_u64(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(value_to_u64(&Value::deserialize(d)?))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(value_to_u64(&Value::deserialize(d)?).min(u32::MAX as u64) as u32)
}

fn lenient_cooldowns<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), value_to_u64(v))).collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_grid<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Vec<u32>>>, D::Error> {
    let Value::Array(rows) = Value::deserialize(d)? else { return Ok(None) };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Array(cells) = row else { return Ok(Some(Vec::new())) };
        out.push(cells.iter().map(|c| value_to_u64(c).min(u32::MAX as u64) as u32).collect());
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_the_full_shape() {
        let blob = SaveBlob::from_json_str(
            r#"{
                "grid": [[2,0,0,0],[0,4,0,0],[0,0,8,0],[0,0,0,16]],
                "score": 1234, "moves": 56, "playTime": 78000,
                "skillCooldowns": { "fire_spear": 1500 },
                "nezhaLevel": 3, "consecutiveMerges": 2
            }"#,
        )
        .unwrap();
        assert_eq!(blob.score, 1234);
        assert_eq!(blob.play_time, 78_000);
        assert_eq!(blob.skill_cooldowns.get("fire_spear"), Some(&1500));
        let repaired = blob.repair(&GameConfig::default());
        assert_eq!(repaired.grid.to_rows()[3][3], 16);
        assert_eq!(repaired.grid.score(), 1234);
        assert_eq!(repaired.cooldowns, vec![(AbilityId::FireSpear, 1500)]);
        assert_eq!(repaired.nezha_level, 3);
    }

    #[test]
    fn missing_and_wrong_typed_fields_default() {
        let blob = SaveBlob::from_json_str(
            r#"{ "score": -50, "moves": 3.7, "playTime": null, "skillCooldowns": [1, 2], "nezhaLevel": 99 }"#,
        )
        .unwrap();
        assert_eq!(blob.score, 0);
        assert_eq!(blob.moves, 3);
        assert_eq!(blob.play_time, 0);
        assert!(blob.skill_cooldowns.is_empty());
        assert!(blob.grid.is_none());
        let repaired = blob.repair(&GameConfig::default());
        assert_eq!(repaired.nezha_level, 5);
        assert!(repaired.grid.tiles().next().is_none());
        assert_eq!(SaveBlob::from_json_str("{}").unwrap(), SaveBlob::default());
    }

    #[test]
    fn bad_grids_are_discarded_or_cleaned() {
        let cfg = GameConfig::default();
        let blob = SaveBlob::from_json_str(r#"{ "grid": [[2,2],[2,2]] }"#).unwrap();
        assert!(blob.repair(&cfg).grid.tiles().next().is_none());

        let blob = SaveBlob::from_json_str(r#"{ "grid": [[2,0,0,0],"oops",[0,0,0,0],[0,0,0,0]] }"#).unwrap();
        assert!(blob.repair(&cfg).grid.tiles().next().is_none());

        let blob = SaveBlob::from_json_str(r#"{ "grid": [[3,2,-4,1],[0,0,0,0],[0,0,0,0],[0,0,0,64]] }"#).unwrap();
        let grid = blob.repair(&cfg).grid;
        assert_eq!(grid.to_rows()[0], vec![0, 2, 0, 0]);
        assert_eq!(grid.to_rows()[3][3], 64);
    }

    #[test]
    fn oversized_numbers_are_tamed() {
        let blob = SaveBlob::from_json_str(
            r#"{
                "grid": [[2147483648,1073741824,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,4294967296]],
                "score": 18446744073709551615, "moves": 18446744073709551615,
                "consecutiveMerges": 99999999999
            }"#,
        )
        .unwrap();
        assert_eq!(blob.consecutive_merges, u32::MAX);
        let repaired = blob.repair(&GameConfig::default());
        assert_eq!(repaired.grid.to_rows()[0], vec![0, 1 << 30, 0, 0]);
        assert_eq!(repaired.grid.to_rows()[3][3], 0);
        assert_eq!(repaired.grid.score(), u64::MAX);
        assert_eq!(repaired.moves, u64::MAX);
        assert_eq!(repaired.consecutive_merges, 5);
    }

    #[test]
    fn unknown_cooldowns_are_dropped() {
        let blob = SaveBlob::from_json_str(r#"{ "skillCooldowns": { "mystery": 10, "three_heads": 20 } }"#).unwrap();
        assert_eq!(blob.repair(&GameConfig::default()).cooldowns, vec![(AbilityId::ThreeHeads, 20)]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(SaveBlob::from_json_str("{ not json"), Err(SaveError::Json(_))));
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("save.json");
        let mut blob = SaveBlob { score: 88, moves: 4, ..SaveBlob::default() };
        blob.grid = Some(vec![vec![2, 0, 0, 0], vec![0; 4], vec![0; 4], vec![0, 0, 0, 4]]);
        blob.skill_cooldowns.insert("huntian_sash".to_string(), 900);
        write_blob(&path, &blob).unwrap();
        assert_eq!(read_blob(&path).unwrap(), blob);
        assert!(matches!(read_blob(dir.path().join("absent.json")), Err(SaveError::Io(_))));
    }
}
