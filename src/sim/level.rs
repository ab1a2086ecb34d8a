//! Level progression and brick layouts
//!
//! Layouts are pure functions of the level number and the grid geometry, so
//! every run of a level starts from the same field.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::BrickKind;
use crate::config::{BrickConfig, LevelConfig};

/// Columns in the brick grid
pub const GRID_COLUMNS: u32 = 8;

/// One brick of a level layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickPlacement {
    pub col: u32,
    pub row: u32,
    /// Brick centre
    pub pos: Vec2,
    pub kind: BrickKind,
    pub health: u8,
    pub color_index: u8,
}

/// Centre of the grid cell at (`col`, `row`)
pub fn cell_center(col: u32, row: u32, grid: &BrickConfig) -> Vec2 {
    Vec2::new(
        grid.offset_left + col as f32 * (grid.width + grid.padding_x) + grid.width / 2.0,
        grid.offset_top + row as f32 * (grid.height + grid.padding_y) + grid.height / 2.0,
    )
}

/// `rate^(level - 1)`
pub fn speed_multiplier_for(level: u32, rate: f32) -> f32 {
    rate.powi(level.saturating_sub(1) as i32)
}

struct LayoutBuilder<'a> {
    grid: &'a BrickConfig,
    bricks: Vec<BrickPlacement>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(grid: &'a BrickConfig) -> Self {
        Self {
            grid,
            bricks: Vec::new(),
        }
    }

    fn place(&mut self, col: u32, row: u32, kind: BrickKind, health: u8, color_index: u32) {
        self.bricks.push(BrickPlacement {
            col,
            row,
            pos: cell_center(col, row, self.grid),
            kind,
            health,
            color_index: color_index as u8,
        });
    }

    fn normal(&mut self, col: u32, row: u32, color: u32) {
        self.place(col, row, BrickKind::Normal, 1, color);
    }

    fn armored(&mut self, col: u32, row: u32, health: u8, color: u32) {
        self.place(col, row, BrickKind::Armored, health, color);
    }

    fn mobile(&mut self, col: u32, row: u32, color: u32) {
        self.place(col, row, BrickKind::Mobile, 1, color);
    }

    fn wall(&mut self, col: u32, row: u32) {
        self.place(col, row, BrickKind::Indestructible, 1, 0);
    }
}

/// Brick layout for `level`. Unknown levels reuse level 1.
pub fn layout_for_level(level: u32, grid: &BrickConfig) -> Vec<BrickPlacement> {
    let mut b = LayoutBuilder::new(grid);
    match level {
        2 => {
            for col in 0..GRID_COLUMNS {
                b.armored(col, 0, 2, 0);
                b.armored(col, 1, 2, 1);
            }
            for row in 2..6 {
                for col in 0..GRID_COLUMNS {
                    b.normal(col, row, row - 2);
                }
            }
        }
        3 => {
            b.wall(0, 0);
            b.wall(7, 0);
            for col in 1..7 {
                b.armored(col, 0, 2, col % 3);
            }
            for row in 1..=3 {
                for col in 1..7 {
                    b.mobile(col, row, col % 4);
                }
            }
            for row in 4..6 {
                for col in 0..GRID_COLUMNS {
                    b.normal(col, row, row);
                }
            }
        }
        // Walled fortress around an armored core
        4 => {
            for col in 0..GRID_COLUMNS {
                b.wall(col, 0);
            }
            for row in 1..7 {
                b.wall(0, row);
                b.wall(7, row);
            }
            for row in 1..5 {
                for col in 1..7 {
                    if row == 2 && (2..=5).contains(&col) {
                        b.armored(col, row, 3, col);
                    } else {
                        b.normal(col, row, (row + col) % 5);
                    }
                }
            }
            for col in 2..6 {
                b.mobile(col, 5, col % 4);
            }
            for col in 1..7 {
                b.normal(col, 6, col % 5);
            }
        }
        // Armored diamond inside a walled mixed field
        5 => {
            for row in 0..9u32 {
                for col in 0..GRID_COLUMNS {
                    let dist = (col as f32 - 3.5).abs() + (row as f32 - 4.0).abs();
                    if dist <= 1.5 {
                        b.armored(col, row, 3, col);
                    } else if row == 0 || row == 8 || col == 0 || col == 7 {
                        b.wall(col, row);
                    } else if (row + col) % 3 == 0 {
                        b.mobile(col, row, (row * col) % 4);
                    } else {
                        b.normal(col, row, (row + col) % 5);
                    }
                }
            }
        }
        _ => {
            for row in 0..6 {
                for col in 0..GRID_COLUMNS {
                    b.normal(col, row, row);
                }
            }
        }
    }
    b.bricks
}

/// Tracks the current level (1-based, never above the level count)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSystem {
    current: u32,
    count: u32,
    speed_rate: f32,
}

impl LevelSystem {
    pub fn new(config: &LevelConfig) -> Self {
        Self {
            current: 1,
            count: config.count.max(1),
            speed_rate: config.speed_rate,
        }
    }

    pub fn current_level(&self) -> u32 {
        self.current
    }

    pub fn level_count(&self) -> u32 {
        self.count
    }

    pub fn layout(&self, grid: &BrickConfig) -> Vec<BrickPlacement> {
        layout_for_level(self.current, grid)
    }

    /// Advance; stays put on the last level
    pub fn next_level(&mut self) {
        if self.current < self.count {
            self.current += 1;
        }
    }

    pub fn is_last_level(&self) -> bool {
        self.current >= self.count
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    pub fn speed_multiplier(&self) -> f32 {
        speed_multiplier_for(self.current, self.speed_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(layout: &[BrickPlacement], kind: BrickKind) -> usize {
        layout.iter().filter(|p| p.kind == kind).count()
    }

    #[test]
    fn test_level_one_is_full_rainbow() {
        let layout = layout_for_level(1, &BrickConfig::default());
        assert_eq!(layout.len(), 48);
        assert!(layout.iter().all(|p| p.kind == BrickKind::Normal && p.health == 1));
        assert!(layout.iter().all(|p| p.color_index as u32 == p.row));
    }

    #[test]
    fn test_level_two_armored_rows() {
        let layout = layout_for_level(2, &BrickConfig::default());
        assert_eq!(layout.len(), 48);
        assert_eq!(count(&layout, BrickKind::Armored), 16);
        assert!(layout
            .iter()
            .filter(|p| p.kind == BrickKind::Armored)
            .all(|p| p.health == 2 && p.row < 2));
    }

    #[test]
    fn test_level_three_composition() {
        let layout = layout_for_level(3, &BrickConfig::default());
        assert_eq!(layout.len(), 42);
        assert_eq!(count(&layout, BrickKind::Indestructible), 2);
        assert_eq!(count(&layout, BrickKind::Armored), 6);
        assert_eq!(count(&layout, BrickKind::Mobile), 18);
        assert_eq!(count(&layout, BrickKind::Normal), 16);
    }

    #[test]
    fn test_level_four_fortress() {
        let layout = layout_for_level(4, &BrickConfig::default());
        assert_eq!(layout.len(), 54);
        assert_eq!(count(&layout, BrickKind::Indestructible), 20);
        assert_eq!(count(&layout, BrickKind::Armored), 4);
        assert!(layout
            .iter()
            .filter(|p| p.kind == BrickKind::Armored)
            .all(|p| p.health == 3));
        assert_eq!(count(&layout, BrickKind::Mobile), 4);
    }

    #[test]
    fn test_level_five_diamond() {
        let layout = layout_for_level(5, &BrickConfig::default());
        assert_eq!(layout.len(), 72);
        assert_eq!(count(&layout, BrickKind::Indestructible), 30);
        assert_eq!(count(&layout, BrickKind::Armored), 8);
    }

    #[test]
    fn test_every_level_has_destructible_bricks() {
        for level in 1..=5 {
            let layout = layout_for_level(level, &BrickConfig::default());
            assert!(layout.iter().any(|p| p.kind != BrickKind::Indestructible));
        }
    }

    #[test]
    fn test_unknown_level_falls_back_to_first() {
        let grid = BrickConfig::default();
        assert_eq!(layout_for_level(9, &grid), layout_for_level(1, &grid));
    }

    #[test]
    fn test_cell_positions() {
        let grid = BrickConfig::default();
        let first = cell_center(0, 0, &grid);
        assert!((first.x - 137.5).abs() < 0.001);
        assert!((first.y - 66.0).abs() < 0.001);
        let last = cell_center(7, 0, &grid);
        assert!((last.x + grid.width / 2.0 - (800.0 - grid.offset_left)).abs() < 0.001);
    }

    #[test]
    fn test_progression_caps_at_last_level() {
        let mut levels = LevelSystem::new(&LevelConfig::default());
        assert_eq!(levels.current_level(), 1);
        assert!(!levels.is_last_level());
        for _ in 0..10 {
            levels.next_level();
        }
        assert_eq!(levels.current_level(), 5);
        assert!(levels.is_last_level());
        levels.reset();
        assert_eq!(levels.current_level(), 1);
    }

    #[test]
    fn test_speed_multiplier() {
        let mut levels = LevelSystem::new(&LevelConfig::default());
        assert_eq!(levels.speed_multiplier(), 1.0);
        levels.next_level();
        levels.next_level();
        assert!((levels.speed_multiplier() - 1.21).abs() < 1e-5);
    }
}
