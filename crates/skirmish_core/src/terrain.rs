//! Static terrain grid plus building footprint occupancy.
//!
//! Terrain is read-only once the simulation starts, except for the
//! occupancy layer, which records which cells are covered by building
//! footprints and is only written on the scheduler thread.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, Footprint};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Surface classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Biome {
    /// Open ground.
    #[default]
    Grass,
    /// Sand and dirt.
    Sand,
    /// Woodland. Passable.
    Forest,
    /// Raised ground. Passable, elevated.
    Hill,
    /// Rivers and lakes. Ground units cannot enter.
    Water,
    /// Cliffs and rock. Ground units cannot enter.
    Rock,
}

/// One terrain cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerrainCell {
    /// Whether ground units may enter.
    pub passable: bool,
    /// Height level, 0 is ground.
    pub elevation: u8,
    /// Surface type.
    pub biome: Biome,
}

impl Default for TerrainCell {
    fn default() -> Self {
        Self::from_biome(Biome::Grass)
    }
}

impl TerrainCell {
    /// Default cell for a biome.
    #[must_use]
    pub const fn from_biome(biome: Biome) -> Self {
        let (passable, elevation) = match biome {
            Biome::Grass | Biome::Sand | Biome::Forest => (true, 0),
            Biome::Hill => (true, 1),
            Biome::Water => (false, 0),
            Biome::Rock => (false, 2),
        };
        Self {
            passable,
            elevation,
            biome,
        }
    }

    /// Parse a map legend character.
    ///
    /// `.` grass, `,` sand, `T` forest, `^` hill, `~` water, `#` rock.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        let biome = match symbol {
            '.' => Biome::Grass,
            ',' => Biome::Sand,
            'T' => Biome::Forest,
            '^' => Biome::Hill,
            '~' => Biome::Water,
            '#' => Biome::Rock,
            _ => return None,
        };
        Some(Self::from_biome(biome))
    }

    /// Legend character for this cell's biome.
    #[must_use]
    pub const fn symbol(&self) -> char {
        match self.biome {
            Biome::Grass => '.',
            Biome::Sand => ',',
            Biome::Forest => 'T',
            Biome::Hill => '^',
            Biome::Water => '~',
            Biome::Rock => '#',
        }
    }
}

/// Terrain grid for a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    cells: Vec<TerrainCell>,
    occupancy: Vec<Option<EntityId>>,
}

impl TerrainGrid {
    /// Create an all-grass grid.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed) -> Self {
        let count = (width as usize) * (height as usize);
        Self::from_cells(width, height, cell_size, vec![TerrainCell::default(); count])
    }

    /// Create a grid from row-major cell data.
    ///
    /// Callers validate that `cells.len() == width * height`.
    #[must_use]
    pub fn from_cells(width: u32, height: u32, cell_size: Fixed, cells: Vec<TerrainCell>) -> Self {
        let count = cells.len();
        Self {
            width,
            height,
            cell_size,
            cells,
            occupancy: vec![None; count],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// World-space extent of the map.
    #[must_use]
    pub fn world_size(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::from_num(self.width) * self.cell_size,
            Fixed::from_num(self.height) * self.cell_size,
        )
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Terrain cell at grid coordinates.
    #[must_use]
    pub fn cell(&self, x: u32, y: u32) -> Option<TerrainCell> {
        self.in_bounds(x, y).then(|| self.cells[self.index(x, y)])
    }

    /// Replace a terrain cell. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, x: u32, y: u32, cell: TerrainCell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let index = self.index(x, y);
        self.cells[index] = cell;
        true
    }

    /// Building occupying a cell, if any.
    #[must_use]
    pub fn occupant(&self, x: u32, y: u32) -> Option<EntityId> {
        if self.in_bounds(x, y) {
            self.occupancy[self.index(x, y)]
        } else {
            None
        }
    }

    /// Convert world position to grid coordinates.
    ///
    /// Returns `None` if the position is outside the grid.
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec2Fixed) -> Option<(u32, u32)> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }
        let x = pos.x.checked_div(self.cell_size)?.to_num::<i64>();
        let y = pos.y.checked_div(self.cell_size)?.to_num::<i64>();
        if x < i64::from(self.width) && y < i64::from(self.height) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    /// Convert grid coordinates to world position (center of cell).
    #[must_use]
    pub fn grid_to_world(&self, x: u32, y: u32) -> Vec2Fixed {
        let half = self.cell_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.cell_size + half,
            Fixed::from_num(y) * self.cell_size + half,
        )
    }

    /// Clamp a world position to the map.
    #[must_use]
    pub fn clamp_to_map(&self, pos: Vec2Fixed) -> Vec2Fixed {
        let max = self.world_size();
        let epsilon = Fixed::from_bits(1);
        pos.clamp(
            Vec2Fixed::ZERO,
            Vec2Fixed::new(max.x - epsilon, max.y - epsilon),
        )
    }

    /// Static passability of a cell, ignoring buildings.
    #[must_use]
    pub fn is_passable(&self, x: u32, y: u32) -> bool {
        self.cell(x, y).is_some_and(|c| c.passable)
    }

    /// Passable and not covered by a building.
    #[must_use]
    pub fn is_open(&self, x: u32, y: u32) -> bool {
        self.is_passable(x, y) && self.occupant(x, y).is_none()
    }

    /// Whether a ground unit may stand at a world position.
    #[must_use]
    pub fn is_walkable_at(&self, pos: Vec2Fixed) -> bool {
        self.world_to_grid(pos).is_some_and(|(x, y)| self.is_open(x, y))
    }

    /// Elevation at a world position (0 off-map).
    #[must_use]
    pub fn elevation_at(&self, pos: Vec2Fixed) -> u8 {
        self.world_to_grid(pos)
            .and_then(|(x, y)| self.cell(x, y))
            .map_or(0, |c| c.elevation)
    }

    /// Check if a footprint with top-left cell `(x, y)` fits on open ground.
    #[must_use]
    pub fn footprint_fits(&self, x: u32, y: u32, footprint: Footprint) -> bool {
        footprint_cells(x, y, footprint).all(|(cx, cy)| self.is_open(cx, cy))
    }

    /// Mark footprint cells as covered by `building`.
    pub fn occupy(&mut self, x: u32, y: u32, footprint: Footprint, building: EntityId) {
        for (cx, cy) in footprint_cells(x, y, footprint) {
            if self.in_bounds(cx, cy) {
                let index = self.index(cx, cy);
                self.occupancy[index] = Some(building);
            }
        }
    }

    /// Clear every cell covered by `building`.
    pub fn release(&mut self, building: EntityId) {
        for slot in &mut self.occupancy {
            if *slot == Some(building) {
                *slot = None;
            }
        }
    }

    /// World position of the center of a footprint with top-left cell `(x, y)`.
    #[must_use]
    pub fn footprint_center(&self, x: u32, y: u32, footprint: Footprint) -> Vec2Fixed {
        Vec2Fixed::new(
            (Fixed::from_num(x) + Fixed::from_num(footprint.width) / Fixed::from_num(2))
                * self.cell_size,
            (Fixed::from_num(y) + Fixed::from_num(footprint.height) / Fixed::from_num(2))
                * self.cell_size,
        )
    }

    /// Top-left cell of a footprint centered at `center`.
    #[must_use]
    pub fn footprint_origin(&self, center: Vec2Fixed, footprint: Footprint) -> Option<(u32, u32)> {
        let half_w = Fixed::from_num(footprint.width) / Fixed::from_num(2) * self.cell_size;
        let half_h = Fixed::from_num(footprint.height) / Fixed::from_num(2) * self.cell_size;
        // Nudge inside the first cell so exact boundaries round the right way.
        let nudge = self.cell_size / Fixed::from_num(4);
        self.world_to_grid(Vec2Fixed::new(
            center.x - half_w + nudge,
            center.y - half_h + nudge,
        ))
    }

    /// Map rendered as legend characters, one string per row.
    #[must_use]
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(TerrainCell::symbol).collect())
            .collect()
    }
}

/// Grid cells covered by a footprint with top-left cell `(x, y)`.
pub fn footprint_cells(x: u32, y: u32, footprint: Footprint) -> impl Iterator<Item = (u32, u32)> {
    (0..u32::from(footprint.height))
        .flat_map(move |dy| (0..u32::from(footprint.width)).map(move |dx| (x + dx, y + dy)))
}

/// Cells on the square ring at Chebyshev distance `radius` around `(cx, cy)`,
/// in a fixed order (row by row, top to bottom). Out-of-range coordinates are
/// skipped.
pub fn ring_cells(cx: u32, cy: u32, radius: u32) -> Vec<(u32, u32)> {
    let r = i64::from(radius);
    let (cx, cy) = (i64::from(cx), i64::from(cy));
    let mut cells = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx.abs() != r && dy.abs() != r {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x <= i64::from(u32::MAX) && y <= i64::from(u32::MAX) {
                cells.push((x as u32, y as u32));
            }
        }
    }
    cells
}
