//! Uniform-grid spatial hash for range queries.
//!
//! The index is derived data: it can always be rebuilt from the
//! [`EntityStore`]. It is updated incrementally whenever a position changes
//! and is only written on the scheduler thread; during the parallel movement
//! phase it is shared read-only.

use std::collections::HashMap;

use crate::components::EntityId;
use crate::math::{Fixed, Vec2Fixed};
use crate::store::EntityStore;

type CellKey = (i64, i64);

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialEntry {
    /// Indexed entity.
    pub id: EntityId,
    /// Position at last insert/update.
    pub position: Vec2Fixed,
}

/// Grid-based spatial partitioning structure.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: Fixed,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
    entity_cells: HashMap<EntityId, CellKey>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(Fixed::from_num(8))
    }
}

impl SpatialIndex {
    /// Create an empty index. Non-positive cell sizes fall back to 1.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        Self {
            cell_size: if cell_size > Fixed::ZERO {
                cell_size
            } else {
                Fixed::ONE
            },
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
        }
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_cells.len()
    }

    /// Check if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_cells.is_empty()
    }

    /// Check if an id is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entity_cells.contains_key(&id)
    }

    #[inline]
    fn cell_of(&self, pos: Vec2Fixed) -> CellKey {
        (
            (pos.x / self.cell_size).floor().to_num::<i64>(),
            (pos.y / self.cell_size).floor().to_num::<i64>(),
        )
    }

    /// Insert an entity. Re-inserting an indexed id moves it.
    pub fn insert(&mut self, id: EntityId, position: Vec2Fixed) {
        self.update(id, position);
    }

    /// Move an entity to a new position.
    ///
    /// Only touches the old and new cells.
    pub fn update(&mut self, id: EntityId, position: Vec2Fixed) {
        let cell = self.cell_of(position);
        if let Some(&old_cell) = self.entity_cells.get(&id) {
            if old_cell == cell {
                if let Some(entry) = self
                    .cells
                    .get_mut(&cell)
                    .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
                {
                    entry.position = position;
                    return;
                }
            } else {
                self.detach(id, old_cell);
            }
        }

        self.cells
            .entry(cell)
            .or_default()
            .push(SpatialEntry { id, position });
        self.entity_cells.insert(id, cell);
    }

    /// Remove an entity. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.entity_cells.remove(&id) {
            Some(cell) => {
                self.detach(id, cell);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, id: EntityId, cell: CellKey) {
        if let Some(entries) = self.cells.get_mut(&cell) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Clear and re-index every targetable entity in the store.
    pub fn rebuild(&mut self, store: &EntityStore) {
        self.cells.clear();
        self.entity_cells.clear();
        for entity in store.iter() {
            if entity.is_targetable() {
                self.insert(entity.id, entity.position);
            }
        }
    }

    /// Remove every indexed id the store no longer holds.
    ///
    /// Returns the purged ids, sorted ascending.
    pub fn purge_stale(&mut self, store: &EntityStore) -> Vec<EntityId> {
        let mut stale: Vec<EntityId> = self
            .entity_cells
            .keys()
            .copied()
            .filter(|&id| !store.contains(id))
            .collect();
        stale.sort_unstable();
        for &id in &stale {
            self.remove(id);
        }
        stale
    }

    /// Ids within `radius` of `center` (inclusive), sorted ascending.
    #[must_use]
    pub fn query_circle(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let radius = radius.max(Fixed::ZERO);
        let radius_sq = radius.saturating_mul(radius);
        let offset = Vec2Fixed::new(radius, radius);
        let mut results = self.collect(center - offset, center + offset, |e| {
            e.position.distance_squared(center) <= radius_sq
        });
        results.sort_unstable();
        results
    }

    /// Ids inside the axis-aligned rectangle `[min, max]`, sorted ascending.
    #[must_use]
    pub fn query_rect(&self, min: Vec2Fixed, max: Vec2Fixed) -> Vec<EntityId> {
        let lo = Vec2Fixed::new(min.x.min(max.x), min.y.min(max.y));
        let hi = Vec2Fixed::new(min.x.max(max.x), min.y.max(max.y));
        let mut results = self.collect(lo, hi, |e| {
            e.position.x >= lo.x && e.position.x <= hi.x && e.position.y >= lo.y && e.position.y <= hi.y
        });
        results.sort_unstable();
        results
    }

    fn collect(
        &self,
        lo: Vec2Fixed,
        hi: Vec2Fixed,
        keep: impl Fn(&SpatialEntry) -> bool,
    ) -> Vec<EntityId> {
        let (min_x, min_y) = self.cell_of(lo);
        let (max_x, max_y) = self.cell_of(hi);
        let mut results = Vec::new();

        // Sparse maps are cheaper to scan whole than cell by cell.
        let span = (max_x - min_x + 1).saturating_mul(max_y - min_y + 1);
        if span > self.cells.len() as i64 {
            for (&(cx, cy), entries) in &self.cells {
                if cx >= min_x && cx <= max_x && cy >= min_y && cy <= max_y {
                    results.extend(entries.iter().filter(|e| keep(e)).map(|e| e.id));
                }
            }
            return results;
        }

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    results.extend(entries.iter().filter(|e| keep(e)).map(|e| e.id));
                }
            }
        }
        results
    }

    /// Indexed position of an entity.
    #[must_use]
    pub fn position_of(&self, id: EntityId) -> Option<Vec2Fixed> {
        let cell = self.entity_cells.get(&id)?;
        self.cells
            .get(cell)?
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.position)
    }

    /// All indexed ids, sorted ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entity_cells.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SpatialIndex {
        SpatialIndex::new(Fixed::from_num(4))
    }

    #[test]
    fn test_query_circle_sorted_by_id() {
        let mut grid = index();
        grid.insert(9, Vec2Fixed::from_ints(1, 1));
        grid.insert(3, Vec2Fixed::from_ints(2, 1));
        grid.insert(5, Vec2Fixed::from_ints(30, 30));
        grid.insert(1, Vec2Fixed::from_ints(-2, 0));

        let found = grid.query_circle(Vec2Fixed::ZERO, Fixed::from_num(3));
        assert_eq!(found, vec![1, 3, 9]);
    }

    #[test]
    fn test_query_circle_boundary_is_inclusive() {
        let mut grid = index();
        grid.insert(1, Vec2Fixed::from_ints(5, 0));
        assert_eq!(grid.query_circle(Vec2Fixed::ZERO, Fixed::from_num(5)), vec![1]);
        assert!(grid
            .query_circle(Vec2Fixed::ZERO, Fixed::from_num(4.99))
            .is_empty());
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut grid = index();
        grid.insert(1, Vec2Fixed::from_ints(1, 1));
        grid.update(1, Vec2Fixed::from_ints(41, 41));

        assert!(grid
            .query_circle(Vec2Fixed::from_ints(1, 1), Fixed::from_num(2))
            .is_empty());
        assert_eq!(
            grid.query_circle(Vec2Fixed::from_ints(40, 40), Fixed::from_num(2)),
            vec![1]
        );
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.position_of(1), Some(Vec2Fixed::from_ints(41, 41)));
    }

    #[test]
    fn test_update_within_cell_refreshes_position() {
        let mut grid = index();
        grid.insert(1, Vec2Fixed::from_ints(0, 0));
        grid.update(1, Vec2Fixed::from_ints(3, 0));
        assert_eq!(grid.position_of(1), Some(Vec2Fixed::from_ints(3, 0)));
        assert!(grid
            .query_circle(Vec2Fixed::ZERO, Fixed::from_num(1))
            .is_empty());
    }

    #[test]
    fn test_remove() {
        let mut grid = index();
        grid.insert(1, Vec2Fixed::from_ints(1, 1));
        assert!(grid.remove(1));
        assert!(!grid.remove(1));
        assert!(grid.is_empty());
        assert!(grid
            .query_circle(Vec2Fixed::from_ints(1, 1), Fixed::from_num(10))
            .is_empty());
    }

    #[test]
    fn test_query_rect() {
        let mut grid = index();
        grid.insert(4, Vec2Fixed::from_ints(2, 2));
        grid.insert(2, Vec2Fixed::from_ints(10, 10));
        grid.insert(7, Vec2Fixed::from_ints(-5, 3));

        let found = grid.query_rect(Vec2Fixed::from_ints(10, 10), Vec2Fixed::from_ints(0, 0));
        assert_eq!(found, vec![2, 4]);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = index();
        grid.insert(1, Vec2Fixed::from_ints(-1, -1));
        assert_eq!(
            grid.query_circle(Vec2Fixed::from_ints(1, 1), Fixed::from_num(3)),
            vec![1]
        );
    }

    #[test]
    fn test_large_query_on_sparse_index() {
        let mut grid = SpatialIndex::new(Fixed::ONE);
        grid.insert(1, Vec2Fixed::from_ints(500, 500));
        grid.insert(2, Vec2Fixed::from_ints(-500, -500));
        let found = grid.query_rect(Vec2Fixed::from_ints(-1000, -1000), Vec2Fixed::from_ints(1000, 1000));
        assert_eq!(found, vec![1, 2]);
    }
}
