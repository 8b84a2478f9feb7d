//! Broad phase: cheap bounding-box culling that feeds candidate pairs to the narrow phase.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::core::collidable::Collidable;
use crate::core::mesh::Aabb;
use crate::utils::allocator::{Arena, CollidableId};

/// Produces collidable pairs whose bounds overlap.
///
/// Pairs are canonical `(lower, higher)` ids, each reported once. Two static collidables and
/// two collidables of the same entity never form a pair.
pub trait BroadPhase: Send {
    fn find_pairs(
        &mut self,
        collidables: &Arena<Collidable, CollidableId>,
        out: &mut Vec<(CollidableId, CollidableId)>,
    );
}

fn may_collide(a: &Collidable, b: &Collidable) -> bool {
    !(a.is_static() && b.is_static()) && a.entity != b.entity
}

fn canonical(a: CollidableId, b: CollidableId) -> (CollidableId, CollidableId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Tests every pair of bounds. Fine for scenes of a few hundred collidables.
#[derive(Debug, Default, Clone)]
pub struct AllPairsBroadPhase {
    entries: Vec<(CollidableId, Aabb)>,
}

impl AllPairsBroadPhase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BroadPhase for AllPairsBroadPhase {
    fn find_pairs(
        &mut self,
        collidables: &Arena<Collidable, CollidableId>,
        out: &mut Vec<(CollidableId, CollidableId)>,
    ) {
        self.entries.clear();
        self.entries
            .extend(collidables.iter().map(|(id, collidable)| (id, *collidable.bounds())));

        for (i, (id_a, bounds_a)) in self.entries.iter().enumerate() {
            for (id_b, bounds_b) in &self.entries[i + 1..] {
                if !bounds_a.intersects(bounds_b) {
                    continue;
                }
                let (Some(a), Some(b)) = (collidables.get(*id_a), collidables.get(*id_b)) else {
                    continue;
                };
                if may_collide(a, b) {
                    out.push(canonical(*id_a, *id_b));
                }
            }
        }
    }
}

type Cell = (i32, i32, i32);

/// Uniform hash grid. Collidables spanning too many cells, such as terrain, are kept aside and
/// tested against everything.
#[derive(Debug, Clone)]
pub struct SpatialGridBroadPhase {
    cell_size: f32,
    /// Collidables covering more cells than this skip the grid.
    pub max_cells_per_collidable: usize,
    grid: HashMap<Cell, Vec<CollidableId>>,
    oversized: Vec<CollidableId>,
    seen: HashSet<(CollidableId, CollidableId)>,
}

impl SpatialGridBroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            max_cells_per_collidable: 64,
            grid: HashMap::new(),
            oversized: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn world_to_grid(&self, pos: Vec3) -> Cell {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    fn cell_span(&self, bounds: &Aabb) -> (Cell, Cell, usize) {
        let min = self.world_to_grid(bounds.min);
        let max = self.world_to_grid(bounds.max);
        let count = |lo: i32, hi: i32| (hi as i64 - lo as i64 + 1).max(0) as usize;
        let cells = count(min.0, max.0)
            .saturating_mul(count(min.1, max.1))
            .saturating_mul(count(min.2, max.2));
        (min, max, cells)
    }

    fn rebuild(&mut self, collidables: &Arena<Collidable, CollidableId>) {
        self.grid.clear();
        self.oversized.clear();

        for (id, collidable) in collidables.iter() {
            let (min, max, cells) = self.cell_span(collidable.bounds());
            if cells > self.max_cells_per_collidable {
                self.oversized.push(id);
                continue;
            }
            for x in min.0..=max.0 {
                for y in min.1..=max.1 {
                    for z in min.2..=max.2 {
                        self.grid.entry((x, y, z)).or_default().push(id);
                    }
                }
            }
        }
    }

    fn consider(
        &mut self,
        collidables: &Arena<Collidable, CollidableId>,
        id_a: CollidableId,
        id_b: CollidableId,
        out: &mut Vec<(CollidableId, CollidableId)>,
    ) {
        if id_a == id_b {
            return;
        }
        let key = canonical(id_a, id_b);
        if !self.seen.insert(key) {
            return;
        }
        let (Some(a), Some(b)) = (collidables.get(id_a), collidables.get(id_b)) else {
            return;
        };
        if may_collide(a, b) && a.bounds().intersects(b.bounds()) {
            out.push(key);
        }
    }
}

impl BroadPhase for SpatialGridBroadPhase {
    fn find_pairs(
        &mut self,
        collidables: &Arena<Collidable, CollidableId>,
        out: &mut Vec<(CollidableId, CollidableId)>,
    ) {
        self.rebuild(collidables);
        self.seen.clear();

        let grid = std::mem::take(&mut self.grid);
        for occupants in grid.values() {
            for (i, id_a) in occupants.iter().enumerate() {
                for id_b in &occupants[i + 1..] {
                    self.consider(collidables, *id_a, *id_b, out);
                }
            }
        }
        self.grid = grid;

        let oversized = std::mem::take(&mut self.oversized);
        for id_a in &oversized {
            for id_b in collidables.ids() {
                self.consider(collidables, *id_a, id_b, out);
            }
        }
        self.oversized = oversized;
    }
}
