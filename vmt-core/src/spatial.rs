// Bucket-hash spatial index over agent positions

use std::collections::HashMap;

use crate::types::{AgentId, Position};

/// Uniform bucket grid giving O(1) amortized radius queries. Bucket edge is
/// fixed at init to `max(vision_radius, interaction_radius)` so any radius
/// query touches at most the 3×3 bucket neighborhood of its bounding box.
///
/// Agents never disappear from the simulation, so there is no removal path;
/// `update` moves an id between buckets on movement.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    bucket_size: u32,
    buckets: HashMap<(i32, i32), Vec<AgentId>>,
    positions: HashMap<AgentId, Position>,
}

impl SpatialIndex {
    pub fn new(bucket_size: u32) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            buckets: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    fn bucket_of(&self, pos: Position) -> (i32, i32) {
        let size = self.bucket_size as i32;
        (pos.x.div_euclid(size), pos.y.div_euclid(size))
    }

    pub fn add(&mut self, id: AgentId, pos: Position) {
        let bucket = self.bucket_of(pos);
        self.buckets.entry(bucket).or_default().push(id);
        self.positions.insert(id, pos);
    }

    pub fn update(&mut self, id: AgentId, new_pos: Position) {
        let Some(&old_pos) = self.positions.get(&id) else {
            self.add(id, new_pos);
            return;
        };
        let old_bucket = self.bucket_of(old_pos);
        let new_bucket = self.bucket_of(new_pos);
        if old_bucket != new_bucket {
            if let Some(ids) = self.buckets.get_mut(&old_bucket) {
                ids.retain(|&other| other != id);
            }
            self.buckets.entry(new_bucket).or_default().push(id);
        }
        self.positions.insert(id, new_pos);
    }

    pub fn position_of(&self, id: AgentId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// All agent ids within Manhattan distance `radius` of `pos`, excluding
    /// `exclude` if given. Ids are returned sorted ascending — spatial
    /// queries are a determinism surface, not just a lookup.
    pub fn query_radius(
        &self,
        pos: Position,
        radius: u32,
        exclude: Option<AgentId>,
    ) -> Vec<AgentId> {
        let size = self.bucket_size as i32;
        let r = radius as i32;
        let min_bucket = (
            (pos.x - r).div_euclid(size),
            (pos.y - r).div_euclid(size),
        );
        let max_bucket = (
            (pos.x + r).div_euclid(size),
            (pos.y + r).div_euclid(size),
        );

        let mut result = Vec::new();
        for bx in min_bucket.0..=max_bucket.0 {
            for by in min_bucket.1..=max_bucket.1 {
                let Some(ids) = self.buckets.get(&(bx, by)) else {
                    continue;
                };
                for &id in ids {
                    if exclude == Some(id) {
                        continue;
                    }
                    if let Some(&other_pos) = self.positions.get(&id)
                        && pos.distance(other_pos) <= radius
                    {
                        result.push(id);
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_returns_sorted_ids_within_manhattan_radius() {
        let mut index = SpatialIndex::new(4);
        index.add(3, Position::new(0, 0));
        index.add(1, Position::new(2, 2)); // d = 4
        index.add(2, Position::new(5, 0)); // d = 5
        index.add(0, Position::new(1, 1)); // d = 2

        let hits = index.query_radius(Position::new(0, 0), 4, None);
        assert_eq!(hits, vec![0, 1, 3]);

        let hits = index.query_radius(Position::new(0, 0), 4, Some(3));
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut index = SpatialIndex::new(2);
        index.add(7, Position::new(0, 0));
        index.update(7, Position::new(9, 9));

        assert!(index.query_radius(Position::new(0, 0), 2, None).is_empty());
        assert_eq!(index.query_radius(Position::new(9, 9), 0, None), vec![7]);
        assert_eq!(index.position_of(7), Some(Position::new(9, 9)));
    }

    #[test]
    fn radius_zero_matches_cohabitants_only() {
        let mut index = SpatialIndex::new(3);
        index.add(0, Position::new(4, 4));
        index.add(1, Position::new(4, 4));
        index.add(2, Position::new(4, 5));

        assert_eq!(index.query_radius(Position::new(4, 4), 0, None), vec![0, 1]);
    }
}
