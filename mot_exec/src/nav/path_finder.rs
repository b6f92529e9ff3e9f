//! # Path finder
//!
//! Finds minimum cost routes between two cells of an [`OccupancyGrid`] using A*. Moves are allowed
//! to all eight neighbours, costing 10 orthogonally and 14 diagonally (an integer approximation of
//! the diagonal's length), and a diagonal move may not squeeze between two occupied cells. The
//! heuristic is the octile distance, which is exact on an empty grid and never overestimates, so
//! the routes found are optimal.
//!
//! Searches are bounded by a wall-clock budget, since the planner runs between control ticks.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    time::{Duration, Instant},
};

use drive_if::Pose;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{occupancy::Cell, NavError, OccupancyGrid};
use crate::path::ControlPoint;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const ORTHOGONAL_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

/// Neighbour offsets, orthogonal first
const NEIGHBOURS: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PathFinderParams {
    /// Wall-clock time a search may take before it is abandoned, in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PathFinder {
    params: PathFinderParams,
}

/// A route found through the grid.
#[derive(Debug, Clone, Serialize)]
pub struct FoundPath {
    /// Cells from start to goal, inclusive
    pub cells: Vec<Cell>,

    /// Total move cost of the route
    pub cost: u32,

    /// Number of cells expanded by the search
    pub num_expanded: usize,

    /// Control points at the cell centres, for the path generator
    pub control_points: Vec<ControlPoint>,
}

/// An entry in the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    /// Cost so far plus heuristic
    f: u32,

    /// Cost so far
    g: u32,

    index: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PathFinderParams {
    fn default() -> Self {
        Self { timeout_ms: 50 }
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Note that we flip the order here so that the heap will be a min-heap, not a max-heap.
        // Equal totals prefer the node further from the start, which is closer to the goal.
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PathFinder {
    pub fn new(params: PathFinderParams) -> Self {
        Self { params }
    }

    /// Find a route from the cell nearest `start` to the cell nearest `goal`.
    ///
    /// Both poses are snapped to the nearest free cell. The last control point of the result has
    /// the goal's heading, the others face the next cell along the route.
    pub fn find_path(
        &self,
        grid: &OccupancyGrid,
        start: &Pose,
        goal: &Pose,
    ) -> Result<FoundPath, NavError> {
        let start_cell = snap_to_free(grid, grid.cell_at(&start.position()))?;
        let goal_cell = snap_to_free(grid, grid.cell_at(&goal.position()))?;

        debug!("Searching for path from {:?} to {:?}", start_cell, goal_cell);

        let (cells, cost, num_expanded) = self.search(grid, start_cell, goal_cell)?;

        debug!(
            "Found path of {} cells, cost {}, after expanding {} cells",
            cells.len(),
            cost,
            num_expanded
        );

        let control_points = to_control_points(grid, &cells, goal.rotation);

        Ok(FoundPath {
            cells,
            cost,
            num_expanded,
            control_points,
        })
    }

    fn search(
        &self,
        grid: &OccupancyGrid,
        start: Cell,
        goal: Cell,
    ) -> Result<(Vec<Cell>, u32, usize), NavError> {
        let start_time = Instant::now();
        let budget = Duration::from_millis(self.params.timeout_ms);

        let (width, height) = grid.num_cells();
        let num_cells = width * height;

        // Indexes are valid since both cells were snapped onto the grid
        let start_idx = grid.index(start).ok_or(NavError::NoFreeCell(start))?;
        let goal_idx = grid.index(goal).ok_or(NavError::NoFreeCell(goal))?;

        let mut g_cost = vec![u32::MAX; num_cells];
        let mut parent = vec![usize::MAX; num_cells];
        let mut closed = vec![false; num_cells];
        let mut heap = BinaryHeap::new();
        let mut num_expanded = 0;

        g_cost[start_idx] = 0;
        heap.push(Node {
            f: octile_distance(start, goal),
            g: 0,
            index: start_idx,
        });

        while let Some(node) = heap.pop() {
            if closed[node.index] {
                continue;
            }
            closed[node.index] = true;

            if node.index == goal_idx {
                return Ok((reconstruct(grid, &parent, goal_idx), node.g, num_expanded));
            }

            if start_time.elapsed() >= budget {
                warn!("Path search ran out of time");
                return Err(NavError::Timeout {
                    elapsed_ms: start_time.elapsed().as_millis(),
                    num_expanded,
                });
            }

            num_expanded += 1;
            let cell = grid.cell_of_index(node.index);

            for &(dx, dy) in NEIGHBOURS.iter() {
                let next = match offset(cell, dx, dy) {
                    Some(n) => n,
                    None => continue,
                };
                let next_idx = match grid.index(next) {
                    Some(i) => i,
                    None => continue,
                };
                if closed[next_idx] || grid.is_occupied(next) {
                    continue;
                }

                let diagonal = dx != 0 && dy != 0;

                // No squeezing between the corners of two obstacles
                if diagonal
                    && (grid.is_occupied((next.0, cell.1)) || grid.is_occupied((cell.0, next.1)))
                {
                    continue;
                }

                let g = node.g + if diagonal { DIAGONAL_COST } else { ORTHOGONAL_COST };
                if g < g_cost[next_idx] {
                    g_cost[next_idx] = g;
                    parent[next_idx] = node.index;
                    heap.push(Node {
                        f: g + octile_distance(next, goal),
                        g,
                        index: next_idx,
                    });
                }
            }
        }

        Err(NavError::NoPathToTarget)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Cost of the cheapest route between two cells on an empty grid.
pub fn octile_distance(a: Cell, b: Cell) -> u32 {
    let dx = (a.0 as i64 - b.0 as i64).unsigned_abs() as u32;
    let dy = (a.1 as i64 - b.1 as i64).unsigned_abs() as u32;

    ORTHOGONAL_COST * dx.max(dy) + (DIAGONAL_COST - ORTHOGONAL_COST) * dx.min(dy)
}

/// Return `cell` if it's free, otherwise the nearest free cell to it.
fn snap_to_free(grid: &OccupancyGrid, cell: Cell) -> Result<Cell, NavError> {
    if !grid.is_occupied(cell) {
        return Ok(cell);
    }

    let (width, height) = grid.num_cells();
    let dist2 = |c: Cell| {
        let dx = c.0 as i64 - cell.0 as i64;
        let dy = c.1 as i64 - cell.1 as i64;
        dx * dx + dy * dy
    };

    let nearest = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&c| !grid.is_occupied(c))
        .min_by_key(|&c| dist2(c))
        .ok_or(NavError::NoFreeCell(cell))?;

    debug!("Snapped occupied cell {:?} to free cell {:?}", cell, nearest);
    Ok(nearest)
}

fn offset(cell: Cell, dx: isize, dy: isize) -> Option<Cell> {
    let x = cell.0 as isize + dx;
    let y = cell.1 as isize + dy;

    if x < 0 || y < 0 {
        None
    } else {
        Some((x as usize, y as usize))
    }
}

fn reconstruct(grid: &OccupancyGrid, parent: &[usize], goal_idx: usize) -> Vec<Cell> {
    let mut cells = vec![grid.cell_of_index(goal_idx)];
    let mut idx = goal_idx;

    while parent[idx] != usize::MAX {
        idx = parent[idx];
        cells.push(grid.cell_of_index(idx));
    }

    cells.reverse();
    cells
}

/// Control points at the centre of each cell, each facing the next with the last taking
/// `final_rotation`.
fn to_control_points(grid: &OccupancyGrid, cells: &[Cell], final_rotation: f64) -> Vec<ControlPoint> {
    let centres: Vec<Pose> = cells
        .iter()
        .map(|&c| Pose::from_position(grid.cell_centre(c), 0.0))
        .collect();

    centres
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let rotation = match centres.get(i + 1) {
                Some(next) => p.heading_to(next),
                None => final_rotation,
            };
            ControlPoint::new(Pose { rotation, ..*p })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;

    fn grid(text: &str) -> OccupancyGrid {
        let rows = text.trim().lines().count() as f64;
        let cols = text.trim().lines().next().unwrap().trim().len() as f64;
        OccupancyGrid::parse(
            &format!("OCCUPANCY 1\n{}\nENDOCCUPANCY", text),
            Vector2::new(cols * 10.0, rows * 10.0),
        )
        .unwrap()
    }

    fn centre(cell: Cell) -> Pose {
        Pose::new(cell.0 as f64 * 10.0 + 5.0, cell.1 as f64 * 10.0 + 5.0, 0.0)
    }

    fn finder() -> PathFinder {
        PathFinder::new(PathFinderParams { timeout_ms: 5000 })
    }

    #[test]
    fn test_octile() {
        assert_eq!(octile_distance((0, 0), (3, 0)), 30);
        assert_eq!(octile_distance((0, 0), (3, 3)), 42);
        assert_eq!(octile_distance((5, 1), (0, 3)), 58);
    }

    #[test]
    fn test_open_grid_cost_is_octile() {
        let grid = OccupancyGrid::new(20, 15, Vector2::new(200.0, 150.0)).unwrap();
        let found = finder()
            .find_path(&grid, &centre((1, 2)), &centre((17, 11)))
            .unwrap();

        assert_eq!(found.cost, octile_distance((1, 2), (17, 11)));
        assert_eq!(found.cells.first(), Some(&(1, 2)));
        assert_eq!(found.cells.last(), Some(&(17, 11)));
    }

    #[test]
    fn test_route_avoids_wall() {
        let grid = grid(
            "
            00000
            00100
            00100
            00100
            00000
            ",
        );
        let found = finder().find_path(&grid, &centre((0, 2)), &centre((4, 2))).unwrap();

        assert!(found.cells.iter().all(|&c| !grid.is_occupied(c)));

        // Consecutive cells are neighbours
        for w in found.cells.windows(2) {
            let dx = (w[0].0 as i64 - w[1].0 as i64).abs();
            let dy = (w[0].1 as i64 - w[1].1 as i64).abs();
            assert!(dx <= 1 && dy <= 1 && dx + dy > 0);
        }

        // Up and over the wall, without clipping its corners
        assert_eq!(found.cost, 2 * DIAGONAL_COST + 4 * ORTHOGONAL_COST);
    }

    #[test]
    fn test_no_corner_cutting() {
        let grid = grid(
            "
            10
            01
            ",
        );
        let result = finder().find_path(&grid, &centre((0, 0)), &centre((1, 1)));
        assert!(matches!(result, Err(NavError::NoPathToTarget)));
    }

    #[test]
    fn test_snapping() {
        let grid = grid(
            "
            000
            011
            011
            ",
        );

        // Start on an obstacle, goal off the field
        let found = finder()
            .find_path(&grid, &centre((2, 0)), &Pose::new(-100.0, 500.0, 1.0))
            .unwrap();

        assert_eq!(found.cells[0], (0, 0));
        assert_eq!(found.cells.last(), Some(&(0, 2)));

        let last = found.control_points.last().unwrap();
        assert_eq!(last.pose.rotation, 1.0);
        assert_eq!(last.pose.position(), Vector2::new(5.0, 25.0));
    }

    #[test]
    fn test_all_occupied() {
        let grid = grid("11\n11");
        assert!(matches!(
            finder().find_path(&grid, &centre((0, 0)), &centre((1, 1))),
            Err(NavError::NoFreeCell(_))
        ));
    }

    #[test]
    fn test_same_cell() {
        let grid = OccupancyGrid::new(3, 3, Vector2::new(30.0, 30.0)).unwrap();
        let found = finder()
            .find_path(&grid, &centre((1, 1)), &Pose::new(15.0, 15.0, 0.5))
            .unwrap();

        assert_eq!(found.cells, vec![(1, 1)]);
        assert_eq!(found.cost, 0);
        assert_eq!(found.control_points.len(), 1);
        assert_eq!(found.control_points[0].pose.rotation, 0.5);
    }

    #[test]
    fn test_timeout() {
        let grid = OccupancyGrid::new(200, 200, Vector2::new(200.0, 200.0)).unwrap();
        let result = PathFinder::new(PathFinderParams { timeout_ms: 0 })
            .find_path(&grid, &Pose::new(0.5, 0.5, 0.0), &Pose::new(199.5, 199.5, 0.0));

        assert!(matches!(result, Err(NavError::Timeout { .. })));
    }

    #[test]
    fn test_control_points_face_next_cell() {
        let grid = OccupancyGrid::new(5, 5, Vector2::new(50.0, 50.0)).unwrap();
        let found = finder().find_path(&grid, &centre((0, 0)), &centre((0, 3))).unwrap();

        for cp in &found.control_points[..found.control_points.len() - 1] {
            assert!((cp.pose.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
            assert_eq!(cp.enter_delta, 0.0);
            assert_eq!(cp.exit_delta, 0.0);
        }
    }
}
