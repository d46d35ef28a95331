//! Exterior flood fill and enclosed-region labeling

use crate::grid::{GridDims, OccupancyGrid};

const EMPTY: u32 = 0;
const FILLED: u32 = 1;
const EXTERIOR: u32 = 2;
const FIRST_REGION: u32 = 3;

/// Fixed-capacity FIFO of cell indices
///
/// Capacity equals the grid's cell count; every cell is enqueued at most once
/// per fill, so the buffer never wraps onto unread entries.
#[derive(Debug)]
pub struct CellQueue {
    buf: Vec<usize>,
    head: usize,
    tail: usize,
}

impl CellQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            head: 0,
            tail: 0,
        }
    }

    pub fn push(&mut self, index: usize) {
        let slot = self.tail % self.buf.len();
        self.buf[slot] = index;
        self.tail += 1;
    }

    pub fn pop(&mut self) -> Option<usize> {
        if self.head == self.tail {
            return None;
        }
        let value = self.buf[self.head % self.buf.len()];
        self.head += 1;
        Some(value)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

/// One enclosed empty region
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Member cell indices, ascending
    pub cells: Vec<usize>,
    pub min_gx: usize,
    pub max_gx: usize,
    pub min_gy: usize,
    pub max_gy: usize,
    /// Mean cell coordinates
    pub centroid: (f64, f64),
}

fn neighbours(dims: &GridDims, index: usize) -> impl Iterator<Item = usize> + '_ {
    let (cx, cy) = dims.coords(index);
    let (cx, cy) = (cx as i64, cy as i64);
    [(1, 0), (-1, 0), (0, 1), (0, -1)]
        .into_iter()
        .filter_map(move |(dx, dy)| dims.index(cx + dx, cy + dy))
}

/// Label every empty region that cannot reach the grid border
pub fn enclosed_regions(grid: &OccupancyGrid) -> Vec<Region> {
    let dims = &grid.dims;
    let total = dims.cell_count();
    if total == 0 {
        return Vec::new();
    }

    let mut labels: Vec<u32> = grid
        .cells
        .iter()
        .map(|&filled| if filled { FILLED } else { EMPTY })
        .collect();
    let mut queue = CellQueue::with_capacity(total);

    let (w, h) = (dims.width, dims.height);
    fn seed(idx: usize, labels: &mut [u32], queue: &mut CellQueue) {
        if labels[idx] == EMPTY {
            labels[idx] = EXTERIOR;
            queue.push(idx);
        }
    }
    for x in 0..w {
        seed(x, &mut labels, &mut queue);
        seed((h - 1) * w + x, &mut labels, &mut queue);
    }
    for y in 1..h.saturating_sub(1) {
        seed(y * w, &mut labels, &mut queue);
        seed(y * w + w - 1, &mut labels, &mut queue);
    }

    while let Some(idx) = queue.pop() {
        for n in neighbours(dims, idx) {
            if labels[n] == EMPTY {
                labels[n] = EXTERIOR;
                queue.push(n);
            }
        }
    }

    let mut regions = Vec::new();
    let mut next_label = FIRST_REGION;
    for start in 0..total {
        if labels[start] != EMPTY {
            continue;
        }
        let label = next_label;
        next_label += 1;
        queue.clear();
        labels[start] = label;
        queue.push(start);

        let mut cells = Vec::new();
        while let Some(idx) = queue.pop() {
            cells.push(idx);
            for n in neighbours(dims, idx) {
                if labels[n] == EMPTY {
                    labels[n] = label;
                    queue.push(n);
                }
            }
        }
        cells.sort_unstable();
        regions.push(region_stats(dims, cells));
    }
    regions
}

fn region_stats(dims: &GridDims, cells: Vec<usize>) -> Region {
    let mut min_gx = usize::MAX;
    let mut max_gx = 0;
    let mut min_gy = usize::MAX;
    let mut max_gy = 0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for &idx in &cells {
        let (x, y) = dims.coords(idx);
        min_gx = min_gx.min(x);
        max_gx = max_gx.max(x);
        min_gy = min_gy.min(y);
        max_gy = max_gy.max(y);
        sum_x += x as f64;
        sum_y += y as f64;
    }
    let n = cells.len() as f64;
    Region {
        centroid: (sum_x / n, sum_y / n),
        cells,
        min_gx,
        max_gx,
        min_gy,
        max_gy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerkit_core::Point2D;

    fn grid_from(rows: &[&str]) -> OccupancyGrid {
        let dims = GridDims {
            width: rows[0].len(),
            height: rows.len(),
            origin: Point2D::default(),
            resolution: 1.0,
        };
        let cells = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        OccupancyGrid { dims, cells }
    }

    #[test]
    fn test_queue_fifo() {
        let mut q = CellQueue::with_capacity(3);
        q.push(1);
        q.push(2);
        assert_eq!(q.pop(), Some(1));
        q.push(3);
        q.push(4);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(4));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_single_enclosed_region() {
        let grid = grid_from(&[
            ".......", //
            ".#####.",
            ".#...#.",
            ".#...#.",
            ".#####.",
            ".......",
        ]);
        let regions = enclosed_regions(&grid);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.cells.len(), 6);
        assert_eq!((r.min_gx, r.max_gx, r.min_gy, r.max_gy), (2, 4, 2, 3));
        assert_eq!(r.centroid, (3.0, 2.5));
    }

    #[test]
    fn test_open_ring_is_exterior() {
        let grid = grid_from(&[
            ".......", //
            ".##.##.",
            ".#...#.",
            ".#####.",
            ".......",
        ]);
        assert!(enclosed_regions(&grid).is_empty());
    }

    #[test]
    fn test_irregular_region() {
        let grid = grid_from(&[
            "#####", //
            "#..##",
            "#...#",
            "##..#",
            "#####",
        ]);
        let regions = enclosed_regions(&grid);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].cells.len(), 7);
    }

    #[test]
    fn test_diagonal_cells_are_separate() {
        let grid = grid_from(&[
            "####", //
            "#.##",
            "##.#",
            "####",
        ]);
        assert_eq!(enclosed_regions(&grid).len(), 2);
    }

    #[test]
    fn test_two_regions() {
        let grid = grid_from(&[
            "#######", //
            "#..#..#",
            "#######",
        ]);
        assert_eq!(enclosed_regions(&grid).len(), 2);
    }
}
