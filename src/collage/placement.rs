use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utilities::retry::{self, AttemptBudget};

pub const DEFAULT_MAX_ATTEMPTS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// saturates at `u32::MAX`
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// axis-aligned intersection; rectangles that only share an edge don't overlap
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub const fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.width as f32).mul_add(0.5, self.x as f32),
            (self.height as f32).mul_add(0.5, self.y as f32),
        )
    }
}

/// Rectangles accepted during one render. No two of them overlap.
#[derive(Debug, Default)]
pub struct PlacementSet {
    rects: Vec<Rect>,
}

impl PlacementSet {
    #[cfg(test)]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn overlaps_any(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|placed| placed.overlaps(rect))
    }

    /// adds `rect` unless it overlaps a rectangle that's already in the set
    pub fn insert(&mut self, rect: Rect) -> bool {
        if self.overlaps_any(&rect) {
            return false;
        }

        self.rects.push(rect);
        true
    }
}

/// Probabilistic packer: tries random positions until one is free.
#[derive(Clone, Copy, Debug)]
pub struct RectPlacer {
    max_attempts: usize,
}

impl Default for RectPlacer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RectPlacer {
    pub const fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    /// Finds a spot for a `size` rectangle inside `container` that overlaps nothing in
    /// `existing`.
    ///
    /// Returns `None` once the attempt budget is spent, or right away when `size` can't fit in
    /// `container` at all.
    pub fn place<R: Rng + ?Sized>(
        &self,
        (width, height): (u32, u32),
        container: Rect,
        existing: &PlacementSet,
        rng: &mut R,
    ) -> Option<Rect> {
        if width > container.width || height > container.height {
            return None;
        }

        let max_x = container.right() - width;
        let max_y = container.bottom() - height;

        retry::retry(
            &mut AttemptBudget::new(self.max_attempts),
            |rect: &Rect| !existing.overlaps_any(rect),
            || {
                Rect::new(
                    rng.random_range(container.x..=max_x),
                    rng.random_range(container.y..=max_y),
                    width,
                    height,
                )
            },
        )
    }
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_overlaps() {
        let rect = Rect::new(10, 10, 10, 10);

        assert!(rect.overlaps(&Rect::new(15, 15, 10, 10)));
        assert!(rect.overlaps(&Rect::new(12, 12, 2, 2)));
        assert!(!rect.overlaps(&Rect::new(20, 10, 10, 10)));
        assert!(!rect.overlaps(&Rect::new(10, 20, 10, 10)));
        assert!(!rect.overlaps(&Rect::new(0, 0, 5, 5)));
    }

    #[test]
    fn test_edges_saturate() {
        let far = Rect::new(u32::MAX, u32::MAX - 1, 10, 10);

        assert_eq!((far.right(), far.bottom()), (u32::MAX, u32::MAX));
        assert!(!Rect::new(0, 0, 100, 100).contains(&far));
        assert!(!far.overlaps(&Rect::new(0, 0, 100, 100)));
    }

    #[test]
    fn test_placement_set_rejects_overlap() {
        let mut set = PlacementSet::default();

        assert!(set.insert(Rect::new(0, 0, 10, 10)));
        assert!(!set.insert(Rect::new(5, 5, 10, 10)));
        assert!(set.insert(Rect::new(10, 0, 10, 10)));
        assert_eq!(set.rects().len(), 2);
    }

    #[test]
    fn test_placements_never_overlap() {
        let mut rng = StdRng::seed_from_u64(1);
        let placer = RectPlacer::default();
        let container = Rect::new(50, 50, 800, 600);
        let mut set = PlacementSet::default();

        for _ in 0..30 {
            if let Some(rect) = placer.place((120, 120), container, &set, &mut rng) {
                assert!(container.contains(&rect));
                assert!(set.insert(rect));
            }
        }

        assert!(!set.rects().is_empty());
        for (i, a) in set.rects().iter().enumerate() {
            for b in &set.rects()[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_too_small_container() {
        let mut rng = StdRng::seed_from_u64(2);
        let set = PlacementSet::default();

        let result =
            RectPlacer::default().place((150, 150), Rect::new(0, 0, 100, 400), &set, &mut rng);

        assert_eq!(result, None);
    }

    #[test]
    fn test_full_container_misses() {
        let mut rng = StdRng::seed_from_u64(3);
        let placer = RectPlacer::new(50);
        let container = Rect::new(0, 0, 100, 100);
        let mut set = PlacementSet::default();

        let first = placer.place((100, 100), container, &set, &mut rng);
        assert_eq!(first, Some(container));
        set.insert(container);

        assert_eq!(placer.place((10, 10), container, &set, &mut rng), None);
    }

    #[test]
    fn test_crowded_container_drops_items() {
        let mut rng = StdRng::seed_from_u64(4);
        let placer = RectPlacer::default();
        let container = Rect::new(0, 0, 400, 400);
        let mut set = PlacementSet::default();
        let mut misses = 0;

        for _ in 0..6 {
            match placer.place((150, 150), container, &set, &mut rng) {
                Some(rect) => assert!(set.insert(rect)),
                None => misses += 1,
            }
        }

        assert!(set.rects().len() <= 4);
        assert!(misses >= 2);
    }
}
