//! Per-category R*-tree indexes over canvas-pixel bounding boxes.
//!
//! A chart keeps four independent indexes (placed labels, plotted markers,
//! plotted stars, constellation line segments). They are only ever grown
//! during a render and discarded with it.

use crate::geometry::BoundingBox;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Label,
    Marker,
    Star,
    ConstellationLine,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Label,
        Category::Marker,
        Category::Star,
        Category::ConstellationLine,
    ];
}

/// An indexed box and the opaque tag it was inserted with.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub tag: u64,
    pub bbox: BoundingBox,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.xmin, self.bbox.ymin],
            [self.bbox.xmax, self.bbox.ymax],
        )
    }
}

/// One R*-tree of boxes.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
    next_tag: u64,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a box and returns its tag, or `None` if the box has a
    /// non-finite coordinate.
    pub fn insert(&mut self, bbox: BoundingBox) -> Option<u64> {
        if !bbox.is_finite() {
            return None;
        }
        let tag = self.next_tag;
        self.next_tag += 1;
        self.tree.insert(IndexEntry { tag, bbox });
        Some(tag)
    }

    /// Entries whose interiors overlap `bbox`.
    ///
    /// The tree's envelope query also reports boxes that merely touch, so
    /// candidates are filtered with a strict overlap test.
    pub fn intersecting<'a>(&'a self, bbox: &BoundingBox) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        let query = *bbox;
        let envelope = AABB::from_corners([bbox.xmin, bbox.ymin], [bbox.xmax, bbox.ymax]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(move |entry| entry.bbox.intersects(&query))
    }

    pub fn query_intersects(&self, bbox: &BoundingBox) -> bool {
        if !bbox.is_finite() {
            return false;
        }
        self.intersecting(bbox).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.tree.iter()
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.next_tag = 0;
    }
}

/// The four category indexes of one chart.
#[derive(Debug, Default)]
pub struct SpatialIndexManager {
    labels: SpatialIndex,
    markers: SpatialIndex,
    stars: SpatialIndex,
    lines: SpatialIndex,
}

impl SpatialIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, category: Category) -> &SpatialIndex {
        match category {
            Category::Label => &self.labels,
            Category::Marker => &self.markers,
            Category::Star => &self.stars,
            Category::ConstellationLine => &self.lines,
        }
    }

    fn index_mut(&mut self, category: Category) -> &mut SpatialIndex {
        match category {
            Category::Label => &mut self.labels,
            Category::Marker => &mut self.markers,
            Category::Star => &mut self.stars,
            Category::ConstellationLine => &mut self.lines,
        }
    }

    /// Returns false (and stores nothing) for a non-finite box.
    pub fn insert(&mut self, category: Category, bbox: BoundingBox) -> bool {
        self.index_mut(category).insert(bbox).is_some()
    }

    pub fn query_intersects(&self, category: Category, bbox: &BoundingBox) -> bool {
        self.index(category).query_intersects(bbox)
    }

    pub fn intersecting(&self, category: Category, bbox: &BoundingBox) -> Vec<u64> {
        self.index(category)
            .intersecting(bbox)
            .map(|entry| entry.tag)
            .collect()
    }

    pub fn len(&self, category: Category) -> usize {
        self.index(category).len()
    }

    pub fn clear(&mut self) {
        for category in Category::ALL {
            self.index_mut(category).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_finds_overlapping_box() {
        let mut index = SpatialIndex::new();
        index.insert(BoundingBox::new(10.0, 10.0, 40.0, 40.0));
        assert!(index.query_intersects(&BoundingBox::new(15.0, 15.0, 20.0, 20.0)));
        assert!(!index.query_intersects(&BoundingBox::new(200.0, 200.0, 205.0, 205.0)));
    }

    #[test]
    fn touching_boxes_are_not_hits() {
        let mut index = SpatialIndex::new();
        index.insert(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(!index.query_intersects(&BoundingBox::new(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn non_finite_box_is_never_inserted() {
        let mut manager = SpatialIndexManager::new();
        assert!(!manager.insert(Category::Label, BoundingBox::INVALID));
        assert!(!manager.insert(
            Category::Label,
            BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0)
        ));
        assert_eq!(manager.len(Category::Label), 0);
    }

    #[test]
    fn categories_are_independent() {
        let mut manager = SpatialIndexManager::new();
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(manager.insert(Category::Marker, bbox));
        assert!(manager.query_intersects(Category::Marker, &bbox));
        assert!(!manager.query_intersects(Category::Label, &bbox));
        assert!(!manager.query_intersects(Category::Star, &bbox));
        assert!(!manager.query_intersects(Category::ConstellationLine, &bbox));
    }

    #[test]
    fn intersecting_reports_tags_in_insert_order() {
        let mut manager = SpatialIndexManager::new();
        manager.insert(Category::Star, BoundingBox::new(0.0, 0.0, 5.0, 5.0));
        manager.insert(Category::Star, BoundingBox::new(50.0, 50.0, 55.0, 55.0));
        manager.insert(Category::Star, BoundingBox::new(3.0, 3.0, 8.0, 8.0));
        let mut hits = manager.intersecting(Category::Star, &BoundingBox::new(2.0, 2.0, 4.0, 4.0));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn clear_empties_every_category() {
        let mut manager = SpatialIndexManager::new();
        for category in Category::ALL {
            manager.insert(category, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        }
        manager.clear();
        for category in Category::ALL {
            assert_eq!(manager.len(category), 0);
        }
    }
}
