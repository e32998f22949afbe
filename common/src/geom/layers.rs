use serde::{Deserialize, Serialize};

/// Inclusive, never empty, range of copper layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerRange {
    start: u8,
    end: u8,
}

impl LayerRange {
    pub fn new(a: u8, b: u8) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn single(layer: u8) -> Self {
        Self::new(layer, layer)
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    pub fn is_multilayer(&self) -> bool {
        self.start != self.end
    }

    pub fn overlaps(&self, other: &LayerRange) -> bool {
        self.end >= other.start && self.start <= other.end
    }

    pub fn contains(&self, layer: u8) -> bool {
        layer >= self.start && layer <= self.end
    }

    pub fn merge(&self, other: &LayerRange) -> LayerRange {
        LayerRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_inclusive() {
        let through = LayerRange::new(3, 0);
        assert_eq!(through.start(), 0);
        assert!(through.overlaps(&LayerRange::single(3)));
        assert!(!LayerRange::single(1).overlaps(&LayerRange::single(2)));
    }
}
