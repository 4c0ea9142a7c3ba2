use std::collections::VecDeque;

use super::types::TrendPoint;

/// Number of points kept for the recovery chart.
pub const TREND_CAPACITY: usize = 10;

/// Sliding window of recovery scores, oldest first.
///
/// Sequence indices keep increasing across evictions so the chart can
/// tell a slide from a reset.
#[derive(Debug, Clone, Default)]
pub struct TrendBuffer {
    points: VecDeque<TrendPoint>,
    next_index: u64,
}

impl TrendBuffer {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(TREND_CAPACITY),
            next_index: 0,
        }
    }

    /// Append a score, evicting the oldest point once full.
    pub fn push(&mut self, score: u8) -> TrendPoint {
        let point = TrendPoint {
            sequence_index: self.next_index,
            score,
        };
        self.next_index += 1;

        if self.points.len() == TREND_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
        point
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.back()
    }

    /// Owned copy for a view snapshot.
    pub fn to_vec(&self) -> Vec<TrendPoint> {
        self.points.iter().copied().collect()
    }
}
