//! Trajectory points and the point buffer.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// One target point: a coordinate per logical axis, `None` where the axis does not move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(Vec<Option<f64>>);

impl Point {
    /// Point from per-axis coordinates.
    pub fn new(coordinates: Vec<Option<f64>>) -> Self {
        Self(coordinates)
    }

    /// Point where every one of `axis_count` axes is absent.
    pub fn empty(axis_count: usize) -> Self {
        Self(vec![None; axis_count])
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the point has no coordinates at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Coordinate of `axis`, `None` if absent.
    pub fn get(&self, axis: usize) -> Option<f64> {
        self.0.get(axis).copied().flatten()
    }

    /// Coordinates as a slice.
    pub fn as_slice(&self) -> &[Option<f64>] {
        &self.0
    }

    /// Logical indices of the axes that carry a coordinate.
    pub fn present_axes(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|_| i))
    }
}

impl From<Vec<Option<f64>>> for Point {
    fn from(coordinates: Vec<Option<f64>>) -> Self {
        Self(coordinates)
    }
}

impl From<Vec<f64>> for Point {
    fn from(coordinates: Vec<f64>) -> Self {
        Self(coordinates.into_iter().map(Some).collect())
    }
}

impl Index<usize> for Point {
    type Output = Option<f64>;

    fn index(&self, axis: usize) -> &Self::Output {
        &self.0[axis]
    }
}

/// Ordered points of the next trajectory, all of the same dimension.
#[derive(Debug, Clone)]
pub struct TrajectoryPointBuffer {
    axis_count: usize,
    points: Vec<Point>,
}

impl TrajectoryPointBuffer {
    /// Empty buffer for points with `axis_count` coordinates.
    pub fn new(axis_count: usize) -> Self {
        Self {
            axis_count,
            points: Vec::new(),
        }
    }

    /// Append a point.
    ///
    /// # Errors
    /// `ScanError::DimensionMismatch` if the point length differs from the axis
    /// count; the buffer is left unchanged.
    pub fn add_point(&mut self, point: Point) -> Result<(), ScanError> {
        if point.len() != self.axis_count {
            return Err(ScanError::DimensionMismatch {
                expected: self.axis_count,
                actual: point.len(),
            });
        }
        self.points.push(point);
        Ok(())
    }

    /// Most recently added point.
    pub fn last_point_added(&self) -> Option<&Point> {
        self.points.last()
    }

    /// First point of the buffer.
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Drop every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of buffered points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if no point is buffered.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point dimension.
    pub fn axis_count(&self) -> usize {
        self.axis_count
    }

    /// Buffered points in insertion order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
