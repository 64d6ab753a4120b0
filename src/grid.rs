//! Sampling grid over the target territory.
//!
//! Points are produced lazily, row by row (latitude), each row stepping
//! longitude from west to east. Both bounds are inclusive. Positions are
//! computed as `min + index * step` so the last row or column never drifts
//! past the box through accumulated float error.

use crate::models::Coordinate;
use serde::{Deserialize, Serialize};

/// Slack absorbing float error when a span is an exact multiple of the step.
const STEP_EPSILON: f64 = 1e-9;

/// Bounding box of metropolitan France.
pub const FRANCE_BOUNDS: GridBounds = GridBounds {
    min_lat: 41.0,
    max_lat: 51.5,
    min_lon: -5.5,
    max_lon: 9.5,
};

/// Default France spacing: 0.5° of latitude, 0.7° of longitude.
pub const FRANCE_STEP: GridStep = GridStep { lat: 0.5, lon: 0.7 };

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GridBounds {
    pub fn contains(&self, point: Coordinate) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lon
            && point.longitude <= self.max_lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStep {
    pub lat: f64,
    pub lon: f64,
}

/// A rectangular sampling grid. Cheap to copy; iterate as many times as needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub bounds: GridBounds,
    pub step: GridStep,
}

impl Grid {
    pub fn new(bounds: GridBounds, step: GridStep) -> Self {
        Self { bounds, step }
    }

    pub fn france() -> Self {
        Self::new(FRANCE_BOUNDS, FRANCE_STEP)
    }

    pub fn rows(&self) -> usize {
        axis_len(self.bounds.min_lat, self.bounds.max_lat, self.step.lat)
    }

    pub fn columns(&self) -> usize {
        axis_len(self.bounds.min_lon, self.bounds.max_lon, self.step.lon)
    }

    pub fn len(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> GridPoints {
        GridPoints {
            grid: *self,
            rows: self.rows(),
            columns: self.columns(),
            next: 0,
        }
    }
}

impl IntoIterator for &Grid {
    type Item = Coordinate;
    type IntoIter = GridPoints;

    fn into_iter(self) -> GridPoints {
        self.points()
    }
}

/// Number of inclusive steps from `min` to `max`.
fn axis_len(min: f64, max: f64, step: f64) -> usize {
    if !(step > 0.0) || !min.is_finite() || !max.is_finite() || max < min {
        return 0;
    }
    ((max - min) / step + STEP_EPSILON).floor() as usize + 1
}

#[derive(Debug, Clone)]
pub struct GridPoints {
    grid: Grid,
    rows: usize,
    columns: usize,
    next: usize,
}

impl Iterator for GridPoints {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Coordinate> {
        if self.next >= self.rows * self.columns {
            return None;
        }
        let row = self.next / self.columns;
        let column = self.next % self.columns;
        self.next += 1;

        let bounds = &self.grid.bounds;
        let latitude = (bounds.min_lat + row as f64 * self.grid.step.lat).min(bounds.max_lat);
        let longitude =
            (bounds.min_lon + column as f64 * self.grid.step.lon).min(bounds.max_lon);
        Some(Coordinate::new(latitude, longitude))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows * self.columns - self.next.min(self.rows * self.columns);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridPoints {}
