//! Annotation points and the per-video annotation track.
//!
//! Points recovered from tags are read-only and keyed by their public key.
//! Points a user creates locally are mutable, carry a UUID and have no key.

use serde::Serialize;
use uuid::Uuid;

use crate::derive::{validate_grid_shape, validate_namespace};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationPoint {
    pub id: String,
    /// Seconds from the start of the video. Integral for derived points.
    pub time: f64,
    /// 1-based grid row.
    pub row: u32,
    /// 1-based grid column.
    pub column: u32,
    pub x_percent: f64,
    pub y_percent: f64,
    pub note: String,
    pub read_only: bool,
}

/// Horizontal and vertical centre of a 0-based cell, in percent.
pub fn cell_center_percent(row: u32, column: u32, rows: u32, columns: u32) -> (f64, f64) {
    let x = (column as f64 + 0.5) / columns as f64 * 100.0;
    let y = (row as f64 + 0.5) / rows as f64 * 100.0;
    (x.clamp(0.0, 100.0), y.clamp(0.0, 100.0))
}

impl AnnotationPoint {
    /// A point recovered from a tag at a 0-based grid cell.
    pub fn derived(
        public_key: &str,
        second: u64,
        row: u32,
        column: u32,
        rows: u32,
        columns: u32,
        note: &str,
    ) -> Self {
        let (x_percent, y_percent) = cell_center_percent(row, column, rows, columns);
        Self {
            id: public_key.to_string(),
            time: second as f64,
            row: row + 1,
            column: column + 1,
            x_percent,
            y_percent,
            note: note.to_string(),
            read_only: true,
        }
    }
}

fn sort_by_time(points: &mut [AnnotationPoint]) {
    points.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Everything shown on top of one video: the latest correlation output plus
/// whatever the user added locally.
#[derive(Debug, Clone)]
pub struct AnnotationTrack {
    namespace: String,
    rows: u32,
    columns: u32,
    derived: Vec<AnnotationPoint>,
    user: Vec<AnnotationPoint>,
}

impl AnnotationTrack {
    pub fn new(namespace: &str, rows: u32, columns: u32) -> Result<Self> {
        validate_grid_shape(rows, columns)?;
        Ok(Self {
            namespace: validate_namespace(namespace)?.to_string(),
            rows,
            columns,
            derived: Vec::new(),
            user: Vec::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Swap in a fresh correlation result. User points are untouched.
    pub fn replace_derived(&mut self, points: Vec<AnnotationPoint>) {
        self.derived = points;
    }

    /// Add a mutable point at a continuous time and a position in percent.
    /// Returns the new point's id.
    pub fn add_user_point(
        &mut self,
        time: f64,
        x_percent: f64,
        y_percent: f64,
        note: impl Into<String>,
    ) -> String {
        let x_percent = x_percent.clamp(0.0, 100.0);
        let y_percent = y_percent.clamp(0.0, 100.0);
        let id = Uuid::new_v4().to_string();
        self.user.push(AnnotationPoint {
            id: id.clone(),
            time: time.max(0.0),
            row: self.cell_index(y_percent, self.rows),
            column: self.cell_index(x_percent, self.columns),
            x_percent,
            y_percent,
            note: note.into(),
            read_only: false,
        });
        id
    }

    fn cell_index(&self, percent: f64, cells: u32) -> u32 {
        let index = (percent / 100.0 * cells as f64).floor() as u32;
        index.min(cells - 1) + 1
    }

    pub fn edit_note(&mut self, id: &str, note: impl Into<String>) -> Result<()> {
        if self.derived.iter().any(|p| p.id == id) {
            return Err(CoreError::ReadOnlyAnnotation(id.to_string()));
        }
        let point = self
            .user
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::UnknownAnnotation(id.to_string()))?;
        point.note = note.into();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<AnnotationPoint> {
        if self.derived.iter().any(|p| p.id == id) {
            return Err(CoreError::ReadOnlyAnnotation(id.to_string()));
        }
        let index = self
            .user
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| CoreError::UnknownAnnotation(id.to_string()))?;
        Ok(self.user.remove(index))
    }

    /// Derived and user points together, ordered by time.
    pub fn points(&self) -> Vec<AnnotationPoint> {
        let mut all: Vec<AnnotationPoint> =
            self.derived.iter().chain(self.user.iter()).cloned().collect();
        sort_by_time(&mut all);
        all
    }
}
