//! Tag correlation: recover annotation points from a bag of tagged keys.
//!
//! Under the derived scheme nothing in a tag says where it belongs. The
//! correlator re-derives the grid of every second from 0 to the video's
//! duration and looks each cell's key up in the tag index, removing hits as
//! it goes. Once the index is empty there is nothing left to find and the
//! walk stops, so sparse tracks cost only as many grids as the last tagged
//! second.
//!
//! Under the explicit scheme the memo itself spells out the coordinate and no
//! derivation happens at all. A run uses exactly one scheme.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationPoint, cell_center_percent};
use crate::constants::{DEFAULT_COLUMNS, DEFAULT_ROWS};
use crate::derive::{GridCell, derive_time_scoped_grid, validate_grid_shape, validate_namespace};
use crate::error::{CoreError, Result};
use crate::tag::{ExplicitMemoParser, Tag};

/// Checked between seconds of a correlation run.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

/// A run nobody can cancel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Cancellation for Never {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<T: Cancellation + ?Sized> Cancellation for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<T: Cancellation + ?Sized> Cancellation for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Which addressing scheme is authoritative for a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingScheme {
    /// Brute-force search over re-derived per-second grids.
    #[default]
    Derived,
    /// Coordinates parsed from `{namespace}/T+{s}s/{col}x{row}/...` memos.
    /// Memos past the duration or outside the grid are dropped, and a zero
    /// duration yields no points even for `T+0s` memos.
    Explicit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationStats {
    pub grids_derived: u64,
    pub keys_derived: u64,
    pub matched: usize,
    /// Tags that produced no point.
    pub unmatched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Correlation {
    pub points: Vec<AnnotationPoint>,
    pub stats: CorrelationStats,
}

/// Floor an observed playback duration to whole seconds.
/// Negative and non-finite durations count as zero.
pub fn duration_from_playback(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct Correlator {
    rows: u32,
    columns: u32,
    scheme: AddressingScheme,
    workers: usize,
}

impl Default for Correlator {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            scheme: AddressingScheme::Derived,
            workers: 1,
        }
    }
}

impl Correlator {
    /// 16×9 grid, derived scheme, single-threaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(rows: u32, columns: u32) -> Result<Self> {
        validate_grid_shape(rows, columns)?;
        Ok(Self {
            rows,
            columns,
            ..Self::default()
        })
    }

    pub fn with_scheme(mut self, scheme: AddressingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Derive up to `workers` seconds concurrently. Output is unchanged.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn scheme(&self) -> AddressingScheme {
        self.scheme
    }

    /// Recover annotation points for `namespace` from `tags` over seconds
    /// `0..=duration_seconds`. Points come back sorted by time; within one
    /// second they keep row-major order.
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` fires before the run
    /// finishes. No partial result is returned in that case.
    pub fn correlate<C>(
        &self,
        namespace: &str,
        duration_seconds: u64,
        tags: &[Tag],
        cancel: &C,
    ) -> Result<Correlation>
    where
        C: Cancellation + Sync + ?Sized,
    {
        if duration_seconds == 0 || tags.is_empty() {
            return Ok(Correlation::default());
        }
        validate_namespace(namespace)?;

        let correlation = match self.scheme {
            AddressingScheme::Derived => {
                self.correlate_derived(namespace, duration_seconds, tags, cancel)?
            }
            AddressingScheme::Explicit => {
                self.correlate_explicit(namespace, duration_seconds, tags, cancel)?
            }
        };

        tracing::debug!(
            namespace,
            scheme = ?self.scheme,
            grids = correlation.stats.grids_derived,
            matched = correlation.stats.matched,
            unmatched = correlation.stats.unmatched,
            "correlation finished"
        );
        Ok(correlation)
    }

    fn correlate_derived<C>(
        &self,
        namespace: &str,
        duration_seconds: u64,
        tags: &[Tag],
        cancel: &C,
    ) -> Result<Correlation>
    where
        C: Cancellation + Sync + ?Sized,
    {
        // Later duplicates of a key overwrite earlier ones.
        let mut index: HashMap<&str, &str> = tags
            .iter()
            .map(|t| (t.public_key.as_str(), t.memo.as_str()))
            .collect();
        let mut stats = CorrelationStats::default();
        let mut points = Vec::new();

        let mut next = Some(0u64);
        'walk: while let Some(start) = next {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let span = self.workers as u64 - 1;
            let end = start.saturating_add(span).min(duration_seconds);

            for (second, grid) in self.derive_window(namespace, start, end)? {
                stats.grids_derived += 1;
                stats.keys_derived += grid.len() as u64;

                for cell in &grid {
                    if let Some(memo) = index.remove(cell.public_key.as_str()) {
                        points.push(AnnotationPoint::derived(
                            &cell.public_key,
                            second,
                            cell.row,
                            cell.column,
                            self.rows,
                            self.columns,
                            memo,
                        ));
                    }
                }
                if index.is_empty() {
                    break 'walk;
                }
            }

            next = if end < duration_seconds {
                end.checked_add(1)
            } else {
                None
            };
        }

        stats.matched = points.len();
        stats.unmatched = index.len();
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Correlation { points, stats })
    }

    /// Grids for seconds `start..=end`, ascending. More than one second is
    /// derived on scoped threads; matching stays on the caller's thread.
    fn derive_window(&self, namespace: &str, start: u64, end: u64) -> Result<Vec<(u64, Vec<GridCell>)>> {
        if start == end {
            let grid = derive_time_scoped_grid(namespace, start, self.rows, self.columns)?;
            return Ok(vec![(start, grid)]);
        }

        let (rows, columns) = (self.rows, self.columns);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (start..=end)
                .map(|second| {
                    let handle = scope
                        .spawn(move || derive_time_scoped_grid(namespace, second, rows, columns));
                    (second, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(second, handle)| -> Result<(u64, Vec<GridCell>)> {
                    let grid = handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
                    Ok((second, grid))
                })
                .collect()
        })
    }

    fn correlate_explicit<C>(
        &self,
        namespace: &str,
        duration_seconds: u64,
        tags: &[Tag],
        cancel: &C,
    ) -> Result<Correlation>
    where
        C: Cancellation + Sync + ?Sized,
    {
        let parser = ExplicitMemoParser::new(namespace);
        let mut by_key: HashMap<&str, usize> = HashMap::new();
        let mut points: Vec<AnnotationPoint> = Vec::new();
        let mut stats = CorrelationStats::default();

        for tag in tags {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let Some(coord) = parser.parse(&tag.memo) else {
                stats.unmatched += 1;
                continue;
            };
            let in_grid = (1..=self.rows).contains(&coord.row)
                && (1..=self.columns).contains(&coord.column);
            if coord.second > duration_seconds || !in_grid {
                stats.unmatched += 1;
                continue;
            }

            let (x_percent, y_percent) =
                cell_center_percent(coord.row - 1, coord.column - 1, self.rows, self.columns);
            let point = AnnotationPoint {
                id: tag.public_key.clone(),
                time: coord.second as f64,
                row: coord.row,
                column: coord.column,
                x_percent,
                y_percent,
                note: coord.text,
                read_only: true,
            };

            // One point per key; a later tag for the same key replaces it.
            match by_key.get(tag.public_key.as_str()) {
                Some(&slot) => {
                    points[slot] = point;
                    stats.unmatched += 1;
                }
                None => {
                    by_key.insert(tag.public_key.as_str(), points.len());
                    points.push(point);
                }
            }
        }

        points.sort_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then(a.row.cmp(&b.row))
                .then(a.column.cmp(&b.column))
        });
        stats.matched = points.len();
        Ok(Correlation { points, stats })
    }
}
