//! Descriptive statistics and Savitzky-Golay smoothing over collected series.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("cannot summarise an empty series")]
    Empty,
    #[error("series has {len} points, the smoothing window needs at least {window}")]
    TooShort { len: usize, window: usize },
    #[error("smoothing window must be odd and positive, got {0}")]
    BadWindow(usize),
    #[error("polynomial degree {degree} must be below the window length {window}")]
    DegreeTooHigh { degree: usize, window: usize },
    #[error("least-squares system is singular")]
    Singular,
}

/// Min, max, mean and median of a raw series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl Summary {
    pub fn from_values(values: &[f64]) -> Result<Self, StatsError> {
        if values.is_empty() {
            return Err(StatsError::Empty);
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Ok(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
            median,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min :{} | max :{} | mean :{} | median :{}",
            self.min, self.max, self.mean, self.median
        )
    }
}

/// Windowed least-squares polynomial smoothing.
///
/// Every interior point is replaced by the value at the window centre of a
/// polynomial fitted over the `window` points around it. The first and last
/// `window / 2` points are taken from the fits of the first and last full
/// windows, so the output has the same length as the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavitzkyGolay {
    pub window: usize,
    pub degree: usize,
}

impl Default for SavitzkyGolay {
    fn default() -> Self {
        Self {
            window: 15,
            degree: 3,
        }
    }
}

impl SavitzkyGolay {
    pub fn validate(&self) -> Result<(), StatsError> {
        if self.window == 0 || self.window % 2 == 0 {
            return Err(StatsError::BadWindow(self.window));
        }
        if self.degree >= self.window {
            return Err(StatsError::DegreeTooHigh {
                degree: self.degree,
                window: self.window,
            });
        }
        Ok(())
    }

    pub fn smooth(&self, values: &[f64]) -> Result<Vec<f64>, StatsError> {
        self.validate()?;
        let (n, w) = (values.len(), self.window);
        if n < w {
            return Err(StatsError::TooShort {
                len: n,
                window: w,
            });
        }

        let hat = self.hat_matrix()?;
        let half = w / 2;
        let mut smoothed = vec![0.0; n];
        for start in 0..=n - w {
            smoothed[start + half] = dot(&hat[half], &values[start..start + w]);
        }
        let head = &values[..w];
        for (k, row) in hat.iter().enumerate().take(half) {
            smoothed[k] = dot(row, head);
        }
        let tail = &values[n - w..];
        for (k, row) in hat.iter().enumerate().skip(half + 1) {
            smoothed[n - w + k] = dot(row, tail);
        }
        Ok(smoothed)
    }

    /// `A (AᵀA)⁻¹ Aᵀ` for the Vandermonde matrix `A` of the window offsets.
    /// Row `k` maps a window onto the fitted value at offset `k`.
    fn hat_matrix(&self) -> Result<Vec<Vec<f64>>, StatsError> {
        let (w, terms) = (self.window, self.degree + 1);
        let half = (w / 2) as f64;
        let design = (0..w)
            .map(|i| {
                let x = i as f64 - half;
                (0..terms).map(|p| x.powi(p as i32)).collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        // [AᵀA | Aᵀ], reduced to [I | (AᵀA)⁻¹Aᵀ]
        let mut augmented = (0..terms)
            .map(|r| {
                let mut row = (0..terms)
                    .map(|c| design.iter().map(|x| x[r] * x[c]).sum::<f64>())
                    .collect::<Vec<_>>();
                row.extend(design.iter().map(|x| x[r]));
                row
            })
            .collect::<Vec<_>>();
        gauss_jordan(&mut augmented, terms)?;

        Ok(design
            .iter()
            .map(|x| {
                (0..w)
                    .map(|j| (0..terms).map(|p| x[p] * augmented[p][terms + j]).sum::<f64>())
                    .collect()
            })
            .collect())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Reduces the left `n` columns of `m` to the identity with partial pivoting
fn gauss_jordan(m: &mut [Vec<f64>], n: usize) -> Result<(), StatsError> {
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .ok_or(StatsError::Singular)?;
        if m[pivot][col].abs() < 1e-12 {
            return Err(StatsError::Singular);
        }
        m.swap(col, pivot);

        let scale = m[col][col];
        m[col].iter_mut().for_each(|x| *x /= scale);
        let pivot_row = m[col].clone();
        for (r, row) in m.iter_mut().enumerate() {
            if r == col {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                row.iter_mut()
                    .zip(&pivot_row)
                    .for_each(|(x, p)| *x -= factor * p);
            }
        }
    }
    Ok(())
}
