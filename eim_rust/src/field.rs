//! Sampling grids, 1D profile buffers and the 2D outer-product field map.

use std::ops::Mul;

use nalgebra::{DMatrix, Scalar};
use num_complex::Complex64;
use num_traits::{cast, Float, Zero};

use crate::constants::ETA0;
use crate::error::EimError;
use crate::parallel::{partition, Execution, ParallelFor};
use crate::types::Polarization;

/// Field components at one sample of a 1D mode.
///
/// `electric` is the dominant transverse electric field and is what the
/// 2D map is built from. `magnetic` is its transverse partner and
/// `longitudinal` the component along the propagation axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldSample {
    pub electric: Complex64,
    pub magnetic: Complex64,
    pub longitudinal: Complex64,
}

impl FieldSample {
    /// Build the components from the continuous potential `psi` and its
    /// derivative.
    ///
    /// For TE `psi` is the electric field itself. For TM it is the
    /// magnetic field scaled so that the electric field equals `psi` in the
    /// reference (core) layer; outside it the normal electric field jumps by
    /// `n_ref^2 / n^2`.
    pub fn from_potential(
        polarization: Polarization,
        psi: f64,
        dpsi: f64,
        n: f64,
        n_ref: f64,
        neff: f64,
        k0: f64,
    ) -> Self {
        let i = Complex64::i();
        match polarization {
            Polarization::TE => Self {
                electric: Complex64::new(psi, 0.0),
                magnetic: Complex64::new(-neff * psi / ETA0, 0.0),
                longitudinal: i * (dpsi / (k0 * ETA0)),
            },
            Polarization::TM => {
                let ratio = (n_ref * n_ref) / (n * n);
                Self {
                    electric: Complex64::new(psi * ratio, 0.0),
                    magnetic: Complex64::new(psi * n_ref * n_ref / (neff * ETA0), 0.0),
                    longitudinal: -i * (ratio * dpsi / (k0 * neff)),
                }
            }
        }
    }
}

/// A closed-form 1D mode that can be evaluated at any coordinate.
pub trait TransverseProfile: Sync {
    fn sample(&self, position: f64) -> FieldSample;
}

/// `n` evenly spaced points from `a` to `b`.
pub fn linspace<T: Float>(a: T, b: T, n: usize) -> Result<Vec<T>, EimError> {
    if n < 2 {
        return Err(EimError::GridTooSmall(n));
    }
    let steps: T = cast(n - 1)
        .ok_or_else(|| EimError::InvalidParameter(format!("cannot represent {n} points")))?;
    let h = (b - a) / steps;
    (0..n)
        .map(|i| {
            cast::<usize, T>(i)
                .map(|t| a + h * t)
                .ok_or_else(|| EimError::InvalidParameter(format!("cannot represent index {i}")))
        })
        .collect()
}

/// Square sampling window `[-extent, extent]` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub points: usize,
    pub extent: f64,
}

impl Grid {
    pub fn new(points: usize, extent: f64) -> Self {
        Self { points, extent }
    }

    pub fn validate(&self) -> Result<(), EimError> {
        if self.points < 2 {
            return Err(EimError::GridTooSmall(self.points));
        }
        if !(self.extent > 0.0) {
            return Err(EimError::InvalidParameter(format!(
                "field extent must be positive, got {}",
                self.extent
            )));
        }
        Ok(())
    }

    pub fn positions(&self) -> Result<Vec<f64>, EimError> {
        self.validate()?;
        linspace(-self.extent, self.extent, self.points)
    }
}

/// Evaluate `profile` at every position into `out`.
pub fn fill_profile<P>(
    profile: &P,
    positions: &[f64],
    out: &mut [FieldSample],
    execution: &Execution,
) -> Result<(), EimError>
where
    P: TransverseProfile + ?Sized,
{
    if positions.len() != out.len() {
        return Err(EimError::LengthMismatch {
            expected: positions.len(),
            found: out.len(),
        });
    }
    execution.for_each_mut(out, |i, slot| -> Result<(), EimError> {
        *slot = profile.sample(positions[i]);
        Ok(())
    })?;
    Ok(())
}

pub fn sample_profile<P>(
    profile: &P,
    positions: &[f64],
    execution: &Execution,
) -> Result<Vec<FieldSample>, EimError>
where
    P: TransverseProfile + ?Sized,
{
    let mut out = vec![FieldSample::default(); positions.len()];
    fill_profile(profile, positions, &mut out, execution)?;
    Ok(out)
}

/// `result[(i, j)] = a[i] * b[j]`.
pub fn outer_product<T>(a: &[T], b: &[T]) -> DMatrix<T>
where
    T: Scalar + Copy + Mul<Output = T>,
{
    DMatrix::from_fn(a.len(), b.len(), |i, j| a[i] * b[j])
}

/// Outer product with the rows of the result distributed over workers.
///
/// Produces exactly the same values as [`outer_product`].
pub fn par_outer_product<T>(a: &[T], b: &[T], execution: &Execution) -> Result<DMatrix<T>, EimError>
where
    T: Scalar + Copy + Zero + Mul<Output = T> + Send + Sync,
{
    let (rows, cols) = (a.len(), b.len());
    if rows == 0 || cols == 0 || !execution.is_parallel() {
        return Ok(outer_product(a, b));
    }

    // Row-major staging buffer so each worker owns whole rows.
    let mut buffer = vec![T::zero(); rows * cols];
    let mut row_slices: Vec<&mut [T]> = buffer.chunks_mut(cols).collect();
    execution.for_each_mut(&mut row_slices, |i, row| -> Result<(), EimError> {
        for (cell, bj) in row.iter_mut().zip(b) {
            *cell = a[i] * *bj;
        }
        Ok(())
    })?;
    Ok(DMatrix::from_row_slice(rows, cols, &buffer))
}

/// Dot product of two equal-length slices, one partial sum per worker.
pub fn inner_product<T>(a: &[T], b: &[T], workers: usize) -> Result<T, EimError>
where
    T: Copy + Zero + Mul<Output = T> + Send + Sync,
{
    if a.len() != b.len() {
        return Err(EimError::LengthMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    let ranges = partition(a.len(), workers);
    let mut partials = vec![T::zero(); ranges.len()];
    ParallelFor::new(ranges.len()).for_each_mut(&mut partials, |w, partial| -> Result<(), EimError> {
        *partial = ranges[w]
            .clone()
            .fold(T::zero(), |acc, i| acc + a[i] * b[i]);
        Ok(())
    })?;
    Ok(partials.into_iter().fold(T::zero(), |acc, p| acc + p))
}

/// 2D transverse field on a grid. Rows follow the transverse (vertical)
/// axis and columns the lateral (horizontal) axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    pub transverse: Vec<f64>,
    pub lateral: Vec<f64>,
    pub amplitude: DMatrix<Complex64>,
}

impl FieldMap {
    pub fn magnitude(&self, row: usize, col: usize) -> f64 {
        self.amplitude[(row, col)].norm()
    }

    /// Row, column and magnitude of the largest sample.
    pub fn peak(&self) -> (usize, usize, f64) {
        let mut best = (0, 0, 0.0);
        for row in 0..self.amplitude.nrows() {
            for col in 0..self.amplitude.ncols() {
                let mag = self.magnitude(row, col);
                if mag > best.2 {
                    best = (row, col, mag);
                }
            }
        }
        best
    }

    /// `(row, col, transverse, lateral, |E|)` in row-major order.
    pub fn samples(&self) -> impl Iterator<Item = (usize, usize, f64, f64, f64)> + '_ {
        self.transverse.iter().enumerate().flat_map(move |(row, &t)| {
            self.lateral
                .iter()
                .enumerate()
                .map(move |(col, &l)| (row, col, t, l, self.magnitude(row, col)))
        })
    }
}

/// Sample both 1D modes on `grid` and combine them by outer product.
pub fn reconstruct<V, H>(
    vertical: &V,
    lateral: &H,
    grid: &Grid,
    execution: &Execution,
) -> Result<FieldMap, EimError>
where
    V: TransverseProfile + ?Sized,
    H: TransverseProfile + ?Sized,
{
    let positions = grid.positions()?;
    let rows: Vec<Complex64> = sample_profile(vertical, &positions, execution)?
        .iter()
        .map(|s| s.electric)
        .collect();
    let cols: Vec<Complex64> = sample_profile(lateral, &positions, execution)?
        .iter()
        .map(|s| s.electric)
        .collect();
    let amplitude = par_outer_product(&rows, &cols, execution)?;
    Ok(FieldMap {
        transverse: positions.clone(),
        lateral: positions,
        amplitude,
    })
}
