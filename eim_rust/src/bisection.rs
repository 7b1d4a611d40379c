//! Bracketed bisection with explicit convergence diagnostics.

use std::fmt;

/// Outcome of a bisection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convergence {
    Converged,
    /// Iteration budget exhausted, the result landed on an original bracket
    /// endpoint, or the function produced NaN.
    Diverged,
    /// `f(a)` and `f(b)` share a sign; nothing was iterated.
    InvalidRange,
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convergence::Converged => f.write_str("converged"),
            Convergence::Diverged => f.write_str("diverged"),
            Convergence::InvalidRange => f.write_str("invalid range"),
        }
    }
}

/// Run statistics, produced once per solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    pub convergence: Convergence,
    pub iterations: u32,
    pub residual: f64,
}

/// Returned abscissa together with its status.
///
/// `value` is only a root when `status.convergence` is `Converged`; for an
/// invalid range it is the left endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub value: f64,
    pub status: Status,
}

impl Root {
    pub fn is_converged(&self) -> bool {
        self.status.convergence == Convergence::Converged
    }

    pub fn converged(self) -> Option<f64> {
        self.is_converged().then_some(self.value)
    }
}

/// Bisection settings. Each call to [`Bisection::solve`] is independent, so
/// one instance can be shared across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bisection {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for Bisection {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

impl Bisection {
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Find `x` in `[a, b]` with `|f(x)| < tolerance`.
    pub fn solve<F>(&self, f: F, a: f64, b: f64) -> Root
    where
        F: Fn(f64) -> f64,
    {
        let tol = self.tolerance;
        let mut fa = f(a);
        let fb = f(b);

        if fa.is_nan() || fb.is_nan() {
            return Root {
                value: a,
                status: Status {
                    convergence: Convergence::Diverged,
                    iterations: 0,
                    residual: f64::NAN,
                },
            };
        }

        if fa * fb > 0.0 {
            return Root {
                value: a,
                status: Status {
                    convergence: Convergence::InvalidRange,
                    iterations: 0,
                    residual: fa.abs().min(fb.abs()),
                },
            };
        }

        let (mut lo, mut hi) = (a, b);
        let mut iterations = 0;
        while iterations < self.max_iterations {
            let mid = 0.5 * (lo + hi);
            let fmid = f(mid);
            if fmid.is_nan() {
                return self.finish(a, b, mid, fmid, iterations, Convergence::Diverged);
            }
            if fmid.abs() < tol {
                return self.finish(a, b, mid, fmid, iterations, Convergence::Converged);
            }
            if fa * fmid < 0.0 {
                hi = mid;
            } else {
                lo = mid;
                fa = fmid;
            }
            iterations += 1;
        }

        let mid = 0.5 * (lo + hi);
        let fmid = f(mid);
        let convergence = if 0.5 * (hi - lo) <= tol && !fmid.is_nan() {
            Convergence::Converged
        } else {
            Convergence::Diverged
        };
        self.finish(a, b, mid, fmid, iterations, convergence)
    }

    // A result within tolerance of either original endpoint is a cutoff,
    // not an interior root.
    fn finish(
        &self,
        a: f64,
        b: f64,
        value: f64,
        fvalue: f64,
        iterations: u32,
        convergence: Convergence,
    ) -> Root {
        let on_boundary =
            (value - a).abs() < self.tolerance || (value - b).abs() < self.tolerance;
        let convergence = if on_boundary {
            Convergence::Diverged
        } else {
            convergence
        };
        Root {
            value,
            status: Status {
                convergence,
                iterations,
                residual: fvalue.abs(),
            },
        }
    }
}

/// Bisection with the default tolerance (1e-4) and budget (100 iterations).
pub fn bisection<F>(f: F, a: f64, b: f64) -> Root
where
    F: Fn(f64) -> f64,
{
    Bisection::default().solve(f, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_root() {
        let root = bisection(|x| 2.0 * x - 5.0, -6.0, 6.0);
        assert_eq!(root.status.convergence, Convergence::Converged);
        assert_abs_diff_eq!(root.value, 2.5, epsilon = 1e-4);
        assert!(root.status.residual < 1e-4);
        assert!(root.status.iterations > 0);
    }

    #[test]
    fn test_same_sign_is_invalid_range() {
        let root = bisection(|x| x * x + 1.0, -1.0, 2.0);
        assert_eq!(root.status.convergence, Convergence::InvalidRange);
        assert_eq!(root.status.iterations, 0);
        assert_eq!(root.value, -1.0);
        assert_abs_diff_eq!(root.status.residual, 1.0);
        assert_eq!(root.converged(), None);
    }

    #[test]
    fn test_budget_exhausted_diverges() {
        let solver = Bisection::new(1e-12, 3);
        let root = solver.solve(|x| x - 0.3, 0.0, 1.0);
        assert_eq!(root.status.convergence, Convergence::Diverged);
        assert_eq!(root.status.iterations, 3);
    }

    #[test]
    fn test_root_near_endpoint_diverges() {
        let root = bisection(|x| x - 1e-6, 0.0, 1.0);
        assert!(root.status.residual < 1e-4);
        assert_eq!(root.status.convergence, Convergence::Diverged);
    }

    #[test]
    fn test_nan_is_diverged() {
        let root = bisection(|x: f64| (x - 2.0).sqrt() - 1.0, 0.0, 4.0);
        assert_eq!(root.status.convergence, Convergence::Diverged);
        assert_eq!(root.status.iterations, 0);
    }

    #[test]
    fn test_decreasing_function() {
        let root = bisection(|x: f64| x.cos(), 0.0, 3.0);
        assert_eq!(root.converged().map(|v| (v * 1e3).round()), Some(1571.0));
    }
}
