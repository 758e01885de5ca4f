//! Numerical primitives: real roots of cubic polynomials, an unconstrained
//! quasi-Newton minimizer and a damped Newton solver for square nonlinear
//! systems.
use crate::errors::EosResult;
use ndarray::{Array1, Array2};
use num_dual::linalg::{norm, LU};
use std::f64::consts::PI;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACK: usize = 30;

/// All real roots of `z^3 + a1 z^2 + a2 z + a3`, in ascending order.
///
/// Returns one or three roots (a double root is reported twice).
pub fn cubic_roots(a1: f64, a2: f64, a3: f64) -> Vec<f64> {
    // depressed cubic t^3 + p t + q with z = t - a1/3
    let shift = a1 / 3.0;
    let p = a2 - a1 * a1 / 3.0;
    let q = 2.0 * a1.powi(3) / 27.0 - a1 * a2 / 3.0 + a3;
    let disc = 0.25 * q * q + p.powi(3) / 27.0;

    let mut roots = if disc > 0.0 {
        let sq = disc.sqrt();
        vec![(-0.5 * q + sq).cbrt() + (-0.5 * q - sq).cbrt() - shift]
    } else if p >= 0.0 {
        // disc <= 0 with p >= 0 only happens for p = q = 0 (triple root)
        vec![(-q).cbrt() - shift]
    } else {
        let m = 2.0 * (-p / 3.0).sqrt();
        let theta = (3.0 * q / (p * m)).clamp(-1.0, 1.0).acos() / 3.0;
        (0..3)
            .map(|k| m * (theta - 2.0 * PI * k as f64 / 3.0).cos() - shift)
            .collect()
    };
    roots.sort_by(f64::total_cmp);
    roots
}

/// Result of an unconstrained minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Array1<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize a smooth objective with analytic gradient using BFGS with a
/// backtracking Armijo line search.
///
/// Convergence is tested on the infinity norm of the gradient. A failed line
/// search terminates the iteration with `converged = false` rather than an
/// error; objective evaluation errors are propagated.
pub fn bfgs<F>(mut fg: F, x0: &Array1<f64>, tol: f64, max_iter: usize) -> EosResult<Minimum>
where
    F: FnMut(&Array1<f64>) -> EosResult<(f64, Array1<f64>)>,
{
    let n = x0.len();
    let mut x = x0.clone();
    let (mut f, mut g) = fg(&x)?;
    let mut h = Array2::eye(n);

    for k in 0..max_iter {
        if g.iter().all(|gi| gi.abs() < tol) {
            return Ok(Minimum {
                x,
                value: f,
                iterations: k,
                converged: true,
            });
        }

        let mut d = -h.dot(&g);
        if d.dot(&g) >= 0.0 {
            // not a descent direction, fall back to steepest descent
            h = Array2::eye(n);
            d = -&g;
        }

        let slope = g.dot(&d);
        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACK {
            let x_new = &x + &(step * &d);
            if let Ok((f_new, g_new)) = fg(&x_new) {
                if f_new.is_finite() && f_new <= f + ARMIJO * step * slope {
                    accepted = Some((x_new, f_new, g_new));
                    break;
                }
            }
            step *= 0.5;
        }
        let Some((x_new, f_new, g_new)) = accepted else {
            return Ok(Minimum {
                x,
                value: f,
                iterations: k,
                converged: false,
            });
        };

        // inverse Hessian update
        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        if sy > 1e-12 {
            let hy = h.dot(&y);
            let yhy = y.dot(&hy);
            let hys = outer(&hy, &s);
            h = h - (&hys + &hys.t()) / sy
                + outer(&s, &s) * ((1.0 + yhy / sy) / sy);
        }

        x = x_new;
        f = f_new;
        g = g_new;
    }
    Ok(Minimum {
        x,
        value: f,
        iterations: max_iter,
        converged: false,
    })
}

/// Result of a multivariate root search.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    pub x: Array1<f64>,
    /// Euclidean norm of the residual at `x`
    pub residual: f64,
    /// number of residual evaluations
    pub evaluations: usize,
    pub converged: bool,
}

/// Solve the square nonlinear system `f(x) = 0` with a damped Newton
/// iteration.
///
/// The Jacobian is built from forward differences and the step is
/// backtracked on the residual norm. Running out of iterations is reported
/// through `converged`, not as an error.
pub fn newton_system<F>(
    mut f: F,
    x0: &Array1<f64>,
    tol: f64,
    max_iter: usize,
) -> EosResult<NewtonResult>
where
    F: FnMut(&Array1<f64>) -> EosResult<Array1<f64>>,
{
    let n = x0.len();
    let mut x = x0.clone();
    let mut r = f(&x)?;
    let mut evaluations = 1;
    let sqrt_eps = f64::EPSILON.sqrt();

    for _ in 0..max_iter {
        let res_norm = norm(&r);
        if res_norm < tol {
            return Ok(NewtonResult {
                x,
                residual: res_norm,
                evaluations,
                converged: true,
            });
        }

        // forward-difference Jacobian
        let mut jac = Array2::zeros((n, n));
        for j in 0..n {
            let h = sqrt_eps * x[j].abs().max(1e-5);
            let mut x_h = x.clone();
            x_h[j] += h;
            let r_h = f(&x_h)?;
            evaluations += 1;
            for i in 0..n {
                jac[(i, j)] = (r_h[i] - r[i]) / h;
            }
        }

        // a singular Jacobian is a convergence failure, not a fatal error
        let delta = match LU::new(jac) {
            Ok(lu) => lu.solve(&(-&r)),
            Err(_) => {
                return Ok(NewtonResult {
                    x,
                    residual: res_norm,
                    evaluations,
                    converged: false,
                })
            }
        };

        // backtrack until the residual norm decreases
        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACK {
            let x_new = &x + &(step * &delta);
            evaluations += 1;
            if let Ok(r_new) = f(&x_new) {
                if norm(&r_new) < res_norm {
                    accepted = Some((x_new, r_new));
                    break;
                }
            }
            step *= 0.5;
        }
        let Some((x_new, r_new)) = accepted else {
            return Ok(NewtonResult {
                x,
                residual: res_norm,
                evaluations,
                converged: false,
            });
        };
        x = x_new;
        r = r_new;
    }

    let residual = norm(&r);
    Ok(NewtonResult {
        x,
        residual,
        evaluations,
        converged: residual < tol,
    })
}

pub(crate) fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Map the non-finite result of an `x ln(x)`-shaped expression to zero.
///
/// Zero-concentration species contribute nothing to aggregate thermodynamic
/// potentials; this keeps that convention local to the call sites instead of
/// blanket NaN suppression.
pub(crate) fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn cubic_roots_three_real() {
        // (z - 1)(z - 2)(z - 3) = z^3 - 6 z^2 + 11 z - 6
        let roots = cubic_roots(-6.0, 11.0, -6.0);
        assert_eq!(roots.len(), 3);
        assert_relative_eq!(roots[0], 1.0, max_relative = 1e-10);
        assert_relative_eq!(roots[1], 2.0, max_relative = 1e-10);
        assert_relative_eq!(roots[2], 3.0, max_relative = 1e-10);
    }

    #[test]
    fn cubic_roots_single_real() {
        // (z - 2)(z^2 + 1) = z^3 - 2 z^2 + z - 2
        let roots = cubic_roots(-2.0, 1.0, -2.0);
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0], 2.0, max_relative = 1e-10);
    }

    #[test]
    fn cubic_roots_triple() {
        // (z - 1)^3
        let roots = cubic_roots(-3.0, 3.0, -1.0);
        assert_relative_eq!(roots[0], 1.0, max_relative = 1e-6);
    }

    #[test]
    fn bfgs_quadratic_bowl() -> EosResult<()> {
        let fg = |x: &Array1<f64>| {
            let f = (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2);
            let g = arr1(&[2.0 * (x[0] - 1.0), 4.0 * (x[1] + 0.5)]);
            Ok((f, g))
        };
        let min = bfgs(fg, &arr1(&[5.0, 5.0]), 1e-10, 100)?;
        assert!(min.converged);
        assert_relative_eq!(min.x[0], 1.0, max_relative = 1e-6);
        assert_relative_eq!(min.x[1], -0.5, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn bfgs_rosenbrock() -> EosResult<()> {
        let fg = |x: &Array1<f64>| {
            let f = (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
            let g = arr1(&[
                -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]),
                200.0 * (x[1] - x[0] * x[0]),
            ]);
            Ok((f, g))
        };
        let min = bfgs(fg, &arr1(&[-1.2, 1.0]), 1e-8, 500)?;
        assert!(min.converged);
        assert_relative_eq!(min.x[0], 1.0, max_relative = 1e-4);
        assert_relative_eq!(min.x[1], 1.0, max_relative = 1e-4);
        Ok(())
    }

    #[test]
    fn newton_intersection_of_circle_and_line() -> EosResult<()> {
        let f = |x: &Array1<f64>| Ok(arr1(&[x[0] * x[0] + x[1] * x[1] - 2.0, x[0] - x[1]]));
        let sol = newton_system(f, &arr1(&[2.0, 0.5]), 1e-12, 50)?;
        assert!(sol.converged);
        assert!(sol.residual < 1e-12);
        assert_relative_eq!(sol.x[0], 1.0, max_relative = 1e-8);
        assert_relative_eq!(sol.x[1], 1.0, max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn newton_reports_nonconvergence() -> EosResult<()> {
        // no real root; the iteration drifts towards x = 0 where the
        // derivative vanishes
        let f = |x: &Array1<f64>| Ok(arr1(&[x[0] * x[0] + 1.0]));
        let sol = newton_system(f, &arr1(&[3.0]), 1e-12, 10)?;
        assert!(!sol.converged);
        Ok(())
    }

    #[test]
    fn newton_survives_singular_jacobian() -> EosResult<()> {
        // both residuals depend on x0 + x1 only, so the Jacobian columns are
        // identical everywhere
        let f = |x: &Array1<f64>| Ok(arr1(&[x[0] + x[1] - 1.0, (x[0] + x[1]).powi(2)]));
        let sol = newton_system(f, &arr1(&[2.0, 0.0]), 1e-12, 20)?;
        assert!(!sol.converged);
        assert!(sol.residual.is_finite());
        Ok(())
    }

    #[test]
    fn finite_or_zero_convention() {
        assert_eq!(finite_or_zero(0.0 * f64::ln(0.0)), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
        assert_relative_eq!(finite_or_zero(0.5 * 0.5f64.ln()), 0.5 * 0.5f64.ln());
    }
}
