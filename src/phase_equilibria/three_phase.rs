//! Three-phase (liquid-liquid-vapor) flash with a free temperature or
//! pressure.
//!
//! The solver couples equal-fugacity constraints between two liquid phases
//! `X`, `W` and one vapor phase `Y` (with `X` as the pivot) and the
//! mass-balance closure of every phase into one nonlinear system over
//! `[X, W, Y, free variable]`, solved simultaneously with a damped Newton
//! iteration.
use super::SolverOptions;
use crate::cubic::{CubicEos, PhaseState};
use crate::errors::{EosError, EosResult};
use crate::solvers::newton_system;
use ndarray::{concatenate, s, Array1, Axis};
use std::fmt;

const MAX_ITER_FLASH: usize = 200;
const TOL_FLASH: f64 = 1e-10;

/// The variable solved jointly with the phase compositions; the other one of
/// temperature/pressure is held fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeVariable {
    Temperature,
    Pressure,
}

/// Molar-volume hints threaded through the fugacity evaluations of one
/// solve.
///
/// The hints are owned by the in-flight call and updated on every objective
/// evaluation; they are advisory warm starts only and never shared across
/// calls or threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeHints {
    /// liquid phase X
    pub vx: Option<f64>,
    /// liquid phase W
    pub vw: Option<f64>,
    /// vapor phase Y
    pub vy: Option<f64>,
}

/// Result of a three-phase flash calculation.
#[derive(Debug, Clone)]
pub struct ThreePhaseResult {
    /// temperature in K (fixed or solved, depending on [FreeVariable])
    pub temperature: f64,
    /// pressure in bar (fixed or solved, depending on [FreeVariable])
    pub pressure: f64,
    /// composition of liquid phase X
    pub x: Array1<f64>,
    /// composition of liquid phase W
    pub w: Array1<f64>,
    /// composition of vapor phase Y
    pub y: Array1<f64>,
    /// phase state tags of X, W, Y
    pub states: [PhaseState; 3],
    /// molar-volume estimates of the three phases at the solution
    pub volumes: VolumeHints,
    /// Euclidean norm of the residual at the solution
    pub residual: f64,
    /// number of residual evaluations
    pub evaluations: usize,
    pub converged: bool,
}

impl fmt::Display for ThreePhaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "T = {} K, P = {} bar", self.temperature, self.pressure)?;
        writeln!(f, "phase X ({}): {}", self.states[0], self.x)?;
        writeln!(f, "phase W ({}): {}", self.states[1], self.w)?;
        writeln!(f, "phase Y ({}): {}", self.states[2], self.y)?;
        write!(f, "residual = {:e} ({} evaluations)", self.residual, self.evaluations)
    }
}

/// Solve the three-phase equilibrium for two liquid compositions, one vapor
/// composition and a free temperature or pressure.
///
/// `fixed_value` is the held temperature (for `FreeVariable::Pressure`) or
/// pressure (for `FreeVariable::Temperature`); `free_initial` is the initial
/// guess of the solved variable. Initial compositions typically come from a
/// stability analysis ([super::liquid_liquid_init]).
///
/// Non-convergence is reported through [ThreePhaseResult::converged] and the
/// residual norm. A converged solution containing a negative composition or
/// a negative free variable is rejected as [EosError::NonPhysicalSolution].
#[allow(clippy::too_many_arguments)]
pub fn three_phase_flash(
    x0: &Array1<f64>,
    w0: &Array1<f64>,
    y0: &Array1<f64>,
    free_initial: f64,
    fixed_value: f64,
    free: FreeVariable,
    eos: &CubicEos,
    hints: VolumeHints,
    options: SolverOptions,
) -> EosResult<ThreePhaseResult> {
    let nc = eos.components();
    for comp in [x0, w0, y0] {
        if comp.len() != nc {
            return Err(EosError::IncompatibleComponents(nc, comp.len()));
        }
    }
    let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_FLASH, TOL_FLASH);

    let mut unknowns = Array1::zeros(3 * nc + 1);
    unknowns.slice_mut(s![0..nc]).assign(x0);
    unknowns.slice_mut(s![nc..2 * nc]).assign(w0);
    unknowns.slice_mut(s![2 * nc..3 * nc]).assign(y0);
    unknowns[3 * nc] = free_initial;

    let mut hints = hints;
    let solution = newton_system(
        |u: &Array1<f64>| equilibrium_residual(u, fixed_value, free, eos, &mut hints),
        &unknowns,
        tol,
        max_iter,
    )?;

    log_result!(
        verbosity,
        "three-phase flash: residual {:e} after {} evaluation(s), converged: {}\n",
        solution.residual,
        solution.evaluations,
        solution.converged
    );

    check_physical(&solution.x)?;

    let x = solution.x.slice(s![0..nc]).to_owned();
    let w = solution.x.slice(s![nc..2 * nc]).to_owned();
    let y = solution.x.slice(s![2 * nc..3 * nc]).to_owned();
    let (temperature, pressure) = resolve_t_p(solution.x[3 * nc], fixed_value, free);

    Ok(ThreePhaseResult {
        temperature,
        pressure,
        x,
        w,
        y,
        states: [PhaseState::Liquid, PhaseState::Liquid, PhaseState::Vapor],
        volumes: hints,
        residual: solution.residual,
        evaluations: solution.evaluations,
        converged: solution.converged,
    })
}

/// Equal-fugacity and mass-balance residual of the three-phase system.
///
/// `K1 = exp(ln phi_X - ln phi_Y)` and `K2 = exp(ln phi_X - ln phi_W)` pivot
/// on phase X; the residual stacks `K1 X - Y`, `K2 X - W` and the three
/// composition closures.
fn equilibrium_residual(
    u: &Array1<f64>,
    fixed_value: f64,
    free: FreeVariable,
    eos: &CubicEos,
    hints: &mut VolumeHints,
) -> EosResult<Array1<f64>> {
    let nc = eos.components();
    let x = u.slice(s![0..nc]).to_owned();
    let w = u.slice(s![nc..2 * nc]).to_owned();
    let y = u.slice(s![2 * nc..3 * nc]).to_owned();
    let (t, p) = resolve_t_p(u[3 * nc], fixed_value, free);

    let (fug_x, vx) = eos.ln_phi(&x, t, p, PhaseState::Liquid, hints.vx)?;
    let (fug_w, vw) = eos.ln_phi(&w, t, p, PhaseState::Liquid, hints.vw)?;
    let (fug_y, vy) = eos.ln_phi(&y, t, p, PhaseState::Vapor, hints.vy)?;
    hints.vx = vx;
    hints.vw = vw;
    hints.vy = vy;

    let k1 = (&fug_x - &fug_y).mapv(f64::exp);
    let k2 = (&fug_x - &fug_w).mapv(f64::exp);
    let closures = Array1::from_vec(vec![x.sum() - 1.0, y.sum() - 1.0, w.sum() - 1.0]);
    Ok(concatenate![
        Axis(0),
        k1 * &x - y,
        k2 * &x - w,
        closures
    ])
}

fn resolve_t_p(free_value: f64, fixed_value: f64, free: FreeVariable) -> (f64, f64) {
    match free {
        FreeVariable::Temperature => (free_value, fixed_value),
        FreeVariable::Pressure => (fixed_value, free_value),
    }
}

/// Negative compositions or a negative free variable mean the root finder
/// converged to a spurious root.
fn check_physical(solution: &Array1<f64>) -> EosResult<()> {
    if let Some((i, &v)) = solution.iter().enumerate().find(|(_, &v)| v < 0.0) {
        return Err(EosError::NonPhysicalSolution(format!(
            "solution component {} is negative ({})",
            i, v
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::MixingRule;
    use crate::parameter::MixtureParameters;
    use ndarray::arr1;

    fn model() -> CubicEos {
        let params =
            MixtureParameters::new_simple(&[369.96, 425.2], &[42.5, 38.0], &[0.153, 0.199])
                .unwrap();
        CubicEos::peng_robinson(params, MixingRule::quadratic_simple(2)).unwrap()
    }

    #[test]
    fn physicality_guard_rejects_negative_entries() {
        assert!(check_physical(&arr1(&[0.5, 0.5, 0.3, -0.1])).is_err());
        assert!(check_physical(&arr1(&[0.5, 0.5, 0.3, 330.0])).is_ok());
    }

    #[test]
    fn free_variable_resolution() {
        assert_eq!(
            resolve_t_p(350.0, 2.0, FreeVariable::Temperature),
            (350.0, 2.0)
        );
        assert_eq!(
            resolve_t_p(2.0, 350.0, FreeVariable::Pressure),
            (350.0, 2.0)
        );
    }

    #[test]
    fn rejects_wrong_composition_length() {
        let eos = model();
        let res = three_phase_flash(
            &arr1(&[0.5, 0.3, 0.2]),
            &arr1(&[0.5, 0.5]),
            &arr1(&[0.5, 0.5]),
            1.0,
            330.0,
            FreeVariable::Pressure,
            &eos,
            VolumeHints::default(),
            SolverOptions::default(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn residual_stacks_equilibrium_and_closure_terms() -> EosResult<()> {
        let eos = model();
        let mut hints = VolumeHints::default();
        let u = arr1(&[0.4, 0.6, 0.4, 0.6, 0.4, 0.6, 10.0]);
        let r = equilibrium_residual(&u, 330.0, FreeVariable::Pressure, &eos, &mut hints)?;
        assert_eq!(r.len(), 7);
        // identical liquid compositions make K2 = 1 and the W block vanish
        assert!(r[2].abs() < 1e-12 && r[3].abs() < 1e-12);
        // closures are exactly zero for normalized compositions
        assert!(r[4].abs() < 1e-12 && r[5].abs() < 1e-12 && r[6].abs() < 1e-12);
        // the volume hints were updated by the evaluation
        assert!(hints.vx.is_some() && hints.vw.is_some() && hints.vy.is_some());
        Ok(())
    }
}
