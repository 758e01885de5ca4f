//! Tangent-plane-distance (TPD) stability analysis.
//!
//! A negative TPD at any trial composition means the reference composition
//! is thermodynamically unstable and will split. The minimizers of the TPD
//! surface double as initial guesses for flash calculations.
use super::SolverOptions;
use crate::cubic::{CubicEos, PhaseState};
use crate::errors::EosResult;
use crate::solvers::{bfgs, finite_or_zero, Minimum};
use ndarray::{Array1, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MINIMIZE_KMAX: usize = 200;
const MINIMIZE_TOL: f64 = 1e-6;
/// L-infinity tolerance below which two minima count as the same.
const DISTINCT_TOL: f64 = 1e-3;
/// Clip for reference compositions and seeds, keeps all logarithms finite.
const COMPOSITION_CLIP: f64 = 1e-8;
const SEED_CLIP: f64 = 1e-5;

/// Michelsen's dimensionless tangent plane distance of trial composition `x`
/// in phase `state` relative to the (liquid) reference composition `z`.
pub fn tpd(
    x: &Array1<f64>,
    state: PhaseState,
    z: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
) -> EosResult<f64> {
    let (ln_phi_x, _) = eos.ln_phi(x, t, p, state, None)?;
    let (ln_phi_z, _) = eos.ln_phi(z, t, p, PhaseState::Liquid, None)?;
    let di = z.mapv(f64::ln) + ln_phi_z;
    Ok(Zip::from(x)
        .and(&(x.mapv(f64::ln) + ln_phi_x - di))
        .fold(0.0, |acc, &xi, &term| acc + finite_or_zero(xi * term)))
}

/// Minimize the TPD surface starting from the trial composition `w0`.
///
/// Trial mole numbers are reparametrized as `W = alpha^2 / 2`, which keeps
/// them non-negative without bound constraints; the smooth objective
/// `1 + sum W (ln W + ln phi - d - 1)` is minimized with BFGS using its
/// analytic gradient `alpha (ln W + ln phi - d)`. The result is normalized
/// to a mole-fraction vector.
pub fn tpd_min(
    w0: &Array1<f64>,
    z: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
    state_trial: PhaseState,
    state_ref: PhaseState,
    options: SolverOptions,
) -> EosResult<(Array1<f64>, f64)> {
    let di = reference_term(z, t, p, eos, state_ref)?;
    let alpha0 = (2.0 * w0.mapv(f64::sqrt)).mapv(|a| a.max(COMPOSITION_CLIP));
    let min = minimize_tpd(&alpha0, &di, t, p, eos, state_trial, options)?;
    let w = normalize_moles(&min.x);
    Ok((w, min.value))
}

/// Enumerate up to `n_min` distinct minima of the TPD surface.
///
/// Seeds are tried in a fixed order: every pure-component vertex first, then
/// up to `n_min + 1` random compositions drawn from the seeded generator.
/// Minima closer than 1e-3 (L-infinity) to an already recorded one are
/// discarded. If fewer than `n_min` distinct minima exist, the output is
/// padded with copies of the first minimum; callers can detect the padding
/// by comparing for exact duplication.
pub fn tpd_minima(
    n_min: usize,
    z: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
    state_trial: PhaseState,
    state_ref: PhaseState,
    options: SolverOptions,
    seed: u64,
) -> EosResult<(Vec<Array1<f64>>, Array1<f64>)> {
    let nc = eos.components();
    let di = reference_term(z, t, p, eos, state_ref)?;
    let mut minima: Vec<Array1<f64>> = Vec::with_capacity(n_min);
    let mut values: Vec<f64> = Vec::with_capacity(n_min);

    // deterministic pure-component vertices first
    for i in 0..nc {
        if minima.len() == n_min {
            break;
        }
        let alpha0 = Array1::from_shape_fn(nc, |j| {
            if i == j {
                2.0
            } else {
                SEED_CLIP
            }
        });
        let min = minimize_tpd(&alpha0, &di, t, p, eos, state_trial, options)?;
        let w = normalize_moles(&min.x);
        log_iter!(
            options.verbosity,
            "seed {:2} | tpd {:14.8e} | converged: {}",
            i,
            min.value,
            min.converged
        );
        // the very first result is kept regardless of convergence
        if minima.is_empty() || (min.converged && is_distinct(&minima, &w)) {
            minima.push(w);
            values.push(min.value);
        }
    }

    // bounded random fallback
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tries = 0;
    while minima.len() < n_min && tries < n_min + 1 {
        tries += 1;
        let raw = Array1::from_shape_fn(nc, |_| rng.gen::<f64>());
        let w0 = &raw / raw.sum();
        let alpha0 = (2.0 * w0.mapv(f64::sqrt)).mapv(|a: f64| a.max(SEED_CLIP));
        let min = minimize_tpd(&alpha0, &di, t, p, eos, state_trial, options)?;
        let w = normalize_moles(&min.x);
        if min.converged && is_distinct(&minima, &w) {
            minima.push(w);
            values.push(min.value);
        }
    }

    log_result!(
        options.verbosity,
        "tpd search: {} distinct minimum(s) found, {} requested\n",
        minima.len(),
        n_min
    );

    // degenerate fallback: repeat the first minimum
    while minima.len() < n_min {
        minima.push(minima[0].clone());
        values.push(values[0]);
    }

    Ok((minima, Array1::from_vec(values)))
}

/// Initial guesses for a liquid-liquid split: the two lowest TPD minima with
/// both trial and reference phase liquid.
pub fn liquid_liquid_init(
    z: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
    options: SolverOptions,
    seed: u64,
) -> EosResult<(Array1<f64>, Array1<f64>)> {
    let (minima, _) = tpd_minima(
        2,
        z,
        t,
        p,
        eos,
        PhaseState::Liquid,
        PhaseState::Liquid,
        options,
        seed,
    )?;
    let mut iter = minima.into_iter();
    match (iter.next(), iter.next()) {
        (Some(w1), Some(w2)) => Ok((w1, w2)),
        _ => Err(crate::EosError::IterationFailed(String::from(
            "liquid_liquid_init",
        ))),
    }
}

/// Molar Gibbs energy of mixing relative to the pure-component reference
/// fugacities `ln_phi_ref` (as computed by [CubicEos::ln_phi_pure]).
pub fn gibbs_mixing(
    x: &Array1<f64>,
    t: f64,
    p: f64,
    state: PhaseState,
    ln_phi_ref: &Array1<f64>,
    eos: &CubicEos,
) -> EosResult<f64> {
    let (ln_phi_mix, _) = eos.ln_phi_mix(x, t, p, state, None)?;
    let ideal = x.iter().map(|&xi| finite_or_zero(xi * xi.ln())).sum::<f64>();
    Ok(ln_phi_mix - (x * ln_phi_ref).sum() + ideal)
}

/// The constant part `d_i = ln z_i + ln phi_i(z)` of the TPD objective.
fn reference_term(
    z: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
    state_ref: PhaseState,
) -> EosResult<Array1<f64>> {
    let z_clip = z.mapv(|zi| zi.max(COMPOSITION_CLIP));
    let (ln_phi_z, _) = eos.ln_phi(&z_clip, t, p, state_ref, None)?;
    Ok(z_clip.mapv(f64::ln) + ln_phi_z)
}

fn minimize_tpd(
    alpha0: &Array1<f64>,
    di: &Array1<f64>,
    t: f64,
    p: f64,
    eos: &CubicEos,
    state_trial: PhaseState,
    options: SolverOptions,
) -> EosResult<Minimum> {
    let (max_iter, tol, _) = options.unwrap_or(MINIMIZE_KMAX, MINIMIZE_TOL);
    bfgs(
        |alpha: &Array1<f64>| {
            let w_moles = alpha.mapv(|a| 0.5 * a * a);
            let w = &w_moles / w_moles.sum();
            let (ln_phi_w, _) = eos.ln_phi(&w, t, p, state_trial, None)?;
            let dtpd = w_moles.mapv(f64::ln) + ln_phi_w - di;
            let value = 1.0
                + Zip::from(&w_moles)
                    .and(&dtpd)
                    .fold(0.0, |acc, &wi, &ti| acc + finite_or_zero(wi * (ti - 1.0)));
            let gradient = Zip::from(alpha)
                .and(&dtpd)
                .map_collect(|&ai, &ti| finite_or_zero(ai * ti));
            Ok((value, gradient))
        },
        alpha0,
        tol,
        max_iter,
    )
}

fn normalize_moles(alpha: &Array1<f64>) -> Array1<f64> {
    let w = alpha.mapv(|a| 0.5 * a * a);
    &w / w.sum()
}

fn is_distinct(minima: &[Array1<f64>], w: &Array1<f64>) -> bool {
    minima.iter().all(|m| {
        Zip::from(m)
            .and(w)
            .fold(0.0, |acc: f64, &mi, &wi| acc.max((mi - wi).abs()))
            > DISTINCT_TOL
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::MixingRule;
    use crate::parameter::MixtureParameters;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::arr1;

    fn propane_butane() -> CubicEos {
        let params =
            MixtureParameters::new_simple(&[369.96, 425.2], &[42.5, 38.0], &[0.153, 0.199])
                .unwrap();
        CubicEos::peng_robinson(params, MixingRule::quadratic_simple(2)).unwrap()
    }

    #[test]
    fn tpd_vanishes_at_the_reference_composition() -> EosResult<()> {
        let eos = propane_butane();
        let z = arr1(&[0.4, 0.6]);
        let d = tpd(&z, PhaseState::Liquid, &z, 320.0, 15.0, &eos)?;
        assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn stable_mixture_minimum_is_the_trivial_solution() -> EosResult<()> {
        // compressed propane/butane liquid, well above the bubble pressure
        let eos = propane_butane();
        let z = arr1(&[0.4, 0.6]);
        let (minima, values) = tpd_minima(
            1,
            &z,
            320.0,
            15.0,
            &eos,
            PhaseState::Liquid,
            PhaseState::Liquid,
            SolverOptions::default(),
            7,
        )?;
        assert_eq!(minima.len(), 1);
        assert_abs_diff_eq!(minima[0][0], z[0], epsilon = 1e-2);
        assert_abs_diff_eq!(minima[0][1], z[1], epsilon = 1e-2);
        assert_abs_diff_eq!(values[0], 0.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn degenerate_search_pads_with_the_first_minimum() -> EosResult<()> {
        // a stable mixture has a single distinct minimum; requesting more
        // pads the tail with exact copies
        let eos = propane_butane();
        let z = arr1(&[0.4, 0.6]);
        let (minima, values) = tpd_minima(
            4,
            &z,
            320.0,
            15.0,
            &eos,
            PhaseState::Liquid,
            PhaseState::Liquid,
            SolverOptions::default(),
            7,
        )?;
        assert_eq!(minima.len(), 4);
        assert_eq!(values.len(), 4);
        assert_eq!(minima[3], minima[0]);
        assert_eq!(values[3], values[0]);
        Ok(())
    }

    #[test]
    fn search_is_reproducible_for_a_fixed_seed() -> EosResult<()> {
        let eos = propane_butane();
        let z = arr1(&[0.4, 0.6]);
        let run = |seed| {
            tpd_minima(
                3,
                &z,
                320.0,
                15.0,
                &eos,
                PhaseState::Liquid,
                PhaseState::Liquid,
                SolverOptions::default(),
                seed,
            )
        };
        let (m1, v1) = run(42)?;
        let (m2, v2) = run(42)?;
        assert_eq!(m1, m2);
        assert_eq!(v1, v2);
        Ok(())
    }

    #[test]
    fn liquid_liquid_init_returns_two_compositions() -> EosResult<()> {
        let eos = propane_butane();
        let z = arr1(&[0.4, 0.6]);
        let (w1, w2) =
            liquid_liquid_init(&z, 320.0, 15.0, &eos, SolverOptions::default(), 11)?;
        assert_relative_eq!(w1.sum(), 1.0, max_relative = 1e-10);
        assert_relative_eq!(w2.sum(), 1.0, max_relative = 1e-10);
        Ok(())
    }

    #[test]
    fn gibbs_mixing_is_zero_for_a_pure_component() -> EosResult<()> {
        // compressed liquid for both pure components, so the stable pure
        // reference root is the liquid one
        let eos = propane_butane();
        let x = arr1(&[1.0, 0.0]);
        let ln_phi_ref = eos.ln_phi_pure(320.0, 25.0)?;
        let g = gibbs_mixing(&x, 320.0, 25.0, PhaseState::Liquid, &ln_phi_ref, &eos)?;
        assert_abs_diff_eq!(g, 0.0, epsilon = 1e-10);
        Ok(())
    }
}
