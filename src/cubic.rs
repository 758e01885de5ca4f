//! Cubic equations of state for mixtures.
//!
//! A [CubicEos] owns the per-component critical parameters, an alpha
//! function and a mixing rule, and evaluates compressibility-factor roots,
//! densities and fugacity coefficients at a given composition, temperature
//! and pressure. Constructors are provided for the Peng-Robinson (plain and
//! Stryjek-Vera), Soave-Redlich-Kwong and Redlich-Kwong forms.
use crate::alpha::AlphaFunction;
use crate::errors::{EosError, EosResult};
use crate::mixing::MixingRule;
use crate::parameter::MixtureParameters;
use crate::solvers::cubic_roots;
use crate::GAS_CONSTANT as R;
use ndarray::{Array1, Array2};
use std::f64::consts::SQRT_2;
use std::fmt;

// Peng-Robinson shape and universal constants
const C1_PR: f64 = 1.0 - SQRT_2;
const C2_PR: f64 = 1.0 + SQRT_2;
const OMA_PR: f64 = 0.4572355289213825;
const OMB_PR: f64 = 0.07779607390388854;

// Redlich-Kwong shape and universal constants
const C1_RK: f64 = 0.0;
const C2_RK: f64 = 1.0;
const OMA_RK: f64 = 0.42748;
const OMB_RK: f64 = 0.08664;

/// The phase a property is evaluated for.
///
/// Selects the physically meaningful root of the compressibility-factor
/// cubic: the smallest feasible root for a liquid, the largest for a vapor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Liquid,
    Vapor,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liquid => write!(f, "Liquid"),
            Self::Vapor => write!(f, "Vapor"),
        }
    }
}

/// A cubic equation of state bound to a mixture and a mixing rule.
///
/// Instances are immutable and stateless with respect to temperature,
/// pressure and composition; every evaluation recomputes from scratch, so a
/// model can be shared across independent equilibrium calculations.
pub struct CubicEos {
    c1: f64,
    c2: f64,
    oma: f64,
    omb: f64,
    alpha: AlphaFunction,
    parameters: MixtureParameters,
    /// covolumes `b_i = omb R Tc_i / Pc_i`
    b: Array1<f64>,
    mixing: MixingRule,
}

impl CubicEos {
    /// Create a model from explicit EOS constants.
    ///
    /// The mixing rule and the alpha-function coefficients are validated
    /// against the number of components here; an inconsistent combination
    /// never produces a usable model.
    pub fn new(
        parameters: MixtureParameters,
        c1: f64,
        c2: f64,
        oma: f64,
        omb: f64,
        alpha: AlphaFunction,
        mixing: MixingRule,
    ) -> EosResult<Self> {
        let nc = parameters.components();
        mixing.validate(nc)?;
        if let Some(na) = alpha.components() {
            if na != nc {
                return Err(EosError::IncompatibleComponents(na, nc));
            }
        }
        let b = omb * R * &parameters.tc / &parameters.pc;
        Ok(Self {
            c1,
            c2,
            oma,
            omb,
            alpha,
            parameters,
            b,
            mixing,
        })
    }

    /// Peng-Robinson EOS with the Soave alpha function.
    pub fn peng_robinson(parameters: MixtureParameters, mixing: MixingRule) -> EosResult<Self> {
        let k = parameters
            .acentric_factor
            .mapv(|w| 0.37464 + 1.54226 * w - 0.26992 * w * w);
        Self::new(
            parameters,
            C1_PR,
            C2_PR,
            OMA_PR,
            OMB_PR,
            AlphaFunction::Soave(k),
            mixing,
        )
    }

    /// Peng-Robinson EOS with the Stryjek-Vera alpha function.
    ///
    /// If no `(k0, k1)` coefficient rows are supplied, `k0` is estimated from
    /// the acentric factor and `k1` is set to zero.
    pub fn peng_robinson_sv(
        parameters: MixtureParameters,
        ksv: Option<Array2<f64>>,
        mixing: MixingRule,
    ) -> EosResult<Self> {
        let k = match ksv {
            Some(k) => k,
            None => {
                let nc = parameters.components();
                let mut k = Array2::zeros((nc, 2));
                for (i, &w) in parameters.acentric_factor.iter().enumerate() {
                    k[(i, 0)] =
                        0.378893 + 1.4897153 * w - 0.17131838 * w * w + 0.0196553 * w.powi(3);
                }
                k
            }
        };
        Self::new(
            parameters,
            C1_PR,
            C2_PR,
            OMA_PR,
            OMB_PR,
            AlphaFunction::StryjekVera(k),
            mixing,
        )
    }

    /// Soave-Redlich-Kwong EOS.
    pub fn soave_redlich_kwong(
        parameters: MixtureParameters,
        mixing: MixingRule,
    ) -> EosResult<Self> {
        let k = parameters
            .acentric_factor
            .mapv(|w| 0.47979 + 1.5476 * w - 0.1925 * w * w + 0.025 * w.powi(3));
        Self::new(
            parameters,
            C1_RK,
            C2_RK,
            OMA_RK,
            OMB_RK,
            AlphaFunction::Soave(k),
            mixing,
        )
    }

    /// Redlich-Kwong EOS with the original `Tr^(-1/2)` alpha function.
    pub fn redlich_kwong(parameters: MixtureParameters, mixing: MixingRule) -> EosResult<Self> {
        Self::new(
            parameters,
            C1_RK,
            C2_RK,
            OMA_RK,
            OMB_RK,
            AlphaFunction::RedlichKwong,
            mixing,
        )
    }

    /// Number of components.
    pub fn components(&self) -> usize {
        self.parameters.components()
    }

    /// Covolume parameters `b_i` in cm³/mol.
    pub fn covolume(&self) -> &Array1<f64> {
        &self.b
    }

    /// The shape and universal constants `(c1, c2, oma, omb)` of this EOS.
    pub fn constants(&self) -> (f64, f64, f64, f64) {
        (self.c1, self.c2, self.oma, self.omb)
    }

    fn check_composition(&self, x: &Array1<f64>) -> EosResult<()> {
        if x.len() != self.components() {
            return Err(EosError::IncompatibleComponents(self.components(), x.len()));
        }
        Ok(())
    }

    /// Per-component attractive parameter `a_i(T)` in bar cm⁶/mol².
    pub fn attractive_term(&self, t: f64) -> EosResult<Array1<f64>> {
        let alpha = self.alpha.evaluate(t, &self.parameters.tc)?;
        Ok(self.oma * (R * &self.parameters.tc).mapv(|x| x * x) * alpha / &self.parameters.pc)
    }

    /// All feasible roots (`Z > B`) of the compressibility-factor cubic, in
    /// ascending order.
    fn feasible_roots(&self, a: f64, b: f64) -> Vec<f64> {
        let a1 = (self.c1 + self.c2 - 1.0) * b - 1.0;
        let a2 = self.c1 * self.c2 * b * b - (self.c1 + self.c2) * (b * b + b) + a;
        let a3 = -b * (self.c1 * self.c2 * (b * b + b) + a);
        cubic_roots(a1, a2, a3)
            .into_iter()
            .filter(|&z| z > b)
            .collect()
    }

    fn reduced_parameters(&self, x: &Array1<f64>, t: f64, p: f64) -> EosResult<(f64, f64, Array1<f64>)> {
        let a = self.attractive_term(t)?;
        let agg = self
            .mixing
            .aggregate_parameters(x, t, &a, &self.b, self.c1, self.c2);
        let big_a = agg.a_mix * p / (R * t).powi(2);
        let big_b = agg.b_mix * p / (R * t);
        Ok((big_a, big_b, agg.epsilon))
    }

    /// Feasible compressibility-factor roots at `(x, T, P)`.
    pub fn z_roots(&self, x: &Array1<f64>, t: f64, p: f64) -> EosResult<Vec<f64>> {
        self.check_composition(x)?;
        let (big_a, big_b, _) = self.reduced_parameters(x, t, p)?;
        let roots = self.feasible_roots(big_a, big_b);
        if roots.is_empty() {
            return Err(EosError::NoFeasibleRoot(String::from("mixture")));
        }
        Ok(roots)
    }

    fn select_root(roots: &[f64], state: PhaseState) -> EosResult<f64> {
        match state {
            PhaseState::Liquid => roots.first().copied(),
            PhaseState::Vapor => roots.last().copied(),
        }
        .ok_or_else(|| EosError::NoFeasibleRoot(state.to_string()))
    }

    /// Compressibility factor of the requested phase at `(x, T, P)`.
    pub fn compressibility(
        &self,
        x: &Array1<f64>,
        t: f64,
        p: f64,
        state: PhaseState,
    ) -> EosResult<f64> {
        Self::select_root(&self.z_roots(x, t, p)?, state)
    }

    /// Per-component molar densities in mol/cm³ of the requested phase.
    pub fn density(
        &self,
        x: &Array1<f64>,
        t: f64,
        p: f64,
        state: PhaseState,
    ) -> EosResult<Array1<f64>> {
        let z = self.compressibility(x, t, p, state)?;
        Ok(x * (p / (R * t * z)))
    }

    /// Logarithmic fugacity coefficients of all components.
    ///
    /// `v0` is an advisory molar-volume hint threaded through repeated calls
    /// by iterative solvers; it does not affect the returned values. The
    /// updated hint (the molar volume of the selected root) is returned
    /// alongside the coefficients.
    pub fn ln_phi(
        &self,
        x: &Array1<f64>,
        t: f64,
        p: f64,
        state: PhaseState,
        _v0: Option<f64>,
    ) -> EosResult<(Array1<f64>, Option<f64>)> {
        self.check_composition(x)?;
        let a = self.attractive_term(t)?;
        let agg = self
            .mixing
            .aggregate_parameters(x, t, &a, &self.b, self.c1, self.c2);
        let big_a = agg.a_mix * p / (R * t).powi(2);
        let big_b = agg.b_mix * p / (R * t);
        let z = Self::select_root(&self.feasible_roots(big_a, big_b), state)?;

        let log_ratio = ((z + self.c2 * big_b) / (z + self.c1 * big_b)).ln();
        let ln_phi = (z - 1.0) * (&self.b / agg.b_mix)
            - (z - big_b).ln()
            - &agg.epsilon * (log_ratio / (self.c2 - self.c1));
        Ok((ln_phi, Some(z * R * t / p)))
    }

    /// Logarithmic fugacity coefficient of the mixture as a whole.
    pub fn ln_phi_mix(
        &self,
        x: &Array1<f64>,
        t: f64,
        p: f64,
        state: PhaseState,
        _v0: Option<f64>,
    ) -> EosResult<(f64, Option<f64>)> {
        self.check_composition(x)?;
        let (big_a, big_b, _) = self.reduced_parameters(x, t, p)?;
        let z = Self::select_root(&self.feasible_roots(big_a, big_b), state)?;
        Ok((self.ln_phi_z(z, big_a, big_b), Some(z * R * t / p)))
    }

    /// Fugacity coefficients of the pure components, ignoring mixing.
    ///
    /// For every component the cubic is solved on its own; the ambiguity
    /// between the liquid-like and vapor-like root is resolved by taking the
    /// root with the smaller `ln phi` (the stable state of the pure
    /// substance).
    pub fn ln_phi_pure(&self, t: f64, p: f64) -> EosResult<Array1<f64>> {
        let a = self.attractive_term(t)?;
        let mut ln_phi = Array1::zeros(self.components());
        for i in 0..self.components() {
            let big_a = a[i] * p / (R * t).powi(2);
            let big_b = self.b[i] * p / (R * t);
            let roots = self.feasible_roots(big_a, big_b);
            if roots.is_empty() {
                return Err(EosError::NoFeasibleRoot(format!("pure component {}", i)));
            }
            let lo = self.ln_phi_z(roots[0], big_a, big_b);
            let hi = self.ln_phi_z(roots[roots.len() - 1], big_a, big_b);
            ln_phi[i] = lo.min(hi);
        }
        Ok(ln_phi)
    }

    /// Mixture-form fugacity logarithm `ln phi(Z, A, B)`.
    fn ln_phi_z(&self, z: f64, a: f64, b: f64) -> f64 {
        z - 1.0
            - (z - b).ln()
            - a / (b * (self.c2 - self.c1)) * ((z + self.c2 * b) / (z + self.c1 * b)).ln()
    }
}

impl fmt::Display for CubicEos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CubicEos(c1={}, c2={})", self.c1, self.c2)
    }
}
