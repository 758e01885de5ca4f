//! Mixing rules combining pure-component EOS parameters into mixture
//! aggregates.
use crate::parameter::{validate_binary_matrix, ParameterError};
use crate::GAS_CONSTANT;
use ndarray::{Array1, Array2};
use std::fmt;
use std::sync::Arc;

/// Aggregate mixture parameters returned by a mixing rule.
///
/// `epsilon` is the composition-derivative term entering the log-ratio part
/// of the component fugacity coefficients. `a_partial` is the partial
/// attractive parameter used by chemical-potential extensions.
#[derive(Debug, Clone)]
pub struct AggregateParameters {
    pub a_mix: f64,
    pub b_mix: f64,
    pub epsilon: Array1<f64>,
    pub a_partial: Array1<f64>,
}

/// Interface for mixing rules driven by an external excess-Gibbs model
/// (NRTL, Wilson, UNIFAC, Redlich-Kister, ...).
///
/// Implementors receive the pure-component attractive and size parameters
/// together with the EOS shape constants and return the aggregates defined
/// by [AggregateParameters].
pub trait ExcessGibbsMixing: Send + Sync {
    /// Number of components the model is parametrized for.
    fn components(&self) -> usize;

    /// Evaluate the mixture aggregates at composition `x` and temperature `t`.
    fn aggregate_parameters(
        &self,
        x: &Array1<f64>,
        t: f64,
        a: &Array1<f64>,
        b: &Array1<f64>,
        c1: f64,
        c2: f64,
    ) -> AggregateParameters;
}

/// The mixing rule bound to a cubic EOS model.
///
/// A closed set of supported rules; each variant carries exactly the
/// parameters it requires, validated against the number of components when
/// the model is constructed.
#[derive(Clone)]
pub enum MixingRule {
    /// Quadratic (van der Waals) mixing rule with binary interaction
    /// parameters `k_ij`.
    Quadratic { k_ij: Array2<f64> },
    /// Modified Huron-Vidal style rule delegating to an external
    /// excess-Gibbs model.
    ExcessGibbs(Arc<dyn ExcessGibbsMixing>),
}

impl MixingRule {
    /// Quadratic rule without binary interaction parameters.
    pub fn quadratic_simple(nc: usize) -> Self {
        Self::Quadratic {
            k_ij: Array2::zeros((nc, nc)),
        }
    }

    pub(crate) fn validate(&self, nc: usize) -> Result<(), ParameterError> {
        match self {
            Self::Quadratic { k_ij } => validate_binary_matrix(k_ij, nc, "quadratic"),
            Self::ExcessGibbs(model) => {
                if model.components() != nc {
                    return Err(ParameterError::IncompatibleParameters(format!(
                        "the excess-Gibbs model is parametrized for {} components, the mixture has {}.",
                        model.components(),
                        nc
                    )));
                }
                Ok(())
            }
        }
    }

    /// Evaluate the mixture aggregates at composition `x` and temperature `t`
    /// from the pure-component attractive parameters `a` and size parameters `b`.
    pub fn aggregate_parameters(
        &self,
        x: &Array1<f64>,
        t: f64,
        a: &Array1<f64>,
        b: &Array1<f64>,
        c1: f64,
        c2: f64,
    ) -> AggregateParameters {
        match self {
            Self::Quadratic { k_ij } => {
                let sqrt_a = a.mapv(f64::sqrt);
                let a_ij = Array2::from_shape_fn((a.len(), a.len()), |(i, j)| {
                    sqrt_a[i] * sqrt_a[j] * (1.0 - k_ij[(i, j)])
                });
                let a_partial = 2.0 * a_ij.dot(x);
                let a_mix = 0.5 * (&a_partial * x).sum();
                let b_mix = b.dot(x);
                let e_mix = a_mix / (b_mix * GAS_CONSTANT * t);
                let epsilon = e_mix * (&a_partial / a_mix - b / b_mix);
                AggregateParameters {
                    a_mix,
                    b_mix,
                    epsilon,
                    a_partial,
                }
            }
            Self::ExcessGibbs(model) => model.aggregate_parameters(x, t, a, b, c1, c2),
        }
    }
}

impl fmt::Debug for MixingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quadratic { k_ij } => write!(f, "Quadratic {{ k_ij: {} }}", k_ij),
            Self::ExcessGibbs(_) => write!(f, "ExcessGibbs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn quadratic_reduces_to_pure_parameters() {
        let rule = MixingRule::quadratic_simple(2);
        let x = arr1(&[1.0, 0.0]);
        let a = arr1(&[2.0e6, 3.0e6]);
        let b = arr1(&[60.0, 80.0]);
        let agg = rule.aggregate_parameters(&x, 300.0, &a, &b, 0.0, 1.0);
        assert_relative_eq!(agg.a_mix, 2.0e6, max_relative = 1e-14);
        assert_relative_eq!(agg.b_mix, 60.0, max_relative = 1e-14);
    }

    #[test]
    fn quadratic_interaction_lowers_attraction() {
        let mut k_ij = Array2::zeros((2, 2));
        k_ij[(0, 1)] = 0.2;
        k_ij[(1, 0)] = 0.2;
        let rule = MixingRule::Quadratic { k_ij };
        let x = arr1(&[0.5, 0.5]);
        let a = arr1(&[2.0e6, 2.0e6]);
        let b = arr1(&[60.0, 60.0]);
        let agg = rule.aggregate_parameters(&x, 300.0, &a, &b, 0.0, 1.0);
        // am = 0.5 a (1 + (1 - k)) for the symmetric equimolar case
        assert_relative_eq!(agg.a_mix, 2.0e6 * 0.9, max_relative = 1e-12);
    }

    #[test]
    fn validation_rejects_wrong_matrix_shape() {
        let rule = MixingRule::Quadratic {
            k_ij: Array2::zeros((3, 3)),
        };
        assert!(rule.validate(2).is_err());
        assert!(rule.validate(3).is_ok());
    }
}
