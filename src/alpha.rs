//! Temperature dependence of the attractive EOS parameter.
use crate::errors::{EosError, EosResult};
use ndarray::{Array1, Array2, Zip};

/// The alpha function scaling the attractive parameter with temperature.
///
/// Each variant carries the per-component coefficients it requires. The
/// coefficient vectors are built by the model constructors from the acentric
/// factors (or supplied directly for the Stryjek-Vera variant).
#[derive(Debug, Clone)]
pub enum AlphaFunction {
    /// Soave: `alpha = (1 + k (1 - sqrt(Tr)))^2`
    Soave(Array1<f64>),
    /// Stryjek-Vera: `alpha = (1 + m (1 - sqrt(Tr)))^2` with
    /// `m = k0 + k1 (1 + sqrt(Tr)) (0.7 - Tr)`; one `(k0, k1)` row per component.
    StryjekVera(Array2<f64>),
    /// Redlich-Kwong: `alpha = Tr^(-1/2)`
    RedlichKwong,
}

impl AlphaFunction {
    /// Evaluate the alpha function for every component at temperature `t`.
    pub fn evaluate(&self, t: f64, tc: &Array1<f64>) -> EosResult<Array1<f64>> {
        if t <= 0.0 {
            return Err(EosError::InvalidState(
                String::from("alpha function"),
                String::from("temperature"),
                t,
            ));
        }
        let tr = tc.mapv(|tci| t / tci);
        Ok(match self {
            Self::Soave(k) => {
                Zip::from(k)
                    .and(&tr)
                    .map_collect(|&ki, &tri| (1.0 + ki * (1.0 - tri.sqrt())).powi(2))
            }
            Self::StryjekVera(k) => Array1::from_shape_fn(tr.len(), |i| {
                let s = tr[i].sqrt();
                let m = k[(i, 0)] + k[(i, 1)] * (1.0 + s) * (0.7 - tr[i]);
                (1.0 + m * (1.0 - s)).powi(2)
            }),
            Self::RedlichKwong => tr.mapv(|tri| tri.powf(-0.5)),
        })
    }

    pub(crate) fn components(&self) -> Option<usize> {
        match self {
            Self::Soave(k) => Some(k.len()),
            Self::StryjekVera(k) => Some(k.dim().0),
            Self::RedlichKwong => None,
        }
    }
}
