//! Multiphase equilibrium and stability analysis for cubic equations of
//! state.
//!
//! The crate revolves around the [CubicEos] mixture model, which evaluates
//! compressibility-factor roots, densities and fugacity coefficients at a
//! given composition, temperature and pressure. On top of it,
//! [phase_equilibria] provides Michelsen's tangent-plane-distance stability
//! analysis and a three-phase (liquid-liquid-vapor) flash with a free
//! temperature or pressure.
//!
//! Temperatures are in K, pressures in bar and molar volumes in cm³/mol.
#![warn(clippy::all)]
#![allow(clippy::many_single_char_names)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Result {
            println!($($arg)*);
        }
    }
}

pub mod alpha;
pub mod cubic;
mod errors;
pub mod mixing;
pub mod parameter;
pub mod phase_equilibria;
pub mod solvers;

pub use cubic::{CubicEos, PhaseState};
pub use errors::{EosError, EosResult};
pub use phase_equilibria::{SolverOptions, Verbosity};

/// Universal gas constant in bar cm³ / (mol K).
pub const GAS_CONSTANT: f64 = 83.14;
