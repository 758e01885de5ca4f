//! Critical constants and EOS coefficients for the components of a mixture.
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for incomplete or inconsistent parameter sets.
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Information missing.")]
    InsufficientInformation,
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
}

/// Critical parameters for a single substance.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ComponentRecord {
    /// component name
    #[serde(default)]
    pub name: String,
    /// critical temperature in Kelvin
    pub tc: f64,
    /// critical pressure in bar
    pub pc: f64,
    /// acentric factor
    pub acentric_factor: f64,
}

impl ComponentRecord {
    /// Create a new pure substance record.
    pub fn new(name: &str, tc: f64, pc: f64, acentric_factor: f64) -> Self {
        Self {
            name: name.to_owned(),
            tc,
            pc,
            acentric_factor,
        }
    }
}

impl fmt::Display for ComponentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentRecord(name={}", self.name)?;
        write!(f, ", tc={} K", self.tc)?;
        write!(f, ", pc={} bar", self.pc)?;
        write!(f, ", acentric factor={})", self.acentric_factor)
    }
}

/// Critical parameters for one or more substances.
#[derive(Debug, Clone)]
pub struct MixtureParameters {
    /// Critical temperatures in Kelvin
    pub tc: Array1<f64>,
    /// Critical pressures in bar
    pub pc: Array1<f64>,
    /// Acentric factors
    pub acentric_factor: Array1<f64>,
    /// List of pure component records
    pub records: Vec<ComponentRecord>,
}

impl MixtureParameters {
    /// Collect pure component records into mixture parameters.
    pub fn from_records(records: Vec<ComponentRecord>) -> Result<Self, ParameterError> {
        if records.is_empty() {
            return Err(ParameterError::InsufficientInformation);
        }
        for r in &records {
            if r.tc <= 0.0 || r.pc <= 0.0 {
                return Err(ParameterError::IncompatibleParameters(format!(
                    "critical constants of '{}' have to be positive.",
                    r.name
                )));
            }
        }
        let tc = records.iter().map(|r| r.tc).collect();
        let pc = records.iter().map(|r| r.pc).collect();
        let acentric_factor = records.iter().map(|r| r.acentric_factor).collect();
        Ok(Self {
            tc,
            pc,
            acentric_factor,
            records,
        })
    }

    /// Parse records from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        let records: Vec<ComponentRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Build a simple parameter set from raw slices.
    pub fn new_simple(tc: &[f64], pc: &[f64], acentric_factor: &[f64]) -> Result<Self, ParameterError> {
        if [pc.len(), acentric_factor.len()]
            .iter()
            .any(|&l| l != tc.len())
        {
            return Err(ParameterError::IncompatibleParameters(String::from(
                "each component has to have parameters.",
            )));
        }
        let records = (0..tc.len())
            .map(|i| ComponentRecord::new("", tc[i], pc[i], acentric_factor[i]))
            .collect();
        Self::from_records(records)
    }

    /// Number of components.
    pub fn components(&self) -> usize {
        self.records.len()
    }
}

impl fmt::Display for MixtureParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.records.iter().try_for_each(|r| writeln!(f, "{}", r))
    }
}

/// Check that a binary interaction matrix matches the number of components.
pub(crate) fn validate_binary_matrix(
    k_ij: &Array2<f64>,
    nc: usize,
    rule: &str,
) -> Result<(), ParameterError> {
    if k_ij.dim() != (nc, nc) {
        return Err(ParameterError::IncompatibleParameters(format!(
            "the {} rule requires a {}x{} binary interaction matrix, got {}x{}.",
            rule,
            nc,
            nc,
            k_ij.dim().0,
            k_ij.dim().1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_from_json() -> Result<(), ParameterError> {
        let records = r#"[
            {"name": "water", "tc": 647.13, "pc": 220.55, "acentric_factor": 0.344861},
            {"name": "mtbe", "tc": 497.1, "pc": 34.3, "acentric_factor": 0.266059}
        ]"#;
        let params = MixtureParameters::from_json_str(records)?;
        assert_eq!(params.components(), 2);
        assert_eq!(params.tc[0], 647.13);
        assert_eq!(params.records[1].name, "mtbe");
        Ok(())
    }

    #[test]
    fn rejects_nonpositive_critical_constants() {
        let res = MixtureParameters::new_simple(&[500.0, -1.0], &[40.0, 30.0], &[0.2, 0.3]);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_inconsistent_lengths() {
        let res = MixtureParameters::new_simple(&[500.0, 450.0], &[40.0], &[0.2, 0.3]);
        assert!(res.is_err());
    }
}
