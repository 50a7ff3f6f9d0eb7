use std::fmt;

use crate::ModelError;

/// Identity of one patient across the merged registry.
///
/// The same patient code under two different centers names two different
/// patients, so ordering and equality always include the center.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PatientKey {
    center_code: String,
    patient_code: String,
}

impl PatientKey {
    pub fn new(
        center_code: impl Into<String>,
        patient_code: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let center_code = center_code.into().trim().to_string();
        let patient_code = patient_code.into().trim().to_string();
        if patient_code.is_empty() {
            return Err(ModelError::BlankPatientCode { center_code });
        }
        Ok(Self {
            center_code,
            patient_code,
        })
    }

    pub fn center_code(&self) -> &str {
        &self.center_code
    }

    pub fn patient_code(&self) -> &str {
        &self.patient_code
    }
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.center_code, self.patient_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_trims_codes() {
        let key = PatientKey::new(" C01 ", " P001").unwrap();
        assert_eq!(key.center_code(), "C01");
        assert_eq!(key.patient_code(), "P001");
        assert_eq!(key.to_string(), "C01_P001");
    }

    #[test]
    fn test_blank_patient_code_rejected() {
        let err = PatientKey::new("C01", "  ").unwrap_err();
        assert_eq!(
            err,
            ModelError::BlankPatientCode {
                center_code: "C01".to_string()
            }
        );
    }

    #[test]
    fn test_same_code_in_two_centers_differs() {
        let a = PatientKey::new("A", "001").unwrap();
        let b = PatientKey::new("B", "001").unwrap();
        assert_ne!(a, b);
        assert!(a < b);
    }
}
