use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("patient code is blank (center '{center_code}')")]
    BlankPatientCode { center_code: String },
    #[error("unrecognised sex value '{0}' (expected M or F)")]
    InvalidSex(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
