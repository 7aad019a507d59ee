use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoanError {
    #[error("All fields are required.")]
    MissingInput,

    #[error("Fields should only contain numeric values.")]
    MalformedNumber { field: &'static str },

    #[error("{message}")]
    OutOfRange { message: String },

    /// Mathematical singularity inside the engine. Validated requests never hit this.
    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Error generating document: {0}")]
    Export(String),
}

impl LoanError {
    /// True for failures caused by the caller's input rather than the service.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LoanError::MissingInput
                | LoanError::MalformedNumber { .. }
                | LoanError::OutOfRange { .. }
        )
    }
}

impl From<csv::Error> for LoanError {
    fn from(e: csv::Error) -> Self {
        LoanError::Export(e.to_string())
    }
}

pub type LoanResult<T> = Result<T, LoanError>;
