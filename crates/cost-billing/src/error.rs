use std::fmt;

/// Fatal reconciliation errors. Tag lookup failures never end up here.
#[derive(Debug)]
pub enum ReconcileError {
    /// Destination table could not be created.
    Setup { table: String, message: String },
    /// A provider or warehouse read failed.
    Fetch { step: &'static str, message: String },
    /// An invoice batch could not be stored, even after retries.
    Write {
        invoice_id: String,
        attempts: u32,
        message: String,
    },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Setup { table, message } => {
                write!(f, "setup failed for table {table}: {message}")
            }
            ReconcileError::Fetch { step, message } => {
                write!(f, "fetch failed step={step}: {message}")
            }
            ReconcileError::Write {
                invoice_id,
                attempts,
                message,
            } => write!(
                f,
                "write failed invoice_id={invoice_id} attempts={attempts}: {message}"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {}
