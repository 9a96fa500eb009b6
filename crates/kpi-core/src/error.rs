use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
