//! Top-level error type. Every variant ends the run as UNKNOWN.

use thiserror::Error;

use crate::mssql::DbError;
use crate::probe::ProbeError;
use crate::threshold::RangeError;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("invalid database filter: {0}")]
    Filter(#[from] regex::Error),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CheckError>;
