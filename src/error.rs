use thiserror::Error;

use crate::schema::{ValidatorSubType, ValidatorType};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("form url is not valid, must match the following regex {pattern}: {url}")]
    InvalidUrl { url: String, pattern: &'static str },

    #[error("exception occurred while scraping form, expected status code 200 but got {0}")]
    Fetch(u16),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("field container #{0} has no data-params attribute")]
    MissingConfig(usize),

    #[error("failed to parse field configuration: {0}")]
    Parse(String),

    #[error("malformed field configuration in container #{container}: missing {what}")]
    MalformedField { container: usize, what: &'static str },

    #[error("unsupported FieldType(type={code}) found with Field(id={id})")]
    UnknownFieldType { id: u64, code: i64 },

    #[error("unsupported ValidatorType(type={code}) found with Field(id={id})")]
    UnknownValidatorType { id: u64, code: i64 },

    #[error("unsupported ValidatorSubType(type={code}|parent={parent}) found with Field(id={id})")]
    UnknownValidatorSubType { id: u64, code: i64, parent: i64 },

    #[error("Field(id={id}) combines {kind:?} with {sub_kind:?}, which no form can declare")]
    UnsupportedValidator {
        id: u64,
        kind: ValidatorType,
        sub_kind: ValidatorSubType,
    },

    #[error("Field(id={id}) declares an unusable validator operand {operand:?}")]
    InvalidOperand { id: u64, operand: String },

    #[error("Field(id={id}) declares an invalid pattern: {reason}")]
    InvalidPattern { id: u64, reason: String },

    #[error("found issue with Field(id={id}), cannot select {requested} options as only {available} options exist")]
    SelectionOverflow {
        id: u64,
        requested: usize,
        available: usize,
    },

    #[error("no value satisfies the validator of Field(id={id}): {reason}")]
    Unsatisfiable { id: u64, reason: String },

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("failed to install ctrl-c handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
