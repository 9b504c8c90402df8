use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("parse int error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error("parse float error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error("tokenizer error: {message} at byte {position}")]
    Tokenizer { message: String, position: usize },
    #[error("syntax error: {message} at stream position {position}")]
    Syntax { message: String, position: usize },
    #[error("trouble initializing element {index} of variable {varname}")]
    ElementInit { index: usize, varname: String },
    #[error("no variable named {varname}")]
    NotFound { varname: String },
    #[error("unknown type {type_name}")]
    UnknownType { type_name: String },
    #[error("cannot construct {concrete_name}: {message}")]
    Construct {
        concrete_name: String,
        message: String,
    },
    #[error("type {type_name} is already registered")]
    DuplicateType { type_name: String },
    #[error("bad clone of variable map for type {type_name}")]
    BadClone { type_name: String },
    #[error("variable {varname} is of type {found} but expecting {expected}")]
    TypeMismatch {
        varname: String,
        expected: String,
        found: String,
    },
    #[error("variable {varname} is defined but has no value")]
    Unset { varname: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn syntax_error<T>(message: impl Into<String>, position: usize) -> Result<T> {
    Err(Error::Syntax {
        message: message.into(),
        position,
    })
}

pub fn tokenizer_error<T>(message: impl Into<String>, position: usize) -> Result<T> {
    Err(Error::Tokenizer {
        message: message.into(),
        position,
    })
}
