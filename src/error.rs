use std::fmt;
use std::io;
use std::result;

use thiserror::Error;

#[derive(Error, Debug)]
/// A custom crashtag error
pub enum Error {
    /// An IO based error
    IO(io::Error),
    /// JSON report error
    Json(serde_json::Error),
    /// Malformed report
    Report(String),
    /// Malformed rules file
    Rules(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::IO(ref err) => write!(f, "{}", err),
            Error::Json(ref err) => write!(f, "Json: {}", err),
            Error::Report(ref msg) => write!(f, "Report: {}", msg),
            Error::Rules(ref msg) => write!(f, "Rules: {}", msg),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Error {
        Error::IO(io::Error::new(io::ErrorKind::Other, err))
    }
}

pub type Result<T> = result::Result<T, Error>;
