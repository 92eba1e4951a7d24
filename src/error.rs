use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An observed value was not a finite double in [0, 1).
  #[error("sample {index} is not a double in [0, 1): {value}")]
  InvalidSample {
    index: usize,
    value: f64
  },

  /// The solving backend cannot encode an operation the convention needs.
  #[error("backend '{backend}' does not support {operation}")]
  UnsupportedOperation {
    backend: &'static str,
    operation: &'static str
  },

  #[error("unknown engine '{0}', expected chrome, firefox or safari")]
  UnknownEngine(String),

  #[error(transparent)]
  IO(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("{0}")]
  SimpleString(String)
}

impl From<String> for Error {
  fn from(description: String) -> Self {
    Error::SimpleString(description)
  }
}
