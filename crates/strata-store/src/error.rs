use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("value key must not be empty")]
  EmptyKey,
}
