pub mod error;

pub use error::OxitopError;
