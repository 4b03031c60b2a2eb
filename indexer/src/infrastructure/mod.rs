pub mod persistence;
pub mod source;
