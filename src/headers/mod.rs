//! Helpers built on top of [`crate::header::Header`] for individual
//! well-known fields, as opposed to the generic `find`/`append`/`set`
//! surface `Header` itself exposes.

pub mod connection;
