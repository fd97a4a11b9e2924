//! External interfaces for the call-center engine

pub mod rest;

pub use rest::RestApiServer;
