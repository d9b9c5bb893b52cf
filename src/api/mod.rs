pub mod auth;
pub mod ingress;
pub mod rest;

pub use rest::router;
