//! Session-level services built on the request pipeline

pub mod auth_service;

pub use auth_service::AuthService;
