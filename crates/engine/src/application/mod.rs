//! Application layer: long-lived services coordinating domain and ports.

pub mod services;
