pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod idempotency;
pub mod pagination;
pub mod password;
pub mod request_meta;
pub mod response;
pub mod routes;
pub mod security;
pub mod state;
pub mod sweeper;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use routes::app;
