pub mod config;
pub mod error;
pub mod owner;
pub mod routes;

pub use routes::router;
