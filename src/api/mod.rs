//! JSON front end over the scheduler, the plugins and the mark store

mod error;
pub mod models;
pub mod params;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;

pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;
