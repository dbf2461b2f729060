pub mod config;
pub mod error;
pub mod hardware;
pub mod imaging;
pub mod logging;
pub mod milling;
pub mod registration;
pub mod selection;

pub use error::{Error, Result};
