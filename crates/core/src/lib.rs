#![forbid(unsafe_code)]

pub mod error;
pub mod integrity;
pub mod model;
pub mod scorer;
pub mod session;
pub mod time;

pub use error::Error;
pub use time::Clock;
