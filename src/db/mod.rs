mod connection;
mod error;
mod session;

pub use connection::*;
pub use error::*;
pub use session::*;
