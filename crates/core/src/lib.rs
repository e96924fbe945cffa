pub mod attack;
pub mod config;
pub mod error;
pub mod notification;
pub mod rule;
pub mod value;

pub use attack::*;
pub use config::Config;
pub use error::*;
pub use notification::*;
pub use rule::*;
pub use value::*;
