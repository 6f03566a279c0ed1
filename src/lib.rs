//! Generate TinyUSB descriptor tables and class wiring from a JSON
//! hardware configuration.

pub mod catalog;
pub mod config;
pub mod emit;
pub mod endpoint;
pub mod error;
pub mod expr;
pub mod generate;
pub mod globals;
pub mod hid;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod strings;
pub mod usb;

pub use catalog::Catalog;
pub use config::Document;
pub use error::Error;
pub use generate::{generate, Generated, Generator};
pub use output::{Output, Templates};
