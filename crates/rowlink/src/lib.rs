#![doc = include_str!("../README.md")]

mod cache;
mod error;
mod lookup;
mod pipeline;
mod record;

pub use cache::*;
pub use error::*;
pub use lookup::*;
pub use pipeline::*;
pub use record::*;
