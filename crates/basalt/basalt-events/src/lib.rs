#![forbid(unsafe_code)]

pub mod quote;
pub use quote::Quote;
