//! Token based SQL rewriting and parameter remapping.

pub mod engine;
pub mod generator;
pub mod parameter;
pub mod token;

pub use engine::SqlRewriteEngine;
pub use generator::{TokenGenerator, TokenInput};
pub use parameter::{GroupedParameterBuilder, ParameterBuilder, StandardParameterBuilder};
pub use token::SqlToken;
