#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

pub mod algebra;
mod optimizer;
mod translate;

pub use crate::optimizer::{NoStats, Optimizer, PredicateStats};
pub use crate::translate::{translate, TranslateError};
