#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod engine;
mod error;
mod results;

pub use crate::engine::{
    execute, optimize, parse, parse_async, translate, GraphEngine, ParsedQuery,
};
pub use crate::error::EngineError;
pub use crate::results::MaterializedResults;
pub use mindcache::{FileChangeEvent, FileChangeKind};
pub use sparexec::{
    Accumulator, QueryEvaluator, QueryResults, QuerySolution, QueryToken, ServiceHandler,
};
pub use sparlift::{PrefixBinding, VocabularyResolver, WellKnownVocabularies};
