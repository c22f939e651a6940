#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod blank_node;
mod literal;
mod named_node;
mod triple;
mod variable;
pub mod vocab;

pub use crate::blank_node::{BlankNode, BlankNodeIdParseError};
pub use crate::literal::{BaseDirection, Literal};
pub use crate::named_node::{NamedNode, NamedNodeRef};
pub use crate::triple::{GraphName, Quad, Subject, Term, TermCastError, Triple};
pub use crate::variable::{Variable, VariableNameParseError};
pub use oxilangtag::LanguageTagParseError;
pub use oxiri::IriParseError;
