//! `SERVICE` delegation.
//!
//! Remote transport is a shell concern: the evaluator only knows a handler
//! trait. `SERVICE SILENT` turns every handler failure into an empty result.

use crate::error::QueryEvaluationError;
use mindrdf::{NamedNode, Term, Variable};
use sparir::algebra::GraphPattern;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

/// One remote solution row.
pub type ServiceSolution = HashMap<Variable, Term>;

/// An adapter evaluating a pattern against an external endpoint.
pub trait ServiceHandler {
    fn handle(
        &self,
        service_name: &NamedNode,
        pattern: &GraphPattern,
    ) -> Result<Vec<ServiceSolution>, Box<dyn Error + Send + Sync>>;
}

/// Routes `SERVICE` calls to a default handler, if any is registered.
#[derive(Clone, Default)]
pub(crate) struct ServiceHandlerRegistry {
    default: Option<Arc<dyn ServiceHandler>>,
}

impl ServiceHandlerRegistry {
    pub fn with_default(handler: Arc<dyn ServiceHandler>) -> Self {
        Self {
            default: Some(handler),
        }
    }

    pub fn handle(
        &self,
        service_name: &NamedNode,
        pattern: &GraphPattern,
        silent: bool,
    ) -> Result<Vec<ServiceSolution>, QueryEvaluationError> {
        let result = match &self.default {
            Some(handler) => handler
                .handle(service_name, pattern)
                .map_err(QueryEvaluationError::Service),
            None => Err(QueryEvaluationError::UnsupportedService(
                service_name.clone(),
            )),
        };
        match result {
            Ok(solutions) => Ok(solutions),
            Err(_) if silent => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
