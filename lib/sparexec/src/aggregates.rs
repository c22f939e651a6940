//! Aggregate accumulators: the SPARQL built-ins plus a registry for custom
//! aggregates (median, variance, …).

use crate::error::AggregateError;
use crate::expression::{numeric_add, numeric_div, numeric_of, numeric_to_term, order_terms, Numeric};
use mindrdf::{Literal, NamedNode, Term};
use oxsdatatypes::Integer;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// The state of one aggregate over one group: `init` is construction,
/// [`Accumulator::add`] the step, [`Accumulator::finish`] the finalize.
pub trait Accumulator {
    /// Feeds one row's value; `None` when the argument expression errored or
    /// was unbound for this row.
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError>;

    /// The aggregate result; `None` leaves the output variable unbound.
    fn finish(&mut self) -> Result<Option<Term>, AggregateError>;
}

/// Custom aggregates, keyed by the function IRI.
pub type CustomAggregateRegistry =
    HashMap<NamedNode, Arc<dyn Fn() -> Box<dyn Accumulator> + Send + Sync>>;

pub(crate) fn build_accumulator(
    function: &sparir::algebra::AggregateFunction,
    separator: Option<&str>,
    distinct: bool,
    custom: &CustomAggregateRegistry,
) -> Option<Box<dyn Accumulator>> {
    use sparir::algebra::AggregateFunction;
    let inner: Box<dyn Accumulator> = match function {
        AggregateFunction::Count => Box::new(CountAccumulator::default()),
        AggregateFunction::Sum => Box::new(SumAccumulator::default()),
        AggregateFunction::Avg => Box::new(AvgAccumulator::default()),
        AggregateFunction::Min => Box::new(ExtremumAccumulator::new(Ordering::Less)),
        AggregateFunction::Max => Box::new(ExtremumAccumulator::new(Ordering::Greater)),
        AggregateFunction::GroupConcat => Box::new(GroupConcatAccumulator::new(
            separator.unwrap_or(" ").to_owned(),
        )),
        AggregateFunction::Sample => Box::new(SampleAccumulator::default()),
        AggregateFunction::Custom(name) => custom.get(name)?(),
    };
    Some(if distinct {
        Box::new(DistinctAccumulator {
            seen: FxHashSet::default(),
            inner,
        })
    } else {
        inner
    })
}

/// Forwards only the first occurrence of each value.
struct DistinctAccumulator {
    seen: FxHashSet<Term>,
    inner: Box<dyn Accumulator>,
}

impl Accumulator for DistinctAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        match value {
            Some(value) => {
                if self.seen.insert(value.clone()) {
                    self.inner.add(Some(value))?;
                }
                Ok(())
            }
            None => self.inner.add(None),
        }
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        self.inner.finish()
    }
}

#[derive(Default)]
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        if value.is_some() {
            self.count += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        Ok(Some(Literal::from(self.count).into()))
    }
}

/// SUM over the numeric tower; a non-numeric value poisons the group.
struct SumAccumulator {
    sum: Option<Numeric>,
    failed: bool,
}

impl Default for SumAccumulator {
    fn default() -> Self {
        Self {
            sum: Some(Numeric::Integer(Integer::from(0))),
            failed: false,
        }
    }
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        if self.failed {
            return Ok(());
        }
        let number = value.as_ref().and_then(numeric_of);
        match (self.sum, number) {
            (Some(sum), Some(number)) => match numeric_add(sum, number) {
                Ok(sum) => self.sum = Some(sum),
                Err(_) => self.failed = true,
            },
            _ => self.failed = true,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        if self.failed {
            return Ok(None);
        }
        Ok(self.sum.and_then(|sum| numeric_to_term(sum).ok()))
    }
}

#[derive(Default)]
struct AvgAccumulator {
    sum: SumAccumulator,
    count: i64,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        self.count += 1;
        self.sum.add(value)
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        if self.count == 0 {
            return Ok(Some(Literal::from(0).into()));
        }
        if self.sum.failed {
            return Ok(None);
        }
        let Some(sum) = self.sum.sum else {
            return Ok(None);
        };
        Ok(
            numeric_div(sum, Numeric::Integer(Integer::from(self.count)))
                .ok()
                .and_then(|avg| numeric_to_term(avg).ok()),
        )
    }
}

/// MIN and MAX under the SPARQL term ordering.
struct ExtremumAccumulator {
    keep: Ordering,
    best: Option<Term>,
}

impl ExtremumAccumulator {
    fn new(keep: Ordering) -> Self {
        Self { keep, best: None }
    }
}

impl Accumulator for ExtremumAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        let Some(value) = value else {
            return Ok(());
        };
        let replace = match &self.best {
            None => true,
            Some(best) => order_terms(Some(&value), Some(best)) == self.keep,
        };
        if replace {
            self.best = Some(value);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        Ok(self.best.take())
    }
}

struct GroupConcatAccumulator {
    separator: String,
    value: Option<String>,
    failed: bool,
}

impl GroupConcatAccumulator {
    fn new(separator: String) -> Self {
        Self {
            separator,
            value: None,
            failed: false,
        }
    }
}

impl Accumulator for GroupConcatAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        if self.failed {
            return Ok(());
        }
        let text = match value {
            Some(Term::Literal(literal)) => literal.into_value(),
            Some(Term::NamedNode(node)) => node.into_string(),
            Some(_) | None => {
                self.failed = true;
                return Ok(());
            }
        };
        match &mut self.value {
            Some(value) => {
                value.push_str(&self.separator);
                value.push_str(&text);
            }
            None => self.value = Some(text),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        if self.failed {
            return Ok(None);
        }
        Ok(Some(
            Literal::from(self.value.take().unwrap_or_default()).into(),
        ))
    }
}

#[derive(Default)]
struct SampleAccumulator {
    value: Option<Term>,
}

impl Accumulator for SampleAccumulator {
    fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
        if self.value.is_none() {
            self.value = value;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
        Ok(self.value.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparir::algebra::AggregateFunction;

    fn feed(
        function: AggregateFunction,
        distinct: bool,
        values: Vec<Option<Term>>,
    ) -> Option<Term> {
        let mut accumulator =
            build_accumulator(&function, None, distinct, &CustomAggregateRegistry::new()).unwrap();
        for value in values {
            accumulator.add(value).unwrap();
        }
        accumulator.finish().unwrap()
    }

    fn int(value: i64) -> Option<Term> {
        Some(Literal::from(value).into())
    }

    #[test]
    fn count_counts_bound_values() {
        assert_eq!(
            feed(AggregateFunction::Count, false, vec![int(1), None, int(2)]),
            Some(Term::from(Literal::from(2)))
        );
    }

    #[test]
    fn sum_promotes() {
        let decimal = Some(Term::from(Literal::new_typed_literal(
            "1.5",
            mindrdf::vocab::xsd::DECIMAL,
        )));
        let result = feed(AggregateFunction::Sum, false, vec![int(1), decimal]).unwrap();
        let Term::Literal(literal) = result else {
            panic!("expected literal");
        };
        assert_eq!(literal.value(), "2.5");
    }

    #[test]
    fn avg_divides() {
        let result = feed(AggregateFunction::Avg, false, vec![int(1), int(2)]).unwrap();
        let Term::Literal(literal) = result else {
            panic!("expected literal");
        };
        assert_eq!(literal.value(), "1.5");
    }

    #[test]
    fn distinct_deduplicates() {
        let result = feed(
            AggregateFunction::Count,
            true,
            vec![int(1), int(1), int(2)],
        )
        .unwrap();
        assert_eq!(result, Term::from(Literal::from(2)));
    }

    #[test]
    fn min_max_follow_term_order() {
        assert_eq!(
            feed(AggregateFunction::Min, false, vec![int(10), int(2)]).unwrap(),
            Term::from(Literal::from(2))
        );
        assert_eq!(
            feed(AggregateFunction::Max, false, vec![int(10), int(2)]).unwrap(),
            Term::from(Literal::from(10))
        );
    }

    #[test]
    fn group_concat_joins_with_separator() {
        let values = vec![
            Some(Term::from(Literal::from("a"))),
            Some(Term::from(Literal::from("b"))),
        ];
        let mut accumulator = build_accumulator(
            &AggregateFunction::GroupConcat,
            Some(", "),
            false,
            &CustomAggregateRegistry::new(),
        )
        .unwrap();
        for value in values {
            accumulator.add(value).unwrap();
        }
        assert_eq!(
            accumulator.finish().unwrap().unwrap(),
            Term::from(Literal::from("a, b"))
        );
    }

    #[test]
    fn custom_aggregates_register() {
        struct MedianAccumulator {
            values: Vec<f64>,
        }
        impl Accumulator for MedianAccumulator {
            fn add(&mut self, value: Option<Term>) -> Result<(), AggregateError> {
                if let Some(Term::Literal(literal)) = value {
                    let value: f64 = literal
                        .value()
                        .parse()
                        .map_err(|_| AggregateError("median needs numbers".to_owned()))?;
                    self.values.push(value);
                }
                Ok(())
            }
            fn finish(&mut self) -> Result<Option<Term>, AggregateError> {
                if self.values.is_empty() {
                    return Ok(None);
                }
                self.values.sort_by(f64::total_cmp);
                Ok(Some(Literal::from(self.values[self.values.len() / 2]).into()))
            }
        }

        let name = NamedNode::new_unchecked("http://example.com/median");
        let mut registry = CustomAggregateRegistry::new();
        registry.insert(
            name.clone(),
            Arc::new(|| Box::new(MedianAccumulator { values: Vec::new() })),
        );
        let mut accumulator = build_accumulator(
            &AggregateFunction::Custom(name),
            None,
            false,
            &registry,
        )
        .unwrap();
        for value in [int(1), int(9), int(5)] {
            accumulator.add(value).unwrap();
        }
        let Term::Literal(result) = accumulator.finish().unwrap().unwrap() else {
            panic!("expected literal");
        };
        assert_eq!(result.value(), "5");
    }
}
