//! SPARQL expression evaluation.
//!
//! Expressions are evaluated by direct recursion over the algebra under a
//! partial environment (the encoded tuple). All failures are typed
//! [`ExpressionError`]s; the operators decide where they are caught.

use crate::error::ExpressionError;
use crate::eval::{ActiveGraph, EncodedTuple, SimpleEvaluator};
use mindrdf::vocab::xsd;
use mindrdf::{BaseDirection, BlankNode, Literal, NamedNode, Term};
use oxsdatatypes::{
    DateTime, DayTimeDuration, Decimal, Double, Duration, Float, Integer, TimezoneOffset,
    YearMonthDuration,
};
use rand::random;
use regex::{Regex, RegexBuilder};
use sparir::algebra::{Expression, Function};
use std::cmp::Ordering;
use std::fmt::Write;
use std::str::FromStr;

const REGEX_SIZE_LIMIT: usize = 1_000_000;

pub(crate) fn evaluate(
    evaluator: &SimpleEvaluator,
    graph: &ActiveGraph,
    expression: &Expression,
    tuple: &EncodedTuple,
) -> Result<Term, ExpressionError> {
    match expression {
        Expression::NamedNode(node) => Ok(Term::NamedNode(node.clone())),
        Expression::Literal(literal) => Ok(Term::Literal(literal.clone())),
        Expression::Variable(variable) => evaluator
            .lookup_variable(variable, tuple)
            .ok_or_else(|| ExpressionError::UnboundVariable(variable.as_str().to_owned())),
        Expression::Or(a, b) => {
            // Three-valued logic: an error on one side is recoverable if the
            // other side is true.
            let a = evaluate(evaluator, graph, a, tuple).and_then(|t| effective_boolean_value(&t));
            let b = evaluate(evaluator, graph, b, tuple).and_then(|t| effective_boolean_value(&t));
            match (a, b) {
                (Ok(a), Ok(b)) => Ok(bool_term(a || b)),
                (Ok(true), Err(_)) | (Err(_), Ok(true)) => Ok(bool_term(true)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Expression::And(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple).and_then(|t| effective_boolean_value(&t));
            let b = evaluate(evaluator, graph, b, tuple).and_then(|t| effective_boolean_value(&t));
            match (a, b) {
                (Ok(a), Ok(b)) => Ok(bool_term(a && b)),
                (Ok(false), Err(_)) | (Err(_), Ok(false)) => Ok(bool_term(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Expression::Equal(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            Ok(bool_term(equals(&a, &b)?))
        }
        Expression::NotEqual(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            Ok(bool_term(!equals(&a, &b)?))
        }
        Expression::Greater(a, b) => compare(evaluator, graph, a, b, tuple, Ordering::is_gt),
        Expression::GreaterOrEqual(a, b) => compare(evaluator, graph, a, b, tuple, Ordering::is_ge),
        Expression::Less(a, b) => compare(evaluator, graph, a, b, tuple, Ordering::is_lt),
        Expression::LessOrEqual(a, b) => compare(evaluator, graph, a, b, tuple, Ordering::is_le),
        Expression::In(a, list) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            Ok(bool_term(in_list(evaluator, graph, &a, list, tuple)?))
        }
        Expression::NotIn(a, list) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            Ok(bool_term(!in_list(evaluator, graph, &a, list, tuple)?))
        }
        Expression::Add(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            add_terms(&a, &b)
        }
        Expression::Subtract(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            subtract_terms(&a, &b)
        }
        Expression::Multiply(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            let (a, b) = numeric_pair(&a, &b)?;
            numeric_to_term(numeric_mul(a, b)?)
        }
        Expression::Divide(a, b) => {
            let a = evaluate(evaluator, graph, a, tuple)?;
            let b = evaluate(evaluator, graph, b, tuple)?;
            let (a, b) = numeric_pair(&a, &b)?;
            numeric_to_term(numeric_div(a, b)?)
        }
        Expression::UnaryPlus(e) => {
            let value = evaluate(evaluator, graph, e, tuple)?;
            let n = numeric_of(&value)
                .ok_or_else(|| ExpressionError::TypeError("unary + on a non-number".to_owned()))?;
            numeric_to_term(n)
        }
        Expression::UnaryMinus(e) => {
            let value = evaluate(evaluator, graph, e, tuple)?;
            let n = numeric_of(&value)
                .ok_or_else(|| ExpressionError::TypeError("unary - on a non-number".to_owned()))?;
            numeric_to_term(numeric_neg(n)?)
        }
        Expression::Not(e) => {
            let value = evaluate(evaluator, graph, e, tuple)?;
            Ok(bool_term(!effective_boolean_value(&value)?))
        }
        Expression::Exists(pattern) => {
            let found = evaluator
                .exists(pattern, graph, tuple)
                .map_err(|e| ExpressionError::TypeError(format!("EXISTS failed: {e}")))?;
            Ok(bool_term(found))
        }
        Expression::FunctionCall(function, args) => {
            call_function(evaluator, graph, function, args, tuple)
        }
    }
}

fn compare(
    evaluator: &SimpleEvaluator,
    graph: &ActiveGraph,
    a: &Expression,
    b: &Expression,
    tuple: &EncodedTuple,
    test: impl Fn(Ordering) -> bool,
) -> Result<Term, ExpressionError> {
    let a = evaluate(evaluator, graph, a, tuple)?;
    let b = evaluate(evaluator, graph, b, tuple)?;
    Ok(bool_term(test(value_cmp(&a, &b)?)))
}

fn in_list(
    evaluator: &SimpleEvaluator,
    graph: &ActiveGraph,
    needle: &Term,
    list: &[Expression],
    tuple: &EncodedTuple,
) -> Result<bool, ExpressionError> {
    let mut error = None;
    for item in list {
        match evaluate(evaluator, graph, item, tuple).and_then(|item| equals(needle, &item)) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => error = Some(e),
        }
    }
    match error {
        Some(e) => Err(e),
        None => Ok(false),
    }
}

// ---- effective boolean value, equality, ordering ----

pub(crate) fn effective_boolean_value(term: &Term) -> Result<bool, ExpressionError> {
    let Term::Literal(literal) = term else {
        return Err(ExpressionError::TypeError(
            "the effective boolean value of a non-literal is undefined".to_owned(),
        ));
    };
    let datatype = literal.datatype();
    if datatype == xsd::BOOLEAN {
        return match literal.value() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            value => Err(ExpressionError::TypeError(format!(
                "invalid boolean value {value:?}"
            ))),
        };
    }
    if datatype == xsd::STRING || literal.language().is_some() {
        return Ok(!literal.value().is_empty());
    }
    if let Some(n) = numeric_of(term) {
        return Ok(match n {
            Numeric::Integer(v) => v != Integer::from(0),
            Numeric::Decimal(v) => v != Decimal::from(0),
            Numeric::Float(v) => !(v.is_nan() || v == Float::from(0.)),
            Numeric::Double(v) => !(v.is_nan() || v == Double::from(0.)),
        });
    }
    Err(ExpressionError::TypeError(format!(
        "no effective boolean value for datatype {}",
        datatype.as_str()
    )))
}

/// RDFterm-equal plus the XSD value equalities.
pub(crate) fn equals(a: &Term, b: &Term) -> Result<bool, ExpressionError> {
    if a == b {
        return Ok(true);
    }
    let (Term::Literal(la), Term::Literal(lb)) = (a, b) else {
        return Ok(false);
    };
    if let (Some(x), Some(y)) = (numeric_of(a), numeric_of(b)) {
        return Ok(numeric_cmp(x, y) == Some(Ordering::Equal));
    }
    if let (Some(x), Some(y)) = (try_datetime(la), try_datetime(lb)) {
        return Ok(x? == y?);
    }
    if la.language().is_some() || lb.language().is_some() {
        // Different language, direction, or value.
        return Ok(false);
    }
    let known = [xsd::STRING, xsd::BOOLEAN];
    if known.contains(&la.datatype()) && known.contains(&lb.datatype()) {
        return Ok(false);
    }
    if la.datatype() == lb.datatype() {
        // Same unrecognized datatype, different lexical form: unknowable.
        return Err(ExpressionError::TypeError(format!(
            "cannot compare values of datatype {}",
            la.datatype().as_str()
        )));
    }
    Ok(false)
}

/// `<`-family comparison; errors where SPARQL leaves the order undefined.
pub(crate) fn value_cmp(a: &Term, b: &Term) -> Result<Ordering, ExpressionError> {
    if let (Some(x), Some(y)) = (numeric_of(a), numeric_of(b)) {
        return numeric_cmp(x, y).ok_or_else(|| {
            ExpressionError::TypeError("numbers do not compare (NaN)".to_owned())
        });
    }
    let (Term::Literal(la), Term::Literal(lb)) = (a, b) else {
        return Err(ExpressionError::TypeError(
            "only literals support ordering comparisons".to_owned(),
        ));
    };
    if let (Some(x), Some(y)) = (try_datetime(la), try_datetime(lb)) {
        let (x, y) = (x?, y?);
        return x.partial_cmp(&y).ok_or_else(|| {
            ExpressionError::TypeError("dateTimes do not compare".to_owned())
        });
    }
    if la.datatype() == xsd::BOOLEAN && lb.datatype() == xsd::BOOLEAN {
        let x = effective_boolean_value(a)?;
        let y = effective_boolean_value(b)?;
        return Ok(x.cmp(&y));
    }
    let plain = |l: &Literal| l.datatype() == xsd::STRING || l.language().is_some();
    if plain(la) && plain(lb) {
        return Ok(la.value().cmp(lb.value()));
    }
    Err(ExpressionError::TypeError(format!(
        "cannot order values of datatypes {} and {}",
        la.datatype().as_str(),
        lb.datatype().as_str()
    )))
}

/// The total order used by `ORDER BY`: unbound < blank < IRI < literal <
/// quoted triple; inside literals numbers by value, dates by instant,
/// strings by code point with the language tag as a secondary key.
pub(crate) fn order_terms(a: Option<&Term>, b: Option<&Term>) -> Ordering {
    fn rank(term: &Term) -> u8 {
        match term {
            Term::BlankNode(_) => 0,
            Term::NamedNode(_) => 1,
            Term::Literal(_) => 2,
            Term::Triple(_) => 3,
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let by_rank = rank(a).cmp(&rank(b));
            if by_rank != Ordering::Equal {
                return by_rank;
            }
            match (a, b) {
                (Term::BlankNode(x), Term::BlankNode(y)) => x.as_str().cmp(y.as_str()),
                (Term::NamedNode(x), Term::NamedNode(y)) => x.as_str().cmp(y.as_str()),
                (Term::Literal(x), Term::Literal(y)) => order_literals(x, y),
                (Term::Triple(x), Term::Triple(y)) => {
                    order_terms(Some(&Term::from((**x).clone().subject)), Some(&Term::from((**y).clone().subject)))
                        .then_with(|| x.predicate.as_str().cmp(y.predicate.as_str()))
                        .then_with(|| order_terms(Some(&x.object), Some(&y.object)))
                }
                _ => Ordering::Equal,
            }
        }
    }
}

fn order_literals(a: &Literal, b: &Literal) -> Ordering {
    let ta = Term::Literal(a.clone());
    let tb = Term::Literal(b.clone());
    if let (Some(x), Some(y)) = (numeric_of(&ta), numeric_of(&tb)) {
        if let Some(ordering) = numeric_cmp(x, y) {
            return ordering;
        }
    }
    if let (Some(Ok(x)), Some(Ok(y))) = (try_datetime(a), try_datetime(b)) {
        if let Some(ordering) = x.partial_cmp(&y) {
            return ordering;
        }
    }
    a.value()
        .cmp(b.value())
        .then_with(|| a.language().unwrap_or("").cmp(b.language().unwrap_or("")))
        .then_with(|| a.datatype().as_str().cmp(b.datatype().as_str()))
}

// ---- numeric tower ----

#[derive(Clone, Copy, Debug)]
pub(crate) enum Numeric {
    Integer(Integer),
    Decimal(Decimal),
    Float(Float),
    Double(Double),
}

pub(crate) fn numeric_of(term: &Term) -> Option<Numeric> {
    let Term::Literal(literal) = term else {
        return None;
    };
    let datatype = literal.datatype();
    let value = literal.value();
    if datatype == xsd::INTEGER
        || datatype == xsd::LONG
        || datatype == xsd::INT
        || datatype == xsd::SHORT
        || datatype == xsd::BYTE
        || datatype == xsd::UNSIGNED_LONG
        || datatype == xsd::UNSIGNED_INT
        || datatype == xsd::UNSIGNED_SHORT
        || datatype == xsd::UNSIGNED_BYTE
        || datatype == xsd::NON_NEGATIVE_INTEGER
        || datatype == xsd::NON_POSITIVE_INTEGER
        || datatype == xsd::NEGATIVE_INTEGER
        || datatype == xsd::POSITIVE_INTEGER
    {
        return Integer::from_str(value).ok().map(Numeric::Integer);
    }
    if datatype == xsd::DECIMAL {
        return Decimal::from_str(value).ok().map(Numeric::Decimal);
    }
    if datatype == xsd::FLOAT {
        return Float::from_str(value).ok().map(Numeric::Float);
    }
    if datatype == xsd::DOUBLE {
        return Double::from_str(value).ok().map(Numeric::Double);
    }
    None
}

/// Promotes both operands to the wider of the two types.
fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    fn rank(n: Numeric) -> u8 {
        match n {
            In(_) => 0,
            De(_) => 1,
            Fl(_) => 2,
            Db(_) => 3,
        }
    }
    fn up(n: Numeric, to: u8) -> Numeric {
        match (n, to) {
            (In(v), 1) => De(v.into()),
            (In(v), 2) => Fl(v.into()),
            (In(v), 3) => Db(v.into()),
            (De(v), 2) => Fl(v.into()),
            (De(v), 3) => Db(v.into()),
            (Fl(v), 3) => Db(v.into()),
            (n, _) => n,
        }
    }
    let to = rank(a).max(rank(b));
    (up(a, to), up(b, to))
}

fn numeric_pair(a: &Term, b: &Term) -> Result<(Numeric, Numeric), ExpressionError> {
    match (numeric_of(a), numeric_of(b)) {
        (Some(a), Some(b)) => Ok(promote(a, b)),
        _ => Err(ExpressionError::TypeError(
            "arithmetic on non-numeric operands".to_owned(),
        )),
    }
}

fn numeric_cmp(a: Numeric, b: Numeric) -> Option<Ordering> {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    match promote(a, b) {
        (In(x), In(y)) => Some(x.cmp(&y)),
        (De(x), De(y)) => Some(x.cmp(&y)),
        (Fl(x), Fl(y)) => x.partial_cmp(&y),
        (Db(x), Db(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

pub(crate) fn numeric_add(a: Numeric, b: Numeric) -> Result<Numeric, ExpressionError> {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    Ok(match promote(a, b) {
        (In(x), In(y)) => In(x.checked_add(y).ok_or(ExpressionError::NumericOverflow)?),
        (De(x), De(y)) => De(x.checked_add(y).ok_or(ExpressionError::NumericOverflow)?),
        (Fl(x), Fl(y)) => Fl(x + y),
        (Db(x), Db(y)) => Db(x + y),
        _ => return Err(ExpressionError::NumericOverflow),
    })
}

fn numeric_sub(a: Numeric, b: Numeric) -> Result<Numeric, ExpressionError> {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    Ok(match promote(a, b) {
        (In(x), In(y)) => In(x.checked_sub(y).ok_or(ExpressionError::NumericOverflow)?),
        (De(x), De(y)) => De(x.checked_sub(y).ok_or(ExpressionError::NumericOverflow)?),
        (Fl(x), Fl(y)) => Fl(x - y),
        (Db(x), Db(y)) => Db(x - y),
        _ => return Err(ExpressionError::NumericOverflow),
    })
}

fn numeric_mul(a: Numeric, b: Numeric) -> Result<Numeric, ExpressionError> {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    Ok(match promote(a, b) {
        (In(x), In(y)) => In(x.checked_mul(y).ok_or(ExpressionError::NumericOverflow)?),
        (De(x), De(y)) => De(x.checked_mul(y).ok_or(ExpressionError::NumericOverflow)?),
        (Fl(x), Fl(y)) => Fl(x * y),
        (Db(x), Db(y)) => Db(x * y),
        _ => return Err(ExpressionError::NumericOverflow),
    })
}

pub(crate) fn numeric_div(a: Numeric, b: Numeric) -> Result<Numeric, ExpressionError> {
    use Numeric::{Decimal as De, Double as Db, Float as Fl, Integer as In};
    Ok(match promote(a, b) {
        // xsd integer division yields a decimal.
        (In(x), In(y)) => {
            if y == Integer::from(0) {
                return Err(ExpressionError::DivisionByZero);
            }
            De(Decimal::from(x)
                .checked_div(Decimal::from(y))
                .ok_or(ExpressionError::NumericOverflow)?)
        }
        (De(x), De(y)) => {
            if y == Decimal::from(0) {
                return Err(ExpressionError::DivisionByZero);
            }
            De(x.checked_div(y).ok_or(ExpressionError::NumericOverflow)?)
        }
        (Fl(x), Fl(y)) => Fl(x / y),
        (Db(x), Db(y)) => Db(x / y),
        _ => return Err(ExpressionError::NumericOverflow),
    })
}

fn numeric_neg(n: Numeric) -> Result<Numeric, ExpressionError> {
    Ok(match n {
        Numeric::Integer(v) => Numeric::Integer(
            v.checked_neg().ok_or(ExpressionError::NumericOverflow)?,
        ),
        Numeric::Decimal(v) => Numeric::Decimal(
            v.checked_neg().ok_or(ExpressionError::NumericOverflow)?,
        ),
        Numeric::Float(v) => Numeric::Float(-v),
        Numeric::Double(v) => Numeric::Double(-v),
    })
}

pub(crate) fn numeric_to_term(n: Numeric) -> Result<Term, ExpressionError> {
    Ok(match n {
        Numeric::Integer(v) => Literal::from(v).into(),
        Numeric::Decimal(v) => Literal::from(v).into(),
        Numeric::Float(v) => Literal::from(v).into(),
        Numeric::Double(v) => Literal::from(v).into(),
    })
}

// ---- temporal values ----

fn try_datetime(literal: &Literal) -> Option<Result<DateTime, ExpressionError>> {
    if literal.datatype() != xsd::DATE_TIME {
        return None;
    }
    Some(
        DateTime::from_str(literal.value())
            .map_err(|e| ExpressionError::InvalidDateTime(e.to_string())),
    )
}

enum Temporal {
    DateTime(DateTime),
    Duration(Duration),
    DayTime(DayTimeDuration),
    YearMonth(YearMonthDuration),
}

fn temporal_of(term: &Term) -> Option<Result<Temporal, ExpressionError>> {
    let Term::Literal(literal) = term else {
        return None;
    };
    let datatype = literal.datatype();
    let value = literal.value();
    let invalid = |e: &dyn std::fmt::Display| ExpressionError::InvalidDateTime(e.to_string());
    if datatype == xsd::DATE_TIME {
        return Some(
            DateTime::from_str(value)
                .map(Temporal::DateTime)
                .map_err(|e| invalid(&e)),
        );
    }
    if datatype == xsd::DURATION {
        return Some(
            Duration::from_str(value)
                .map(Temporal::Duration)
                .map_err(|e| invalid(&e)),
        );
    }
    if datatype == xsd::DAY_TIME_DURATION {
        return Some(
            DayTimeDuration::from_str(value)
                .map(Temporal::DayTime)
                .map_err(|e| invalid(&e)),
        );
    }
    if datatype == xsd::YEAR_MONTH_DURATION {
        return Some(
            YearMonthDuration::from_str(value)
                .map(Temporal::YearMonth)
                .map_err(|e| invalid(&e)),
        );
    }
    None
}

fn add_terms(a: &Term, b: &Term) -> Result<Term, ExpressionError> {
    if let (Some(x), Some(y)) = (temporal_of(a), temporal_of(b)) {
        let overflow = || ExpressionError::NumericOverflow;
        return Ok(match (x?, y?) {
            (Temporal::DateTime(dt), Temporal::Duration(d))
            | (Temporal::Duration(d), Temporal::DateTime(dt)) => {
                Literal::from(dt.checked_add_duration(d).ok_or_else(overflow)?).into()
            }
            (Temporal::DateTime(dt), Temporal::DayTime(d))
            | (Temporal::DayTime(d), Temporal::DateTime(dt)) => {
                Literal::from(dt.checked_add_day_time_duration(d).ok_or_else(overflow)?).into()
            }
            (Temporal::DateTime(dt), Temporal::YearMonth(d))
            | (Temporal::YearMonth(d), Temporal::DateTime(dt)) => Literal::from(
                dt.checked_add_year_month_duration(d).ok_or_else(overflow)?,
            )
            .into(),
            (Temporal::DayTime(x), Temporal::DayTime(y)) => {
                Literal::from(x.checked_add(y).ok_or_else(overflow)?).into()
            }
            (Temporal::YearMonth(x), Temporal::YearMonth(y)) => {
                Literal::from(x.checked_add(y).ok_or_else(overflow)?).into()
            }
            (x, y) => {
                let (x, y) = (to_general_duration(x)?, to_general_duration(y)?);
                Literal::from(x.checked_add(y).ok_or_else(overflow)?).into()
            }
        });
    }
    let (a, b) = numeric_pair(a, b)?;
    numeric_to_term(numeric_add(a, b)?)
}

fn subtract_terms(a: &Term, b: &Term) -> Result<Term, ExpressionError> {
    if let (Some(x), Some(y)) = (temporal_of(a), temporal_of(b)) {
        let overflow = || ExpressionError::NumericOverflow;
        return Ok(match (x?, y?) {
            (Temporal::DateTime(x), Temporal::DateTime(y)) => {
                Literal::from(x.checked_sub(y).ok_or_else(overflow)?).into()
            }
            (Temporal::DateTime(dt), Temporal::Duration(d)) => {
                Literal::from(dt.checked_sub_duration(d).ok_or_else(overflow)?).into()
            }
            (Temporal::DateTime(dt), Temporal::DayTime(d)) => {
                Literal::from(dt.checked_sub_day_time_duration(d).ok_or_else(overflow)?).into()
            }
            (Temporal::DateTime(dt), Temporal::YearMonth(d)) => Literal::from(
                dt.checked_sub_year_month_duration(d).ok_or_else(overflow)?,
            )
            .into(),
            (Temporal::DayTime(x), Temporal::DayTime(y)) => {
                Literal::from(x.checked_sub(y).ok_or_else(overflow)?).into()
            }
            (Temporal::YearMonth(x), Temporal::YearMonth(y)) => {
                Literal::from(x.checked_sub(y).ok_or_else(overflow)?).into()
            }
            (x, y) => {
                let (x, y) = (to_general_duration(x)?, to_general_duration(y)?);
                Literal::from(x.checked_sub(y).ok_or_else(overflow)?).into()
            }
        });
    }
    let (a, b) = numeric_pair(a, b)?;
    numeric_to_term(numeric_sub(a, b)?)
}

fn to_general_duration(t: Temporal) -> Result<Duration, ExpressionError> {
    match t {
        Temporal::Duration(d) => Ok(d),
        Temporal::DayTime(d) => Ok(d.into()),
        Temporal::YearMonth(d) => Ok(d.into()),
        Temporal::DateTime(_) => Err(ExpressionError::TypeError(
            "cannot mix dateTimes and durations here".to_owned(),
        )),
    }
}

// ---- functions ----

fn call_function(
    evaluator: &SimpleEvaluator,
    graph: &ActiveGraph,
    function: &Function,
    args: &[Expression],
    tuple: &EncodedTuple,
) -> Result<Term, ExpressionError> {
    // The special forms first: they do not evaluate all their arguments.
    match function {
        Function::Bound => {
            let [Expression::Variable(variable)] = args else {
                return Err(ExpressionError::TypeError(
                    "BOUND requires a single variable".to_owned(),
                ));
            };
            return Ok(bool_term(
                evaluator.lookup_variable(variable, tuple).is_some(),
            ));
        }
        Function::Coalesce => {
            for arg in args {
                if let Ok(value) = evaluate(evaluator, graph, arg, tuple) {
                    return Ok(value);
                }
            }
            return Err(ExpressionError::TypeError(
                "COALESCE: all arguments errored".to_owned(),
            ));
        }
        Function::If => {
            let [condition, then, otherwise] = args else {
                return Err(ExpressionError::TypeError(
                    "IF requires three arguments".to_owned(),
                ));
            };
            let condition = evaluate(evaluator, graph, condition, tuple)?;
            return if effective_boolean_value(&condition)? {
                evaluate(evaluator, graph, then, tuple)
            } else {
                evaluate(evaluator, graph, otherwise, tuple)
            };
        }
        _ => {}
    }

    let values: Vec<Term> = args
        .iter()
        .map(|arg| evaluate(evaluator, graph, arg, tuple))
        .collect::<Result<_, _>>()?;

    match function {
        Function::Str => match one(&values)? {
            Term::NamedNode(node) => Ok(Literal::from(node.as_str()).into()),
            Term::Literal(literal) => Ok(Literal::from(literal.value()).into()),
            _ => Err(ExpressionError::TypeError(
                "STR is undefined on blank nodes and quoted triples".to_owned(),
            )),
        },
        Function::Lang => match one(&values)? {
            Term::Literal(literal) => {
                Ok(Literal::from(literal.language().unwrap_or_default()).into())
            }
            _ => Err(ExpressionError::TypeError(
                "LANG requires a literal".to_owned(),
            )),
        },
        Function::LangDir => match one(&values)? {
            Term::Literal(literal) => Ok(Literal::from(
                literal.direction().map(|d| d.to_string()).unwrap_or_default(),
            )
            .into()),
            _ => Err(ExpressionError::TypeError(
                "LANGDIR requires a literal".to_owned(),
            )),
        },
        Function::LangMatches => {
            let [tag, range] = two(&values)?;
            let tag_literal = string_literal(tag, "LANGMATCHES")?;
            let mut tag = tag_literal.value().to_ascii_lowercase();
            // Direction-aware matching: `ar--rtl` in a range constrains the
            // base direction recorded on the literal that LANG came from.
            if let Some(direction) = tag_literal.direction() {
                let _ = write!(tag, "--{direction}");
            }
            let range = string_literal(range, "LANGMATCHES")?
                .value()
                .to_ascii_lowercase();
            Ok(bool_term(lang_matches(&tag, &range)))
        }
        Function::Datatype => match one(&values)? {
            Term::Literal(literal) => {
                Ok(Term::NamedNode(literal.datatype().into_owned()))
            }
            _ => Err(ExpressionError::TypeError(
                "DATATYPE requires a literal".to_owned(),
            )),
        },
        Function::Iri => match one(&values)? {
            Term::NamedNode(node) => Ok(Term::NamedNode(node.clone())),
            Term::Literal(literal) if literal.is_plain() => NamedNode::new(literal.value())
                .map(Term::NamedNode)
                .map_err(|e| ExpressionError::TypeError(format!("IRI: {e}"))),
            _ => Err(ExpressionError::TypeError(
                "IRI requires a string or an IRI".to_owned(),
            )),
        },
        Function::BNode => match values.as_slice() {
            [] => Ok(Term::BlankNode(BlankNode::default())),
            [Term::Literal(_)] => Ok(Term::BlankNode(BlankNode::default())),
            _ => Err(ExpressionError::TypeError(
                "BNODE takes at most one string".to_owned(),
            )),
        },
        Function::Rand => Ok(Literal::from(Double::from(random::<f64>())).into()),
        Function::Abs => numeric_unary(&values, "ABS", |n| match n {
            Numeric::Integer(v) => v
                .checked_abs()
                .map(Numeric::Integer)
                .ok_or(ExpressionError::NumericOverflow),
            Numeric::Decimal(v) => v
                .checked_abs()
                .map(Numeric::Decimal)
                .ok_or(ExpressionError::NumericOverflow),
            Numeric::Float(v) => Ok(Numeric::Float(v.abs())),
            Numeric::Double(v) => Ok(Numeric::Double(v.abs())),
        }),
        Function::Ceil => numeric_unary(&values, "CEIL", |n| match n {
            Numeric::Integer(v) => Ok(Numeric::Integer(v)),
            Numeric::Decimal(v) => v
                .checked_ceil()
                .map(Numeric::Decimal)
                .ok_or(ExpressionError::NumericOverflow),
            Numeric::Float(v) => Ok(Numeric::Float(v.ceil())),
            Numeric::Double(v) => Ok(Numeric::Double(v.ceil())),
        }),
        Function::Floor => numeric_unary(&values, "FLOOR", |n| match n {
            Numeric::Integer(v) => Ok(Numeric::Integer(v)),
            Numeric::Decimal(v) => v
                .checked_floor()
                .map(Numeric::Decimal)
                .ok_or(ExpressionError::NumericOverflow),
            Numeric::Float(v) => Ok(Numeric::Float(v.floor())),
            Numeric::Double(v) => Ok(Numeric::Double(v.floor())),
        }),
        Function::Round => numeric_unary(&values, "ROUND", |n| match n {
            Numeric::Integer(v) => Ok(Numeric::Integer(v)),
            Numeric::Decimal(v) => v
                .checked_round()
                .map(Numeric::Decimal)
                .ok_or(ExpressionError::NumericOverflow),
            Numeric::Float(v) => Ok(Numeric::Float(v.round())),
            Numeric::Double(v) => Ok(Numeric::Double(v.round())),
        }),
        Function::Concat => {
            let mut result = String::new();
            let mut language: Option<Option<String>> = None;
            for value in &values {
                let literal = string_literal(value, "CONCAT")?;
                result.push_str(literal.value());
                let this = literal.language().map(ToOwned::to_owned);
                match &language {
                    None => language = Some(this),
                    Some(common) if *common == this => {}
                    Some(_) => language = Some(None),
                }
            }
            Ok(match language.flatten() {
                Some(language) => {
                    Literal::new_language_tagged_literal_unchecked(result, language).into()
                }
                None => Literal::from(result).into(),
            })
        }
        Function::SubStr => {
            if values.len() != 2 && values.len() != 3 {
                return Err(ExpressionError::TypeError(
                    "SUBSTR requires two or three arguments".to_owned(),
                ));
            }
            let source = string_literal(&values[0], "SUBSTR")?;
            let start = integer_value(&values[1], "SUBSTR")?;
            let length = if let Some(value) = values.get(2) {
                Some(integer_value(value, "SUBSTR")?)
            } else {
                None
            };
            let chars: Vec<char> = source.value().chars().collect();
            let result: String = chars
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    let position = *i as i64 + 1;
                    position >= start
                        && length.map_or(true, |length| position < start.saturating_add(length))
                })
                .map(|(_, c)| *c)
                .collect();
            Ok(copy_string_flavor(&source, result).into())
        }
        Function::StrLen => {
            let literal = string_literal(one(&values)?, "STRLEN")?;
            Ok(Literal::from(literal.value().chars().count() as i64).into())
        }
        Function::Replace => {
            if values.len() != 3 && values.len() != 4 {
                return Err(ExpressionError::TypeError(
                    "REPLACE requires three or four arguments".to_owned(),
                ));
            }
            let source = string_literal(&values[0], "REPLACE")?;
            let pattern = string_literal(&values[1], "REPLACE")?;
            let replacement = string_literal(&values[2], "REPLACE")?;
            let flags = values
                .get(3)
                .map(|value| string_literal(value, "REPLACE").map(|l| l.value().to_owned()))
                .transpose()?;
            let regex = compile_pattern(pattern.value(), flags.as_deref())?;
            let result = regex
                .replace_all(source.value(), replacement.value())
                .into_owned();
            Ok(copy_string_flavor(&source, result).into())
        }
        Function::UCase => {
            let literal = string_literal(one(&values)?, "UCASE")?;
            Ok(copy_string_flavor(&literal, literal.value().to_uppercase()).into())
        }
        Function::LCase => {
            let literal = string_literal(one(&values)?, "LCASE")?;
            Ok(copy_string_flavor(&literal, literal.value().to_lowercase()).into())
        }
        Function::EncodeForUri => {
            let literal = string_literal(one(&values)?, "ENCODE_FOR_URI")?;
            let mut result = String::with_capacity(literal.value().len());
            for byte in literal.value().bytes() {
                if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
                    result.push(char::from(byte));
                } else {
                    let _ = write!(result, "%{byte:02X}");
                }
            }
            Ok(Literal::from(result).into())
        }
        Function::Contains => {
            let (a, b) = compatible_strings(&values, "CONTAINS")?;
            Ok(bool_term(a.contains(&b)))
        }
        Function::StrStarts => {
            let (a, b) = compatible_strings(&values, "STRSTARTS")?;
            Ok(bool_term(a.starts_with(&b)))
        }
        Function::StrEnds => {
            let (a, b) = compatible_strings(&values, "STRENDS")?;
            Ok(bool_term(a.ends_with(&b)))
        }
        Function::StrBefore => {
            let [a, b] = two(&values)?;
            let a = string_literal(a, "STRBEFORE")?;
            let b = string_literal(b, "STRBEFORE")?;
            check_argument_compatible(&a, &b, "STRBEFORE")?;
            Ok(match a.value().find(b.value()) {
                Some(position) => {
                    copy_string_flavor(&a, a.value()[..position].to_owned()).into()
                }
                None => Literal::from("").into(),
            })
        }
        Function::StrAfter => {
            let [a, b] = two(&values)?;
            let a = string_literal(a, "STRAFTER")?;
            let b = string_literal(b, "STRAFTER")?;
            check_argument_compatible(&a, &b, "STRAFTER")?;
            Ok(match a.value().find(b.value()) {
                Some(position) => copy_string_flavor(
                    &a,
                    a.value()[position + b.value().len()..].to_owned(),
                )
                .into(),
                None => Literal::from("").into(),
            })
        }
        Function::Year => datetime_component(&values, "YEAR", |dt| Literal::from(dt.year())),
        Function::Month => {
            datetime_component(&values, "MONTH", |dt| Literal::from(i64::from(dt.month())))
        }
        Function::Day => {
            datetime_component(&values, "DAY", |dt| Literal::from(i64::from(dt.day())))
        }
        Function::Hours => datetime_component(&values, "HOURS", |dt| {
            // Extract from the UTC-normalized instant when a zone is present.
            let normalized = if dt.timezone_offset().is_some() {
                dt.adjust(Some(TimezoneOffset::UTC)).unwrap_or(dt)
            } else {
                dt
            };
            Literal::from(i64::from(normalized.hour()))
        }),
        Function::Minutes => {
            datetime_component(&values, "MINUTES", |dt| Literal::from(i64::from(dt.minute())))
        }
        Function::Seconds => {
            datetime_component(&values, "SECONDS", |dt| Literal::from(dt.second()))
        }
        Function::Timezone => {
            let dt = datetime_value(one(&values)?)?;
            dt.timezone()
                .map(|d| Literal::from(d).into())
                .ok_or_else(|| {
                    ExpressionError::TypeError("the dateTime has no timezone".to_owned())
                })
        }
        Function::Tz => {
            let dt = datetime_value(one(&values)?)?;
            Ok(Literal::from(
                dt.timezone_offset()
                    .map(|offset| offset.to_string())
                    .unwrap_or_default(),
            )
            .into())
        }
        Function::Now => Ok(Literal::from(evaluator.now()).into()),
        Function::Uuid => {
            let mut buffer = String::with_capacity(44);
            buffer.push_str("urn:uuid:");
            write_uuid(&mut buffer);
            Ok(Term::NamedNode(NamedNode::new_unchecked(buffer)))
        }
        Function::StrUuid => {
            let mut buffer = String::with_capacity(36);
            write_uuid(&mut buffer);
            Ok(Literal::from(buffer).into())
        }
        Function::Md5 => hash_function::<md5::Md5>(&values, "MD5"),
        Function::Sha1 => hash_function::<sha1::Sha1>(&values, "SHA1"),
        Function::Sha256 => hash_function::<sha2::Sha256>(&values, "SHA256"),
        Function::Sha384 => hash_function::<sha2::Sha384>(&values, "SHA384"),
        Function::Sha512 => hash_function::<sha2::Sha512>(&values, "SHA512"),
        Function::StrLang => {
            let [value, language] = two(&values)?;
            let value = simple_literal(value, "STRLANG")?;
            let language = simple_literal(language, "STRLANG")?;
            Literal::new_language_tagged_literal(value.value(), language.value())
                .map(Term::Literal)
                .map_err(|e| ExpressionError::TypeError(format!("STRLANG: {e}")))
        }
        Function::StrLangDir => {
            let [value, language, direction] = three(&values)?;
            let value = simple_literal(value, "STRLANGDIR")?;
            let language = simple_literal(language, "STRLANGDIR")?;
            let direction = match simple_literal(direction, "STRLANGDIR")?.value() {
                "ltr" => BaseDirection::Ltr,
                "rtl" => BaseDirection::Rtl,
                other => {
                    return Err(ExpressionError::TypeError(format!(
                        "STRLANGDIR: invalid direction {other:?}"
                    )))
                }
            };
            Literal::new_directional_language_tagged_literal(
                value.value(),
                language.value(),
                direction,
            )
            .map(Term::Literal)
            .map_err(|e| ExpressionError::TypeError(format!("STRLANGDIR: {e}")))
        }
        Function::StrDt => {
            let [value, datatype] = two(&values)?;
            let value = simple_literal(value, "STRDT")?;
            let Term::NamedNode(datatype) = datatype else {
                return Err(ExpressionError::TypeError(
                    "STRDT requires a datatype IRI".to_owned(),
                ));
            };
            Ok(Literal::new_typed_literal(value.value(), datatype.clone()).into())
        }
        Function::SameTerm => {
            let [a, b] = two(&values)?;
            Ok(bool_term(a == b))
        }
        Function::IsIri => Ok(bool_term(matches!(one(&values)?, Term::NamedNode(_)))),
        Function::IsBlank => Ok(bool_term(matches!(one(&values)?, Term::BlankNode(_)))),
        Function::IsLiteral => Ok(bool_term(matches!(one(&values)?, Term::Literal(_)))),
        Function::IsNumeric => Ok(bool_term(numeric_of(one(&values)?).is_some())),
        Function::Regex => {
            if values.len() != 2 && values.len() != 3 {
                return Err(ExpressionError::TypeError(
                    "REGEX requires two or three arguments".to_owned(),
                ));
            }
            let text = string_literal(&values[0], "REGEX")?;
            let pattern = string_literal(&values[1], "REGEX")?;
            let flags = values
                .get(2)
                .map(|value| string_literal(value, "REGEX").map(|l| l.value().to_owned()))
                .transpose()?;
            let regex = compile_pattern(pattern.value(), flags.as_deref())?;
            Ok(bool_term(regex.is_match(text.value())))
        }
        Function::Custom(name) => {
            let Some(custom) = evaluator.custom_function(name) else {
                return Err(ExpressionError::TypeError(format!(
                    "unknown function {name}"
                )));
            };
            custom(&values).ok_or_else(|| {
                ExpressionError::TypeError(format!("the custom function {name} errored"))
            })
        }
        Function::Bound | Function::Coalesce | Function::If => {
            // Handled before argument evaluation.
            Err(ExpressionError::TypeError(
                "special form re-entered".to_owned(),
            ))
        }
    }
}

// ---- helpers ----

fn bool_term(value: bool) -> Term {
    Literal::from(value).into()
}

fn one<'a>(values: &'a [Term]) -> Result<&'a Term, ExpressionError> {
    let [value] = values else {
        return Err(ExpressionError::TypeError(
            "the function requires exactly one argument".to_owned(),
        ));
    };
    Ok(value)
}

fn two<'a>(values: &'a [Term]) -> Result<[&'a Term; 2], ExpressionError> {
    let [a, b] = values else {
        return Err(ExpressionError::TypeError(
            "the function requires exactly two arguments".to_owned(),
        ));
    };
    Ok([a, b])
}

fn three<'a>(values: &'a [Term]) -> Result<[&'a Term; 3], ExpressionError> {
    let [a, b, c] = values else {
        return Err(ExpressionError::TypeError(
            "the function requires exactly three arguments".to_owned(),
        ));
    };
    Ok([a, b, c])
}

/// A literal usable as a string: simple, `xsd:string`, or language-tagged.
fn string_literal(term: &Term, function: &str) -> Result<Literal, ExpressionError> {
    match term {
        Term::Literal(literal)
            if literal.datatype() == xsd::STRING
                || literal.language().is_some() =>
        {
            Ok(literal.clone())
        }
        _ => Err(ExpressionError::TypeError(format!(
            "{function} requires a string literal"
        ))),
    }
}

fn simple_literal(term: &Term, function: &str) -> Result<Literal, ExpressionError> {
    match term {
        Term::Literal(literal)
            if literal.datatype() == xsd::STRING && literal.language().is_none() =>
        {
            Ok(literal.clone())
        }
        _ => Err(ExpressionError::TypeError(format!(
            "{function} requires a simple literal"
        ))),
    }
}

/// The result of a substring-style function carries the first argument's
/// language tag and direction.
fn copy_string_flavor(source: &Literal, value: String) -> Literal {
    match (source.language(), source.direction()) {
        (Some(language), Some(direction)) => {
            Literal::new_directional_language_tagged_literal_unchecked(value, language, direction)
        }
        (Some(language), None) => {
            Literal::new_language_tagged_literal_unchecked(value, language)
        }
        _ => Literal::from(value),
    }
}

fn check_argument_compatible(
    a: &Literal,
    b: &Literal,
    function: &str,
) -> Result<(), ExpressionError> {
    let compatible = match (a.language(), b.language()) {
        (_, None) => true,
        (Some(a), Some(b)) => a == b,
        (None, Some(_)) => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(ExpressionError::TypeError(format!(
            "{function}: incompatible argument languages"
        )))
    }
}

fn compatible_strings(
    values: &[Term],
    function: &str,
) -> Result<(String, String), ExpressionError> {
    let [a, b] = two(values)?;
    let a = string_literal(a, function)?;
    let b = string_literal(b, function)?;
    check_argument_compatible(&a, &b, function)?;
    Ok((a.value().to_owned(), b.value().to_owned()))
}

fn numeric_unary(
    values: &[Term],
    function: &str,
    op: impl Fn(Numeric) -> Result<Numeric, ExpressionError>,
) -> Result<Term, ExpressionError> {
    let n = numeric_of(one(values)?).ok_or_else(|| {
        ExpressionError::TypeError(format!("{function} requires a numeric argument"))
    })?;
    numeric_to_term(op(n)?)
}

fn integer_value(term: &Term, function: &str) -> Result<i64, ExpressionError> {
    match numeric_of(term) {
        Some(Numeric::Integer(v)) => Ok(v.into()),
        Some(Numeric::Decimal(v)) => Ok(Integer::try_from(v)
            .map_err(|_| ExpressionError::NumericOverflow)?
            .into()),
        Some(Numeric::Float(v)) => Ok(f64::from(v).round() as i64),
        Some(Numeric::Double(v)) => Ok(f64::from(v).round() as i64),
        None => Err(ExpressionError::TypeError(format!(
            "{function} requires a numeric argument"
        ))),
    }
}

fn datetime_value(term: &Term) -> Result<DateTime, ExpressionError> {
    let Term::Literal(literal) = term else {
        return Err(ExpressionError::TypeError(
            "a dateTime literal is required".to_owned(),
        ));
    };
    try_datetime(literal).unwrap_or_else(|| {
        Err(ExpressionError::TypeError(
            "a dateTime literal is required".to_owned(),
        ))
    })
}

fn datetime_component(
    values: &[Term],
    function: &str,
    extract: impl Fn(DateTime) -> Literal,
) -> Result<Term, ExpressionError> {
    let dt = datetime_value(one(values).map_err(|_| {
        ExpressionError::TypeError(format!("{function} requires one dateTime argument"))
    })?)?;
    Ok(extract(dt).into())
}

fn hash_function<D: digest_like::DigestLike>(
    values: &[Term],
    function: &str,
) -> Result<Term, ExpressionError> {
    let literal = simple_literal(one(values)?, function)?;
    Ok(Literal::from(D::hex_digest(literal.value().as_bytes())).into())
}

/// Small shim so every hash function shares one code path.
mod digest_like {
    use md5::Digest;

    pub(crate) trait DigestLike {
        fn hex_digest(data: &[u8]) -> String;
    }

    macro_rules! impl_digest_like {
        ($($ty:ty),*) => {
            $(impl DigestLike for $ty {
                fn hex_digest(data: &[u8]) -> String {
                    hex::encode(<$ty as Digest>::digest(data))
                }
            })*
        };
    }

    impl_digest_like!(md5::Md5, sha1::Sha1, sha2::Sha256, sha2::Sha384, sha2::Sha512);
}

fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    tag == range
        || tag
            .strip_prefix(range)
            .is_some_and(|rest| rest.starts_with('-'))
}

pub(crate) fn compile_pattern(
    pattern: &str,
    flags: Option<&str>,
) -> Result<Regex, ExpressionError> {
    let mut builder = RegexBuilder::new(pattern);
    builder.size_limit(REGEX_SIZE_LIMIT);
    if let Some(flags) = flags {
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                'q' => (), // Literal matching is approximated upstream.
                flag => {
                    return Err(ExpressionError::BadRegex(format!(
                        "unsupported flag '{flag}'"
                    )))
                }
            }
        }
    }
    builder
        .build()
        .map_err(|e| ExpressionError::BadRegex(e.to_string()))
}

fn write_uuid(buffer: &mut String) {
    let bytes = random::<u128>().to_be_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        // Version 4, RFC 4122 variant.
        let byte = match i {
            6 => byte & 0x0F | 0x40,
            8 => byte & 0x3F | 0x80,
            _ => *byte,
        };
        if matches!(i, 4 | 6 | 8 | 10) {
            buffer.push('-');
        }
        let _ = write!(buffer, "{byte:02x}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_promotion() {
        let a = Numeric::Integer(Integer::from(2));
        let b = Numeric::Decimal(Decimal::from(3));
        let Ok(Numeric::Decimal(sum)) = numeric_add(a, b) else {
            panic!("integer + decimal should be a decimal");
        };
        assert_eq!(sum, Decimal::from(5));
    }

    #[test]
    fn integer_division_yields_decimal() {
        let Ok(Numeric::Decimal(result)) = numeric_div(
            Numeric::Integer(Integer::from(1)),
            Numeric::Integer(Integer::from(2)),
        ) else {
            panic!("integer division should be a decimal");
        };
        assert_eq!(result.to_string(), "0.5");
    }

    #[test]
    fn division_by_zero_is_typed() {
        assert!(matches!(
            numeric_div(
                Numeric::Integer(Integer::from(1)),
                Numeric::Integer(Integer::from(0)),
            ),
            Err(ExpressionError::DivisionByZero)
        ));
    }

    #[test]
    fn datetime_subtraction_yields_day_time_duration() {
        let start: Term = Literal::new_typed_literal("2024-01-01T10:00:00Z", xsd::DATE_TIME).into();
        let end: Term = Literal::new_typed_literal("2024-01-01T12:00:00Z", xsd::DATE_TIME).into();
        let Term::Literal(result) = subtract_terms(&end, &start).unwrap() else {
            panic!("expected a literal");
        };
        assert_eq!(result.value(), "PT2H");
        assert_eq!(result.datatype(), xsd::DAY_TIME_DURATION);
    }

    #[test]
    fn ebv_rules() {
        assert!(effective_boolean_value(&Literal::from(true).into()).unwrap());
        assert!(!effective_boolean_value(&Literal::from("").into()).unwrap());
        assert!(effective_boolean_value(&Literal::from("x").into()).unwrap());
        assert!(!effective_boolean_value(&Literal::from(0).into()).unwrap());
        assert!(effective_boolean_value(&Term::NamedNode(
            NamedNode::new_unchecked("http://example.com")
        ))
        .is_err());
    }

    #[test]
    fn directional_literals_compare_by_direction() {
        let rtl: Term = Literal::new_directional_language_tagged_literal_unchecked(
            "x",
            "ar",
            BaseDirection::Rtl,
        )
        .into();
        let rtl2: Term = Literal::new_directional_language_tagged_literal_unchecked(
            "x",
            "ar",
            BaseDirection::Rtl,
        )
        .into();
        let ltr: Term = Literal::new_directional_language_tagged_literal_unchecked(
            "x",
            "ar",
            BaseDirection::Ltr,
        )
        .into();
        let plain: Term = Literal::new_language_tagged_literal_unchecked("x", "ar").into();
        assert!(equals(&rtl, &rtl2).unwrap());
        assert!(!equals(&rtl, &ltr).unwrap());
        assert!(!equals(&rtl, &plain).unwrap());
    }

    #[test]
    fn ordering_is_total() {
        let blank = Term::BlankNode(BlankNode::new_unchecked("b"));
        let iri = Term::NamedNode(NamedNode::new_unchecked("http://example.com"));
        let literal: Term = Literal::from(1).into();
        assert_eq!(order_terms(None, Some(&blank)), Ordering::Less);
        assert_eq!(order_terms(Some(&blank), Some(&iri)), Ordering::Less);
        assert_eq!(order_terms(Some(&iri), Some(&literal)), Ordering::Less);
        let two: Term = Literal::from(2).into();
        let ten: Term = Literal::from(10).into();
        assert_eq!(order_terms(Some(&two), Some(&ten)), Ordering::Less);
    }

    #[test]
    fn lang_matching() {
        assert!(lang_matches("en-us", "en"));
        assert!(lang_matches("en", "en"));
        assert!(!lang_matches("eng", "en"));
        assert!(lang_matches("ar", "*"));
        assert!(!lang_matches("", "*"));
    }

    #[test]
    fn regex_flags() {
        let regex = compile_pattern("^a.b$", Some("is")).unwrap();
        assert!(regex.is_match("A\nb"));
        assert!(compile_pattern("(", None).is_err());
        assert!(matches!(
            compile_pattern("a", Some("z")),
            Err(ExpressionError::BadRegex(_))
        ));
    }

    #[test]
    fn uuid_shape() {
        let mut buffer = String::new();
        write_uuid(&mut buffer);
        assert_eq!(buffer.len(), 36);
        assert_eq!(buffer.as_bytes()[14], b'4');
    }
}
