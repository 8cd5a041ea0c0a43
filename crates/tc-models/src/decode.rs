//! Typed access to a [`Params`] assignment.

use tc_types::{FitError, ParameterValue, Params};

fn invalid(name: &str, message: impl Into<String>) -> FitError {
    FitError::InvalidHyperparameter {
        name: name.to_string(),
        message: message.into(),
    }
}

fn required<'a>(params: &'a Params, name: &str) -> Result<&'a ParameterValue, FitError> {
    params.get(name).ok_or_else(|| invalid(name, "missing"))
}

pub(crate) fn float(params: &Params, name: &str) -> Result<f64, FitError> {
    required(params, name)?
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(name, "expected a finite number"))
}

/// Float constrained to `[low, high]`.
pub(crate) fn unit_interval(params: &Params, name: &str, low: f64, high: f64) -> Result<f64, FitError> {
    let value = float(params, name)?;
    if !(low..=high).contains(&value) {
        return Err(invalid(name, format!("{value} outside [{low}, {high}]")));
    }
    Ok(value)
}

pub(crate) fn count(params: &Params, name: &str) -> Result<usize, FitError> {
    let value = required(params, name)?
        .as_i64()
        .ok_or_else(|| invalid(name, "expected an integer"))?;
    usize::try_from(value).map_err(|_| invalid(name, format!("{value} is negative")))
}

pub(crate) fn count_or(params: &Params, name: &str, default: usize) -> Result<usize, FitError> {
    match params.get(name) {
        Some(_) => count(params, name),
        None => Ok(default),
    }
}

pub(crate) fn choice<'a>(params: &'a Params, name: &str) -> Result<&'a str, FitError> {
    required(params, name)?
        .as_str()
        .ok_or_else(|| invalid(name, "expected a string choice"))
}

pub(crate) fn choice_or<'a>(params: &'a Params, name: &str, default: &'a str) -> Result<&'a str, FitError> {
    match params.get(name) {
        Some(_) => choice(params, name),
        None => Ok(default),
    }
}

pub(crate) fn unknown_choice(name: &str, value: &str) -> FitError {
    invalid(name, format!("unknown choice {value:?}"))
}
