//! Caller-registered asynchronous validators behind the `custom` rule.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::descriptor::FieldDescriptor;

/// Error type custom validators may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a custom validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid,
    Invalid,
    /// Valid, and the value should replace the original in trimmed output.
    Replace(Value),
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid {
            Verdict::Valid
        } else {
            Verdict::Invalid
        }
    }
}

/// Booleans decide pass/fail; any other value is a replacement.
impl From<Value> for Verdict {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => b.into(),
            other => Verdict::Replace(other),
        }
    }
}

/// An asynchronous predicate registered under a name.
///
/// Returning `Err` marks the field invalid; the error itself is only logged.
#[async_trait]
pub trait CustomValidator: Send + Sync {
    /// Check `value`. `descriptors` is the descriptor list of the
    /// `validate` call that reached this field.
    async fn check(&self, value: &Value, descriptors: &[FieldDescriptor])
        -> Result<Verdict, BoxError>;
}

/// Adapter turning an async closure over the value into a validator.
pub struct FnValidator<F>(F);

/// Wrap `f` as a [`CustomValidator`].
///
/// ```
/// use pineapple::{from_fn, BoxError, Verdict};
///
/// let upper = from_fn(|value| async move {
///     Ok::<_, BoxError>(match value.as_str() {
///         Some(s) => Verdict::Replace(s.to_uppercase().into()),
///         None => Verdict::Invalid,
///     })
/// });
/// # let _ = upper;
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnValidator<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Verdict, BoxError>> + Send,
{
    FnValidator(f)
}

#[async_trait]
impl<F, Fut> CustomValidator for FnValidator<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Verdict, BoxError>> + Send,
{
    async fn check(
        &self,
        value: &Value,
        _descriptors: &[FieldDescriptor],
    ) -> Result<Verdict, BoxError> {
        (self.0)(value.clone()).await
    }
}
