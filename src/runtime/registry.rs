//! Process-wide call redirection table.
//!
//! Rewritten call sites end in a single static dispatcher which hands the receiver, the
//! signature key, the declared return type and the boxed arguments to
//! [`RedirectionRegistry::dispatch`]. The registry looks the key up, runs the handler and
//! adapts whatever it returns to the declared type.
//!
//! # Concurrency
//!
//! The table is a [`DashMap`]: lookups from any number of host threads proceed concurrently
//! with registration, and a handler observed once stays observable until it is replaced.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use log::debug;

use crate::{
    classfile::descriptor::{FieldType, ReturnType},
    runtime::{SignatureKey, Value},
    Error, Result,
};

/// A substitute for one method call.
pub trait Redirection: Send + Sync {
    /// Compute the call's result.
    ///
    /// `receiver` is [`Value::Null`] for static calls, `descriptor` the call site's method
    /// descriptor and `ret` its parsed return type.
    ///
    /// # Errors
    /// Whatever the handler fails with; it reaches the caller unmodified.
    fn invoke(
        &self,
        receiver: &Value,
        descriptor: &str,
        ret: &ReturnType,
        args: &[Value],
    ) -> Result<Value>;
}

impl<F> Redirection for F
where
    F: Fn(&Value, &str, &ReturnType, &[Value]) -> Result<Value> + Send + Sync,
{
    fn invoke(
        &self,
        receiver: &Value,
        descriptor: &str,
        ret: &ReturnType,
        args: &[Value],
    ) -> Result<Value> {
        self(receiver, descriptor, ret, args)
    }
}

/// A handler that ignores its inputs and always yields `value`.
pub struct Constant(Value);

impl Redirection for Constant {
    fn invoke(&self, _: &Value, _: &str, _: &ReturnType, _: &[Value]) -> Result<Value> {
        Ok(self.0.clone())
    }
}

/// Wrap `value` into a constant handler.
#[must_use]
pub fn constant(value: impl Into<Value>) -> Arc<dyn Redirection> {
    Arc::new(Constant(value.into()))
}

/// Mapping from call-site signature to handler.
#[derive(Default)]
pub struct RedirectionRegistry {
    handlers: DashMap<SignatureKey, Arc<dyn Redirection>>,
}

impl RedirectionRegistry {
    /// An empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        RedirectionRegistry {
            handlers: DashMap::new(),
        }
    }

    /// The process-wide registry used by the dispatcher.
    pub fn global() -> &'static RedirectionRegistry {
        static GLOBAL: OnceLock<RedirectionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RedirectionRegistry::new)
    }

    /// Register `handler` under `key`. A later registration replaces an earlier one.
    pub fn redirect(&self, key: impl Into<SignatureKey>, handler: Arc<dyn Redirection>) {
        let key = key.into();
        if self.handlers.insert(key.clone(), handler).is_some() {
            debug!("Replaced redirection for {key}");
        }
    }

    /// Register a closure under `key`.
    pub fn redirect_fn<F>(&self, key: impl Into<SignatureKey>, handler: F)
    where
        F: Fn(&Value, &str, &ReturnType, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.redirect(key, Arc::new(handler));
    }

    /// The handler registered under `key`, if any.
    #[must_use]
    pub fn lookup(&self, key: &SignatureKey) -> Option<Arc<dyn Redirection>> {
        self.handlers.get(key).map(|entry| entry.value().clone())
    }

    /// Whether `key` has a handler.
    #[must_use]
    pub fn contains(&self, key: &SignatureKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `key` without adapting its result.
    ///
    /// Returns `Ok(None)` if no handler is registered.
    ///
    /// # Errors
    /// Returns the handler's error unmodified, or [`Error::InvalidDescriptor`] if `key` is
    /// malformed.
    pub fn invoke(
        &self,
        receiver: &Value,
        key: &SignatureKey,
        ret: &ReturnType,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let Some(handler) = self.lookup(key) else {
            return Ok(None);
        };
        let (_, _, descriptor) = key.parts()?;
        handler.invoke(receiver, descriptor, ret, args).map(Some)
    }

    /// Entry point of rewritten call sites.
    ///
    /// Runs the handler for `key` and adapts its result to `ret`; an unregistered key yields
    /// the default value of `ret`.
    ///
    /// # Errors
    /// Returns the handler's error unmodified, or [`Error::IncompatibleReturn`] if the result
    /// cannot be adapted.
    pub fn dispatch(
        &self,
        receiver: &Value,
        key: &SignatureKey,
        ret: &ReturnType,
        args: &[Value],
    ) -> Result<Value> {
        match self.invoke(receiver, key, ret, args)? {
            Some(value) => adapt_return(value, ret),
            None => {
                debug!("No redirection registered for {key}");
                Ok(Value::default_for(ret))
            }
        }
    }
}

/// Adapt a handler's result to the declared return type of its call site.
///
/// # Errors
/// Returns [`Error::IncompatibleReturn`] if `value` cannot represent `ret`.
pub fn adapt_return(value: Value, ret: &ReturnType) -> Result<Value> {
    let ReturnType::Value(field) = ret else {
        return Ok(Value::Null);
    };
    if value.is_null() {
        return Ok(Value::default_for(ret));
    }

    let range = match field {
        FieldType::Byte => Some((i32::from(i8::MIN), i32::from(i8::MAX))),
        FieldType::Short => Some((i32::from(i16::MIN), i32::from(i16::MAX))),
        FieldType::Char => Some((0, i32::from(u16::MAX))),
        _ => None,
    };

    let adapted = match (field, value) {
        (FieldType::Boolean, value @ Value::Bool(_)) => Some(value),
        (FieldType::Int, value @ Value::Int(_)) => Some(value),
        (FieldType::Byte | FieldType::Short | FieldType::Char, Value::Int(int)) => range
            .filter(|(low, high)| (*low..=*high).contains(&int))
            .map(|_| Value::Int(int)),
        (FieldType::Long, value @ Value::Long(_)) => Some(value),
        (FieldType::Float, value @ Value::Float(_)) => Some(value),
        (FieldType::Double, value @ Value::Double(_)) => Some(value),
        (
            FieldType::Object(_) | FieldType::Array(_),
            value @ (Value::Str(_) | Value::Bytes(_) | Value::Ints(_) | Value::Object(_)),
        ) => Some(value),
        (_, value) => {
            return Err(Error::IncompatibleReturn {
                expected: field.to_string(),
                found: value.kind(),
            })
        }
    };

    adapted.ok_or_else(|| Error::IncompatibleReturn {
        expected: field.to_string(),
        found: "int",
    })
}
