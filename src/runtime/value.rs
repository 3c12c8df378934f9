//! Host value model.
//!
//! Redirection handlers exchange [`Value`]s with rewritten call sites. References to host
//! objects are [`ObjectRef`]s: shared handles to a [`HostObject`] carrying a stable
//! [`ObjectId`] and a list of lifecycle hooks that run exactly once, when the last handle is
//! dropped. Caches keyed by an object use these hooks to forget the object deterministically
//! without keeping it alive.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    classfile::descriptor::{FieldType, ReturnType},
    Result,
};

/// Stable identity of a host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObjectId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the id.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

type DropHook = Box<dyn FnOnce(ObjectId) + Send>;

/// An object living in the host.
pub struct HostObject {
    id: ObjectId,
    class: String,
    drop_hooks: Mutex<Vec<DropHook>>,
}

/// Shared handle to a host object.
pub type ObjectRef = Arc<HostObject>;

impl HostObject {
    /// Create an object of class `class` (internal name) with a fresh id.
    #[must_use]
    pub fn new(class: impl Into<String>) -> ObjectRef {
        Arc::new(HostObject {
            id: ObjectId::next(),
            class: class.into(),
            drop_hooks: Mutex::new(Vec::new()),
        })
    }

    /// The object's identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Internal name of the object's runtime class.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Run `hook` with this object's id when the object is destroyed.
    pub fn on_drop<F>(&self, hook: F)
    where
        F: FnOnce(ObjectId) + Send + 'static,
    {
        lock!(self.drop_hooks).push(Box::new(hook));
    }
}

impl Drop for HostObject {
    fn drop(&mut self) {
        let hooks = match self.drop_hooks.get_mut() {
            Ok(hooks) => std::mem::take(hooks),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        for hook in hooks {
            hook(self.id);
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// A mutable `int` buffer shared between a call site and its handler.
///
/// Handlers fill these the way native functions fill out-parameters. Clones share storage and
/// compare equal only to each other.
#[derive(Clone, Default)]
pub struct IntBuffer(Arc<Mutex<Vec<i32>>>);

impl IntBuffer {
    /// A zeroed buffer of `len` elements.
    #[must_use]
    pub fn new(len: usize) -> Self {
        IntBuffer::from(vec![0_i32; len])
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        lock!(self.0).len()
    }

    /// Whether the buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i32> {
        lock!(self.0).get(index).copied()
    }

    /// Store `value` at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the end.
    pub fn put(&self, index: usize, value: i32) -> Result<()> {
        let mut data = lock!(self.0);
        let slot = data.get_mut(index).ok_or_else(|| out_of_bounds_error!())?;
        *slot = value;
        Ok(())
    }

    /// A copy of the contents.
    #[must_use]
    pub fn to_vec(&self) -> Vec<i32> {
        lock!(self.0).clone()
    }
}

impl From<Vec<i32>> for IntBuffer {
    fn from(data: Vec<i32>) -> Self {
        IntBuffer(Arc::new(Mutex::new(data)))
    }
}

impl PartialEq for IntBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for IntBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntBuffer").field(&self.to_vec()).finish()
    }
}

/// A value passed to or returned from a redirection.
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`
    Null,
    /// `boolean`
    Bool(bool),
    /// `int`, `short`, `byte` and `char`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// A string
    Str(Arc<str>),
    /// A byte buffer or array
    Bytes(Arc<[u8]>),
    /// An `int` buffer or array the handler may write to
    Ints(IntBuffer),
    /// Any other object
    Object(ObjectRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Ints(a), Value::Ints(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl Value {
    /// Short name of the value's kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Ints(_) => "int buffer",
            Value::Object(_) => "object",
        }
    }

    /// Whether this is `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value a call site of type `ret` observes when nothing is returned.
    #[must_use]
    pub fn default_for(ret: &ReturnType) -> Value {
        match ret {
            ReturnType::Void => Value::Null,
            ReturnType::Value(field) => match field {
                FieldType::Boolean => Value::Bool(false),
                FieldType::Long => Value::Long(0),
                FieldType::Float => Value::Float(0.0),
                FieldType::Double => Value::Double(0.0),
                FieldType::Object(_) | FieldType::Array(_) => Value::Null,
                _ => Value::Int(0),
            },
        }
    }

    /// The `int` payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The `float` payload.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// The byte payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The shared `int` buffer.
    #[must_use]
    pub fn as_ints(&self) -> Option<&IntBuffer> {
        match self {
            Value::Ints(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// The referenced host object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value.into())
    }
}

impl From<IntBuffer> for Value {
    fn from(value: IntBuffer) -> Self {
        Value::Ints(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ids_are_unique() {
        let a = HostObject::new("a/A");
        let b = HostObject::new("a/A");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.class(), "a/A");
        assert_eq!(Value::from(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn drop_hooks_run_once_on_last_release() {
        let calls = Arc::new(AtomicUsize::new(0));
        let object = HostObject::new("a/A");
        let id = object.id();

        let seen = calls.clone();
        object.on_drop(move |dropped| {
            assert_eq!(dropped, id);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let second = object.clone();
        drop(object);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn int_buffers_are_shared_out_parameters() {
        let buffer = IntBuffer::new(2);
        let value = Value::from(buffer.clone());
        value.as_ints().unwrap().put(1, 7).unwrap();
        assert_eq!(buffer.to_vec(), [0, 7]);
        assert_eq!(buffer.get(1), Some(7));
        assert_eq!(buffer.get(2), None);
        assert!(matches!(buffer.put(2, 1), Err(crate::Error::OutOfBounds { .. })));

        assert_eq!(value, Value::Ints(buffer));
        assert_ne!(value, Value::Ints(IntBuffer::from(vec![0, 7])));
        assert_eq!(value.kind(), "int buffer");
        assert!(IntBuffer::default().is_empty());
    }

    #[test]
    fn defaults_follow_return_type() {
        assert_eq!(Value::default_for(&ReturnType::Void), Value::Null);
        assert_eq!(
            Value::default_for(&ReturnType::parse("Z").unwrap()),
            Value::Bool(false)
        );
        assert_eq!(
            Value::default_for(&ReturnType::parse("C").unwrap()),
            Value::Int(0)
        );
        assert_eq!(
            Value::default_for(&ReturnType::parse("[B").unwrap()),
            Value::Null
        );
    }
}
