//! Element access on `org.lwjgl.system.StructBuffer`.
//!
//! `StructBuffer<T extends Struct<T>, SELF>.get()` and `get(int)` return `T`, erased to
//! `Struct`. A replacement that instantiated the erased type would hand callers a bare
//! `Struct` where they cast to the concrete element class. These redirections resolve the
//! element type from the buffer's generic ancestry and instantiate that instead.

use std::sync::Arc;

use log::debug;

use crate::{
    classfile::descriptor::ReturnType,
    runtime::{HostObject, Redirection, RedirectionRegistry, Value},
    typeres::{Resolution, TypeHierarchy, TypeResolutionCache},
    Result,
};

/// Internal name of the generic base.
pub const STRUCT_BUFFER: &str = "org/lwjgl/system/StructBuffer";

/// `StructBuffer.get(int) -> Struct`
pub const GET_INDEX: &str = "Lorg/lwjgl/system/StructBuffer;get(I)Lorg/lwjgl/system/Struct;";

/// `StructBuffer.get() -> Struct`
pub const GET: &str = "Lorg/lwjgl/system/StructBuffer;get()Lorg/lwjgl/system/Struct;";

/// All keys registered by [`register`].
pub const KEYS: [&str; 2] = [GET_INDEX, GET];

/// Creates instances of host classes.
pub trait ObjectFactory: Send + Sync {
    /// A new instance of `class` (internal name).
    ///
    /// # Errors
    /// Returns an error if the class cannot be instantiated.
    fn instantiate(&self, class: &str) -> Result<Value>;
}

/// Factory producing plain [`HostObject`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostObjectFactory;

impl ObjectFactory for HostObjectFactory {
    fn instantiate(&self, class: &str) -> Result<Value> {
        Ok(Value::Object(HostObject::new(class)))
    }
}

/// A resolver for struct buffer element types over `hierarchy`.
pub fn resolver(hierarchy: Arc<dyn TypeHierarchy>) -> TypeResolutionCache {
    TypeResolutionCache::new(STRUCT_BUFFER, hierarchy)
}

/// Register both `get` redirections.
///
/// A null receiver, an unresolved element type or a failing factory all yield `null`.
pub fn register(
    registry: &RedirectionRegistry,
    resolver: Arc<TypeResolutionCache>,
    factory: Arc<dyn ObjectFactory>,
) {
    let handler = move |receiver: &Value, _: &str, _: &ReturnType, _: &[Value]| -> Result<Value> {
        let Some(buffer) = receiver.as_object() else {
            return Ok(Value::Null);
        };
        match resolver.resolve(buffer.class()) {
            Resolution::Resolved(element) => match factory.instantiate(&element) {
                Ok(value) => Ok(value),
                Err(error) => {
                    debug!("Cannot instantiate {element}: {error}");
                    Ok(Value::Null)
                }
            },
            Resolution::Unresolved => Ok(Value::Null),
        }
    };

    let shared: Arc<dyn Redirection> = Arc::new(handler);
    for key in KEYS {
        registry.redirect(key, shared.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{typeres::StaticBindings, Error};

    const PACK_RANGE: &str = "org/lwjgl/stb/STBTTPackRange";
    const PACK_RANGE_BUFFER: &str = "org/lwjgl/stb/STBTTPackRange$Buffer";

    fn setup(factory: Arc<dyn ObjectFactory>) -> RedirectionRegistry {
        let bindings = StaticBindings::new().bind(PACK_RANGE_BUFFER, STRUCT_BUFFER, PACK_RANGE);
        let registry = RedirectionRegistry::new();
        register(&registry, Arc::new(resolver(Arc::new(bindings))), factory);
        registry
    }

    fn get(registry: &RedirectionRegistry, key: &str, receiver: &Value) -> Value {
        let ret = ReturnType::parse("Lorg/lwjgl/system/Struct;").unwrap();
        registry
            .dispatch(receiver, &key.into(), &ret, &[Value::Int(0)])
            .unwrap()
    }

    #[test]
    fn instantiates_resolved_element() {
        let registry = setup(Arc::new(HostObjectFactory));
        let buffer = Value::Object(HostObject::new(PACK_RANGE_BUFFER));

        for key in KEYS {
            let element = get(&registry, key, &buffer);
            assert_eq!(element.as_object().unwrap().class(), PACK_RANGE);
        }
    }

    #[test]
    fn unresolved_and_null_receivers_yield_null() {
        let registry = setup(Arc::new(HostObjectFactory));
        assert_eq!(get(&registry, GET, &Value::Null), Value::Null);

        let other = Value::Object(HostObject::new("demo/OtherBuffer"));
        assert_eq!(get(&registry, GET_INDEX, &other), Value::Null);
    }

    #[test]
    fn factory_failure_yields_null() {
        struct Failing;
        impl ObjectFactory for Failing {
            fn instantiate(&self, class: &str) -> Result<Value> {
                Err(Error::Error(format!("no constructor for {class}")))
            }
        }

        let registry = setup(Arc::new(Failing));
        let buffer = Value::Object(HostObject::new(PACK_RANGE_BUFFER));
        assert_eq!(get(&registry, GET, &buffer), Value::Null);
    }
}
