//! Registry and resolver behavior under concurrent use.

use std::{sync::Arc, thread};

use classweave::{
    classfile::{descriptor::ReturnType, ClassFile},
    nametable::FontNameCache,
    redirections::{self, image, structbuffer, truetype},
    runtime::{constant, HostObject, IntBuffer, RedirectionRegistry, SignatureKey, Value},
    typeres::{hierarchy::ClassHierarchy, Resolution, StaticBindings},
};

const SCALE: &str =
    "Lorg/lwjgl/stb/STBTruetype;stbtt_ScaleForPixelHeight(Lorg/lwjgl/stb/STBTTFontinfo;F)F";
const COUNT: &str = "Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I";

fn subclass(name: &str, superclass: &str, signature: Option<&str>) -> Vec<u8> {
    let mut class = ClassFile::new(name, Some(superclass)).unwrap();
    if let Some(signature) = signature {
        class.set_signature(signature).unwrap();
    }
    class.to_bytes().unwrap()
}

#[test]
fn last_registration_wins() {
    let registry = RedirectionRegistry::new();
    let key = SignatureKey::parse(COUNT).unwrap();
    let ret = ReturnType::parse("I").unwrap();

    registry.redirect(key.clone(), constant(1));
    registry.redirect(key.clone(), constant(4));

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.dispatch(&Value::Null, &key, &ret, &[]).unwrap(),
        Value::Int(4)
    );
}

#[test]
fn unregistered_key_yields_default() {
    let registry = RedirectionRegistry::new();
    let float = ReturnType::parse("F").unwrap();
    assert_eq!(
        registry
            .dispatch(&Value::Null, &SCALE.into(), &float, &[])
            .unwrap(),
        Value::Float(0.0)
    );
    assert!(registry
        .invoke(&Value::Null, &SCALE.into(), &float, &[])
        .unwrap()
        .is_none());
}

#[test]
fn concurrent_dispatch_and_registration() {
    let registry = RedirectionRegistry::new();
    registry.redirect_fn(SCALE, |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
        let height = args.get(1).and_then(Value::as_float).unwrap_or_default();
        Ok(Value::Float(height / 2048.0))
    });
    let ret = ReturnType::parse("F").unwrap();
    let key = SignatureKey::from(SCALE);

    thread::scope(|scope| {
        for worker in 0..8 {
            let (registry, ret, key) = (&registry, &ret, &key);
            scope.spawn(move || {
                for round in 0..500 {
                    let height = (worker * 500 + round) as f32;
                    let args = [Value::Object(HostObject::new("info")), Value::Float(height)];
                    let scale = registry.dispatch(&Value::Null, key, ret, &args).unwrap();
                    assert_eq!(scale, Value::Float(height / 2048.0));
                }
            });
        }
        scope.spawn(|| {
            for round in 0..100 {
                registry.redirect(format!("Ldemo/Noise;n{round}()V").as_str(), constant(0));
            }
        });
    });

    assert_eq!(registry.len(), 101);
}

#[test]
fn out_parameters_reach_the_caller() {
    let registry = RedirectionRegistry::new();
    redirections::register_all(
        &registry,
        &FontNameCache::new(),
        Arc::new(structbuffer::resolver(Arc::new(StaticBindings::new()))),
        Arc::new(structbuffer::HostObjectFactory),
    );
    assert_eq!(registry.len(), redirections::keys().len());

    let metrics = [IntBuffer::new(1), IntBuffer::new(1), IntBuffer::new(1)];
    let mut args = vec![Value::Object(HostObject::new("org/lwjgl/stb/STBTTFontinfo"))];
    args.extend(metrics.iter().cloned().map(Value::from));
    let key = SignatureKey::from(truetype::GET_FONT_VMETRICS);
    let result = thread::scope(|scope| {
        scope
            .spawn(|| registry.dispatch(&Value::Null, &key, &ReturnType::Void, &args))
            .join()
            .unwrap()
    });
    assert_eq!(result.unwrap(), Value::Null);
    let values: Vec<i32> = metrics.iter().filter_map(|buffer| buffer.get(0)).collect();
    assert_eq!(values, truetype::VMETRICS);

    let size = [IntBuffer::new(1), IntBuffer::new(1), IntBuffer::new(1)];
    let mut args = vec![Value::from(b"not an image".to_vec())];
    args.extend(size.iter().cloned().map(Value::from));
    args.push(Value::Int(4));
    let pixels = registry
        .dispatch(
            &Value::Null,
            &image::LOAD_FROM_MEMORY.into(),
            &ReturnType::parse("Ljava/nio/ByteBuffer;").unwrap(),
            &args,
        )
        .unwrap();
    assert_eq!(pixels.as_bytes(), Some(&[0_u8; 4][..]));
    assert_eq!(size[0].to_vec(), [1]);
}

#[test]
fn resolution_is_deterministic_across_threads() {
    let base = structbuffer::STRUCT_BUFFER;
    let modules = [
        subclass(
            "org/lwjgl/stb/STBTTPackRange$Buffer",
            base,
            Some(&format!(
                "L{base}<Lorg/lwjgl/stb/STBTTPackRange;Lorg/lwjgl/stb/STBTTPackRange$Buffer;>;"
            )),
        ),
        subclass(
            "demo/TrackedRanges",
            "org/lwjgl/stb/STBTTPackRange$Buffer",
            None,
        ),
        subclass("demo/Unrelated", "java/lang/Object", None),
    ];
    let hierarchy = ClassHierarchy::from_modules(modules.iter().map(Vec::as_slice));
    let resolver = Arc::new(structbuffer::resolver(Arc::new(hierarchy)));

    let results: Vec<Vec<Resolution>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                scope.spawn(move || {
                    ["demo/TrackedRanges", "demo/Unrelated", "demo/Missing"]
                        .iter()
                        .map(|class| resolver.resolve(class))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    for resolutions in &results {
        assert_eq!(resolutions, &results[0]);
    }
    assert_eq!(results[0][0].class(), Some("org/lwjgl/stb/STBTTPackRange"));
    assert_eq!(results[0][1], Resolution::Unresolved);
    assert_eq!(results[0][2], Resolution::Unresolved);
    assert_eq!(resolver.len(), 3);
}
