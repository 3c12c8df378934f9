//! End-to-end pipeline runs over synthetic artifacts.
//!
//! Every class is built through the public class file API, run through a configured
//! pipeline and parsed again to check what the rewritten methods contain.

use std::sync::Arc;

use classweave::{
    classfile::{code::CodeAttribute, opcodes},
    prelude::*,
    transform::{DirectorySink, TransformKind},
};

const AUTHLIB: &str = "libraries/com/mojang/authlib/6.0.54/authlib-6.0.54.jar";

fn class_entry(class: &ClassFile) -> Entry {
    Entry::new(format!("{}.class", class.name().unwrap()), class.to_bytes().unwrap())
}

fn body(code: Vec<u8>, max_stack: u16, max_locals: u16) -> CodeAttribute {
    CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    }
}

fn session_service() -> ClassFile {
    let mut class =
        ClassFile::new(presets::SESSION_SERVICE, Some("java/lang/Object")).unwrap();
    let join = body(vec![opcodes::ALOAD_0, opcodes::POP, opcodes::RETURN], 1, 4);
    class
        .add_method(
            AccessFlags::PUBLIC,
            "joinServer",
            "(Lcom/mojang/authlib/GameProfile;Ljava/lang/String;Ljava/lang/String;)V",
            Some(&join),
        )
        .unwrap();
    class
}

fn user_api_service() -> ClassFile {
    let mut class =
        ClassFile::new(presets::USER_API_SERVICE, Some("java/lang/Object")).unwrap();
    class
        .add_method(
            AccessFlags::PUBLIC | AccessFlags::NATIVE,
            "getKeyPair",
            "()Ljava/security/KeyPair;",
            None,
        )
        .unwrap();
    class
}

/// `demo/FontCounter.count(ByteBuffer)` calling `stbtt_GetNumberOfFonts`.
fn font_counter() -> ClassFile {
    let mut class = ClassFile::new("demo/FontCounter", Some("java/lang/Object")).unwrap();
    let invoke = class
        .constant_pool
        .intern_method_ref(
            "org/lwjgl/stb/STBTruetype",
            "stbtt_GetNumberOfFonts",
            "(Ljava/nio/ByteBuffer;)I",
        )
        .unwrap();
    let [hi, lo] = invoke.to_be_bytes();
    let count = body(
        vec![opcodes::ALOAD_0, opcodes::INVOKESTATIC, hi, lo, opcodes::IRETURN],
        1,
        1,
    );
    class
        .add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "count",
            "(Ljava/nio/ByteBuffer;)I",
            Some(&count),
        )
        .unwrap();
    class
}

fn plain() -> ClassFile {
    let mut class = ClassFile::new("demo/Plain", Some("java/lang/Object")).unwrap();
    let one = body(vec![opcodes::ICONST_1, opcodes::IRETURN], 1, 0);
    class
        .add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "one", "()I", Some(&one))
        .unwrap();
    class
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle.as_bytes())
}

fn offline_pipeline() -> TransformerPipeline {
    PipelineBuilder::new(Features::NO_AUTH)
        .with(Features::NO_AUTH, presets::offline_session())
        .build()
}

#[test]
fn offline_session_patches_authlib() -> Result<()> {
    let mut artifact = Artifact::new(
        AUTHLIB,
        vec![
            class_entry(&session_service()),
            class_entry(&user_api_service()),
            Entry::new("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
        ],
    );

    let report = offline_pipeline().run(&mut artifact);
    assert_eq!(report.rewritten.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.applied(TransformKind::ConstantReturn), 2);

    let session = ClassFile::parse(&artifact.entries[0].data)?;
    let join = session.find_methods("joinServer", None)[0];
    let code = session.method_code(join)?.unwrap();
    assert_eq!(code.code, [opcodes::RETURN]);
    assert_eq!(code.max_locals, 4);

    let user_api = ClassFile::parse(&artifact.entries[1].data)?;
    let key_pair = user_api.find_methods("getKeyPair", None)[0];
    assert!(!user_api.methods[key_pair]
        .access_flags
        .contains(AccessFlags::NATIVE));
    let code = user_api.method_code(key_pair)?.unwrap();
    assert_eq!(code.code, [opcodes::ACONST_NULL, opcodes::ARETURN]);

    assert_eq!(artifact.entries[2].data, b"Manifest-Version: 1.0\n");
    Ok(())
}

#[test]
fn offline_session_is_idempotent() {
    let mut artifact = Artifact::new(AUTHLIB, vec![class_entry(&session_service())]);
    let pipeline = offline_pipeline();

    let first = pipeline.run(&mut artifact);
    assert_eq!(first.rewritten.len(), 1);
    let once = artifact.clone();

    let second = pipeline.run(&mut artifact);
    assert!(second.is_untouched());
    assert_eq!(second.unchanged, 1);
    assert_eq!(artifact, once);
}

#[test]
fn other_artifacts_stay_byte_identical() {
    let original = Artifact::new(
        "libraries/org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3.jar",
        vec![class_entry(&session_service()), class_entry(&plain())],
    );
    let mut artifact = original.clone();

    let report = offline_pipeline().run(&mut artifact);
    assert!(report.is_untouched());
    assert_eq!(report.unchanged, 0);
    assert_eq!(artifact, original);
}

#[test]
fn redirects_call_sites_through_dispatcher() -> Result<()> {
    let pipeline = PipelineBuilder::new(Features::LWJGL)
        .with(Features::LWJGL, presets::headless_redirects())
        .build();
    let plain_entry = class_entry(&plain());
    let mut artifact = Artifact::new(
        "mods/renderer.jar",
        vec![class_entry(&font_counter()), plain_entry.clone()],
    );

    let report = pipeline.run(&mut artifact);
    assert_eq!(report.rewritten, ["demo/FontCounter.class"]);
    assert_eq!(report.unchanged, 1);
    assert_eq!(artifact.entries[1], plain_entry);

    let rewritten = &artifact.entries[0].data;
    assert!(contains(rewritten, presets::DISPATCHER_OWNER));
    assert!(contains(
        rewritten,
        "Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I"
    ));
    ClassFile::parse(rewritten)?;

    let again = pipeline.run(&mut artifact);
    assert!(again.is_untouched());
    Ok(())
}

#[test]
fn damaged_class_is_contained() {
    let mut artifact = Artifact::new(
        AUTHLIB,
        vec![
            Entry::new(
                format!("{}.class", presets::SESSION_SERVICE),
                vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00],
            ),
            class_entry(&user_api_service()),
        ],
    );

    let report = offline_pipeline().run(&mut artifact);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.rewritten.len(), 1);
    assert_eq!(artifact.entries[0].data, [0xCA, 0xFE, 0xBA, 0xBE, 0x00]);
}

#[test]
fn run_dir_extracts_and_rewrites() -> Result<()> {
    let source = tempfile::tempdir()?;
    let target = tempfile::tempdir()?;
    let extracted = tempfile::tempdir()?;

    let root = source.path().join("authlib-6.0.54");
    let session = class_entry(&session_service());
    Artifact::new(
        &root,
        vec![
            session.clone(),
            Entry::new(presets::RUNTIME_RESOURCE, b"PK\x03\x04".to_vec()),
            Entry::new(presets::LWJGL_RESOURCE, b"PK\x05\x06".to_vec()),
        ],
    )
    .write_dir(&root)?;

    let sink = Arc::new(DirectorySink::new(extracted.path()));
    let pipeline = presets::pipeline(Features::all(), sink);
    let report = pipeline.run_dir(&root, target.path())?;

    let mut names = report.extracted.clone();
    names.sort();
    assert_eq!(names, [presets::LWJGL_RESOURCE, presets::RUNTIME_RESOURCE]);
    assert_eq!(report.applied(TransformKind::ExtractResource), 2);
    assert_eq!(
        std::fs::read(extracted.path().join(presets::RUNTIME_RESOURCE))?,
        b"PK\x03\x04"
    );
    assert_eq!(
        std::fs::read(extracted.path().join(presets::LWJGL_RESOURCE))?,
        b"PK\x05\x06"
    );

    let written = Artifact::read_dir(target.path())?;
    assert_eq!(written.entries.len(), 3);
    let patched = written.entry(&session.name).unwrap();
    assert_ne!(patched.data, session.data);
    Ok(())
}
