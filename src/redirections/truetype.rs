//! Font functions of `org.lwjgl.stb.STBTruetype`.
//!
//! Without the native library the host still asks fonts for their names. `stbtt_InitFont`
//! parses the font's `name` table and caches it against the `STBTTFontinfo` object;
//! `stbtt_GetFontNameString` then serves records from that cache until the object is gone.
//! Metrics are answered with fixed values for a 2048 units-per-em font.

use std::sync::Arc;

use crate::{
    classfile::descriptor::ReturnType,
    nametable::{FontNameCache, NameQuery, NameTable},
    runtime::{constant, RedirectionRegistry, Value},
    Error, Result,
};

/// `stbtt_InitFont(STBTTFontinfo, ByteBuffer) -> boolean`
pub const INIT_FONT: &str =
    "Lorg/lwjgl/stb/STBTruetype;stbtt_InitFont(Lorg/lwjgl/stb/STBTTFontinfo;Ljava/nio/ByteBuffer;)Z";

/// `stbtt_GetFontNameString(STBTTFontinfo, int, int, int, int) -> ByteBuffer`
pub const GET_FONT_NAME_STRING: &str = "Lorg/lwjgl/stb/STBTruetype;stbtt_GetFontNameString(Lorg/lwjgl/stb/STBTTFontinfo;IIII)Ljava/nio/ByteBuffer;";

/// `stbtt_GetNumberOfFonts(ByteBuffer) -> int`
pub const GET_NUMBER_OF_FONTS: &str =
    "Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I";

/// `stbtt_ScaleForPixelHeight(STBTTFontinfo, float) -> float`
pub const SCALE_FOR_PIXEL_HEIGHT: &str =
    "Lorg/lwjgl/stb/STBTruetype;stbtt_ScaleForPixelHeight(Lorg/lwjgl/stb/STBTTFontinfo;F)F";

/// `stbtt_GetFontVMetrics(STBTTFontinfo, IntBuffer, IntBuffer, IntBuffer) -> void`
pub const GET_FONT_VMETRICS: &str = "Lorg/lwjgl/stb/STBTruetype;stbtt_GetFontVMetrics(Lorg/lwjgl/stb/STBTTFontinfo;Ljava/nio/IntBuffer;Ljava/nio/IntBuffer;Ljava/nio/IntBuffer;)V";

/// Units per em assumed for scale computations.
pub const UNITS_PER_EM: f32 = 2048.0;

/// Ascent, descent and line gap reported by `stbtt_GetFontVMetrics`.
pub const VMETRICS: [i32; 3] = [1800, -400, 0];

/// All keys registered by [`register`].
pub const KEYS: [&str; 5] = [
    INIT_FONT,
    GET_FONT_NAME_STRING,
    GET_NUMBER_OF_FONTS,
    SCALE_FOR_PIXEL_HEIGHT,
    GET_FONT_VMETRICS,
];

/// Register the font redirections, caching name tables in `cache`.
pub fn register(registry: &RedirectionRegistry, cache: &FontNameCache) {
    let fonts = cache.clone();
    registry.redirect_fn(
        INIT_FONT,
        move |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
            let font = (args.first(), args.get(1));
            if let (Some(Value::Object(info)), Some(Value::Bytes(data))) = font {
                let table = NameTable::parse(data);
                if !table.is_empty() {
                    fonts.insert(info, table);
                }
            }
            Ok(Value::Bool(true))
        },
    );

    let fonts = cache.clone();
    registry.redirect_fn(
        GET_FONT_NAME_STRING,
        move |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
            let Some(Value::Object(info)) = args.first() else {
                return Ok(Value::Null);
            };
            let Some(table) = fonts.get(info.id()) else {
                return Ok(Value::Null);
            };
            let Some(query) = name_query(&args[1..]) else {
                return Ok(Value::Null);
            };

            Ok(table
                .lookup(&query)
                .map_or(Value::Null, |record| Value::Bytes(Arc::from(record.data.as_slice()))))
        },
    );

    registry.redirect(GET_NUMBER_OF_FONTS, constant(1));

    registry.redirect_fn(
        SCALE_FOR_PIXEL_HEIGHT,
        |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
            let pixel_height = args
                .get(1)
                .and_then(Value::as_float)
                .ok_or_else(|| Error::Handler {
                    key: SCALE_FOR_PIXEL_HEIGHT.to_string(),
                    message: "pixel height is not a float".to_string(),
                })?;
            Ok(Value::Float(pixel_height / UNITS_PER_EM))
        },
    );

    registry.redirect_fn(
        GET_FONT_VMETRICS,
        |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
            // Null out-parameters are skipped
            for (buffer, metric) in args.iter().skip(1).zip(VMETRICS) {
                if let Some(buffer) = buffer.as_ints() {
                    buffer.put(0, metric)?;
                }
            }
            Ok(Value::Null)
        },
    );
}

fn name_query(args: &[Value]) -> Option<NameQuery> {
    let mut ids = [0_u16; 4];
    for (id, arg) in ids.iter_mut().zip(args) {
        *id = u16::try_from(arg.as_int()?).ok()?;
    }
    (args.len() >= 4).then(|| NameQuery::new(ids[0], ids[1], ids[2], ids[3]))
}

/// Query a font name through `registry`, the way a redirected call site does.
///
/// # Errors
/// Returns the handler's error.
pub fn font_name(
    registry: &RedirectionRegistry,
    info: &Value,
    query: NameQuery,
) -> Result<Option<Vec<u8>>> {
    let args = [
        info.clone(),
        Value::Int(i32::from(query.platform_id)),
        Value::Int(i32::from(query.encoding_id)),
        Value::Int(i32::from(query.language_id)),
        Value::Int(i32::from(query.name_id)),
    ];
    let ret = ReturnType::parse("Ljava/nio/ByteBuffer;")?;
    let value = registry.dispatch(&Value::Null, &GET_FONT_NAME_STRING.into(), &ret, &args)?;
    Ok(value.as_bytes().map(<[u8]>::to_vec))
}
