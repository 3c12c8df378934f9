//! Image loading of `org.lwjgl.stb.STBImage`.
//!
//! Nothing is decoded. `stbi_load_from_memory` reports the dimensions found in a PNG header,
//! or a 1x1 RGB placeholder for anything else, and returns a zeroed pixel buffer of the
//! matching size.

use crate::{
    classfile::descriptor::ReturnType,
    runtime::{RedirectionRegistry, Value},
    Error, Parser, Result,
};

/// `stbi_load_from_memory(ByteBuffer, IntBuffer, IntBuffer, IntBuffer, int) -> ByteBuffer`
pub const LOAD_FROM_MEMORY: &str = "Lorg/lwjgl/stb/STBImage;stbi_load_from_memory(Ljava/nio/ByteBuffer;Ljava/nio/IntBuffer;Ljava/nio/IntBuffer;Ljava/nio/IntBuffer;I)Ljava/nio/ByteBuffer;";

/// All keys registered by [`register`].
pub const KEYS: [&str; 1] = [LOAD_FROM_MEMORY];

/// Largest pixel buffer handed out.
pub const MAX_PIXEL_BYTES: usize = 256 << 20;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Dimensions and channel count of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channels stored in the file
    pub channels: u8,
}

impl ImageHeader {
    /// What callers see when the data is not a readable PNG.
    pub const PLACEHOLDER: ImageHeader = ImageHeader {
        width: 1,
        height: 1,
        channels: 3,
    };

    /// Read the `IHDR` chunk of a PNG stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if `data` is not a PNG stream,
    /// [`crate::Error::OutOfBounds`] if it is truncated and [`crate::Error::Malformed`] for an
    /// invalid header.
    pub fn parse_png(data: &[u8]) -> Result<ImageHeader> {
        if !data.starts_with(&PNG_SIGNATURE) {
            return Err(Error::NotSupported);
        }
        let mut parser = Parser::new(data);
        parser.advance_by(PNG_SIGNATURE.len())?;

        let length = parser.read_be::<u32>()?;
        if parser.read_bytes(4)? != *b"IHDR" || length != 13 {
            return Err(malformed_error!("PNG does not start with an IHDR chunk"));
        }
        let width = parser.read_be::<u32>()?;
        let height = parser.read_be::<u32>()?;
        let _bit_depth = parser.read_be::<u8>()?;
        let channels = match parser.read_be::<u8>()? {
            0 => 1,
            4 => 2,
            2 | 3 => 3,
            6 => 4,
            other => return Err(malformed_error!("Unknown PNG color type {}", other)),
        };
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(malformed_error!("Invalid PNG dimensions {}x{}", width, height));
        }

        Ok(ImageHeader {
            width,
            height,
            channels,
        })
    }
}

fn handler_error(message: impl Into<String>) -> Error {
    Error::Handler {
        key: LOAD_FROM_MEMORY.to_string(),
        message: message.into(),
    }
}

/// Register the image redirection.
pub fn register(registry: &RedirectionRegistry) {
    registry.redirect_fn(
        LOAD_FROM_MEMORY,
        |_: &Value, _: &str, _: &ReturnType, args: &[Value]| {
            let data = args.first().and_then(Value::as_bytes).unwrap_or_default();
            let header = ImageHeader::parse_png(data).unwrap_or(ImageHeader::PLACEHOLDER);

            let desired = args.get(4).and_then(Value::as_int).unwrap_or(0);
            let channels = match desired {
                0 => usize::from(header.channels),
                1..=4 => desired as usize,
                _ => return Err(handler_error(format!("desired channels {desired}"))),
            };

            let reported = [
                header.width as i32,
                header.height as i32,
                i32::from(header.channels),
            ];
            for (buffer, value) in args.iter().skip(1).zip(reported) {
                if let Some(buffer) = buffer.as_ints() {
                    buffer.put(0, value)?;
                }
            }

            let size = (header.width as usize)
                .checked_mul(header.height as usize)
                .and_then(|pixels| pixels.checked_mul(channels))
                .filter(|size| *size <= MAX_PIXEL_BYTES)
                .ok_or_else(|| {
                    handler_error(format!("{}x{} image is too large", header.width, header.height))
                })?;
            Ok(Value::from(vec![0_u8; size]))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::IntBuffer;

    fn png(width: u32, height: u32, color_type: u8) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13_u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, color_type, 0, 0, 0]);
        data
    }

    fn load(
        registry: &RedirectionRegistry,
        data: Vec<u8>,
        desired: i32,
    ) -> (Result<Value>, [IntBuffer; 3]) {
        let out = [IntBuffer::new(1), IntBuffer::new(1), IntBuffer::new(1)];
        let args = [
            Value::from(data),
            Value::from(out[0].clone()),
            Value::from(out[1].clone()),
            Value::from(out[2].clone()),
            Value::Int(desired),
        ];
        let ret = ReturnType::parse("Ljava/nio/ByteBuffer;").unwrap();
        let result = registry.dispatch(&Value::Null, &LOAD_FROM_MEMORY.into(), &ret, &args);
        (result, out)
    }

    fn setup() -> RedirectionRegistry {
        let registry = RedirectionRegistry::new();
        register(&registry);
        registry
    }

    #[test]
    fn png_header_sizes_the_pixels() {
        let registry = setup();
        let (result, [x, y, channels]) = load(&registry, png(4, 2, 6), 0);
        assert_eq!(result.unwrap().as_bytes().map(<[u8]>::len), Some(32));
        assert_eq!((x.to_vec(), y.to_vec(), channels.to_vec()), (vec![4], vec![2], vec![4]));

        let (result, [_, _, channels]) = load(&registry, png(4, 2, 6), 3);
        assert_eq!(result.unwrap().as_bytes().map(<[u8]>::len), Some(24));
        assert_eq!(channels.to_vec(), [4]);
    }

    #[test]
    fn unreadable_data_loads_a_placeholder() {
        let registry = setup();
        let (result, [x, y, channels]) = load(&registry, b"GIF89a".to_vec(), 0);
        assert_eq!(result.unwrap().as_bytes().map(<[u8]>::len), Some(3));
        assert_eq!((x.to_vec(), y.to_vec(), channels.to_vec()), (vec![1], vec![1], vec![3]));

        assert!(matches!(
            ImageHeader::parse_png(&png(4, 2, 6)[..20]),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            ImageHeader::parse_png(b"GIF89a"),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            ImageHeader::parse_png(&png(0, 2, 6)),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_bad_requests() {
        let registry = setup();
        let (result, _) = load(&registry, png(4, 2, 6), 5);
        assert!(matches!(result, Err(Error::Handler { .. })));

        let (result, _) = load(&registry, png(1 << 20, 1 << 20, 6), 0);
        assert!(matches!(result, Err(Error::Handler { .. })));
    }
}
