//! Synthetic class files and fonts shared by the unit tests.

use crate::classfile::{
    code::{CodeAttribute, ExceptionEntry},
    opcodes, AccessFlags, Attribute, ClassFile,
};

/// Key of the call made by [`ClassBuilder::render_fixture`].
pub const GET_NUMBER_OF_FONTS_KEY: &str =
    "Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I";

/// Builders for the class files used across the test suite.
pub struct ClassBuilder;

impl ClassBuilder {
    /// Internal name of the class built by [`ClassBuilder::session_service`].
    pub const SESSION_SERVICE: &'static str = crate::presets::SESSION_SERVICE;

    /// `demo/FontRenderer` with two static methods.
    ///
    /// ```text
    /// static int render(ByteBuffer font, int enabled)
    ///   0  iload_1
    ///   1  ifeq 9
    ///   4  aload_0                              try {
    ///   5  invokestatic STBTruetype.stbtt_GetNumberOfFonts
    ///   8  ireturn                              }
    ///   9  iconst_0                             frame: same
    ///  10  ireturn
    ///  11  pop                                  catch Throwable, frame: same_locals_1
    ///  12  iconst_m1
    ///  13  ireturn
    ///
    /// static int fontCount()
    ///   0  iconst_1
    ///   1  ireturn
    /// ```
    pub fn render_fixture() -> ClassFile {
        let mut class = ClassFile::new("demo/FontRenderer", Some("java/lang/Object")).unwrap();
        let pool = &mut class.constant_pool;

        let invoke = pool
            .intern_method_ref(
                "org/lwjgl/stb/STBTruetype",
                "stbtt_GetNumberOfFonts",
                "(Ljava/nio/ByteBuffer;)I",
            )
            .unwrap();
        let throwable = pool.intern_class("java/lang/Throwable").unwrap();
        let [invoke_hi, invoke_lo] = invoke.to_be_bytes();
        let [throwable_hi, throwable_lo] = throwable.to_be_bytes();

        let line_numbers = Attribute {
            name_index: pool.intern_utf8("LineNumberTable").unwrap(),
            data: vec![0, 2, 0, 0, 0, 10, 0, 4, 0, 11],
        };
        let stack_map = Attribute {
            name_index: pool.intern_utf8("StackMapTable").unwrap(),
            data: vec![0, 2, 9, 65, 7, throwable_hi, throwable_lo],
        };

        let render = CodeAttribute {
            max_stack: 1,
            max_locals: 2,
            code: vec![
                opcodes::ILOAD_0 + 1,
                opcodes::IFEQ,
                0x00,
                0x08,
                opcodes::ALOAD_0,
                opcodes::INVOKESTATIC,
                invoke_hi,
                invoke_lo,
                opcodes::IRETURN,
                opcodes::ICONST_0,
                opcodes::IRETURN,
                opcodes::POP,
                opcodes::ICONST_M1,
                opcodes::IRETURN,
            ],
            exception_table: vec![ExceptionEntry {
                start_pc: 4,
                end_pc: 8,
                handler_pc: 11,
                catch_type: throwable,
            }],
            attributes: vec![line_numbers, stack_map],
        };
        let font_count = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            code: vec![opcodes::ICONST_1, opcodes::IRETURN],
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        let flags = AccessFlags::PUBLIC | AccessFlags::STATIC;
        class
            .add_method(flags, "render", "(Ljava/nio/ByteBuffer;I)I", Some(&render))
            .unwrap();
        class
            .add_method(flags, "fontCount", "()I", Some(&font_count))
            .unwrap();
        class
    }

    /// The authlib session service shape: an instance `joinServer` with parameter metadata,
    /// a native `getKeyPair` and an abstract `isAllowed`.
    pub fn session_service() -> ClassFile {
        let mut class = ClassFile::new(Self::SESSION_SERVICE, Some("java/lang/Object")).unwrap();
        class.access_flags |= AccessFlags::ABSTRACT;

        let join = CodeAttribute {
            max_stack: 1,
            max_locals: 4,
            code: vec![opcodes::ALOAD_0 + 1, opcodes::POP, opcodes::RETURN],
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        let index = class
            .add_method(
                AccessFlags::PUBLIC,
                "joinServer",
                "(Lcom/mojang/authlib/GameProfile;Ljava/lang/String;Ljava/lang/String;)V",
                Some(&join),
            )
            .unwrap();
        let parameters = Attribute {
            name_index: class.constant_pool.intern_utf8("MethodParameters").unwrap(),
            data: vec![3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        };
        class.methods[index].attributes.push(parameters);

        class
            .add_method(
                AccessFlags::PUBLIC | AccessFlags::NATIVE,
                "getKeyPair",
                "()Ljava/security/KeyPair;",
                None,
            )
            .unwrap();
        class
            .add_method(
                AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
                "isAllowed",
                "()Z",
                None,
            )
            .unwrap();
        class
    }

    /// `name extends StructBuffer<element, name>`, with the generic signature attribute.
    pub fn struct_buffer_subclass(name: &str, element: &str) -> ClassFile {
        let base = "org/lwjgl/system/StructBuffer";
        let mut class = ClassFile::new(name, Some(base)).unwrap();
        class
            .set_signature(&format!("L{base}<L{element};L{name};>;"))
            .unwrap();
        class
    }
}

enum Payload {
    Text(Vec<u8>),
    Raw { offset: u16, length: u16 },
}

/// Builds minimal sfnt fonts: a `head` placeholder and a `name` table.
pub struct FontBuilder {
    records: Vec<(u16, u16, u16, u16, Payload)>,
}

impl FontBuilder {
    pub fn new() -> Self {
        FontBuilder {
            records: Vec::new(),
        }
    }

    /// A record whose text is encoded for its platform (UTF-16BE on 0 and 3, Latin-1 else).
    pub fn record(
        mut self,
        platform: u16,
        encoding: u16,
        language: u16,
        name: u16,
        text: &str,
    ) -> Self {
        let data = match platform {
            0 | 3 => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            _ => text.chars().map(|c| c as u8).collect(),
        };
        self.records
            .push((platform, encoding, language, name, Payload::Text(data)));
        self
    }

    /// A record with an explicit storage offset and length and no payload of its own.
    pub fn raw_record(
        mut self,
        platform: u16,
        encoding: u16,
        language: u16,
        name: u16,
        offset: u16,
        length: u16,
    ) -> Self {
        self.records.push((
            platform,
            encoding,
            language,
            name,
            Payload::Raw { offset, length },
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let count = self.records.len() as u16;
        let mut records = Vec::new();
        let mut storage = Vec::new();
        for (platform, encoding, language, name, payload) in &self.records {
            let (offset, length) = match payload {
                Payload::Text(data) => {
                    let offset = storage.len() as u16;
                    storage.extend_from_slice(data);
                    (offset, data.len() as u16)
                }
                Payload::Raw { offset, length } => (*offset, *length),
            };
            for value in [*platform, *encoding, *language, *name, length, offset] {
                records.extend_from_slice(&value.to_be_bytes());
            }
        }

        let mut name_table = Vec::new();
        name_table.extend_from_slice(&0_u16.to_be_bytes());
        name_table.extend_from_slice(&count.to_be_bytes());
        name_table.extend_from_slice(&(6 + 12 * count).to_be_bytes());
        name_table.extend_from_slice(&records);
        name_table.extend_from_slice(&storage);

        let head_offset: u32 = 12 + 2 * 16;
        let name_offset = head_offset + 4;

        let mut font = Vec::new();
        font.extend_from_slice(&0x0001_0000_u32.to_be_bytes());
        font.extend_from_slice(&2_u16.to_be_bytes());
        font.extend_from_slice(&[0, 32, 0, 1, 0, 0]);
        for (tag, offset, length) in [
            (b"head", head_offset, 4),
            (b"name", name_offset, name_table.len() as u32),
        ] {
            font.extend_from_slice(tag);
            font.extend_from_slice(&0_u32.to_be_bytes());
            font.extend_from_slice(&offset.to_be_bytes());
            font.extend_from_slice(&length.to_be_bytes());
        }
        font.extend_from_slice(&[0; 4]);
        font.extend_from_slice(&name_table);
        font
    }
}
