// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # classweave
//!
//! Load-time patching of compiled JVM modules for hosts that must run without the native
//! libraries, display or online services they were built against.
//!
//! The crate edits class files structurally, without source access, and provides the
//! runtime half that rewritten code calls into:
//!
//! - **Rewriting** ([`rewriter`]) - replace whole method bodies by constant returns, or route
//!   chosen call sites through a single static dispatcher, keeping exception ranges, line
//!   numbers, local variables and stack map frames attached to their instructions.
//! - **Dispatch** ([`runtime`]) - a process-wide, thread-safe table from call-site signature
//!   to handler, with results adapted to the call site's declared return type.
//! - **Type recovery** ([`typeres`]) - a memoized resolver that recovers an erased generic
//!   parameter from a subtype's generic ancestry.
//! - **Binary tables** ([`nametable`]) - a bounds-checked parser for the sfnt `name` table,
//!   used to answer font queries without the native font library.
//! - **Orchestration** ([`matcher`], [`transform`], [`pipeline`]) - select artifacts and
//!   entries, run the configured transformers and report what changed.
//!
//! Ready-made configurations live in [`presets`] and [`redirections`]; nothing is applied
//! unless a caller asks for it.
//!
//! ## Quick Start
//!
//! ```rust
//! use classweave::prelude::*;
//!
//! let pipeline = PipelineBuilder::new(Features::NO_AUTH)
//!     .with(Features::NO_AUTH, presets::offline_session())
//!     .build();
//!
//! let mut artifact = Artifact::new("libraries/authlib-6.0.54.jar", Vec::new());
//! let report = pipeline.run(&mut artifact);
//! assert!(report.is_untouched());
//! ```
//!
//! ### Redirecting calls
//!
//! ```rust
//! use classweave::prelude::*;
//!
//! let registry = RedirectionRegistry::new();
//! let key = SignatureKey::parse(
//!     "Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I",
//! )?;
//! registry.redirect(key.clone(), classweave::runtime::constant(1));
//!
//! let ret = ReturnType::parse("I")?;
//! assert_eq!(registry.dispatch(&Value::Null, &key, &ret, &[])?, Value::Int(1));
//! # Ok::<(), classweave::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never installs a
//! logger: applied patches at `info`, contained failures at `warn`, cache and registry
//! activity at `debug`.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use classweave::prelude::*;
///
/// let matcher = TargetMatcher::any();
/// assert!(matcher.matches(std::path::Path::new("any.jar"), "a/B.class"));
/// ```
pub mod prelude;

/// JVM class file model.
///
/// Parsing and serialization of class files, constant pool editing, descriptors and generic
/// signatures, and the label-based instruction codec the rewriter works on.
///
/// # Examples
///
/// ```rust
/// use classweave::classfile::{AccessFlags, ClassFile};
///
/// let mut class = ClassFile::new("demo/Empty", Some("java/lang/Object"))?;
/// class.add_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "run", "()V", None)?;
///
/// let bytes = class.to_bytes()?;
/// assert_eq!(ClassFile::parse(&bytes)?.name()?, "demo/Empty");
/// # Ok::<(), classweave::Error>(())
/// ```
pub mod classfile;

/// Two-stage artifact and entry selection.
pub mod matcher;

/// The sfnt `name` table parser and the per-font name cache.
pub mod nametable;

/// Feature-gated transformer pipelines over artifacts.
pub mod pipeline;

/// Opt-in transformer configurations.
pub mod presets;

/// Host redirections for font, image and struct buffer calls.
pub mod redirections;

/// Structural method rewriting with failure containment.
pub mod rewriter;

/// The redirection registry, signature keys and the host value model.
pub mod runtime;

/// Transformers: constant returns, resource extraction and call redirection.
pub mod transform;

/// Recovery of erased generic type parameters.
pub mod typeres;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use classweave::{classfile::ClassFile, Result};
///
/// fn class_name(data: &[u8]) -> Result<String> {
///     Ok(ClassFile::parse(data)?.name()?.to_string())
/// }
/// assert!(class_name(&[]).is_err());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `classweave` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use classweave::{classfile::ClassFile, Error};
///
/// match ClassFile::parse(b"\x00\x01\x02\x03") {
///     Ok(_) => println!("Parsed"),
///     Err(Error::NotSupported) => println!("Not a class file"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Bounds-checked big-endian cursor over a byte slice.
///
/// # Example
///
/// ```rust
/// use classweave::Parser;
///
/// let mut parser = Parser::new(&[0xCA, 0xFE, 0xBA, 0xBE]);
/// assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
/// assert!(parser.read_be::<u8>().is_err());
/// # Ok::<(), classweave::Error>(())
/// ```
pub use file::parser::Parser;
