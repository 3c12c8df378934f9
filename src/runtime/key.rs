//! Call-site signature keys.

use std::{fmt, sync::Arc};

use crate::{classfile::descriptor::MethodDescriptor, Error, Result};

/// The string identifying one method overload: `L<owner>;<name><descriptor>`.
///
/// The same key is used when registering a redirection, when rewriting call sites and when the
/// dispatcher looks the handler up, e.g.
/// `Lorg/lwjgl/stb/STBTruetype;stbtt_GetNumberOfFonts(Ljava/nio/ByteBuffer;)I`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureKey(Arc<str>);

impl SignatureKey {
    /// Build the key for `owner.name descriptor`.
    #[must_use]
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        SignatureKey(format!("L{owner};{name}{descriptor}").into())
    }

    /// Parse and validate a key.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the text is not of the form
    /// `L<owner>;<name>(<params>)<ret>` with a valid method descriptor.
    pub fn parse(key: &str) -> Result<Self> {
        let parsed = SignatureKey::from(key);
        parsed.parts()?;
        Ok(parsed)
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key into owner, method name and descriptor.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the key is not well formed.
    pub fn parts(&self) -> Result<(&str, &str, &str)> {
        let invalid = || Error::InvalidDescriptor(self.0.to_string());

        let rest = self.0.strip_prefix('L').ok_or_else(invalid)?;
        let (owner, member) = rest.split_once(';').ok_or_else(invalid)?;
        let paren = member.find('(').ok_or_else(invalid)?;
        let (name, descriptor) = member.split_at(paren);
        if owner.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        MethodDescriptor::parse(descriptor).map_err(|_| invalid())?;

        Ok((owner, name, descriptor))
    }

    /// The parsed method descriptor part of the key.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the key is not well formed.
    pub fn descriptor(&self) -> Result<MethodDescriptor> {
        let (_, _, descriptor) = self.parts()?;
        MethodDescriptor::parse(descriptor)
    }
}

impl From<&str> for SignatureKey {
    fn from(key: &str) -> Self {
        SignatureKey(key.into())
    }
}

impl fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
