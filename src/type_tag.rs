//! Move type string parsing.
//!
//! The ledger reports every object with a fully-qualified type string of the
//! form `address::module::Name` or `address::module::Name<T1, T2, ...>` with
//! arbitrary nesting, plus the bare sentinel `package` for the package object
//! itself. Classification works on the structured form, never on raw string
//! slicing.
//!
//! Addresses stay strings here: this crate only ever meets type strings at
//! the JSON boundary, so there is nothing to gain from a 32-byte
//! representation.

use std::fmt;

use crate::error::DeployError;

/// Pseudo-type the ledger reports for a freshly published package object.
pub const PACKAGE_SENTINEL: &str = "package";

/// Structured form of a fully-qualified on-ledger type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// The `package` sentinel.
    Package,
    /// A struct type, possibly generic.
    Struct(StructTag),
}

/// A struct type: `address::module::Name` with optional type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructTag {
    pub address: String,
    pub module: String,
    pub name: String,
    /// Type arguments in declaration order; empty for non-generic types.
    pub generics: Vec<TypeTag>,
}

impl TypeTag {
    /// Parse a type string. Single forward pass over the input.
    ///
    /// The sentinel is only legal as the whole input; `Display<package>` is
    /// malformed.
    pub fn parse(input: &str) -> Result<Self, DeployError> {
        if input == PACKAGE_SENTINEL {
            return Ok(TypeTag::Package);
        }
        let mut cursor = Cursor::new(input);
        let tag = cursor.parse_struct()?;
        cursor.expect_end()?;
        Ok(TypeTag::Struct(tag))
    }

    pub fn as_struct(&self) -> Option<&StructTag> {
        match self {
            TypeTag::Struct(s) => Some(s),
            TypeTag::Package => None,
        }
    }
}

impl StructTag {
    /// `module::Name` short form used for report labels.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }

    /// First type argument, the inner type of wrapper types like
    /// `0x2::display::Display<T>`.
    pub fn first_generic(&self) -> Option<&TypeTag> {
        self.generics.first()
    }

    /// Exact match against an address/module/name triple. Addresses compare
    /// in canonical form, so `0x2` matches `0x0000...0002`.
    pub fn is(&self, address: &str, module: &str, name: &str) -> bool {
        self.module == module
            && self.name == name
            && canonical_address(&self.address).eq_ignore_ascii_case(canonical_address(address))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Package => f.write_str(PACKAGE_SENTINEL),
            TypeTag::Struct(s) => s.fmt(f),
        }
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.generics.is_empty() {
            f.write_str("<")?;
            for (i, generic) in self.generics.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                generic.fmt(f)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Hex digits of an address with the `0x` prefix and leading zeros removed.
fn canonical_address(address: &str) -> &str {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Forward-only scanner over one type string.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn malformed(&self, reason: &'static str) -> DeployError {
        DeployError::MalformedTypeTag {
            input: self.input.to_string(),
            reason,
        }
    }

    /// `address::module::Name` with optional `<...>` type arguments.
    fn parse_struct(&mut self) -> Result<StructTag, DeployError> {
        let address = self.parse_segment("empty address segment")?;
        self.expect_colons()?;
        let module = self.parse_segment("empty module segment")?;
        self.expect_colons()?;
        let name = self.parse_segment("empty name segment")?;
        let generics = if self.peek() == Some('<') {
            self.parse_generics()?
        } else {
            Vec::new()
        };
        Ok(StructTag {
            address,
            module,
            name,
            generics,
        })
    }

    /// Consume up to the next delimiter; empty segments are malformed.
    fn parse_segment(&mut self, empty_reason: &'static str) -> Result<String, DeployError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ':' | '<' | '>' | ',') {
                break;
            }
            self.bump();
        }
        let segment = &self.input[start..self.pos];
        if segment.is_empty() {
            return Err(self.malformed(empty_reason));
        }
        Ok(segment.to_string())
    }

    fn expect_colons(&mut self) -> Result<(), DeployError> {
        if self.input[self.pos..].starts_with("::") {
            self.pos += 2;
            Ok(())
        } else {
            Err(self.malformed("expected '::'"))
        }
    }

    fn parse_generics(&mut self) -> Result<Vec<TypeTag>, DeployError> {
        self.bump(); // '<'
        let mut args = Vec::new();
        loop {
            args.push(TypeTag::Struct(self.parse_struct()?));
            match self.peek() {
                Some(',') => {
                    self.bump();
                    // canonical form is ", "; a missing space is tolerated
                    if self.peek() == Some(' ') {
                        self.bump();
                    }
                }
                Some('>') => {
                    self.bump();
                    return Ok(args);
                }
                _ => return Err(self.malformed("expected ',' or '>' in type arguments")),
            }
        }
    }

    fn expect_end(&self) -> Result<(), DeployError> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(self.malformed("trailing characters after type"))
        }
    }
}
