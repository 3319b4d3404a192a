//! Record stream decoding.
//!
//! A record line is a kind tag followed by alternating attribute name/value
//! pairs. Decoding happens in two steps:
//!
//! 1. [`parse_raw`] splits the line, maps the tag onto the closed
//!    [`RecordKind`] set and collects the attribute pairs into [`Attrs`].
//! 2. [`Record::decode`] validates the attributes each kind requires and
//!    produces a strongly typed record shape.
//!
//! An unknown tag is reported as [`RecordError::UnknownKind`]; every other
//! failure means the line itself is malformed. Unknown attribute names are
//! ignored so producers can add attributes without breaking older indexers.

mod decode;
mod lexer;

use std::collections::HashMap;

use thiserror::Error;

use crate::extent::Extent;
use crate::ids::{CrateLocalId, CrateNum, LocalId};

pub use decode::{
    CrateRecord, ExternCrateRecord, ExternalCrateRecord, FunctionRecord, ImplRecord,
    InheritanceRecord, MethodDeclRecord, ModuleRecord, Record, RefRecord, Site, TypeRecord,
    UseAliasRecord, VariableRecord,
};
pub use lexer::split_fields;

// ============================================================================
// Errors
// ============================================================================

/// Problems with a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The kind tag is not part of the known record schema.
    #[error("unrecognized record kind '{0}'")]
    UnknownKind(String),

    /// The line has no kind tag.
    #[error("record has no kind tag")]
    Empty,

    /// Field syntax is broken (e.g. an unterminated quote).
    #[error("invalid field syntax at column {column}")]
    Syntax { column: usize },

    /// An attribute name with no value.
    #[error("attribute '{0}' has no value")]
    DanglingAttribute(String),

    /// A required attribute is absent or empty.
    #[error("{kind} record is missing required attribute '{attr}'")]
    MissingAttribute {
        kind: &'static str,
        attr: &'static str,
    },

    /// An integer attribute does not parse.
    #[error("attribute '{attr}' is not a valid integer: '{value}'")]
    InvalidInteger { attr: String, value: String },

    /// An attribute has a value outside its domain.
    #[error("attribute '{attr}' has invalid value '{value}'")]
    InvalidValue { attr: &'static str, value: String },

    /// `extent_end` precedes `extent_start`.
    #[error("extent end {end} precedes start {start}")]
    InvertedExtent { start: u64, end: u64 },

    /// An id names a crate number that no `external_crate` record registered.
    #[error("crate number {num} was never registered")]
    UnknownCrate { num: u32 },

    /// `external_crate` after `end_external_crates`.
    #[error("external crate '{name}' declared after end_external_crates")]
    ExternalCrateAfterEnd { name: String },

    /// A record that needs crate context appeared before the `crate` record.
    #[error("{kind} record appears before the crate record")]
    NoCrateRecord { kind: &'static str },

    /// A second `crate` record in one unit.
    #[error("unit already declared crate '{existing}'")]
    DuplicateCrateRecord { existing: String },
}

// ============================================================================
// Record Kinds
// ============================================================================

/// The closed set of record kinds the producer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Crate,
    ExternalCrate,
    EndExternalCrates,
    Function,
    MethodDecl,
    Variable,
    Struct,
    Trait,
    Typedef,
    Module,
    Impl,
    UseAlias,
    ExternCrate,
    Inheritance,
    FnRef,
    FnCall,
    MethodCall,
    VarRef,
    TypeRef,
    ModRef,
}

impl RecordKind {
    /// Every kind, in schema order.
    pub const ALL: [RecordKind; 20] = [
        RecordKind::Crate,
        RecordKind::ExternalCrate,
        RecordKind::EndExternalCrates,
        RecordKind::Function,
        RecordKind::MethodDecl,
        RecordKind::Variable,
        RecordKind::Struct,
        RecordKind::Trait,
        RecordKind::Typedef,
        RecordKind::Module,
        RecordKind::Impl,
        RecordKind::UseAlias,
        RecordKind::ExternCrate,
        RecordKind::Inheritance,
        RecordKind::FnRef,
        RecordKind::FnCall,
        RecordKind::MethodCall,
        RecordKind::VarRef,
        RecordKind::TypeRef,
        RecordKind::ModRef,
    ];

    /// Map a tag onto a kind. `struct_ref` is accepted as an older spelling
    /// of `type_ref`.
    pub fn from_tag(tag: &str) -> Option<RecordKind> {
        if tag == "struct_ref" {
            return Some(RecordKind::TypeRef);
        }
        RecordKind::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// Canonical tag.
    pub fn tag(&self) -> &'static str {
        match self {
            RecordKind::Crate => "crate",
            RecordKind::ExternalCrate => "external_crate",
            RecordKind::EndExternalCrates => "end_external_crates",
            RecordKind::Function => "function",
            RecordKind::MethodDecl => "method_decl",
            RecordKind::Variable => "variable",
            RecordKind::Struct => "struct",
            RecordKind::Trait => "trait",
            RecordKind::Typedef => "typedef",
            RecordKind::Module => "module",
            RecordKind::Impl => "impl",
            RecordKind::UseAlias => "use_alias",
            RecordKind::ExternCrate => "extern_crate",
            RecordKind::Inheritance => "inheritance",
            RecordKind::FnRef => "fn_ref",
            RecordKind::FnCall => "fn_call",
            RecordKind::MethodCall => "method_call",
            RecordKind::VarRef => "var_ref",
            RecordKind::TypeRef => "type_ref",
            RecordKind::ModRef => "mod_ref",
        }
    }
}

// ============================================================================
// Raw Records and Attributes
// ============================================================================

/// A record after field splitting, before typed validation.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub attrs: Attrs,
}

/// Attribute name/value pairs of one record. Later duplicates win.
#[derive(Debug, Clone, Default)]
pub struct Attrs {
    values: HashMap<String, String>,
}

impl Attrs {
    /// Collect alternating name/value fields.
    pub fn from_fields(fields: impl IntoIterator<Item = String>) -> Result<Attrs, RecordError> {
        let mut values = HashMap::new();
        let mut fields = fields.into_iter();
        while let Some(name) = fields.next() {
            let value = fields
                .next()
                .ok_or_else(|| RecordError::DanglingAttribute(name.clone()))?;
            values.insert(name, value);
        }
        Ok(Attrs { values })
    }

    /// Raw value, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value or the empty string.
    pub fn text(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    /// Value if present and non-empty.
    pub fn opt_text(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Non-empty value or [`RecordError::MissingAttribute`].
    pub fn required_text(
        &self,
        kind: RecordKind,
        name: &'static str,
    ) -> Result<String, RecordError> {
        self.opt_text(name).ok_or(RecordError::MissingAttribute {
            kind: kind.tag(),
            attr: name,
        })
    }

    /// Integer value; absent or empty means `None`.
    pub fn opt_u32(&self, name: &str) -> Result<Option<u32>, RecordError> {
        self.opt_u64(name)?
            .map(|v| {
                u32::try_from(v).map_err(|_| RecordError::InvalidInteger {
                    attr: name.to_string(),
                    value: v.to_string(),
                })
            })
            .transpose()
    }

    /// Wide integer value; absent or empty means `None`.
    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>, RecordError> {
        match self.get(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .map_err(|_| RecordError::InvalidInteger {
                    attr: name.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// Integer value that must be present.
    pub fn required_u32(&self, kind: RecordKind, name: &'static str) -> Result<u32, RecordError> {
        self.opt_u32(name)?.ok_or(RecordError::MissingAttribute {
            kind: kind.tag(),
            attr: name,
        })
    }

    /// Local id; absent means the sentinel.
    pub fn local_id(&self, name: &str) -> Result<LocalId, RecordError> {
        Ok(LocalId::new(self.opt_u32(name)?.unwrap_or(0)))
    }

    /// Id qualified by its companion `<name>crate` attribute.
    pub fn crate_local(&self, name: &str) -> Result<CrateLocalId, RecordError> {
        let id = self.local_id(name)?;
        let krate = self.opt_u32(&format!("{}crate", name))?.unwrap_or(0);
        Ok(CrateLocalId::new(id, CrateNum::new(krate)))
    }

    /// Like [`Attrs::crate_local`], but the id attribute must be present.
    pub fn required_crate_local(
        &self,
        kind: RecordKind,
        name: &'static str,
    ) -> Result<CrateLocalId, RecordError> {
        self.required_u32(kind, name)?;
        self.crate_local(name)
    }

    /// Shared span attributes.
    pub fn site(&self) -> Result<Site, RecordError> {
        let start = self.opt_u64("extent_start")?.unwrap_or(0);
        let end = self.opt_u64("extent_end")?.unwrap_or(start);
        if end < start {
            return Err(RecordError::InvertedExtent { start, end });
        }
        let extent = Extent::new(start, end)
            .with_start_position(
                self.opt_u32("file_line")?.unwrap_or(0),
                self.opt_u32("file_col")?.unwrap_or(0),
            )
            .with_end_position(
                self.opt_u32("file_line_end")?.unwrap_or(0),
                self.opt_u32("file_col_end")?.unwrap_or(0),
            );
        Ok(Site {
            file_name: self.opt_text("file_name"),
            extent,
        })
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Split a line and classify its kind.
pub fn parse_raw(line: &str) -> Result<RawRecord, RecordError> {
    let mut fields = split_fields(line)?.into_iter();
    let tag = fields.next().ok_or(RecordError::Empty)?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(RecordError::Empty);
    }
    let kind = RecordKind::from_tag(tag).ok_or_else(|| RecordError::UnknownKind(tag.to_string()))?;
    let attrs = Attrs::from_fields(fields)?;
    Ok(RawRecord { kind, attrs })
}

/// Parse and decode one line into a typed record.
pub fn parse_record(line: &str) -> Result<Record, RecordError> {
    Record::decode(parse_raw(line)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod kind_tests {
        use super::*;

        #[test]
        fn every_tag_round_trips() {
            for kind in RecordKind::ALL {
                assert_eq!(RecordKind::from_tag(kind.tag()), Some(kind));
            }
        }

        #[test]
        fn struct_ref_is_a_type_ref() {
            assert_eq!(RecordKind::from_tag("struct_ref"), Some(RecordKind::TypeRef));
        }

        #[test]
        fn unknown_tag_is_reported_before_attribute_checks() {
            // Odd attribute count, but the kind error wins.
            let err = parse_raw("closure,id").unwrap_err();
            assert_eq!(err, RecordError::UnknownKind("closure".to_string()));
        }

        #[test]
        fn blank_tag_is_empty() {
            assert_eq!(parse_raw(",id,1").unwrap_err(), RecordError::Empty);
        }
    }

    mod attrs_tests {
        use super::*;

        fn attrs(line: &str) -> Attrs {
            parse_raw(line).unwrap().attrs
        }

        #[test]
        fn dangling_attribute_is_malformed() {
            let err = parse_raw("function,id,1,qualname").unwrap_err();
            assert_eq!(err, RecordError::DanglingAttribute("qualname".to_string()));
        }

        #[test]
        fn missing_optional_integers_are_none() {
            let a = attrs("fn_call,refid,3,declid,");
            assert_eq!(a.opt_u32("declid").unwrap(), None);
            assert_eq!(a.opt_u32("scopeid").unwrap(), None);
            assert_eq!(a.local_id("scopeid").unwrap(), LocalId::SENTINEL);
        }

        #[test]
        fn bad_integer_names_the_attribute() {
            let err = attrs("fn_call,refid,abc").opt_u32("refid").unwrap_err();
            assert_eq!(
                err,
                RecordError::InvalidInteger {
                    attr: "refid".to_string(),
                    value: "abc".to_string()
                }
            );
        }

        #[test]
        fn crate_local_reads_companion_attribute() {
            let a = attrs("fn_call,refid,42,refidcrate,2");
            let id = a.crate_local("refid").unwrap();
            assert_eq!(id.id, LocalId::new(42));
            assert_eq!(id.krate, CrateNum::new(2));
        }

        #[test]
        fn site_reads_positions_and_extent() {
            let a = attrs(
                "var_ref,file_name,src/main.rs,file_line,4,file_col,2,extent_start,30,\
                 file_line_end,4,file_col_end,3,extent_end,31,refid,5",
            );
            let site = a.site().unwrap();
            assert_eq!(site.file_name.as_deref(), Some("src/main.rs"));
            assert_eq!((site.extent.start, site.extent.end), (30, 31));
            assert_eq!((site.extent.line, site.extent.col), (4, 2));
        }

        #[test]
        fn inverted_extent_is_malformed() {
            let err = attrs("var_ref,extent_start,9,extent_end,3").site().unwrap_err();
            assert_eq!(err, RecordError::InvertedExtent { start: 9, end: 3 });
        }

        #[test]
        fn unknown_attributes_are_tolerated() {
            let a = attrs("variable,id,1,name,x,colour,blue");
            assert_eq!(a.get("colour"), Some("blue"));
            assert_eq!(a.text("value"), "");
        }
    }
}
