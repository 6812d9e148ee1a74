//! PDF permissions according to ISO 32000-1 Table 22

use crate::error::SecurityError;
use bitflags::bitflags;

bitflags! {
    /// User access permission bits of the `/P` entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionBits: u32 {
        /// Print the document (bit 3)
        const PRINT = 1 << 2;
        /// Modify contents (bit 4)
        const MODIFY = 1 << 3;
        /// Copy or extract text and graphics (bit 5)
        const COPY = 1 << 4;
        /// Add or modify annotations (bit 6)
        const ANNOTATE = 1 << 5;
        /// Fill in form fields (bit 9, R3+)
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility (bit 10, R3+)
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        /// Assemble: insert, rotate, delete pages (bit 11, R3+)
        const ASSEMBLE = 1 << 10;
        /// Faithful high resolution printing (bit 12, R3+)
        const PRINT_HIGH_RES = 1 << 11;
    }
}

/// Bits 7-8 and 13-32 are reserved and must be 1
const RESERVED_BITS: u32 = 0xFFFF_F0C0;

/// Printing permission levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PrintPermission {
    None,
    LowResolution,
    #[default]
    HighResolution,
}

/// What a user opening the document with the user password may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Permissions {
    pub print: PrintPermission,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub accessibility: bool,
    pub assemble: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

impl Permissions {
    /// Every operation allowed
    pub fn all() -> Self {
        Self {
            print: PrintPermission::HighResolution,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            accessibility: true,
            assemble: true,
        }
    }

    /// Every operation prohibited
    pub fn none() -> Self {
        Self {
            print: PrintPermission::None,
            modify: false,
            copy: false,
            annotate: false,
            fill_forms: false,
            accessibility: false,
            assemble: false,
        }
    }

    pub fn with_print(mut self, print: PrintPermission) -> Self {
        self.print = print;
        self
    }

    pub fn with_modify(mut self, allow: bool) -> Self {
        self.modify = allow;
        self
    }

    pub fn with_copy(mut self, allow: bool) -> Self {
        self.copy = allow;
        self
    }

    pub fn with_annotate(mut self, allow: bool) -> Self {
        self.annotate = allow;
        self
    }

    pub fn with_fill_forms(mut self, allow: bool) -> Self {
        self.fill_forms = allow;
        self
    }

    pub fn with_accessibility(mut self, allow: bool) -> Self {
        self.accessibility = allow;
        self
    }

    pub fn with_assemble(mut self, allow: bool) -> Self {
        self.assemble = allow;
        self
    }

    /// The closest set `revision` can express. Before revision 3 printing is
    /// low resolution and the finer permissions follow their umbrella bits.
    pub fn fitted_to(self, revision: i64) -> Self {
        if revision >= 3 {
            return self;
        }
        Self {
            print: match self.print {
                PrintPermission::HighResolution => PrintPermission::LowResolution,
                other => other,
            },
            fill_forms: self.annotate,
            accessibility: self.copy,
            assemble: self.modify,
            ..self
        }
    }

    /// Permission bits for a security handler revision.
    ///
    /// Revision 2 only knows the four umbrella bits: form filling, accessibility
    /// extraction and assembly follow annotate, copy and modify, and printing is
    /// never distinguished by resolution.
    pub fn to_bits(&self, revision: i64) -> Result<PermissionBits, SecurityError> {
        if revision < 3 {
            if self.print == PrintPermission::HighResolution {
                return Err(SecurityError::InvalidPermissionSet(
                    "high resolution printing requires revision 3 or later".to_string(),
                ));
            }
            if self.fill_forms != self.annotate {
                return Err(SecurityError::InvalidPermissionSet(
                    "form filling cannot differ from annotating before revision 3".to_string(),
                ));
            }
            if self.accessibility != self.copy {
                return Err(SecurityError::InvalidPermissionSet(
                    "accessibility extraction cannot differ from copying before revision 3"
                        .to_string(),
                ));
            }
            if self.assemble != self.modify {
                return Err(SecurityError::InvalidPermissionSet(
                    "document assembly cannot differ from modifying before revision 3".to_string(),
                ));
            }
        }

        let mut bits = PermissionBits::empty();
        match self.print {
            PrintPermission::None => {}
            PrintPermission::LowResolution => bits |= PermissionBits::PRINT,
            PrintPermission::HighResolution => {
                bits |= PermissionBits::PRINT | PermissionBits::PRINT_HIGH_RES
            }
        }
        bits.set(PermissionBits::MODIFY, self.modify);
        bits.set(PermissionBits::COPY, self.copy);
        bits.set(PermissionBits::ANNOTATE, self.annotate);
        bits.set(PermissionBits::FILL_FORMS, self.fill_forms);
        bits.set(PermissionBits::EXTRACT_ACCESSIBILITY, self.accessibility);
        bits.set(PermissionBits::ASSEMBLE, self.assemble);
        Ok(bits)
    }

    /// The signed `/P` value written to the encryption dictionary
    pub fn to_p_value(&self, revision: i64) -> Result<i32, SecurityError> {
        let bits = self.to_bits(revision)?.bits() | RESERVED_BITS;
        Ok(bits as i32)
    }

    pub fn from_p_value(p: i32, revision: i64) -> Self {
        let bits = PermissionBits::from_bits_truncate(p as u32);
        let print = if !bits.contains(PermissionBits::PRINT) {
            PrintPermission::None
        } else if revision >= 3 && bits.contains(PermissionBits::PRINT_HIGH_RES) {
            PrintPermission::HighResolution
        } else {
            PrintPermission::LowResolution
        };

        let modify = bits.contains(PermissionBits::MODIFY);
        let copy = bits.contains(PermissionBits::COPY);
        let annotate = bits.contains(PermissionBits::ANNOTATE);
        if revision < 3 {
            return Self {
                print,
                modify,
                copy,
                annotate,
                fill_forms: annotate,
                accessibility: copy,
                assemble: modify,
            };
        }

        Self {
            print,
            modify,
            copy,
            annotate,
            fill_forms: bits.contains(PermissionBits::FILL_FORMS),
            accessibility: bits.contains(PermissionBits::EXTRACT_ACCESSIBILITY),
            assemble: bits.contains(PermissionBits::ASSEMBLE),
        }
    }
}
