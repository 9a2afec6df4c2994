//! Routine layouts and resumption points
//!
//! Every eligible routine publishes a static [`RoutineLayout`] describing its
//! call sites and local slots, and an enum of its call sites implementing
//! [`ResumePoint`]. Frames carry the layout's [`RoutineId`] so a replay can
//! tell whether the activation popping a frame is the one that saved it.

use super::values::ValueKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

/// Static description of an eligible routine
#[derive(Debug)]
pub struct RoutineLayout {
    name: &'static str,
    call_sites: u32,
    locals: &'static [ValueKind],
    fingerprint: OnceLock<u64>,
}

impl RoutineLayout {
    pub const fn new(name: &'static str, call_sites: u32, locals: &'static [ValueKind]) -> Self {
        Self {
            name,
            call_sites,
            locals,
            fingerprint: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call_sites(&self) -> u32 {
        self.call_sites
    }

    pub fn locals(&self) -> &'static [ValueKind] {
        self.locals
    }

    /// Digest of name, call-site count and local kinds
    ///
    /// Two layouts that differ in any of these never share a fingerprint,
    /// so a frame saved by an older shape of a routine is rejected on replay.
    pub fn fingerprint(&self) -> u64 {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(self.call_sites.to_le_bytes());
            for kind in self.locals {
                hasher.update([*kind as u8]);
            }
            let digest = hasher.finalize();
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            u64::from_le_bytes(head)
        })
    }

    pub fn id(&self) -> RoutineId {
        RoutineId {
            name: Cow::Borrowed(self.name),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Identity of the routine that saved a frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutineId {
    pub name: Cow<'static, str>,
    pub fingerprint: u64,
}

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:016x}", self.name, self.fingerprint)
    }
}

/// A routine's enumeration of its own call sites
pub trait ResumePoint: Copy + fmt::Debug {
    fn index(self) -> u32;
    fn from_index(index: u32) -> Option<Self>;
}

/// Declare a call-site enum and its [`ResumePoint`] impl
///
/// ```
/// reprise_core::resume_points! {
///     pub enum Site { Fetch, Store }
/// }
/// ```
#[macro_export]
macro_rules! resume_points {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u32)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::engine::ResumePoint for $name {
            fn index(self) -> u32 {
                self as u32
            }

            fn from_index(index: u32) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL.get(index as usize).copied()
            }
        }
    };
}
