//! Remote object key derivation.

use crate::services::classify::Orientation;
use rand::{RngCore, rngs::OsRng};
use std::fmt;

/// Extension of the container every published object is remuxed into.
pub const CONTAINER_EXTENSION: &str = "mp4";

const RANDOM_BYTES: usize = 32;

/// `{orientation}/{64 hex chars}.mp4`.
///
/// Uniqueness rests on 256 bits of OS randomness; there is no collision
/// check against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn generate(orientation: Orientation) -> Result<Self, rand::Error> {
        let mut bytes = [0u8; RANDOM_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(format!(
            "{}/{}.{}",
            orientation.prefix(),
            hex::encode(bytes),
            CONTAINER_EXTENSION
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
