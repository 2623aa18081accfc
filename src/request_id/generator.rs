//! Id generators.
//!
//! A generator is any zero-argument function returning a fresh id. The two
//! built-ins are selectable by name from the config file via [`GeneratorKind`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shared id generator. Called at most once per request, and only when the
/// caller supplied no id.
pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Random UUID v4 in hyphenated lowercase form, e.g.
/// `9b2c1e1a-7f3d-4c55-a0d2-5e8f0b6a1c3d`.
pub fn uuid_v4() -> String {
    Uuid::new_v4().to_string()
}

/// Random UUID v4 without hyphens (32 lowercase hex digits).
pub fn uuid_simple() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Built-in generator selectable from config.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    #[default]
    UuidV4,
    UuidSimple,
}

impl GeneratorKind {
    pub fn generator(self) -> Generator {
        match self {
            Self::UuidV4 => Arc::new(uuid_v4),
            Self::UuidSimple => Arc::new(uuid_simple),
        }
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UuidV4 => "uuid_v4",
            Self::UuidSimple => "uuid_simple",
        })
    }
}
