//! downlift: an ABAP version-downporting engine.
//!
//! Given sources configured for an older language version, the engine
//! reparses them under the newest grammar, pairs the two statement
//! trees, and rewrites newer-syntax constructs (inline declarations,
//! constructor expressions, modern SQL, `NEW`, table expressions, ...)
//! into equivalent old-syntax form, emitting one textual edit plus a
//! diagnostic per rewrite. The caller applies edits, re-parses, and
//! repeats until no rule fires.

pub mod engine;
pub mod error;
pub mod harness;
pub mod report;
pub mod rules;
pub mod select;

pub use engine::{Downport, DownportConf, RuleMetadata};
pub use error::{EngineError, ReconstructionError};
