//! ABAP syntax layer for downlift.
//!
//! This crate provides the parsing and analysis surface the downport
//! engine consumes:
//! - Lexer and version-gated statement classifier
//! - Statement/expression trees in a handle-based arena
//! - Object registry with configuration and re-parsing
//! - Scope resolution ("spaghetti scope") with a reference index
//! - Method parameter model

pub mod edit_helper;
pub mod lexer;
pub mod nodes;
pub mod params;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod token;
pub mod types;
pub mod version;

pub use edit_helper::EditHelper;
pub use nodes::{ExpressionKind, NodeRef, StatementKind, StatementNode, SyntaxTree};
pub use params::{ClassDefinition, MethodDefinitions, MethodParameters};
pub use registry::{Object, ParsedFile, Registry, RegistryConfig};
pub use scope::{Reference, ReferenceKind, ResolvedRef, ScopeView, SyntaxLogic, SyntaxResult};
pub use token::Token;
pub use types::{AbapType, IdentifierMeta, TypedIdentifier};
pub use version::AbapVersion;
