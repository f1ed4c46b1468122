//! Token-aware constructors for [`Edit`]s against parsed files.

use downlift_core::{Edit, Position};

use crate::registry::ParsedFile;
use crate::token::Token;

/// Builds edits addressed by tokens and positions of a [`ParsedFile`].
pub struct EditHelper;

impl EditHelper {
    pub fn insert_at(file: &ParsedFile, pos: Position, text: impl Into<String>) -> Edit {
        Edit::insert_at(file.filename(), pos, text)
    }

    pub fn delete_range(file: &ParsedFile, start: Position, end: Position) -> Edit {
        Edit::delete_range(file.filename(), start, end)
    }

    pub fn replace_range(
        file: &ParsedFile,
        start: Position,
        end: Position,
        text: impl Into<String>,
    ) -> Edit {
        Edit::replace_range(file.filename(), start, end, text)
    }

    pub fn delete_token(file: &ParsedFile, token: &Token) -> Edit {
        Edit::delete_range(file.filename(), token.start(), token.end())
    }

    pub fn replace_token(file: &ParsedFile, token: &Token, text: impl Into<String>) -> Edit {
        Edit::replace_range(file.filename(), token.start(), token.end(), text)
    }

    pub fn merge(a: Edit, b: Edit) -> Edit {
        Edit::merge(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RegistryConfig};
    use crate::version::AbapVersion;

    #[test]
    fn token_edits_round_trip() {
        let mut reg = Registry::new(RegistryConfig {
            version: AbapVersion::highest(),
            ..RegistryConfig::default()
        });
        reg.add_file("zprog.prog.abap", "TYPES ty TYPE TABLE OF t WITH EMPTY KEY.\n");
        reg.parse();
        let file = &reg.object("zprog").unwrap().files()[0];
        let statements = file.statements();
        let stmt = &statements[0];
        let token = stmt.find_direct_token_by_text("EMPTY");
        // EMPTY sits inside the TypeTable expression, not as a direct token
        assert!(token.is_none());
        let tokens = stmt.tokens();
        let empty = tokens.iter().find(|t| t.is("EMPTY")).unwrap();
        let edit = EditHelper::replace_token(file, empty, "DEFAULT");
        let out = edit.apply_to(file.filename(), file.source()).unwrap();
        assert_eq!(out, "TYPES ty TYPE TABLE OF t WITH DEFAULT KEY.\n");
    }
}
