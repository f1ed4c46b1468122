//! Object registry: files, dependency classification, configuration.
//!
//! A [`Registry`] owns the raw sources of a program plus the active
//! configuration and, after [`parse`](Registry::parse), the per-file
//! statement trees grouped into objects. Files are grouped by the object
//! name encoded in the filename (`zcl_foo.clas.abap` → `ZCL_FOO`).
//!
//! The downport harness builds a second registry from the same file set
//! at the highest grammar version via [`Registry::clone_for_version`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lexer::lex;
use crate::nodes::{StatementNode, SyntaxTree};
use crate::parser::parse_statements;
use crate::version::AbapVersion;

/// Active analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Target grammar version.
    pub version: AbapVersion,
    /// Names matching this pattern must resolve; everything else is void.
    pub error_namespace: String,
    /// Globally defined constants, visible in every scope.
    pub global_constants: Vec<String>,
    /// Globally defined macros, skipped during parsing.
    pub global_macros: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            version: AbapVersion::default(),
            error_namespace: "^(Z|Y|LCL_|TY_|LIF_)".to_string(),
            global_constants: Vec::new(),
            global_macros: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// True when an unresolvable `name` is an error rather than void.
    pub fn in_error_namespace(&self, name: &str) -> bool {
        match Regex::new(&self.error_namespace) {
            Ok(re) => re.is_match(&name.to_uppercase()),
            Err(_) => true,
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    filename: String,
    source: String,
    tree: SyntaxTree,
}

impl ParsedFile {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn statements(&self) -> Vec<StatementNode<'_>> {
        self.tree.statements().collect()
    }
}

/// A named object: one or more files sharing an object name.
#[derive(Debug, Clone)]
pub struct Object {
    name: String,
    dependency: bool,
    files: Vec<ParsedFile>,
}

impl Object {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dependency(&self) -> bool {
        self.dependency
    }

    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    pub fn file_by_name(&self, filename: &str) -> Option<&ParsedFile> {
        self.files.iter().find(|f| f.filename == filename)
    }
}

#[derive(Debug, Clone)]
struct RegistryFile {
    filename: String,
    source: String,
    dependency: bool,
}

/// Registry of objects and files plus the active configuration.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    config: RegistryConfig,
    files: Vec<RegistryFile>,
    objects: BTreeMap<String, Object>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Registry {
            config,
            files: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Add a primary (analyzed) file.
    pub fn add_file(&mut self, filename: impl Into<String>, source: impl Into<String>) {
        self.files.push(RegistryFile {
            filename: filename.into(),
            source: source.into(),
            dependency: false,
        });
    }

    /// Add a dependency file: parsed and visible to scope resolution, but
    /// never analyzed itself.
    pub fn add_dependency(&mut self, filename: impl Into<String>, source: impl Into<String>) {
        self.files.push(RegistryFile {
            filename: filename.into(),
            source: source.into(),
            dependency: true,
        });
    }

    /// Object name encoded in a filename: the stem before the first dot,
    /// upper-cased.
    pub fn object_name(filename: &str) -> String {
        let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        base.split('.').next().unwrap_or(base).to_uppercase()
    }

    /// (Re)parse every file at the configured version.
    pub fn parse(&mut self) {
        self.objects.clear();
        for file in &self.files {
            let raw = lex(&file.source);
            let tree = parse_statements(&raw, self.config.version);
            let name = Self::object_name(&file.filename);
            let entry = self.objects.entry(name.clone()).or_insert_with(|| Object {
                name,
                dependency: file.dependency,
                files: Vec::new(),
            });
            entry.dependency = entry.dependency && file.dependency;
            entry.files.push(ParsedFile {
                filename: file.filename.clone(),
                source: file.source.clone(),
                tree,
            });
        }
        tracing::debug!(
            objects = self.objects.len(),
            version = %self.config.version,
            "registry parsed"
        );
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.get(&name.to_uppercase())
    }

    /// Build a fresh registry over the same file set at a different
    /// version, preserving dependency classification and the namespace /
    /// constant / macro settings. The result is unparsed; callers invoke
    /// [`parse`](Registry::parse).
    pub fn clone_for_version(&self, version: AbapVersion) -> Registry {
        let config = RegistryConfig {
            version,
            error_namespace: self.config.error_namespace.clone(),
            global_constants: self.config.global_constants.clone(),
            global_macros: self.config.global_macros.clone(),
        };
        let mut out = Registry::new(config);
        out.files = self.files.clone();
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::StatementKind;

    #[test]
    fn object_name_from_filename() {
        assert_eq!(Registry::object_name("zcl_foo.clas.abap"), "ZCL_FOO");
        assert_eq!(Registry::object_name("dir/zprog.prog.abap"), "ZPROG");
    }

    #[test]
    fn parse_groups_files_into_objects() {
        let mut reg = Registry::new(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
        reg.add_file("zprog.prog.abap", "DATA x TYPE i.\nx = 1.\n");
        reg.add_dependency("cl_dep.clas.abap", "CLASS cl_dep DEFINITION.\nENDCLASS.\n");
        reg.parse();

        let prog = reg.object("zprog").unwrap();
        assert!(!prog.is_dependency());
        assert_eq!(prog.files().len(), 1);
        assert_eq!(prog.files()[0].statements().len(), 2);

        let dep = reg.object("CL_DEP").unwrap();
        assert!(dep.is_dependency());
    }

    #[test]
    fn clone_for_version_reparses_differently() {
        let mut low = Registry::new(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
        low.add_file("zprog.prog.abap", "DATA(x) = 1.\n");
        low.parse();
        assert_eq!(
            low.object("zprog").unwrap().files()[0].statements()[0].kind(),
            StatementKind::Unknown
        );

        let mut high = low.clone_for_version(AbapVersion::highest());
        high.parse();
        assert_eq!(
            high.object("zprog").unwrap().files()[0].statements()[0].kind(),
            StatementKind::Move
        );
        assert!(!high.object("zprog").unwrap().is_dependency());
    }

    #[test]
    fn error_namespace_matching() {
        let config = RegistryConfig::default();
        assert!(config.in_error_namespace("zcl_mine"));
        assert!(config.in_error_namespace("lcl_helper"));
        assert!(!config.in_error_namespace("cl_abap_typedescr"));
    }
}
