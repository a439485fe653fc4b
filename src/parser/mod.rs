//! Parser selection by import type and file type

pub mod generic;

pub use generic::*;

use crate::traits::*;
use crate::types::*;

/// Registry key of the generic parser
pub const GENERIC_CSVXLS_SO: &str = "generic_csvxls_so";

/// Builds a parser for one file type, or rejects the type
pub type ParserFactory =
    Box<dyn Fn(FileType) -> ImportResult<Box<dyn StatementParser>> + Send + Sync>;

struct RegisteredParser {
    key: String,
    label: String,
    factory: ParserFactory,
}

/// Parsers available to profiles, keyed by import type
pub struct ParserRegistry {
    parsers: Vec<RegisteredParser>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser, replacing any parser with the same key
    pub fn register<F>(&mut self, key: &str, label: &str, factory: F)
    where
        F: Fn(FileType) -> ImportResult<Box<dyn StatementParser>> + Send + Sync + 'static,
    {
        let entry = RegisteredParser {
            key: key.to_string(),
            label: label.to_string(),
            factory: Box::new(factory),
        };
        match self.parsers.iter_mut().find(|p| p.key == key) {
            Some(existing) => *existing = entry,
            None => self.parsers.push(entry),
        }
    }

    /// Import types a profile can choose from, as (key, label) pairs
    pub fn import_types(&self) -> Vec<(&str, &str)> {
        self.parsers
            .iter()
            .map(|p| (p.key.as_str(), p.label.as_str()))
            .collect()
    }

    /// Build the parser for a profile's import type and a file type
    pub fn parser_for(
        &self,
        import_type: &str,
        file_type: FileType,
    ) -> ImportResult<Box<dyn StatementParser>> {
        let registered = self
            .parsers
            .iter()
            .find(|p| p.key == import_type)
            .ok_or_else(|| {
                ImportError::Configuration(format!("no parser registered for '{}'", import_type))
            })?;
        (registered.factory)(file_type)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(
            GENERIC_CSVXLS_SO,
            "Generic .csv/.xls based on SO Name",
            |file_type| {
                Ok(Box::new(GenericFileParser::new(file_type)?) as Box<dyn StatementParser>)
            },
        );
        registry
    }
}
