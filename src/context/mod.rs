//! Context providers: company, product, and persona background blocks.
//!
//! Each provider reads one CSV table from the data directory, filters it by
//! the session's identifiers, and renders the first matching row as a text
//! block for the drafting conversation. A lookup with no match renders as
//! [`NOT_FOUND`]; only unreadable tables are errors.

pub mod company;
pub mod persona;
pub mod product;
pub mod table;

pub use company::{CompanyProvider, CompanyRecord};
pub use persona::{PersonaProvider, PersonaRecord};
pub use product::{ProductProvider, ProductRecord};
pub use table::CsvTable;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Text recorded in the conversation when a lookup matches no row.
pub const NOT_FOUND: &str = "No matching records found.";

/// Identifier tuple a session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextKeys {
    pub site_id: String,
    pub company_id: i64,
    pub product_id: i64,
    pub persona_id: i64,
}

/// A background lookup feeding the drafting conversation.
pub trait ContextProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The formatted block for the matching row, or `None` when nothing matches.
    fn lookup(&self, keys: &ContextKeys) -> Result<Option<String>, ContextError>;

    /// The block to append to the conversation: the formatted row or [`NOT_FOUND`].
    fn render(&self, keys: &ContextKeys) -> Result<String, ContextError> {
        Ok(self
            .lookup(keys)?
            .unwrap_or_else(|| NOT_FOUND.to_string()))
    }
}

/// File names of the three tables inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub companies: String,
    pub products: String,
    pub personas: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            companies: "aibow_customerTable - companies.csv".to_string(),
            products: "aibow_customerTable - products.csv".to_string(),
            personas: "aibow_customerTable - customerpersonas.csv".to_string(),
        }
    }
}

/// The standard providers in pipeline order: company, product, persona.
pub fn default_providers(data_dir: &Path, names: &TableNames) -> Vec<Arc<dyn ContextProvider>> {
    vec![
        Arc::new(CompanyProvider::new(CsvTable::new(
            data_dir.join(&names.companies),
        ))),
        Arc::new(ProductProvider::new(CsvTable::new(
            data_dir.join(&names.products),
        ))),
        Arc::new(PersonaProvider::new(CsvTable::new(
            data_dir.join(&names.personas),
        ))),
    ]
}
