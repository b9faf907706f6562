//! Company profile lookup.

use serde::Deserialize;

use crate::error::ContextError;

use super::table::CsvTable;
use super::{ContextKeys, ContextProvider};

/// A row of the companies table.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyRecord {
    pub site_id: String,
    /// Blank in padding rows; such rows never match.
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website_url: String,
}

impl CompanyRecord {
    pub fn to_block(&self) -> String {
        let mut block = String::from("# 会社情報\n");
        block.push_str(&format!("会社名: {}\n", self.company_name));
        block.push_str(&format!("業界: {}\n", self.industry));
        block.push_str(&format!("所在地: {}\n", self.location));
        block.push_str(&format!("ウェブサイト: {}\n", self.website_url));
        block.push_str("\n会社情報のクエリ結果は以上です。\n");
        block
    }
}

/// Looks up the company by (site, company).
pub struct CompanyProvider {
    table: CsvTable<CompanyRecord>,
}

impl CompanyProvider {
    pub fn new(table: CsvTable<CompanyRecord>) -> Self {
        Self { table }
    }

    pub fn find(&self, keys: &ContextKeys) -> Result<Option<CompanyRecord>, ContextError> {
        self.table.find_first(|r| {
            r.site_id == keys.site_id && r.company_id == Some(keys.company_id)
        })
    }
}

impl ContextProvider for CompanyProvider {
    fn name(&self) -> &'static str {
        "company"
    }

    fn lookup(&self, keys: &ContextKeys) -> Result<Option<String>, ContextError> {
        Ok(self.find(keys)?.map(|r| r.to_block()))
    }
}
