//! Customer persona lookup.

use serde::Deserialize;

use crate::error::ContextError;

use super::table::CsvTable;
use super::{ContextKeys, ContextProvider};

/// A row of the customer personas table.
///
/// Most columns in this sheet are camelCase; the identifiers and
/// `persona_title` are snake_case.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonaRecord {
    #[serde(rename = "site_id")]
    pub site_id: String,
    #[serde(rename = "product_id")]
    pub product_id: Option<i64>,
    #[serde(rename = "persona_id")]
    pub persona_id: Option<i64>,
    pub industry: String,
    pub company_size: String,
    pub employee_size: String,
    pub target_region: String,
    pub existing_clients: String,
    pub customer_price_range: String,
    pub lead_time_to_adoption: String,
    pub service_department: String,
    pub position: String,
    pub role_and_mission: String,
    pub info_methods: String,
    pub selection_criteria: String,
    pub consideration_trigger: String,
    pub business_issues: String,
    pub current_solution_methods: String,
    pub product_knowledge: String,
    #[serde(rename = "persona_title")]
    pub persona_title: String,
    pub age: String,
    pub value: String,
    pub pain: String,
}

impl PersonaRecord {
    pub fn to_block(&self) -> String {
        let lines = [
            ("業界", &self.industry),
            ("企業規模", &self.company_size),
            ("従業員数", &self.employee_size),
            ("ターゲット地域", &self.target_region),
            ("既存クライアント", &self.existing_clients),
            ("顧客の価格帯", &self.customer_price_range),
            ("導入までのリードタイム", &self.lead_time_to_adoption),
            ("サービス部門", &self.service_department),
            ("ポジション", &self.position),
            ("役割とミッション", &self.role_and_mission),
            ("情報収集方法", &self.info_methods),
            ("選定基準", &self.selection_criteria),
            ("検討のきっかけ", &self.consideration_trigger),
            ("ビジネス課題", &self.business_issues),
            ("現在の解決策", &self.current_solution_methods),
            ("プロダクトの知識", &self.product_knowledge),
            ("ペルソナのタイトル", &self.persona_title),
            ("年齢", &self.age),
            ("価値観", &self.value),
            ("ペインポイント", &self.pain),
        ];

        let mut block = String::from("# 顧客ペルソナの情報\n");
        for (label, value) in lines {
            block.push_str(&format!("{label}: {value}\n"));
        }
        block.push_str("顧客ペルソナのクエリ結果は以上です。\n");
        block
    }
}

/// Looks up the persona by (site, product, persona).
pub struct PersonaProvider {
    table: CsvTable<PersonaRecord>,
}

impl PersonaProvider {
    pub fn new(table: CsvTable<PersonaRecord>) -> Self {
        Self { table }
    }

    pub fn find(&self, keys: &ContextKeys) -> Result<Option<PersonaRecord>, ContextError> {
        self.table.find_first(|r| {
            r.site_id == keys.site_id
                && r.product_id == Some(keys.product_id)
                && r.persona_id == Some(keys.persona_id)
        })
    }
}

impl ContextProvider for PersonaProvider {
    fn name(&self) -> &'static str {
        "persona"
    }

    fn lookup(&self, keys: &ContextKeys) -> Result<Option<String>, ContextError> {
        Ok(self.find(keys)?.map(|r| r.to_block()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str = "site_id,product_id,persona_id,industry,companySize,employeeSize,targetRegion,existingClients,customerPriceRange,leadTimeToAdoption,serviceDepartment,position,roleAndMission,infoMethods,selectionCriteria,considerationTrigger,businessIssues,currentSolutionMethods,productKnowledge,persona_title,age,value,pain";

    fn provider(rows: &[&str]) -> (tempfile::NamedTempFile, PersonaProvider) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        let provider = PersonaProvider::new(CsvTable::new(file.path()));
        (file, provider)
    }

    fn keys(product_id: i64, persona_id: i64) -> ContextKeys {
        ContextKeys {
            site_id: "c15000000001".into(),
            company_id: 1,
            product_id,
            persona_id,
        }
    }

    #[test]
    fn maps_camel_case_columns() {
        let (_file, provider) = provider(&[
            "c15000000001,1,1,IT,中堅,300,関東,多数,月額10万,3ヶ月,マーケ部,部長,売上拡大,展示会,費用対効果,リード不足,リード獲得,広告,低,マーケ部長,45,合理性,人手不足",
        ]);
        let record = provider.find(&keys(1, 1)).unwrap().unwrap();
        assert_eq!(record.company_size, "中堅");
        assert_eq!(record.lead_time_to_adoption, "3ヶ月");
        assert_eq!(record.persona_title, "マーケ部長");
        assert_eq!(record.pain, "人手不足");

        let block = provider.render(&keys(1, 1)).unwrap();
        assert!(block.contains("ペルソナのタイトル: マーケ部長\n"));
        assert!(block.contains("企業規模: 中堅\n"));
    }

    #[test]
    fn persona_requires_product_match() {
        let (_file, provider) = provider(&[
            "c15000000001,2,1,IT,,,,,,,,,,,,,,,,,,,",
        ]);
        assert!(provider.find(&keys(1, 1)).unwrap().is_none());
        assert!(provider.find(&keys(2, 1)).unwrap().is_some());
    }
}
