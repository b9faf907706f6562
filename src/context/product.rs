//! Product / service profile lookup.

use serde::Deserialize;

use crate::error::ContextError;

use super::table::CsvTable;
use super::{ContextKeys, ContextProvider};

/// A row of the products table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub site_id: String,
    pub product_id: Option<i64>,
    pub appeal_policy: String,
    pub product_introduction: String,
    pub functionality: String,
    pub feature_1: String,
    pub feature_2: String,
    pub feature_3: String,
    pub competitive_point: String,
    pub problem_and_solution_1: String,
    pub problem_and_solution_2: String,
    pub problem_and_solution_3: String,
    pub industry_pain_points: String,
    pub target_approach_to_pain: String,
    pub service_record: String,
    pub client_partners: String,
    pub credentials: String,
    pub organization_size: String,
    pub external_review: String,
    pub price_advantage: String,
    pub support_system: String,
    pub faq: String,
}

impl ProductRecord {
    pub fn to_block(&self) -> String {
        let lines = [
            ("アピールポイント", self.appeal_policy.clone()),
            ("製品紹介", self.product_introduction.clone()),
            ("機能", self.functionality.clone()),
            (
                "特徴",
                [&self.feature_1, &self.feature_2, &self.feature_3]
                    .map(String::as_str)
                    .join(", "),
            ),
            ("競争優位性", self.competitive_point.clone()),
            (
                "課題と解決策",
                [
                    &self.problem_and_solution_1,
                    &self.problem_and_solution_2,
                    &self.problem_and_solution_3,
                ]
                .map(String::as_str)
                .join(", "),
            ),
            ("業界のペインポイント", self.industry_pain_points.clone()),
            ("ペインに対するアプローチ", self.target_approach_to_pain.clone()),
            ("導入実績", self.service_record.clone()),
            ("クライアント・パートナー", self.client_partners.clone()),
            ("認証・実績", self.credentials.clone()),
            ("組織規模", self.organization_size.clone()),
            ("外部レビュー", self.external_review.clone()),
            ("価格の優位性", self.price_advantage.clone()),
            ("サポート体制", self.support_system.clone()),
            ("FAQ", self.faq.clone()),
        ];

        let mut block = String::from("# 自社プロダクトの情報\n");
        for (label, value) in lines {
            block.push_str(&format!("{label}: {value}\n"));
        }
        block.push_str("自社プロダクトのクエリ結果は以上です。\n");
        block
    }
}

/// Looks up the product by (site, product).
pub struct ProductProvider {
    table: CsvTable<ProductRecord>,
}

impl ProductProvider {
    pub fn new(table: CsvTable<ProductRecord>) -> Self {
        Self { table }
    }

    pub fn find(&self, keys: &ContextKeys) -> Result<Option<ProductRecord>, ContextError> {
        self.table.find_first(|r| {
            r.site_id == keys.site_id && r.product_id == Some(keys.product_id)
        })
    }
}

impl ContextProvider for ProductProvider {
    fn name(&self) -> &'static str {
        "product"
    }

    fn lookup(&self, keys: &ContextKeys) -> Result<Option<String>, ContextError> {
        Ok(self.find(keys)?.map(|r| r.to_block()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_joins_features_and_solutions() {
        let record = ProductRecord {
            site_id: "s".into(),
            product_id: Some(1),
            feature_1: "速い".into(),
            feature_2: "安い".into(),
            feature_3: "簡単".into(),
            problem_and_solution_1: "A".into(),
            problem_and_solution_2: "B".into(),
            problem_and_solution_3: "C".into(),
            faq: "よくある質問".into(),
            ..Default::default()
        };
        let block = record.to_block();
        assert!(block.starts_with("# 自社プロダクトの情報\n"));
        assert!(block.contains("特徴: 速い, 安い, 簡単\n"));
        assert!(block.contains("課題と解決策: A, B, C\n"));
        assert!(block.contains("FAQ: よくある質問\n"));
        assert!(block.ends_with("自社プロダクトのクエリ結果は以上です。\n"));
    }
}
