//! Prompt text for the outline conversation.

/// First message of every session.
pub const INITIAL_REQUEST: &str =
    "以下の情報をもとにして、顧客ペルソナへの認知を目的としたブログ記事のアウトラインを作成して。";

/// Heading placed above reviewer feedback carried into a redraft.
const FEEDBACK_HEADING: &str = "# レビュアーからのフィードバック";

/// Instruction appended (transiently) to the history for each draft.
pub fn drafting_instruction(target_keyword: &str) -> String {
    format!(
        "# 指定キーワード\n\
         {target_keyword}\n\
         \n\
         # 定義\n\
         あなたはBtoB領域に特化した優秀なSEOライターです。\n\
         \n\
         # 指示\n\
         ここまでの情報をもとにして、指定キーワードで検索順位上位を獲得するためのブログ記事のアウトラインを作成してください。\n\
         ## 補足情報\n\
         - アウトラインを作成する際は、ペルソナが抱えているであろう課題や疑問に焦点を当ててください。\n\
         - 記事内での比率は、ペルソナの課題や疑問に対する解決策が70%、自社プロダクトが30%程度となるよう記載してください。\n\
         - ペルソナが抱えている課題や疑問に対して、自社のサービス・プロダクトがどのように解決できるかを明確に示してください。\n\
         - 記事のタイトルは、ペルソナが検索するであろうキーワードを含むものにしてください。\n\
         - 記事の内容は、与えられている情報をすべて活用しようとせず、ペルソナが抱えている課題や疑問の解消を第一の目的としてください。\n"
    )
}

/// Reviewer comments to take into account on the next draft.
pub fn feedback_message(feedback: &str) -> String {
    format!(
        "{FEEDBACK_HEADING}\n{}\n上記のフィードバックを反映して、アウトラインを作り直してください。",
        feedback.trim()
    )
}

/// Heading placed above the keyword volume table.
pub fn keyword_table_message(table: &str) -> String {
    format!("# キーワードボリューム\n{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_keyword() {
        let prompt = drafting_instruction("btob デジタル マーケティング");
        assert!(prompt.starts_with("# 指定キーワード\nbtob デジタル マーケティング\n"));
        assert!(prompt.contains("70%"));
        assert!(prompt.contains("SEOライター"));
    }

    #[test]
    fn feedback_is_trimmed() {
        let msg = feedback_message("  見出しを減らして \n");
        assert!(msg.contains("\n見出しを減らして\n"));
        assert!(msg.starts_with(FEEDBACK_HEADING));
    }
}
