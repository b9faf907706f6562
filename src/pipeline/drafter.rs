//! Outline drafter: one LLM call per draft.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

use super::prompts;

/// A draft plus the usage numbers needed for cost tracking.
#[derive(Debug, Clone)]
pub struct Draft {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: Decimal,
}

pub struct OutlineDrafter {
    llm: Arc<dyn LlmProvider>,
}

impl OutlineDrafter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Draft an outline from `history`.
    ///
    /// The keyword instruction is sent with the request but is not part of
    /// `history`; callers append only the returned content.
    pub async fn draft(
        &self,
        history: &[ChatMessage],
        target_keyword: &str,
    ) -> Result<Draft, LlmError> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(prompts::drafting_instruction(
            target_keyword,
        )));

        let response = self.llm.complete(CompletionRequest::new(messages)).await?;

        if response.content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty completion".to_string(),
            });
        }
        tracing::debug!(
            response_id = response.response_id.as_deref().unwrap_or("-"),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Outline completion received"
        );
        if response.finish_reason == FinishReason::Length {
            tracing::warn!(
                output_tokens = response.output_tokens,
                "Outline was cut off at the token limit"
            );
        }

        let cost = self
            .llm
            .estimate_cost(response.input_tokens, response.output_tokens);
        Ok(Draft {
            content: response.content,
            model: self.llm.model_name().to_string(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::llm::CompletionResponse;

    struct EchoLlm {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (dec!(0.001), dec!(0.002))
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request.messages);
            Ok(CompletionResponse {
                content: self.reply.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn echo(reply: &str) -> Arc<EchoLlm> {
        Arc::new(EchoLlm {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn instruction_is_sent_but_not_kept() {
        let llm = echo("# タイトル");
        let drafter = OutlineDrafter::new(llm.clone());
        let history = vec![ChatMessage::user("context")];

        let draft = drafter.draft(&history, "btob").await.unwrap();
        assert_eq!(draft.content, "# タイトル");
        assert_eq!(draft.cost, dec!(0.02));
        assert_eq!(history.len(), 1);

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert!(seen[0][1].content.contains("btob"));
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let drafter = OutlineDrafter::new(echo("  \n"));
        let result = drafter.draft(&[], "kw").await;
        assert!(matches!(result, Err(LlmError::InvalidResponse { .. })));
    }
}
