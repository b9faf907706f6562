//! Review gate: shows a draft to a human and collects the verdict.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::error::ReviewError;

/// Question put to the reviewer after each draft.
pub const REVIEW_PROMPT: &str = "出力したアウトラインに満足していますか？（yes/no）:";

/// Something that can accept or reject a draft.
#[async_trait]
pub trait ReviewGate: Send + Sync {
    /// Present `draft` and return the reviewer's raw answer.
    async fn review(&self, draft: &str, revision: u32) -> Result<String, ReviewError>;
}

/// Reads one verdict per line from any buffered reader.
pub struct LineReviewGate<R> {
    lines: Mutex<Lines<R>>,
}

/// The interactive gate used by the CLI.
pub type CliReviewGate = LineReviewGate<BufReader<Stdin>>;

impl<R: AsyncBufRead + Unpin + Send> LineReviewGate<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

impl CliReviewGate {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ReviewGate for LineReviewGate<R> {
    async fn review(&self, draft: &str, revision: u32) -> Result<String, ReviewError> {
        println!("\n{draft}\n");
        eprint!("[draft {revision}] {REVIEW_PROMPT} ");

        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            // The line is passed through untouched; normalisation is up to the verdict policy.
            Some(line) => Ok(line),
            None => Err(ReviewError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_one_line_per_review() {
        let gate = LineReviewGate::new(BufReader::new(&b"no\nyes\n"[..]));
        assert_eq!(gate.review("draft 1", 1).await.unwrap(), "no");
        assert_eq!(gate.review("draft 2", 2).await.unwrap(), "yes");
    }

    #[tokio::test]
    async fn eof_is_closed() {
        let gate = LineReviewGate::new(BufReader::new(&b""[..]));
        assert!(matches!(
            gate.review("draft", 1).await,
            Err(ReviewError::Closed)
        ));
    }

    #[tokio::test]
    async fn answer_is_not_trimmed() {
        let gate = LineReviewGate::new(BufReader::new(&b" Yes \n"[..]));
        assert_eq!(gate.review("draft", 1).await.unwrap(), " Yes ");
    }
}
