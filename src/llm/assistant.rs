//! Summarization and question answering as thin callers of [`ChatCompletion`].

use super::{ChatCompletion, ChatRequest, RemoteServiceError};
use crate::config::AiPolicy;
use std::sync::Arc;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes documents concisely.";
const ANSWER_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on provided text.";

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Produces short summaries of extracted document text.
#[derive(Clone)]
pub struct SummarizationClient {
    chat: Arc<dyn ChatCompletion>,
    input_max_chars: usize,
    max_tokens: u32,
}

impl SummarizationClient {
    /// Wrap a chat capability with the summarization caps from `policy`.
    pub fn new(chat: Arc<dyn ChatCompletion>, policy: &AiPolicy) -> Self {
        Self {
            chat,
            input_max_chars: policy.input_max_chars,
            max_tokens: policy.summary_max_tokens,
        }
    }

    /// Summarize `text`, truncated to the configured input length.
    pub async fn summarize(&self, text: &str) -> Result<String, RemoteServiceError> {
        let excerpt = truncate_chars(text, self.input_max_chars);
        self.chat
            .complete(ChatRequest {
                system_prompt: SUMMARY_SYSTEM_PROMPT.to_string(),
                user_content: format!("Summarize the following document content:\n\n{excerpt}"),
                max_tokens: self.max_tokens,
            })
            .await
    }
}

/// Answers questions using only the supplied document text.
#[derive(Clone)]
pub struct QuestionAnsweringClient {
    chat: Arc<dyn ChatCompletion>,
    input_max_chars: usize,
    max_tokens: u32,
}

impl QuestionAnsweringClient {
    /// Wrap a chat capability with the Q&A caps from `policy`.
    pub fn new(chat: Arc<dyn ChatCompletion>, policy: &AiPolicy) -> Self {
        Self {
            chat,
            input_max_chars: policy.input_max_chars,
            max_tokens: policy.answer_max_tokens,
        }
    }

    /// Answer `question` from `text`, truncated to the configured input length.
    pub async fn answer(&self, text: &str, question: &str) -> Result<String, RemoteServiceError> {
        let excerpt = truncate_chars(text, self.input_max_chars);
        let user_content = format!(
            "Based only on the following document text, answer the question. \
             If the answer cannot be found in the text, state that you don't have enough \
             information from the document.\n\n\
             Document Text:\n\"\"\"\n{excerpt}\n\"\"\"\n\n\
             Question: {question}\n\nAnswer:"
        );
        self.chat
            .complete(ChatRequest {
                system_prompt: ANSWER_SYSTEM_PROMPT.to_string(),
                user_content,
                max_tokens: self.max_tokens,
            })
            .await
    }
}
