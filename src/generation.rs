use log::info;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::AzureSettings;
use crate::error::{RAGError, Result};
use crate::indexing::ScoredChunk;
use crate::retrieval::Retriever;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A hosted chat-completion model.
pub trait ChatModel {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Azure OpenAI chat deployment with deterministic decoding.
pub struct AzureChatModel {
    client: Client,
    url: String,
    api_key: String,
}

impl AzureChatModel {
    pub fn new(settings: &AzureSettings) -> Result<Self> {
        let (endpoint, api_key) = settings.credentials()?;
        let client = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| RAGError::Generation(e.to_string()))?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            settings.chat_deployment,
            settings.chat_api_version
        );
        Ok(Self {
            client,
            url,
            api_key: api_key.trim().to_string(),
        })
    }
}

impl ChatModel for AzureChatModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| RAGError::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RAGError::Generation(format!("{}: {}", status, text)));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| RAGError::Generation(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RAGError::Generation("response has no message content".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Joins chunk contents in rank order.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|h| h.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Fills the fixed question-answering prompt.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\n    \
Context: {context}\n\n    \
Question: {question}\n\n    \
Answer:"
    )
}

/// Anything that can answer a free-text question.
pub trait Answer {
    fn answer(&mut self, question: &str) -> Result<String>;
}

/// Retrieve, fill the prompt, ask the model. The model's text comes back
/// untouched; an empty retrieval still calls the model with empty context.
pub struct RagChain {
    retriever: Retriever,
    model: Box<dyn ChatModel>,
}

impl RagChain {
    pub fn new(retriever: Retriever, model: Box<dyn ChatModel>) -> Self {
        Self { retriever, model }
    }
}

impl Answer for RagChain {
    fn answer(&mut self, question: &str) -> Result<String> {
        let hits = self.retriever.retrieve(question)?;
        info!("Retrieved {} chunks", hits.len());
        let prompt = build_prompt(&format_context(&hits), question);
        self.model.complete(&prompt)
    }
}
