use crate::error::{LlmError, Result};
use eulix_vector_store::ContextWindow;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_LOCAL_BASE: &str = "http://localhost:11434";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct LlmOptions {
    /// Route to the local server instead of the remote provider.
    pub local: bool,
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: usize,
    pub temperature: f64,
    /// Base URL of the local server; `/api/chat` is appended.
    pub base_url: String,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            local: true,
            provider: "ollama".into(),
            model: "llama3.2:3b".into(),
            api_key: String::new(),
            max_tokens: 8192,
            temperature: 0.7,
            base_url: DEFAULT_LOCAL_BASE.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f64,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    text: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Message,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

/// Chat client over one of the two provider shapes.
pub struct Client {
    http: reqwest::Client,
    opts: LlmOptions,
}

impl Client {
    pub fn new(opts: LlmOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Unavailable {
                provider: opts.provider.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { http, opts })
    }

    pub fn max_tokens(&self) -> usize {
        self.opts.max_tokens
    }

    pub fn provider(&self) -> &str {
        &self.opts.provider
    }

    /// Send a prompt with its context window; returns the response text
    /// unchanged.
    pub async fn query(&self, context: &ContextWindow, prompt: &str) -> Result<String> {
        let full_prompt = render_prompt(context, prompt);
        if self.opts.local {
            self.query_local(&full_prompt).await
        } else {
            self.query_anthropic(&full_prompt).await
        }
    }

    async fn query_anthropic(&self, prompt: &str) -> Result<String> {
        let provider = self.opts.provider.clone();
        let request = AnthropicRequest {
            model: &self.opts.model,
            messages: vec![Message {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            max_tokens: self.opts.max_tokens,
            temperature: self.opts.temperature,
        };

        let response = self
            .http
            .post(ANTHROPIC_ENDPOINT)
            .header("x-api-key", &self.opts.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable {
                provider: provider.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnthropicResponse =
            response.json().await.map_err(|e| LlmError::Unavailable {
                provider: provider.clone(),
                message: e.to_string(),
            })?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(LlmError::EmptyResponse { provider })
    }

    async fn query_local(&self, prompt: &str) -> Result<String> {
        let provider = self.opts.provider.clone();
        let base = if self.opts.base_url.is_empty() {
            DEFAULT_LOCAL_BASE
        } else {
            self.opts.base_url.trim_end_matches('/')
        };
        let url = format!("{base}/api/chat");

        let request = OllamaRequest {
            model: &self.opts.model,
            messages: vec![Message {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.opts.temperature,
                num_predict: self.opts.max_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable {
                provider: provider.clone(),
                message: format!("{e} (is the local server running at {base}?)"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaResponse =
            response.json().await.map_err(|e| LlmError::Unavailable {
                provider: provider.clone(),
                message: e.to_string(),
            })?;

        if parsed.message.content.is_empty() {
            return Err(LlmError::EmptyResponse { provider });
        }
        Ok(parsed.message.content)
    }
}

/// Frame the context window ahead of the handler prompt.
fn render_prompt(context: &ContextWindow, prompt: &str) -> String {
    let mut out = String::from("You are analyzing a codebase with the following context:\n\n");
    out.push_str("================================================================\n\n");

    for (i, chunk) in context.chunks.iter().enumerate() {
        out.push_str(&format!(
            "File: {} (Lines {}-{})\nRelevance: {:.2}\n\n{}\n\n",
            chunk.file, chunk.start_line, chunk.end_line, chunk.importance, chunk.content
        ));
        if i + 1 < context.chunks.len() {
            out.push_str("----------------------------------------------------------------\n\n");
        }
    }

    out.push_str("================================================================\n\n");
    out.push_str(&format!(
        "Context Statistics:\n  Total chunks: {}\n  Total tokens: {}\n  Files covered: {}\n\n",
        context.chunks.len(),
        context.total_tokens,
        context.sources.len()
    ));
    out.push_str(prompt);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use eulix_vector_store::ContextChunk;

    fn window() -> ContextWindow {
        ContextWindow {
            chunks: vec![
                ContextChunk {
                    file: "src/auth.py".into(),
                    start_line: 10,
                    end_line: 30,
                    content: "def authenticate_user(): ...".into(),
                    importance: 0.7,
                },
                ContextChunk {
                    file: "src/db.py".into(),
                    start_line: 1,
                    end_line: 12,
                    content: "def query_user(): ...".into(),
                    importance: 0.6,
                },
            ],
            total_tokens: 64,
            sources: vec!["src/auth.py".into(), "src/db.py".into()],
        }
    }

    #[test]
    fn prompt_includes_every_chunk_and_the_question() {
        let rendered = render_prompt(&window(), "USER QUESTION: why does login fail?");
        assert!(rendered.contains("File: src/auth.py (Lines 10-30)"));
        assert!(rendered.contains("File: src/db.py (Lines 1-12)"));
        assert!(rendered.contains("Total chunks: 2"));
        assert!(rendered.contains("Files covered: 2"));
        assert!(rendered.ends_with("USER QUESTION: why does login fail?"));
    }

    #[test]
    fn local_url_honors_base_override() {
        let opts = LlmOptions {
            base_url: "http://10.0.0.5:11434/".into(),
            ..LlmOptions::default()
        };
        let base = opts.base_url.trim_end_matches('/');
        assert_eq!(format!("{base}/api/chat"), "http://10.0.0.5:11434/api/chat");
    }
}
