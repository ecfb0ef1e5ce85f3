use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config;

#[derive(Debug, Clone, Deserialize)]
pub struct LessonRequest {
    pub prompt: String,
    pub grade_level: String,
    pub subject: String,
}

/// Structured lesson plan as the model is asked to emit it. Field names stay
/// camelCase on the wire so the stored document matches what the front-end
/// renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub title: String,
    pub duration: String,
    pub objectives: Vec<String>,
    pub materials: Vec<String>,
    pub introduction: String,
    pub main_content: MainContent,
    pub activities: Vec<Activity>,
    pub assessment: Vec<AssessmentItem>,
    pub closure: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub differentiation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainContent {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub description: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub correct_answer: String,
}

/// Opaque prompt -> structured-document function. Injected as a trait object
/// so tests can substitute a canned generator.
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    async fn generate(&self, request: &LessonRequest) -> Result<LessonPlan>;
}

pub struct AnthropicGenerator {
    base: String,
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicGenerator {
    pub fn from_env() -> Self {
        Self::new(
            config::ANTHROPIC_BASE_URL.clone(),
            config::ANTHROPIC_API_KEY.clone(),
            config::ANTHROPIC_MODEL.clone(),
        )
    }

    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("client build"),
        }
    }

    fn system_prompt(request: &LessonRequest) -> String {
        format!(
            "You are an expert K-12 educator. Create a comprehensive, engaging lesson plan \
that is age-appropriate for {grade} students in the subject of {subject}.\n\n\
The lesson plan should include a clear title and duration, 3-4 specific learning \
objectives, required materials, an introduction hook, main content with 3-4 headed \
sections, interactive activities with durations, assessment questions with correct \
answers, a closure summary, extension activities, and differentiation strategies.\n\n\
Respond with valid JSON only, using this structure:\n\
{{\"title\": \"string\", \"duration\": \"string\", \"objectives\": [\"string\"], \
\"materials\": [\"string\"], \"introduction\": \"string\", \
\"mainContent\": {{\"sections\": [{{\"heading\": \"string\", \"content\": \"string\"}}]}}, \
\"activities\": [{{\"name\": \"string\", \"description\": \"string\", \"duration\": \"string\"}}], \
\"assessment\": [{{\"question\": \"string\", \"type\": \"string\", \"correctAnswer\": \"string\"}}], \
\"closure\": \"string\", \"extensions\": [\"string\"], \"differentiation\": [\"string\"]}}",
            grade = request.grade_level,
            subject = request.subject,
        )
    }
}

#[async_trait]
impl LessonGenerator for AnthropicGenerator {
    async fn generate(&self, request: &LessonRequest) -> Result<LessonPlan> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4000,
            "temperature": 0.7,
            "system": Self::system_prompt(request),
            "messages": [{
                "role": "user",
                "content": format!("Create a lesson plan for: {}", request.prompt),
            }],
        });
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("model request failed")?
            .error_for_status()
            .context("model request was rejected")?;
        let payload: serde_json::Value = resp.json().await.context("model reply unreadable")?;
        let text = payload["content"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("model reply missing text content"))?;
        parse_lesson_json(text)
    }
}

/// The model is asked for bare JSON but sometimes wraps it in a markdown
/// fence anyway. Strip the fence before parsing.
pub fn parse_lesson_json(raw: &str) -> Result<LessonPlan> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned).context("model reply was not a valid lesson plan")
}
