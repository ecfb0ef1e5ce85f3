use httpmock::prelude::*;
use lessonforge::generation::{AnthropicGenerator, LessonGenerator, LessonRequest};
use serde_json::json;

// key: generation-tests -> model client against a stubbed messages API

fn request() -> LessonRequest {
    LessonRequest {
        prompt: "fractions on a number line".to_string(),
        grade_level: "3rd Grade".to_string(),
        subject: "Math".to_string(),
    }
}

fn lesson_json() -> serde_json::Value {
    json!({
        "title": "Fractions on a Number Line",
        "duration": "45 minutes",
        "objectives": ["Place unit fractions on a number line"],
        "materials": ["Whiteboard"],
        "introduction": "Start with a pizza-sharing question.",
        "mainContent": { "sections": [{ "heading": "Warm up", "content": "Review halves." }] },
        "activities": [{ "name": "Strip match", "description": "Match strips to points.", "duration": "10 mins" }],
        "assessment": [{ "question": "Where does 1/4 sit?", "type": "Open Ended", "correctAnswer": "A quarter of the way" }],
        "closure": "Exit ticket.",
        "extensions": ["Mixed numbers"],
        "differentiation": ["Pre-marked lines"]
    })
}

#[tokio::test]
async fn fenced_model_reply_becomes_a_structured_plan() {
    let server = MockServer::start_async().await;
    let reply = format!("```json\n{}\n```", lesson_json());
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", "2023-06-01");
            then.status(200).json_body(json!({
                "content": [{ "type": "text", "text": reply }]
            }));
        })
        .await;

    let generator = AnthropicGenerator::new(server.base_url(), "test-key", "test-model");
    let plan = generator.generate(&request()).await.unwrap();
    assert_eq!(plan.title, "Fractions on a Number Line");
    assert_eq!(plan.main_content.sections.len(), 1);
    assert_eq!(plan.assessment[0].kind, "Open Ended");
    mock.assert_async().await;
}

#[tokio::test]
async fn prose_model_reply_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({
                "content": [{ "type": "text", "text": "Sorry, I cannot help with that." }]
            }));
        })
        .await;

    let generator = AnthropicGenerator::new(server.base_url(), "test-key", "test-model");
    assert!(generator.generate(&request()).await.is_err());
}

#[tokio::test]
async fn model_api_errors_surface_as_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(529).json_body(json!({
                "error": { "type": "overloaded_error" }
            }));
        })
        .await;

    let generator = AnthropicGenerator::new(server.base_url(), "test-key", "test-model");
    assert!(generator.generate(&request()).await.is_err());
}
