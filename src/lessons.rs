use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::billing::BillingService;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::generation::{LessonGenerator, LessonRequest};

#[derive(Serialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub grade_level: String,
    pub subject: String,
    pub prompt: String,
    pub content: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
pub struct LessonFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateLessonRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

fn lesson_from_row(row: sqlx::postgres::PgRow) -> Lesson {
    Lesson {
        id: row.get("id"),
        title: row.get("title"),
        grade_level: row.get("grade_level"),
        subject: row.get("subject"),
        prompt: row.get("prompt"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Metered action: the entitlement check runs first and the lesson is only
/// generated and stored on `allowed`. The count check and the insert are not
/// atomic, so two simultaneous requests can both pass the check (soft limit).
pub async fn create_lesson(
    Extension(pool): Extension<PgPool>,
    Extension(generator): Extension<Arc<dyn LessonGenerator>>,
    AuthUser { user_id }: AuthUser,
    Json(payload): Json<LessonRequest>,
) -> AppResult<Response> {
    if payload.prompt.trim().is_empty()
        || payload.grade_level.trim().is_empty()
        || payload.subject.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "prompt, grade_level and subject are required".into(),
        ));
    }

    let service = BillingService::new(pool.clone());
    let decision = service.evaluate_entitlement(user_id).await.map_err(|e| {
        error!(?e, %user_id, "entitlement evaluation failed");
        AppError::Message("Billing service error".into())
    })?;
    if !decision.allowed {
        let body = Json(serde_json::json!({
            "error": decision.reason.clone().unwrap_or_else(|| "Free plan limit reached".into()),
            "code": "USAGE_LIMIT_REACHED",
            "current_usage": decision.current_usage,
            "limit": decision.limit,
        }));
        return Ok((StatusCode::FORBIDDEN, body).into_response());
    }

    let plan = generator.generate(&payload).await.map_err(|e| {
        error!(?e, %user_id, "lesson generation failed");
        AppError::BadGateway("Failed to generate lesson plan".into())
    })?;
    let content = serde_json::to_value(&plan)
        .map_err(|e| AppError::Message(format!("Lesson encoding error: {e}")))?;

    let row = sqlx::query(
        r#"
        INSERT INTO lessons (user_id, title, grade_level, subject, prompt, content)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, title, grade_level, subject, prompt, content, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(&plan.title)
    .bind(&payload.grade_level)
    .bind(&payload.subject)
    .bind(&payload.prompt)
    .bind(&content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        error!(?e, %user_id, "DB error saving lesson");
        AppError::Db(e)
    })?;

    Ok((StatusCode::CREATED, Json(lesson_from_row(row))).into_response())
}

pub async fn list_lessons(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
    Query(filter): Query<LessonFilter>,
) -> AppResult<Json<Vec<Lesson>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, grade_level, subject, prompt, content, created_at, updated_at
        FROM lessons
        WHERE user_id = $1
          AND deleted_at IS NULL
          AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%' OR prompt ILIKE '%' || $2 || '%')
          AND ($3::text IS NULL OR subject = $3)
          AND ($4::text IS NULL OR grade_level = $4)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(&filter.q)
    .bind(&filter.subject)
    .bind(&filter.grade_level)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        error!(?e, %user_id, "DB error listing lessons");
        AppError::Db(e)
    })?;
    Ok(Json(rows.into_iter().map(lesson_from_row).collect()))
}

pub async fn get_lesson(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lesson>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, grade_level, subject, prompt, content, created_at, updated_at
        FROM lessons
        WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        error!(?e, %user_id, "DB error fetching lesson");
        AppError::Db(e)
    })?;
    let Some(row) = row else {
        return Err(AppError::NotFound);
    };
    Ok(Json(lesson_from_row(row)))
}

pub async fn update_lesson(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> AppResult<Json<Lesson>> {
    if payload.title.is_none() && payload.content.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }
    let row = sqlx::query(
        r#"
        UPDATE lessons
        SET title = COALESCE($3, title),
            content = COALESCE($4, content),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
        RETURNING id, title, grade_level, subject, prompt, content, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&payload.title)
    .bind(&payload.content)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        error!(?e, %user_id, "DB error updating lesson");
        AppError::Db(e)
    })?;
    let Some(row) = row else {
        return Err(AppError::NotFound);
    };
    Ok(Json(lesson_from_row(row)))
}

/// Soft delete. The row stays behind so the lifetime usage count, and with
/// it the free-tier gate, is unaffected.
pub async fn delete_lesson(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let result = sqlx::query(
        "UPDATE lessons SET deleted_at = NOW() WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        error!(?e, %user_id, "DB error deleting lesson");
        AppError::Db(e)
    })?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
