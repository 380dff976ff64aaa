use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    db::models::{NewSkill, Skill, SkillPatch, UserSummary},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    storage::DynStorage,
    AppState,
};

const DEFAULT_BROWSE_LIMIT: usize = 20;
const DEFAULT_RECENT_LIMIT: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_skills).post(create_skill))
        .route("/recent", get(recent_skills))
        .route("/user/:user_id", get(skills_by_user))
        .route("/:id", get(get_skill).put(update_skill).delete(delete_skill))
}

#[derive(Debug, Deserialize)]
pub struct SkillsQuery {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub skill_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSkillRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_offering: bool,
    pub time_availability: Option<String>,
    pub media: Option<String>,
}

/// Maps a present field to `Some(..)` so an explicit `null` (`Some(None)`)
/// clears the column while an absent field (`None`) leaves it untouched.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSkillRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_offering: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_availability: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub media: Option<Option<String>>,
}

/// A skill with its owner's public summary embedded.
#[derive(Debug, Serialize)]
pub struct SkillResponse {
    #[serde(flatten)]
    pub skill: Skill,
    pub user: Option<UserSummary>,
}

async fn with_owners(storage: &DynStorage, skills: Vec<Skill>) -> Result<Vec<SkillResponse>> {
    let mut out = Vec::with_capacity(skills.len());
    for skill in skills {
        let user = storage.get_user(skill.user_id).await?;
        out.push(SkillResponse {
            user: user.as_ref().map(UserSummary::from),
            skill,
        });
    }
    Ok(out)
}

async fn list_skills(
    State(state): State<AppState>,
    Query(query): Query<SkillsQuery>,
) -> Result<Json<Vec<SkillResponse>>> {
    let skills = if let Some(category) = &query.category {
        state.storage.get_skills_by_category(category).await?
    } else {
        match query.skill_type.as_deref() {
            Some("offering") => state.storage.get_offering_skills().await?,
            Some("requesting") => state.storage.get_requesting_skills().await?,
            _ => state.storage.get_recent_skills(DEFAULT_BROWSE_LIMIT).await?,
        }
    };

    Ok(Json(with_owners(&state.storage, skills).await?))
}

async fn recent_skills(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<SkillResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let skills = state.storage.get_recent_skills(limit).await?;
    Ok(Json(with_owners(&state.storage, skills).await?))
}

async fn skills_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Skill>>> {
    Ok(Json(state.storage.get_skills_by_user(user_id).await?))
}

async fn get_skill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SkillResponse>> {
    let skill = state
        .storage
        .get_skill(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))?;
    let user = state.storage.get_user(skill.user_id).await?;

    Ok(Json(SkillResponse {
        user: user.as_ref().map(UserSummary::from),
        skill,
    }))
}

async fn create_skill(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateSkillRequest>,
) -> Result<(StatusCode, Json<Skill>)> {
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if body.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    if body.category.trim().is_empty() {
        return Err(AppError::Validation("Category is required".to_string()));
    }

    let skill = state
        .storage
        .create_skill(NewSkill {
            user_id: user.id,
            title: body.title,
            description: body.description,
            category: body.category,
            tags: body.tags,
            is_offering: body.is_offering,
            time_availability: body.time_availability,
            media: body.media,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(skill)))
}

/// Loads the skill and checks the owner-or-admin gate shared by update/delete.
async fn skill_for_mutation(storage: &DynStorage, id: i64, user: &AuthUser) -> Result<Skill> {
    let skill = storage
        .get_skill(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))?;

    if skill.user_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden(
            "Not authorized to modify this skill".to_string(),
        ));
    }
    Ok(skill)
}

async fn update_skill(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSkillRequest>,
) -> Result<Json<Skill>> {
    skill_for_mutation(&state.storage, id, &user).await?;

    let updated = state
        .storage
        .update_skill(
            id,
            SkillPatch {
                title: body.title,
                description: body.description,
                category: body.category,
                tags: body.tags,
                is_offering: body.is_offering,
                time_availability: body.time_availability,
                media: body.media,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))?;

    Ok(Json(updated))
}

async fn delete_skill(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    skill_for_mutation(&state.storage, id, &user).await?;

    if state.storage.delete_skill(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Skill not found".to_string()))
    }
}
