/// Reference data: topics and membership plans
use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::AnyPool;

use crate::db::{membership_repo, topic_repo};
use crate::error::Result;
use crate::models::{ApiResponse, MembershipPlanResponse, Topic};

#[derive(Debug, Serialize)]
pub struct TopicCatalog {
    pub topics: Vec<Topic>,
}

#[derive(Debug, Serialize)]
pub struct PlanCatalog {
    pub plans: Vec<MembershipPlanResponse>,
}

/// GET /api/v1/topics
pub async fn list_topics(pool: web::Data<AnyPool>) -> Result<HttpResponse> {
    let topics = topic_repo::list_active(&pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(TopicCatalog { topics })))
}

/// GET /api/v1/membership/plans
pub async fn list_plans(pool: web::Data<AnyPool>) -> Result<HttpResponse> {
    let plans = membership_repo::list_active_plans(&pool)
        .await?
        .into_iter()
        .map(MembershipPlanResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(PlanCatalog { plans })))
}
