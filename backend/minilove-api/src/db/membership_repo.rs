use sqlx::AnyPool;

use crate::models::MembershipPlan;

/// Active membership plans, cheapest first
pub async fn list_active_plans(pool: &AnyPool) -> Result<Vec<MembershipPlan>, sqlx::Error> {
    sqlx::query_as::<_, MembershipPlan>(
        r#"
        SELECT id, name, description, price, duration_days, features, is_active
        FROM membership_plans
        WHERE is_active = 1
        ORDER BY price ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sqlite_db;

    #[tokio::test]
    async fn test_seeded_plans_ordered_by_price() {
        let (db, _dir) = sqlite_db().await;
        let plans = list_active_plans(&db.pool).await.unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["free", "basic", "premium"]);
        assert_eq!(plans[2].duration_days, 30);
    }
}
