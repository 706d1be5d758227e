use {
    crate::domain::{error::LedgerError, principal::Role},
    sqlx::PgPool,
    uuid::Uuid,
};

pub async fn find_user_id_by_email(pool: &PgPool, email: &str) -> Result<Option<Uuid>, LedgerError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM profiles WHERE lower(email) = lower($1) ORDER BY created_at LIMIT 1",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub async fn role_of(pool: &PgPool, user_id: Uuid) -> Result<Option<Role>, LedgerError> {
    let role = sqlx::query_scalar::<_, String>("SELECT role FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(role.map(|r| Role::from_profile(Some(&r))))
}
