//! Member Repository

use shared::models::{Member, MemberCreate};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const MEMBER_SELECT: &str =
    "SELECT id, email, wallet_address, created_at, updated_at FROM member";

pub async fn find_by_id(db: impl SqliteExecutor<'_>, id: i64) -> RepoResult<Option<Member>> {
    let sql = format!("{MEMBER_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, Member>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn find_by_email(
    db: impl SqliteExecutor<'_>,
    email: &str,
) -> RepoResult<Option<Member>> {
    let sql = format!("{MEMBER_SELECT} WHERE email = ?");
    let row = sqlx::query_as::<_, Member>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn create(conn: &mut SqliteConnection, data: MemberCreate) -> RepoResult<Member> {
    if data.email.is_none() && data.wallet_address.is_none() {
        return Err(RepoError::Validation(
            "Member needs an email or a wallet address".into(),
        ));
    }
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO member (id, email, wallet_address, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
    )
    .bind(id)
    .bind(&data.email)
    .bind(&data.wallet_address)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create member".into()))
}
