use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub reset_code_hash: Option<String>,
    pub reset_code_expires_at: Option<OffsetDateTime>,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Pending password reset. Hash and expiry only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCode {
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub reset: Option<ResetCode>,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let reset = match (row.reset_code_hash, row.reset_code_expires_at) {
            (Some(hash), Some(expires_at)) => Some(ResetCode { hash, expires_at }),
            _ => None,
        };
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            reset,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Public part of the user returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            username: "user1".into(),
            password_hash: "$argon2id$stub".into(),
            reset_code_hash: None,
            reset_code_expires_at: None,
            role: "user".into(),
            created_at: datetime!(2024-06-01 08:00 UTC),
            updated_at: datetime!(2024-06-01 08:00 UTC),
        }
    }

    #[test]
    fn half_set_reset_state_is_absent() {
        let mut r = row();
        r.reset_code_hash = Some("h".into());
        assert!(User::from(r).reset.is_none());

        let mut r = row();
        r.reset_code_hash = Some("h".into());
        r.reset_code_expires_at = Some(datetime!(2024-06-01 08:10 UTC));
        let user = User::from(r);
        assert_eq!(
            user.reset,
            Some(ResetCode {
                hash: "h".into(),
                expires_at: datetime!(2024-06-01 08:10 UTC),
            })
        );
    }

    #[test]
    fn view_omits_secrets() {
        let user = User::from(row());
        let json = serde_json::to_value(UserView::from(&user)).unwrap();
        assert_eq!(json["username"], "user1");
        assert_eq!(json["created_at"], "2024-06-01T08:00:00Z");
        assert!(json.get("password_hash").is_none());
    }
}
