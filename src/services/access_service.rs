//! Moderator capability: who holds the `admin` role, and flipping it.

use super::{ServiceError, ServiceResult};
use crate::{
    auth::Actor,
    models::{
        content::CallerRelation,
        profile::{Role, UserOverview},
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct AccessService {
    db: Arc<SqlitePool>,
}

impl AccessService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn is_moderator(&self, user_id: Uuid) -> ServiceResult<bool> {
        let is_admin = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ? AND role = ?)",
        )
        .bind(user_id)
        .bind(Role::Admin)
        .fetch_one(&*self.db)
        .await?;
        Ok(is_admin)
    }

    /// Fail with an authorization error unless `actor` is a moderator.
    pub async fn require_moderator(&self, actor: &Actor) -> ServiceResult<()> {
        if self.is_moderator(actor.id).await? {
            Ok(())
        } else {
            Err(ServiceError::denied("moderator capability required"))
        }
    }

    /// How `actor` relates to an item written by `author_id`.
    pub async fn relation(&self, actor: &Actor, author_id: Uuid) -> ServiceResult<CallerRelation> {
        Ok(CallerRelation {
            is_author: actor.id == author_id,
            is_moderator: self.is_moderator(actor.id).await?,
        })
    }

    /// Set a user's role unconditionally. Used by operator tooling.
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                role = excluded.role,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(role)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        info!(%user_id, ?role, "role assigned");
        Ok(())
    }

    /// Flip `target` between `user` and `admin` in one upsert, so there is no
    /// window in which the user has no role row. Returns the new role.
    pub async fn toggle_moderator(&self, actor: &Actor, target: Uuid) -> ServiceResult<Role> {
        self.require_moderator(actor).await?;

        let has_profile =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ?)")
                .bind(target)
                .fetch_one(&*self.db)
                .await?;
        if !has_profile {
            return Err(ServiceError::not_found("user", target));
        }

        let role = sqlx::query_scalar::<_, Role>(
            "INSERT INTO user_roles (user_id, role, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                role = CASE user_roles.role WHEN 'admin' THEN 'user' ELSE 'admin' END,
                updated_at = excluded.updated_at
             RETURNING role",
        )
        .bind(target)
        // no row yet means the user is effectively `user`
        .bind(Role::Admin)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        info!(moderator = %actor.id, %target, ?role, "toggled role");
        Ok(role)
    }

    /// Every profile with its effective role and content count.
    pub async fn list_users(&self, actor: &Actor) -> ServiceResult<Vec<UserOverview>> {
        self.require_moderator(actor).await?;
        let users = sqlx::query_as::<_, UserOverview>(
            "SELECT p.id, p.username, p.created_at,
                    COALESCE(r.role, 'user') AS role,
                    (SELECT COUNT(*) FROM content_items c WHERE c.author_id = p.id) AS content_count
             FROM profiles p
             LEFT JOIN user_roles r ON r.user_id = p.id
             ORDER BY p.created_at ASC, p.rowid ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn toggle_flips_between_roles() {
        let db = testing::memory_db().await;
        let access = AccessService::new(db.clone());
        let admin = testing::moderator(&db, "admin").await;
        let cook = testing::user(&db, "cook").await;

        assert!(!access.is_moderator(cook.id).await.unwrap());
        assert_eq!(access.toggle_moderator(&admin, cook.id).await.unwrap(), Role::Admin);
        assert!(access.is_moderator(cook.id).await.unwrap());
        assert_eq!(access.toggle_moderator(&admin, cook.id).await.unwrap(), Role::User);
        assert!(!access.is_moderator(cook.id).await.unwrap());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ?")
            .bind(cook.id)
            .fetch_one(&*db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn only_moderators_toggle_or_list() {
        let db = testing::memory_db().await;
        let access = AccessService::new(db.clone());
        let cook = testing::user(&db, "cook").await;
        let other = testing::user(&db, "other").await;

        assert!(matches!(
            access.toggle_moderator(&cook, other.id).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            access.list_users(&cook).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(!access.is_moderator(other.id).await.unwrap());
    }

    #[tokio::test]
    async fn toggle_unknown_user_is_not_found() {
        let db = testing::memory_db().await;
        let access = AccessService::new(db.clone());
        let admin = testing::moderator(&db, "admin").await;
        assert!(matches!(
            access.toggle_moderator(&admin, Uuid::new_v4()).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_users_reports_roles_and_counts() {
        let db = testing::memory_db().await;
        let access = AccessService::new(db.clone());
        let admin = testing::moderator(&db, "admin").await;
        let cook = testing::user(&db, "cook").await;
        sqlx::query(
            "INSERT INTO content_items (id, kind, author_id, title, payload, created_at, updated_at)
             VALUES (?, 'recipe', ?, 'Soup', '{}', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .bind(Uuid::new_v4())
        .bind(cook.id)
        .execute(&*db)
        .await
        .unwrap();

        let users = access.list_users(&admin).await.unwrap();
        assert_eq!(users.len(), 2);
        let admin_row = users.iter().find(|u| u.id == admin.id).unwrap();
        let cook_row = users.iter().find(|u| u.id == cook.id).unwrap();
        assert_eq!(admin_row.role, Role::Admin);
        assert_eq!(cook_row.role, Role::User);
        assert_eq!(cook_row.content_count, 1);
        assert_eq!(admin_row.content_count, 0);
    }
}
