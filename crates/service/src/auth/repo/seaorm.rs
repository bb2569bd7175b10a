use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use models::{auth_token, user, user_credentials, user_session};

use crate::auth::domain::{AuthUser, Credentials, NewUser, ProfileUpdate, Session};
use crate::auth::errors::AuthError;
use crate::auth::repository::{AuthRepository, MSG_EMAIL_TAKEN, MSG_USERNAME_TAKEN};

pub struct SeaOrmAuthRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmAuthRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

pub(crate) fn to_auth_user(u: user::Model) -> AuthUser {
    AuthUser {
        id: u.id,
        username: u.username,
        email: u.email,
        first_name: u.first_name,
        last_name: u.last_name,
        is_active: u.is_active,
        email_verified: u.email_verified,
        date_joined: u.date_joined.with_timezone(&Utc),
        last_login: u.last_login.map(|t| t.with_timezone(&Utc)),
    }
}

/// Maps a unique-constraint violation on `user` to the matching field error.
fn user_conflict(e: DbErr) -> AuthError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            AuthError::field("email", MSG_EMAIL_TAKEN)
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => AuthError::field("username", MSG_USERNAME_TAKEN),
        _ => AuthError::Repository(e.to_string()),
    }
}

fn model_error(e: models::errors::ModelError) -> AuthError {
    match e {
        models::errors::ModelError::Validation(m) => AuthError::non_field(m),
        models::errors::ModelError::Conflict(m) | models::errors::ModelError::Db(m) => AuthError::Repository(m),
    }
}

#[async_trait::async_trait]
impl AuthRepository for SeaOrmAuthRepository {
    async fn find_user_by_id(&self, id: i32) -> Result<Option<AuthUser>, AuthError> {
        let res = user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(res.map(to_auth_user))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;
        Ok(res.map(to_auth_user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        if email.is_empty() {
            return Ok(None);
        }
        let res = user::Entity::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(res.map(to_auth_user))
    }

    async fn create_user(&self, new: NewUser) -> Result<AuthUser, AuthError> {
        let created = user::create(&self.db, &new.username, &new.email, &new.first_name, &new.last_name)
            .await
            .map_err(|e| match e {
                models::errors::ModelError::Conflict(detail) if detail.contains("email") => {
                    AuthError::field("email", MSG_EMAIL_TAKEN)
                }
                models::errors::ModelError::Conflict(_) => AuthError::field("username", MSG_USERNAME_TAKEN),
                other => model_error(other),
            })?;
        Ok(to_auth_user(created))
    }

    async fn update_user(&self, user_id: i32, update: ProfileUpdate) -> Result<AuthUser, AuthError> {
        let found = user::Entity::find_by_id(user_id).one(&self.db).await?.ok_or(AuthError::NotFound)?;
        let mut am: user::ActiveModel = found.into();
        if let Some(u) = update.username {
            am.username = Set(u);
        }
        if let Some(f) = update.first_name {
            am.first_name = Set(f);
        }
        if let Some(l) = update.last_name {
            am.last_name = Set(l);
        }
        let updated = am.update(&self.db).await.map_err(user_conflict)?;
        Ok(to_auth_user(updated))
    }

    async fn record_login(&self, user_id: i32, at: DateTime<Utc>) -> Result<(), AuthError> {
        user::Entity::update_many()
            .col_expr(user::Column::LastLogin, sea_orm::sea_query::Expr::value(at.fixed_offset()))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: i32) -> Result<(), AuthError> {
        user::Entity::update_many()
            .col_expr(user::Column::EmailVerified, sea_orm::sea_query::Expr::value(true))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn get_credentials(&self, user_id: i32) -> Result<Option<Credentials>, AuthError> {
        let res = user_credentials::Entity::find()
            .filter(user_credentials::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(res.map(|c| Credentials { user_id: c.user_id, password_hash: c.password_hash, password_algorithm: c.password_algorithm }))
    }

    async fn upsert_password(&self, user_id: i32, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError> {
        let c = user_credentials::upsert_password(&self.db, user_id, password_hash, &password_algorithm)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(Credentials { user_id: c.user_id, password_hash: c.password_hash, password_algorithm: c.password_algorithm })
    }

    async fn get_or_create_token(&self, user_id: i32, candidate: String) -> Result<String, AuthError> {
        let am = auth_token::ActiveModel {
            key: Set(candidate),
            user_id: Set(user_id),
            created: Set(Utc::now().fixed_offset()),
        };
        // a concurrent login may have created the row already; the stored key wins
        auth_token::Entity::insert(am)
            .on_conflict(OnConflict::column(auth_token::Column::UserId).do_nothing().to_owned())
            .do_nothing()
            .exec(&self.db)
            .await?;
        let token = auth_token::Entity::find()
            .filter(auth_token::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AuthError::Repository("token row missing after insert".into()))?;
        Ok(token.key)
    }

    async fn find_user_by_token(&self, key: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = auth_token::Entity::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;
        Ok(res.and_then(|(_, u)| u).map(to_auth_user))
    }

    async fn delete_token(&self, user_id: i32) -> Result<(), AuthError> {
        auth_token::Entity::delete_many()
            .filter(auth_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<(), AuthError> {
        user_session::Entity::delete_many()
            .filter(user_session::Column::UserId.eq(session.user_id))
            .filter(user_session::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .exec(&self.db)
            .await?;
        let am = user_session::ActiveModel {
            session_key: Set(session.key),
            user_id: Set(session.user_id),
            created_at: Set(Utc::now().fixed_offset()),
            expires_at: Set(session.expires_at.fixed_offset()),
        };
        am.insert(&self.db).await?;
        Ok(())
    }

    async fn find_session_user(&self, key: &str, now: DateTime<Utc>) -> Result<Option<AuthUser>, AuthError> {
        let res = user_session::Entity::find_by_id(key.to_string())
            .filter(user_session::Column::ExpiresAt.gt(now.fixed_offset()))
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;
        Ok(res.and_then(|(_, u)| u).map(to_auth_user))
    }

    async fn delete_session(&self, key: &str) -> Result<(), AuthError> {
        user_session::Entity::delete_by_id(key.to_string()).exec(&self.db).await?;
        Ok(())
    }

    async fn delete_sessions_except(&self, user_id: i32, keep: Option<&str>) -> Result<(), AuthError> {
        let mut q = user_session::Entity::delete_many().filter(user_session::Column::UserId.eq(user_id));
        if let Some(k) = keep {
            q = q.filter(user_session::Column::SessionKey.ne(k));
        }
        q.exec(&self.db).await?;
        Ok(())
    }
}
