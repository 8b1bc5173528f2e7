//! Authorization guards that enforce permission checks at the type level,
//! so a handler cannot accidentally skip them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::conversation::{Conversation, ParticipantRole};
use crate::services::conversation_service::ConversationService;

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: ParticipantRole,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            id: ctx.user_id,
            role: ctx.role,
        })
    }
}

/// Admin-only mutations take this instead of `AuthUser`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != ParticipantRole::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser { id: user.id })
    }
}

/// A verified party of a conversation, with the loaded row. One query covers
/// existence and access in a single place.
#[derive(Debug, Clone)]
pub struct ConversationParty {
    pub conversation: Conversation,
    pub user_id: Uuid,
    pub other_party: Uuid,
}

impl ConversationParty {
    /// Admins pass regardless of party membership (oversight access); for
    /// them `other_party` is the conversation's participant side.
    pub async fn verify(
        db: &PgPool,
        conversation_id: Uuid,
        user: &AuthUser,
    ) -> Result<Self, AppError> {
        let conversation = ConversationService::get_conversation(db, conversation_id).await?;
        match conversation.other_party(user.id) {
            Some(other_party) => Ok(Self {
                conversation,
                user_id: user.id,
                other_party,
            }),
            None if user.role == ParticipantRole::Admin => Ok(Self {
                other_party: conversation.participant_id,
                conversation,
                user_id: user.id,
            }),
            None => Err(AppError::Forbidden),
        }
    }
}
