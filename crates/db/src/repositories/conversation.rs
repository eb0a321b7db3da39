use sqlx::Row;

use mostrador_core::domain::conversation::{
    Conversation, ConversationId, ConversationMetadata, Message, MessageId, Sender, UserId,
};
use mostrador_core::domain::intent::Intent;
use mostrador_core::domain::tenant::TenantId;

use super::{
    decode_err, parse_timestamp, CommittedTurn, ConversationRepository, RepositoryError,
    TurnCommit,
};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let user_id: Option<String> = row.try_get("user_id").map_err(decode_err)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(decode_err)?;
    let version: i64 = row.try_get("version").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    let metadata: ConversationMetadata =
        serde_json::from_str(&metadata_json).map_err(decode_err)?;

    Ok(Conversation {
        id: ConversationId(id),
        tenant_id: TenantId(tenant_id),
        user_id: user_id.map(UserId),
        metadata,
        version,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(decode_err)?;
    let sender: String = row.try_get("sender").map_err(decode_err)?;
    let text: String = row.try_get("text").map_err(decode_err)?;
    let intent: Option<String> = row.try_get("intent").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    let sender = Sender::parse(&sender)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown sender `{sender}`")))?;
    let intent = intent.map(|value| value.parse::<Intent>()).transpose().map_err(decode_err)?;

    Ok(Message {
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        sender,
        text,
        intent,
        created_at: parse_timestamp(&created_at)?,
    })
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    message: &Message,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO message (id, conversation_id, seq, sender, text, intent, created_at)
         VALUES (?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM message WHERE conversation_id = ?),
                 ?, ?, ?, ?)",
    )
    .bind(&message.id.0)
    .bind(&message.conversation_id.0)
    .bind(&message.conversation_id.0)
    .bind(message.sender.as_str())
    .bind(&message.text)
    .bind(message.intent.map(Intent::as_str))
    .bind(message.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, user_id, metadata_json, version, created_at, updated_at
             FROM conversation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, conversation_id, sender, text, intent, created_at FROM (
                 SELECT id, conversation_id, seq, sender, text, intent, created_at
                 FROM message WHERE conversation_id = ? ORDER BY seq DESC LIMIT ?
             ) ORDER BY seq ASC",
        )
        .bind(&id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<CommittedTurn, RepositoryError> {
        let conversation = &commit.conversation;
        let metadata_json = serde_json::to_string(&conversation.metadata).map_err(decode_err)?;
        let updated_at = commit.agent_message.created_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let version = if commit.is_new {
            sqlx::query(
                "INSERT INTO conversation (id, tenant_id, user_id, metadata_json, version,
                                           created_at, updated_at)
                 VALUES (?, ?, ?, ?, 1, ?, ?)",
            )
            .bind(&conversation.id.0)
            .bind(&conversation.tenant_id.0)
            .bind(conversation.user_id.as_ref().map(|user| user.0.as_str()))
            .bind(&metadata_json)
            .bind(conversation.created_at.to_rfc3339())
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
            1
        } else {
            let updated = sqlx::query(
                "UPDATE conversation
                 SET metadata_json = ?, version = version + 1, updated_at = ?
                 WHERE id = ? AND tenant_id = ? AND version = ?",
            )
            .bind(&metadata_json)
            .bind(&updated_at)
            .bind(&conversation.id.0)
            .bind(&conversation.tenant_id.0)
            .bind(conversation.version)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "conversation `{}` changed since version {}",
                    conversation.id, conversation.version
                )));
            }
            conversation.version + 1
        };

        insert_message(&mut tx, &commit.user_message).await?;
        insert_message(&mut tx, &commit.agent_message).await?;

        if let Some(order) = &commit.order {
            super::order::insert_order(&mut tx, order).await?;
        }
        if let Some(review) = &commit.review {
            super::order::insert_review(&mut tx, review).await?;
        }

        tx.commit().await?;

        Ok(CommittedTurn { conversation_id: conversation.id.clone(), version })
    }
}
