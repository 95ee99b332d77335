//! Kaiten bridge - HTTP client for the Kaiten REST API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::gateway::QueueGateway;
use crate::models::{Assignee, CardId, ColumnId, IncomingNo, MemberRole, QueueItem, UserId};

/// Connection settings for a Kaiten space
#[derive(Debug, Clone)]
pub struct KaitenConfig {
    pub base_url: String,
    pub token: String,
    pub board_id: u64,
    /// Custom property holding the incoming letter number, e.g. `id_228499`
    pub incoming_property: String,
    pub timeout: Duration,
}

/// Kaiten client implementing the queue gateway
pub struct KaitenClient {
    client: Client,
    base_url: String,
    board_id: u64,
    incoming_property: String,
}

impl KaitenClient {
    pub fn new(config: KaitenConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| AppError::Internal(format!("Invalid Kaiten token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            board_id: config.board_id,
            incoming_property: config.incoming_property,
        })
    }

    fn card_url(&self, card_id: CardId) -> String {
        format!("{}/cards/{}", self.base_url, card_id)
    }

    fn member_url(&self, card_id: CardId, user_id: UserId) -> String {
        format!("{}/cards/{}/members/{}", self.base_url, card_id, user_id)
    }

    /// Send a request and turn transport errors and non-2xx statuses into `AppError::Kaiten`
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Kaiten(format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Kaiten(format!(
                "Failed to {}: {} - {}",
                action, status, text
            )));
        }

        Ok(response)
    }

    fn to_queue_item(&self, card: KaitenCard) -> QueueItem {
        let incoming_no = card
            .properties
            .as_ref()
            .and_then(|props| props.get(&self.incoming_property))
            .and_then(|value| {
                let parsed = parse_incoming_no(value);
                if parsed.is_none() && !value.is_null() {
                    tracing::warn!(card_id = card.id, value = %value, "Card has invalid incoming number");
                }
                parsed
            });

        QueueItem {
            id: card.id,
            title: card.title,
            incoming_no,
            column_id: card.column_id,
            assignees: card
                .members
                .into_iter()
                .map(|m| Assignee::new(m.user_id, MemberRole::from_kaiten_type(m.member_type), m.full_name))
                .collect(),
        }
    }
}

#[async_trait]
impl QueueGateway for KaitenClient {
    async fn list_queue_items(&self, column_id: ColumnId) -> Result<Vec<QueueItem>> {
        let request = self.client.get(format!("{}/cards", self.base_url)).query(&[
            ("board_id", self.board_id),
            ("column_id", column_id),
            // 1 = on the board, 2 = archived
            ("condition", 1),
        ]);
        let cards: Vec<KaitenCard> = self
            .send(request, "list cards")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Kaiten(format!("Failed to parse cards: {}", e)))?;

        tracing::debug!(column_id, count = cards.len(), "Fetched cards from column");
        Ok(cards.into_iter().map(|c| self.to_queue_item(c)).collect())
    }

    async fn get_item(&self, card_id: CardId) -> Result<Option<QueueItem>> {
        let response = self
            .client
            .get(self.card_url(card_id))
            .send()
            .await
            .map_err(|e| AppError::Kaiten(format!("Failed to get card {}: {}", card_id, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Kaiten(format!(
                "Failed to get card {}: {} - {}",
                card_id, status, text
            )));
        }

        let card: KaitenCard = response
            .json()
            .await
            .map_err(|e| AppError::Kaiten(format!("Failed to parse card {}: {}", card_id, e)))?;
        Ok(Some(self.to_queue_item(card)))
    }

    async fn move_item(&self, card_id: CardId, column_id: ColumnId) -> Result<()> {
        let request = self
            .client
            .patch(self.card_url(card_id))
            .json(&MoveCardRequest { column_id });
        self.send(request, &format!("move card {}", card_id)).await?;
        tracing::info!(card_id, column_id, "Card moved");
        Ok(())
    }

    async fn add_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/members", self.card_url(card_id)))
            .json(&AddMemberRequest { user_id });
        self.send(request, &format!("add member to card {}", card_id))
            .await?;
        tracing::info!(card_id, user_id, "Member added");
        Ok(())
    }

    async fn set_assignee_role(
        &self,
        card_id: CardId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<()> {
        let request = self
            .client
            .patch(self.member_url(card_id, user_id))
            .json(&UpdateMemberRequest {
                member_type: role.kaiten_type(),
            });
        self.send(request, &format!("update member role on card {}", card_id))
            .await?;
        tracing::info!(card_id, user_id, role = %role, "Member role changed");
        Ok(())
    }

    async fn remove_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()> {
        let response = self
            .client
            .delete(self.member_url(card_id, user_id))
            .send()
            .await
            .map_err(|e| {
                AppError::Kaiten(format!("Failed to remove member from card {}: {}", card_id, e))
            })?;

        // 404 means the member is already gone
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Kaiten(format!(
                "Failed to remove member from card {}: {} - {}",
                card_id, status, text
            )));
        }

        tracing::info!(card_id, user_id, "Member removed");
        Ok(())
    }

    async fn add_comment(&self, card_id: CardId, text: &str) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/comments", self.card_url(card_id)))
            .json(&AddCommentRequest { text });
        self.send(request, &format!("add comment to card {}", card_id))
            .await?;
        tracing::info!(card_id, "Comment added");
        Ok(())
    }
}

/// Incoming numbers arrive either as JSON numbers or as (possibly padded) strings
pub(crate) fn parse_incoming_no(value: &Value) -> Option<IncomingNo> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct KaitenCard {
    pub id: CardId,
    #[serde(default)]
    pub title: String,
    pub column_id: ColumnId,
    #[serde(default)]
    pub properties: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub members: Vec<KaitenMember>,
}

#[derive(Debug, Deserialize)]
pub struct KaitenMember {
    pub user_id: UserId,
    #[serde(rename = "type", default = "default_member_type")]
    pub member_type: u8,
    #[serde(default)]
    pub full_name: String,
}

fn default_member_type() -> u8 {
    1
}

#[derive(Debug, Serialize)]
struct MoveCardRequest {
    column_id: ColumnId,
}

#[derive(Debug, Serialize)]
struct AddMemberRequest {
    user_id: UserId,
}

#[derive(Debug, Serialize)]
struct UpdateMemberRequest {
    #[serde(rename = "type")]
    member_type: u8,
}

#[derive(Debug, Serialize)]
struct AddCommentRequest<'a> {
    text: &'a str,
}
