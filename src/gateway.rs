use std::sync::Arc;

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};

use crate::embed::NowPlayingCard;
use crate::error::RadioError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn say(&self, channel_id: ChannelId, text: &str) -> Result<(), RadioError>;

    async fn send_card(
        &self,
        channel_id: ChannelId,
        card: &NowPlayingCard,
    ) -> Result<MessageId, RadioError>;

    /// Fails when the message was deleted or can no longer be edited.
    async fn edit_card(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        card: &NowPlayingCard,
    ) -> Result<(), RadioError>;
}

pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn say(&self, channel_id: ChannelId, text: &str) -> Result<(), RadioError> {
        channel_id.say(&self.http, text).await?;

        Ok(())
    }

    async fn send_card(
        &self,
        channel_id: ChannelId,
        card: &NowPlayingCard,
    ) -> Result<MessageId, RadioError> {
        let message = channel_id
            .send_message(&self.http, |m| m.embed(|e| card.apply(e)))
            .await?;

        Ok(message.id)
    }

    async fn edit_card(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        card: &NowPlayingCard,
    ) -> Result<(), RadioError> {
        channel_id
            .edit_message(&self.http, message_id, |m| m.embed(|e| card.apply(e)))
            .await?;

        Ok(())
    }
}
