use std::future::Future;

use reqwest::Method;
use serde_json::json;

use crate::{
    error::{Error, Result, StatusChecks},
    model::{ChannelId, Message, MessageId},
};

use super::{Discord, FileUpload, RestRequest};

/// Discord REST API methods for reading, sending and deleting messages.
///
/// Authors, mentioned users and members of returned messages are merged into
/// the client's cache, except for webhook authors.
pub trait MessageExt {
    /// Get a single message by ID from a given channel.
    fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Get messages in the backlog for a given channel.
    ///
    /// The `what` argument should be one of the options in the `GetMessages`
    /// enum, and will determine which messages will be returned. A message
    /// limit between 1 and 100 can also be specified, and defaults to 50.
    /// More recent messages will appear first in the list.
    fn get_messages(
        &self,
        channel: ChannelId,
        what: GetMessages,
        limit: Option<u8>,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Send a message to a given channel, uploading `files` along with it.
    fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
        files: Vec<FileUpload>,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Delete a previously posted message.
    ///
    /// Requires that either the message was posted by this user, or this user
    /// has permission to manage other members' messages.
    fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl MessageExt for Discord {
    async fn get_message(&self, channel: ChannelId, message: MessageId) -> Result<Message> {
        let message: Message = self
            .execute(RestRequest::get(
                format!("channels/{channel}/messages/:message_id"),
                format!("channels/{channel}/messages/{message}"),
            ))
            .await?
            .json()?;

        self.cache.rehydrate_message(&message);
        Ok(message)
    }

    async fn get_messages(
        &self,
        channel: ChannelId,
        what: GetMessages,
        limit: Option<u8>,
    ) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(50);
        if !(1..=100).contains(&limit) {
            return Err(Error::InvalidArgument("message limit must be between 1 and 100"));
        }

        let route = format!("channels/{channel}/messages");
        let mut request = RestRequest::get(route.clone(), route).query("limit", limit);
        request = match what {
            GetMessages::MostRecent => request,
            GetMessages::Before(id) => request.query("before", id),
            GetMessages::After(id) => request.query("after", id),
            GetMessages::Around(id) => request.query("around", id),
        };

        let messages: Vec<Message> = self.execute(request).await?.json()?;

        for message in &messages {
            self.cache.rehydrate_message(message);
        }
        Ok(messages)
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
        files: Vec<FileUpload>,
    ) -> Result<Message> {
        if content.is_empty() && files.is_empty() {
            return Err(Error::InvalidArgument("a message needs content or files"));
        }

        let route = format!("channels/{channel}/messages");
        let request = RestRequest::new(Method::POST, route.clone(), route)
            .json(json! {{ "content": content }})
            .files(files);

        let message: Message = self.execute(request).await?.json()?;

        self.cache.rehydrate_message(&message);
        Ok(message)
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: Option<&str>,
    ) -> Result<()> {
        let request = RestRequest::new(
            Method::DELETE,
            format!("channels/{channel}/messages/:message_id"),
            format!("channels/{channel}/messages/{message}"),
        )
        .maybe_reason(reason)?;

        self.execute(request).await?.insure_no_content()
    }
}

/// Argument to `get_messages` to specify the desired message retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetMessages {
    /// Get the N most recent messages.
    MostRecent,
    /// Get the first N messages before the specified message.
    Before(MessageId),
    /// Get the first N messages after the specified message.
    After(MessageId),
    /// Get N/2 messages before, N/2 messages after, and the specified message.
    Around(MessageId),
}
