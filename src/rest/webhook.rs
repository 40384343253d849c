use std::future::Future;

use reqwest::{Method, StatusCode};
use serde_json::json;

use crate::{
    error::{Error, Result},
    model::{Message, WebhookId},
};

use super::{Discord, FileUpload, RestRequest};

/// Discord REST API methods for webhooks.
///
/// Requests authorized by a webhook token do not count against the bot's
/// global rate limit, only against the webhook's own bucket.
pub trait WebhookExt {
    /// Post a message through a webhook.
    ///
    /// With `wait` set, Discord confirms delivery and the created message is
    /// returned; otherwise `None` is.
    fn execute_webhook(
        &self,
        webhook: WebhookId,
        token: &str,
        content: &str,
        files: Vec<FileUpload>,
        wait: bool,
    ) -> impl Future<Output = Result<Option<Message>>> + Send;
}

impl WebhookExt for Discord {
    async fn execute_webhook(
        &self,
        webhook: WebhookId,
        token: &str,
        content: &str,
        files: Vec<FileUpload>,
        wait: bool,
    ) -> Result<Option<Message>> {
        if content.is_empty() && files.is_empty() {
            return Err(Error::InvalidArgument("a message needs content or files"));
        }

        let request = RestRequest::new(
            Method::POST,
            format!("webhooks/{webhook}/:webhook_token"),
            format!("webhooks/{webhook}/{token}"),
        )
        .query("wait", wait)
        .json(json! {{ "content": content }})
        .files(files)
        .exempt_from_global();

        let response = self.execute(request).await?;
        if !wait || response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let message: Message = response.json()?;
        self.cache.rehydrate_message(&message);
        Ok(Some(message))
    }
}
