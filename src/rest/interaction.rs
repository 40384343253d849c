use std::future::Future;

use reqwest::Method;
use serde_json::Value;

use crate::{
    error::{Result, StatusChecks},
    model::InteractionId,
};

use super::{Discord, RestRequest};

/// Discord REST API methods for answering interactions.
pub trait InteractionExt {
    /// Respond to an interaction.
    ///
    /// `response` is the interaction response object, e.g.
    /// `{ "type": 4, "data": { "content": "pong" } }`. Callbacks are not
    /// subject to any rate limit, so this never waits.
    fn create_interaction_response(
        &self,
        interaction: InteractionId,
        token: &str,
        response: Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl InteractionExt for Discord {
    async fn create_interaction_response(
        &self,
        interaction: InteractionId,
        token: &str,
        response: Value,
    ) -> Result<()> {
        let request = RestRequest::new(
            Method::POST,
            format!("interactions/{interaction}/:interaction_token/callback"),
            format!("interactions/{interaction}/{token}/callback"),
        )
        .json(response)
        .exempt_from_all();

        self.execute(request).await?.insure_no_content()
    }
}
