#![allow(dead_code)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use discord_rest::{Discord, LoginExt, RestConfig, RetryPolicy};
use parking_lot::Mutex;
use serde_json::{json, Value};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

/// A client talking to the mock server, retrying failures quickly.
pub fn client(server: &MockServer) -> Discord {
    client_with(server, |config| config)
}

pub fn client_with(server: &MockServer, f: impl FnOnce(RestConfig) -> RestConfig) -> Discord {
    let config = RestConfig::default()
        .with_api_base(server.uri())
        .with_retry_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
        });

    Discord::from_bot_token_with_config("test-token", f(config))
        .expect("client should build against the mock server")
}

pub fn user(id: u64, name: &str) -> Value {
    json!({ "id": id.to_string(), "username": name, "discriminator": "0" })
}

pub fn member(id: u64, name: &str) -> Value {
    json!({
        "user": user(id, name),
        "roles": [],
        "joined_at": "2015-04-26T06:26:56.936000+00:00",
        "deaf": false,
        "mute": false
    })
}

pub fn message(id: u64, channel: u64, author: Value) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel.to_string(),
        "content": "hello",
        "author": author,
        "timestamp": "2015-04-26T06:26:56.936000+00:00"
    })
}

/// Rate limit headers for a bucket.
pub fn limited(template: ResponseTemplate, limit: u32, remaining: u32, reset_after: f64) -> ResponseTemplate {
    template
        .insert_header("x-ratelimit-limit", limit.to_string().as_str())
        .insert_header("x-ratelimit-remaining", remaining.to_string().as_str())
        .insert_header("x-ratelimit-reset-after", reset_after.to_string().as_str())
        .insert_header("x-ratelimit-bucket", "abcd1234")
}

/// Responds with a two request window: the first request of a window sees
/// one remaining slot, the second none. Remembers when each request arrived.
#[derive(Clone, Default)]
pub struct TwoPerWindow {
    pub arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for TwoPerWindow {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let mut arrivals = self.arrivals.lock();
        arrivals.push(Instant::now());
        let remaining = if arrivals.len() % 2 == 1 { 1 } else { 0 };

        limited(
            ResponseTemplate::new(200).set_body_json(user(1, "nelly")),
            2,
            remaining,
            1.0,
        )
    }
}
