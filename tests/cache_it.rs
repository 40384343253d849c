mod common;

use std::sync::Arc;

use discord_rest::{
    model::{ChannelId, GuildId, MessageId, RoleId, UserId, WebhookId},
    FileUpload, GuildExt, MessageExt, UserExt, WebhookExt,
};
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::*;

#[tokio::test]
async fn added_member_is_readable_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/guilds/9/members/2"))
        .and(body_partial_json(json!({ "access_token": "oauth", "roles": ["3"] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(member(2, "newcomer")))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    let added = discord
        .add_member(GuildId(9), UserId(2), "oauth", None, &[RoleId(3)])
        .await
        .unwrap()
        .unwrap();

    let cached = discord.cache().member(GuildId(9), UserId(2)).unwrap();
    assert!(Arc::ptr_eq(&added, &cached));
    assert_eq!(cached.read().guild_id, Some(GuildId(9)));
    assert_eq!(discord.cache().user(UserId(2)).unwrap().read().name, "newcomer");
}

#[tokio::test]
async fn adding_an_existing_member_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/guilds/9/members/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    let added = discord
        .add_member(GuildId(9), UserId(2), "oauth", Some("nick"), &[])
        .await
        .unwrap();

    assert!(added.is_none());
    assert_eq!(discord.cache().len_members(), 0);
}

#[tokio::test]
async fn latest_response_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user(1, "before")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user(1, "after")))
        .mount(&server)
        .await;
    let discord = client(&server);

    let first = discord.get_user(UserId(1)).await.unwrap();
    assert_eq!(first.read().name, "before");
    let second = discord.get_user(UserId(1)).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.read().name, "after");
    assert_eq!(discord.cache().len_users(), 1);
}

#[tokio::test]
async fn listed_members_fill_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/9/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([member(1, "a"), member(2, "b")])))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    let members = discord.list_members(GuildId(9), 1000, None).await.unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(discord.cache().len_members(), 2);
    assert_eq!(discord.cache().len_users(), 2);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].url.query(), Some("limit=1000"));
}

#[tokio::test]
async fn guilds_and_roles_are_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9",
            "name": "guild",
            "roles": [{ "id": "9", "name": "@everyone", "permissions": "104324673" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/guilds/9/roles"))
        .and(header("x-audit-log-reason", "new team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "11", "name": "mods", "color": 3447003, "permissions": "0"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    let guild = discord.get_guild(GuildId(9), true).await.unwrap();
    let role = discord
        .create_role(GuildId(9), "mods", Some(3447003), Some("new team"))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&guild, &discord.cache().guild(GuildId(9)).unwrap()));
    assert!(Arc::ptr_eq(&role, &discord.cache().role(RoleId(11)).unwrap()));
    assert_eq!(
        discord.cache().role(GuildId(9).everyone()).unwrap().read().permission_bits(),
        Some(104324673)
    );
    let roles: Vec<_> = guild.read().roles.iter().map(|role| role.id).collect();
    assert_eq!(roles, [RoleId(9), RoleId(11)]);
}

#[tokio::test]
async fn cached_members_follow_user_updates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/9/members/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(member(2, "old")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user(2, "new")))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    let member = discord.get_member(GuildId(9), UserId(2)).await.unwrap();
    discord.get_user(UserId(2)).await.unwrap();

    assert_eq!(member.read().user.as_ref().unwrap().name, "new");
    assert_eq!(member.read().display_name(), Some("new"));
}

#[tokio::test]
async fn webhook_authors_stay_out_of_the_cache() {
    let server = MockServer::start().await;
    let mut sent = message(
        20,
        4,
        json!({ "id": "5", "username": "Captain Hook", "discriminator": "0000", "bot": true }),
    );
    sent["webhook_id"] = json!("5");
    sent["mentions"] = json!([user(6, "mentioned")]);
    Mock::given(method("POST"))
        .and(path("/webhooks/5/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent))
        .mount(&server)
        .await;
    let discord = client(&server);

    let message = discord
        .execute_webhook(WebhookId(5), "secret", "hello", Vec::new(), true)
        .await
        .unwrap()
        .unwrap();

    assert!(message.is_webhook());
    assert!(discord.cache().user(UserId(5)).is_none());
    assert!(discord.cache().user(UserId(6)).is_some());
    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].url.query(), Some("wait=true"));
}

#[tokio::test]
async fn message_authors_are_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/4/messages/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(20, 4, user(1, "author"))))
        .mount(&server)
        .await;
    let discord = client(&server);

    let message = discord.get_message(ChannelId(4), MessageId(20)).await.unwrap();

    assert_eq!(message.content, "hello");
    assert_eq!(discord.cache().user(UserId(1)).unwrap().read().name, "author");
}

#[tokio::test]
async fn attachments_are_sent_as_multipart_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/4/messages"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/4/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(20, 4, user(1, "bot"))))
        .mount(&server)
        .await;
    let discord = client(&server);

    discord
        .send_message(
            ChannelId(4),
            "see attached",
            vec![FileUpload::new("notes.txt", "some notes").content_type("text/plain")],
        )
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    for request in received {
        let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains("name=\"payload_json\""));
        assert!(body.contains(r#"{"content":"see attached"}"#));
        assert!(body.contains("name=\"files[0]\"; filename=\"notes.txt\""));
        assert!(body.contains("some notes"));
    }
}

#[tokio::test]
async fn audit_log_reason_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/4/messages/20"))
        .and(header("x-audit-log-reason", "spam wave"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/guilds/9/bans/2"))
        .and(header("x-audit-log-reason", "raid"))
        .and(body_partial_json(json!({ "delete_message_seconds": 3600 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let discord = client(&server);

    discord
        .delete_message(ChannelId(4), MessageId(20), Some("spam wave"))
        .await
        .unwrap();
    discord
        .ban_member(GuildId(9), UserId(2), 3600, Some("raid"))
        .await
        .unwrap();
}
