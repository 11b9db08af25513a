// Wall publisher: posts a saved photo with its caption on behalf of the group.

use crate::api::VkApi;
use crate::error::Result;
use crate::upload::PersistedMedia;
use serde::Deserialize;
use tracing::info;

const WALL_POST_METHOD: &str = "wall.post";

/// What we know about a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub attachment: String,
    pub post_id: Option<i64>,
}

/// Success needs nothing beyond the absence of `error`; `post_id` is kept
/// when the provider sends it.
#[derive(Deserialize, Default)]
struct WallPostReply {
    #[serde(default)]
    post_id: Option<i64>,
}

pub struct Publisher {
    api: VkApi,
}

impl Publisher {
    pub fn new(api: VkApi) -> Self {
        Publisher { api }
    }

    /// Post `media` with `caption` to the group wall, as the group.
    pub fn post(&self, media: &PersistedMedia, caption: &str) -> Result<PostReceipt> {
        let attachment = media.attachment();
        let reply: serde_json::Value = self.api.post(
            WALL_POST_METHOD,
            &[
                // negative owner id addresses a community wall
                ("owner_id", format!("-{}", self.api.group_id())),
                ("from_group", "1".to_string()),
                ("message", caption.to_string()),
                ("attachments", attachment.clone()),
            ],
        )?;
        let reply: WallPostReply = serde_json::from_value(reply).unwrap_or_default();

        info!(%attachment, post_id = ?reply.post_id, "published post");
        Ok(PostReceipt {
            attachment,
            post_id: reply.post_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, Credentials};
    use crate::error::ErrorKind;
    use mockito::Matcher;
    use reqwest::blocking::Client;

    fn publisher(server: &mockito::Server) -> Publisher {
        Publisher::new(VkApi::new(
            Client::new(),
            ApiConfig {
                base_url: format!("{}/method", server.url()),
                version: "5.131".into(),
            },
            Credentials::new("tok", 42),
        ))
    }

    #[test]
    fn posts_as_group_with_attachment() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/method/wall.post")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("owner_id".into(), "-42".into()),
                Matcher::UrlEncoded("from_group".into(), "1".into()),
                Matcher::UrlEncoded("message".into(), "hello world".into()),
                Matcher::UrlEncoded("attachments".into(), "photo-42_17".into()),
                Matcher::UrlEncoded("v".into(), "5.131".into()),
            ]))
            .with_body(r#"{"response": {"post_id": 99}}"#)
            .create();

        let receipt = publisher(&server)
            .post(&PersistedMedia { owner_id: -42, media_id: 17 }, "hello world")
            .unwrap();
        assert_eq!(
            receipt,
            PostReceipt {
                attachment: "photo-42_17".into(),
                post_id: Some(99),
            }
        );
        mock.assert();
    }

    #[test]
    fn reply_without_post_id_still_succeeds() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/method/wall.post")
            .with_body(r#"{"response": 1}"#)
            .create();

        let receipt = publisher(&server)
            .post(&PersistedMedia { owner_id: 1, media_id: 2 }, "")
            .unwrap();
        assert_eq!(receipt.post_id, None);
    }

    #[test]
    fn error_object_fails_the_post() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/method/wall.post")
            .with_body(r#"{"error": {"error_code": 214, "error_msg": "Access to adding post denied"}}"#)
            .create();

        let err = publisher(&server)
            .post(&PersistedMedia { owner_id: 1, media_id: 2 }, "x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteApi);
    }
}
