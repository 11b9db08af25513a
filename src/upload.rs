// Media upload: the three-step wall photo protocol.
//
// 1. photos.getWallUploadServer -> upload URL
// 2. multipart POST of the file to that URL -> opaque {server, hash, photo}
// 3. photos.saveWallPhoto with the opaque triple -> {owner_id, id}

use crate::api::{decode_json, send, VkApi};
use crate::error::{PublishError, Result};
use crate::storage::LocalAsset;
use reqwest::blocking::multipart;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

const UPLOAD_SERVER_METHOD: &str = "photos.getWallUploadServer";
const SAVE_PHOTO_METHOD: &str = "photos.saveWallPhoto";
const UPLOAD_ORIGIN: &str = "upload server";

/// Where the next upload goes. An empty or relative `upload_url` fails to
/// decode, so a bad reply is rejected at discovery rather than at upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTicket {
    #[serde(rename = "upload_url")]
    pub endpoint: Url,
}

/// Reply of the upload server. Passed to the save step as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedMedia {
    #[serde(deserialize_with = "opaque_string")]
    pub server: String,
    pub hash: String,
    #[serde(rename = "photo")]
    pub photo_blob: String,
}

/// A photo saved server-side, ready to be attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PersistedMedia {
    pub owner_id: i64,
    #[serde(rename = "id")]
    pub media_id: i64,
}

impl PersistedMedia {
    /// Attachment reference in the `photo{owner_id}_{media_id}` form.
    pub fn attachment(&self) -> String {
        format!("photo{}_{}", self.owner_id, self.media_id)
    }
}

/// The upload server returns `server` as a number, older replies as a string.
fn opaque_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

pub struct MediaUploadClient {
    api: VkApi,
}

impl MediaUploadClient {
    pub fn new(api: VkApi) -> Self {
        MediaUploadClient { api }
    }

    /// Ask for an upload URL for the group's wall.
    pub fn upload_endpoint(&self) -> Result<UploadTicket> {
        let ticket: UploadTicket = self
            .api
            .get(UPLOAD_SERVER_METHOD, &[("group_id", self.api.group_id().to_string())])?;
        debug!(endpoint = %ticket.endpoint, "obtained upload endpoint");
        Ok(ticket)
    }

    /// Send the asset's bytes to the upload endpoint as the `photo` field.
    pub fn upload(&self, asset: &LocalAsset, ticket: &UploadTicket) -> Result<UploadedMedia> {
        let bytes = std::fs::read(asset.path()).map_err(|e| PublishError::storage(asset.path(), e))?;
        let file_name = asset.file_name().unwrap_or("comic.png").to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for(&file_name))
            .map_err(|e| PublishError::transport("preparing upload", e))?;
        let form = multipart::Form::new().part("photo", part);

        let body = send(
            self.api.client().post(ticket.endpoint.clone()).multipart(form),
            "uploading image",
        )?;
        let uploaded: UploadedMedia = decode_json(&body, UPLOAD_ORIGIN)?;
        if uploaded.photo_blob.is_empty() || uploaded.photo_blob == "[]" {
            return Err(PublishError::malformed(UPLOAD_ORIGIN, "upload server accepted no photo"));
        }
        info!(file = %file_name, "uploaded image");
        Ok(uploaded)
    }

    /// Save the uploaded photo on the group's wall album.
    pub fn persist(&self, uploaded: &UploadedMedia) -> Result<PersistedMedia> {
        let saved: Vec<PersistedMedia> = self.api.post(
            SAVE_PHOTO_METHOD,
            &[
                ("group_id", self.api.group_id().to_string()),
                ("server", uploaded.server.clone()),
                ("hash", uploaded.hash.clone()),
                ("photo", uploaded.photo_blob.clone()),
            ],
        )?;
        let media = saved
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::malformed(SAVE_PHOTO_METHOD, "no saved photo in reply"))?;
        info!(attachment = %media.attachment(), "saved photo");
        Ok(media)
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}
