// The publish pipeline.
//
// One run walks a fixed sequence of stages:
//
// ```text
// Init -> Fetched -> Downloaded -> EndpointObtained -> Uploaded -> Persisted -> Published -> Done
// ```
//
// Any failure ends the run in `Failed`. From `Downloaded` on, the local image
// is held by an `AssetGuard`, so it is deleted on both terminal paths. On
// success a failed delete is reported in `PublishReport` but does not fail
// the run; on failure the delete is attempted and the original error is
// returned unchanged.

use crate::api::VkApi;
use crate::comic::ComicSource;
use crate::config::{http_client, ApiConfig, FeedConfig, Settings};
use crate::error::{PublishError, Result};
use crate::publish::{PostReceipt, Publisher};
use crate::storage::AssetStore;
use crate::upload::MediaUploadClient;
use reqwest::blocking::Client;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Fetched,
    Downloaded,
    EndpointObtained,
    Uploaded,
    Persisted,
    Published,
    Done,
    Failed,
}

impl Stage {
    /// What the pipeline does next once it has reached this stage.
    pub fn next_action(self) -> &'static str {
        match self {
            Stage::Init => "Fetching comic metadata",
            Stage::Fetched => "Downloading image",
            Stage::Downloaded => "Requesting upload server",
            Stage::EndpointObtained => "Uploading image",
            Stage::Uploaded => "Saving photo",
            Stage::Persisted => "Publishing on the group wall",
            Stage::Published => "Removing temporary file",
            Stage::Done | Stage::Failed => "Finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Receives stage transitions while a run is in progress.
pub trait StageObserver {
    fn entered(&mut self, _stage: Stage) {}

    /// `last` is the last stage that was reached before the failure.
    fn failed(&mut self, _last: Stage, _error: &PublishError) {}
}

impl StageObserver for () {}

/// Summary of a successful run.
#[derive(Debug)]
pub struct PublishReport {
    pub caption: String,
    pub comic_number: Option<u32>,
    pub post: PostReceipt,
    /// Set when the temporary file could not be removed after publishing.
    pub cleanup_error: Option<PublishError>,
}

pub struct Pipeline {
    source: ComicSource,
    store: AssetStore,
    uploader: MediaUploadClient,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(
        source: ComicSource,
        store: AssetStore,
        uploader: MediaUploadClient,
        publisher: Publisher,
    ) -> Self {
        Pipeline {
            source,
            store,
            uploader,
            publisher,
        }
    }

    /// Wire every component from `settings`, sharing one HTTP client.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::with_client(settings, http_client()?))
    }

    /// Load credentials through `lookup` and wire a pipeline. A missing
    /// credential fails here, before any request is made.
    pub fn from_lookup<F>(
        lookup: F,
        api: ApiConfig,
        feed: FeedConfig,
        storage_dir: impl Into<PathBuf>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_settings(&Settings::from_lookup(lookup, api, feed, storage_dir)?)
    }

    pub fn with_client(settings: &Settings, client: Client) -> Self {
        let api = VkApi::new(client.clone(), settings.api.clone(), settings.credentials.clone());
        Pipeline::new(
            ComicSource::new(client.clone(), settings.feed.clone()),
            AssetStore::new(client, settings.storage_dir.clone()),
            MediaUploadClient::new(api.clone()),
            Publisher::new(api),
        )
    }

    /// Execute one run. No step is retried.
    pub fn run(&self, observer: &mut dyn StageObserver) -> Result<PublishReport> {
        let mut tracker = Tracker {
            stage: Stage::Init,
            observer,
        };
        tracker.observer.entered(Stage::Init);

        match self.execute(&mut tracker) {
            Ok(report) => {
                tracker.advance(Stage::Done);
                Ok(report)
            }
            Err(e) => {
                // the asset guard has been dropped by now
                let last = tracker.stage;
                error!(stage = %last, error = %e, "publish run failed");
                tracker.stage = Stage::Failed;
                tracker.observer.failed(last, &e);
                Err(e)
            }
        }
    }

    fn execute(&self, tracker: &mut Tracker<'_>) -> Result<PublishReport> {
        self.store.ensure_directory()?;
        let comic = self.source.fetch()?;
        tracker.advance(Stage::Fetched);

        let asset = self.store.download(&comic.image_url)?;
        tracker.advance(Stage::Downloaded);

        let ticket = self.uploader.upload_endpoint()?;
        tracker.advance(Stage::EndpointObtained);

        let uploaded = self.uploader.upload(asset.asset(), &ticket)?;
        tracker.advance(Stage::Uploaded);

        let media = self.uploader.persist(&uploaded)?;
        tracker.advance(Stage::Persisted);

        let post = self.publisher.post(&media, &comic.caption)?;
        tracker.advance(Stage::Published);

        let cleanup_error = asset.release().err();
        if let Some(e) = &cleanup_error {
            warn!(error = %e, "post published but temporary file was not removed");
        }

        Ok(PublishReport {
            caption: comic.caption,
            comic_number: comic.number,
            post,
            cleanup_error,
        })
    }
}

struct Tracker<'a> {
    stage: Stage,
    observer: &'a mut dyn StageObserver,
}

impl Tracker<'_> {
    fn advance(&mut self, stage: Stage) {
        info!(from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
        self.observer.entered(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_describes_its_next_action() {
        let stages = [
            Stage::Init,
            Stage::Fetched,
            Stage::Downloaded,
            Stage::EndpointObtained,
            Stage::Uploaded,
            Stage::Persisted,
            Stage::Published,
        ];
        for stage in stages {
            assert_ne!(stage.next_action(), "Finished", "{stage}");
        }
        assert_eq!(Stage::Done.next_action(), "Finished");
    }
}
