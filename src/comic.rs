// Comic source: reads one comic's metadata from the xkcd JSON feed.

use crate::api::{decode_json, send};
use crate::config::{ComicSelection, FeedConfig};
use crate::error::{PublishError, Result};
use rand::Rng;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

/// xkcd never published a comic with this number.
const MISSING_COMIC: u32 = 404;

const FEED_ORIGIN: &str = "comic feed";

/// What a run publishes: the image and the caption that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicMetadata {
    pub image_url: Url,
    pub caption: String,
    pub number: Option<u32>,
    pub title: Option<String>,
}

/// Raw feed entry. Only `img` and `alt` are required.
#[derive(Deserialize)]
struct FeedEntry {
    img: String,
    alt: String,
    #[serde(default)]
    num: Option<u32>,
    #[serde(default)]
    title: Option<String>,
}

impl TryFrom<FeedEntry> for ComicMetadata {
    type Error = PublishError;

    fn try_from(entry: FeedEntry) -> Result<Self> {
        let image_url = Url::parse(&entry.img).map_err(|e| {
            PublishError::malformed(FEED_ORIGIN, format!("invalid image URL {:?}: {e}", entry.img))
        })?;
        Ok(ComicMetadata {
            image_url,
            caption: entry.alt,
            number: entry.num,
            title: entry.title,
        })
    }
}

pub struct ComicSource {
    client: Client,
    config: FeedConfig,
}

impl ComicSource {
    pub fn new(client: Client, config: FeedConfig) -> Self {
        ComicSource { client, config }
    }

    /// Fetch the comic selected by the feed configuration.
    pub fn fetch(&self) -> Result<ComicMetadata> {
        let comic = match self.config.selection {
            ComicSelection::Latest => self.fetch_entry(&self.latest_url())?,
            ComicSelection::Random => self.fetch_random()?,
        };
        let comic = ComicMetadata::try_from(comic)?;
        info!(number = ?comic.number, image = %comic.image_url, "fetched comic");
        Ok(comic)
    }

    fn fetch_random(&self) -> Result<FeedEntry> {
        let latest = self.fetch_entry(&self.latest_url())?;
        let newest = latest.num.ok_or_else(|| {
            PublishError::malformed(FEED_ORIGIN, "latest comic has no `num`, cannot pick one at random")
        })?;
        let number = pick_number(&mut rand::thread_rng(), newest);
        if latest.num == Some(number) {
            return Ok(latest);
        }
        self.fetch_entry(&self.comic_url(number))
    }

    fn fetch_entry(&self, url: &str) -> Result<FeedEntry> {
        debug!(%url, "GET comic feed");
        let body = send(self.client.get(url), "fetching comic metadata")?;
        decode_json(&body, FEED_ORIGIN)
    }

    fn latest_url(&self) -> String {
        format!("{}/info.0.json", self.config.base_url.trim_end_matches('/'))
    }

    fn comic_url(&self, number: u32) -> String {
        format!("{}/{number}/info.0.json", self.config.base_url.trim_end_matches('/'))
    }
}

/// Uniform pick in `1..=newest`, never the missing #404.
fn pick_number<R: Rng>(rng: &mut R, newest: u32) -> u32 {
    let newest = newest.max(1);
    loop {
        let n = rng.gen_range(1..=newest);
        if n != MISSING_COMIC {
            return n;
        }
    }
}
