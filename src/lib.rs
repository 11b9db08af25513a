// Library root
// -----------
// Publishes the current xkcd comic on a VK community wall. The binary
// (`main.rs`) only parses flags, loads credentials and hands a `Settings`
// value to `pipeline::Pipeline`.
//
// Module responsibilities:
// - `comic`: reads comic metadata from the xkcd JSON feed.
// - `storage`: owns the single downloaded image and deletes it on every exit.
// - `api`: authenticated VK API calls and the shared error-object check.
// - `upload`: the three-step wall photo upload.
// - `publish`: the wall post itself.
// - `pipeline`: runs the steps in order and tracks the stage reached.
// - `ui`: terminal progress and outcome reporting.
pub mod api;
pub mod comic;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod storage;
pub mod ui;
pub mod upload;

pub use config::{Credentials, Settings};
pub use error::{ErrorKind, PublishError, Result};
pub use pipeline::{Pipeline, PublishReport, Stage, StageObserver};
