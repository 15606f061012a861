//! Dropbox images from the camera uploads folder
//!
//! `POST /2/files/list_folder` lists the folder, then
//! `POST /2/files/list_folder/continue` with the returned `cursor` is
//! repeated while `has_more` is set. Only image files are kept and `rev`
//! is the version marker. The folder itself is cached as an entity of the
//! root container so that orphan sweeps keep its files.
//!
//! A 409 (`path/not_found`) on the first `list_folder` means the folder is
//! gone and is read as an empty final page, so its cached files are
//! removed. A 409 on a continuation (reset cursor) fails the listing.

use cloudsync_core::domain::{ContainerId, DataType, EntityId, Provider};
use cloudsync_core::ports::{
    BeginContext, HttpRequest, ISyncStrategy, PageRequest, ParseError, ParsedPage, RemoteRecord,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ProviderSettings;

/// Public Dropbox API endpoint
pub const DROPBOX_BASE_URL: &str = "https://api.dropboxapi.com";

/// Folder listed when none is configured
pub const CAMERA_UPLOADS: &str = "/Camera Uploads";

/// Dropbox answers 409 for endpoint-specific errors such as a missing path
const STATUS_CONFLICT: u16 = 409;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "heic", "webp", "bmp", "tiff"];

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    #[serde(default)]
    entries: Vec<Value>,
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

fn is_image_file(entry: &Value) -> bool {
    if entry[".tag"].as_str() != Some("file") {
        return false;
    }
    entry["name"]
        .as_str()
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Image files of a Dropbox account's camera uploads folder
#[derive(Debug, Clone)]
pub struct DropboxImages {
    settings: ProviderSettings,
    folder: String,
}

impl DropboxImages {
    pub fn new(settings: ProviderSettings) -> Self {
        Self::with_folder(settings, CAMERA_UPLOADS)
    }

    /// Lists `folder` instead of the camera uploads folder
    pub fn with_folder(settings: ProviderSettings, folder: impl Into<String>) -> Self {
        Self {
            settings,
            folder: folder.into(),
        }
    }

    fn container(&self) -> Result<ContainerId, ParseError> {
        Ok(ContainerId::new(self.folder.to_lowercase())?)
    }

    fn folder_record(&self, container: &ContainerId) -> RemoteRecord {
        RemoteRecord::new(
            ContainerId::root(),
            EntityId::from(container),
            Some(container.to_string()),
            json!({"path_display": self.folder}),
        )
    }
}

impl ISyncStrategy for DropboxImages {
    fn provider(&self) -> Provider {
        Provider::Dropbox
    }

    fn data_type(&self) -> DataType {
        DataType::Images
    }

    fn begin_sync(&self, _ctx: &BeginContext) -> Vec<PageRequest> {
        let Ok(container) = self.container() else {
            tracing::warn!(folder = %self.folder, "Dropbox folder path is empty, nothing to list");
            return Vec::new();
        };
        let url = self.settings.endpoint("/2/files/list_folder", &[]);
        let body = json!({
            "path": self.folder,
            "recursive": false,
            "limit": self.settings.page_size,
        });
        vec![PageRequest::list_entities(container, HttpRequest::post_json(url, body))]
    }

    fn parse_page(&self, request: &PageRequest, body: &[u8]) -> Result<ParsedPage, ParseError> {
        let result: ListFolderResult = serde_json::from_slice(body)?;
        let mut parsed = ParsedPage::default();
        parsed.records.push(self.folder_record(&request.container));

        for entry in result.entries.into_iter().filter(is_image_file) {
            let id = entry["id"]
                .as_str()
                .ok_or_else(|| ParseError::MissingField("id".into()))?
                .to_string();
            let rev = entry["rev"].as_str().map(str::to_string);
            parsed.records.push(RemoteRecord::new(
                request.container.clone(),
                EntityId::new(id)?,
                rev,
                entry,
            ));
        }

        if result.has_more {
            let cursor = result.cursor.ok_or_else(|| {
                ParseError::InvalidContinuation("has_more without a cursor".into())
            })?;
            let url = self.settings.endpoint("/2/files/list_folder/continue", &[]);
            parsed.next_page = Some(
                request.continue_with(HttpRequest::post_json(url, json!({ "cursor": cursor }))),
            );
        }
        Ok(parsed)
    }

    fn treats_as_success(&self, request: &PageRequest, status: u16) -> bool {
        // On `list_folder/continue` a 409 means the cursor was reset or expired
        if request.is_continuation() {
            return false;
        }
        status == STATUS_CONFLICT || self.settings.is_benign(status)
    }
}
