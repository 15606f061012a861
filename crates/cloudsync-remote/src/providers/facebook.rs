//! Facebook images over the Graph API
//!
//! `GET /me/albums` lists the albums, then `GET /{album}/photos` lists each
//! album's photos. Pages are chained through `paging.next`, which already
//! carries the access token; the token otherwise travels as the
//! `access_token` query parameter. `updated_time` is the version marker.

use cloudsync_core::domain::{ContainerId, DataType, EntityId, Provider};
use cloudsync_core::ports::{
    AuthPlacement, BeginContext, HttpRequest, ISyncStrategy, PageRequest, ParseError, ParsedPage,
    RemoteRecord, RequestKind,
};
use serde::Deserialize;
use serde_json::Value;

use super::ProviderSettings;

/// Public Facebook Graph endpoint
pub const FACEBOOK_BASE_URL: &str = "https://graph.facebook.com/v19.0";

const ALBUM_FIELDS: &str = "id,name,count,updated_time";
const PHOTO_FIELDS: &str = "id,name,images,created_time,updated_time";

#[derive(Debug, Deserialize)]
struct FacebookPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

/// Photo albums of a Facebook account
#[derive(Debug, Clone)]
pub struct FacebookImages {
    settings: ProviderSettings,
}

impl FacebookImages {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn get(url: String) -> HttpRequest {
        HttpRequest::get(url).with_auth(AuthPlacement::QueryParameter("access_token".into()))
    }

    fn albums_request(&self) -> PageRequest {
        let url = self.settings.endpoint(
            "/me/albums",
            &[
                ("fields", ALBUM_FIELDS.to_string()),
                ("limit", self.settings.page_size.to_string()),
            ],
        );
        PageRequest::list_containers(Self::get(url))
    }

    fn photos_request(&self, album: ContainerId) -> PageRequest {
        let url = self.settings.endpoint(
            &format!("/{}/photos", album),
            &[
                ("fields", PHOTO_FIELDS.to_string()),
                ("limit", self.settings.page_size.to_string()),
            ],
        );
        PageRequest::list_entities(album, Self::get(url))
    }
}

impl ISyncStrategy for FacebookImages {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    fn data_type(&self) -> DataType {
        DataType::Images
    }

    fn begin_sync(&self, _ctx: &BeginContext) -> Vec<PageRequest> {
        vec![self.albums_request()]
    }

    fn parse_page(&self, request: &PageRequest, body: &[u8]) -> Result<ParsedPage, ParseError> {
        let page: FacebookPage = serde_json::from_slice(body)?;
        let mut parsed = ParsedPage::default();

        for item in page.data {
            let id = item["id"]
                .as_str()
                .ok_or_else(|| ParseError::MissingField("id".into()))?
                .to_string();
            if request.kind == RequestKind::ListContainers {
                parsed
                    .dependents
                    .push(self.photos_request(ContainerId::new(id.as_str())?));
            }
            let version = item["updated_time"].as_str().map(str::to_string);
            parsed.records.push(RemoteRecord::new(
                request.container.clone(),
                EntityId::new(id)?,
                version,
                item,
            ));
        }

        parsed.next_page = page
            .paging
            .and_then(|p| p.next)
            .map(|next| request.continue_with(Self::get(next)));
        Ok(parsed)
    }

    fn treats_as_success(&self, _request: &PageRequest, status: u16) -> bool {
        self.settings.is_benign(status)
    }
}
