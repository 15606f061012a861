//! OneDrive images over Microsoft Graph
//!
//! ## Pass shape
//!
//! 1. `GET /me/drive/bundles?$filter=bundle/album ne null` lists the photo
//!    albums; each album is cached as an entity of the root container and
//!    spawns a children listing.
//! 2. `GET /me/drive/items/{album}/children` lists the album's items; only
//!    items with an `image` or `photo` facet are kept.
//! 3. After the listings, photos written this pass that carry no thumbnails
//!    get a `GET /me/drive/items/{id}/thumbnails` lookup.
//!
//! Every listing follows `@odata.nextLink`. The item `eTag` is the version.
//!
//! See: <https://learn.microsoft.com/en-us/graph/api/drive-list-bundles>

use cloudsync_core::domain::{ContainerId, DataType, EntityId, Provider};
use cloudsync_core::ports::{
    BeginContext, FinalizeContext, HttpRequest, ISyncStrategy, PageRequest, ParseError,
    ParsedPage, RemoteRecord, RequestKind,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ProviderSettings;

/// Public Microsoft Graph endpoint
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const ALBUM_FILTER: &str = "bundle/album ne null";

// ============================================================================
// Microsoft Graph response types
// ============================================================================

/// One page of a Graph collection
#[derive(Debug, Deserialize)]
struct GraphPage {
    #[serde(default)]
    value: Vec<Value>,

    /// Present when more pages exist
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

fn item_id(item: &Value) -> Result<&str, ParseError> {
    item["id"]
        .as_str()
        .ok_or_else(|| ParseError::MissingField("id".into()))
}

fn etag(item: &Value) -> Option<String> {
    item["eTag"].as_str().map(str::to_string)
}

fn is_image(item: &Value) -> bool {
    item.get("image").is_some() || item.get("photo").is_some()
}

// ============================================================================
// Strategy
// ============================================================================

/// Photo albums of a OneDrive account
#[derive(Debug, Clone)]
pub struct OneDriveImages {
    settings: ProviderSettings,
}

impl OneDriveImages {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn top(&self) -> (&'static str, String) {
        ("$top", self.settings.page_size.to_string())
    }

    fn albums_request(&self) -> PageRequest {
        let url = self.settings.endpoint(
            "/me/drive/bundles",
            &[("$filter", ALBUM_FILTER.to_string()), self.top()],
        );
        PageRequest::list_containers(HttpRequest::get(url))
    }

    fn children_request(&self, album: ContainerId) -> PageRequest {
        let url = self
            .settings
            .endpoint(&format!("/me/drive/items/{}/children", album), &[self.top()]);
        PageRequest::list_entities(album, HttpRequest::get(url))
    }

    fn parse_albums(&self, request: &PageRequest, page: GraphPage) -> Result<ParsedPage, ParseError> {
        let mut parsed = ParsedPage::default();
        for item in page.value {
            let id = item_id(&item)?.to_string();
            let album = ContainerId::new(id.as_str())?;
            parsed.dependents.push(self.children_request(album));
            parsed.records.push(RemoteRecord::new(
                request.container.clone(),
                EntityId::new(id)?,
                etag(&item),
                item,
            ));
        }
        parsed.next_page = page
            .next_link
            .map(|next| request.continue_with(HttpRequest::get(next)));
        Ok(parsed)
    }

    fn parse_children(request: &PageRequest, page: GraphPage) -> Result<ParsedPage, ParseError> {
        let mut parsed = ParsedPage::default();
        for item in page.value.into_iter().filter(is_image) {
            let id = item_id(&item)?.to_string();
            parsed.records.push(RemoteRecord::new(
                request.container.clone(),
                EntityId::new(id)?,
                etag(&item),
                item,
            ));
        }
        parsed.next_page = page
            .next_link
            .map(|next| request.continue_with(HttpRequest::get(next)));
        Ok(parsed)
    }

    /// Re-emits the photo recorded in the request context with its thumbnails
    fn parse_thumbnails(request: &PageRequest, page: GraphPage) -> Result<ParsedPage, ParseError> {
        let ctx = &request.context;
        let entity = ctx["entity"]
            .as_str()
            .ok_or_else(|| ParseError::MissingField("context.entity".into()))?;
        let mut item = ctx["item"].clone();
        if let Some(fields) = item.as_object_mut() {
            fields.insert("thumbnails".to_string(), Value::Array(page.value));
        }

        Ok(ParsedPage {
            records: vec![RemoteRecord::new(
                request.container.clone(),
                EntityId::new(entity)?,
                ctx["version"].as_str().map(str::to_string),
                item,
            )],
            ..ParsedPage::default()
        })
    }
}

impl ISyncStrategy for OneDriveImages {
    fn provider(&self) -> Provider {
        Provider::OneDrive
    }

    fn data_type(&self) -> DataType {
        DataType::Images
    }

    fn begin_sync(&self, _ctx: &BeginContext) -> Vec<PageRequest> {
        // Bundles have no change filter; every pass lists all albums.
        vec![self.albums_request()]
    }

    fn parse_page(&self, request: &PageRequest, body: &[u8]) -> Result<ParsedPage, ParseError> {
        let page: GraphPage = serde_json::from_slice(body)?;
        match request.kind {
            RequestKind::ListContainers => self.parse_albums(request, page),
            RequestKind::ListEntities => Self::parse_children(request, page),
            RequestKind::FetchDetail => Self::parse_thumbnails(request, page),
        }
    }

    fn treats_as_success(&self, _request: &PageRequest, status: u16) -> bool {
        self.settings.is_benign(status)
    }

    fn finalize_requests(&self, ctx: &FinalizeContext<'_>) -> Vec<PageRequest> {
        ctx.written
            .iter()
            .filter(|r| !r.container.is_root() && r.payload.get("thumbnails").is_none())
            .map(|r| {
                let url = self
                    .settings
                    .endpoint(&format!("/me/drive/items/{}/thumbnails", r.entity), &[]);
                PageRequest::fetch_detail(r.container.clone(), HttpRequest::get(url))
                    .with_timeout(self.settings.transfer_timeout)
                    .with_context(json!({
                        "entity": r.entity.as_str(),
                        "version": r.version,
                        "item": r.payload,
                    }))
            })
            .collect()
    }
}
