use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedpull_core::{HarvestConfig, LibrarySelector};

pub const TEST_TOKEN: &str = "test-bearer";
pub const COLLECTION: &str = "v1L1BDAAAAA2R";

/// Catalogue API double serving `total` products two per page.
pub struct CatalogServer {
    pub server: MockServer,
    pub total: usize,
}

pub const PAGE_LIMIT: usize = 2;

impl CatalogServer {
    pub async fn start(total: usize) -> Self {
        let server = MockServer::start().await;
        let catalog = Self { server, total };
        catalog.mount_library().await;
        catalog.mount_pages().await;
        catalog.mount_sub_resources().await;
        catalog
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> HarvestConfig {
        HarvestConfig {
            base_url: self.uri(),
            page_size: PAGE_LIMIT as u32,
            ..HarvestConfig::default()
        }
        .with_concurrency(3)
    }

    pub fn library(&self) -> LibrarySelector {
        LibrarySelector::new("1225")
    }

    fn product(&self, n: usize) -> Value {
        let base = format!("{}/v1/collections/{COLLECTION}/products/ID-{n}", self.uri());
        let base_v2 = format!("{}/v2/collections/{COLLECTION}/products/ID-{n}", self.uri());
        json!({
            "id": format!("ID-{n}"),
            "title": format!("Title {n}"),
            "links": {
                "metadata": {"href": format!("{base}/metadata")},
                "availability": {"href": format!("{base}/availability")},
                "availabilityV2": {"href": format!("{base_v2}/availability")},
            }
        })
    }

    fn page(&self, offset: usize) -> Value {
        let products: Vec<Value> = (offset + 1..=self.total)
            .take(PAGE_LIMIT)
            .map(|n| self.product(n))
            .collect();
        json!({
            "totalItems": self.total,
            "limit": PAGE_LIMIT,
            "offset": offset,
            "products": products,
        })
    }

    async fn mount_library(&self) {
        Mock::given(method("GET"))
            .and(path("/v1/libraries/1225"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"collectionToken": COLLECTION})),
            )
            .mount(&self.server)
            .await;
    }

    async fn mount_pages(&self) {
        let products = format!("/v1/collections/{COLLECTION}/products");
        Mock::given(method("GET"))
            .and(path(products.as_str()))
            .and(query_param_is_missing("offset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.page(0)))
            .mount(&self.server)
            .await;

        for offset in (0..self.total).step_by(PAGE_LIMIT) {
            Mock::given(method("GET"))
                .and(path(products.as_str()))
                .and(query_param("offset", offset.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(self.page(offset)))
                .mount(&self.server)
                .await;
        }
    }

    async fn mount_sub_resources(&self) {
        for n in 1..=self.total {
            let id = format!("ID-{n}");
            let v1 = format!("/v1/collections/{COLLECTION}/products/{id}");
            Mock::given(method("GET"))
                .and(path(format!("{v1}/metadata")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"id": id, "publisher": "Test Press"})),
                )
                .mount(&self.server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("{v1}/availability")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"id": id, "available": true})),
                )
                .mount(&self.server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!(
                    "/v2/collections/{COLLECTION}/products/{id}/availability"
                )))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"reserveId": id, "copiesOwned": 2})),
                )
                .mount(&self.server)
                .await;
        }
    }
}
