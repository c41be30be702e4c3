use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use feedpull_client::ReqwestFetcher;
use feedpull_core::{AppError, Harvester, SilentReporter, SubResource};

use crate::common::{COLLECTION, CatalogServer, TEST_TOKEN};

#[tokio::test]
async fn listing_only_harvest_over_http() -> anyhow::Result<()> {
    let catalog = CatalogServer::start(5).await;
    let fetcher = ReqwestFetcher::new(&catalog.uri(), TEST_TOKEN)?;

    let report = Harvester::new(fetcher, catalog.config())?
        .run(&catalog.library(), &SilentReporter)
        .await?;

    assert_eq!(report.records.len(), 5);
    assert_eq!(report.stats.pages_fetched, 3);
    assert!(report.records.iter().all(|r| r.sub_resource(SubResource::Metadata).is_none()));
    Ok(())
}

#[tokio::test]
async fn full_harvest_over_http_merges_sub_resources() -> anyhow::Result<()> {
    let catalog = CatalogServer::start(4).await;
    let fetcher = ReqwestFetcher::new(&catalog.uri(), TEST_TOKEN)?;
    let config = catalog.config().with_metadata(true).with_availability(true);

    let report = Harvester::new(fetcher, config)?
        .run(&catalog.library(), &SilentReporter)
        .await?;

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.stats.planned_requests, 2 + 4 * 3);
    assert_eq!(report.stats.sub_resources_fetched, 12);

    let record = report
        .records
        .iter()
        .find(|r| r.listing()["id"] == "ID-3")
        .expect("ID-3 harvested");
    let value = serde_json::to_value(record)?;
    assert_eq!(value["title"], "Title 3");
    assert_eq!(value["metadata"]["publisher"], "Test Press");
    assert_eq!(value["availability"]["available"], true);
    assert_eq!(value["availabilityV2"]["copiesOwned"], 2);
    Ok(())
}

#[tokio::test]
async fn transient_server_errors_are_retried() -> anyhow::Result<()> {
    let catalog = CatalogServer::start(2).await;
    let metadata = format!("/v1/collections/{COLLECTION}/products/ID-1/metadata");
    // Outranks the healthy mock until its two uses run out.
    Mock::given(method("GET"))
        .and(path(metadata.as_str()))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&catalog.server)
        .await;

    let fetcher = ReqwestFetcher::new(&catalog.uri(), TEST_TOKEN)?;
    let report = Harvester::new(fetcher, catalog.config().with_metadata(true))?
        .run(&catalog.library(), &SilentReporter)
        .await?;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stats.retries, 2);
    assert_eq!(report.ledger.failures(&metadata), 2);
    Ok(())
}

#[tokio::test]
async fn unauthorised_lookup_aborts_with_diagnostic() -> anyhow::Result<()> {
    let catalog = CatalogServer::start(1).await;
    Mock::given(method("GET"))
        .and(path("/v1/libraries/1225"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"errorCode": "Unauthorized", "message": "bad token"})),
        )
        .with_priority(1)
        .mount(&catalog.server)
        .await;

    let fetcher =
        ReqwestFetcher::with_timeout(&catalog.uri(), "expired", Duration::from_secs(5))?;
    let err = Harvester::new(fetcher, catalog.config())?
        .run(&catalog.library(), &SilentReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CollectionLookup(_)));
    let diagnostic = err.failed_response().unwrap().diagnostic();
    assert!(diagnostic.starts_with("Error: 401"));
    assert!(diagnostic.contains("bad token"));
    Ok(())
}
