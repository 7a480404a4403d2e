//! Unreachable endpoint handling of the Playwright driver
//!
//! The preflight probe fails before any browser is launched, so this runs
//! without Node or Playwright installed.

use std::net::TcpListener;
use std::time::Duration;

use swiftcheck_common::HarnessConfig;
use swiftcheck_e2e::playwright::{PlaywrightConfig, PlaywrightFactory};
use swiftcheck_e2e::{DriverFactory, E2eError, Session};

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

#[tokio::test]
async fn open_fails_with_navigation_error_for_unreachable_endpoint() {
    let mut config = HarnessConfig::default();
    config.sut.url = format!("https://127.0.0.1:{}/", closed_port());

    let factory = PlaywrightFactory {
        config: PlaywrightConfig {
            preflight_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    };
    let driver = factory.create(&config).await.unwrap();
    let mut session = Session::new(driver, config.clone());

    let err = session.open().await.unwrap_err();
    match &err {
        E2eError::Navigation { url, .. } => assert_eq!(url, &config.sut.url),
        other => panic!("expected navigation error, got {other:?}"),
    }
    assert!(!session.is_open());
    session.close().await.unwrap();
}
