//! End-to-end settlement: accrue a fee, stop, pay it through the endpoint

#[cfg(feature = "server")]
mod settlement_tests {
    use chrono::Duration;
    use focus_fee::collector::ScriptedProvider;
    use focus_fee::payment::{PriceSource, SimulatedTransfer, TransferBackend};
    use focus_fee::server::{run, ServerConfig};
    use focus_fee::settings::MemoryStore;
    use focus_fee::settlement::{PaymentClient, PaymentConfig, SettlementError, SettlementHandoff};
    use focus_fee::tracker::{FeeTracker, ManualClock, TrackerConfig};
    use std::sync::Arc;

    const ADDRESS: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    async fn endpoint(
        backend: Option<Arc<dyn TransferBackend>>,
    ) -> (String, tokio::sync::oneshot::Sender<()>) {
        let (addr, shutdown_tx) = run(ServerConfig::new(0, PriceSource::Fixed(100.0), backend))
            .await
            .expect("Failed to start server");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        (format!("http://{addr}"), shutdown_tx)
    }

    #[tokio::test]
    async fn test_distracted_session_settles_to_wallet() {
        let (url, shutdown_tx) = endpoint(Some(Arc::new(SimulatedTransfer))).await;

        let provider = Arc::new(ScriptedProvider::default());
        let clock = Arc::new(ManualClock::default());
        let tracker = FeeTracker::with_clock(
            provider.clone(),
            Arc::new(MemoryStore::default()),
            TrackerConfig::default(),
            clock.clone(),
        );

        provider.focus("Some video - YouTube", Some("Firefox"));
        tracker.start(vec!["youtube".into()], 0.25).await;
        for _ in 0..10 {
            clock.advance(Duration::seconds(12));
            tracker.poll_once().await;
        }
        let owed = tracker.stop().await.cents_owed;
        assert_eq!(owed, 50);

        let handoff = SettlementHandoff::from_url(url).unwrap();
        let result = handoff.settle(owed, Some(ADDRESS)).await.unwrap();

        assert!(result.is_settled());
        assert_eq!(result.amount_cents, 50);
        assert_eq!(result.destination_address, ADDRESS);
        assert!(!result.transaction_id.as_deref().unwrap().is_empty());
        assert!(result
            .explorer_url
            .as_deref()
            .unwrap()
            .ends_with("?cluster=devnet"));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_running_endpoint_passes_health_check() {
        let (url, shutdown_tx) = endpoint(Some(Arc::new(SimulatedTransfer))).await;

        let client = PaymentClient::new(PaymentConfig::new(url)).unwrap();
        assert!(client.test_connection().await.unwrap());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_endpoint_error_is_surfaced() {
        let (url, shutdown_tx) = endpoint(None).await;

        let handoff = SettlementHandoff::from_url(url).unwrap();
        let err = handoff.settle(50, Some(ADDRESS)).await.unwrap_err();
        match err {
            SettlementError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert!(message.starts_with("Server not configured"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_malformed_address_is_rejected() {
        let (url, shutdown_tx) = endpoint(Some(Arc::new(SimulatedTransfer))).await;

        let handoff = SettlementHandoff::from_url(url).unwrap();
        let err = handoff.settle(50, Some("not-a-wallet")).await.unwrap_err();
        assert!(matches!(err, SettlementError::Rejected { status: 400, .. }));

        let _ = shutdown_tx.send(());
    }
}
