mod utils;

use std::time::{Duration, Instant};

use payment_gateway_webhooks::domain::events::{EventKind, PaymentEvent};
use payment_gateway_webhooks::domain::models::DeliveryStatus;
use payment_gateway_webhooks::domain::ports::{AttemptLedger, AttemptQuery, MerchantStore};
use payment_gateway_webhooks::outbound::webhook::{HmacSigner, WebhookError, WebhookPayload};
use serde_json::json;
use time::OffsetDateTime;
use utils::{MockEndpoint, TestApp, WEBHOOK_SECRET};

async fn app_with_endpoint(status: u16) -> (TestApp, MockEndpoint) {
    let app = utils::spawn_app().await;
    let mock = MockEndpoint::start(status).await;
    app.engine
        .configure_endpoint(app.merchant_id, &mock.url, Some(WEBHOOK_SECRET.to_string()))
        .await
        .expect("Failed to configure endpoint");
    (app, mock)
}

#[tokio::test]
async fn test_captured_payment_is_delivered_and_signed() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(200).await;
    let event = PaymentEvent::new(
        app.merchant_id,
        EventKind::PaymentCaptured,
        json!({"payment": {"id": "pay_123", "amount": 50000, "currency": "INR"}}),
    );

    let attempts = app.engine.emit(&event).await?;

    assert_eq!(attempts.len(), 1);
    let attempt = &attempts[0];
    assert_eq!(attempt.status, DeliveryStatus::Success);
    assert_eq!(attempt.response_code, Some(200));
    assert_eq!(attempt.attempts, 1);
    assert_eq!(attempt.endpoint_url, mock.url);

    let received = mock.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));

    let payload: WebhookPayload = serde_json::from_str(&received[0].body)?;
    assert_eq!(payload.event, "payment.captured");
    assert_eq!(payload.data["payment"]["id"], "pay_123");

    let signer = HmacSigner::new(WEBHOOK_SECRET)?;
    let signature = received[0].signature.clone().unwrap_or_default();
    assert!(signer.verify(&received[0].body, &signature));
    assert!(!received[0].body.contains(WEBHOOK_SECRET));
    Ok(())
}

#[tokio::test]
async fn test_failed_delivery_is_retried_on_same_record() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(500).await;

    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({"id": "pay_1"})))
        .await?;
    let failed = &attempts[0];
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.response_code, Some(500));
    assert_eq!(failed.attempts, 1);
    assert!(failed.next_retry_at.is_some());

    mock.set_status(200);
    let retried = app.engine.retry(failed.id).await?;

    assert_eq!(retried.id, failed.id);
    assert_eq!(retried.status, DeliveryStatus::Success);
    assert_eq!(retried.attempts, 2);
    assert!(retried.next_retry_at.is_none());

    let page = app.engine.list(app.merchant_id, &AttemptQuery::default()).await?;
    assert_eq!(page.total, 1);

    // Identical bytes, so the signature is identical too
    let received = mock.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].body, received[1].body);
    assert_eq!(received[0].signature, received[1].signature);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_retries_run_once() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(503).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, false, json!({})))
        .await?;
    let id = attempts[0].id;

    mock.set_status(200);
    mock.set_delay(Duration::from_millis(300));
    let (first, second) = tokio::join!(app.engine.retry(id), app.engine.retry(id));

    let results = [first, second];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(WebhookError::RetryInProgress(_))))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(mock.received().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_attempts_are_capped_at_five() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(500).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;
    let id = attempts[0].id;

    let mut last = attempts[0].clone();
    for _ in 0..4 {
        last = app.engine.retry(id).await?;
    }
    assert_eq!(last.attempts, 5);
    assert_eq!(last.status, DeliveryStatus::Failed);
    assert!(last.next_retry_at.is_none());

    let result = app.engine.retry(id).await;
    assert!(matches!(
        result,
        Err(WebhookError::AttemptLimitExceeded { max: 5, .. })
    ));
    assert_eq!(mock.received().len(), 5);

    let stored = app.engine.ledger().get(id).await?;
    assert_eq!(stored.map(|a| a.attempts), Some(5));
    Ok(())
}

#[tokio::test]
async fn test_retry_of_successful_delivery_changes_nothing() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(200).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;
    let delivered = attempts[0].clone();

    let result = app.engine.retry(delivered.id).await;

    assert!(matches!(result, Err(WebhookError::AlreadySucceeded(_))));
    assert_eq!(app.engine.ledger().get(delivered.id).await?, Some(delivered));
    assert_eq!(
        app.engine.list(app.merchant_id, &AttemptQuery::default()).await?.total,
        1
    );
    assert_eq!(mock.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_slow_endpoint_times_out() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(200).await;
    mock.set_delay(Duration::from_secs(3));

    let start = Instant::now();
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(attempts[0].status, DeliveryStatus::Failed);
    assert_eq!(attempts[0].response_code, None);

    // The late answer must not flip the record
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let stored = app.engine.ledger().get(attempts[0].id).await?;
    assert_eq!(stored.map(|a| a.status), Some(DeliveryStatus::Failed));
    Ok(())
}

#[tokio::test]
async fn test_client_errors_are_not_retried_automatically() -> Result<(), WebhookError> {
    let (app, _mock) = app_with_endpoint(400).await;

    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;

    assert_eq!(attempts[0].status, DeliveryStatus::Failed);
    assert_eq!(attempts[0].response_code, Some(400));
    assert!(attempts[0].next_retry_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_merchant_without_endpoint_gets_nothing() -> Result<(), WebhookError> {
    let app = utils::spawn_app().await;

    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;

    assert!(attempts.is_empty());
    assert_eq!(app.engine.stats(app.merchant_id).await?.total(), 0);
    Ok(())
}

#[tokio::test]
async fn test_retry_goes_to_current_endpoint() -> Result<(), WebhookError> {
    let (app, old) = app_with_endpoint(500).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;

    let new = MockEndpoint::start(200).await;
    app.engine
        .configure_endpoint(app.merchant_id, &new.url, None)
        .await?;
    let retried = app.engine.retry(attempts[0].id).await?;

    assert_eq!(retried.status, DeliveryStatus::Success);
    assert_eq!(retried.endpoint_url, new.url);
    assert_eq!(old.received().len(), 1);
    assert_eq!(new.received().len(), 1);

    // Kept secret still signs
    let merchant = app.engine.merchants().get(app.merchant_id).await;
    assert_eq!(
        merchant.and_then(|m| m.webhook).map(|w| w.secret),
        Some(WEBHOOK_SECRET.to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_retry_worker_redelivers_due_attempts() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(500).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;

    // Pretend the backoff already elapsed
    let mut due = attempts[0].clone();
    due.next_retry_at = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
    app.engine.ledger().update(&due).await?;

    mock.set_status(200);
    let worker = app.engine.retry_worker(Duration::from_millis(50));
    assert_eq!(worker.run_once().await, 1);

    let stored = app.engine.ledger().get(due.id).await?;
    assert_eq!(
        stored.map(|a| (a.status, a.attempts)),
        Some((DeliveryStatus::Success, 2))
    );
    assert_eq!(worker.run_once().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_attempt_is_pending_while_request_is_in_flight() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(200).await;
    mock.set_delay(Duration::from_millis(500));

    let engine = app.engine.clone();
    let event = PaymentEvent::payment(app.merchant_id, true, json!({"id": "pay_1"}));
    let emit = tokio::spawn(async move { engine.emit(&event).await });

    let mut pending = None;
    for _ in 0..40 {
        let page = app.engine.list(app.merchant_id, &AttemptQuery::default()).await?;
        if let [attempt] = page.data.as_slice() {
            if attempt.status == DeliveryStatus::Pending {
                pending = Some(attempt.clone());
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let pending = pending.expect("Attempt was never stored as pending");

    let attempts = emit.await.expect("Emit task panicked")?;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].id, pending.id);

    let stored = app.engine.ledger().get(pending.id).await?;
    assert_eq!(
        stored.map(|a| (a.status, a.response_code)),
        Some((DeliveryStatus::Success, Some(200)))
    );
    assert_eq!(
        app.engine.list(app.merchant_id, &AttemptQuery::default()).await?.total,
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_cancelled_retry_still_records_outcome() -> Result<(), WebhookError> {
    let (app, mock) = app_with_endpoint(500).await;
    let attempts = app
        .engine
        .emit(&PaymentEvent::payment(app.merchant_id, true, json!({})))
        .await?;
    let id = attempts[0].id;

    mock.set_delay(Duration::from_millis(600));
    let cancelled = tokio::time::timeout(Duration::from_millis(150), app.engine.retry(id)).await;
    assert!(cancelled.is_err());

    // The caller gave up, the delivery did not
    let mut stored = None;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stored = app.engine.ledger().get(id).await?;
        if stored
            .as_ref()
            .is_some_and(|a| a.status != DeliveryStatus::Pending)
        {
            break;
        }
    }

    let stored = stored.expect("Attempt disappeared from the ledger");
    assert_eq!(stored.status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert_eq!(stored.response_code, Some(500));
    assert!(stored.next_retry_at.is_some());
    assert_eq!(mock.received().len(), 2);

    // The in-flight claim went with the finished task
    mock.set_delay(Duration::ZERO);
    mock.set_status(200);
    let retried = app.engine.retry(id).await?;
    assert_eq!(retried.status, DeliveryStatus::Success);
    Ok(())
}
