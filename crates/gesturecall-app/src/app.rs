//! Replay driver: joins a call and feeds a recorded detector session
//! through it at the recorded pace.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gesturecall_session::CallSession;
use gesturecall_transport::{MemoryRoom, RelayConnector, RoomConnector};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::replay::{self, RecordedModel, RecordedModelLoader};
use crate::settings::Settings;
use crate::view::LogView;

pub async fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    let config = settings.config;

    let text = tokio::fs::read_to_string(&settings.replay_path)
        .await
        .with_context(|| format!("reading replay {}", settings.replay_path.display()))?;
    let records = replay::parse(&text)?;
    let model = RecordedModel::from_records(&records);
    info!(
        "Replay: {} frames, {} recorded outputs from {}",
        records.len(),
        model.len(),
        settings.replay_path.display()
    );

    let detector = &config.detector;
    info!(
        "Detector: maxNumHands={} modelComplexity={} minDetection={} minTracking={} capture={}x{}",
        detector.max_num_hands,
        detector.model_complexity,
        detector.min_detection_confidence,
        detector.min_tracking_confidence,
        detector.capture_width,
        detector.capture_height
    );

    let connector: Box<dyn RoomConnector> = match &settings.relay {
        Some(addr) => {
            info!("Relay: {addr}");
            Box::new(RelayConnector::new(addr.clone()))
        }
        None => {
            info!("No relay configured, using a private in-process room");
            Box::new(MemoryRoom::new())
        }
    };

    let (session, handle) = CallSession::join(
        config.session,
        config.classifier,
        Arc::new(RecordedModelLoader::new(model)),
        connector.as_ref(),
        Box::new(LogView::default()),
    )
    .await
    .context("joining call")?;
    let session_task = tokio::spawn(session.run());

    let max_hands = usize::from(detector.max_num_hands);
    let linger = Duration::from_millis(settings.linger_ms);
    let start = Instant::now();
    let mut submitted = 0u64;
    let mut dropped = 0u64;

    let feed = async {
        for record in records {
            tokio::time::sleep_until(start + Duration::from_millis(record.t_ms)).await;
            if handle.is_closed() {
                warn!("Session ended before the replay finished");
                break;
            }
            if record.frame.hand_count() > max_hands {
                warn!(
                    "Frame at {} ms has {} hands (detector max {})",
                    record.t_ms,
                    record.frame.hand_count(),
                    max_hands
                );
            }
            if handle.submit_frame(record.frame) {
                submitted += 1;
            } else {
                dropped += 1;
            }
        }
        // let the last inference land before leaving
        tokio::time::sleep(linger).await;
    };

    tokio::select! {
        _ = feed => info!("Replay finished"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    handle.leave().await;
    drop(handle);
    let summary = session_task.await.context("session task failed")?;

    info!(
        "Frames: submitted={} dropped={} | throttled={} not_ready={} | inferences={} failed={} stale={}",
        submitted,
        dropped,
        summary.frames_throttled,
        summary.frames_not_ready,
        summary.inferences_started,
        summary.inference_failures,
        summary.stale_results
    );
    info!(
        "Labels shown={} | broadcasts sent={} failed={} | messages received={}",
        summary.labels_shown,
        summary.broadcasts_sent,
        summary.broadcast_failures,
        summary.messages_received
    );
    Ok(())
}
