use confab_client::{EngineEvent, JoinOptions, RtcMode};
use confab_core::MediaKind;
use serde_json::Value;

use super::{create_test_peer, start_relay};
use crate::utils::{TrackRegistry, init_tracing};

#[tokio::test]
async fn test_mute_reaches_subscriber_without_renegotiation() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let registry = TrackRegistry::default();
    let mut a = create_test_peer(addr, "alice", RtcMode::NormalMode, &registry);
    let mut b = create_test_peer(addr, "bob", RtcMode::NormalMode, &registry);

    let room_id = a.engine.join(JoinOptions::create(Vec::new())).await?;
    let published = a.engine.publish(MediaKind::Video, Value::Null).await?;
    b.engine.join(JoinOptions::room(room_id)).await?;
    b.remote_stream_from(&a.id()).await?;
    a.connected_to(&b.id()).await?;

    let a_connection = a
        .factory
        .connection_to(&b.id())
        .expect("alice built a connection to bob");
    let offers_before = a_connection.offers_created();

    a.engine.set_video_muted(published.id, true)?;

    // Our own copy flips immediately and the video track is disabled.
    let local = a.engine.local_streams();
    assert!(local[0].video_muted);
    assert!(local[0].info.remote_video_muted);
    assert!(!local[0].tracks[0].is_enabled());

    let updated = b
        .next(|e| match e {
            EngineEvent::StreamUpdated(stream) if stream.id == published.id => Some(stream),
            _ => None,
        })
        .await?;
    assert!(updated.info.remote_video_muted);
    assert!(!updated.info.remote_audio_muted);
    // The subscriber's own preference is untouched.
    assert!(!updated.video_muted);

    assert_eq!(a_connection.offers_created(), offers_before);
    Ok(())
}

#[tokio::test]
async fn test_volume_patch_scales_remote_playback() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let registry = TrackRegistry::default();
    let mut a = create_test_peer(addr, "alice", RtcMode::NormalMode, &registry);
    let mut b = create_test_peer(addr, "bob", RtcMode::NormalMode, &registry);

    let room_id = a.engine.join(JoinOptions::create(Vec::new())).await?;
    let published = a.engine.publish(MediaKind::Audio, Value::Null).await?;
    b.engine.join(JoinOptions::room(room_id)).await?;
    b.remote_stream_from(&a.id()).await?;

    a.engine.set_volume(published.id, 0.5)?;
    let updated = b
        .next(|e| match e {
            EngineEvent::StreamUpdated(stream) if stream.id == published.id => Some(stream),
            _ => None,
        })
        .await?;
    assert_eq!(updated.info.remote_volume, 0.5);
    assert_eq!(updated.effective_volume(), 0.5);

    // A subscriber turning the stream down stays local.
    b.engine.set_volume(published.id, 0.5)?;
    let b_view = b.engine.streams().borrow().clone();
    assert_eq!(b_view[0].effective_volume(), 0.25);

    let a_view = a.engine.local_streams();
    assert_eq!(a_view[0].volume, 0.5);
    Ok(())
}
