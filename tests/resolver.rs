mod common;

use std::time::Duration;

use common::{track_json, FakeCatalog, FakeUi, FakeVideoIndex, Harness, StreamMode, UiEvent};
use spotify_window::model::{AudioLocator, CollectionKind, PlaybackSource, Track};
use spotify_window::session::SourceResolver;

const BUDGET: Duration = Duration::from_secs(5);

fn harness(video: FakeVideoIndex, ui: FakeUi) -> Harness {
    Harness::with_parts(FakeCatalog::new(CollectionKind::Playlist, Vec::new()), video, ui)
}

fn track(with_preview: bool) -> Track {
    Track::from_json(&track_json(0, with_preview)).unwrap()
}

fn prompts(h: &Harness) -> Vec<UiEvent> {
    h.ui.events()
        .into_iter()
        .filter(|e| matches!(e, UiEvent::PromptShown(_) | UiEvent::PromptHidden))
        .collect()
}

#[tokio::test]
async fn preview_clip_is_used_directly() {
    let h = harness(FakeVideoIndex::new(StreamMode::AudioOnly), FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::Spotify, h.guard(), BUDGET);

    let resolved = resolver.resolve(track(true), 1).await;
    assert!(matches!(&resolved.locator, AudioLocator::Remote(url) if url == "https://preview.test/t0"));

    let resolved = resolver.resolve(track(false), 1).await;
    assert!(!resolved.is_resolved());
    assert!(h.video.searches().is_empty());
}

#[tokio::test]
async fn best_audio_only_stream_wins() {
    let h = harness(FakeVideoIndex::new(StreamMode::AudioOnly), FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let resolved = resolver.resolve(track(false), 1).await;

    match &resolved.locator {
        AudioLocator::Remote(url) => assert!(url.ends_with("/251"), "picked {url}"),
        other => panic!("expected a remote stream, got {other:?}"),
    }
    assert_eq!(h.video.searches(), vec!["Track 0 Artist 0 Album".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn quick_muxed_download_is_buffered() {
    let mut video = FakeVideoIndex::new(StreamMode::MuxedOnly);
    video.download_time = Some(Duration::from_secs(1));
    let h = harness(video, FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let resolved = resolver.resolve(track(false), 1).await;

    match &resolved.locator {
        AudioLocator::Buffered { data, mime_type } => {
            assert_eq!(mime_type, "video/mp4");
            assert!(!data.is_empty());
        }
        other => panic!("expected a buffered stream, got {other:?}"),
    }
    assert!(prompts(&h).is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_download_prompts_and_may_still_finish() {
    let mut video = FakeVideoIndex::new(StreamMode::MuxedOnly);
    video.download_time = Some(Duration::from_secs(8));
    let h = harness(video, FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let resolved = resolver.resolve(track(false), 1).await;

    assert!(matches!(resolved.locator, AudioLocator::Buffered { .. }));
    assert_eq!(prompts(&h), vec![UiEvent::PromptShown("Track 0".into()), UiEvent::PromptHidden]);
}

#[tokio::test(start_paused = true)]
async fn prompt_is_taken_down_after_switching_to_background() {
    let mut video = FakeVideoIndex::new(StreamMode::MuxedOnly);
    video.download_time = Some(Duration::from_secs(8));
    let h = harness(video, FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let context = h.context.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(6)).await;
        context.set_background(true);
    });
    let resolved = resolver.resolve(track(false), 1).await;

    assert!(matches!(resolved.locator, AudioLocator::Buffered { .. }));
    assert_eq!(prompts(&h), vec![UiEvent::PromptShown("Track 0".into()), UiEvent::PromptHidden]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_prompt_fails_the_track() {
    let mut video = FakeVideoIndex::new(StreamMode::MuxedOnly);
    video.download_time = None;
    let h = harness(video, FakeUi::cancelling());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let resolved = resolver.resolve(track(false), 1).await;

    assert!(!resolved.is_resolved());
    assert_eq!(prompts(&h), vec![UiEvent::PromptShown("Track 0".into()), UiEvent::PromptHidden]);
}

#[tokio::test(start_paused = true)]
async fn background_mode_gives_up_at_the_budget() {
    let mut video = FakeVideoIndex::new(StreamMode::MuxedOnly);
    video.download_time = None;
    let h = harness(video, FakeUi::default());
    h.context.set_background(true);
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);

    let started = tokio::time::Instant::now();
    let resolved = resolver.resolve(track(false), 1).await;

    assert!(!resolved.is_resolved());
    let waited = started.elapsed();
    assert!(waited >= BUDGET && waited < BUDGET + Duration::from_secs(1), "waited {waited:?}");
    assert!(prompts(&h).is_empty());
}

#[tokio::test]
async fn unmatched_or_streamless_tracks_fail() {
    let mut video = FakeVideoIndex::new(StreamMode::AudioOnly);
    video.unmatched.insert("Track 0".into());
    let h = harness(video, FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);
    assert!(!resolver.resolve(track(false), 1).await.is_resolved());

    let h = harness(FakeVideoIndex::new(StreamMode::None), FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);
    assert!(!resolver.resolve(track(false), 1).await.is_resolved());
}

#[tokio::test]
async fn stale_session_does_not_search() {
    let h = harness(FakeVideoIndex::new(StreamMode::AudioOnly), FakeUi::default());
    let resolver = SourceResolver::for_source(PlaybackSource::YouTube, h.guard(), BUDGET);
    let _newer = h.guard();

    assert!(!resolver.resolve(track(false), 1).await.is_resolved());
    assert!(h.video.searches().is_empty());
}
