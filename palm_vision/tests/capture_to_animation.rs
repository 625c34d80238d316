use std::time::Duration;

use futures::future::{self, BoxFuture};
use palm_vision::core_modules::device::{Frame, SourceState};
use palm_vision::core_modules::encode::optimize_for_upload;
use palm_vision::core_modules::playback::PlaybackCamera;
use palm_vision::core_modules::surface::DrawOp;
use palm_vision::{
    AnalysisClient, AnalysisError, AnalysisRequest, AnimatorConfig, AnimatorEvent, DeviceError, ExclusiveCamera,
    FacingMode, LineAnimator, QualityState, ReadingResult, RecordingSurface, RefreshBus, Shutter, ValidationPolicy,
    Viewfinder, ViewfinderConfig, ViewfinderError,
};

const READING: &str = r##"{
    "character": {"name": "Steady Bear", "title": "Steady Bear", "emoji": "🐻", "desc": "patient"},
    "keywords": ["#steady"],
    "summary": "Two clear lines.",
    "lines": [
        {"name": "lifeLine", "koreanName": "Life line", "score": 80, "color": "#FF6B6B",
         "coordinates": [[0.3, 0.4], [0.4, 0.6]]},
        {"name": "headLine", "koreanName": "Head line", "score": 70, "color": "#4ECDC4",
         "coordinates": [[0.2, 0.5], [0.5, 0.5]]}
    ],
    "advice": "Rest well."
}"##;

struct CannedAnalysis;

impl AnalysisClient for CannedAnalysis {
    fn analyze(&self, request: AnalysisRequest) -> BoxFuture<'_, Result<ReadingResult, AnalysisError>> {
        let result = request
            .to_json()
            .and_then(|body| {
                if body.contains("data:image/jpeg;base64,") {
                    Ok(())
                } else {
                    Err(AnalysisError::Transport("no image in body".into()))
                }
            })
            .and_then(|()| ReadingResult::from_json(READING));
        Box::pin(future::ready(result))
    }
}

fn frames(levels: &[u8]) -> Vec<Frame> {
    levels
        .iter()
        .map(|&level| Frame::solid(640, 480, [level, level, level, 255]))
        .collect()
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn photo_to_finished_drawing() {
    let camera = ExclusiveCamera::new(PlaybackCamera::new(frames(&[30, 30, 60])));
    let bus = RefreshBus::default();
    let mut viewfinder = Viewfinder::new(camera.clone(), bus.clone(), ViewfinderConfig::default());
    viewfinder.start().await.unwrap();

    let mut states = vec![viewfinder.quality().state];
    for _ in 0..3 {
        bus.tick();
        settle().await;
        states.push(viewfinder.quality().state);
    }
    assert_eq!(
        states,
        vec![
            QualityState::Checking,
            QualityState::LowBrightness,
            QualityState::LowBrightness,
            QualityState::Good
        ]
    );

    let Shutter::Captured(photo) = viewfinder.capture().unwrap() else {
        panic!("shutter should be enabled under good light");
    };
    assert_eq!(camera.device().latest_stream_state(), Some(SourceState::Ended));

    let upload = optimize_for_upload(&photo).unwrap();
    let reading = CannedAnalysis
        .analyze(AnalysisRequest::new(upload, "en").with_birth_year(1990))
        .await
        .unwrap();

    let surface = RecordingSurface::new(400, 300);
    let animator = LineAnimator::new(AnimatorConfig::default());
    let mut animation = animator.spawn_encoded(surface.clone(), &photo, &reading.lines).unwrap();

    let mut labels = Vec::new();
    let mut completions = 0;
    while let Some(event) = animation.next_event().await {
        match event {
            AnimatorEvent::LineStarted { identifier, .. } => {
                labels.push(identifier);
                assert!(animation.caption().unwrap().ends_with("analyzing…"));
            }
            AnimatorEvent::Completed => completions += 1,
        }
    }
    assert_eq!(labels, vec!["lifeLine", "headLine"]);
    assert_eq!(completions, 1);
    assert!(animation.is_completed());
    assert_eq!(animation.caption(), None);

    let segments = surface
        .ops()
        .iter()
        .filter(|op| matches!(op, DrawOp::StrokeSegment { .. }))
        .count();
    assert_eq!(segments, 2);
}

#[tokio::test(start_paused = true)]
async fn animation_timing_follows_the_delays() {
    let reading = ReadingResult::from_json(READING).unwrap();
    let backdrop = std::sync::Arc::new(image::RgbaImage::new(16, 16));
    let surface = RecordingSurface::new(400, 300);
    let mut animation = LineAnimator::default().spawn(surface, backdrop, &reading.lines).unwrap();

    let start = tokio::time::Instant::now();
    let mut completed_at = None;
    while let Some(event) = animation.next_event().await {
        if event == AnimatorEvent::Completed {
            completed_at = Some(start.elapsed());
        }
    }
    // start 500 + two lines of (one segment 80 + label 300)
    let elapsed = completed_at.unwrap();
    assert!(elapsed >= Duration::from_millis(1260), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1270), "{elapsed:?}");
}

#[tokio::test]
async fn camera_failure_blocks_the_whole_flow() {
    let device = PlaybackCamera::new(frames(&[200]))
        .failing(FacingMode::Rear, DeviceError::PermissionDenied)
        .failing(FacingMode::Front, DeviceError::PermissionDenied)
        .failing(FacingMode::Any, DeviceError::PermissionDenied);
    let bus = RefreshBus::default();
    let mut viewfinder = Viewfinder::new(ExclusiveCamera::new(device), bus.clone(), ViewfinderConfig::default());

    assert!(matches!(
        viewfinder.start().await,
        Err(ViewfinderError::DeviceUnavailable { .. })
    ));
    for _ in 0..3 {
        bus.tick();
        settle().await;
        assert!(!viewfinder.shutter_enabled());
    }
    assert!(matches!(viewfinder.capture(), Ok(Shutter::Disabled(_))));
}

#[tokio::test]
async fn lenient_policy_draws_what_it_can() {
    let mut reading = ReadingResult::from_json(READING).unwrap();
    reading.lines.push(reading.lines[0].clone());
    reading.lines[1].path.truncate(1);

    let animator = LineAnimator::new(AnimatorConfig {
        validation: ValidationPolicy::Lenient,
        start_delay: Duration::ZERO,
        segment_delay: Duration::ZERO,
        label_delay: Duration::ZERO,
        ..Default::default()
    });
    let backdrop = std::sync::Arc::new(image::RgbaImage::new(4, 4));
    let mut animation = animator
        .spawn(RecordingSurface::new(100, 100), backdrop, &reading.lines)
        .unwrap();

    let mut started = Vec::new();
    while let Some(event) = animation.next_event().await {
        if let AnimatorEvent::LineStarted { identifier, .. } = event {
            started.push(identifier);
        }
    }
    assert_eq!(started, vec!["lifeLine"]);
}
