use super::*;
use crate::foundation::core::ContentId;
use crate::presenter::TickOutcome;
use crate::test_support::{
    BLUE, GREEN, Harness, MemStorage, RED, START_MS, gif_bytes, harness, harness_config,
    harness_on, harness_with, png_rgba_bytes,
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn rgb(c: [u8; 4]) -> [u8; 3] {
    [c[0], c[1], c[2]]
}

fn anim() -> Option<Vec<u8>> {
    Some(gif_bytes(8, 8, &[(RED, 100), (GREEN, 150), (BLUE, 200)]))
}

fn garbage() -> Option<Vec<u8>> {
    Some(b"definitely not an image".to_vec())
}

fn load_and_swap(h: &mut Harness) {
    assert!(h.loader.step());
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
}

fn assert_slot_invariants(h: &Harness) {
    let st = h.engine.shared.lock();
    for slot in &st.slots {
        slot.check_invariants().unwrap();
    }
}

#[test]
fn second_swap_request_is_rejected_while_the_first_is_in_flight() {
    let h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    let err = h.engine.request_swap_current().unwrap_err();
    assert!(matches!(err, PlaybackError::SwapConflict(_)));

    assert!(h.loader.step());
    assert!(!h.loader.step());
    let status = h.engine.status();
    assert_eq!(status.back, SlotPhase::Ready);
    assert!(status.swap_requested);
    assert_eq!(status.stats.rejected_requests, 1);
    assert_slot_invariants(&h);

    // Still rejected until the presenter performs the swap.
    assert!(h.engine.request_swap_next(SwapIntent::Intentional).is_err());
    assert_eq!(h.nav.advances(), 0);
}

#[test]
fn swap_promotes_the_back_slot() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Idle);

    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    let status = h.engine.status();
    assert_eq!(status.front, SlotPhase::Active);
    assert_eq!(status.front_position, Some(0));
    assert_eq!(status.back, SlotPhase::Empty);
    assert!(!status.swap_requested);
    assert_eq!(status.stats.swaps, 1);
    assert_eq!(h.display.pixel(0, 0), rgb(RED));
    assert_slot_invariants(&h);
}

#[test]
fn frames_are_paced_by_the_displayed_frame_delay() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), rgb(BLUE));
    assert_eq!(h.clock.sleeps(), vec![ms(100), ms(150)]);

    // Loops back to frame 0 after the last frame's delay.
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), rgb(RED));
    assert_eq!(h.clock.sleeps().last(), Some(&ms(200)));
}

#[test]
fn static_opaque_asset_is_not_redecoded() {
    let still = png_rgba_bytes(8, 8, |_, _| [10, 20, 30, 255]);
    let mut h = harness(vec![("/art/a.gif", anim()), ("/art/b.png", Some(still))]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);

    h.engine.request_swap_next(SwapIntent::Intentional).unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.engine.status().front_position, Some(1));
    let decodes = h.codecs.decodes();

    for _ in 0..3 {
        assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    }
    assert_eq!(h.codecs.decodes(), decodes);
    assert_eq!(h.display.pixel(3, 3), [10, 20, 30]);

    // Opaque and borderless: a background change needs no work at all.
    h.engine.set_background(Rgb8::new(1, 2, 3));
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.codecs.decodes(), decodes);
    assert_eq!(h.display.pixel(0, 0), [10, 20, 30]);
}

#[test]
fn static_transparent_asset_is_redecoded_when_background_changes() {
    let still = png_rgba_bytes(8, 8, |x, _| if x < 4 { [0, 0, 0, 0] } else { [200, 0, 0, 255] });
    let mut h = harness(vec![("/art/b.png", Some(still))]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(0, 0), [0, 0, 0]);

    let decodes = h.codecs.decodes();
    h.presenter.tick().unwrap();
    assert_eq!(h.codecs.decodes(), decodes);

    h.engine.set_background(Rgb8::new(0, 0, 255));
    h.presenter.tick().unwrap();
    assert_eq!(h.codecs.decodes(), decodes + 1);
    assert_eq!(h.display.pixel(0, 0), [0, 0, 255]);
    assert_eq!(h.display.pixel(7, 0), [200, 0, 0]);

    h.presenter.tick().unwrap();
    assert_eq!(h.codecs.decodes(), decodes + 1);
}

#[test]
fn letterboxed_opaque_asset_refreshes_borders_without_decoding() {
    let still = png_rgba_bytes(4, 8, |_, _| [10, 20, 30, 255]);
    let mut h = harness(vec![("/art/tall.png", Some(still))]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(0, 0), [0, 0, 0]);
    assert_eq!(h.display.pixel(4, 4), [10, 20, 30]);

    let decodes = h.codecs.decodes();
    h.engine.set_background(Rgb8::new(7, 7, 7));
    h.presenter.tick().unwrap();
    assert_eq!(h.codecs.decodes(), decodes);
    assert_eq!(h.display.pixel(0, 0), [7, 7, 7]);
    assert_eq!(h.display.pixel(4, 4), [10, 20, 30]);
}

#[test]
fn missing_vault_file_advances_once() {
    let h = harness(vec![("/vault/a.gif", None), ("/vault/b.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());

    assert_eq!(h.nav.advances(), 1);
    assert!(h.health.is_healthy(0));
    assert!(h.health.is_healthy(1));
    assert!(h.storage.deleted().is_empty());
    assert!(h.engine.shared.recovery.retry_armed());

    let status = h.engine.status();
    assert!(!status.swap_requested);
    assert!(!status.loader_busy);
    assert_eq!(status.back, SlotPhase::Empty);
    assert_slot_invariants(&h);
}

#[test]
fn vault_file_reported_absent_is_never_read() {
    let h = harness(vec![("/vault/a.gif", anim()), ("/vault/b.gif", anim())]);
    h.storage.hide("/vault/a.gif");
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    assert_eq!(h.storage.reads(), 0);
    assert_eq!(h.nav.advances(), 1);
    assert_eq!(h.nav.inner.position(), 1);
    assert_eq!(h.engine.status().back, SlotPhase::Empty);
}

#[test]
fn consecutive_failures_retry_only_once() {
    let mut h = harness(vec![
        ("/art/0.gif", garbage()),
        ("/art/1.gif", garbage()),
        ("/art/2.gif", garbage()),
        ("/art/3.gif", anim()),
    ]);

    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    assert_eq!(h.nav.advances(), 1);
    assert_eq!(h.nav.inner.position(), 1);
    assert_eq!(h.engine.status().stats.failed_loads, 2);
    assert!(!h.health.is_healthy(0));
    assert!(!h.health.is_healthy(1));
    let status = h.engine.status();
    assert!(!status.swap_requested && !status.loader_busy);
    assert_eq!(status.back, SlotPhase::Empty);

    // The previous attempt failed, so this failure is not retried.
    h.engine.request_swap_next(SwapIntent::Automated).unwrap();
    assert!(h.loader.step());
    assert_eq!(h.nav.advances(), 2);
    assert_eq!(h.nav.inner.position(), 2);
    assert_eq!(h.engine.status().stats.failed_loads, 3);

    h.engine.request_swap_next(SwapIntent::Automated).unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.engine.status().front_position, Some(3));
    assert!(h.engine.shared.recovery.retry_armed());
    assert!(h.storage.deleted().is_empty());
    assert_slot_invariants(&h);
}

#[test]
fn corrupt_vault_file_is_deleted() {
    let h = harness(vec![("/vault/bad.gif", garbage()), ("/vault/ok.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    assert_eq!(h.storage.deleted(), vec![std::path::PathBuf::from("/vault/bad.gif")]);
    assert_eq!(h.engine.status().stats.deletions, 1);
    // The retry moved on to the healthy entry.
    assert_eq!(h.engine.status().back, SlotPhase::Ready);
}

#[test]
fn zero_brightness_blanks_the_panel() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.display.set_brightness(0);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert!(h.display.snapshot().iter().all(|b| *b == 0));

    h.display.set_brightness(80);
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));
}

#[test]
fn multi_buffered_display_waits_for_vsync() {
    let cfg = harness_config();
    let display = crate::display::MemoryDisplay::new(cfg.panel).with_buffers(2);
    let mut h = harness_on(vec![("/art/a.gif", anim())], cfg, display);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    h.presenter.tick().unwrap();
    assert_eq!(h.display.vsync_waits(), 2);
    assert_eq!(h.display.draws(), 2);
}

#[test]
fn single_buffered_display_never_waits_for_vsync() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.vsync_waits(), 0);
    assert_eq!(h.display.draws(), 1);
}

#[test]
fn each_presented_frame_is_one_full_panel_draw() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    let before = h.display.draws();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.draws(), before + 1);
    // Both halves of the panel carry the new frame.
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));
    assert_eq!(h.display.pixel(7, 7), rgb(GREEN));

    h.engine.pause();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Held);
    assert_eq!(h.display.draws(), before + 1);
}

#[test]
fn paused_engine_shows_the_prefetched_frame_then_holds() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    h.engine.pause();

    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), rgb(RED));
    let decodes = h.codecs.decodes();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Held);
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Held);
    assert_eq!(h.codecs.decodes(), decodes);
    assert_eq!(h.clock.sleeps(), vec![ms(100), ms(100)]);

    h.engine.resume();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));
}

#[test]
fn paused_static_frame_follows_a_background_change() {
    let still = png_rgba_bytes(8, 8, |x, _| if x < 4 { [0, 0, 0, 0] } else { [200, 0, 0, 255] });
    let mut h = harness(vec![("/art/b.png", Some(still))]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    h.engine.pause();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Held);

    h.engine.set_background(Rgb8::new(0, 0, 255));
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(0, 0), [0, 0, 255]);
    assert_eq!(h.display.pixel(7, 0), [200, 0, 0]);
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Held);
}

#[test]
fn scheduled_live_swap_joins_the_shared_timeline() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    let artwork = h.nav.inner.entries()[0].clone();
    // The loader runs one idle tick (100 ms) after the schedule fires: 260 ms into the loop.
    h.engine.schedule_swap(SwapFuture {
        target_time_ms: START_MS,
        artwork,
        start_time_ms: Some(START_MS + 100 - 260),
        start_frame: None,
        is_live_mode_swap: true,
        is_automated: true,
    });

    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Idle);
    assert!(h.engine.status().swap_requested);
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(0, 0), rgb(BLUE));
    assert_eq!(*h.live.succeeded.lock(), vec![0]);
    assert!(h.live.failed.lock().is_empty());
}

#[test]
fn explicit_start_frame_is_honoured() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    let artwork = h.nav.inner.entries()[0].clone();
    h.engine.schedule_swap(SwapFuture {
        target_time_ms: 0,
        artwork,
        start_time_ms: None,
        start_frame: Some(4),
        is_live_mode_swap: true,
        is_automated: false,
    });
    h.presenter.tick().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));
}

#[test]
fn failed_live_swap_is_handed_to_the_coordinator() {
    let mut h = harness(vec![("/art/bad.gif", garbage()), ("/art/ok.gif", anim())]);
    let artwork = h.nav.inner.entries()[0].clone();
    h.engine.schedule_swap(SwapFuture {
        target_time_ms: 0,
        artwork,
        start_time_ms: Some(START_MS),
        start_frame: None,
        is_live_mode_swap: true,
        is_automated: true,
    });
    h.presenter.tick().unwrap();
    assert!(h.loader.step());

    assert_eq!(*h.live.failed.lock(), vec![0]);
    assert_eq!(*h.live.recovered.lock(), vec![0]);
    assert_eq!(h.nav.advances(), 0);
    let status = h.engine.status();
    assert!(!status.swap_requested && !status.loader_busy);
}

#[test]
fn rejected_scheduled_swap_stays_pending() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    let artwork = h.nav.inner.entries()[0].clone();
    h.engine.schedule_swap(SwapFuture {
        target_time_ms: 0,
        artwork,
        start_time_ms: None,
        start_frame: None,
        is_live_mode_swap: false,
        is_automated: true,
    });
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Idle);
    assert!(h.engine.status().scheduled_swap);
}

#[test]
fn vault_views_are_tracked_with_intent() {
    let mut h = harness(vec![("/vault/abc.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(
        *h.views.views.lock(),
        vec![(ContentId("abc".to_string()), true)]
    );
}

#[test]
fn ui_mode_skips_loads_until_resumed() {
    let mut h = harness(vec![("/art/a.gif", anim())]);
    h.engine.enter_ui_mode();
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    let status = h.engine.status();
    assert_eq!(status.back, SlotPhase::Empty);
    assert!(!status.loader_busy && !status.swap_requested);

    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Ui);
    assert_eq!(h.display.pixel(0, 0), [0, 0, 0]);

    h.engine.exit_ui_mode().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(0, 0), rgb(RED));
}

#[test]
fn dwell_expiry_requests_the_next_artwork() {
    let cfg = PlaybackConfig {
        default_dwell_ms: 1_000,
        ..harness_config()
    };
    let mut h = harness_with(vec![("/art/a.gif", anim()), ("/art/b.gif", anim())], cfg);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    h.presenter.tick().unwrap();
    assert!(!h.engine.status().swap_requested);

    h.clock.advance(ms(1_000));
    h.presenter.tick().unwrap();
    assert!(h.engine.status().swap_requested);
    assert_eq!(h.nav.advances(), 1);

    load_and_swap(&mut h);
    assert_eq!(h.engine.status().front_position, Some(1));
}

#[test]
fn rotation_change_is_applied_on_the_next_tick() {
    let still = png_rgba_bytes(2, 1, |x, _| if x == 0 { RED } else { BLUE });
    let mut h = harness(vec![("/art/wide.png", Some(still))]);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(4, 0), [0, 0, 0]);
    assert_eq!(h.display.pixel(0, 3), rgb(RED));
    assert_eq!(h.display.pixel(7, 3), rgb(BLUE));

    h.engine.set_rotation(Rotation::Deg90);
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(4, 0), rgb(RED));
    assert_eq!(h.display.pixel(4, 7), rgb(BLUE));
    assert_eq!(h.display.pixel(0, 4), [0, 0, 0]);
}

#[test]
fn request_to_unknown_position_is_rejected_without_moving() {
    let h = harness(vec![("/art/a.gif", anim())]);
    assert!(matches!(
        h.engine.request_swap_to(3),
        Err(PlaybackError::Validation(_))
    ));
    assert!(!h.engine.status().swap_requested);
}

#[test]
fn builder_rejects_a_display_of_the_wrong_size() {
    let display = crate::display::MemoryDisplay::new(crate::PanelSize::new(4, 4).unwrap());
    let nav = Arc::new(crate::navigator::PlaylistNavigator::from_entries(
        Vec::new(),
        Arc::new(HealthRegistry::default()),
    ));
    let err = EngineBuilder::new(harness_config(), nav, Arc::new(display))
        .build_shared()
        .err()
        .unwrap();
    assert!(matches!(err, PlaybackError::Config(_)));
}

#[test]
fn retry_is_rearmed_when_the_swap_lands() {
    let mut h = harness(vec![("/art/0.gif", garbage()), ("/art/1.gif", anim())]);
    h.engine.request_swap_current().unwrap();
    assert!(h.loader.step());
    assert_eq!(h.engine.status().back, SlotPhase::Ready);
    // The retry succeeded in the back slot but nothing has been shown yet.
    assert!(!h.engine.shared.recovery.retry_armed());

    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.engine.status().front_position, Some(1));
    assert!(h.engine.shared.recovery.retry_armed());
    assert!(h.health.is_healthy(1));
}

fn builder_over(
    entries: &[(&str, Option<Vec<u8>>)],
    health: &Arc<HealthRegistry>,
) -> EngineBuilder {
    let storage = MemStorage::default();
    let mut arts = Vec::new();
    for (i, (path, bytes)) in entries.iter().enumerate() {
        if let Some(bytes) = bytes {
            storage.insert(*path, bytes.clone());
        }
        arts.push(crate::ArtworkRef::local(i, *path).unwrap());
    }
    let nav = Arc::new(crate::navigator::PlaylistNavigator::from_entries(
        arts,
        Arc::clone(health),
    ));
    let cfg = harness_config();
    let display = crate::display::MemoryDisplay::new(cfg.panel);
    EngineBuilder::new(cfg, nav, Arc::new(display)).storage(Arc::new(storage))
}

#[test]
fn failures_land_in_the_navigators_registry_by_default() {
    let health = Arc::new(HealthRegistry::default());
    let builder =
        builder_over(&[("/art/0.gif", garbage()), ("/art/1.gif", anim())], &health);
    let (shared, wake_rx) = builder.build_shared().unwrap();
    let loader = Loader::new(Arc::clone(&shared), wake_rx);
    let engine = PlaybackEngine::from_shared(shared);
    assert!(Arc::ptr_eq(engine.shared.recovery.health(), &health));

    engine.request_swap_current().unwrap();
    assert!(loader.step());
    assert!(!health.is_healthy(0));
    assert!(health.is_healthy(1));
}

#[test]
fn builder_rejects_a_registry_the_navigator_does_not_use() {
    let health = Arc::new(HealthRegistry::default());
    let err = builder_over(&[("/art/0.gif", anim())], &health)
        .health(Arc::new(HealthRegistry::default()))
        .build_shared()
        .err()
        .unwrap();
    assert!(matches!(err, PlaybackError::Config(_)));
}

fn solid(color: [u8; 4]) -> Option<Vec<u8>> {
    Some(gif_bytes(8, 8, &[(color, 100)]))
}

fn notice_harness() -> Harness {
    let cfg = PlaybackConfig {
        swap_notice: true,
        swap_notice_size: 8,
        ..harness_config()
    };
    let entries = vec![("/art/a.gif", solid(GREEN)), ("/art/b.gif", solid(GREEN))];
    let mut h = harness_with(entries, cfg);
    h.engine.request_swap_current().unwrap();
    load_and_swap(&mut h);
    h
}

#[test]
fn swap_notice_shows_while_in_flight_and_clears_on_swap() {
    let mut h = notice_harness();
    assert_eq!(h.display.pixel(7, 7), rgb(GREEN));

    h.engine.request_swap_next(SwapIntent::Intentional).unwrap();
    assert_eq!(h.presenter.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(h.display.pixel(7, 7), [0, 0, 255]);
    assert_eq!(h.display.pixel(6, 7), rgb(GREEN));
    assert_eq!(h.display.pixel(0, 0), rgb(GREEN));

    load_and_swap(&mut h);
    assert_eq!(h.engine.status().front_position, Some(1));
    assert_eq!(h.display.pixel(7, 7), rgb(GREEN));
}

#[test]
fn swap_notice_turns_red_when_the_swap_stalls() {
    let mut h = notice_harness();
    h.engine.request_swap_next(SwapIntent::Intentional).unwrap();
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(7, 7), [0, 0, 255]);

    h.clock.advance(Duration::from_secs(5));
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(7, 7), [255, 0, 0]);

    // The red notice outlives a late swap, then clears.
    load_and_swap(&mut h);
    assert_eq!(h.display.pixel(7, 7), [255, 0, 0]);
    h.clock.advance(Duration::from_secs(4));
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(7, 7), rgb(GREEN));
}

#[test]
fn automated_swaps_raise_no_notice() {
    let mut h = notice_harness();
    h.engine.request_swap_next(SwapIntent::Automated).unwrap();
    h.presenter.tick().unwrap();
    assert_eq!(h.display.pixel(7, 7), rgb(GREEN));
}
