use kiln_engine::compositor::PickMode;
use kiln_engine::coords::{Rect, Vec2};
use kiln_engine::device::{Command, HeadlessBackend, ImageDesc, PixelFormat, RenderBackend};
use kiln_engine::paint::Tint;
use kiln_engine::{CompositorConfig, FrameCompositor};

type Compositor = FrameCompositor<HeadlessBackend>;

fn compositor() -> Compositor {
    FrameCompositor::new(HeadlessBackend::new(), 800, 600, CompositorConfig::default()).unwrap()
}

/// Runs one frame whose sprites write `id`; returns the pick value seen after `begin`.
fn frame(c: &mut Compositor, id: u16) -> u32 {
    c.backend_mut().stage_id_pixel(id as u32);
    c.begin(Vec2::new(100.0, 100.0)).unwrap();
    let seen = c.current_pick_id();
    c.fill_rect(Rect::from_xywh(0.0, 0.0, 200.0, 200.0), Tint::WHITE, PickMode::Id(id))
        .unwrap();
    c.end().unwrap();
    seen
}

#[test]
fn pick_trails_by_two_frames() {
    let mut c = compositor();
    assert_eq!(frame(&mut c, 100), 0);
    assert_eq!(frame(&mut c, 101), 0);
    for n in 2..12u16 {
        assert_eq!(frame(&mut c, 100 + n), (100 + n - 2) as u32);
    }
}

#[test]
fn pick_never_reports_the_frame_in_flight() {
    let mut c = compositor();
    for n in 0..20u16 {
        let id = 1000 + n;
        let seen = frame(&mut c, id);
        assert_ne!(seen, id as u32);
        if n >= 2 {
            assert!(seen >= (id - 2) as u32, "frame {n} saw {seen}");
        }
    }
}

#[test]
fn stalled_gpu_keeps_last_value() {
    let mut c = compositor();
    for n in 0..4 {
        frame(&mut c, 10 + n);
    }
    let before = c.current_pick_id();
    assert_eq!(before, 11);

    c.backend_mut().stall_fences = true;
    for n in 0..6 {
        assert_eq!(frame(&mut c, 50 + n), before);
    }
    // one fence stays outstanding the whole time
    assert_eq!(c.backend().outstanding_fences(), 1);

    c.backend_mut().stall_fences = false;
    // the fenced buffer still holds its pre-stall copy
    assert_eq!(frame(&mut c, 60), 12);
    assert_eq!(frame(&mut c, 61), 55);
    assert_eq!(frame(&mut c, 62), 60);
}

#[test]
fn failed_map_keeps_previous_value() {
    let mut c = compositor();
    for n in 0..3 {
        frame(&mut c, 20 + n);
    }
    assert_eq!(c.current_pick_id(), 20);

    c.backend_mut().fail_next_map();
    assert_eq!(frame(&mut c, 23), 20);
    let resolved = c.pick().resolved_count();
    assert_eq!(frame(&mut c, 24), 22);
    assert_eq!(c.pick().resolved_count(), resolved + 1);
}

#[test]
fn resize_keeps_value_and_resumes_picking() {
    let mut c = compositor();
    for n in 0..4 {
        frame(&mut c, 30 + n);
    }
    let images = c.backend().live_images();
    assert_eq!(c.current_pick_id(), 31);

    c.resize(1024, 768).unwrap();
    assert_eq!(c.surface().width(), 1024);
    assert_eq!(c.backend().live_images(), images);
    assert_eq!(c.backend().live_readbacks(), 2);
    assert_eq!(c.backend().outstanding_fences(), 0);
    assert_eq!(c.current_pick_id(), 31);

    assert_eq!(frame(&mut c, 40), 31);
    assert_eq!(frame(&mut c, 41), 33);
    assert_eq!(frame(&mut c, 42), 40);
}

#[test]
fn cursor_is_clamped_to_the_surface() {
    let mut c = compositor();
    c.begin(Vec2::new(5000.0, -3.0)).unwrap();
    c.end().unwrap();
    c.begin(Vec2::new(f32::NAN, 12.5)).unwrap();
    c.end().unwrap();

    let copies: Vec<(u32, u32)> = c
        .backend()
        .commands()
        .iter()
        .filter_map(|cmd| match cmd {
            Command::CopyPixel { x, y, .. } => Some((*x, *y)),
            _ => None,
        })
        .collect();
    assert_eq!(copies, vec![(799, 0), (0, 12)]);
}

#[test]
fn copy_is_recorded_before_the_clear() {
    let mut c = compositor();
    c.begin(Vec2::zero()).unwrap();
    let cmds = c.backend().commands();
    let copy = cmds
        .iter()
        .position(|cmd| matches!(cmd, Command::CopyPixel { .. }))
        .unwrap();
    let clear = cmds
        .iter()
        .position(|cmd| matches!(cmd, Command::Clear { .. }))
        .unwrap();
    assert!(copy < clear);
}

#[test]
fn unpickable_sprites_do_not_replace_ids() {
    let mut c = compositor();
    let image = c
        .backend_mut()
        .create_image(&ImageDesc::new(8, 8, PixelFormat::Rgba8Unorm))
        .unwrap();

    let full = Rect::from_xywh(0.0, 0.0, 800.0, 600.0);
    let quad = Rect::from_xywh(0.0, 0.0, 64.0, 64.0);
    for _ in 0..3 {
        c.backend_mut().stage_id_pixel(7);
        c.begin(Vec2::new(10.0, 10.0)).unwrap();
        c.draw_sprite(image, quad, Tint::WHITE, PickMode::Id(7), 0.0).unwrap();
        // Scissor push flushes, so the id-7 sprite reaches the device first.
        c.push_scissor(full).unwrap();
        // Overlay covering the cursor; its draw leaves the id layer alone.
        c.backend_mut().stage_id_pixel(99);
        c.draw_sprite(image, quad, Tint::WHITE, PickMode::Skip, 0.0).unwrap();
        c.pop_scissor().unwrap();
        c.end().unwrap();
    }
    assert_eq!(c.current_pick_id(), 7);
}
