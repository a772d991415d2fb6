use blockbeat::term::RenderThrottle;

#[test]
fn render_throttle_renders_first_frame() {
    let mut t = RenderThrottle::new(50, 1000);
    assert!(t.should_render(0, 1));
}

#[test]
fn render_throttle_renders_changes_at_most_once_per_interval() {
    let mut t = RenderThrottle::new(50, 1000);
    assert!(t.should_render(0, 1));
    assert!(!t.should_render(10, 2));
    assert!(!t.should_render(49, 3));
    assert!(t.should_render(50, 4));
    assert_eq!(t.skipped(), 2);
}

#[test]
fn render_throttle_idle_frames_refresh_slowly() {
    let mut t = RenderThrottle::new(50, 1000);
    assert!(t.should_render(0, 1));
    assert!(!t.should_render(100, 1));
    assert!(!t.should_render(999, 1));
    assert!(t.should_render(1000, 1));
}

#[test]
fn render_throttle_from_fps() {
    let mut t = RenderThrottle::from_fps(10, 0);
    assert!(t.should_render(0, 1));
    assert!(!t.should_render(99, 2));
    assert!(t.should_render(100, 2));

    // zero fps means unthrottled
    let mut t = RenderThrottle::from_fps(0, 0);
    assert!(t.should_render(0, 1));
    assert!(t.should_render(0, 2));
}
