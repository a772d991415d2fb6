use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use blockbeat::core::{BoardConfig, BoardSnapshot, BoardState, SpeedConfig, TimeBase};
use blockbeat::render::{RenderConfig, Renderer};
use blockbeat::term::FrameBuffer;

struct CountingAlloc;

static COUNT_ENABLED: AtomicBool = AtomicBool::new(false);
static ALLOC_COUNT: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if COUNT_ENABLED.load(Ordering::Relaxed) {
            ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
        }
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if COUNT_ENABLED.load(Ordering::Relaxed) {
            ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
        }
        System.realloc(ptr, layout, new_size)
    }
}

fn with_alloc_counting<F: FnOnce()>(f: F) -> usize {
    ALLOC_COUNT.store(0, Ordering::Relaxed);
    COUNT_ENABLED.store(true, Ordering::Relaxed);
    f();
    COUNT_ENABLED.store(false, Ordering::Relaxed);
    ALLOC_COUNT.load(Ordering::Relaxed)
}

#[test]
fn simulate_snapshot_render_preview_is_allocation_free_after_warmup() {
    let speed = SpeedConfig::default();
    let mut clock = TimeBase::new(&speed).unwrap();
    let mut board = BoardState::new(&BoardConfig::default(), &speed).unwrap();
    let render = RenderConfig {
        texture_width: 160,
        texture_height: 160,
        ..RenderConfig::default()
    };
    let mut renderer = Renderer::new(&render, 6.0, Duration::ZERO).unwrap();
    let mut snap = BoardSnapshot::default();
    let mut fb = FrameBuffer::new(40, 20);
    board.start();

    let dt = Duration::from_millis(33);
    let mut frame = |clock: &mut TimeBase, board: &mut BoardState| {
        let steps = clock.advance(dt);
        board.advance(dt, steps);
        board.snapshot_into(&mut snap);
        renderer.try_render(&snap, clock.current_beat_phase()).unwrap();
        fb.blit_surface(0, 0, 40, 20, renderer.surface());
    };

    // warm-up sizes the snapshot buffers
    frame(&mut clock, &mut board);

    let allocs = with_alloc_counting(|| {
        for _ in 0..200 {
            frame(&mut clock, &mut board);
        }
    });

    assert_eq!(allocs, 0);
}
