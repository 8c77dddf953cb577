use std::time::Duration;

use image::Rgba;
use led_matrix_hub::animation::{AnimatedImage, LOOP_FOREVER};
use led_matrix_hub::frame::{self, Frame};

fn solid(r: u8) -> Frame {
    Frame::from_pixel(frame::WIDTH, frame::HEIGHT, Rgba([r, 0, 0, 255]))
}

fn red_of(frame: &Frame) -> u8 {
    frame.get_pixel(0, 0)[0]
}

fn three_frames(loops: i32) -> AnimatedImage {
    AnimatedImage::new(
        vec![solid(100), solid(200), solid(40)],
        vec![Duration::from_millis(10); 3],
        loops,
    )
    .unwrap()
}

#[test]
fn still_image_always_returns_its_frame() {
    let img = AnimatedImage::still(solid(7));
    for _ in 0..5 {
        assert_eq!(red_of(&img.next_frame()), 7);
    }
    assert_eq!(red_of(&img.position_frame(0.0, true)), 7);
    assert_eq!(red_of(&img.position_frame(1.0, true)), 7);
}

#[test]
fn position_frame_without_blend_floors() {
    let img = three_frames(LOOP_FOREVER);
    // rel = 0.25 * 2 = 0.5, floor -> frame 0
    assert_eq!(red_of(&img.position_frame(0.25, false)), 100);
    assert_eq!(red_of(&img.position_frame(0.0, false)), 100);
    assert_eq!(red_of(&img.position_frame(1.0, false)), 40);
}

#[test]
fn position_frame_on_exact_index_skips_blending() {
    let img = three_frames(LOOP_FOREVER);
    // rel = 0.5 * 2 = 1.0 exactly: frame 1, no blend even when asked.
    assert_eq!(red_of(&img.position_frame(0.5, true)), 200);
}

#[test]
fn position_frame_blends_bracketing_frames() {
    let img = three_frames(LOOP_FOREVER);
    // rel = 0.25 * 2 = 0.5: halfway between frames 0 (r=100) and 1 (r=200).
    let blended = img.position_frame(0.25, true);
    assert_eq!(red_of(&blended), 150);
    assert_eq!(blended.get_pixel(0, 0)[3], 255);
}

#[test]
fn position_frame_is_clamped() {
    let img = three_frames(LOOP_FOREVER);
    assert_eq!(red_of(&img.position_frame(-0.5, true)), 100);
    assert_eq!(red_of(&img.position_frame(1.5, true)), 40);
}

#[test]
fn playback_holds_last_frame_when_loops_exhausted() {
    // 10ms delays are far below the sleep threshold, so each render call
    // advances at most one frame via the rendezvous with the scheduler.
    let img = three_frames(0);
    let mut seen = Vec::new();
    for _ in 0..40 {
        seen.push(red_of(&img.next_frame()));
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(seen[0], 100, "playback starts on frame 0");
    assert!(seen.contains(&200), "middle frame was shown");
    assert_eq!(*seen.last().unwrap(), 40, "ends on the final frame");
    // Once the final frame shows, nothing ever changes again.
    let first_final = seen.iter().position(|&r| r == 40).unwrap();
    assert!(seen[first_final..].iter().all(|&r| r == 40));
}
