use super::*;

const EPS: f64 = 1e-9;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

/// 300x300 px workspace: square page, viewport of 340x420 minus default padding.
fn square_session() -> Composer {
    let page = PageSize {
        width_mm: 300.0,
        height_mm: 300.0,
    };
    let mut composer = Composer::open(
        page,
        Viewport::new(340.0, 420.0),
        ViewportPadding::default(),
    )
    .expect("open");
    composer.load_image("http://x/1.png");
    composer
}

#[test]
fn initial_placement_is_centered_half_width_square() {
    let composer = square_session();
    assert_close(composer.workspace().width_px(), 300.0);
    assert_close(composer.workspace().height_px(), 300.0);

    let image = composer.image().expect("image");
    assert_close(image.size().width, 150.0);
    assert_close(image.size().height, 150.0);
    assert_close(image.position().x, 75.0);
    assert_close(image.position().y, 75.0);
    assert_close(image.rotation(), 0.0);
}

#[test]
fn drag_then_corner_resize() {
    let mut composer = square_session();

    assert_eq!(
        composer.gesture_start(Point::new(150.0, 150.0)),
        Some(GestureKind::Move)
    );
    assert!(composer.gesture_move(Point::new(190.0, 170.0)));
    composer.gesture_end();

    let image = composer.image().expect("image");
    assert_close(image.position().x, 115.0);
    assert_close(image.position().y, 95.0);

    // Bottom-right corner now sits at (265, 245).
    assert_eq!(
        composer.gesture_start(Point::new(265.0, 245.0)),
        Some(GestureKind::Resize)
    );
    assert!(composer.gesture_move(Point::new(295.0, 245.0)));
    composer.gesture_end();

    let image = composer.image().expect("image");
    assert_close(image.size().width, 180.0);
    assert_close(image.size().height, 180.0);
    assert_close(image.position().x, 115.0);
    assert_close(image.position().y, 95.0);
}

#[test]
fn move_is_not_clamped_to_the_workspace() {
    let mut composer = square_session();
    composer.gesture_start(Point::new(100.0, 100.0));
    composer.gesture_move(Point::new(-400.0, 900.0));
    composer.pointer_left();

    let image = composer.image().expect("image");
    assert_close(image.position().x, -425.0);
    assert_close(image.position().y, 875.0);
    assert!(composer.active_gesture().is_none());
}

#[test]
fn move_uses_gesture_start_as_baseline() {
    let mut composer = square_session();
    composer.gesture_start(Point::new(100.0, 100.0));
    composer.gesture_move(Point::new(110.0, 100.0));
    composer.gesture_move(Point::new(130.0, 90.0));
    composer.gesture_end();

    let image = composer.image().expect("image");
    assert_close(image.position().x, 105.0);
    assert_close(image.position().y, 65.0);
}

#[test]
fn resize_is_clamped_to_minimum_size() {
    let mut composer = square_session();
    composer.gesture_start(Point::new(225.0, 225.0));
    assert_eq!(composer.active_gesture(), Some(GestureKind::Resize));
    composer.gesture_move(Point::new(-500.0, 225.0));
    composer.gesture_end();

    let image = composer.image().expect("image");
    assert_close(image.size().width, MIN_IMAGE_SIZE_PX);
    assert_close(image.size().height, MIN_IMAGE_SIZE_PX);
}

#[test]
fn gestures_are_mutually_exclusive() {
    let mut composer = square_session();
    assert_eq!(
        composer.gesture_start(Point::new(225.0, 225.0)),
        Some(GestureKind::Resize)
    );
    // A second pointer-down on the body while resizing does not start a move.
    assert_eq!(composer.gesture_start(Point::new(150.0, 150.0)), None);
    assert_eq!(composer.active_gesture(), Some(GestureKind::Resize));

    composer.gesture_move(Point::new(255.0, 300.0));
    let image = composer.image().expect("image");
    assert_close(image.position().x, 75.0);
    assert_close(image.size().width, 180.0);
}

#[test]
fn pointer_down_outside_image_starts_nothing() {
    let mut composer = square_session();
    assert_eq!(composer.gesture_start(Point::new(5.0, 5.0)), None);
    assert!(!composer.gesture_move(Point::new(50.0, 50.0)));
    assert_close(composer.image().expect("image").position().x, 75.0);
}

#[test]
fn handle_extends_past_the_image_edge() {
    let composer = square_session();
    assert_eq!(
        composer.hit_test(Point::new(231.0, 231.0)),
        Some(GestureKind::Resize)
    );
    assert_eq!(composer.hit_test(Point::new(234.0, 234.0)), None);
    assert_eq!(composer.hit_test(Point::new(76.0, 76.0)), Some(GestureKind::Move));
}

#[test]
fn gestures_without_image_do_nothing() {
    let mut composer = Composer::open(
        PageSize::A4,
        Viewport::default(),
        ViewportPadding::default(),
    )
    .expect("open");
    assert_eq!(composer.gesture_start(Point::new(10.0, 10.0)), None);
    assert_eq!(composer.compute_print_job(), Err(ComposerError::NoImage));
    assert_eq!(composer.set_rotation(90.0), Err(ComposerError::NoImage));
}

#[test]
fn rotation_is_normalized() {
    let mut composer = square_session();
    assert_close(composer.set_rotation(450.0).expect("rotate"), 90.0);
    assert_close(composer.set_rotation(-90.0).expect("rotate"), 270.0);
    assert_close(composer.set_rotation(360.0).expect("rotate"), 0.0);
    assert!(matches!(
        composer.set_rotation(f64::NAN),
        Err(ComposerError::InvalidRotation(_))
    ));
    assert_close(composer.image().expect("image").rotation(), 0.0);
}

#[test]
fn normalize_degrees_stays_below_full_turn() {
    for degrees in [-1e-20, -720.0, -0.5, 0.0, 359.999, 720.25, 1e9] {
        let normalized = normalize_degrees(degrees);
        assert!(
            (0.0..360.0).contains(&normalized),
            "{degrees} normalized to {normalized}"
        );
    }
}

#[test]
fn print_job_scales_every_field_by_mm_per_pixel() {
    let mut composer = square_session();
    composer.set_rotation(30.0).expect("rotate");
    let job = composer.compute_print_job().expect("job");

    // 300 mm page over 300 px: one millimeter per pixel.
    assert_eq!(job.image_url, "http://x/1.png");
    assert_close(job.x_mm, 75.0);
    assert_close(job.y_mm, 75.0);
    assert_close(job.width_mm, 150.0);
    assert_close(job.height_mm, 150.0);
    assert_close(job.rotation, 30.0);

    assert_eq!(composer.compute_print_job().expect("job again"), job);
}

#[test]
fn viewport_resize_preserves_physical_placement() {
    let mut composer = Composer::open(
        PageSize::A4,
        Viewport::new(800.0, 1000.0),
        ViewportPadding::default(),
    )
    .expect("open");
    composer.load_image("http://x/1.png");
    composer.gesture_start(Point::new(300.0, 400.0));
    composer.gesture_move(Point::new(320.0, 380.0));
    let before = composer.compute_print_job().expect("job");

    composer.resize_viewport(Viewport::new(1600.0, 2000.0));
    assert!(composer.active_gesture().is_none());

    let after = composer.compute_print_job().expect("job");
    assert!((before.x_mm - after.x_mm).abs() < 1e-6);
    assert!((before.y_mm - after.y_mm).abs() < 1e-6);
    assert!((before.width_mm - after.width_mm).abs() < 1e-6);
    assert!((before.height_mm - after.height_mm).abs() < 1e-6);
}

#[test]
fn shrinking_below_the_floor_keeps_the_print_size() {
    let large = Viewport::new(800.0, 1000.0);
    let mut composer =
        Composer::open(PageSize::A4, large, ViewportPadding::default()).expect("open");
    composer.load_image("http://x/1.png");

    let image = composer.image().expect("image").clone();
    let corner = Point::new(
        image.position().x + image.size().width,
        image.position().y + image.size().height,
    );
    composer.gesture_start(corner);
    composer.gesture_move(Point::new(corner.x - 1000.0, corner.y));
    composer.gesture_end();
    assert_close(composer.image().expect("image").size().width, MIN_IMAGE_SIZE_PX);
    let before = composer.compute_print_job().expect("job");

    composer.resize_viewport(Viewport::new(200.0, 300.0));
    let shrunk = composer.compute_print_job().expect("job");
    assert_eq!(shrunk, before);
    let shown = composer.image().expect("image").size();
    assert_close(shown.width, MIN_IMAGE_SIZE_PX);
    assert_close(shown.height, MIN_IMAGE_SIZE_PX);

    composer.resize_viewport(large);
    assert_eq!(composer.compute_print_job().expect("job"), before);
    assert!((composer.image().expect("image").size().width - MIN_IMAGE_SIZE_PX).abs() < 1e-6);
}

#[test]
fn rejects_degenerate_pages() {
    let page = PageSize {
        width_mm: 0.0,
        height_mm: 297.0,
    };
    assert!(matches!(
        Composer::open(page, Viewport::default(), ViewportPadding::default()),
        Err(ComposerError::InvalidPage { .. })
    ));
}

#[test]
fn loading_a_new_image_replaces_the_old_one() {
    let mut composer = square_session();
    composer.gesture_start(Point::new(150.0, 150.0));
    composer.load_image("http://x/2.png");

    let image = composer.image().expect("image");
    assert_eq!(image.image_url(), "http://x/2.png");
    assert_close(image.position().x, 75.0);
    assert!(composer.active_gesture().is_none());
}
