use composer::{Composer, GestureKind, Point, Viewport, ViewportPadding, Workspace, MIN_IMAGE_SIZE_PX};
use shared::domain::PageSize;

const TOLERANCE: f64 = 1e-9;

fn viewports() -> Vec<Viewport> {
    let mut out = Vec::new();
    for width in [0.0, 12.5, 100.0, 333.3, 800.0, 1280.0, 1920.0, 3840.0] {
        for height in [0.0, 45.0, 240.0, 600.0, 1000.0, 1080.0, 2160.0] {
            out.push(Viewport::new(width, height));
        }
    }
    out
}

#[test]
fn workspace_ratio_matches_page_for_every_viewport() {
    let pages = [
        PageSize::A4,
        PageSize {
            width_mm: 297.0,
            height_mm: 210.0,
        },
        PageSize {
            width_mm: 100.0,
            height_mm: 100.0,
        },
    ];
    for page in pages {
        for viewport in viewports() {
            let workspace = Workspace::fit(page, viewport, ViewportPadding::default());
            let ratio = workspace.width_px() / workspace.height_px();
            assert!(
                (ratio - page.aspect_ratio()).abs() < TOLERANCE,
                "viewport {viewport:?} page {page:?} gave ratio {ratio}"
            );
        }
    }
}

#[test]
fn workspace_never_exceeds_available_space() {
    let padding = ViewportPadding::default();
    for viewport in viewports() {
        let workspace = Workspace::fit(PageSize::A4, viewport, padding);
        let available_width = (viewport.width - padding.horizontal).max(1.0);
        let available_height = (viewport.height - padding.vertical).max(1.0);
        assert!(workspace.width_px() <= available_width + TOLERANCE);
        assert!(workspace.height_px() <= available_height + TOLERANCE);
    }
}

#[test]
fn corner_resizes_preserve_aspect_ratio_and_floor() {
    let mut composer = Composer::open(
        PageSize::A4,
        Viewport::new(1280.0, 1000.0),
        ViewportPadding::default(),
    )
    .expect("open");
    composer.load_image("http://x/1.png");

    let deltas = [30.0, -500.0, 12.0, 0.0, 260.0, -3.5, -1000.0, 75.0, 1.0];
    for delta in deltas {
        let before = composer.image().expect("image").clone();
        let corner = Point::new(
            before.position().x + before.size().width,
            before.position().y + before.size().height,
        );

        assert_eq!(composer.gesture_start(corner), Some(GestureKind::Resize));
        composer.gesture_move(Point::new(corner.x + delta, corner.y + delta / 2.0));
        composer.gesture_end();

        let after = composer.image().expect("image");
        let ratio_before = before.size().width / before.size().height;
        let ratio_after = after.size().width / after.size().height;
        assert!((ratio_before - ratio_after).abs() < TOLERANCE);
        assert!(after.size().width >= MIN_IMAGE_SIZE_PX - TOLERANCE);
        assert!(after.size().height >= MIN_IMAGE_SIZE_PX - TOLERANCE);
        assert_eq!(after.position(), before.position());
    }
}

#[test]
fn millimeter_conversion_round_trips_to_pixels() {
    let mut composer = Composer::open(
        PageSize::A4,
        Viewport::new(1366.0, 768.0),
        ViewportPadding::default(),
    )
    .expect("open");
    composer.load_image("http://x/1.png");
    composer.gesture_start(Point::new(
        composer.workspace().width_px() / 2.0,
        composer.workspace().height_px() / 2.0,
    ));
    composer.gesture_move(Point::new(13.37, -42.0));
    composer.gesture_end();
    composer.set_rotation(123.0).expect("rotate");

    let image = composer.image().expect("image").clone();
    let workspace = *composer.workspace();
    let job = composer.compute_print_job().expect("job");

    let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(1.0);
    assert!(close(workspace.to_px(job.x_mm), image.position().x));
    assert!(close(workspace.to_px(job.y_mm), image.position().y));
    assert!(close(workspace.to_px(job.width_mm), image.size().width));
    assert!(close(workspace.to_px(job.height_mm), image.size().height));
    assert_eq!(job.rotation, 123.0);
}
