// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for guide-to-pixel crop geometry

use meter_capture::pipelines::photo::geometry::{compute_centered_crop_rect, compute_crop_rect};
use meter_capture::{CropRect, CropStrategy, GuideRect};

#[test]
fn test_meter_guide_on_portrait_photo() {
    let guide = GuideRect::new(0.16, 0.34, 0.68, 0.18).unwrap();
    assert_eq!(
        compute_crop_rect(1080, 1920, &guide),
        Some(CropRect {
            left: 173,
            top: 653,
            width: 734,
            height: 346
        })
    );
}

#[test]
fn test_tiny_guide_never_yields_empty_crop() {
    let guide = GuideRect::new(0.0, 0.0, 0.05, 0.05).unwrap();
    assert_eq!(
        compute_crop_rect(10, 10, &guide),
        Some(CropRect {
            left: 0,
            top: 0,
            width: 1,
            height: 1
        })
    );
}

#[test]
fn test_crop_always_inside_image() {
    let guides = [
        GuideRect::METER_DEFAULT,
        GuideRect::new(0.0, 0.0, 1.0, 1.0).unwrap(),
        GuideRect::new(0.999, 0.999, 0.001, 0.001).unwrap(),
        GuideRect::new(0.5, 0.0, 0.5, 0.01).unwrap(),
        GuideRect::new(0.33, 0.66, 0.0001, 0.34).unwrap(),
    ];
    let sizes = [(1, 1), (1, 7), (2, 3), (10, 10), (641, 479), (1080, 1920), (4000, 3000)];

    for guide in &guides {
        for strategy in CropStrategy::ALL {
            for &(w, h) in &sizes {
                let rect = strategy.crop_rect(w, h, guide).unwrap();
                assert!(rect.width >= 1 && rect.height >= 1, "{} {:?} {}x{}", rect, guide, w, h);
                assert!(
                    rect.fits_within(w, h),
                    "{} outside {}x{} for {:?} ({})",
                    rect,
                    w,
                    h,
                    guide,
                    strategy
                );
            }
        }
    }
}

#[test]
fn test_same_inputs_same_output() {
    let guide = GuideRect::METER_DEFAULT;
    let first = compute_crop_rect(3024, 4032, &guide);
    for _ in 0..10 {
        assert_eq!(compute_crop_rect(3024, 4032, &guide), first);
    }
}

#[test]
fn test_centered_ignores_offsets() {
    let a = GuideRect::new(0.0, 0.0, 0.5, 0.2).unwrap();
    let b = GuideRect::new(0.5, 0.8, 0.5, 0.2).unwrap();
    assert_eq!(
        compute_centered_crop_rect(800, 600, &a),
        compute_centered_crop_rect(800, 600, &b)
    );
    assert_eq!(
        compute_centered_crop_rect(800, 600, &a),
        Some(CropRect {
            left: 200,
            top: 240,
            width: 400,
            height: 120
        })
    );
}

#[test]
fn test_invalid_guides_rejected() {
    assert!(GuideRect::new(0.5, 0.1, 0.6, 0.1).is_err());
    assert!(GuideRect::new(0.1, 0.1, 0.0, 0.1).is_err());
    assert!(GuideRect::new(-0.1, 0.1, 0.2, 0.1).is_err());
    assert!(GuideRect::new(f64::NAN, 0.1, 0.2, 0.1).is_err());
}

#[test]
fn test_zero_sized_image_has_no_crop() {
    assert_eq!(compute_crop_rect(0, 100, &GuideRect::METER_DEFAULT), None);
    assert_eq!(CropStrategy::Centered.crop_rect(100, 0, &GuideRect::METER_DEFAULT), None);
}
