//! Three synthetic faces, differently scaled/rotated/translated, aligned onto a
//! 562x762 canvas with a 120 px eye distance.
use anyhow::Result;
use faceprep_vision::pipeline::{self, run_batch};
use faceprep_vision::{
    Aligner, ApertureMask, ApertureParams, CanvasGeometry, Compositor, FaceItem, LandmarkSet,
    Point2D, Population, ReferencePair, SimilarityTransform,
};
use image::{Rgb, RgbImage};
use nalgebra::Vector2;
use std::path::PathBuf;

// left pupil, right pupil, nose tip, left mouth corner, mouth centre, right mouth corner
const BASE: [[f64; 2]; 6] = [
    [40.0, 40.0],
    [90.0, 40.0],
    [65.0, 68.0],
    [48.0, 85.0],
    [65.0, 88.0],
    [82.0, 85.0],
];

fn poses() -> Vec<SimilarityTransform> {
    vec![
        SimilarityTransform::new(0.1, 1.0, Vector2::new(40.0, 50.0)),
        SimilarityTransform::new(-0.2, 0.8, Vector2::new(60.0, 30.0)),
        SimilarityTransform::new(0.05, 1.2, Vector2::new(20.0, 40.0)),
    ]
}

/// Gray image with a white square centred on every landmark.
fn render(landmarks: &LandmarkSet) -> RgbImage {
    let mut img = RgbImage::from_pixel(250, 250, Rgb([60, 60, 60]));
    for p in landmarks.points() {
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        for y in cy - 3..=cy + 3 {
            for x in cx - 3..=cx + 3 {
                img.put_pixel(x as u32, y as u32, Rgb([255, 255, 255]));
            }
        }
    }
    img
}

fn scratch_dir(tag: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("faceprep-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn geometry() -> CanvasGeometry {
    CanvasGeometry {
        width: 562,
        height: 762,
        eye_distance: 120.0,
        eye_y_ratio: 0.5,
    }
}

#[test]
fn test_recovered_transforms_land_on_template() -> Result<()> {
    env_logger::try_init().ok();
    let base = LandmarkSet::from_xy(&BASE);
    let items: Vec<FaceItem> = poses()
        .iter()
        .enumerate()
        .map(|(i, pose)| FaceItem {
            name: format!("face{i}"),
            image_path: PathBuf::from(format!("face{i}.png")),
            landmarks: pose.apply_set(&base),
        })
        .collect();

    let population = Population::build(items, ReferencePair::default())?;
    assert_eq!(population.members.len(), 3);
    let template = population.template.rescale(&geometry())?;

    let (l, r) = template.points().reference_pair(0, 1)?;
    assert!(((r - l).norm() - 120.0).abs() < 1e-9);

    for item in &population.members {
        let fit = SimilarityTransform::fit(&item.landmarks, &template)?;
        let mapped = fit.apply_set(&item.landmarks);
        for (m, t) in mapped.points().iter().zip(template.points().points()) {
            assert!((m - t).norm() < 1.0, "{}: {m} vs {t}", item.name);
        }
        assert!((fit.rotation().determinant() - 1.0).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_warped_images_put_landmarks_on_template() -> Result<()> {
    env_logger::try_init().ok();
    let dir = scratch_dir("e2e")?;
    let base = LandmarkSet::from_xy(&BASE);
    let mut items = Vec::new();
    for (i, pose) in poses().iter().enumerate() {
        let landmarks = pose.apply_set(&base);
        let image_path = dir.join(format!("face{i}.png"));
        render(&landmarks).save(&image_path)?;
        items.push(FaceItem {
            name: format!("face{i}"),
            image_path,
            landmarks,
        });
    }

    let population = Population::build(items, ReferencePair::default())?;
    let template = population.template.rescale(&geometry())?;
    let aligner = Aligner::new(template.clone());

    let out_dir = dir.join("aligned");
    std::fs::create_dir_all(&out_dir)?;
    let report = run_batch(&aligner, &population.members, |item, face| {
        let path = out_dir.join(format!("{}_align.png", item.name));
        face.image.save(&path)?;
        Ok(path)
    });
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.written.len(), 3);

    for (_, path) in &report.written {
        let aligned = pipeline::load_image(path, pipeline::ColorMode::Rgb)?;
        assert_eq!(aligned.dimensions(), (562, 762));
        for t in template.points().points() {
            let p = aligned.get_pixel(t.x.round() as u32, t.y.round() as u32);
            assert!(p[0] > 200, "{}: dark pixel at {t}", path.display());
        }
        // No hard black border from the reflected fill.
        assert!(aligned.pixels().all(|p| p[0] >= 60));
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_masked_and_composited_output() -> Result<()> {
    env_logger::try_init().ok();
    let base = LandmarkSet::from_xy(&BASE);
    let pose = SimilarityTransform::new(0.1, 1.0, Vector2::new(40.0, 50.0));
    let landmarks = pose.apply_set(&base);
    let item = FaceItem {
        name: "face".into(),
        image_path: PathBuf::from("face.png"),
        landmarks: landmarks.clone(),
    };
    let population = Population::build(vec![item], ReferencePair::default())?;
    let template = population.template.rescale(&geometry())?;

    let params = ApertureParams::default();
    let compositor = Compositor::default();
    let aligner = Aligner::new(template)
        .with_mask(ApertureMask::new(562, 762, &params)?)
        .with_compositor(compositor);
    let face = aligner.align(&render(&landmarks), &landmarks)?;

    assert_eq!(face.image.dimensions(), (512, 512));
    // Canvas corners lie outside both the presentation region and the aperture.
    assert_eq!(*face.image.get_pixel(0, 0), Rgb([127, 127, 127]));
    assert_eq!(*face.image.get_pixel(511, 511), Rgb([127, 127, 127]));
    // The eye-level centre of the face is inside the aperture and keeps content.
    let centre = Point2D::new(256.0, 256.0);
    assert_ne!(
        *face.image.get_pixel(centre.x as u32, centre.y as u32),
        Rgb([127, 127, 127])
    );
    Ok(())
}
