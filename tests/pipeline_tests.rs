//! End-to-end builds over synthetic color/depth pairs.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use packcard::config::{BackgroundSpec, PipelineConfig};
use packcard::pipeline::{
    AccessoryInput, PieceRole, ProjectFile, StarterPackJob, build_starter_pack,
};
use std::fs::File;
use std::path::{Path, PathBuf};

fn write_color(dir: &Path, name: &str, rgba: [u8; 4]) -> PathBuf {
    let img = RgbaImage::from_pixel(48, 48, Rgba(rgba));
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn write_depth(dir: &Path, name: &str) -> PathBuf {
    // Radial bump: bright center fading to black edges.
    let img = GrayImage::from_fn(48, 48, |x, y| {
        let dx = x as f64 - 23.5;
        let dy = y as f64 - 23.5;
        let r = (dx * dx + dy * dy).sqrt() / 24.0;
        Luma([(255.0 * (1.0 - r.min(1.0))) as u8])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.subdivide_cuts = 24;
    config.dpi = 50;
    config
}

fn job(dir: &Path, accessories: usize) -> StarterPackJob {
    let figure_color = write_color(dir, "figure_color.png", [10, 200, 30, 255]);
    let figure_depth = write_depth(dir, "figure_depth.png");
    let accessories = (0..accessories)
        .map(|i| AccessoryInput {
            color: write_color(dir, &format!("acc{i}_color.png"), [200, 40, 10, 255]),
            depth: write_depth(dir, &format!("acc{i}_depth.png")),
        })
        .collect();
    StarterPackJob {
        job_id: "job-0042".into(),
        figure_color,
        figure_depth,
        accessories,
        title: "Chef Octopus".into(),
        subtitle: Some("Deluxe Edition".into()),
        text_color: "blue".into(),
        background: BackgroundSpec::Transparent,
        font: None,
    }
}

fn stl_bounds_mm(path: &Path) -> ([f32; 3], [f32; 3]) {
    let mut file = File::open(path).unwrap();
    let stl = stl_io::read_stl(&mut file).unwrap();
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in &stl.vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(v[axis]);
            max[axis] = max[axis].max(v[axis]);
        }
    }
    (min, max)
}

#[test]
fn full_build_stays_inside_the_card_outline() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 3);
    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();

    assert_eq!(report.placements.len(), 4);
    assert!(report.omissions.is_empty());
    assert!(report.triangle_count > 12);

    // Everything the STL contains fits the 130x170x3 plate footprint, with
    // reliefs rising above Z=0 and nothing below the card bottom.
    let (min, max) = stl_bounds_mm(&report.stl_path);
    assert!(min[0] >= -65.0 - 1e-3 && max[0] <= 65.0 + 1e-3);
    assert!(min[1] >= -85.0 - 1e-3 && max[1] <= 85.0 + 1e-3);
    assert!((min[2] - -3.0).abs() < 1e-3);
    assert!(max[2] > 0.0);
}

#[test]
fn texture_is_registered_with_placements() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 1);
    let config = fast_config();
    let report = build_starter_pack(&job, &config, &dir.path().join("out")).unwrap();

    let canvas = image::open(&report.texture_path).unwrap().to_rgba8();
    let card = config.card;
    let to_px = |x_mm: f64, y_mm: f64| {
        (
            ((x_mm + card.width_mm / 2.0) / card.width_mm * canvas.width() as f64) as u32,
            ((card.height_mm / 2.0 - y_mm) / card.height_mm * canvas.height() as f64) as u32,
        )
    };

    // The center of each placement rect carries that piece's artwork.
    for rec in &report.placements {
        let (px, py) = to_px(
            rec.min_x_mm + rec.width_mm / 2.0,
            rec.min_y_mm + rec.height_mm / 2.0,
        );
        let pixel = canvas.get_pixel(px, py).0;
        let expected = match rec.role {
            PieceRole::Figure => [10, 200, 30, 255],
            PieceRole::Accessory(_) => [200, 40, 10, 255],
        };
        assert_eq!(pixel, expected, "{} artwork mismatch", rec.role);
    }

    // A corner outside every rect stays transparent.
    assert_eq!(canvas.get_pixel(1, 1).0[3], 0);
}

#[test]
fn production_dpi_canvas_is_1535_by_2008() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 0);
    let report =
        build_starter_pack(&job, &PipelineConfig::default(), &dir.path().join("out")).unwrap();

    let decoder = png::Decoder::new(File::open(&report.texture_path).unwrap());
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    assert_eq!((info.width, info.height), (1535, 2008));
    let dims = info.pixel_dims.unwrap();
    assert_eq!(dims.xppu, 11811);
}

#[test]
fn figure_only_build_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 0);
    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();
    assert_eq!(report.placements.len(), 1);
    assert_eq!(report.placements[0].role, PieceRole::Figure);
}

#[test]
fn broken_accessory_becomes_an_omission() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 2);
    job.accessories[1].depth = dir.path().join("does_not_exist.png");
    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();

    assert_eq!(report.placements.len(), 2);
    assert_eq!(report.omissions.len(), 1);
    assert_eq!(report.omissions[0].what, "accessory-2");
}

#[test]
fn extra_accessories_beyond_three_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 4);
    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();

    // The layout has three slots; the fourth input is dropped, not an error.
    assert_eq!(report.placements.len(), 4);
    assert!(report.omissions.is_empty());
    let slots: Vec<PieceRole> = report.placements.iter().map(|r| r.role).collect();
    assert!(slots.contains(&PieceRole::Figure));
    for i in 0..3 {
        assert!(slots.contains(&PieceRole::Accessory(i)));
    }
    assert!(!slots.contains(&PieceRole::Accessory(3)));
}

#[test]
fn missing_figure_depth_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 0);
    job.figure_depth = dir.path().join("missing.png");
    let err = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap_err();
    assert_eq!(err.stage, packcard::Stage::Relief);
}

#[test]
fn unparseable_font_omits_text_but_builds() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 0);
    let font = dir.path().join("bad.ttf");
    std::fs::write(&font, b"not a font").unwrap();
    job.font = Some(font);

    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();
    assert!(report.omissions.iter().any(|o| o.what == "text"));
    assert!(report.stl_path.exists());
}

#[test]
fn project_file_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 2);
    let config = fast_config();
    let report = build_starter_pack(&job, &config, &dir.path().join("out")).unwrap();

    let project = ProjectFile::load(&report.project_path).unwrap();
    assert_eq!(project.version, packcard::pipeline::PROJECT_VERSION);
    assert_eq!(project.job, job);
    assert_eq!(project.config, config);
    assert_eq!(project.placements.len(), report.placements.len());
    for (a, b) in project.placements.iter().zip(&report.placements) {
        assert_eq!(a, b);
    }
    assert_eq!(project.mesh_stats.len(), 3);
    assert!(project.mesh_stats.iter().all(|s| s.triangles > 0));
}

#[test]
fn artifacts_are_named_after_the_job_id() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 0);
    let report = build_starter_pack(&job, &fast_config(), &dir.path().join("out")).unwrap();
    let name = |p: &Path| p.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name(&report.stl_path), "job-0042.stl");
    assert_eq!(name(&report.texture_path), "job-0042_texture.png");
    assert_eq!(name(&report.project_path), "job-0042.cardproj");
}
