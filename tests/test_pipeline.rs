use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use ndarray::{s, Array2};
use pcalign::{
    io::{write_pcd, write_pcd_binary, write_ply},
    model::{load_from_checkpoint, Checkpoint, IdentityModel, ModelRegistry},
    pipeline::{AlignParams, PairwiseAligner},
    pointcloud::PointCloud,
    scene::write_scene,
    transform::Pose,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// 500 points on a 10x10x5 grid of unit spacing, ordered as the voxel
/// downsampling orders them, with random colors.
fn grid_cloud() -> PointCloud {
    let mut rng = StdRng::seed_from_u64(7);
    let points = Array2::from_shape_fn((500, 3), |(i, c)| match c {
        0 => (i / 50) as f32 + 0.5,
        1 => ((i / 5) % 10) as f32 + 0.5,
        _ => (i % 5) as f32 + 0.5,
    });
    let colors = Array2::from_shape_fn((500, 3), |_| rng.gen_range(0.0f32..1.0));
    PointCloud::with_colors(points, colors).unwrap()
}

fn random_cloud(seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points = Array2::from_shape_fn((500, 3), |_| rng.gen_range(0.0f32..10.0));
    let colors = Array2::from_shape_fn((500, 3), |_| rng.gen_range(0.0f32..1.0));
    PointCloud::with_colors(points, colors).unwrap()
}

fn max_radius(points: &Array2<f32>) -> f32 {
    points
        .outer_iter()
        .map(|p| p.dot(&p).sqrt())
        .fold(0.0, f32::max)
}

#[test]
fn identical_clouds_with_identity_model() {
    let cloud = grid_cloud();
    let model = IdentityModel;
    let aligner = PairwiseAligner::new(AlignParams::default(), &model);

    let alignment = aligner.align(&cloud, &cloud).unwrap();

    assert_eq!(alignment.length, 500);
    assert_abs_diff_eq!(max_radius(&alignment.source.points), 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(max_radius(&alignment.target.points), 1.0, epsilon = 1e-5);
    assert_eq!(alignment.result.points, cloud.points);
    assert_eq!(alignment.result.colors, alignment.target.colors);
}

#[test]
fn align_files_and_write_scene() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = grid_cloud();
    let source_path = dir.path().join("cloud_bin_0.pcd");
    let target_path = dir.path().join("cloud_bin_1.ply");
    write_pcd_binary(&source_path, &cloud).unwrap();
    write_ply(&target_path, &cloud).unwrap();

    let model = IdentityModel;
    let alignment = PairwiseAligner::new(AlignParams::default(), &model)
        .align_files(&source_path, &target_path)
        .unwrap();
    assert_eq!(alignment.length, 500);

    let paths = write_scene(&alignment, dir.path().join("out")).unwrap();
    assert!(paths.iter().all(|path| path.exists()));
}

#[test]
fn missing_file_is_an_error() {
    let model = IdentityModel;
    let aligner = PairwiseAligner::new(AlignParams::default(), &model);
    assert!(matches!(
        aligner.align_files("does/not/exist.pcd", "does/not/exist.pcd"),
        Err(pcalign::Error::Io(_))
    ));
}

#[test]
fn checkpoint_model_recovers_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("model.ckpt");
    let checkpoint: Checkpoint = serde_json::from_value(json!({
        "hyper_parameters": {"class": "nearest_svd", "iterations": 40, "sigma": 0.1},
        "state_dict": {}
    }))
    .unwrap();
    checkpoint.save(&checkpoint_path).unwrap();

    let target = random_cloud(21);
    let pose = Pose::from_scaled_axis(&Vector3::new(0.0, 0.02, 0.04), &Vector3::new(1.0, -2.0, 0.5));
    let source = &pose * &target;

    let source_path = dir.path().join("source.pcd");
    let target_path = dir.path().join("target.pcd");
    write_pcd(&source_path, &source).unwrap();
    write_pcd(&target_path, &target).unwrap();

    let model = load_from_checkpoint(&checkpoint_path, &ModelRegistry::default()).unwrap();
    let alignment = PairwiseAligner::new(*AlignParams::default().voxel_size(0.01), model.as_ref())
        .align_files(&source_path, &target_path)
        .unwrap();

    // Normalization removes the translation, the rotation is left.
    let estimate = &alignment.registration.pose;
    assert_abs_diff_eq!(estimate.linear(), pose.linear(), epsilon = 2e-3);
    assert_abs_diff_eq!(estimate.translation(), Vector3::<f32>::zeros(), epsilon = 2e-3);
    assert_eq!(alignment.result.len(), alignment.length);
    assert_eq!(
        alignment.result.colors.as_ref().unwrap(),
        &alignment.target.colors.as_ref().unwrap().slice(s![..alignment.length, ..])
    );
}
