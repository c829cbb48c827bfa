//! Loading assets from disk.
use glam::DVec3;
use softrender::geometry::generate_sphere;
use softrender::loaders::{load_obj, load_texture, save_obj};
use softrender::{Color, Material, RenderError};
use std::fs;
use std::sync::Arc;

#[test]
fn obj_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sphere.obj");
    let sphere = generate_sphere(2.0, 8, 12, Arc::new(Material::default()));

    let mut file = fs::File::create(&path).unwrap();
    save_obj(&sphere, &mut file).unwrap();
    drop(file);

    let meshes = load_obj(&path).unwrap();
    assert_eq!(meshes.len(), 1);
    let loaded = &meshes[0];
    assert_eq!(loaded.name(), "sphere");
    assert_eq!(loaded.triangle_count(), sphere.triangle_count());
    assert!(loaded.has_normals() && loaded.has_uvs());
    for i in 0..sphere.triangle_count() {
        assert_eq!(loaded.triangle(i), sphere.triangle(i));
    }
}

#[test]
fn mtllib_resolves_next_to_the_obj() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("paint.mtl"), "newmtl green\nKd 0 1 0\nNs 10\n").unwrap();
    fs::write(
        dir.path().join("tri.obj"),
        "mtllib paint.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl green\nf 1 2 3\n",
    )
    .unwrap();

    let meshes = load_obj(dir.path().join("tri.obj")).unwrap();
    assert_eq!(meshes[0].material().diffuse_color(0.0, 0.0), Color::GREEN);
    assert_eq!(meshes[0].material().shininess(), 10.0);
    assert_eq!(meshes[0].bounds().max, DVec3::new(1.0, 1.0, 0.0));
}

#[test]
fn missing_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_obj(dir.path().join("nope.obj")).unwrap_err();
    assert!(matches!(err, RenderError::ResourceNotFound { .. }));

    fs::write(dir.path().join("lonely.obj"), "mtllib gone.mtl\nv 0 0 0\n").unwrap();
    let err = load_obj(dir.path().join("lonely.obj")).unwrap_err();
    match err {
        RenderError::ResourceNotFound { path } => assert!(path.ends_with("gone.mtl")),
        other => panic!("unexpected {other}"),
    }

    let err = load_texture(dir.path().join("nope.png")).unwrap_err();
    assert!(matches!(err, RenderError::ResourceNotFound { .. }));
}

#[test]
fn malformed_obj_builds_no_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.obj");
    fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nf 1 2 9\n").unwrap();
    let err = load_obj(&path).unwrap_err();
    assert!(err.to_string().contains("line 5"), "{err}");
}

#[test]
fn png_texture_loads_row_major() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tex.png");
    let img = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 100, y as u8 * 200, 7]));
    img.save(&path).unwrap();

    let tex = load_texture(&path).unwrap();
    assert_eq!((tex.width(), tex.height()), (3, 2));
    assert_eq!(tex.get_pixel(2, 1), Some(Color::new(200, 200, 7)));
    assert_eq!(tex.pixels()[1], Color::new(100, 0, 7));
}
