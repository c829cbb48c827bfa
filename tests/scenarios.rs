//! End-to-end scene queries: raycasts, bounds and normals on generated
//! geometry.
use glam::{DQuat, DVec3};
use softrender::geometry::{face_normal, generate_cube, generate_sphere};
use softrender::scene::{Scene, SceneNode};
use softrender::{Material, Mesh, Ray};
use std::sync::Arc;

fn material() -> Arc<Material> {
    Arc::new(Material::default())
}

fn cube_scene(position: DVec3) -> (Scene, softrender::NodeId) {
    let mut scene = Scene::new();
    let cube = Arc::new(generate_cube(10.0, material()));
    let id = scene.add_node(SceneNode::new("cube").with_mesh(cube).with_position(position));
    (scene, id)
}

#[test]
fn raycast_hits_cube_face_at_forty() {
    let (mut scene, cube) = cube_scene(DVec3::ZERO);
    let ray = Ray::new(DVec3::new(0.0, 0.0, -50.0), DVec3::Z);
    let hit = scene.raycast(&ray, 100.0).expect("ray should hit the cube");
    assert_eq!(hit.node, cube);
    assert!((39.0..=41.0).contains(&hit.distance), "distance {}", hit.distance);
    assert!((hit.point - DVec3::new(0.0, 0.0, -10.0)).length() < 1e-9);
}

#[test]
fn raycast_misses_beside_cube() {
    let (mut scene, _) = cube_scene(DVec3::ZERO);
    let ray = Ray::new(DVec3::new(30.0, 0.0, -50.0), DVec3::Z);
    assert!(scene.raycast(&ray, 100.0).is_none());
}

#[test]
fn raycast_respects_max_distance() {
    let (mut scene, _) = cube_scene(DVec3::ZERO);
    let ray = Ray::new(DVec3::new(0.0, 0.0, -50.0), DVec3::Z);
    assert!(scene.raycast(&ray, 30.0).is_none());
}

#[test]
fn cube_bounds_overlap_by_distance() {
    let mut scene = Scene::new();
    let mesh = Arc::new(generate_cube(10.0, material()));
    let a = scene.add_node(SceneNode::new("a").with_mesh(mesh.clone()));
    let b = scene.add_node(SceneNode::new("b").with_mesh(mesh.clone()).with_position(DVec3::new(15.0, 0.0, 0.0)));
    let c = scene.add_node(SceneNode::new("c").with_mesh(mesh).with_position(DVec3::new(50.0, 0.0, 0.0)));
    scene.update_world_matrices();

    let ba = scene.world_bounds(a).unwrap();
    assert!(ba.intersects(&scene.world_bounds(b).unwrap()));
    assert!(!ba.intersects(&scene.world_bounds(c).unwrap()));
}

#[test]
fn rotated_cube_bounds_grow() {
    let (mut scene, cube) = cube_scene(DVec3::ZERO);
    scene
        .set_rotation(cube, DQuat::from_rotation_y(std::f64::consts::FRAC_PI_4))
        .unwrap();
    scene.update_world_matrices();
    let bounds = scene.world_bounds(cube).unwrap();
    assert!(bounds.size().x > 20.0, "x extent {}", bounds.size().x);
}

#[test]
fn sphere_bounds_match_diameter() {
    let mut scene = Scene::new();
    let sphere = Arc::new(generate_sphere(5.0, 16, 32, material()));
    let id = scene.add_node(SceneNode::new("sphere").with_mesh(sphere));
    scene.update_world_matrices();
    let size = scene.world_bounds(id).unwrap().size();
    for extent in size.to_array() {
        assert!((9.0..=11.0).contains(&extent), "extent {extent}");
    }
}

#[test]
fn calculate_normals_on_single_triangle() {
    let mut mesh = Mesh::new(vec![DVec3::ZERO, DVec3::X, DVec3::Y], vec![0, 1, 2], material()).unwrap();
    mesh.calculate_normals();
    for n in mesh.normals() {
        assert!((*n - DVec3::Z).length() < 1e-12);
    }
}

#[test]
fn child_world_matrix_composes_parent() {
    let mut scene = Scene::new();
    let parent = scene.add_node(SceneNode::new("parent").with_position(DVec3::new(5.0, 0.0, 0.0)));
    let child = scene
        .add_child(parent, SceneNode::new("child").with_position(DVec3::new(0.0, 2.0, 0.0)))
        .unwrap();
    scene
        .set_rotation(parent, DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2))
        .unwrap();

    let expected = scene.world_matrix(parent) * scene.node(child).unwrap().transform().local_matrix();
    let first = scene.world_matrix(child);
    let second = scene.world_matrix(child);
    assert_eq!(first, second);
    assert!(first.abs_diff_eq(expected, 1e-12));
    assert!((first.w_axis.truncate() - DVec3::new(3.0, 0.0, 0.0)).length() < 1e-12);
}

#[test]
fn face_normal_follows_winding_and_rejects_slivers() {
    let n = face_normal(&[DVec3::ZERO, DVec3::X, DVec3::Y]).unwrap();
    assert!((n - DVec3::Z).length() < 1e-12);
    let flipped = face_normal(&[DVec3::ZERO, DVec3::Y, DVec3::X]).unwrap();
    assert!((flipped + DVec3::Z).length() < 1e-12);
    assert!(face_normal(&[DVec3::ZERO, DVec3::X, DVec3::X * 2.0]).is_none());
}
