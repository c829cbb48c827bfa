//! Asset loading: Wavefront OBJ/MTL meshes and image textures.
pub mod image;
pub mod obj;

pub use self::image::{load_texture, texture_from_bytes};
pub use obj::{load_obj, parse_mtl, parse_obj, save_obj};
