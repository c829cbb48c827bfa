//! Wavefront OBJ/MTL reading and writing.
//!
//! Faces are fan-triangulated and vertices deduplicated per
//! `(position, uv, normal)` index triple. Each material used by `usemtl`
//! becomes its own [`Mesh`], in order of first use.

use crate::error::{RenderError, Result};
use crate::geometry::Mesh;
use crate::material::{BasicMaterial, Material};
use crate::math::{Point, TextureCoord};
use crate::texture::Color;
use glam::{DVec2, DVec3};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Group name for faces that precede any `usemtl`.
const DEFAULT_GROUP: &str = "default";

/// Index triple of one face corner; `None` for an omitted uv or normal.
type Corner = (usize, Option<usize>, Option<usize>);

struct Group {
    material: String,
    cache: HashMap<Corner, u32>,
    corners: Vec<Corner>,
    indices: Vec<u32>,
}

impl Group {
    fn new(material: &str) -> Self {
        Self {
            material: material.to_string(),
            cache: HashMap::new(),
            corners: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn push(&mut self, corner: Corner) {
        let next = self.corners.len() as u32;
        let index = *self.cache.entry(corner).or_insert(next);
        if index == next {
            self.corners.push(corner);
        }
        self.indices.push(index);
    }
}

/// Parse `N` floats from the fields after the keyword.
fn floats<const N: usize>(fields: &[&str], source: &str, line: usize) -> Result<[f64; N]> {
    if fields.len() < N {
        return Err(RenderError::invalid_asset_at(
            source,
            line,
            format!("expected {} numbers, found {}", N, fields.len()),
        ));
    }
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = field.parse::<f64>().map_err(|_| {
            RenderError::invalid_asset_at(source, line, format!("bad number {field:?}"))
        })?;
        if !slot.is_finite() {
            return Err(RenderError::invalid_asset_at(
                source,
                line,
                format!("non-finite number {field:?}"),
            ));
        }
    }
    Ok(out)
}

/// Resolve a 1-based (or negative, relative) OBJ index against `len`
/// elements seen so far.
fn resolve(field: &str, len: usize, what: &str, source: &str, line: usize) -> Result<usize> {
    let raw: i64 = field
        .parse()
        .map_err(|_| RenderError::invalid_asset_at(source, line, format!("bad {what} index {field:?}")))?;
    let index = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => len.checked_sub(r.unsigned_abs() as usize),
    };
    match index {
        Some(i) if i < len => Ok(i),
        _ => Err(RenderError::invalid_asset_at(
            source,
            line,
            format!("{what} index {raw} out of range ({len} defined)"),
        )),
    }
}

fn parse_corner(
    item: &str,
    counts: (usize, usize, usize),
    source: &str,
    line: usize,
) -> Result<Corner> {
    let mut parts = item.split('/');
    let v = resolve(parts.next().unwrap_or_default(), counts.0, "vertex", source, line)?;
    let vt = match parts.next() {
        None | Some("") => None,
        Some(f) => Some(resolve(f, counts.1, "uv", source, line)?),
    };
    let vn = match parts.next() {
        None | Some("") => None,
        Some(f) => Some(resolve(f, counts.2, "normal", source, line)?),
    };
    if parts.next().is_some() {
        return Err(RenderError::invalid_asset_at(
            source,
            line,
            format!("malformed face item {item:?}"),
        ));
    }
    Ok((v, vt, vn))
}

fn unit_color(rgb: [f64; 3]) -> Color {
    Color::from_unit(DVec3::from_array(rgb))
}

/// Parse an MTL library into named materials.
pub fn parse_mtl(src: &str, source_name: &str) -> Result<HashMap<String, Material>> {
    let mut materials: Vec<(String, BasicMaterial)> = Vec::new();

    for (n, raw) in src.lines().enumerate() {
        let line = n + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = text.split_whitespace().collect();
        let (keyword, args) = (fields[0], &fields[1..]);

        if keyword == "newmtl" {
            let name = args.join(" ");
            if name.is_empty() {
                return Err(RenderError::invalid_asset_at(source_name, line, "newmtl without a name"));
            }
            materials.push((name, BasicMaterial::default()));
            continue;
        }

        let current = match keyword {
            "Kd" | "Ks" | "Ka" | "Ns" => match materials.last_mut() {
                Some((_, m)) => m,
                None => {
                    return Err(RenderError::invalid_asset_at(
                        source_name,
                        line,
                        format!("{keyword} before any newmtl"),
                    ))
                }
            },
            _ => {
                log::trace!("{source_name}:{line}: ignoring {keyword}");
                continue;
            }
        };
        match keyword {
            "Kd" => current.diffuse = unit_color(floats::<3>(args, source_name, line)?),
            "Ks" => current.specular = unit_color(floats::<3>(args, source_name, line)?),
            "Ka" => {
                let [r, g, b] = floats::<3>(args, source_name, line)?;
                current.ambient_strength = (r + g + b) / 3.0;
            }
            "Ns" => current.shininess = floats::<1>(args, source_name, line)?[0],
            _ => {}
        }
    }

    Ok(materials
        .into_iter()
        .map(|(name, basic)| (name, Material::Basic(basic)))
        .collect())
}

/// Parse OBJ source text. `mtl_lookup` returns the contents of a library
/// named by `mtllib`.
pub fn parse_obj<F>(src: &str, source_name: &str, mut mtl_lookup: F) -> Result<Vec<Mesh>>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut positions: Vec<Point> = Vec::new();
    let mut uvs: Vec<TextureCoord> = Vec::new();
    let mut normals: Vec<DVec3> = Vec::new();
    let mut materials: HashMap<String, Arc<Material>> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut current = DEFAULT_GROUP.to_string();
    // First `usemtl` line per material name.
    let mut used: HashMap<String, usize> = HashMap::new();

    for (n, raw) in src.lines().enumerate() {
        let line = n + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = text.split_whitespace().collect();
        let (keyword, args) = (fields[0], &fields[1..]);

        match keyword {
            "v" => positions.push(DVec3::from_array(floats::<3>(args, source_name, line)?)),
            "vn" => normals.push(DVec3::from_array(floats::<3>(args, source_name, line)?)),
            "vt" => {
                let u = floats::<1>(args, source_name, line)?[0];
                let v = match args.get(1) {
                    Some(_) => floats::<2>(args, source_name, line)?[1],
                    None => 0.0,
                };
                uvs.push(DVec2::new(u, v));
            }
            "f" => {
                if args.len() < 3 {
                    return Err(RenderError::invalid_asset_at(
                        source_name,
                        line,
                        format!("face needs at least 3 vertices, found {}", args.len()),
                    ));
                }
                let counts = (positions.len(), uvs.len(), normals.len());
                let corners = args
                    .iter()
                    .map(|item| parse_corner(item, counts, source_name, line))
                    .collect::<Result<Vec<_>>>()?;

                let group = match groups.iter().position(|g| g.material == current) {
                    Some(i) => &mut groups[i],
                    None => {
                        groups.push(Group::new(&current));
                        let last = groups.len() - 1;
                        &mut groups[last]
                    }
                };
                for i in 1..corners.len() - 1 {
                    group.push(corners[0]);
                    group.push(corners[i]);
                    group.push(corners[i + 1]);
                }
            }
            "usemtl" => {
                let name = args.join(" ");
                if name.is_empty() {
                    return Err(RenderError::invalid_asset_at(source_name, line, "usemtl without a name"));
                }
                used.entry(name.clone()).or_insert(line);
                current = name;
            }
            "mtllib" => {
                for lib in args {
                    let text = mtl_lookup(lib)?;
                    for (name, material) in parse_mtl(&text, lib)? {
                        materials.insert(name, Arc::new(material));
                    }
                }
            }
            _ => log::trace!("{source_name}:{line}: ignoring {keyword}"),
        }
    }

    for (name, line) in unresolved_materials(&used, &materials) {
        log::warn!("{source_name}:{line}: unknown material {name:?}, using default");
    }
    let default_material = Arc::new(Material::default());
    let single = groups.len() == 1;
    let mut meshes = Vec::with_capacity(groups.len());
    for group in groups {
        let material = materials
            .get(&group.material)
            .cloned()
            .unwrap_or_else(|| default_material.clone());
        let name = if single {
            source_name.to_string()
        } else {
            format!("{source_name}:{}", group.material)
        };
        meshes.push(build_mesh(group, &name, material, &positions, &uvs, &normals)?);
    }
    log::debug!(
        "parsed {source_name}: {} vertices, {} meshes",
        positions.len(),
        meshes.len()
    );
    Ok(meshes)
}

/// Names given to `usemtl` that no library defined, with the line of
/// their first use, in line order.
fn unresolved_materials<'a, M>(
    used: &'a HashMap<String, usize>,
    materials: &HashMap<String, M>,
) -> Vec<(&'a str, usize)> {
    let mut missing: Vec<(&str, usize)> = used
        .iter()
        .filter(|(name, _)| !materials.contains_key(*name))
        .map(|(name, &line)| (name.as_str(), line))
        .collect();
    missing.sort_unstable_by_key(|&(_, line)| line);
    missing
}

fn build_mesh(
    group: Group,
    name: &str,
    material: Arc<Material>,
    positions: &[Point],
    uvs: &[TextureCoord],
    normals: &[DVec3],
) -> Result<Mesh> {
    let vertices = group.corners.iter().map(|&(v, _, _)| positions[v]).collect();
    let mut mesh = Mesh::new(vertices, group.indices, material)?.with_name(name);

    if group.corners.iter().any(|c| c.1.is_some()) {
        let coords = group
            .corners
            .iter()
            .map(|&(_, vt, _)| vt.map_or(DVec2::ZERO, |i| uvs[i]))
            .collect();
        mesh = mesh.with_uvs(coords)?;
    }
    if group.corners.iter().all(|c| c.2.is_some()) {
        let ns = group
            .corners
            .iter()
            .map(|&(_, _, vn)| vn.map_or(DVec3::ZERO, |i| normals[i]))
            .collect();
        mesh = mesh.with_normals(ns)?;
    } else if group.corners.iter().any(|c| c.2.is_some()) {
        log::debug!("{name}: some faces lack normals, recomputing");
        mesh.calculate_normals();
    }
    Ok(mesh)
}

/// Load an OBJ file; `mtllib` references resolve next to it.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Vec<Mesh>> {
    let path = path.as_ref();
    let src = read_text(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_obj(&src, &name, |lib| read_text(&dir.join(lib)))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => RenderError::not_found(path),
        _ => RenderError::Io(err),
    })
}

/// Write `mesh` as OBJ. Positions include the mesh translation.
pub fn save_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "# softrender")?;
    writeln!(writer, "o {}", mesh.name())?;
    for i in 0..mesh.vertices().len() {
        let p = mesh.vertex(i);
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for uv in mesh.uvs() {
        writeln!(writer, "vt {} {}", uv.x, uv.y)?;
    }
    for n in mesh.normals() {
        writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    let (has_uv, has_n) = (mesh.has_uvs(), mesh.has_normals());
    for tri in mesh.triangles() {
        write!(writer, "f")?;
        for i in tri {
            let k = i + 1;
            match (has_uv, has_n) {
                (false, false) => write!(writer, " {k}")?,
                (true, false) => write!(writer, " {k}/{k}")?,
                (false, true) => write!(writer, " {k}//{k}")?,
                (true, true) => write!(writer, " {k}/{k}/{k}")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}
