use std::collections::{HashMap, HashSet};

use cgmath::{InnerSpace, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::error::ConsolidateError;
use crate::math;
use crate::model::{MeshSurface, Model, ModelNode, VertexBuffer};

/// Settings for [`consolidate`]. Missing JSON fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidateOptions {
    pub remove_unused: bool,
    pub remove_backfaces: bool,
    pub weld_similar: bool,
    /// maximum model-space distance between welded vertices
    pub weld_threshold: f32,
    /// maximum length of the difference between welded vertices' normals
    pub weld_normal_threshold: f32,
    /// triangles whose face normal deviates from their vertex normals by more than this
    /// many degrees are dropped
    pub backface_angle: f32,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            remove_unused: true,
            remove_backfaces: true,
            weld_similar: false,
            weld_threshold: 0.000005,
            weld_normal_threshold: 0.01,
            backface_angle: 90.0,
        }
    }
}

impl ConsolidateOptions {
    pub fn validate(&self) -> Result<(), ConsolidateError> {
        let thresholds = [
            ("weld_threshold", self.weld_threshold),
            ("weld_normal_threshold", self.weld_normal_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConsolidateError::InvalidOption { name, value });
            }
        }
        if !self.backface_angle.is_finite() || !(0.0..=180.0).contains(&self.backface_angle) {
            return Err(ConsolidateError::InvalidOption {
                name: "backface_angle",
                value: self.backface_angle,
            });
        }
        Ok(())
    }
}

/// What a consolidation run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidateReport {
    pub removed_vertices: usize,
    pub removed_texcoords: usize,
    pub removed_colors: usize,
    pub removed_backfaces: usize,
    pub removed_degenerate: usize,
    pub welded_vertices: usize,
    pub removed_surfaces: usize,
}

impl ConsolidateReport {
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

fn surfaces_mut(nodes: &mut [ModelNode]) -> impl Iterator<Item = &mut MeshSurface> {
    nodes
        .iter_mut()
        .filter_map(|n| n.mesh.as_mut())
        .flat_map(|m| m.surfaces.iter_mut())
}

fn vertex_lists(surface: &MeshSurface) -> [&Vec<u32>; 5] {
    [
        &surface.position_indices,
        &surface.normal_indices,
        &surface.weight_indices,
        &surface.joint_indices,
        &surface.node_indices,
    ]
}

fn vertex_lists_mut(surface: &mut MeshSurface) -> [&mut Vec<u32>; 5] {
    [
        &mut surface.position_indices,
        &mut surface.normal_indices,
        &mut surface.weight_indices,
        &mut surface.joint_indices,
        &mut surface.node_indices,
    ]
}

fn mark_used(used: &mut [bool], indices: &[u32]) {
    for &i in indices {
        if let Some(slot) = used.get_mut(i as usize) {
            *slot = true;
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut i = 0;
    values.retain(|_| {
        let k = keep.get(i).copied().unwrap_or(true);
        i += 1;
        k
    });
}

/// Old index to new index for a stable compaction; dropped entries map to `None`.
fn build_remap(keep: &[bool]) -> Vec<Option<u32>> {
    let mut next = 0u32;
    keep.iter()
        .map(|&k| {
            if k {
                next += 1;
                Some(next - 1)
            } else {
                None
            }
        })
        .collect()
}

fn apply_remap(indices: &mut [u32], remap: &[Option<u32>]) {
    for index in indices.iter_mut() {
        if let Some(Some(new)) = remap.get(*index as usize) {
            *index = *new;
        }
    }
}

/// Drop buffer entries no surface references, in all three index spaces.
/// Returns `(vertices, texcoords, colors)` removed.
pub fn remove_unused(model: &mut Model) -> (usize, usize, usize) {
    let Model {
        nodes,
        vertex_buffer,
        ..
    } = model;

    let mut used_vertices = vec![false; vertex_buffer.positions.len()];
    let mut used_texcoords = vec![false; vertex_buffer.texcoords.len()];
    let mut used_colors = vec![false; vertex_buffer.colors.len()];
    for surface in surfaces_mut(nodes) {
        for list in vertex_lists(surface) {
            mark_used(&mut used_vertices, list);
        }
        mark_used(&mut used_texcoords, &surface.texcoord_indices);
        mark_used(&mut used_colors, &surface.color_indices);
    }

    let removed = (
        used_vertices.iter().filter(|u| !**u).count(),
        used_texcoords.iter().filter(|u| !**u).count(),
        used_colors.iter().filter(|u| !**u).count(),
    );
    if removed == (0, 0, 0) {
        return removed;
    }

    let vertex_remap = build_remap(&used_vertices);
    let texcoord_remap = build_remap(&used_texcoords);
    let color_remap = build_remap(&used_colors);

    for surface in surfaces_mut(nodes) {
        for list in vertex_lists_mut(surface) {
            apply_remap(list, &vertex_remap);
        }
        apply_remap(&mut surface.texcoord_indices, &texcoord_remap);
        apply_remap(&mut surface.color_indices, &color_remap);
    }

    for mesh in nodes.iter_mut().filter_map(|n| n.mesh.as_mut()) {
        let before = (mesh.vertex_buffer_offset as usize).min(used_vertices.len());
        mesh.vertex_buffer_offset = used_vertices[..before].iter().filter(|u| **u).count() as u32;
    }

    compact_vertex_space(vertex_buffer, &used_vertices);
    retain_by_mask(&mut vertex_buffer.texcoords, &used_texcoords);
    retain_by_mask(&mut vertex_buffer.colors, &used_colors);

    log::debug!(
        "removed {} unused vertices, {} texcoords, {} colors",
        removed.0,
        removed.1,
        removed.2
    );
    removed
}

fn compact_vertex_space(buffer: &mut VertexBuffer, keep: &[bool]) {
    retain_by_mask(&mut buffer.positions, keep);
    retain_by_mask(&mut buffer.normals, keep);
    retain_by_mask(&mut buffer.t_positions, keep);
    retain_by_mask(&mut buffer.t_normals, keep);
    retain_by_mask(&mut buffer.weights, keep);
    retain_by_mask(&mut buffer.joints, keep);
    retain_by_mask(&mut buffer.nodes, keep);
}

fn corners(buffer: &VertexBuffer, triangle: [u32; 3]) -> Option<[Vector3<f32>; 3]> {
    let [a, b, c] = triangle;
    Some([
        *buffer.t_positions.get(a as usize)?,
        *buffer.t_positions.get(b as usize)?,
        *buffer.t_positions.get(c as usize)?,
    ])
}

/// Same triangle under rotation of its corners; winding is preserved.
fn canonical(triangle: [u32; 3]) -> [u32; 3] {
    let [a, b, c] = triangle;
    if a <= b && a <= c {
        [a, b, c]
    } else if b <= a && b <= c {
        [b, c, a]
    } else {
        [c, a, b]
    }
}

/// Drop triangles with repeated corners, zero area, or that repeat an earlier triangle of
/// the same surface.
pub fn remove_degenerate(model: &mut Model) -> usize {
    let Model {
        nodes,
        vertex_buffer,
        ..
    } = model;
    let vertex_buffer = &*vertex_buffer;

    let mut removed = 0;
    for surface in surfaces_mut(nodes) {
        let mut seen = HashSet::new();
        let keep: Vec<bool> = (0..surface.triangle_count())
            .map(|t| {
                let triangle = surface.triangle(t);
                let [a, b, c] = triangle;
                if a == b || b == c || a == c {
                    return false;
                }
                if let Some([pa, pb, pc]) = corners(vertex_buffer, triangle) {
                    if math::face_normal(pa, pb, pc).is_none() {
                        return false;
                    }
                }
                seen.insert(canonical(triangle))
            })
            .collect();
        removed += surface.retain_triangles(&keep);
    }

    if removed > 0 {
        log::debug!("removed {} degenerate or duplicate triangles", removed);
    }
    removed
}

/// Drop triangles facing away from their own vertex normals by more than `max_angle` degrees.
pub fn remove_backfaces(model: &mut Model, max_angle: f32) -> usize {
    let Model {
        nodes,
        vertex_buffer,
        ..
    } = model;
    let vertex_buffer = &*vertex_buffer;

    let mut removed = 0;
    for surface in surfaces_mut(nodes) {
        let keep: Vec<bool> = (0..surface.triangle_count())
            .map(|t| {
                let triangle = surface.triangle(t);
                let Some([pa, pb, pc]) = corners(vertex_buffer, triangle) else {
                    return true;
                };
                let Some(face) = math::face_normal(pa, pb, pc) else {
                    return true;
                };
                let reference = triangle
                    .iter()
                    .filter_map(|&i| vertex_buffer.t_normals.get(i as usize))
                    .fold(Vector3::zero(), |acc, n| acc + *n);
                match math::angle_between_degrees(face, reference) {
                    Some(angle) => angle <= max_angle,
                    None => true,
                }
            })
            .collect();
        removed += surface.retain_triangles(&keep);
    }

    if removed > 0 {
        log::debug!("removed {} back-facing triangles", removed);
    }
    removed
}

type Cell = (i64, i64, i64);

fn cell_of(p: Vector3<f32>, size: f32) -> Cell {
    (
        (p.x / size).floor() as i64,
        (p.y / size).floor() as i64,
        (p.z / size).floor() as i64,
    )
}

fn similar(buffer: &VertexBuffer, a: usize, b: usize, threshold: f32, normal_threshold: f32) -> bool {
    (buffer.t_positions[a] - buffer.t_positions[b]).magnitude() <= threshold
        && (buffer.t_normals[a] - buffer.t_normals[b]).magnitude() <= normal_threshold
        && buffer.joints[a] == buffer.joints[b]
        && buffer.weights[a] == buffer.weights[b]
}

/// Merge referenced vertices that lie within `threshold` of an earlier kept vertex and
/// whose normal, joint and weight match it. A vertex is only ever merged into a vertex
/// that stays, so merges never chain. Returns the number of vertices merged away.
pub fn weld_similar(model: &mut Model, threshold: f32, normal_threshold: f32) -> usize {
    let Model {
        nodes,
        vertex_buffer,
        ..
    } = model;
    let vertex_buffer = &*vertex_buffer;

    let count = vertex_buffer.positions.len();
    let complete = [
        vertex_buffer.t_positions.len(),
        vertex_buffer.t_normals.len(),
        vertex_buffer.joints.len(),
        vertex_buffer.weights.len(),
    ]
    .iter()
    .all(|&len| len == count);
    if !complete {
        log::warn!("vertex buffer arrays differ in length, skipping weld");
        return 0;
    }

    let mut used = vec![false; count];
    for surface in surfaces_mut(nodes) {
        for list in vertex_lists(surface) {
            mark_used(&mut used, list);
        }
    }

    let cell_size = if threshold > 0.0 { threshold } else { 1.0 };
    let mut grid: HashMap<Cell, Vec<usize>> = HashMap::new();
    let mut remap: Vec<u32> = (0..count as u32).collect();
    let mut welded = 0;

    for i in (0..count).filter(|&i| used[i]) {
        let (cx, cy, cz) = cell_of(vertex_buffer.t_positions[i], cell_size);
        let mut best: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(kept) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &r in kept {
                        if best.map_or(true, |b| r < b)
                            && similar(vertex_buffer, i, r, threshold, normal_threshold)
                        {
                            best = Some(r);
                        }
                    }
                }
            }
        }

        match best {
            Some(r) => {
                remap[i] = r as u32;
                welded += 1;
            }
            None => grid.entry((cx, cy, cz)).or_default().push(i),
        }
    }

    if welded > 0 {
        for surface in surfaces_mut(nodes) {
            for list in vertex_lists_mut(surface) {
                for index in list.iter_mut() {
                    if let Some(&new) = remap.get(*index as usize) {
                        *index = new;
                    }
                }
            }
        }
        log::debug!("welded {} vertices", welded);
    }
    welded
}

fn count_unused(model: &mut Model, report: &mut ConsolidateReport) {
    let (vertices, texcoords, colors) = remove_unused(model);
    report.removed_vertices += vertices;
    report.removed_texcoords += texcoords;
    report.removed_colors += colors;
}

fn remove_empty_surfaces(model: &mut Model) -> usize {
    let mut removed = 0;
    for mesh in model.nodes.iter_mut().filter_map(|n| n.mesh.as_mut()) {
        let before = mesh.surfaces.len();
        mesh.surfaces.retain(|s| s.triangle_count() > 0);
        removed += before - mesh.surfaces.len();
    }
    removed
}

/// Clean an assembled model in place.
///
/// Passes run in order: unused-vertex removal, degenerate and back-facing triangle
/// removal, welding (followed by another degenerate and backface sweep over the merged
/// corners), then unused-vertex removal again. Options are validated before
/// anything changes.
pub fn consolidate(
    model: &mut Model,
    options: &ConsolidateOptions,
) -> Result<ConsolidateReport, ConsolidateError> {
    options.validate()?;
    let mut report = ConsolidateReport::default();

    if options.remove_unused {
        count_unused(model, &mut report);
    }
    if options.remove_backfaces {
        report.removed_degenerate += remove_degenerate(model);
        report.removed_backfaces += remove_backfaces(model, options.backface_angle);
    }
    if options.weld_similar {
        report.welded_vertices += weld_similar(
            model,
            options.weld_threshold,
            options.weld_normal_threshold,
        );
        if report.welded_vertices > 0 {
            report.removed_degenerate += remove_degenerate(model);
            // moved corners can tip a triangle past the angle limit
            if options.remove_backfaces {
                report.removed_backfaces += remove_backfaces(model, options.backface_angle);
            }
        }
    }
    if options.remove_unused {
        count_unused(model, &mut report);
    }
    report.removed_surfaces = remove_empty_surfaces(model);

    log::info!(
        "consolidated model: {} vertices, {} triangles ({:?})",
        model.vertex_buffer.vertex_count(),
        model.triangle_count(),
        report
    );
    Ok(report)
}

impl Model {
    /// See [`consolidate`].
    pub fn consolidate(
        &mut self,
        options: &ConsolidateOptions,
    ) -> Result<ConsolidateReport, ConsolidateError> {
        consolidate(self, options)
    }
}
