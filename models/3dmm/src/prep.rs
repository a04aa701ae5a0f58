//! Mesh preparation ahead of BMDL export.
//!
//! BMDL stores triangles only and keeps a single UV per vertex record, so polygonal input is
//! merged, triangulated, then split wherever two loops of one vertex disagree on their UV.

use std::collections::HashMap;

use ultraviolet::vec::{
	Vec2,
	Vec3
};

use rgk_core::scene::{
	Face,
	Mesh
};

/// Areas below this are treated as degenerate
const EPSILON: f32 = 1.0e-12;

/// A face corner carried through triangulation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
	pub vertex: usize,
	pub uv: Vec2,
}

pub type Triangle = [Corner; 3];

/// Triangle mesh holding exactly one UV per vertex
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedMesh {
	pub vertices: Vec<Vec3>,
	pub uvs: Vec<Vec2>,
	pub triangles: Vec<[usize; 3]>,
}

/// Runs the whole pipeline: merge, triangulate, split
pub fn prepare(meshes: &[Mesh]) -> PreparedMesh {
	let merged = merge(meshes);
	let triangles = triangulate(&merged);
	let prepared = split_by_uv(&merged.vertices, &triangles);

	tracing::debug!(
		"Prepared {} mesh(es): {} faces -> {} triangles, {} vertices -> {}",
		meshes.len(),
		merged.faces.len(),
		prepared.triangles.len(),
		merged.vertices.len(),
		prepared.vertices.len()
	);

	prepared
}

/// Concatenates meshes into one, offsetting face indices per source mesh
pub fn merge(meshes: &[Mesh]) -> Mesh {
	let mut merged = Mesh::new();
	for mesh in meshes.iter() {
		merged.merge(mesh);
	}

	merged
}

/// Splits every face into triangles, keeping winding order and loop UVs
pub fn triangulate(mesh: &Mesh) -> Vec<Triangle> {
	let mut triangles = Vec::with_capacity(mesh.faces.len());
	let mut start = 0;

	for face in mesh.faces.iter() {
		let corners: Vec<Corner> = face.indices().iter().enumerate()
			.map(|(i, v)| Corner {
				vertex: *v,
				uv: mesh.loop_uv(start + i),
			})
			.collect();
		start += corners.len();

		match face {
			Face::Triangle(_) => triangles.push([corners[0], corners[1], corners[2]]),
			Face::Quad(_) => triangles.extend_from_slice(&split_quad(&mesh.vertices, &corners)),
			Face::Ngon(_) => match corners.len() {
				0..=2 => {},
				3 => triangles.push([corners[0], corners[1], corners[2]]),
				4 => triangles.extend_from_slice(&split_quad(&mesh.vertices, &corners)),
				_ => clip_ears(&mesh.vertices, &corners, &mut triangles),
			},
		}
	}

	triangles
}

/// Gives every distinct (vertex, UV) pair its own vertex.
///
/// The first UV met for a vertex keeps the original slot, further UVs append copies.
/// Vertices referenced by no triangle keep their slot with a zero UV.
pub fn split_by_uv(vertices: &[Vec3], triangles: &[Triangle]) -> PreparedMesh {
	let mut out = PreparedMesh {
		vertices: vertices.to_vec(),
		uvs: vec![Vec2::zero(); vertices.len()],
		triangles: Vec::with_capacity(triangles.len()),
	};
	let mut claimed = vec![false; vertices.len()];
	let mut copies: HashMap<(usize, [u32; 2]), usize> = HashMap::new();

	for tri in triangles.iter() {
		let indices = tri.map(|c| {
			*copies.entry((c.vertex, uv_key(c.uv))).or_insert_with(|| {
				if !claimed[c.vertex] {
					claimed[c.vertex] = true;
					out.uvs[c.vertex] = c.uv;
					c.vertex
				} else {
					out.vertices.push(vertices[c.vertex]);
					out.uvs.push(c.uv);
					out.vertices.len() - 1
				}
			})
		});
		out.triangles.push(indices);
	}

	out
}

/// Hashable UV, with `-0.0` folded into `0.0`
fn uv_key(uv: Vec2) -> [u32; 2] {
	[(uv.x + 0.0).to_bits(), (uv.y + 0.0).to_bits()]
}

/// Smallest interior angle of a triangle, zero when degenerate
fn min_angle(a: Vec3, b: Vec3, c: Vec3) -> f32 {
	let angle = |p: Vec3, q: Vec3, r: Vec3| {
		let u = q - p;
		let v = r - p;
		let len = u.mag() * v.mag();
		if len <= EPSILON {
			return 0.0;
		}
		(u.dot(v) / len).clamp(-1.0, 1.0).acos()
	};

	angle(a, b, c).min(angle(b, c, a)).min(angle(c, a, b))
}

fn quality(vertices: &[Vec3], t: &Triangle) -> f32 {
	min_angle(vertices[t[0].vertex], vertices[t[1].vertex], vertices[t[2].vertex])
}

/// Splits a quad along the diagonal giving the better shaped pair of triangles.
/// A diagonal running outside the quad, which happens on concave quads, is never taken.
fn split_quad(vertices: &[Vec3], c: &[Corner]) -> [Triangle; 2] {
	let first = [[c[0], c[1], c[2]], [c[0], c[2], c[3]]];
	let second = [[c[0], c[1], c[3]], [c[1], c[2], c[3]]];

	let points: Vec<Vec3> = c.iter().map(|c| vertices[c.vertex]).collect();
	let flat = match project(&points) {
		Some(flat) => flat,
		None => return first,
	};

	// Both triangles must keep the winding of the projected quad
	let inside = |pair: &[[usize; 3]; 2]| pair.iter().all(|t| area2(flat[t[0]], flat[t[1]], flat[t[2]]) > EPSILON);
	let score = |pair: &[Triangle; 2]| quality(vertices, &pair[0]).min(quality(vertices, &pair[1]));

	match (inside(&[[0, 1, 2], [0, 2, 3]]), inside(&[[0, 1, 3], [1, 2, 3]])) {
		(false, true) => second,
		(true, true) if score(&second) > score(&first) => second,
		_ => first,
	}
}

/// Newell normal of a polygon, not normalized
fn newell_normal(points: &[Vec3]) -> Vec3 {
	let mut n = Vec3::zero();
	for (i, p) in points.iter().enumerate() {
		let q = points[(i + 1) % points.len()];
		n.x += (p.y - q.y) * (p.z + q.z);
		n.y += (p.z - q.z) * (p.x + q.x);
		n.z += (p.x - q.x) * (p.y + q.y);
	}

	n
}

/// Projects a polygon onto its Newell plane, counter-clockwise.
/// Returns `None` when the polygon has no usable plane.
fn project(points: &[Vec3]) -> Option<Vec<Vec2>> {
	let normal = newell_normal(points);
	if normal.mag_sq() <= EPSILON {
		return None;
	}
	let normal = normal.normalized();

	// Basis with tangent x bitangent = normal keeps the projection counter-clockwise
	let axis = if normal.x.abs() < 0.9 {
		Vec3::unit_x()
	} else {
		Vec3::unit_y()
	};
	let tangent = axis.cross(normal).normalized();
	let bitangent = normal.cross(tangent);

	Some(points.iter().map(|p| Vec2::new(p.dot(tangent), p.dot(bitangent))).collect())
}

/// Twice the signed area of a 2D triangle, positive when counter-clockwise
fn area2(a: Vec2, b: Vec2, c: Vec2) -> f32 {
	(b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

fn in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
	area2(a, b, p) >= 0.0 && area2(b, c, p) >= 0.0 && area2(c, a, p) >= 0.0
}

/// Ear clipping over the polygon projected onto its own plane, taking the best shaped ear first.
/// Falls back to a fan when the polygon has no usable plane or runs out of ears.
fn clip_ears(vertices: &[Vec3], corners: &[Corner], out: &mut Vec<Triangle>) {
	let points: Vec<Vec3> = corners.iter().map(|c| vertices[c.vertex]).collect();

	let flat = match project(&points) {
		Some(flat) => flat,
		None => {
			fan(corners, out);
			return;
		},
	};

	let mut remaining: Vec<usize> = (0..corners.len()).collect();
	while remaining.len() > 3 {
		let n = remaining.len();
		let mut best: Option<(usize, f32)> = None;

		for i in 0..n {
			let (p, c, x) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
			if area2(flat[p], flat[c], flat[x]) <= EPSILON {
				continue;
			}

			let blocked = remaining.iter()
				.filter(|r| **r != p && **r != c && **r != x)
				.any(|r| in_triangle(flat[*r], flat[p], flat[c], flat[x]));
			if blocked {
				continue;
			}

			let score = min_angle(points[p], points[c], points[x]);
			if best.map_or(true, |(_, s)| score > s) {
				best = Some((i, score));
			}
		}

		match best {
			Some((i, _)) => {
				let (p, c, x) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
				out.push([corners[p], corners[c], corners[x]]);
				remaining.remove(i);
			},
			None => {
				let rest: Vec<Corner> = remaining.iter().map(|r| corners[*r]).collect();
				fan(&rest, out);
				return;
			},
		}
	}

	out.push([corners[remaining[0]], corners[remaining[1]], corners[remaining[2]]]);
}

fn fan(corners: &[Corner], out: &mut Vec<Triangle>) {
	for i in 1..(corners.len().saturating_sub(1)) {
		out.push([corners[0], corners[i], corners[i + 1]]);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn polygon(points: &[(f32, f32)]) -> Mesh {
		let mut mesh = Mesh::new();
		for (x, y) in points.iter() {
			mesh.add_vertex(Vec3::new(*x, *y, 0.0));
		}
		let indices: Vec<usize> = (0..points.len()).collect();
		let uvs: Vec<Vec2> = points.iter().map(|(x, y)| Vec2::new(*x, *y)).collect();
		mesh.add_face(Face::from_indices(&indices), Some(&uvs));
		mesh
	}

	fn area(mesh: &Mesh, t: &Triangle) -> f32 {
		let [a, b, c] = t.map(|c| mesh.vertices[c.vertex]);
		(b - a).cross(c - a).z / 2.0
	}

	#[test]
	fn test_quad() {
		let mesh = polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
		let tris = triangulate(&mesh);

		assert_eq!(tris.len(), 2);
		let total: f32 = tris.iter().map(|t| area(&mesh, t)).sum();
		assert!((total - 1.0).abs() < 1.0e-6);

		let mut used: Vec<usize> = tris.iter().flat_map(|t| t.iter().map(|c| c.vertex)).collect();
		used.sort_unstable();
		used.dedup();
		assert_eq!(used, vec![0, 1, 2, 3]);
	}

	#[test]
	fn test_quad_beauty() {
		// Thin kite: the short diagonal 1-3 gives far better triangles
		let mesh = polygon(&[(0.0, 0.0), (5.0, -1.0), (10.0, 0.0), (5.0, 1.0)]);
		let tris = triangulate(&mesh);

		assert_eq!(tris[0].map(|c| c.vertex), [0, 1, 3]);
		assert_eq!(tris[1].map(|c| c.vertex), [1, 2, 3]);
	}

	#[test]
	fn test_concave_quad() {
		// Dart with its reflex corner at 1: only the diagonal 1-3 stays inside
		let mesh = polygon(&[(0.0, 0.0), (2.0, 1.8), (4.0, 0.0), (2.0, 2.0)]);
		let tris = triangulate(&mesh);

		assert_eq!(tris.len(), 2);
		assert_eq!(tris[0].map(|c| c.vertex), [0, 1, 3]);
		assert_eq!(tris[1].map(|c| c.vertex), [1, 2, 3]);
		for t in tris.iter() {
			assert!(area(&mesh, t) > 0.0, "flipped triangle {:?}", t.map(|c| c.vertex));
		}

		let total: f32 = tris.iter().map(|t| area(&mesh, t)).sum();
		assert!((total - 0.4).abs() < 1.0e-5);

		// Same dart with the reflex corner at 0 must keep the 0-2 diagonal
		let mesh = polygon(&[(2.0, 1.8), (4.0, 0.0), (2.0, 2.0), (0.0, 0.0)]);
		let tris = triangulate(&mesh);
		assert_eq!(tris[0].map(|c| c.vertex), [0, 1, 2]);
		assert_eq!(tris[1].map(|c| c.vertex), [0, 2, 3]);
		assert!(tris.iter().all(|t| area(&mesh, t) > 0.0));
	}

	#[test]
	fn test_concave_quad_ngon() {
		let mut mesh = Mesh::new();
		for (x, y) in [(0.0, 0.0), (2.0, 1.8), (4.0, 0.0), (2.0, 2.0)].iter() {
			mesh.add_vertex(Vec3::new(*x, *y, 0.0));
		}
		mesh.faces.push(Face::Ngon(vec![0, 1, 2, 3]));

		let tris = triangulate(&mesh);
		assert_eq!(tris.len(), 2);
		assert!(tris.iter().all(|t| area(&mesh, t) > 0.0));
	}

	#[test]
	fn test_convex_ngon() {
		let mesh = polygon(&[(0.0, 0.0), (2.0, 0.0), (3.0, 1.5), (1.0, 3.0), (-1.0, 1.5)]);
		let tris = triangulate(&mesh);

		assert_eq!(tris.len(), 3);
		assert!(tris.iter().all(|t| area(&mesh, t) > 0.0));
	}

	#[test]
	fn test_concave_ngon() {
		let mesh = polygon(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]);
		let tris = triangulate(&mesh);

		assert_eq!(tris.len(), 4);
		let total: f32 = tris.iter().map(|t| area(&mesh, t)).sum();
		assert!((total - 3.0).abs() < 1.0e-5);

		for t in tris.iter() {
			assert!(area(&mesh, t) > 0.0);
			let [a, b, c] = t.map(|c| mesh.vertices[c.vertex]);
			let centroid = (a + b + c) / 3.0;
			assert!(!(centroid.x > 1.0 && centroid.y > 1.0), "triangle outside polygon: {:?}", t);
		}
	}

	#[test]
	fn test_ngon_uvs_follow_corners() {
		let mesh = polygon(&[(0.0, 0.0), (2.0, 0.0), (3.0, 1.5), (1.0, 3.0), (-1.0, 1.5)]);
		for t in triangulate(&mesh).iter() {
			for c in t.iter() {
				let p = mesh.vertices[c.vertex];
				assert_eq!(c.uv, Vec2::new(p.x, p.y));
			}
		}
	}

	#[test]
	fn test_degenerate_ngon() {
		let mesh = polygon(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
		assert_eq!(triangulate(&mesh).len(), 3);
	}

	#[test]
	fn test_split_shared_uv() {
		let mut mesh = Mesh::new();
		mesh.add_vertex(Vec3::new(0.0, 0.0, 0.0));
		mesh.add_vertex(Vec3::new(1.0, 0.0, 0.0));
		mesh.add_vertex(Vec3::new(0.0, 1.0, 0.0));
		mesh.add_vertex(Vec3::new(1.0, 1.0, 0.0));
		mesh.add_face(Face::Triangle([0, 1, 2]), Some(&[
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(0.0, 1.0),
		]));
		// Same UVs on the shared edge 1-2
		mesh.add_face(Face::Triangle([1, 3, 2]), Some(&[
			Vec2::new(1.0, 0.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(0.0, 1.0),
		]));

		let prepared = prepare(&[mesh]);
		assert_eq!(prepared.vertices.len(), 4);
		assert_eq!(prepared.triangles, vec![[0, 1, 2], [1, 3, 2]]);
	}

	#[test]
	fn test_split_seam() {
		let mut mesh = Mesh::new();
		mesh.add_vertex(Vec3::new(0.0, 0.0, 0.0));
		mesh.add_vertex(Vec3::new(1.0, 0.0, 0.0));
		mesh.add_vertex(Vec3::new(0.0, 1.0, 0.0));
		mesh.add_vertex(Vec3::new(1.0, 1.0, 0.0));
		mesh.add_face(Face::Triangle([0, 1, 2]), Some(&[
			Vec2::new(0.0, 0.0),
			Vec2::new(0.5, 0.0),
			Vec2::new(0.0, 0.5),
		]));
		// Vertex 1 disagrees, vertex 2 agrees
		mesh.add_face(Face::Triangle([1, 3, 2]), Some(&[
			Vec2::new(0.75, 0.25),
			Vec2::new(1.0, 1.0),
			Vec2::new(0.0, 0.5),
		]));

		let prepared = prepare(&[mesh]);
		assert_eq!(prepared.vertices.len(), 5);
		assert_eq!(prepared.triangles, vec![[0, 1, 2], [4, 3, 2]]);
		assert_eq!(prepared.vertices[4], prepared.vertices[1]);
		assert_eq!(prepared.uvs[1], Vec2::new(0.5, 0.0));
		assert_eq!(prepared.uvs[4], Vec2::new(0.75, 0.25));
	}

	#[test]
	fn test_loose_vertex() {
		let mut mesh = polygon(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
		mesh.add_vertex(Vec3::new(5.0, 5.0, 5.0));

		let prepared = prepare(&[mesh]);
		assert_eq!(prepared.vertices.len(), 4);
		assert_eq!(prepared.uvs[3], Vec2::zero());
	}

	#[test]
	fn test_merge_without_uvs() {
		let mut bare = Mesh::new();
		for _ in 0..3 {
			bare.add_vertex(Vec3::one());
		}
		bare.add_face(Face::Triangle([0, 1, 2]), None);

		let merged = merge(&[bare, polygon(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])]);
		assert_eq!(merged.uvs.len(), 6);
		assert_eq!(merged.faces[1], Face::Triangle([3, 4, 5]));
		assert_eq!(merged.loop_uv(0), Vec2::zero());
		assert_eq!(merged.loop_uv(4), Vec2::new(1.0, 0.0));
	}
}
