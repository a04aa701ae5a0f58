use ultraviolet::vec::{
	Vec2,
	Vec3
};

#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
	Geometry(Mesh),
	Null,
}

/// A named object of the host scene
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	pub name: String,
	pub data: NodeData,
}

impl Node {
	pub fn new(name: &str) -> Node {
		Node {
			name: name.to_string(),
			data: NodeData::Null,
		}
	}

	pub fn with_mesh(name: &str, mesh: Mesh) -> Node {
		Node {
			name: name.to_string(),
			data: NodeData::Geometry(mesh),
		}
	}

	/// Returns the mesh if this node holds geometry
	pub fn mesh(&self) -> Option<&Mesh> {
		match &self.data {
			NodeData::Geometry(mesh) => Some(mesh),
			NodeData::Null => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Face {
	Triangle([usize; 3]),
	Quad([usize; 4]),
	Ngon(Vec<usize>),
}

impl Face {
	/// Builds the tightest variant for the given corner list
	pub fn from_indices(indices: &[usize]) -> Face {
		match *indices {
			[a, b, c] => Face::Triangle([a, b, c]),
			[a, b, c, d] => Face::Quad([a, b, c, d]),
			_ => Face::Ngon(indices.to_vec()),
		}
	}

	pub fn indices(&self) -> &[usize] {
		match self {
			Face::Triangle(t) => t,
			Face::Quad(q) => q,
			Face::Ngon(n) => n,
		}
	}

	pub fn len(&self) -> usize {
		self.indices().len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices().is_empty()
	}
}

/// One face corner: the attachment point of per-corner attributes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Loop {
	pub index: usize,
	pub face: usize,
	pub corner: usize,
	pub vertex: usize,
}

/// Polygon mesh with an optional single UV layer.
///
/// `uvs` is indexed by loop, walking faces in order and corners in order.
/// An empty `uvs` means the mesh has no UV layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
	pub vertices: Vec<Vec3>,
	pub faces: Vec<Face>,
	pub uvs: Vec<Vec2>,
}

impl Mesh {
	pub fn new() -> Mesh {
		Mesh::default()
	}

	/// Appends a vertex and returns its index
	pub fn add_vertex(&mut self, position: Vec3) -> usize {
		self.vertices.push(position);
		self.vertices.len() - 1
	}

	/// Appends a face together with the UVs of its corners.
	///
	/// Passing `None` on a mesh that already has a UV layer fills the corners with zeros.
	/// Passing UVs on a mesh without a layer creates one, zero-filling the earlier loops.
	pub fn add_face(&mut self, face: Face, uvs: Option<&[Vec2]>) {
		let corners = face.len();

		match uvs {
			Some(uvs) => {
				if self.uvs.is_empty() {
					self.uvs.resize(self.loop_count(), Vec2::zero());
				}
				self.uvs.extend((0..corners).map(|i| uvs.get(i).copied().unwrap_or_else(Vec2::zero)));
			},
			None => if self.has_uvs() {
				self.uvs.extend(std::iter::repeat(Vec2::zero()).take(corners));
			},
		}

		self.faces.push(face);
	}

	pub fn has_uvs(&self) -> bool {
		!self.uvs.is_empty()
	}

	/// Total number of face corners
	pub fn loop_count(&self) -> usize {
		self.faces.iter().map(|f| f.len()).sum()
	}

	/// Iterates over every face corner in loop order
	pub fn loops(&self) -> impl Iterator<Item = Loop> + '_ {
		self.faces.iter().enumerate()
			.flat_map(|(f, face)| face.indices().iter().enumerate().map(move |(c, v)| (f, c, *v)))
			.enumerate()
			.map(|(index, (face, corner, vertex))| Loop {
				index: index,
				face: face,
				corner: corner,
				vertex: vertex,
			})
	}

	/// UV of a loop, `(0, 0)` if the mesh has no UV layer
	pub fn loop_uv(&self, index: usize) -> Vec2 {
		self.uvs.get(index).copied().unwrap_or_else(Vec2::zero)
	}

	/// Returns the first face corner referencing a missing vertex, as `(face, vertex)`
	pub fn find_invalid_index(&self) -> Option<(usize, usize)> {
		self.loops()
			.find(|l| l.vertex >= self.vertices.len())
			.map(|l| (l.face, l.vertex))
	}

	/// Appends another mesh, offsetting its face indices
	pub fn merge(&mut self, other: &Mesh) {
		let offset = self.vertices.len();
		self.vertices.extend_from_slice(&other.vertices);

		let mut start = 0;
		for face in other.faces.iter() {
			let indices: Vec<usize> = face.indices().iter().map(|v| v + offset).collect();
			let end = start + indices.len();

			let uvs = if other.has_uvs() {
				other.uvs.get(start..end)
			} else {
				None
			};
			self.add_face(Face::from_indices(&indices), uvs);
			start = end;
		}
	}
}
