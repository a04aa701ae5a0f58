use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use ultraviolet::vec::{
	Vec2,
	Vec3
};

use rgk_core::{
	io_ext::{
		ReadBinExt,
		WriteBinExt
	},
	rtag4
};

#[cfg(feature = "import")]
use rgk_core::scene::{
	Face,
	Mesh
};

#[cfg(feature = "export")]
use crate::prep::PreparedMesh;

#[cfg(feature = "export")]
use export::BmdlExportError;

#[cfg(feature = "import")]
use import::BmdlImportError;

pub const MAGIC: u32 = rtag4!(b"\x01\x00\x03\x03");
pub const HEADER_SIZE: usize = 48;
pub const HEADER_RESERVED: usize = 40;
pub const VERTEX_SIZE: usize = 32;
pub const VERTEX_RESERVED: usize = 12;
pub const FACE_SIZE: usize = 32;
pub const FACE_RESERVED: usize = 26;
/// Offset of the face flag inside the reserved block of a face record
pub const FACE_FLAG_OFFSET: usize = 10;
pub const DEFAULT_FACE_FLAG: u8 = 0x01;
pub const MAX_VERTICES: usize = u16::MAX as usize;
pub const MAX_FACES: usize = u16::MAX as usize;

/// Read side: position = raw / 655360, UV = raw / 655360 * 10
pub const POSITION_DIVISOR: f64 = 655360.0;
pub const UV_DIVISOR: f64 = 655360.0;
pub const UV_MULTIPLIER: f64 = 10.0;

/// Write side: position = value * 10 * 65536, UV = value * 65536
pub const POSITION_SCALE: f64 = 10.0 * 65536.0;
pub const UV_SCALE: f64 = 65536.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub magic: u32,
	pub num_verts: u16,
	pub num_faces: u16,
}

impl Header {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<Header, BmdlImportError>
	where
		R: ReadBytesExt + ReadBinExt,
	{
		let magic = buf.read_u32::<LE>()?;
		if magic != MAGIC {
			return Err(BmdlImportError::InvalidFormat(magic.to_le_bytes()));
		}

		let num_verts = buf.read_u16::<LE>()?;
		let num_faces = buf.read_u16::<LE>()?;
		buf.skip(HEADER_RESERVED as u64)?;

		Ok(Header {
			magic: magic,
			num_verts: num_verts,
			num_faces: num_faces,
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> Result<(), BmdlExportError>
	where
		W: WriteBytesExt + WriteBinExt,
	{
		buf.write_u32::<LE>(self.magic)?;
		buf.write_u16::<LE>(self.num_verts)?;
		buf.write_u16::<LE>(self.num_faces)?;
		buf.write_zeros(HEADER_RESERVED)?;
		Ok(())
	}
}

/// Raw fixed-point vertex, as stored on disk
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexRecord {
	pub position: [i32; 3],
	pub uv: [i32; 2],
}

impl VertexRecord {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<VertexRecord, BmdlImportError>
	where
		R: ReadBytesExt + ReadBinExt,
	{
		let mut fields = [0; 5];
		buf.read_i32_into::<LE>(&mut fields)?;
		buf.skip(VERTEX_RESERVED as u64)?;

		Ok(VertexRecord {
			position: [fields[0], fields[1], fields[2]],
			uv: [fields[3], fields[4]],
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> Result<(), BmdlExportError>
	where
		W: WriteBytesExt + WriteBinExt,
	{
		for v in self.position.iter().chain(self.uv.iter()) {
			buf.write_i32::<LE>(*v)?;
		}
		buf.write_zeros(VERTEX_RESERVED)?;
		Ok(())
	}

	/// Converts a position and its UV into fixed point
	#[cfg(feature = "export")]
	pub fn from_vertex(position: Vec3, uv: Vec2) -> Result<VertexRecord, BmdlExportError> {
		Ok(VertexRecord {
			position: [
				export::to_fixed(position.x, POSITION_SCALE)?,
				export::to_fixed(position.y, POSITION_SCALE)?,
				export::to_fixed(position.z, POSITION_SCALE)?,
			],
			uv: [
				export::to_fixed(uv.x, UV_SCALE)?,
				export::to_fixed(uv.y, UV_SCALE)?,
			],
		})
	}

	pub fn position(&self) -> Vec3 {
		let [x, y, z] = self.position.map(|v| (v as f64 / POSITION_DIVISOR) as f32);
		Vec3::new(x, y, z)
	}

	pub fn uv(&self) -> Vec2 {
		let [u, v] = self.uv.map(|v| (v as f64 / UV_DIVISOR * UV_MULTIPLIER) as f32);
		Vec2::new(u, v)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRecord {
	pub indices: [u16; 3],
	/// Undocumented per-face flag, kept as found
	pub flag: u8,
}

impl Default for FaceRecord {
	fn default() -> Self {
		FaceRecord {
			indices: [0; 3],
			flag: DEFAULT_FACE_FLAG,
		}
	}
}

impl FaceRecord {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<FaceRecord, BmdlImportError>
	where
		R: ReadBytesExt + ReadBinExt,
	{
		let mut indices = [0; 3];
		buf.read_u16_into::<LE>(&mut indices)?;
		let reserved = buf.read_bytes::<FACE_RESERVED>()?;

		Ok(FaceRecord {
			indices: indices,
			flag: reserved[FACE_FLAG_OFFSET],
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> Result<(), BmdlExportError>
	where
		W: WriteBytesExt + WriteBinExt,
	{
		for i in self.indices.iter() {
			buf.write_u16::<LE>(*i)?;
		}
		buf.write_zeros(FACE_FLAG_OFFSET)?;
		buf.write_u8(self.flag)?;
		buf.write_zeros(FACE_RESERVED - FACE_FLAG_OFFSET - 1)?;
		Ok(())
	}
}

/// Record-level view of a BMDL file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrenderModel {
	pub vertices: Vec<VertexRecord>,
	pub faces: Vec<FaceRecord>,
}

impl BrenderModel {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<BrenderModel, BmdlImportError>
	where
		R: ReadBytesExt + ReadBinExt,
	{
		let header = Header::read(buf)?;
		tracing::debug!("BMDL header: {} vertices, {} faces", header.num_verts, header.num_faces);

		let mut vertices = Vec::with_capacity(header.num_verts as usize);
		for _ in 0..header.num_verts {
			vertices.push(VertexRecord::read(buf)?);
		}

		let mut faces = Vec::with_capacity(header.num_faces as usize);
		for _ in 0..header.num_faces {
			faces.push(FaceRecord::read(buf)?);
		}

		Ok(BrenderModel {
			vertices: vertices,
			faces: faces,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), BmdlExportError>
	where
		W: WriteBytesExt + WriteBinExt,
	{
		if self.vertices.len() > MAX_VERTICES {
			return Err(BmdlExportError::MaxVertices(self.vertices.len()));
		}
		if self.faces.len() > MAX_FACES {
			return Err(BmdlExportError::MaxFaces(self.faces.len()));
		}

		let header = Header {
			magic: MAGIC,
			num_verts: self.vertices.len() as u16,
			num_faces: self.faces.len() as u16,
		};
		header.write(buf)?;

		for v in self.vertices.iter() {
			v.write(buf)?;
		}
		for f in self.faces.iter() {
			f.write(buf)?;
		}

		Ok(())
	}

	/// Size of the serialized model in bytes
	pub fn size(&self) -> usize {
		HEADER_SIZE + self.vertices.len() * VERTEX_SIZE + self.faces.len() * FACE_SIZE
	}

	/// Builds a mesh, attaching each vertex record's UV to every loop referencing it
	#[cfg(feature = "import")]
	pub fn to_mesh(&self) -> Result<Mesh, BmdlImportError> {
		let mut mesh = Mesh::new();
		for v in self.vertices.iter() {
			mesh.add_vertex(v.position());
		}

		for f in self.faces.iter() {
			let mut indices = [0; 3];
			let mut uvs = [Vec2::zero(); 3];

			for (i, index) in f.indices.iter().enumerate() {
				let vert = self.vertices.get(*index as usize).ok_or(BmdlImportError::VertexIndex {
					index: *index as usize,
					count: self.vertices.len(),
				})?;
				indices[i] = *index as usize;
				uvs[i] = vert.uv();
			}

			mesh.add_face(Face::Triangle(indices), Some(&uvs));
		}

		Ok(mesh)
	}

	/// Converts a triangulated, UV-split mesh into records.
	/// Counts are checked by `write`, indices past u16 never reach the output.
	#[cfg(feature = "export")]
	pub fn from_prepared(mesh: &PreparedMesh) -> Result<BrenderModel, BmdlExportError> {
		let vertices = mesh.vertices.iter().enumerate()
			.map(|(i, p)| VertexRecord::from_vertex(*p, mesh.uvs.get(i).copied().unwrap_or_else(Vec2::zero)))
			.collect::<Result<Vec<_>, _>>()?;

		let faces = mesh.triangles.iter()
			.map(|t| FaceRecord {
				indices: t.map(|i| i as u16),
				flag: DEFAULT_FACE_FLAG,
			})
			.collect();

		Ok(BrenderModel {
			vertices: vertices,
			faces: faces,
		})
	}
}

#[cfg(feature = "import")]
pub mod import {
	use std::io;
	use thiserror::Error;

	use rgk_core::scene::Mesh;

	use super::BrenderModel;

	#[derive(Debug, Error)]
	pub enum BmdlImportError {
		#[error("I/O error")]
		IO {
			source: io::Error,
		},
		#[error("This doesn't look like a BRender model (magic {0:02X?})")]
		InvalidFormat([u8; 4]),
		#[error("File ends in the middle of a record")]
		TruncatedFile,
		#[error("Face references vertex {index}, but the model has {count} vertices")]
		VertexIndex {
			index: usize,
			count: usize,
		},
	}

	impl From<io::Error> for BmdlImportError {
		fn from(source: io::Error) -> Self {
			match source.kind() {
				io::ErrorKind::UnexpectedEof => BmdlImportError::TruncatedFile,
				_ => BmdlImportError::IO {
					source: source,
				},
			}
		}
	}

	/// Parses a BMDL byte buffer into a triangle mesh with one UV per loop
	pub fn decode(bytes: &[u8]) -> Result<Mesh, BmdlImportError> {
		let mut buf = bytes;
		BrenderModel::read(&mut buf)?.to_mesh()
	}

}

#[cfg(feature = "export")]
pub mod export {
	use std::io;
	use thiserror::Error;

	use rgk_core::scene::Mesh;

	use crate::prep;
	use super::BrenderModel;

	#[derive(Debug, Error)]
	pub enum BmdlExportError {
		#[error("Value {0} does not fit the fixed-point range")]
		FixedPointRange(f32),
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Max number of allowed faces exceeded: {0}/65535")]
		MaxFaces(usize),
		#[error("Max number of allowed vertices exceeded: {0}/65535")]
		MaxVertices(usize),
		#[error("No mesh data to export")]
		NoMeshData,
		#[error("Unsupported input: {0}")]
		UnsupportedInput(String),
	}

	/// Scales and rounds a value into a signed 32-bit fixed-point number
	pub(crate) fn to_fixed(value: f32, scale: f64) -> Result<i32, BmdlExportError> {
		let scaled = (value as f64 * scale).round();
		if !scaled.is_finite() || scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
			return Err(BmdlExportError::FixedPointRange(value));
		}

		Ok(scaled as i32)
	}

	/// Checks the structure of an input mesh
	fn validate(n: usize, mesh: &Mesh) -> Result<(), BmdlExportError> {
		if let Some((i, face)) = mesh.faces.iter().enumerate().find(|(_, f)| f.len() < 3) {
			return Err(BmdlExportError::UnsupportedInput(
				format!("mesh {}: face {} has {} corners", n, i, face.len())));
		}

		if let Some((face, vertex)) = mesh.find_invalid_index() {
			return Err(BmdlExportError::UnsupportedInput(
				format!("mesh {}: face {} references missing vertex {}", n, face, vertex)));
		}

		if mesh.has_uvs() && mesh.uvs.len() != mesh.loop_count() {
			return Err(BmdlExportError::UnsupportedInput(
				format!("mesh {}: {} UVs for {} loops", n, mesh.uvs.len(), mesh.loop_count())));
		}

		Ok(())
	}

	/// Merges, triangulates and serializes meshes into a BMDL byte buffer
	pub fn encode(meshes: &[Mesh]) -> Result<Vec<u8>, BmdlExportError> {
		if meshes.is_empty() {
			return Err(BmdlExportError::NoMeshData);
		}

		for (n, mesh) in meshes.iter().enumerate() {
			validate(n, mesh)?;
		}

		let prepared = prep::prepare(meshes);
		let model = BrenderModel::from_prepared(&prepared)?;

		let mut data = Vec::with_capacity(model.size());
		model.write(&mut data)?;

		Ok(data)
	}

}
