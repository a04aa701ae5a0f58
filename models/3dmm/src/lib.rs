pub mod bmdl;
pub mod plugin;

#[cfg(feature = "export")]
pub mod prep;

use bitflags::bitflags;

use std::path::{
	Path,
	PathBuf
};

#[cfg(feature = "export")]
use std::collections::HashSet;

#[cfg(feature = "export")]
use std::fs;

#[cfg(feature = "export")]
use rgk_core::scene::Mesh;

use rgk_core::scene::Node;

#[cfg(feature = "export")]
use bmdl::export::{
	BmdlExportError,
	encode
};

#[cfg(feature = "import")]
use bmdl::import::{
	BmdlImportError,
	decode
};

pub const EXTENSION: &str = "bmdl";

bitflags! {
	pub struct ExportFlag: u32 {
		/// One file per object, named after the object, next to the chosen path
		const SEPARATE = 1;
	}
}

impl Default for ExportFlag {
	fn default() -> Self {
		ExportFlag::empty()
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportCfg {
	pub flags: ExportFlag,
}

impl ExportCfg {
	pub fn separate() -> Self {
		Self {
			flags: ExportFlag::SEPARATE,
		}
	}
}

/// Object name derived from a file path, as the file stem
pub fn object_name(filepath: &Path) -> String {
	filepath.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default()
}

/// Reads a BMDL file into a node named after the file
#[cfg(feature = "import")]
pub fn import_model<P: AsRef<Path>>(filepath: P) -> Result<Node, BmdlImportError> {
	let filepath = filepath.as_ref();
	let data = std::fs::read(filepath)?;
	let mesh = decode(&data)?;

	tracing::info!(
		"Imported {:?}: {} vertices, {} faces",
		filepath,
		mesh.vertices.len(),
		mesh.faces.len()
	);

	Ok(Node::with_mesh(&object_name(filepath), mesh))
}

/// Reads several BMDL files, stopping at the first failure
#[cfg(feature = "import")]
pub fn import_models<P: AsRef<Path>>(filepaths: &[P]) -> Result<Vec<Node>, BmdlImportError> {
	filepaths.iter().map(import_model).collect()
}

/// Writes the geometry nodes to BMDL.
///
/// By default every node is merged into `filepath`. With [`ExportFlag::SEPARATE`] each node
/// goes to `<node name>.bmdl` in the directory of `filepath`; a failure stops the batch and keeps
/// the files already written. Node names must be usable as file names and unique, ignoring case,
/// or nothing is written. Returns the paths written.
#[cfg(feature = "export")]
pub fn export_model<P: AsRef<Path>>(filepath: P, nodes: &[Node], cfg: &ExportCfg)
	-> Result<Vec<PathBuf>, BmdlExportError>
{
	let filepath = filepath.as_ref();

	let mut meshes: Vec<(&str, &Mesh)> = vec![];
	for node in nodes.iter() {
		match node.mesh() {
			Some(mesh) => meshes.push((node.name.as_str(), mesh)),
			None => tracing::warn!("Skipping {:?}: not a mesh", node.name),
		}
	}

	if meshes.is_empty() {
		return Err(BmdlExportError::NoMeshData);
	}

	if cfg.flags.contains(ExportFlag::SEPARATE) {
		let dir = filepath.parent().unwrap_or_else(|| Path::new(""));

		let mut seen = HashSet::new();
		for (name, _) in meshes.iter() {
			check_file_stem(name)?;
			if !seen.insert(name.to_lowercase()) {
				return Err(BmdlExportError::UnsupportedInput(format!("Duplicate object name {:?}", name)));
			}
		}

		let mut written = vec![];
		for (name, mesh) in meshes.into_iter() {
			let target = dir.join(format!("{}.{}", name, EXTENSION));
			write_file(&target, std::slice::from_ref(mesh))?;
			written.push(target);
		}

		Ok(written)
	} else {
		let meshes: Vec<Mesh> = meshes.into_iter().map(|(_, m)| m.clone()).collect();
		write_file(filepath, &meshes)?;
		Ok(vec![filepath.to_path_buf()])
	}
}

/// An object name must stay a plain file name inside the export directory
#[cfg(feature = "export")]
fn check_file_stem(name: &str) -> Result<(), BmdlExportError> {
	let bad = name.is_empty()
		|| name == "."
		|| name == ".."
		|| name.contains(|c: char| c == '/' || c == '\\' || c == '\0');

	if bad {
		return Err(BmdlExportError::UnsupportedInput(format!("Object name {:?} is not a valid file name", name)));
	}

	Ok(())
}

#[cfg(feature = "export")]
fn write_file(filepath: &Path, meshes: &[Mesh]) -> Result<(), BmdlExportError> {
	let data = encode(meshes)?;
	fs::write(filepath, &data)?;

	tracing::info!("Wrote {:?} ({} bytes)", filepath, data.len());

	Ok(())
}
