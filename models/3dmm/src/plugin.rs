//! Command registration for host applications.
//!
//! A host owns a [`CommandTable`]; [`register`] adds the BMDL import and export commands at
//! startup and [`unregister`] removes them at shutdown.

use std::{
	collections::HashMap,
	path::{
		Path,
		PathBuf
	}
};

use rgk_core::scene::Node;

#[cfg(feature = "export")]
use crate::{
	bmdl::export::BmdlExportError,
	export_model,
	ExportCfg
};

#[cfg(feature = "import")]
use crate::{
	bmdl::import::BmdlImportError,
	import_models
};

pub const IMPORT_ID: &str = "import_3dmm.brender";
pub const EXPORT_ID: &str = "export_3dmm.brender";
pub const MENU_TEXT: &str = "BRender (.bmdl)";
pub const FILTER_GLOB: &str = "*.bmdl";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandKind {
	Import,
	Export,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Command {
	pub id: &'static str,
	pub label: &'static str,
	pub description: &'static str,
	pub menu_text: &'static str,
	pub extension: &'static str,
	pub filter_glob: &'static str,
	pub kind: CommandKind,
}

/// Commands known to the host, keyed by id
#[derive(Clone, Debug, Default)]
pub struct CommandTable {
	commands: HashMap<&'static str, Command>,
}

impl CommandTable {
	pub fn new() -> CommandTable {
		CommandTable::default()
	}

	/// Adds or replaces a command
	pub fn add(&mut self, command: Command) {
		self.commands.insert(command.id, command);
	}

	pub fn remove(&mut self, id: &str) -> Option<Command> {
		self.commands.remove(id)
	}

	pub fn get(&self, id: &str) -> Option<&Command> {
		self.commands.get(id)
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Runs an import command over a batch of files.
	/// Returns `None` if `id` is not a registered import command.
	#[cfg(feature = "import")]
	pub fn run_import<P: AsRef<Path>>(&self, id: &str, filepaths: &[P])
		-> Option<Result<Vec<Node>, BmdlImportError>>
	{
		match self.get(id)?.kind {
			CommandKind::Import => Some(import_models(filepaths)),
			CommandKind::Export => None,
		}
	}

	/// Runs an export command.
	/// Returns `None` if `id` is not a registered export command.
	#[cfg(feature = "export")]
	pub fn run_export<P: AsRef<Path>>(&self, id: &str, filepath: P, nodes: &[Node], cfg: &ExportCfg)
		-> Option<Result<Vec<PathBuf>, BmdlExportError>>
	{
		match self.get(id)?.kind {
			CommandKind::Export => Some(export_model(filepath, nodes, cfg)),
			CommandKind::Import => None,
		}
	}
}

pub fn import_command() -> Command {
	Command {
		id: IMPORT_ID,
		label: "Import BRender BMDL",
		description: "Load a BRender model",
		menu_text: MENU_TEXT,
		extension: crate::EXTENSION,
		filter_glob: FILTER_GLOB,
		kind: CommandKind::Import,
	}
}

pub fn export_command() -> Command {
	Command {
		id: EXPORT_ID,
		label: "Export BRender BMDL",
		description: "Save a BRender model",
		menu_text: MENU_TEXT,
		extension: crate::EXTENSION,
		filter_glob: FILTER_GLOB,
		kind: CommandKind::Export,
	}
}

/// Adds the commands enabled by the crate features
pub fn register(table: &mut CommandTable) {
	#[cfg(feature = "import")]
	table.add(import_command());

	#[cfg(feature = "export")]
	table.add(export_command());

	tracing::debug!("Registered BMDL commands ({} total)", table.len());
}

pub fn unregister(table: &mut CommandTable) {
	table.remove(IMPORT_ID);
	table.remove(EXPORT_ID);
}
