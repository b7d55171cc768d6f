pub mod compression;
mod dir_cache;
mod link_graph;
pub mod reader;
mod restore_directory;
mod restore_regular;
mod restore_symlink;
pub mod writer;
