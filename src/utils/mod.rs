pub mod io;
pub mod process;
pub mod uri;
