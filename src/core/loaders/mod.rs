pub mod installer;
pub mod process;

pub use installer::{ClientInstaller, InstallOutcome, INSTALL_CLIENT_FLAG};
pub use process::{CommandRunner, CommandSpec, ProcessExit, SystemCommandRunner};
