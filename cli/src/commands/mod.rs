use clap::Subcommand;

use self::{master::MasterCommand, worker::WorkerCommand};

pub mod master;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Master Mode
    ///
    /// Own a frame: partition it into tiles, distribute them to workers
    /// and local render threads, and assemble the output image.
    Master(MasterCommand),

    /// Worker Mode
    ///
    /// Accept a master connection and render the tiles it assigns.
    Worker(WorkerCommand),
}
