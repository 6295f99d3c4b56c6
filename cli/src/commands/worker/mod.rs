use clap::Parser;

#[derive(Parser, Debug)]
pub struct WorkerCommand {
    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub address: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,
}
