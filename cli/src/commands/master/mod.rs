use clap::Parser;

/// Configure and run a render master.
#[derive(Parser, Debug)]
#[command(name = "master", about = "Own a frame and distribute its tiles.", long_about = None)]
pub struct MasterCommand {
    /// Worker addresses (`host:port`), dialed at startup and re-dialed
    /// while the frame is incomplete.
    #[arg(short, long, value_name = "ADDRESS", value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Frame width in pixels. Ignored when --scene is given.
    #[arg(long, value_name = "WIDTH")]
    pub width: Option<u32>,

    /// Frame height in pixels. Ignored when --scene is given.
    #[arg(long, value_name = "HEIGHT")]
    pub height: Option<u32>,

    /// Tile edge length in pixels.
    #[arg(short, long, value_name = "PIXELS")]
    pub tile_size: Option<u32>,

    /// Local render threads; 0 renders with remote workers only.
    #[arg(long, value_name = "COUNT")]
    pub threads: Option<usize>,

    /// Scene description file; the built-in demo scene is used if absent.
    #[arg(short, long, value_name = "PATH")]
    pub scene: Option<String>,

    /// Output image path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Seconds a busy worker may stay silent before its connection is
    /// treated as lost.
    #[arg(long, value_name = "SECONDS")]
    pub tile_timeout: Option<u64>,

    /// Seconds a new worker gets to acknowledge the handshake.
    #[arg(long, value_name = "SECONDS")]
    pub handshake_timeout: Option<u64>,
}
