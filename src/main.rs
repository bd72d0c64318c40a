use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "postframe",
    version,
    about = "Render social posts into square images"
)]
struct Cli {
    /// Post JSON (id, title, text/body, subreddit/category, image_url, comments)
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Record id (used for slide file names)
    #[arg(long = "id")]
    id: Option<String>,

    /// Title text
    #[arg(short = 't', long = "title")]
    title: Option<String>,

    /// Body text
    #[arg(short = 'b', long = "body")]
    body: Option<String>,

    /// Category label (shown with the configured prefix)
    #[arg(short = 'c', long = "category")]
    category: Option<String>,

    /// Source image URL or local path
    #[arg(long = "image")]
    image: Option<String>,

    /// Write a single slide to this file
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Directory for multi-slide output (default from settings)
    #[arg(short = 'O', long = "output-dir")]
    output_dir: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    postframe::logging::init(cli.verbose)?;

    let output = postframe::run(postframe::Config {
        id: cli.id,
        title: cli.title,
        body: cli.body,
        category: cli.category,
        image: cli.image,
        input: cli.input,
        output: cli.output,
        output_dir: cli.output_dir,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
