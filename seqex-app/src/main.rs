mod app;
mod cli;
mod input;
mod logging;
mod view;

pub use app::App;
use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.log_level, &cli.log_file)?;

    let app = App::new(&cli).await?;
    let report = app.run().await?;

    if report.aborted {
        println!("Experiment aborted.");
    } else {
        if let Some(code) = report.submission.subject_code() {
            println!("Subject code: {code}");
        }
        if let Some(target) = &report.redirect_to {
            println!("Continue at {target}");
        }
    }

    Ok(())
}
