use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crashlog::{config, panic_hook, InstallOutcome};

#[derive(Debug, Parser)]
#[command(name = "crashlog-tools")]
#[command(about = "Inspect and exercise the debug crash log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print where the crash log is written.
    Path,
    /// Print the most recent crash log.
    Show,
    /// Install the interceptor and panic on purpose.
    Trigger {
        #[arg(long, default_value = "crashlog-tools test crash")]
        message: String,
        /// Leave the clipboard alone.
        #[arg(long)]
        no_clipboard: bool,
        /// Behave like a release build: the interceptor stays off.
        #[arg(long)]
        release: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Path => {
            let dir = config::external_storage_dir()?;
            println!("{}", config::crash_log_path(&dir).display());
        }
        Commands::Show => {
            let dir = config::external_storage_dir()?;
            let p = config::crash_log_path(&dir);
            if !p.exists() {
                return Err(anyhow!("no crash log at {}", p.display()));
            }
            let s = std::fs::read_to_string(&p)
                .with_context(|| format!("read crash log failed: {}", p.display()))?;
            print!("{s}");
        }
        Commands::Trigger {
            message,
            no_clipboard,
            release,
        } => {
            if no_clipboard {
                std::env::set_var("CRASHLOG_CLIPBOARD", "0");
            }
            match panic_hook::install_from_env(!release) {
                InstallOutcome::Installed => eprintln!("crashlog: interceptor installed"),
                InstallOutcome::Disabled => eprintln!("crashlog: release mode, interceptor off"),
                InstallOutcome::AlreadyInstalled => {}
            }
            panic!("{message}");
        }
    }
    Ok(())
}
