use clap::{Parser, Subcommand};

use tradegate::agent::IntentClassifier;
use tradegate::bootstrap::{init_tracing, load_tradegate_env};
use tradegate::channels::repl::ReplChannel;
use tradegate::{App, Config};

#[derive(Parser, Debug)]
#[command(name = "tradegate", version, about = "Account linking and trade-intent gating")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "TRADEGATE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session for one authenticated identity.
    Repl {
        /// Identity the session acts as.
        #[arg(long, env = "TRADEGATE_IDENTITY")]
        identity: String,
    },
    /// Print READ or WRITE for a message.
    Classify {
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_tradegate_env();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Classify { text } => {
            println!("{}", IntentClassifier::new().classify(&text.join(" ")));
        }
        Command::Repl { identity } => {
            let identity = identity.trim().to_string();
            if identity.is_empty() {
                anyhow::bail!("--identity must not be empty");
            }
            let config = Config::load()?;
            let app = App::connect(config).await?;
            let sweeper = app.spawn_sweeper();
            tracing::info!(identity = %identity, "Starting REPL");
            let session = ReplChannel::new(identity).run(&app).await;
            sweeper.abort();
            session.map_err(tradegate::Error::from)?;
        }
    }
    Ok(())
}
