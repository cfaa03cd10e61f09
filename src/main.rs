use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use member_pipeline::{
    config::Config,
    documents::ManualGenerator,
    links::LinkSigner,
    mail::Mailer,
    membership::{MembershipService, MemoryStore},
    queue::{NotificationJob, Pipeline},
    utils::{init_logger, wait_for_termination},
};

#[derive(Parser, Debug)]
#[command(name = "member-pipeline", about = "Runs the mail and document job pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline until SIGINT/SIGTERM (default)
    Serve,
    /// Queue one test mail to ADDRESS, drain and exit
    TestEmail {
        #[arg(value_name = "ADDRESS")]
        to: String,
    },
    /// Register an account, mail its activation link, drain and exit
    Register {
        email: String,
        first_name: String,
        last_name: String,
        /// Also subscribe the account to this plan (1 Bronze, 2 Silver, 3 Gold)
        #[arg(long)]
        plan: Option<i64>,
    },
    /// Check a signed activation link and print the outcome
    CheckLink { link: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        smtp_host = %config.mail.host,
        smtp_port = config.mail.port,
        templates = %config.mail.template_dir.display(),
        base_url = %config.app.base_url,
        "Configuration loaded"
    );

    let signer = LinkSigner::from_config(&config.links);
    let command = args.command.unwrap_or(Command::Serve);

    // Link checks are stateless and need no pipeline
    if let Command::CheckLink { link } = &command {
        let status = signer.check(link, config.links.expiry_minutes);
        println!("{}", status.message());
        return Ok(());
    }

    let mailer = Mailer::smtp(config.mail.clone())?;
    let documents = ManualGenerator::from_config(&config.documents);
    let pipeline = Pipeline::start(&config.pipeline, mailer, documents);

    let store = Arc::new(MemoryStore::with_default_plans());
    let membership = MembershipService::new(
        store.clone(),
        store,
        signer,
        pipeline.queue(),
        &config.app.base_url,
        config.links.expiry_minutes,
    );

    match command {
        Command::TestEmail { to } => {
            let job = NotificationJob::new(&to, "Test email")
                .with_payload(serde_json::json!("Hello from the job pipeline."));
            let id = pipeline.enqueue(job).await?;
            info!(job_id = %id, to = %to, "Test email queued");
        }
        Command::Register {
            email,
            first_name,
            last_name,
            plan,
        } => {
            let user = membership.register(&email, &first_name, &last_name).await?;
            println!("{}", membership.activation_link(&user.email));
            if let Some(plan_id) = plan {
                membership.subscribe(user.id, plan_id).await?;
            }
        }
        Command::Serve | Command::CheckLink { .. } => {
            info!("Pipeline running; waiting for shutdown signal");
            wait_for_termination().await;
        }
    }

    let report = pipeline.shutdown().await;
    if !report.drained {
        warn!(abandoned = report.abandoned, "Shut down before all jobs finished");
    }
    info!(
        succeeded = pipeline.succeeded(),
        failed = pipeline.failed(),
        errors = pipeline.errors_reported(),
        "Pipeline stopped"
    );

    Ok(())
}
