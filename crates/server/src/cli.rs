//! CLI argument parsing and subcommand dispatch.

use tracing::info;

use listpilot_core::job::Job;
use listpilot_core::profile::BusinessProfile;
use listpilot_queue::consumer::QueuePublisher;
use listpilot_store::traits::{JobStore, ProfileStore};

/// Parse CLI arguments and dispatch to the appropriate subcommand.
///
/// Returns `Ok(true)` if a subcommand was handled, `Ok(false)` if `serve`
/// should be started (handled by the caller).
pub async fn dispatch(config: &listpilot_core::Config, args: &[String]) -> anyhow::Result<bool> {
    match args.get(1).map(|s| s.as_str()) {
        Some("enqueue") => {
            let customer_id = args
                .get(2)
                .expect("Usage: listpilot-server enqueue <customer_id> <package_size>");
            let package_size: u32 = args
                .get(3)
                .expect("Usage: listpilot-server enqueue <customer_id> <package_size>")
                .parse()
                .expect("package_size must be a positive integer");
            enqueue(config, customer_id, package_size).await?;
            Ok(true)
        }
        Some("serve") => Ok(false),
        _ => {
            print_usage();
            Ok(true)
        }
    }
}

/// Whether `serve` was asked to run fully in-memory.
pub fn parse_serve_args(args: &[String]) -> bool {
    args.iter().any(|a| a == "--memory")
}

/// Create a job row and push its submission order onto the queue.
async fn enqueue(
    config: &listpilot_core::Config,
    customer_id: &str,
    package_size: u32,
) -> anyhow::Result<()> {
    anyhow::ensure!(package_size >= 1, "package_size must be >= 1");

    let state = crate::startup::build_app_state(config.clone(), false).await?;

    // Seed a placeholder profile in memory mode so the flow can run.
    if state.memory_mode && state.store.fetch_profile(customer_id).await?.is_none() {
        state
            .store
            .upsert_profile(
                customer_id,
                &BusinessProfile {
                    business_name: format!("{customer_id} (placeholder)"),
                    website: "https://example.com".into(),
                    email: format!("{customer_id}@example.com"),
                    ..Default::default()
                },
            )
            .await?;
    }

    let job = Job::new(uuid::Uuid::new_v4(), customer_id, package_size as i32);
    state.store.create_job(&job).await?;

    let order = serde_json::json!({
        "job_id": job.id,
        "customer_id": customer_id,
        "package_size": package_size,
        "priority": "normal",
        "created_at": chrono::Utc::now().to_rfc3339(),
        "source": "cli",
    });
    let message_id = state.publisher.enqueue(&order.to_string()).await?;

    info!(job_id = %job.id, message_id = %message_id, "Submission order enqueued");
    println!("job_id={} message_id={}", job.id, message_id);
    Ok(())
}

fn print_usage() {
    println!("listpilot v0.1.0");
    println!("Usage: listpilot-server <command>");
    println!("  serve [--memory]                        Start the gateway + subscriber (--memory: no external services)");
    println!("  enqueue <customer_id> <package_size>    Enqueue a submission order");
}
