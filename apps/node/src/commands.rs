//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;

use hyperion_hub_connection::{ConnectionSupervisor, EnrollmentClient, HubSelection, resolve};
use hyperion_node_config::{CredentialStore, PREFERRED_HUB_KEY};

/// Prints the node identity and store summary.
pub fn info(store: &CredentialStore) {
    let preferred: String = store.get_setting(PREFERRED_HUB_KEY, String::new());
    println!("node id:      {}", store.node_id().as_deref().unwrap_or("<unknown>"));
    println!("store:        {}", store.path().display());
    println!("default port: {}", store.default_port());
    println!("hubs:         {}", store.get_all_servers().len());
    if !preferred.is_empty() {
        println!("default hub:  {preferred}");
    }
}

/// Builds the hub url from what the user typed.
///
/// Anything with a scheme is taken as a url. Otherwise the address and
/// overrides go through the resolver.
pub fn hub_url(
    address: &str,
    host: Option<&str>,
    port: Option<u32>,
    tls: bool,
) -> anyhow::Result<String> {
    if address.contains("://") {
        return Ok(address.to_string());
    }
    let resolved = resolve(Some(address), host, port)?;
    Ok(resolved.http_url(tls))
}

pub async fn enroll(
    store: Arc<CredentialStore>,
    name: &str,
    url: &str,
    otp: &str,
) -> anyhow::Result<()> {
    let client = EnrollmentClient::new(store)?;
    let record = client
        .enroll(url, otp, name)
        .await
        .with_context(|| format!("enrollment with {url} failed"))?;
    println!("enrolled with hub '{}' at {}", record.name, record.url);
    Ok(())
}

/// Lists enrolled hubs. Credentials are never printed.
pub fn hubs(store: &CredentialStore) {
    let servers = store.get_all_servers();
    if servers.is_empty() {
        println!("no hubs enrolled");
        return;
    }
    let preferred: String = store.get_setting(PREFERRED_HUB_KEY, String::new());
    for s in servers {
        let marker = if s.name == preferred { "*" } else { " " };
        let expiry = s
            .expiry
            .map(|e| e.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{marker} {:<20} {:<40} expires: {expiry:<12} enrolled: {}",
            s.name,
            s.url,
            s.enrolled_at.to_rfc3339()
        );
    }
}

pub fn remove(store: &CredentialStore, name: &str) -> anyhow::Result<()> {
    if !store.remove_server(name)? {
        bail!("hub '{name}' is not enrolled");
    }
    let preferred: String = store.get_setting(PREFERRED_HUB_KEY, String::new());
    if preferred == name {
        store.set_setting(PREFERRED_HUB_KEY, "")?;
    }
    println!("removed hub '{name}'");
    Ok(())
}

pub fn use_hub(store: &CredentialStore, name: &str) -> anyhow::Result<()> {
    if !store.contains_server(name) {
        bail!("hub '{name}' is not enrolled");
    }
    store.set_setting(PREFERRED_HUB_KEY, name)?;
    println!("default hub set to '{name}'");
    Ok(())
}

/// Runs the supervisor until Ctrl-C.
pub async fn worker(store: Arc<CredentialStore>, hub: Option<String>) -> anyhow::Result<()> {
    let selection = match hub {
        Some(name) => HubSelection::Named(name),
        None => HubSelection::Auto,
    };
    let supervisor = ConnectionSupervisor::new(store);
    let cancel = CancellationToken::new();

    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    supervisor.run(&selection, cancel).await?;
    Ok(())
}

/// Cancels `cancel` once `signal` fires.
///
/// If the signal handler cannot be installed the worker keeps running and
/// only the error is logged.
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("SIGINT received, shutting down");
            cancel.cancel();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl-C; stop the worker another way");
        }
    }
}
