use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use relay_core::{PollStatus, ProcessingState, ProcessingView};
use relay_engine::{
    deterministic_filename, serve as serve_relay, spawn_poller, AtomicFileWriter, BackendClient,
    ChannelPollSink, ClientSettings, InMemoryStore, PollEvent, RelayClient, RelayState,
};
use relay_logging::{relay_info, relay_warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::RelayConfig;

const RESULTS_FILE: &str = "results.json";

pub async fn serve(config: RelayConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    let mut state = RelayState::new(Arc::new(InMemoryStore::new()))
        .with_terminal_rule(config.terminal_rule)
        .with_max_body_bytes(config.max_body_bytes);
    match config.auth_settings() {
        Some(auth) => state = state.with_auth(auth),
        None => relay_info!("sign-in routes disabled: auth_server, client_id or redirect_uri unset"),
    }

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    serve_relay(listener, state, wait_for_shutdown_signal())
        .await
        .context("relay server failed")?;
    relay_info!("relay stopped");
    Ok(())
}

pub async fn watch(
    config: RelayConfig,
    account: String,
    relay_url: Option<String>,
    token: Option<String>,
    register: bool,
) -> Result<()> {
    let settings = ClientSettings::default();
    let relay = RelayClient::new(
        &relay_url.clone().unwrap_or_else(|| config.relay_url()),
        &settings,
    )?;
    let backend = BackendClient::new(&config.backend_url, resolve_token(token)?, &settings)?;

    if register {
        // An explicit --relay-url is taken to be reachable by the pipeline too.
        let webhook_base = match relay_url {
            Some(url) => url,
            None => config.webhook_base_url()?,
        };
        let webhook_url = RelayClient::new(&webhook_base, &settings)?.webhook_url(&account)?;
        let listing = backend.list_envelopes(webhook_url.as_str()).await?;
        if let Some(user) = &listing.user {
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        println!("{} envelope(s) sent for processing:", listing.envelopes.len());
        for envelope in &listing.envelopes {
            println!("  {}  {}  ({})", envelope.envelope_id, envelope.subject, envelope.status);
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = spawn_poller(
        account.clone(),
        Arc::new(relay),
        Arc::new(backend),
        config.poll_settings(),
        Arc::new(ChannelPollSink::new(tx)),
    );

    let writer = AtomicFileWriter::new(config.output_dir.join(&account));
    let mut printed = 0;
    let mut results_error = None;
    let mut interrupted = false;
    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = &mut shutdown, if !interrupted => {
                relay_info!("interrupted; stopping watch of account {}", account);
                interrupted = true;
                handle.stop();
                continue;
            }
        };
        let Some(event) = event else { break };
        match event {
            PollEvent::State(state) => printed = render(&state, printed),
            PollEvent::Results(contracts) => {
                let path = writer.write_json(RESULTS_FILE, &contracts)?;
                println!("Saved {} contract(s) to {}", contracts.len(), path.display());
                for contract in &contracts {
                    for risk in contract.high_risks() {
                        println!(
                            "  high risk in {}: {}",
                            contract.agreement.agreement_name, risk.description
                        );
                    }
                }
            }
            PollEvent::ResultsFailed(err) => results_error = Some(err),
            PollEvent::Finished(status) => {
                if status == PollStatus::Stopped {
                    println!("Stopped.");
                }
            }
        }
    }

    let outcome = handle.wait().await.context("poller task panicked")?;
    if let Some(err) = results_error {
        return Err(err.into());
    }
    if let Some(reason) = outcome.last_error.filter(|_| outcome.results.is_none()) {
        relay_warn!("watch ended without results: {}", reason);
    }
    Ok(())
}

pub async fn chat(
    config: RelayConfig,
    message: String,
    token: Option<String>,
    clear: bool,
) -> Result<()> {
    let message = message.trim();
    if message.is_empty() && !clear {
        return Err(anyhow!("nothing to ask; pass a question or --clear"));
    }
    let backend = BackendClient::new(
        &config.backend_url,
        resolve_token(token)?,
        &ClientSettings::default(),
    )?;

    if clear {
        backend.clear_chat_history().await?;
        println!("Chat history cleared.");
    }
    if !message.is_empty() {
        let reply = backend.chat(message).await?;
        println!("{}", reply.response);
    }
    Ok(())
}

pub async fn download(
    config: RelayConfig,
    envelope: String,
    document: String,
    name: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let backend = BackendClient::new(
        &config.backend_url,
        resolve_token(token)?,
        &ClientSettings::default(),
    )?;

    let fallback = match name {
        Some(name) => name,
        None => backend
            .list_documents(&envelope)
            .await?
            .documents
            .into_iter()
            .find(|doc| doc.document_id == document)
            .map(|doc| doc.name)
            .unwrap_or_else(|| format!("{document}.pdf")),
    };

    let downloaded = backend
        .download_document(&envelope, &document, &fallback)
        .await?;
    let filename = deterministic_filename(&downloaded.file_name, &envelope, &document);
    let path = AtomicFileWriter::new(config.output_dir.clone())
        .write_bytes(&filename, &downloaded.bytes)?;
    relay_info!("downloaded {} bytes to {:?}", downloaded.bytes.len(), path);
    println!("{}", path.display());
    Ok(())
}

fn resolve_token(token: Option<String>) -> Result<String> {
    token
        .or_else(|| std::env::var("RELAY_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| anyhow!("a backend access token is required (--token or RELAY_TOKEN)"))
}

/// Prints lines not shown yet and the current headline; returns the new line count.
fn render(state: &ProcessingState, printed: usize) -> usize {
    let view = ProcessingView::from_state(state);
    for line in view.lines.iter().skip(printed) {
        println!("{} {}", line.timestamp, line.text);
    }
    println!("{} {:.0}%", view.headline, view.progress);
    view.lines.len()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
