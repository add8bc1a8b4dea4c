use chrono::Local;
use fogbender_roster::rows::{is_section_visible, section_title, section_unread_total};
use fogbender_roster::transport::WebSocketTransportFactory;
use fogbender_roster::{Client, ClientConfig, Roster, SessionContext, ViewOptions};
use log::{error, info, warn};
use std::sync::Arc;

// Opens the main roster view of a workspace (or helpdesk) and logs a section summary
// whenever the roster changes.
//
// Usage:
//   cargo run -- --session FOG_SESSION --workspace WORKSPACE_ID
//   cargo run -- -s FOG_SESSION -h HELPDESK_ID --focused
//
// The server URL and timings come from the FOGBENDER_* environment variables.

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let session_id = parse_arg(&args, "--session", "-s");
    let workspace_id = parse_arg(&args, "--workspace", "-w");
    let helpdesk_id = parse_arg(&args, "--helpdesk", "-h");
    let focused = args.iter().any(|a| a == "--focused");

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return;
        }
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(async {
        let factory = Arc::new(WebSocketTransportFactory::new(config.ws_url.clone()));
        let client = Client::new(factory, config);
        client.set_session(SessionContext {
            fog_session_id: session_id,
            workspace_id,
            helpdesk_id,
            user_id: None,
        });

        if let Err(e) = client.connect().await {
            error!("Failed to connect: {e}");
            return;
        }

        let roster = Roster::new(&client);
        let handle = match roster.views().open(&ViewOptions::roster(focused)).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!("No roster topic: pass --session and --workspace or --helpdesk");
                client.disconnect().await;
                return;
            }
            Err(e) => {
                error!("Failed to open the roster view: {e}");
                client.disconnect().await;
                return;
            }
        };
        info!("Opened view {} on {}", handle.view(), handle.topic());

        let view = handle.view().to_string();
        let is_agent = client.session_snapshot().workspace_id.is_some();
        let mut changes = roster.subscribe();
        loop {
            log_summary(&roster, &view, is_agent);
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, closing the view");
                    break;
                }
            }
        }

        if let Err(e) = handle.close().await {
            warn!("Closing the view failed: {e}");
        }
        client.disconnect().await;
    });
}

fn log_summary(roster: &Roster, view: &str, is_agent: bool) {
    let snapshot = roster.snapshot();
    let Some(sections) = snapshot.view(view) else {
        return;
    };
    for section in sections.iter().filter(|s| is_section_visible(s)) {
        let unread = section_unread_total(section)
            .map(|n| format!(", {n} unread"))
            .unwrap_or_default();
        info!(
            "{}: {} of {} loaded{unread}",
            section_title(section, is_agent),
            section.materialized_len(),
            section.count()
        );
        // Page in what a client showing the first screen would need.
        roster
            .loader()
            .on_viewport(view, section.id(), Some(section.materialized_len().min(10)));
    }
}

fn parse_arg(args: &[String], long: &str, short: &str) -> Option<String> {
    let long_prefix = format!("{long}=");
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == long || arg == short {
            return iter.next().filter(|v| !v.starts_with('-')).cloned();
        }
        if let Some(value) = arg.strip_prefix(&long_prefix) {
            return Some(value.to_string());
        }
    }
    None
}
