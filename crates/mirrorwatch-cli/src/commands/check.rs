use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use futures::future::join_all;
use serde_json::json;
use watched_sync_config::Config;
use watched_sync_servers::create_servers;

/// Ping every enabled server with its configured credentials
pub async fn run_check(config: &Config, output: &Output) -> Result<()> {
    let servers = create_servers(config).map_err(|e| eyre!("Failed to create servers: {}", e))?;
    let results = join_all(servers.iter().map(|server| server.ping())).await;

    let mut failed = 0;
    let mut report = Vec::new();
    for (server, result) in servers.iter().zip(results) {
        match result {
            Ok(()) => {
                if output.is_human() {
                    output.success(format!("{} is reachable", server.instance_id()));
                }
                report.push(json!({ "server": server.instance_id(), "ok": true }));
            }
            Err(e) => {
                failed += 1;
                if output.is_human() {
                    output.error(format!("{}: {}", server.instance_id(), e));
                }
                report.push(json!({ "server": server.instance_id(), "ok": false, "error": e.to_string() }));
            }
        }
    }

    if !output.is_human() {
        output.json(&json!({ "servers": report }));
    }

    if failed > 0 {
        return Err(eyre!("{} of {} servers unreachable", failed, servers.len()));
    }
    Ok(())
}
