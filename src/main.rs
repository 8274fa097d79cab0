use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use tokio::io::{stdin, stdout, BufReader};

use wagebook::config::Config;
use wagebook::forms::Dashboard;
use wagebook::logging::{json_log, obj, v_str};
use wagebook::names::{TaskNames, WorkerNames};
use wagebook::records::Workspace;
use wagebook::remote::{MemoryRemote, RemoteStore, ScriptEndpoint, WriteChannel};
use wagebook::shell::Shell;
use wagebook::storage::LocalStorage;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let (remote, writes): (Arc<dyn RemoteStore>, Arc<dyn WriteChannel>) = match (&cfg.script_url, cfg.memory_store) {
        (Some(_), _) => {
            let endpoint = Arc::new(ScriptEndpoint::new(&cfg)?);
            json_log("remote", obj(&[("type", v_str("script")), ("status", v_str("live"))]));
            (endpoint.clone(), endpoint)
        }
        (None, true) => {
            json_log("remote", obj(&[("type", v_str("memory")), ("status", v_str("local"))]));
            let memory = Arc::new(MemoryRemote::default());
            (memory.clone(), memory)
        }
        (None, false) => bail!("SCRIPT_URL is not set; export it, or set WAGEBOOK_MEMORY_STORE=1 for a throwaway in-memory store"),
    };

    let mut storage = LocalStorage::new(&cfg.sqlite_path)?;
    storage.init()?;
    let mut workers = WorkerNames::load(storage)?;
    let merged_workers = workers.load_and_merge(remote.as_ref()).await?;
    let mut tasks = TaskNames::default();
    let merged_tasks = tasks.load_and_merge(remote.as_ref()).await;
    json_log(
        "startup",
        obj(&[
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("workers", json!(workers.len())),
            ("workers_from_remote", json!(merged_workers)),
            ("tasks", json!(merged_tasks)),
        ]),
    );

    let ws = Workspace::new(remote, workers, tasks, cfg.display_offset());
    let mut shell = Shell::new(Dashboard::new(cfg, ws, writes));
    shell.run(BufReader::new(stdin()), stdout()).await?;

    json_log("shutdown", obj(&[("status", v_str("ok"))]));
    Ok(())
}
