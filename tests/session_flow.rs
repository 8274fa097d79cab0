//! Shell sessions driven from scripted input.

use std::sync::Arc;

use wagebook::config::Config;
use wagebook::forms::Dashboard;
use wagebook::model::NewWage;
use wagebook::names::{TaskNames, WorkerNames};
use wagebook::records::Workspace;
use wagebook::remote::MemoryRemote;
use wagebook::shell::Shell;
use wagebook::storage::LocalStorage;

fn shell(remote: Arc<MemoryRemote>) -> Shell {
    let cfg = Config::immediate();
    let mut storage = LocalStorage::in_memory().unwrap();
    storage.init().unwrap();
    let ws = Workspace::new(
        remote.clone(),
        WorkerNames::load(storage).unwrap(),
        TaskNames::default(),
        cfg.display_offset(),
    );
    Shell::new(Dashboard::new(cfg, ws, remote))
}

async fn run_script(shell: &mut Shell, script: &str) -> String {
    let mut out = Vec::new();
    shell.run(script.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_register_login_add_and_logout() {
    let remote = Arc::new(MemoryRemote::default());
    let mut sh = shell(remote.clone());
    let script = "\
add 2024-01-10 Asha Weeding 8 50
register 0000 as secret1 secret1 Asha K
register 0000 asha secret1 secret1 Asha K
login asha secret1
preview 8 50
add 2024-01-10 Asha Weeding 8 50
refresh
status
logout
list
quit
add 2024-01-11 Ravi Harvest 4 60
";
    let out = run_script(&mut sh, script).await;

    assert_eq!(out.matches("✗ Please login first").count(), 2, "{}", out);
    assert!(out.contains("✗ Username must be at least 3 characters"), "{}", out);
    assert!(out.contains("✓ Registration successful! Please login."), "{}", out);
    assert!(out.contains("✓ Welcome, Asha K!"), "{}", out);
    assert!(out.contains("Total: ₹400.00"), "{}", out);
    assert!(out.contains("✓ Wage entry submitted successfully!"), "{}", out);
    assert!(out.contains("10/01/2024 | Asha | Weeding | 8 | ₹50.00 | ₹400.00"), "{}", out);
    assert!(out.contains("#1 create confirmed"), "{}", out);
    assert!(sh.dashboard().require_login().is_err());

    // Nothing after quit runs.
    assert_eq!(remote.record_count(), 1);
}

#[tokio::test]
async fn test_login_refused_by_store() {
    let remote = Arc::new(MemoryRemote::default());
    remote.seed_account("asha", "secret1", "Asha K");
    let mut sh = shell(remote);
    let out = run_script(&mut sh, "login asha wrong\nlogin asha\n").await;
    assert!(out.contains("✗ Invalid username or password"), "{}", out);
    assert!(out.contains("usage: login <username> <password>"), "{}", out);
    assert!(sh.dashboard().user().is_none());
}

#[tokio::test]
async fn test_delete_asks_for_confirmation() {
    let remote = Arc::new(MemoryRemote::default());
    remote.seed_account("asha", "secret1", "Asha K");
    let id = remote.seed_record(&NewWage::new("2024-01-10", "Asha", "Weeding", 8.0, 50.0));
    let mut sh = shell(remote.clone());
    let script = format!(
        "login asha secret1\nedit {id}\ndelete\nn\nedit {id}\ndelete\ny\n",
        id = id
    );
    let out = run_script(&mut sh, &script).await;

    assert!(
        out.contains("Are you sure you want to delete this record for Asha? This action cannot be undone. [y/N]"),
        "{}",
        out
    );
    assert!(out.contains("Delete cancelled"), "{}", out);
    assert!(out.contains("✓ Record deleted successfully!"), "{}", out);
    assert_eq!(remote.record_count(), 0);
}

#[tokio::test]
async fn test_task_panel_and_memory_only_delete() {
    let remote = Arc::new(MemoryRemote::default());
    remote.seed_account("asha", "secret1", "Asha K");
    let task_id = remote.seed_task("Weeding");
    let mut sh = shell(remote.clone());
    let script = format!(
        "login asha secret1\ndelete-task {id}\ntasks\nadd-task Weeding\nadd-task Weeding\ndelete-task {id}\nadd-task Weeding\n",
        id = task_id
    );
    let out = run_script(&mut sh, &script).await;

    assert!(out.contains("run tasks first"), "{}", out);
    assert!(out.contains(&format!("#{} | Weeding | Used 0 times", task_id)), "{}", out);
    assert!(out.contains("✓ Task deleted successfully!"), "{}", out);
    assert!(out.contains("✗ Task already exists"), "{}", out);
    // The cached name was dropped, so adding it again is allowed.
    assert_eq!(out.matches("✓ Task \"Weeding\" added successfully!").count(), 2, "{}", out);
}
