//! Line-oriented front end over the dashboard.

use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ClientError, ClientResult};
use crate::forms::{error_notice, Dashboard, Form, Notice, Submitted, WageInput};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::INPUT_DATE_FORMAT;
use crate::mutation::MutationStatus;
use crate::records::lock;
use crate::session::{LoginInput, RegisterInput};
use crate::view::{self, Table};

pub const HELP: &str = "\
commands:
  login <username> <password>
  register <pin> <username> <password> <confirm> <full name>
  logout
  list | refresh
  preview <hours> <rate>
  add <date|today> <worker> <task> <hours> <rate>
  edit [id]                 show the edit table, or open a record
  update <date> <worker> <task> <hours> <rate>   (- keeps a field)
  delete                    delete the open record
  cancel                    close the open record
  workers | worker <name>
  tasks | task <name>
  add-worker <name>
  add-task <name>
  delete-task <id>
  status [mutation id]
  html <list|edit|tasks|workers|worker <name>|task <name>>
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Login(LoginArgs),
    Register(Vec<String>),
    Logout,
    List,
    Refresh,
    Preview { hours: String, rate: String },
    Add(Vec<String>),
    EditTable,
    Edit(u64),
    Update(Vec<String>),
    Delete,
    Cancel,
    Workers,
    Worker(String),
    Tasks,
    Task(String),
    AddWorker(String),
    AddTask(String),
    DeleteTask(u64),
    Status(Option<u64>),
    Html(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginArgs {
    pub username: String,
    pub password: String,
}

/// Splits on whitespace; double quotes group words.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut started = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    out.push(std::mem::take(&mut cur));
                    started = false;
                }
            }
            c => {
                cur.push(c);
                started = true;
            }
        }
    }
    if started {
        out.push(cur);
    }
    out
}

fn parse_id(arg: Option<&String>, usage: &str) -> Result<u64, String> {
    arg.and_then(|s| s.trim_start_matches('#').parse().ok())
        .ok_or_else(|| format!("usage: {}", usage))
}

fn rest(args: &[String]) -> String {
    args.join(" ")
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Quit => "quit",
            Command::Login(_) => "login",
            Command::Register(_) => "register",
            Command::Logout => "logout",
            Command::List => "list",
            Command::Refresh => "refresh",
            Command::Preview { .. } => "preview",
            Command::Add(_) => "add",
            Command::EditTable | Command::Edit(_) => "edit",
            Command::Update(_) => "update",
            Command::Delete => "delete",
            Command::Cancel => "cancel",
            Command::Workers => "workers",
            Command::Worker(_) => "worker",
            Command::Tasks => "tasks",
            Command::Task(_) => "task",
            Command::AddWorker(_) => "add-worker",
            Command::AddTask(_) => "add-task",
            Command::DeleteTask(_) => "delete-task",
            Command::Status(_) => "status",
            Command::Html(_) => "html",
        }
    }

    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let tokens = tokenize(line);
        let Some((head, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let cmd = match head.to_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "login" => match args {
                [u, p] => Command::Login(LoginArgs { username: u.clone(), password: p.clone() }),
                _ => return Err("usage: login <username> <password>".into()),
            },
            "register" => {
                if args.len() < 5 {
                    return Err("usage: register <pin> <username> <password> <confirm> <full name>".into());
                }
                Command::Register(args.to_vec())
            }
            "logout" => Command::Logout,
            "list" => Command::List,
            "refresh" => Command::Refresh,
            "preview" => match args {
                [h, r] => Command::Preview { hours: h.clone(), rate: r.clone() },
                _ => return Err("usage: preview <hours> <rate>".into()),
            },
            "add" => {
                if args.len() != 5 {
                    return Err("usage: add <date|today> <worker> <task> <hours> <rate>".into());
                }
                Command::Add(args.to_vec())
            }
            "edit" => match args.first() {
                None => Command::EditTable,
                Some(_) => Command::Edit(parse_id(args.first(), "edit [id]")?),
            },
            "update" => {
                if args.len() != 5 {
                    return Err("usage: update <date> <worker> <task> <hours> <rate>".into());
                }
                Command::Update(args.to_vec())
            }
            "delete" => Command::Delete,
            "cancel" => Command::Cancel,
            "workers" => Command::Workers,
            "worker" if args.is_empty() => return Err("usage: worker <name>".into()),
            "worker" => Command::Worker(rest(args)),
            "tasks" => Command::Tasks,
            "task" if args.is_empty() => return Err("usage: task <name>".into()),
            "task" => Command::Task(rest(args)),
            "add-worker" => Command::AddWorker(rest(args)),
            "add-task" => Command::AddTask(rest(args)),
            "delete-task" => Command::DeleteTask(parse_id(args.first(), "delete-task <id>")?),
            "status" => match args.first() {
                None => Command::Status(None),
                Some(_) => Command::Status(Some(parse_id(args.first(), "status [mutation id]")?)),
            },
            "html" if args.is_empty() => {
                return Err("usage: html <list|edit|tasks|workers|worker <name>|task <name>>".into())
            }
            "html" => Command::Html(args.to_vec()),
            other => return Err(format!("unknown command '{}', try help", other)),
        };
        Ok(Some(cmd))
    }
}

pub struct Shell {
    dash: Dashboard,
    /// Task ids and names from the last tasks listing.
    last_tasks: Vec<(u64, String)>,
}

impl Shell {
    pub fn new(dash: Dashboard) -> Self {
        Self { dash, last_tasks: Vec::new() }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dash
    }

    /// Reads commands until EOF or `quit`. Errors only on I/O failure.
    pub async fn run<R, W>(&mut self, mut input: R, mut out: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        emit(&mut out, "wagebook ready, type help for commands").await?;
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line).await? == 0 {
                break;
            }
            let cmd = match Command::parse(&line) {
                Ok(Some(cmd)) => cmd,
                Ok(None) => continue,
                Err(msg) => {
                    emit(&mut out, &msg).await?;
                    continue;
                }
            };
            if cmd == Command::Quit {
                break;
            }
            if cmd == Command::Delete && !self.confirm_delete(&mut input, &mut out).await? {
                emit(&mut out, "Delete cancelled").await?;
                continue;
            }
            let text = self.execute(cmd).await;
            emit(&mut out, &text).await?;
        }
        out.flush().await?;
        Ok(())
    }

    async fn confirm_delete<R, W>(&self, input: &mut R, out: &mut W) -> Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(form) = self.dash.editing() else {
            // Let execute report the missing record.
            return Ok(true);
        };
        emit(out, &format!("{} [y/N]", form.delete_prompt())).await?;
        let mut answer = String::new();
        input.read_line(&mut answer).await?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    /// Runs one command and returns what to print.
    pub async fn execute(&mut self, cmd: Command) -> String {
        log(Level::Trace, Domain::View, "command", obj(&[("command", v_str(cmd.name()))]));
        match cmd {
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
            Command::Login(args) => {
                let input = LoginInput { username: args.username, password: args.password };
                match self.dash.login(&input).await {
                    Ok(notice) => {
                        let table = match self.dash.refresh().await {
                            Ok(t) => t,
                            Err(_) => self.dash.workspace().table(),
                        };
                        format!("{}\n{}", notice, table.to_text())
                    }
                    Err(err) => error_notice(Form::Login, &err).to_string(),
                }
            }
            Command::Register(args) => {
                let input = RegisterInput {
                    pin: args[0].clone(),
                    username: args[1].clone(),
                    password: args[2].clone(),
                    confirm_password: args[3].clone(),
                    full_name: rest(&args[4..]),
                };
                notice_or(self.dash.register(&input).await, Form::Register)
            }
            Command::Logout => self.dash.logout().to_string(),
            Command::List => table_or(self.dash.table()),
            Command::Refresh => match self.dash.refresh().await {
                Ok(t) => t.to_text(),
                Err(err @ ClientError::NotLoggedIn) => error_notice(Form::Create, &err).to_string(),
                Err(_) => self.dash.workspace().table().to_text(),
            },
            Command::Preview { hours, rate } => {
                let mut draft = self.dash.draft();
                draft.hours = hours;
                draft.rate = rate;
                let total = draft.preview();
                self.dash.set_draft(draft);
                format!("Total: {}", total)
            }
            Command::Add(args) => {
                let date = if args[0].eq_ignore_ascii_case("today") {
                    self.dash.config().today().format(INPUT_DATE_FORMAT).to_string()
                } else {
                    args[0].clone()
                };
                let input = WageInput::new(&date, &args[1], &args[2], &args[3], &args[4]);
                submitted(self.dash.submit_wage(input).await, Form::Create)
            }
            Command::EditTable => table_or(self.dash.edit_table().await),
            Command::Edit(id) => match self.dash.open_edit(id) {
                Ok(form) => {
                    let i = &form.input;
                    format!(
                        "Editing #{}: {} | {} | {} | {} | {} (total {})",
                        form.record_id,
                        i.date,
                        i.worker_name,
                        i.task_description,
                        i.hours,
                        i.rate,
                        i.preview()
                    )
                }
                Err(err) => error_notice(Form::Update, &err).to_string(),
            },
            Command::Update(args) => {
                let current = self.dash.editing().map(|e| e.input).unwrap_or_default();
                let pick = |arg: &String, keep: &String| if arg == "-" { keep.clone() } else { arg.clone() };
                let input = WageInput {
                    date: pick(&args[0], &current.date),
                    worker_name: pick(&args[1], &current.worker_name),
                    task_description: pick(&args[2], &current.task_description),
                    hours: pick(&args[3], &current.hours),
                    rate: pick(&args[4], &current.rate),
                };
                submitted(self.dash.update_record(input).await, Form::Update)
            }
            Command::Delete => submitted(self.dash.delete_record().await, Form::Delete),
            Command::Cancel => {
                self.dash.cancel_edit();
                "Edit closed".to_string()
            }
            Command::Workers => match self.dash.reload_workers().await {
                Ok(names) if names.is_empty() => "No workers yet".to_string(),
                Ok(names) => names.join("\n"),
                Err(err) => error_notice(Form::AddWorker, &err).to_string(),
            },
            Command::Worker(name) => match self.dash.worker_detail(&name) {
                Ok(detail) => detail.to_text(),
                Err(err) => error_notice(Form::Create, &err).to_string(),
            },
            Command::Tasks => match self.dash.tasks_panel().await {
                Ok(list) => {
                    self.last_tasks = list.items.iter().map(|(id, name, _)| (*id, name.clone())).collect();
                    list.to_text()
                }
                Err(err) => error_notice(Form::AddTask, &err).to_string(),
            },
            Command::Task(name) => match self.dash.task_detail(&name) {
                Ok(detail) => detail.to_text(),
                Err(err) => error_notice(Form::AddTask, &err).to_string(),
            },
            Command::AddWorker(name) => submitted(self.dash.add_worker(&name).await, Form::AddWorker),
            Command::AddTask(name) => submitted(self.dash.add_task(&name).await, Form::AddTask),
            Command::DeleteTask(id) => {
                let Some(name) = self.last_tasks.iter().find(|(t, _)| *t == id).map(|(_, n)| n.clone()) else {
                    return format!("Task #{} is not in the last task listing, run tasks first", id);
                };
                let text = submitted(self.dash.delete_task(id, &name).await, Form::DeleteTask);
                self.last_tasks.retain(|(t, _)| *t != id);
                text
            }
            Command::Status(id) => self.status(id),
            Command::Html(args) => self.html(&args).await,
        }
    }

    fn status(&self, id: Option<u64>) -> String {
        let ledger = lock(&self.dash.workspace().ledger);
        let lines: Vec<String> = ledger
            .iter()
            .filter(|m| id.map_or(true, |want| m.id == want))
            .map(|m| match &m.status {
                MutationStatus::Failed(reason) => {
                    format!("#{} {} failed: {}", m.id, m.request.action(), reason)
                }
                s => format!("#{} {} {}", m.id, m.request.action(), s.as_str()),
            })
            .collect();
        if lines.is_empty() {
            "No writes yet".to_string()
        } else {
            lines.join("\n")
        }
    }

    async fn html(&self, args: &[String]) -> String {
        let what = args[0].as_str();
        let name = rest(&args[1..]);
        let rendered = match what {
            "list" => self.dash.table().map(|t| t.to_html()),
            "edit" => self.dash.edit_table().await.map(|t| t.to_html()),
            "tasks" => self.dash.tasks_panel().await.map(|l| l.to_html()),
            "workers" => self.dash.worker_select(),
            "worker" => self.dash.worker_detail(&name).map(|d| d.to_html()),
            "task" => self.dash.task_detail(&name).map(|d| d.to_html()),
            "suggestions" => {
                let workers = self.dash.workspace().worker_suggestions();
                let refs: Vec<&str> = workers.iter().map(String::as_str).collect();
                Ok(view::render_suggestions(&refs))
            }
            other => return format!("nothing to render for '{}'", other),
        };
        match rendered {
            Ok(html) => html,
            Err(err) => error_notice(Form::Create, &err).to_string(),
        }
    }
}

fn table_or(result: ClientResult<Table>) -> String {
    match result {
        Ok(t) => t.to_text(),
        Err(err) => error_notice(Form::Create, &err).to_string(),
    }
}

fn notice_or(result: ClientResult<Notice>, form: Form) -> String {
    match result {
        Ok(n) => n.to_string(),
        Err(err) => error_notice(form, &err).to_string(),
    }
}

/// Reports a submission. The scheduled refresh keeps running after the handle is dropped.
fn submitted(result: ClientResult<Submitted>, form: Form) -> String {
    match result {
        Ok(s) => {
            log(
                Level::Debug,
                Domain::View,
                "submitted",
                obj(&[("form", v_str(form.name())), ("mutation_id", json!(s.mutation_id))]),
            );
            format!("{} (write #{})", s.notice, s.mutation_id)
        }
        Err(err) => error_notice(form, &err).to_string(),
    }
}

async fn emit<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}
