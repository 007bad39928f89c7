use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use taskorg::config::{self, Config};
use taskorg::lock::InstanceLock;
use taskorg::{Completion, NewTask, Store, Task, TaskId, TaskStatus, TaskSummary, tui};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskorg")]
#[command(about = "Task organizer - a task list kept in a local SQLite file")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the task database file
    #[arg(long, env = "TASKORG_DB")]
    db: Option<PathBuf>,

    /// Path to the config file (default: <config dir>/taskorg/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Without a subcommand the interactive task list opens
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Deadline as YYYY-MM-DD
        #[arg(long)]
        deadline: Option<NaiveDate>,
    },

    /// List all tasks
    List {
        /// Print the tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one task with its description
    Show { id: TaskId },

    /// Mark a task completed
    Done { id: TaskId },

    /// Mark a task as still working
    Undo { id: TaskId },

    /// Change a task's title
    Rename { id: TaskId, title: String },

    /// Delete a task permanently
    Delete { id: TaskId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = config.database_path(cli.db.as_deref())?;

    // The terminal UI owns the screen, so its log goes to a file
    let log_file = cli.command.is_none().then(|| config::log_path(&db_path));
    init_logging(&config, log_file.as_deref())?;

    let open_context = || format!("Failed to open task database at {}", db_path.display());
    let _lock = InstanceLock::acquire(&db_path).wrap_err_with(open_context)?;
    let mut store = Store::open(&db_path).wrap_err_with(open_context)?;

    match cli.command {
        None => {
            let clock = config.clock()?;
            tui::run(&mut store, &clock, config.tick_interval())?;
        }
        Some(command) => run_command(&mut store, command)?,
    }

    info!("Exiting");
    Ok(())
}

fn init_logging(config: &Config, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn run_command(store: &mut Store, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            title,
            description,
            deadline,
        } => {
            let task = store.create(NewTask {
                title: title.trim().to_string(),
                description: description.filter(|d| !d.trim().is_empty()),
                deadline,
            })?;
            println!("Added task {}: {}", task.id, task.title);
        }
        Commands::List { json } => {
            let tasks = store.list_tasks()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                for task in &tasks {
                    print_row(task);
                }
                let summaries: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
                println!("{}", Completion::of(&summaries).to_string().bold());
            }
        }
        Commands::Show { id } => {
            let task = store.get(id)?;
            println!("Task: {}", task.title);
            println!("Status: {}", task.status);
            if let Some(deadline) = task.deadline {
                println!("Deadline: {}", deadline);
            }
            println!();
            println!("Description: {}", task.description.as_deref().unwrap_or("(none)"));
        }
        Commands::Done { id } => set_status(store, id, TaskStatus::Completed)?,
        Commands::Undo { id } => set_status(store, id, TaskStatus::StillWorking)?,
        Commands::Rename { id, title } => {
            let title = title.trim();
            if title.is_empty() {
                return Err(eyre!("Task title cannot be empty"));
            }
            store.rename(id, title)?;
            println!("Renamed task {} to {}", id, title);
        }
        Commands::Delete { id } => {
            store.delete(id)?;
            println!("Deleted task {}", id);
        }
    }

    Ok(())
}

fn set_status(store: &mut Store, id: TaskId, status: TaskStatus) -> Result<()> {
    store.set_status(id, status)?;
    println!("Marked task {} as {}", id, status);
    Ok(())
}

fn print_row(task: &Task) {
    let marker = if task.status.is_completed() { "[x]" } else { "[ ]" };
    let line = format!("{:>4}  {} {}", task.id.0, marker, task.title);
    let line = match task.status {
        TaskStatus::Completed => line.green(),
        TaskStatus::StillWorking => line.yellow(),
    };

    match task.deadline {
        Some(deadline) => println!("{}  {}", line, format!("(due {})", deadline).dimmed()),
        None => println!("{}", line),
    }
}
