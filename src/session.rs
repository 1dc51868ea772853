use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::models::AggregationPolicy;
use crate::report;
use crate::slip::{AssessmentField, ModuleRef, Slip};
use crate::store::LocalStore;
use crate::sync::{SyncHandle, SyncStatus};

/// Edits shared by the one-shot CLI and the interactive session.
/// `MODULE` is a 1-based position, a module id, or a module name
/// (`name:2024` for a name that is all digits).
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Add an empty module
    AddModule {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        target: Option<String>,
    },
    /// Rename a module
    Rename { module: String, name: String },
    /// Set a module's target percentage (anything non-numeric clears it)
    Target { module: String, value: String },
    /// Append an assessment to a module
    AddTest {
        module: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        weight: Option<String>,
        #[arg(long)]
        score: Option<String>,
    },
    /// Change one field of an assessment
    EditTest {
        module: String,
        test: usize,
        #[arg(value_enum)]
        field: AssessmentField,
        value: String,
    },
    /// Remove an assessment (a module keeps at least one)
    RemoveTest { module: String, test: usize },
    /// Delete a module permanently
    RemoveModule { module: String },
    /// Delete every module
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

pub fn apply(slip: &mut Slip, command: EditCommand) -> anyhow::Result<String> {
    match command {
        EditCommand::AddModule { name, target } => {
            let position = slip.len() + 1;
            let module = slip.add_module();
            if let Some(name) = name.as_deref() {
                module.rename(name);
            }
            if let Some(target) = target.as_deref() {
                module.set_target(target);
            }
            Ok(format!("Added module #{position} ({}).", module.id))
        }
        EditCommand::Rename { module, name } => {
            let module = slip.module_mut(&ModuleRef::parse(&module))?;
            module.rename(&name);
            Ok(format!("Renamed module to {}.", module.display_name()))
        }
        EditCommand::Target { module, value } => {
            let module = slip.module_mut(&ModuleRef::parse(&module))?;
            match module.set_target(&value) {
                Some(target) => Ok(format!("Target for {} set to {target}%.", module.display_name())),
                None => Ok(format!("Target for {} cleared.", module.display_name())),
            }
        }
        EditCommand::AddTest {
            module,
            name,
            weight,
            score,
        } => {
            let module = slip.module_mut(&ModuleRef::parse(&module))?;
            let position =
                module.add_assessment(name.as_deref(), weight.as_deref(), score.as_deref());
            Ok(format!(
                "Added assessment {position} to {}.",
                module.display_name()
            ))
        }
        EditCommand::EditTest {
            module,
            test,
            field,
            value,
        } => {
            let module = slip.module_mut(&ModuleRef::parse(&module))?;
            module.update_assessment(test, field, &value)?;
            Ok(format!(
                "Updated assessment {test} of {}.",
                module.display_name()
            ))
        }
        EditCommand::RemoveTest { module, test } => {
            let module = slip.module_mut(&ModuleRef::parse(&module))?;
            let removed = module.remove_assessment(test)?;
            Ok(format!(
                "Removed {} from {}.",
                removed.name,
                module.display_name()
            ))
        }
        EditCommand::RemoveModule { module } => {
            let removed = slip.remove_module(&ModuleRef::parse(&module))?;
            Ok(format!("Deleted {}.", removed.display_name()))
        }
        EditCommand::Clear { yes } => {
            if !yes {
                anyhow::bail!("clearing deletes every module; pass --yes to confirm");
            }
            let removed = slip.clear();
            Ok(format!("Deleted {removed} modules."))
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "session", no_binary_name = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    #[command(flatten)]
    Edit(EditCommand),
    /// Show the slip
    List,
    /// Show the remote sync status
    Status,
    /// Write pending changes to the remote now
    Sync,
    /// Push pending changes and leave
    Quit,
}

pub async fn run(
    store: &LocalStore,
    slip: Slip,
    policy: AggregationPolicy,
    sync: Option<SyncHandle>,
) -> anyhow::Result<()> {
    run_lines(BufReader::new(tokio::io::stdin()), store, slip, policy, sync).await
}

/// Reads edit commands until EOF, `quit`, or unreadable input. Every edit is
/// saved locally at once and, with a remote configured, scheduled for sync.
async fn run_lines<R: AsyncBufRead + Unpin>(
    input: R,
    store: &LocalStore,
    mut slip: Slip,
    policy: AggregationPolicy,
    sync: Option<SyncHandle>,
) -> anyhow::Result<()> {
    if let Some(sync) = &sync {
        report_sync_changes(sync);
    }

    print!("{}", report::render_slip(&slip, policy));
    println!("Type `help` for commands, `quit` to leave.");

    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("Stopped reading input: {err}");
                break;
            }
        };
        let words = split_line(&line);
        if words.is_empty() {
            continue;
        }

        let parsed = match SessionLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match parsed.command {
            SessionCommand::Quit => break,
            SessionCommand::List => print!("{}", report::render_slip(&slip, policy)),
            SessionCommand::Status => match &sync {
                Some(sync) => println!("Remote: {}", sync.status()),
                None => println!("Remote: not configured (set DATABASE_URL)"),
            },
            SessionCommand::Sync => match &sync {
                Some(sync) => {
                    sync.flush().await;
                    println!("Remote: {}", sync.status());
                }
                None => println!("Remote: not configured (set DATABASE_URL)"),
            },
            SessionCommand::Edit(command) => match apply(&mut slip, command) {
                Ok(message) => {
                    println!("{message}");
                    if let Err(err) = store.save(slip.modules()) {
                        eprintln!("Local save failed: {err:#}");
                    }
                    if let Some(sync) = &sync {
                        sync.schedule(slip.modules().to_vec());
                    }
                }
                Err(err) => eprintln!("Error: {err:#}"),
            },
        }
    }

    if let Some(sync) = sync {
        let status = sync.shutdown().await?;
        if let SyncStatus::Failed(_) = status {
            eprintln!("Remote: {status}. Local data is saved; run `push` to retry.");
        }
    }

    Ok(())
}

fn report_sync_changes(sync: &SyncHandle) {
    let mut status = sync.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            match current {
                SyncStatus::Synced | SyncStatus::Failed(_) => eprintln!("[{current}]"),
                _ => {}
            }
        }
    });
}

fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Module;
    use crate::sync::SlipWriter;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct CapturingWriter {
        writes: Arc<Mutex<Vec<Vec<Module>>>>,
    }

    impl SlipWriter for CapturingWriter {
        async fn write(&self, modules: Vec<Module>) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push(modules);
            Ok(())
        }
    }

    fn parse(line: &str) -> Result<SessionCommand, clap::Error> {
        SessionLine::try_parse_from(split_line(line)).map(|parsed| parsed.command)
    }

    #[test]
    fn split_line_honours_quotes() {
        assert_eq!(
            split_line(r#"rename 1 "Organic Chemistry""#),
            vec!["rename", "1", "Organic Chemistry"]
        );
        assert_eq!(split_line("  list  "), vec!["list"]);
        assert_eq!(split_line(r#"target 2 """#), vec!["target", "2", ""]);
        assert!(split_line("   ").is_empty());
    }

    #[test]
    fn session_lines_parse_into_edits() {
        assert_eq!(
            parse("edit-test 1 2 score 68").unwrap_or(SessionCommand::Quit).edit(),
            Some(EditCommand::EditTest {
                module: "1".to_string(),
                test: 2,
                field: AssessmentField::Score,
                value: "68".to_string(),
            })
        );
        assert!(matches!(parse("list"), Ok(SessionCommand::List)));
        assert!(matches!(parse("quit"), Ok(SessionCommand::Quit)));
        assert!(parse("edit-test 1 two score 68").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn apply_walks_a_module_through_its_life() {
        let mut slip = Slip::default();
        apply(
            &mut slip,
            EditCommand::AddModule {
                name: Some("Mathematics".to_string()),
                target: Some("70".to_string()),
            },
        )
        .unwrap();
        apply(
            &mut slip,
            EditCommand::EditTest {
                module: "Mathematics".to_string(),
                test: 1,
                field: AssessmentField::Weight,
                value: "50".to_string(),
            },
        )
        .unwrap();
        apply(
            &mut slip,
            EditCommand::EditTest {
                module: "1".to_string(),
                test: 1,
                field: AssessmentField::Score,
                value: "80".to_string(),
            },
        )
        .unwrap();
        apply(
            &mut slip,
            EditCommand::AddTest {
                module: "1".to_string(),
                name: None,
                weight: Some("50".to_string()),
                score: Some("60".to_string()),
            },
        )
        .unwrap();

        let summary = slip.summary(AggregationPolicy::Weighted);
        assert_eq!(summary[0].1.aggregate_score, 70.0);
        assert_eq!(summary[0].1.status, crate::models::Status::OnTrack);

        let message = apply(
            &mut slip,
            EditCommand::RemoveModule {
                module: "mathematics".to_string(),
            },
        )
        .unwrap();
        assert_eq!(message, "Deleted Mathematics.");
        assert!(slip.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_input_still_delivers_pending_sync() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "session");
        let writer = CapturingWriter::default();
        let sync = SyncHandle::spawn(writer.clone(), Duration::from_secs(2));
        let input: &[u8] = b"add-module --name Maths\n\xFF\xFE\nadd-module --name Never\n";

        run_lines(
            BufReader::new(input),
            &store,
            Slip::default(),
            AggregationPolicy::Weighted,
            Some(sync),
        )
        .await
        .unwrap();

        let writes = writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 1);
        assert_eq!(writes[0][0].name, "Maths");
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_flushes_edits_made_inside_the_window() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "session");
        let writer = CapturingWriter::default();
        let sync = SyncHandle::spawn(writer.clone(), Duration::from_secs(2));
        let input: &[u8] = b"add-module --name Art\ntarget 1 60\nquit\nadd-module\n";

        run_lines(
            BufReader::new(input),
            &store,
            Slip::default(),
            AggregationPolicy::Weighted,
            Some(sync),
        )
        .await
        .unwrap();

        let writes = writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][0].target, Some(60.0));
    }

    #[test]
    fn clear_requires_confirmation() {
        let mut slip = Slip::starter();
        assert!(apply(&mut slip, EditCommand::Clear { yes: false }).is_err());
        assert_eq!(slip.len(), 1);
        assert_eq!(
            apply(&mut slip, EditCommand::Clear { yes: true }).unwrap(),
            "Deleted 1 modules."
        );
    }

    #[test]
    fn clearing_a_target_is_reported() {
        let mut slip = Slip::starter();
        let message = apply(
            &mut slip,
            EditCommand::Target {
                module: "1".to_string(),
                value: "none".to_string(),
            },
        )
        .unwrap();
        assert_eq!(message, "Target for (unnamed module) cleared.");
    }

    #[test]
    fn unknown_module_is_an_error() {
        let mut slip = Slip::starter();
        assert!(apply(
            &mut slip,
            EditCommand::RemoveTest {
                module: "7".to_string(),
                test: 1
            }
        )
        .is_err());
    }

    impl SessionCommand {
        fn edit(self) -> Option<EditCommand> {
            match self {
                SessionCommand::Edit(command) => Some(command),
                _ => None,
            }
        }
    }
}
