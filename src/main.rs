use anyhow::{bail, Context, Result};
use icodewin::editor::HeadlessEditor;
use icodewin::error::NotificationLevel;
use icodewin::import::DroppedFile;
use icodewin::logging::{self, Logger};
use icodewin::options::{AppOptions, OptionOverrides};
use icodewin::preview::MemorySurface;
use icodewin::store::{FileStore, ProjectStore};
use icodewin::{Category, Command, Controller, Effect, IcodeError, TabKey};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

const USAGE: &str = "usage: icodewin [--data-dir DIR] [--debug-log FILE] <command>

commands:
  list                                   list projects
  new <name>                             create a project
  delete <id>                            delete a project
  files <id>                             list the files of a project
  preview <id> [--out FILE]              print the composed preview document
  import <id> <FILE>... [--overwrite]    import .html/.css/.js files
  rename <id> <html|css|js> <old> <new>  rename a file
  remove <id> <html|css|js> <name>       delete a file
  export <id> [--out FILE]               build the project remotely and save the artifact";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse_args(&args)?;

    let options = AppOptions::from_env().merged_with(&invocation.overrides);
    install_logger(&options);

    if matches!(invocation.command, CliCommand::Help) {
        println!("{}", USAGE);
        return Ok(());
    }

    let data_dir = options
        .resolve_data_dir()
        .context("could not determine a data directory; pass --data-dir")?;
    let store = ProjectStore::load(Box::new(FileStore::new(data_dir)))?;
    let mut controller = Controller::new(
        store,
        Box::new(HeadlessEditor::new()),
        Box::new(MemorySurface::new()),
        options.clone(),
    );

    run(&mut controller, &invocation, &options)?;
    report(controller.dispatch(Command::BackToDashboard)?);
    Ok(())
}

fn install_logger(options: &AppOptions) {
    let logger = match &options.debug_log_path {
        Some(path) => Logger::for_development().with_file_output(path),
        None => Logger::new(LevelFilter::Warn),
    };
    logging::init(logger);
}

fn run(controller: &mut Controller, invocation: &Invocation, options: &AppOptions) -> Result<()> {
    match &invocation.command {
        CliCommand::Help => {}
        CliCommand::List => {
            for project in controller.projects() {
                println!(
                    "{}\t{}\t{} files",
                    project.id,
                    project.name,
                    project.files.flatten().len()
                );
            }
        }
        CliCommand::New(name) => {
            report(controller.dispatch(Command::CreateProject { name: name.clone() })?);
            if let Some(project) = controller.current_project() {
                println!("{}", project.id);
            }
        }
        CliCommand::Delete(id) => {
            require_project(controller, id)?;
            report(controller.dispatch(Command::DeleteProject { id: id.clone() })?);
        }
        CliCommand::Files(id) => {
            open_project(controller, id)?;
            if let Some(project) = controller.current_project() {
                for name in project.files.flatten().keys() {
                    println!("{}", name);
                }
            }
        }
        CliCommand::Preview(id) => {
            open_project(controller, id)?;
            match controller.preview_document() {
                Some(document) => write_output(invocation.out.as_ref(), document.as_bytes())?,
                None => eprintln!("project has no html file to preview"),
            }
        }
        CliCommand::Import { id, paths } => {
            open_project(controller, id)?;
            for path in paths {
                import_one(controller, path, invocation.overwrite)?;
            }
        }
        CliCommand::Rename {
            id,
            category,
            old_name,
            new_name,
        } => {
            open_project(controller, id)?;
            report(controller.dispatch(Command::RenameFile {
                category: *category,
                old_name: old_name.clone(),
                new_name: new_name.clone(),
            })?);
        }
        CliCommand::Remove { id, category, name } => {
            open_project(controller, id)?;
            let key = TabKey::new(*category, name.clone());
            if controller
                .current_project()
                .is_some_and(|project| !project.has_file(*category, name))
            {
                bail!("no such file: {}", key);
            }
            report(controller.dispatch(Command::DeleteFile(key))?);
        }
        CliCommand::Export(id) => {
            open_project(controller, id)?;
            report(controller.dispatch(Command::Export)?);
            let effects =
                controller.wait_for_export(options.export_timeout + Duration::from_secs(5));
            if effects.is_empty() {
                bail!("export did not finish in time");
            }
            for effect in effects {
                match effect {
                    Effect::Download { filename, bytes } => {
                        let target = invocation.out.clone().unwrap_or_else(|| PathBuf::from(&filename));
                        write_output(Some(&target), &bytes)?;
                        println!("saved {}", target.display());
                    }
                    other => report(vec![other]),
                }
            }
        }
    }
    Ok(())
}

fn import_one(controller: &mut Controller, path: &PathBuf, overwrite: bool) -> Result<()> {
    let dropped = DroppedFile::read(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let command = Command::ImportFile {
        filename: dropped.filename.clone(),
        content: dropped.content,
        overwrite,
    };
    match controller.dispatch(command) {
        Ok(effects) => {
            report(effects);
            println!("imported {}", dropped.filename);
        }
        Err(IcodeError::Conflict { filename, .. }) => {
            eprintln!("{} already exists; rerun with --overwrite to replace it", filename);
        }
        Err(error @ IcodeError::UnsupportedType { .. }) => eprintln!("{}", error),
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

fn require_project(controller: &Controller, id: &str) -> Result<()> {
    if !controller.projects().iter().any(|project| project.id == id) {
        bail!("no such project: {}", id);
    }
    Ok(())
}

fn open_project(controller: &mut Controller, id: &str) -> Result<()> {
    require_project(controller, id)?;
    report(controller.dispatch(Command::OpenProject { id: id.to_string() })?);
    Ok(())
}

fn write_output(target: Option<&PathBuf>, bytes: &[u8]) -> Result<()> {
    match target {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("could not write {}", path.display()))
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
            Ok(())
        }
    }
}

/// 通知だけを表示する
fn report(effects: Vec<Effect>) {
    for effect in effects {
        if let Effect::Notify(notification) = effect {
            match notification.level {
                NotificationLevel::Info => eprintln!("{}", notification.message),
                _ => eprintln!("warning: {}", notification.message),
            }
        }
    }
}

enum CliCommand {
    Help,
    List,
    New(String),
    Delete(String),
    Files(String),
    Preview(String),
    Import { id: String, paths: Vec<PathBuf> },
    Rename {
        id: String,
        category: Category,
        old_name: String,
        new_name: String,
    },
    Remove {
        id: String,
        category: Category,
        name: String,
    },
    Export(String),
}

struct Invocation {
    overrides: OptionOverrides,
    command: CliCommand,
    out: Option<PathBuf>,
    overwrite: bool,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut overrides = OptionOverrides::default();
    let mut out = None;
    let mut overwrite = false;
    let mut positional: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--data-dir" => {
                let value = iter.next().context("--data-dir needs a directory")?;
                overrides.data_dir = Some(PathBuf::from(value));
            }
            "--debug-log" => {
                let value = iter.next().context("--debug-log needs a file")?;
                overrides.debug_log_path = Some(PathBuf::from(value));
            }
            "--out" | "-o" => {
                let value = iter.next().context("--out needs a file")?;
                out = Some(PathBuf::from(value));
            }
            "--overwrite" => overwrite = true,
            "--help" | "-h" => positional = vec!["help".to_string()],
            _ => positional.push(arg.clone()),
        }
    }

    let command = match positional.as_slice() {
        [] => CliCommand::Help,
        [cmd] if cmd == "help" => CliCommand::Help,
        [cmd] if cmd == "list" => CliCommand::List,
        [cmd, name] if cmd == "new" => CliCommand::New(name.clone()),
        [cmd, id] if cmd == "delete" => CliCommand::Delete(id.clone()),
        [cmd, id] if cmd == "files" => CliCommand::Files(id.clone()),
        [cmd, id] if cmd == "preview" => CliCommand::Preview(id.clone()),
        [cmd, id, paths @ ..] if cmd == "import" && !paths.is_empty() => CliCommand::Import {
            id: id.clone(),
            paths: paths.iter().map(PathBuf::from).collect(),
        },
        [cmd, id, category, old_name, new_name] if cmd == "rename" => CliCommand::Rename {
            id: id.clone(),
            category: parse_category(category)?,
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        },
        [cmd, id, category, name] if cmd == "remove" => CliCommand::Remove {
            id: id.clone(),
            category: parse_category(category)?,
            name: name.clone(),
        },
        [cmd, id] if cmd == "export" => CliCommand::Export(id.clone()),
        _ => bail!("unrecognized arguments: {}\n\n{}", positional.join(" "), USAGE),
    };

    Ok(Invocation {
        overrides,
        command,
        out,
        overwrite,
    })
}

fn parse_category(raw: &str) -> Result<Category> {
    Category::from_dir_name(raw).with_context(|| format!("unknown category {} (expected html, css or js)", raw))
}
