//! Command-line front end for the Steinplan record store.
//!
//! # Responsibility
//! - Map shell commands onto core store, import and export operations.
//! - Keep output line-oriented and stable for scripting.
//!
//! # Invariants
//! - Exit code is 0 on success, 1 on operation failure, 2 on usage errors.
//! - Record contents go to stdout only; logs hold ids and counts.

use chrono::Utc;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use steinplan_core::db::open_db;
use steinplan_core::{
    core_version, import_file, init_logging, write_export_today, CoreConfig, DeleteOutcome,
    FlushStatus, ImportOutcome, LoadStatus, PayloadReader, Record, RecordStore, SqliteBlobStore,
};

const DEFAULT_DATA_DIR: &str = ".steinplan";
const USAGE: &str = "usage: steinplan [--data-dir DIR] <command>

commands:
  list [FILTER]   list records, optionally filtered by format name
  show ID         print every field of one record
  delete ID       remove one record
  import FILE     merge records from a JSON export file
  export [DIR]    write all records to a dated JSON file (default: .)
  new NAME        create a blank record dated today
  version         print the core version";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List { filter: String },
    Show { id: String },
    Delete { id: String },
    Import { file: PathBuf },
    Export { dir: PathBuf },
    New { name: String },
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    data_dir: PathBuf,
    command: Command,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if invocation.command == Command::Version {
        println!("steinplan_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    match run(&invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(1)
        }
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut data_dir = PathBuf::from(DEFAULT_DATA_DIR);
    let mut rest = args;

    if let Some((flag, tail)) = rest.split_first() {
        if flag == "--data-dir" {
            let (dir, tail) = tail
                .split_first()
                .ok_or_else(|| "--data-dir needs a directory".to_string())?;
            data_dir = PathBuf::from(dir);
            rest = tail;
        }
    }

    let (name, operands) = rest
        .split_first()
        .ok_or_else(|| "missing command".to_string())?;
    let command = match (name.as_str(), operands) {
        ("list", []) => Command::List {
            filter: String::new(),
        },
        ("list", [filter]) => Command::List {
            filter: filter.clone(),
        },
        ("show", [id]) => Command::Show { id: id.clone() },
        ("delete", [id]) => Command::Delete { id: id.clone() },
        ("import", [file]) => Command::Import {
            file: PathBuf::from(file),
        },
        ("export", []) => Command::Export {
            dir: PathBuf::from("."),
        },
        ("export", [dir]) => Command::Export {
            dir: PathBuf::from(dir),
        },
        ("new", [name]) => Command::New { name: name.clone() },
        ("version", []) => Command::Version,
        (other, _) => return Err(format!("unknown command or wrong arguments: `{other}`")),
    };

    Ok(Invocation { data_dir, command })
}

fn run(invocation: &Invocation) -> Result<(), String> {
    let data_dir = absolute(&invocation.data_dir)?;
    let config = CoreConfig::new(data_dir).map_err(|err| err.to_string())?;
    if let Err(err) = init_logging(config.log_level(), config.log_dir()) {
        eprintln!("warning: logging disabled: {err}");
    }

    let conn = open_db(config.db_path()).map_err(|err| err.to_string())?;
    let mut store =
        RecordStore::open_with_key(SqliteBlobStore::new(&conn), config.storage_key());
    if let LoadStatus::Recovered { reason } = store.load_status() {
        eprintln!("warning: stored records were unreadable and have been reset ({reason})");
    }

    match &invocation.command {
        Command::List { filter } => {
            for record in store.query(filter) {
                print_summary(record);
            }
            Ok(())
        }
        Command::Show { id } => {
            let record = store
                .get(id)
                .ok_or_else(|| format!("no record with id `{id}`"))?;
            print_record(record);
            Ok(())
        }
        Command::Delete { id } => {
            let DeleteOutcome { removed, flush } = store.delete(id);
            if !removed {
                return Err(format!("no record with id `{id}`"));
            }
            info!("event=cli_delete module=cli status=ok id={id}");
            println!("deleted {id}");
            report_flush(flush)
        }
        Command::Import { file } => {
            let reader = PayloadReader::new();
            match import_file(&mut store, &reader, file).map_err(|err| err.to_string())? {
                ImportOutcome::Imported {
                    imported,
                    skipped,
                    flush,
                } => {
                    println!("imported {imported} record(s), skipped {skipped}");
                    report_flush(flush)
                }
                ImportOutcome::NothingNew { skipped } => {
                    println!("nothing new to import, skipped {skipped}");
                    Ok(())
                }
            }
        }
        Command::Export { dir } => {
            let path = write_export_today(store.all(), dir).map_err(|err| err.to_string())?;
            println!("exported {} record(s) to {}", store.len(), path.display());
            Ok(())
        }
        Command::New { name } => {
            let mut record = Record::blank_form(Utc::now().date_naive()).persisted_copy();
            record
                .set("formatBezeichnung", name.as_str())
                .map_err(|err| err.to_string())?;
            let id = record.id().clone();
            let outcome = store.upsert(record).map_err(|err| err.to_string())?;
            info!("event=cli_new module=cli status=ok id={id}");
            println!("{id}");
            report_flush(outcome.flush)
        }
        Command::Version => Ok(()),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("cannot resolve data dir: {err}"))
}

fn report_flush(flush: FlushStatus) -> Result<(), String> {
    match flush {
        FlushStatus::Flushed => Ok(()),
        FlushStatus::Pending => {
            warn!("event=cli_flush module=cli status=pending");
            Err("change kept in memory but could not be saved to disk".to_string())
        }
    }
}

fn print_summary(record: &Record) {
    let summary = record.summary();
    println!(
        "{}\t{}\t{}\t{}\t{}",
        summary.id, summary.display_name, summary.art_nr, summary.material, summary.datum
    );
}

fn print_record(record: &Record) {
    println!("id: {}", record.id());
    for (spec, value) in record.fields() {
        println!("{}: {}", spec.label, value);
    }
    println!("images: {}", record.images().len());
    println!(
        "single image: {}",
        if record.single_image().is_some() {
            "yes"
        } else {
            "no"
        }
    );
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Command, DEFAULT_DATA_DIR};
    use std::path::PathBuf;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_commands_with_default_data_dir() {
        let invocation = parse_args(&args(&["list", "t8"])).unwrap();
        assert_eq!(invocation.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(
            invocation.command,
            Command::List {
                filter: "t8".to_string()
            }
        );

        let export = parse_args(&args(&["export"])).unwrap();
        assert_eq!(
            export.command,
            Command::Export {
                dir: PathBuf::from(".")
            }
        );
    }

    #[test]
    fn parses_data_dir_flag() {
        let invocation = parse_args(&args(&["--data-dir", "/srv/stein", "show", "42"])).unwrap();
        assert_eq!(invocation.data_dir, PathBuf::from("/srv/stein"));
        assert_eq!(
            invocation.command,
            Command::Show {
                id: "42".to_string()
            }
        );
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["--data-dir"])).is_err());
        assert!(parse_args(&args(&["show"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}
