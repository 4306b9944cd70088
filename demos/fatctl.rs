// fatctl: drive a FAT store on disk, one operation per invocation.
//
//   cargo run --example fatctl -- --root /tmp/fat --users users.json \
//       --user alice create notes "hello world this is a longer text"

use std::{fs, path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use fatfs::{Action, DirBlobStore, FatConfig, FatFs, FatResult, Role, StaticUsers};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the table and blocks
    #[arg(long, default_value = "filesystem")]
    root: PathBuf,

    /// Acting user
    #[arg(short, long, default_value = "admin")]
    user: String,

    /// JSON object mapping user names to "admin" or "user"
    #[arg(long)]
    users: Option<PathBuf>,

    /// JSON engine config
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Create { name: String, content: String },
    List,
    Trash,
    Open { name: String },
    Modify { name: String, content: String },
    Delete { name: String },
    Recover { name: String },
    /// Grant or revoke read/write (lectura/escritura) for another user
    Chmod {
        name: String,
        target: String,
        kind: String,
        #[arg(long)]
        revoke: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> FatResult<()> {
    let config = match &args.config {
        Some(path) => FatConfig::from_json(&fs::read(path)?)?,
        None => FatConfig::default(),
    };
    let users = match &args.users {
        Some(path) => serde_json::from_slice(&fs::read(path)?)?,
        None => StaticUsers::new().with("admin", Role::Admin),
    };
    let store = Arc::new(DirBlobStore::open(&args.root)?);
    let fat = FatFs::with_system_clock(store, users, config)?;
    let user = args.user.as_str();

    match args.command {
        Command::Create { name, content } => {
            fat.create(&name, &content, user)?;
            println!("created {}", name);
        }
        Command::List => print_rows(&fat, false, user)?,
        Command::Trash => print_rows(&fat, true, user)?,
        Command::Open { name } => {
            let file = fat.open(&name, user)?;
            println!("owner:    {}", file.entry.owner);
            println!("created:  {}", file.entry.created_at);
            println!("modified: {}", file.entry.modified_at);
            println!("size:     {}", file.entry.size);
            for (who, access) in &file.entry.permissions {
                println!("grant:    {} {:?}", who, access);
            }
            println!("\n{}", file.content);
        }
        Command::Modify { name, content } => {
            fat.modify(&name, &content, user)?;
            println!("modified {}", name);
        }
        Command::Delete { name } => {
            fat.delete(&name, user)?;
            println!("moved {} to the trash", name);
        }
        Command::Recover { name } => {
            fat.recover(&name, user)?;
            println!("recovered {}", name);
        }
        Command::Chmod {
            name,
            target,
            kind,
            revoke,
        } => {
            let kind: Action = kind.parse()?;
            let change = fat.manage_permission(&name, user, &target, kind, !revoke)?;
            println!("{:?}: {} for {} on {}", change, kind, target, name);
        }
    }
    Ok(())
}

fn print_rows(fat: &FatFs<DirBlobStore, StaticUsers>, trash: bool, user: &str) -> FatResult<()> {
    for row in fat.list(trash, user)? {
        if !row.readable {
            println!("- {} [restricted]", row.name);
        } else if trash {
            let at = row.entry.trashed_at.unwrap_or_default();
            println!("- {} (owner {}, trashed {})", row.name, row.entry.owner, at);
        } else {
            println!("- {} (owner {}, {} chars)", row.name, row.entry.owner, row.entry.size);
        }
    }
    Ok(())
}
