mod output;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use output::{
    GetOutput, HashOutput, InitOutput, LsOutput, OutputWriter, RecordOutput, RefGetOutput,
    RefInfo, RefListOutput, RefResolveOutput, RefRmOutput, RefSetOutput, StatusOutput,
};
use pit_core::{Category, HEAD, Repository};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, warn};

/// Pit - a minimal content-addressed object store
#[derive(Parser)]
#[command(name = "pit")]
#[command(about = "Content-addressed object store with refs and snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Working directory holding .pit (defaults to PIT_ROOT env var or .)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .pit in the working directory
    Init,

    /// Compare the working tree with HEAD
    Status,

    /// Snapshot the working tree and move HEAD to it
    Record,

    /// List the entries of a tree object
    Ls {
        /// Digest or unambiguous prefix of the tree
        prefix: String,
    },

    /// Store stdin as an object and print its digest
    Put,

    /// Write an object's contents to stdout
    Get {
        /// Digest or prefix (read from stdin if omitted)
        prefix: Option<String>,
    },

    /// Delete an object
    Delete {
        /// Digest or prefix (read from stdin if omitted)
        prefix: Option<String>,
    },

    /// Print the full digest a prefix expands to
    Hash {
        /// Digest or prefix (read from stdin if omitted)
        prefix: Option<String>,
    },

    /// Manage references
    #[command(subcommand)]
    Ref(RefCommands),
}

#[derive(Subcommand)]
enum RefCommands {
    /// Point a ref at an object (follows symbolic refs)
    Set {
        /// HEAD or <category>/<name>
        path: String,

        /// Digest, prefix or ref to point at
        prefix: String,
    },

    /// Make a ref redirect to another ref
    Symbolic {
        /// HEAD or <category>/<name>
        path: String,

        /// Ref path the ref redirects to
        target: String,
    },

    /// Print the stored value of a ref
    Get {
        /// HEAD or <category>/<name>
        path: String,
    },

    /// Print the digest a ref finally points at
    Resolve {
        /// HEAD, <category>/<name> or a digest prefix
        path: String,
    },

    /// List HEAD and all branch heads
    List,

    /// Remove a branch head
    Rm {
        /// <category>/<name>
        path: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let out = OutputWriter::new(cli.json);

    // Working directory: CLI arg > PIT_ROOT env var > current directory
    let root = cli
        .root
        .or_else(|| std::env::var("PIT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    match run(&root, &out, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code_for(&err);
            out.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Exit code of the first pit error in the chain, 1 for anything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<pit_core::Error>())
        .map(pit_core::Error::exit_code)
        .unwrap_or(1)
}

fn run(root: &Path, out: &OutputWriter, command: Commands) -> Result<()> {
    match command {
        Commands::Init => cmd_init(root, out),
        Commands::Status => cmd_status(root, out),
        Commands::Record => cmd_record(root, out),
        Commands::Ls { prefix } => cmd_ls(root, out, &prefix),
        Commands::Put => cmd_put(root, out),
        Commands::Get { prefix } => cmd_get(root, out, prefix),
        Commands::Delete { prefix } => cmd_delete(root, out, prefix),
        Commands::Hash { prefix } => cmd_hash(root, out, prefix),
        Commands::Ref(ref_cmd) => match ref_cmd {
            RefCommands::Set { path, prefix } => cmd_ref_set(root, out, &path, &prefix),
            RefCommands::Symbolic { path, target } => cmd_ref_symbolic(root, out, &path, &target),
            RefCommands::Get { path } => cmd_ref_get(root, out, &path),
            RefCommands::Resolve { path } => cmd_ref_resolve(root, out, &path),
            RefCommands::List => cmd_ref_list(root, out),
            RefCommands::Rm { path } => cmd_ref_rm(root, out, &path),
        },
    }
}

fn open_repo(root: &Path) -> Result<Repository> {
    Repository::open(root)
        .with_context(|| format!("Failed to open repository at {}", root.display()))
}

/// Use the argument if given, else the first line of `input`, trimmed.
fn read_prefix(arg: Option<String>, mut input: impl BufRead) -> Result<String> {
    let raw = match arg {
        Some(arg) => arg,
        None => {
            let mut line = String::new();
            input
                .read_line(&mut line)
                .context("Failed to read digest from stdin")?;
            line
        }
    };

    let prefix = raw.trim();
    if prefix.is_empty() {
        return Err(pit_core::Error::invalid_input("No digest given").into());
    }
    Ok(prefix.to_string())
}

/// Split `<category>/<name>` for the category-based ref operations.
fn split_ref_path(path: &str) -> Result<(Category, &str)> {
    let (category, name) = path.split_once('/').ok_or_else(|| {
        pit_core::Error::invalid_input(format!("Expected <category>/<name>, got {}", path))
    })?;
    Ok((Category::parse(category)?, name))
}

fn cmd_init(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = Repository::init(root)
        .with_context(|| format!("Failed to initialize repository at {}", root.display()))?;

    let store_root = repo.store().root().display().to_string();
    let algorithm = repo.store().algorithm().as_str().to_string();

    let output = InitOutput {
        success: true,
        result_code: 0,
        root: store_root.clone(),
        algorithm: algorithm.clone(),
    };
    out.write(&output, || {
        format!(
            "Initialized pit repository in {}\nAlgorithm: {}\n",
            store_root, algorithm
        )
    })
}

fn cmd_status(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = open_repo(root)?;
    let status = repo.status().context("Failed to snapshot working tree")?;

    let output = StatusOutput {
        success: true,
        result_code: 0,
        tree: status.tree,
        head: status.head,
        clean: status.is_clean(),
    };
    out.write(&output, || {
        let head = status
            .head
            .map(|hash| hash.to_hex())
            .unwrap_or_else(|| "(none)".to_string());
        let state = if status.is_clean() {
            "clean"
        } else {
            "modified"
        };
        format!("tree {}\nHEAD {}\n{}\n", status.tree, head, state)
    })
}

fn cmd_record(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = open_repo(root)?;
    let tree = repo.record().context("Failed to record working tree")?;

    let output = RecordOutput {
        success: true,
        result_code: 0,
        tree,
    };
    out.write(&output, || format!("{}\n", tree))
}

fn cmd_ls(root: &Path, out: &OutputWriter, prefix: &str) -> Result<()> {
    let repo = open_repo(root)?;
    let store = repo.store();

    let hash = store
        .compute_full_hash(prefix)
        .with_context(|| format!("Failed to resolve {}", prefix))?;
    let tree = store
        .get_tree(&hash.to_hex())
        .with_context(|| format!("Failed to read tree {}", hash))?;

    let output = LsOutput::new(hash, &tree);
    out.write(&output, || output.to_text())
}

fn cmd_put(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = open_repo(root)?;

    if atty::is(atty::Stream::Stdin) {
        warn!("reading object contents from a terminal, end input with Ctrl-D");
    }

    let hash = repo
        .store()
        .put_reader(io::stdin().lock())
        .context("Failed to store stdin")?;

    let output = HashOutput {
        success: true,
        result_code: 0,
        hash,
    };
    out.write(&output, || format!("{}\n", hash))
}

fn cmd_get(root: &Path, out: &OutputWriter, prefix: Option<String>) -> Result<()> {
    let repo = open_repo(root)?;
    let prefix = read_prefix(prefix, io::stdin().lock())?;
    let store = repo.store();

    if out.is_json() {
        let hash = store
            .compute_full_hash(&prefix)
            .with_context(|| format!("Failed to resolve {}", prefix))?;
        let content = store
            .get(&hash.to_hex())
            .with_context(|| format!("Failed to read object {}", hash))?;

        let output = GetOutput {
            success: true,
            result_code: 0,
            hash,
            size: content.len(),
            content: String::from_utf8_lossy(&content).into_owned(),
        };
        return out.write(&output, String::new);
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let size = store
        .get_to_writer(&prefix, &mut handle)
        .with_context(|| format!("Failed to read object {}", prefix))?;
    handle.flush()?;
    debug!(%prefix, size, "object written to stdout");

    Ok(())
}

fn cmd_delete(root: &Path, out: &OutputWriter, prefix: Option<String>) -> Result<()> {
    let repo = open_repo(root)?;
    let prefix = read_prefix(prefix, io::stdin().lock())?;

    let hash = repo
        .store()
        .delete(&prefix)
        .with_context(|| format!("Failed to delete {}", prefix))?;

    let output = HashOutput {
        success: true,
        result_code: 0,
        hash,
    };
    out.write(&output, || format!("Deleted {}\n", hash))
}

fn cmd_hash(root: &Path, out: &OutputWriter, prefix: Option<String>) -> Result<()> {
    let repo = open_repo(root)?;
    let prefix = read_prefix(prefix, io::stdin().lock())?;

    let hash = repo
        .store()
        .compute_full_hash(&prefix)
        .with_context(|| format!("Failed to resolve {}", prefix))?;

    let output = HashOutput {
        success: true,
        result_code: 0,
        hash,
    };
    out.write(&output, || format!("{}\n", hash))
}

fn cmd_ref_set(root: &Path, out: &OutputWriter, path: &str, prefix: &str) -> Result<()> {
    let repo = open_repo(root)?;
    let refs = repo.store().refs();

    let hash = refs
        .resolve_hash(prefix)
        .with_context(|| format!("Failed to resolve {}", prefix))?;
    refs.update(path, &hash)
        .with_context(|| format!("Failed to update ref {}", path))?;

    let output = RefSetOutput {
        success: true,
        result_code: 0,
        reference: RefInfo::new(path, &pit_core::RefValue::Direct(hash)),
    };
    out.write(&output, || format!("{} -> {}\n", path, hash))
}

fn cmd_ref_symbolic(root: &Path, out: &OutputWriter, path: &str, target: &str) -> Result<()> {
    let repo = open_repo(root)?;

    repo.store()
        .refs()
        .put_symbolic(path, target)
        .with_context(|| format!("Failed to point {} at {}", path, target))?;

    let output = RefSetOutput {
        success: true,
        result_code: 0,
        reference: RefInfo::new(path, &pit_core::RefValue::Symbolic(target.trim().to_string())),
    };
    out.write(&output, || format!("{} -> {}\n", path, target.trim()))
}

fn cmd_ref_get(root: &Path, out: &OutputWriter, path: &str) -> Result<()> {
    let repo = open_repo(root)?;

    let value = repo
        .store()
        .refs()
        .read(path)
        .with_context(|| format!("Failed to read ref {}", path))?;

    let output = RefGetOutput {
        success: true,
        result_code: 0,
        reference: RefInfo::new(path, &value),
    };
    out.write(&output, || format!("{}\n", value))
}

fn cmd_ref_resolve(root: &Path, out: &OutputWriter, path: &str) -> Result<()> {
    let repo = open_repo(root)?;

    let hash = repo
        .store()
        .refs()
        .resolve_hash(path)
        .with_context(|| format!("Failed to resolve {}", path))?;

    let output = RefResolveOutput {
        success: true,
        result_code: 0,
        path: path.to_string(),
        hash,
    };
    out.write(&output, || format!("{}\n", hash))
}

fn cmd_ref_list(root: &Path, out: &OutputWriter) -> Result<()> {
    let repo = open_repo(root)?;
    let refs = repo.store().refs();

    let mut infos = Vec::new();
    match refs.read(HEAD) {
        Ok(value) => infos.push(RefInfo::new(HEAD, &value)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e).context("Failed to read HEAD"),
    }

    let category = Category::Heads;
    for (name, value) in refs.list(category).context("Failed to list refs")? {
        infos.push(RefInfo::new(
            format!("{}/{}", category.as_str(), name),
            &value,
        ));
    }

    let output = RefListOutput {
        success: true,
        result_code: 0,
        refs: infos,
    };
    out.write(&output, || {
        output
            .refs
            .iter()
            .map(|info| format!("{} {}\n", info.path, info.value))
            .collect()
    })
}

fn cmd_ref_rm(root: &Path, out: &OutputWriter, path: &str) -> Result<()> {
    let repo = open_repo(root)?;
    let (category, name) = split_ref_path(path)?;

    repo.store()
        .refs()
        .delete_ref(category, name)
        .with_context(|| format!("Failed to remove ref {}", path))?;

    let output = RefRmOutput {
        success: true,
        result_code: 0,
        path: path.to_string(),
    };
    out.write(&output, || format!("Removed {}\n", path))
}
