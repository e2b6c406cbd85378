//! Demonstrates installing the snapshot filesystem over a host runtime and
//! resolving a couple of paths through it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use snapshot_fs::{install, read_content_text, HookTable, HostRuntime, LayoutHeader, StatArg};

/// Inspects the embedded archive at the end of an executable and exercises
/// the read/stat/resolve hooks against it.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
struct Args {
    /// Executable (or standalone archive) containing the embedded archive.
    #[clap(long)]
    blob: PathBuf,
    /// Byte offset of the archive within `blob`.
    #[clap(long)]
    resource_start: u64,
    /// Byte length of the archive within `blob`.
    #[clap(long)]
    resource_size: u64,
    /// Byte offset of the bundled entrypoint text within `blob`, if any.
    #[clap(long, default_value_t = 0)]
    content_start: u64,
    /// Byte length of the bundled entrypoint text within `blob`, if any.
    #[clap(long, default_value_t = 0)]
    content_size: u64,
    /// Print the bundled entrypoint text (from `content_start`/`content_size`)
    /// before installing.
    #[clap(long)]
    show_content: bool,
    /// Directory the application was originally bundled from.
    #[clap(long)]
    project_root: String,
    /// A virtual or project-relative path to read back through the hooks.
    #[clap(long)]
    read: Option<String>,
    /// Enable tracing of hook invocations (same effect as
    /// `SNAPSHOT_FS_DEBUG=snapshot-fs`).
    #[clap(long)]
    debug: bool,
}

struct NoopHost {
    project_root: String,
    hooks: Mutex<HookTable>,
}

impl HostRuntime for NoopHost {
    fn current_hooks(&self) -> HookTable {
        self.hooks.lock().unwrap().clone()
    }

    fn set_hooks(&self, table: HookTable) {
        *self.hooks.lock().unwrap() = table;
    }

    fn project_root(&self) -> String {
        self.project_root.clone()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.debug {
        std::env::set_var(snapshot_fs::diag::DEBUG_ENV_VAR, "snapshot-fs");
    }

    let file_size = std::fs::metadata(&args.blob)?.len();
    let header = LayoutHeader::new(
        args.blob.clone(),
        args.resource_start,
        args.resource_size,
        args.content_start,
        args.content_size,
        file_size,
    )?;

    if args.show_content && header.content_size > 0 {
        // Read directly, before `install` patches anything: the entrypoint
        // text lives in the same real, pre-interception blob file.
        let content = read_content_text(&header)?;
        println!("entrypoint text ({} bytes):\n{content}", header.content_size);
    }

    let host = Arc::new(NoopHost {
        project_root: args.project_root,
        hooks: Mutex::new(HookTable {
            read_file: Arc::new(|_| String::new()),
            read_json: Arc::new(|_| None),
            stat: Arc::new(|_| -2),
            find_path: Arc::new(|_, _| None),
        }),
    });

    let guard = install(header, host.clone())?;
    println!("installed: archive mounted at {}", snapshot_fs::VIRTUAL_ROOT);

    if let Some(path) = args.read {
        let hooks = host.current_hooks();
        let contents = (hooks.read_file)(&path);
        println!("read {path}: {} bytes", contents.len());

        let stat_result = (hooks.stat)(StatArg::Path(path.clone()));
        println!("stat {path}: {stat_result}");
    }

    // This demo never runs as a long-lived process, so there is nothing to
    // restore the hooks for; keep them installed rather than tear down.
    guard.leak();
    Ok(())
}
