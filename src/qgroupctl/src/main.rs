use std::{path::PathBuf, process::ExitCode};

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use qgroup::{
    btrfs::Btrfs,
    commands::{self, LimitArgs},
    coordinator::{ConsistencyOutcome, RescanFlags, Settlement},
    listing::{Columns, FilterKind, ListingSpecBuilder},
    render,
    request::{LimitKind, Relation},
    units::{Base, Scale, UnitMode},
    Config, NoRescanMode,
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "qgroupctl", version, about = "manage quota groups", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// More logging (repeat for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// What --no-rescan does: 'ignore' it, or 'defer' the rescan even if --rescan is given
    #[arg(long, global = true, env = "QGROUPCTL_NO_RESCAN_MODE", default_value_t = NoRescanMode::Ignore)]
    no_rescan_mode: NoRescanMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign SRC as the child qgroup of DST
    Assign(RelationArgs),
    /// Remove a child qgroup SRC from DST
    Remove(RelationArgs),
    /// Create a subvolume quota group
    Create {
        qgroupid: String,
        path: PathBuf,
    },
    /// Destroy a quota group
    Destroy {
        qgroupid: String,
        path: PathBuf,
    },
    /// Show subvolume quota groups
    Show(ShowArgs),
    /// Set the limits of a subvolume quota group
    Limit(LimitCmd),
}

#[derive(Args, Debug)]
struct RelationArgs {
    src: String,
    dst: String,
    path: PathBuf,
    /// Schedule a quota rescan if needed
    #[arg(long)]
    rescan: bool,
    /// Don't schedule a quota rescan (see --no-rescan-mode)
    #[arg(long)]
    no_rescan: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Print parent qgroup id
    #[arg(short = 'p')]
    parent: bool,
    /// Print child qgroup id
    #[arg(short = 'c')]
    child: bool,
    /// Print limit of referenced size of qgroup
    #[arg(short = 'r')]
    max_rfer: bool,
    /// Print limit of exclusive size of qgroup
    #[arg(short = 'e')]
    max_excl: bool,
    /// List all qgroups which impact the given path (including ancestral qgroups)
    #[arg(short = 'F')]
    all_parents: bool,
    /// List all qgroups which impact the given path (excluding ancestral qgroups)
    #[arg(short = 'f')]
    parents: bool,
    /// Sort by qgroupid,rfer,excl,max_rfer,max_excl; prefix '+' ascending (default) or '-' descending
    #[arg(long, value_name = "SPEC", allow_hyphen_values = true)]
    sort: Option<String>,
    #[command(flatten)]
    units: UnitArgs,
    /// Print rows as JSON
    #[arg(long)]
    json: bool,
    path: PathBuf,
}

#[derive(Args, Debug, Default)]
#[group(id = "scale", multiple = false)]
struct ScaleArgs {
    /// Raw numbers in bytes
    #[arg(long)]
    raw: bool,
    /// Human friendly numbers, base 1024 (default)
    #[arg(long)]
    human_readable: bool,
    /// Show sizes in KiB, or kB with --si
    #[arg(long)]
    kbytes: bool,
    /// Show sizes in MiB, or MB with --si
    #[arg(long)]
    mbytes: bool,
    /// Show sizes in GiB, or GB with --si
    #[arg(long)]
    gbytes: bool,
    /// Show sizes in TiB, or TB with --si
    #[arg(long)]
    tbytes: bool,
}

#[derive(Args, Debug, Default)]
struct UnitArgs {
    #[command(flatten)]
    scale: ScaleArgs,
    /// Use 1024 as a base (KiB, MiB, GiB, TiB)
    #[arg(long, conflicts_with = "si")]
    iec: bool,
    /// Use 1000 as a base (kB, MB, GB, TB)
    #[arg(long)]
    si: bool,
}

impl UnitArgs {
    fn mode(&self) -> UnitMode {
        let base = if self.si { Base::Si } else { Base::Iec };
        let s = &self.scale;
        let scale = if s.raw {
            Scale::Raw
        } else if s.human_readable {
            Scale::Human
        } else if s.kbytes {
            Scale::Fixed(1)
        } else if s.mbytes {
            Scale::Fixed(2)
        } else if s.gbytes {
            Scale::Fixed(3)
        } else if s.tbytes {
            Scale::Fixed(4)
        } else {
            Scale::Human
        };
        UnitMode { base, scale }
    }
}

impl ShowArgs {
    fn spec_builder(&self) -> qgroup::Result<ListingSpecBuilder> {
        let mut b = ListingSpecBuilder::new();
        for (set, column) in [
            (self.parent, Columns::PARENT),
            (self.child, Columns::CHILD),
            (self.max_rfer, Columns::MAX_RFER),
            (self.max_excl, Columns::MAX_EXCL),
        ] {
            if set {
                b.column(column);
            }
        }
        if self.all_parents {
            b.filter(FilterKind::AllParents);
        }
        if self.parents {
            b.filter(FilterKind::Parent);
        }
        if let Some(sort) = &self.sort {
            b.sort(sort)?;
        }
        Ok(b)
    }
}

#[derive(Args, Debug)]
struct LimitCmd {
    /// Limit amount of data after compression (the default; can't be turned off)
    #[arg(short = 'c')]
    compressed: bool,
    /// Turn off compressed accounting (not supported)
    #[arg(long, conflicts_with = "compressed")]
    no_compress: bool,
    /// Limit space exclusively assigned to this qgroup
    #[arg(short = 'e')]
    exclusive: bool,
    /// Size with optional k/m/g/t suffix, or 'none' to clear the limit
    #[arg(allow_hyphen_values = true)]
    size: String,
    /// [QGROUPID] PATH; without a qgroupid, PATH must be a subvolume
    #[arg(value_name = "QGROUPID|PATH", num_args = 1..=2, required = true)]
    targets: Vec<String>,
}

impl LimitCmd {
    fn args(&self) -> anyhow::Result<LimitArgs<'_>> {
        let (qgroupid, path) = match self.targets.as_slice() {
            [path] => (None, path),
            [qgroupid, path] => (Some(qgroupid.as_str()), path),
            _ => return Err(anyhow!("expected [<qgroupid>] <path>")),
        };
        Ok(LimitArgs {
            size: &self.size,
            qgroupid,
            path: std::path::Path::new(path),
            kind: if self.exclusive { LimitKind::MaxExclusive } else { LimitKind::MaxReferenced },
            compressed: !self.no_compress,
        })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::ERROR,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

#[derive(Debug, PartialEq, Eq)]
enum Notice {
    Info(&'static str),
    Warning(&'static str),
    Error(String),
}

impl Notice {
    fn print(&self) {
        match self {
            Notice::Info(msg) => println!("{}", msg.dimmed()),
            Notice::Warning(msg) => println!("{}", msg.yellow()),
            Notice::Error(msg) => eprintln!("{}", msg.red()),
        }
    }
}

/// What to tell the user after a relation change, and whether the command succeeded.
fn report(settlement: &Settlement) -> (Option<Notice>, bool) {
    if let Some(e) = &settlement.rescan_error {
        return (Some(Notice::Error(format!("ERROR: quota rescan failed: {}", e))), false);
    }
    let notice = match settlement.outcome {
        ConsistencyOutcome::Consistent => None,
        ConsistencyOutcome::InconsistentRescanRequested => {
            Some(Notice::Info("Quota data changed, rescan scheduled"))
        }
        ConsistencyOutcome::InconsistentRescanDeferred => {
            Some(Notice::Warning("WARNING: quotas may be inconsistent, rescan needed"))
        }
    };
    (notice, true)
}

fn cmd_relation(config: &Config, relation: Relation, args: &RelationArgs) -> anyhow::Result<ExitCode> {
    let flags = RescanFlags {
        rescan: args.rescan,
        no_rescan: args.no_rescan,
    };
    let settlement = commands::relation(&Btrfs, config, relation, &args.src, &args.dst, &args.path, flags)?;

    let (notice, ok) = report(&settlement);
    if let Some(notice) = notice {
        notice.print();
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_create(create: bool, qgroupid: &str, path: &std::path::Path) -> anyhow::Result<ExitCode> {
    commands::create(&Btrfs, create, qgroupid, path)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(args: &ShowArgs) -> anyhow::Result<ExitCode> {
    let builder = args.spec_builder()?;
    let (spec, rows) = commands::show(&Btrfs, &builder, &args.path)?;

    if args.json {
        println!("{}", render::json(&rows)?);
    } else {
        print!("{}", render::table(&rows, spec.columns, args.units.mode()));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_limit(args: &LimitCmd) -> anyhow::Result<ExitCode> {
    commands::limit(&Btrfs, args.args()?)?;
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config {
        no_rescan: cli.no_rescan_mode,
    };

    match &cli.command {
        Commands::Assign(args) => cmd_relation(&config, Relation::Assign, args),
        Commands::Remove(args) => cmd_relation(&config, Relation::Remove, args),
        Commands::Create { qgroupid, path } => cmd_create(true, qgroupid, path),
        Commands::Destroy { qgroupid, path } => cmd_create(false, qgroupid, path),
        Commands::Show(args) => cmd_show(args),
        Commands::Limit(args) => cmd_limit(args),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // usage errors exit 1 like any other failure; --help and --version exit 0
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("ERROR: {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}
