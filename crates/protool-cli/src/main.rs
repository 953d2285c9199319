//! Command-line interface for protool.
//!
//! Decodes, reads, diffs and searches provisioning profiles. Command output
//! goes to stdout; diagnostics and logs go to stderr.

use clap::{Args, Parser, Subcommand, ValueEnum};
use protool::diff::ShellRenderer;
use protool::query::decode_with;
use protool::search::search_with;
use protool::{
    diff_with, render_value, value_for_key_with, CmsUnwrapper, ProfileLoader, ProfileTypeSet,
    ProvisioningType, SearchQuery, SecurityUnwrapper, DEFAULT_DIFF_TOOL,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protool")]
#[command(about = "A tool for dealing with provisioning profiles")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// How to unwrap the signed profile container
    #[arg(long, value_enum, default_value_t = UnwrapArg::Cms, env = "PROTOOL_UNWRAP", global = true)]
    unwrap: UnwrapArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform a diff between two profiles
    Diff(DiffArgs),

    /// Perform a diff between two profiles with the git diff parameters
    Gitdiff(GitDiffArgs),

    /// Read the value from a profile using the key specified
    Read(ReadArgs),

    /// Decode a provisioning profile and display it in a readable format
    Decode(DecodeArgs),

    /// Search installed profiles by bundle identifier and type
    Search(SearchArgs),

    /// List the developer certificates embedded in a profile
    Certs(DecodeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum UnwrapArg {
    /// Parse the CMS container in process
    Cms,
    /// Use `security cms -D` (macOS only)
    Security,
}

/// Options shared by `diff` and `gitdiff`.
#[derive(Args)]
struct DiffFlags {
    /// A list of keys to ignore, e.g. --ignore TimeToLive UUID
    #[arg(short, long, num_args = 1..)]
    ignore: Vec<String>,

    /// Diff command to use. It must take two file paths as its final two arguments [default: opendiff]
    #[arg(short, long)]
    tool: Option<String>,

    /// Keep the original key order instead of sorting keys
    #[arg(short, long)]
    keep_original_order: bool,
}

#[derive(Args)]
struct DiffArgs {
    /// The two profiles to diff
    #[arg(short, long, num_args = 2, required = true, value_names = ["A", "B"])]
    profiles: Vec<PathBuf>,

    #[command(flatten)]
    flags: DiffFlags,
}

#[derive(Args)]
struct GitDiffArgs {
    /// The seven arguments git passes to an external diff driver
    #[arg(short, long, num_args = 7, required = true, allow_hyphen_values = true)]
    git_args: Vec<String>,

    #[command(flatten)]
    flags: DiffFlags,
}

#[derive(Args)]
struct ReadArgs {
    /// The profile to read the value from
    #[arg(short, long)]
    profile: PathBuf,

    /// The key to read the value for
    #[arg(short, long)]
    key: String,
}

#[derive(Args)]
struct DecodeArgs {
    /// The profile to decode
    #[arg(short, long)]
    profile: PathBuf,
}

#[derive(Args)]
struct SearchArgs {
    /// Regular expression matched against each profile's bundle identifier
    #[arg(short = 'i', long = "app-id")]
    app_id: String,

    /// Profile types to include
    #[arg(
        short = 't',
        long = "type",
        num_args = 1..,
        default_value = "all",
        value_parser = ["ios-dev", "appstore", "enterprise", "adhoc", "all"]
    )]
    types: Vec<String>,

    /// Directory to search instead of the installed profile directory
    #[arg(long, env = "PROTOOL_PROFILES_DIR")]
    profiles_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Diff(args) => run_diff(&cli, &args.profiles[0], &args.profiles[1], &args.flags),
        Commands::Gitdiff(args) => run_gitdiff(&cli, args),
        Commands::Read(args) => run_read(&cli, args),
        Commands::Decode(args) => run_decode(&cli, args),
        Commands::Search(args) => run_search(&cli, args),
        Commands::Certs(args) => run_certs(&cli, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn loader(cli: &Cli, sort_keys: bool) -> ProfileLoader {
    let loader = ProfileLoader::new().sort_keys(sort_keys);
    match cli.unwrap {
        UnwrapArg::Cms => loader.unwrapper(CmsUnwrapper),
        UnwrapArg::Security => loader.unwrapper(SecurityUnwrapper::new()),
    }
}

fn run_diff(cli: &Cli, a: &Path, b: &Path, flags: &DiffFlags) -> Result<(), String> {
    let loader = loader(cli, !flags.keep_original_order);
    let renderer = ShellRenderer::new(flags.tool.as_deref().unwrap_or(DEFAULT_DIFF_TOOL));

    let text = diff_with(&loader, &renderer, a, b, &flags.ignore)
        .map_err(|e| format!("Could not diff: {e}"))?;

    if !text.is_empty() {
        println!("{text}");
    }
    Ok(())
}

fn run_gitdiff(cli: &Cli, args: &GitDiffArgs) -> Result<(), String> {
    // git invokes drivers with: path old-file old-hex old-mode new-file new-hex new-mode
    let a = Path::new(&args.git_args[1]);
    let b = Path::new(&args.git_args[4]);
    tracing::debug!(path = %args.git_args[0], old = %a.display(), new = %b.display(), "git diff driver");
    run_diff(cli, a, b, &args.flags)
}

fn run_read(cli: &Cli, args: &ReadArgs) -> Result<(), String> {
    let value = value_for_key_with(&loader(cli, true), &args.profile, &args.key)
        .map_err(|e| format!("Could not read: {e}"))?;
    let Some(value) = value else {
        return Ok(());
    };

    let rendered = render_value(&value).map_err(|e| format!("Could not read: {e}"))?;
    println!("{rendered}");
    Ok(())
}

fn run_decode(cli: &Cli, args: &DecodeArgs) -> Result<(), String> {
    let xml = decode_with(&loader(cli, true), &args.profile).map_err(|e| format!("Could not decode: {e}"))?;
    println!("{}", xml.trim_end());
    Ok(())
}

fn run_search(cli: &Cli, args: &SearchArgs) -> Result<(), String> {
    let types = if args.types.iter().any(|t| t == "all") {
        ProfileTypeSet::all()
    } else {
        args.types.iter().filter_map(|t| ProvisioningType::from_cli_name(t)).collect()
    };

    let mut query = SearchQuery::new(&args.app_id)
        .map_err(|e| format!("Could not search: {e}"))?
        .types(types);
    if let Some(dir) = &args.profiles_dir {
        query = query.profiles_dir(dir);
    }

    let paths = search_with(&query, &loader(cli, true)).map_err(|e| format!("Could not search: {e}"))?;
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_certs(cli: &Cli, args: &DecodeArgs) -> Result<(), String> {
    let profile = loader(cli, true)
        .load(&args.profile)
        .map_err(|e| format!("Could not read certificates: {e}"))?;

    for fact in profile.developer_certificates().facts {
        println!(
            "{}  {}  {}  {}",
            fact.sha1_fingerprint,
            if fact.is_expired { "expired" } else { "valid" },
            fact.not_after.format("%Y-%m-%dT%H:%M:%SZ"),
            fact.common_name.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
