//! GitOps Cockpit CLI
//!
//! The `cockpit` command turns prompts into Terraform and pipeline files, then
//! commits, pushes and ships them through pull requests and pipeline runs.
//!
//! ## Commands
//!
//! - `init`, `status`, `branch`, `files`: working copy
//! - `generate`: call the completion endpoint and extract files
//! - `blocks`: review, edit and save generated pipeline files
//! - `tf`: run terraform in `terraform/`
//! - `deploy-workflows`: copy pipelines into `.github/workflows`
//! - `push`: stage, commit, pull and push
//! - `pr`, `ci`: pull requests and pipeline runs

mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cockpit_core::{
    clean_remote_url, generate_batch, generate_terraform, header_path, init_and_link, is_git_repo,
    parse_remote, redact, switch_branch, BlockDestination, ChatCompletionClient, CockpitConfig,
    GitWorkingCopy, ProjectLayout, RepositorySynchronizer, SyncRequest, VersionControl, ORIGIN,
};
use cockpit_forge::{DeliveryRequest, Forge, PollPolicy, PullRequestDraft};
use cockpit_infra::{ProvisionCommand, TerraformRunner};
use tokio::sync::watch;
use tracing::{info, warn, Level};

use session::SessionContext;

const DEFAULT_BRANCH: &str = "main";

#[derive(Parser)]
#[command(name = "cockpit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "GitOps Cockpit: prompt-driven infrastructure and pipelines", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Working-copy root (default: current directory)
    #[arg(long, global = true, env = "COCKPIT_BASE_DIR")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise the working copy and optionally (re)link `origin`
    Init {
        /// Remote URL for `origin`
        #[arg(long)]
        remote: Option<String>,
    },

    /// Show working-copy status
    Status,

    /// Switch to a branch, creating it when it does not exist
    Branch { name: String },

    /// List Terraform and pipeline files eligible for commit
    Files,

    /// Generate files from a prompt
    Generate {
        #[command(subcommand)]
        target: GenerateTarget,
    },

    /// Review, edit and save generated pipeline files
    Blocks {
        #[command(subcommand)]
        action: BlocksAction,
    },

    /// Run terraform in the terraform/ directory
    Tf {
        /// Kill a terraform invocation running longer than this
        #[arg(long)]
        timeout_secs: Option<u64>,

        #[command(subcommand)]
        action: TfAction,
    },

    /// Copy pipelines/github/*.yml into .github/workflows
    DeployWorkflows,

    /// Stage, commit, pull and push to origin
    Push(PushArgs),

    /// Pull requests
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },

    /// Pipeline definitions and runs
    Ci {
        #[command(subcommand)]
        action: CiAction,
    },
}

#[derive(Subcommand)]
enum GenerateTarget {
    /// Generate Terraform and replace the contents of terraform/
    Terraform { prompt: String },

    /// Generate pipeline (or tfvars) files and keep them for review
    Pipeline { prompt: String },
}

#[derive(Subcommand)]
enum BlocksAction {
    /// List pending files
    List,

    /// Print one pending file
    Show { path: String },

    /// Print the raw text of the last generation
    Raw,

    /// Replace a pending file's content with the content of a local file
    Replace {
        path: String,

        #[arg(long)]
        from_file: PathBuf,
    },

    /// Write pending files to terraform/ or pipelines/github/
    Save {
        /// Only save this file (default: all pending files)
        path: Option<String>,
    },
}

#[derive(Subcommand)]
enum TfAction {
    Fmt,
    Validate,
    Plan {
        #[arg(long)]
        var_file: Option<String>,
    },
    Apply {
        #[arg(long)]
        var_file: Option<String>,
    },
    Destroy {
        #[arg(long)]
        var_file: Option<String>,
    },
    /// List the .tfvars files available for --var-file
    VarFiles,
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Commit message
    #[arg(short, long, default_value = "Infra update")]
    message: String,

    /// Branch to push (default: last pushed branch, else main)
    #[arg(short, long)]
    branch: Option<String>,

    /// File to stage; repeatable (default: everything)
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<String>,

    /// Username embedded into https remotes
    #[arg(long, env = "GITHUB_USER")]
    username: Option<String>,

    /// Token embedded into https remotes
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Remote URL, used when origin does not exist yet
    #[arg(long)]
    remote: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct RepoArgs {
    /// Repository owner (default: derived from origin)
    #[arg(long)]
    owner: Option<String>,

    /// Repository name (default: derived from origin)
    #[arg(long)]
    repo: Option<String>,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum PrAction {
    /// Open a pull request
    Open {
        #[command(flatten)]
        repo: RepoArgs,

        /// Source branch (default: last pushed branch)
        #[arg(long)]
        source: Option<String>,

        /// Branch to merge into
        #[arg(long, default_value = DEFAULT_BRANCH)]
        base: String,

        /// Title (default: "Auto PR from <source>")
        #[arg(long)]
        title: Option<String>,

        #[arg(long, default_value = "Automated PR for infra changes")]
        body: String,
    },

    /// Merge a pull request
    Merge {
        #[command(flatten)]
        repo: RepoArgs,

        number: u64,
    },
}

#[derive(Args, Debug, Clone)]
struct PollArgs {
    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// Give up after this many polls
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Give up after this many seconds (0 waits indefinitely)
    #[arg(long, default_value_t = 1800)]
    timeout_secs: u64,
}

impl PollArgs {
    fn policy(&self) -> PollPolicy {
        let mut policy =
            PollPolicy::default().with_interval(Duration::from_secs(self.interval_secs));
        if let Some(max) = self.max_attempts {
            policy = policy.with_max_attempts(max);
        }
        if self.timeout_secs > 0 {
            policy = policy.with_deadline(Duration::from_secs(self.timeout_secs));
        }
        policy
    }
}

#[derive(Subcommand)]
enum CiAction {
    /// List pipeline definitions
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Dispatch a pipeline on a branch
    Trigger {
        #[command(flatten)]
        repo: RepoArgs,

        /// Workflow id or name
        workflow: String,

        /// Branch to run on (default: last pushed branch)
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },

    /// Wait for the latest run of a pipeline to complete
    Watch {
        #[command(flatten)]
        repo: RepoArgs,

        /// Workflow id or name
        workflow: String,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Dispatch, wait for the run, and merge a pull request if it succeeded
    Deliver {
        #[command(flatten)]
        repo: RepoArgs,

        /// Workflow id or name
        workflow: String,

        #[arg(long = "ref")]
        git_ref: Option<String>,

        /// Pull request to merge when the run succeeds
        #[arg(long)]
        merge_pr: Option<u64>,

        #[command(flatten)]
        poll: PollArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env must be visible before clap reads the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cockpit_core::init_tracing(cli.json, level);

    let mut config = CockpitConfig::from_env();
    if let Some(dir) = cli.base_dir {
        config.base_dir = dir;
    }

    let loaded = SessionContext::load(&config.base_dir)?;
    let mut session = loaded.clone();

    let result = match cli.command {
        Commands::Init { remote } => cmd_init(&config, &mut session, remote.as_deref()),
        Commands::Status => cmd_status(&config),
        Commands::Branch { name } => cmd_branch(&config, &mut session, &name),
        Commands::Files => cmd_files(&config),
        Commands::Generate { target } => match target {
            GenerateTarget::Terraform { prompt } => cmd_generate_terraform(&config, &prompt).await,
            GenerateTarget::Pipeline { prompt } => {
                cmd_generate_pipeline(&config, &mut session, &prompt).await
            }
        },
        Commands::Blocks { action } => cmd_blocks(&config, &mut session, action),
        Commands::Tf {
            timeout_secs,
            action,
        } => cmd_tf(&config, action, timeout_secs).await,
        Commands::DeployWorkflows => cmd_deploy_workflows(&config),
        Commands::Push(args) => cmd_push(&config, &mut session, &args),
        Commands::Pr { action } => cmd_pr(&config, &session, action).await,
        Commands::Ci { action } => cmd_ci(&config, &mut session, action).await,
    };

    if session != loaded {
        session.save(&config.base_dir)?;
    }
    result
}

fn working_copy(config: &CockpitConfig) -> GitWorkingCopy {
    let vcs = GitWorkingCopy::new(&config.base_dir);
    match &config.git_identity {
        Some(identity) => vcs.with_identity(&identity.name, &identity.email),
        None => vcs,
    }
}

fn cmd_init(
    config: &CockpitConfig,
    session: &mut SessionContext,
    remote: Option<&str>,
) -> Result<()> {
    let vcs = working_copy(config);
    init_and_link(&vcs, remote).context("Failed to initialise repository")?;
    config.layout().ensure_dirs()?;

    match remote.map(clean_remote_url).filter(|r| !r.is_empty()) {
        Some(url) => {
            println!(
                "Initialized repository at {} with origin {}",
                config.base_dir.display(),
                redact(&url)
            );
            session.remote_url = Some(url);
        }
        None => println!("Initialized repository at {}", config.base_dir.display()),
    }
    Ok(())
}

fn cmd_status(config: &CockpitConfig) -> Result<()> {
    if !is_git_repo(&config.base_dir) {
        println!("Not a git repository. Run `cockpit init --remote <url>` first.");
        return Ok(());
    }
    println!("{}", working_copy(config).status()?);
    Ok(())
}

fn cmd_branch(config: &CockpitConfig, session: &mut SessionContext, name: &str) -> Result<()> {
    switch_branch(&working_copy(config), name)
        .with_context(|| format!("Failed to switch to {name}"))?;
    session.branch = Some(name.to_string());
    println!("Switched to {name}");
    Ok(())
}

fn cmd_files(config: &CockpitConfig) -> Result<()> {
    let candidates = config.layout().commit_candidates()?;
    if candidates.is_empty() {
        println!("No Terraform or pipeline files yet.");
    }
    for path in candidates {
        println!("{path}");
    }
    Ok(())
}

async fn cmd_generate_terraform(config: &CockpitConfig, prompt: &str) -> Result<()> {
    let client = ChatCompletionClient::new(config.completion.clone())?;
    let layout = config.layout();
    layout.ensure_dirs()?;

    let written = generate_terraform(&client, &layout, prompt)
        .await
        .context("Terraform generation failed")?;
    if written.is_empty() {
        println!("The response contained no recognisable files.");
    }
    for path in &written {
        println!("wrote {}", relative(&config.base_dir, path));
    }
    Ok(())
}

async fn cmd_generate_pipeline(
    config: &CockpitConfig,
    session: &mut SessionContext,
    prompt: &str,
) -> Result<()> {
    let client = ChatCompletionClient::new(config.completion.clone())?;
    let batch = generate_batch(&client, prompt)
        .await
        .context("Pipeline generation failed")?;

    let names: Vec<&str> = batch.blocks.paths().collect();
    if names.is_empty() {
        println!("The response contained no recognisable files; see `cockpit blocks raw`.");
    } else {
        println!("Generated: {}", names.join(", "));
        println!("Review with `cockpit blocks show <path>`, save with `cockpit blocks save`.");
    }
    session.stage_generation(batch.raw, batch.blocks);
    Ok(())
}

fn cmd_blocks(
    config: &CockpitConfig,
    session: &mut SessionContext,
    action: BlocksAction,
) -> Result<()> {
    match action {
        BlocksAction::List => {
            if session.pending_blocks.is_empty() {
                println!("No pending files.");
            }
            for (path, body) in session.pending_blocks.iter() {
                let destination = match BlockDestination::for_path(path) {
                    BlockDestination::Terraform => "terraform",
                    BlockDestination::Pipelines => "pipelines",
                };
                println!("{path}\t{} lines\t-> {destination}", body.lines().count());
            }
        }
        BlocksAction::Show { path } => {
            let body = session
                .pending_blocks
                .get(&path)
                .ok_or_else(|| anyhow!("No pending file named {path}"))?;
            println!("{body}");
        }
        BlocksAction::Raw => match &session.last_response {
            Some(raw) => println!("{raw}"),
            None => println!("Nothing generated yet."),
        },
        BlocksAction::Replace { path, from_file } => {
            if !session.pending_blocks.contains(&path) && header_path(&path).is_none() {
                bail!("{path} is neither pending nor a .tf/.tfvars/.yml/.yaml path");
            }
            let content = std::fs::read_to_string(&from_file)
                .with_context(|| format!("Failed to read {}", from_file.display()))?;
            session.pending_blocks.insert(&path, content);
            println!("Updated {path}");
        }
        BlocksAction::Save { path } => {
            let selected: Vec<String> = match path {
                Some(path) if session.pending_blocks.contains(&path) => vec![path],
                Some(path) => bail!("No pending file named {path}"),
                None => session.pending_blocks.paths().map(str::to_string).collect(),
            };
            save_blocks(&config.layout(), session, &selected)?;
        }
    }
    Ok(())
}

fn save_blocks(
    layout: &ProjectLayout,
    session: &mut SessionContext,
    paths: &[String],
) -> Result<()> {
    for path in paths {
        let Some(body) = session.pending_blocks.get(path) else {
            continue;
        };
        let written = layout
            .save_block(path, body)
            .with_context(|| format!("Failed to save {path}"))?;
        session.pending_blocks.remove(path);
        println!("Saved: {}", relative(layout.base_dir(), &written));
    }
    Ok(())
}

async fn cmd_tf(config: &CockpitConfig, action: TfAction, timeout_secs: Option<u64>) -> Result<()> {
    let layout = config.layout();
    let command = match action {
        TfAction::VarFiles => {
            for name in layout.var_files()? {
                println!("{name}");
            }
            return Ok(());
        }
        TfAction::Fmt => ProvisionCommand::Fmt,
        TfAction::Validate => ProvisionCommand::Validate,
        TfAction::Plan { var_file } => ProvisionCommand::Plan { var_file },
        TfAction::Apply { var_file } => ProvisionCommand::Apply { var_file },
        TfAction::Destroy { var_file } => ProvisionCommand::Destroy { var_file },
    };

    layout.ensure_dirs()?;
    let mut runner =
        TerraformRunner::new(layout.terraform_dir()).with_binary(&config.terraform_bin);
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }

    let output = runner.run(&command).await?;
    println!("{}", output.output.trim_end());
    if !output.success {
        bail!("terraform {} exited with code {}", output.command, output.exit_code);
    }
    Ok(())
}

fn cmd_deploy_workflows(config: &CockpitConfig) -> Result<()> {
    let layout = config.layout();
    let copied = layout.deploy_workflows()?;
    if copied.is_empty() {
        println!("No workflow files found to deploy.");
        return Ok(());
    }
    for path in &copied {
        println!("Deployed: {}", relative(layout.base_dir(), path));
    }
    println!("Commit them with `cockpit push`.");
    Ok(())
}

fn sync_request(args: &PushArgs, config: &CockpitConfig, session: &SessionContext) -> SyncRequest {
    let branch = args
        .branch
        .clone()
        .or_else(|| session.branch.clone())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    let mut request = SyncRequest::new(&branch, &args.message).with_credentials(
        args.username.as_deref().unwrap_or_default(),
        args.token
            .as_deref()
            .or(config.github_token.as_deref())
            .unwrap_or_default(),
    );
    if !args.files.is_empty() {
        request = request.with_files(args.files.clone());
    }
    if let Some(remote) = args.remote.as_deref().or(session.remote_url.as_deref()) {
        request = request.with_remote_url(remote);
    }
    request
}

fn cmd_push(config: &CockpitConfig, session: &mut SessionContext, args: &PushArgs) -> Result<()> {
    let vcs = working_copy(config);
    let request = sync_request(args, config, session);
    let report = RepositorySynchronizer::new(&vcs).sync_and_push(&request);

    for warning in &report.warnings {
        warn!("{warning}");
    }
    if !report.is_success() {
        bail!("{report}");
    }

    println!("{report}");
    session.branch = Some(request.branch.clone());
    if let Some(remote) = &args.remote {
        session.remote_url = Some(clean_remote_url(remote));
    }
    Ok(())
}

/// Owner/repository from the flags, falling back to the `origin` remote.
fn resolve_repo(config: &CockpitConfig, args: &RepoArgs) -> Result<(String, String)> {
    if let (Some(owner), Some(repo)) = (&args.owner, &args.repo) {
        return Ok((owner.clone(), repo.clone()));
    }

    let url = working_copy(config)
        .remote_url(ORIGIN)?
        .ok_or_else(|| anyhow!("No {ORIGIN} remote; pass --owner and --repo"))?;
    let remote = parse_remote(&url)
        .ok_or_else(|| anyhow!("Cannot derive owner/repo from {}", redact(&url)))?;
    Ok((
        args.owner.clone().unwrap_or(remote.owner),
        args.repo.clone().unwrap_or(remote.repository),
    ))
}

fn resolve_token(config: &CockpitConfig, args: &RepoArgs) -> String {
    args.token
        .clone()
        .or_else(|| config.github_token.clone())
        .unwrap_or_default()
}

fn default_branch(session: &SessionContext) -> String {
    session
        .branch
        .clone()
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
}

async fn cmd_pr(config: &CockpitConfig, session: &SessionContext, action: PrAction) -> Result<()> {
    let forge = Forge::connect(&config.github_api_url)?;
    match action {
        PrAction::Open {
            repo,
            source,
            base,
            title,
            body,
        } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            let source = source.unwrap_or_else(|| default_branch(session));
            let title = title.unwrap_or_else(|| format!("Auto PR from {source}"));
            let draft = PullRequestDraft::new(&source, &base, &title).with_body(&body);

            let url = forge
                .pulls
                .open(&owner, &name, &draft, &resolve_token(config, &repo))
                .await
                .context("Pull request creation failed")?;
            println!("Pull request created: {url}");
        }
        PrAction::Merge { repo, number } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            forge
                .pulls
                .merge(&owner, &name, number, &resolve_token(config, &repo))
                .await
                .with_context(|| format!("Merging pull request #{number} failed"))?;
            println!("Pull request #{number} merged");
        }
    }
    Ok(())
}

async fn resolve_workflow(
    forge: &Forge,
    session: &mut SessionContext,
    owner: &str,
    repo: &str,
    token: &str,
    selector: &str,
) -> Result<u64> {
    if let Some(id) = session.resolve_workflow(selector) {
        return Ok(id);
    }
    session.definitions = forge.pipelines.list_definitions(owner, repo, token).await?;
    session
        .resolve_workflow(selector)
        .ok_or_else(|| anyhow!("Unknown workflow: {selector}"))
}

/// Cancellation signal flipped by Ctrl-C.
fn ctrl_c_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            tx.send(true).ok();
        }
    });
    rx
}

async fn cmd_ci(
    config: &CockpitConfig,
    session: &mut SessionContext,
    action: CiAction,
) -> Result<()> {
    let forge = Forge::connect(&config.github_api_url)?;
    match action {
        CiAction::List { repo } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            let definitions = forge
                .pipelines
                .list_definitions(&owner, &name, &resolve_token(config, &repo))
                .await
                .context("Listing workflows failed")?;
            if definitions.is_empty() {
                println!("No workflows defined.");
            }
            for definition in &definitions {
                println!("{}\t{}", definition.id, definition.name);
            }
            session.definitions = definitions;
        }
        CiAction::Trigger {
            repo,
            workflow,
            git_ref,
        } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            let token = resolve_token(config, &repo);
            let id = resolve_workflow(&forge, session, &owner, &name, &token, &workflow).await?;
            let git_ref = git_ref.unwrap_or_else(|| default_branch(session));

            forge
                .pipelines
                .trigger(&owner, &name, id, &git_ref, &token)
                .await
                .context("Triggering workflow failed")?;
            println!("Triggered workflow {workflow} on {git_ref}");
        }
        CiAction::Watch {
            repo,
            workflow,
            poll,
        } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            let token = resolve_token(config, &repo);
            let id = resolve_workflow(&forge, session, &owner, &name, &token, &workflow).await?;

            let state = forge
                .pipelines
                .poll_until_complete(
                    &owner,
                    &name,
                    id,
                    &token,
                    &poll.policy(),
                    &mut ctrl_c_signal(),
                )
                .await?;
            if !state.is_success() {
                bail!("CI/CD failed ({state})");
            }
            println!("CI/CD passed");
        }
        CiAction::Deliver {
            repo,
            workflow,
            git_ref,
            merge_pr,
            poll,
        } => {
            let (owner, name) = resolve_repo(config, &repo)?;
            let token = resolve_token(config, &repo);
            let workflow_id =
                resolve_workflow(&forge, session, &owner, &name, &token, &workflow).await?;
            let request = DeliveryRequest {
                owner,
                repo: name,
                workflow_id,
                git_ref: git_ref.unwrap_or_else(|| default_branch(session)),
                merge_pr,
            };

            let report = forge
                .deliver(&request, &token, &poll.policy(), &mut ctrl_c_signal())
                .await?;
            if !report.run.is_success() {
                bail!("CI/CD failed ({})", report.run);
            }
            println!("CI/CD passed");
            if let (true, Some(number)) = (report.merged, merge_pr) {
                println!("Pull request #{number} merged");
            }
        }
    }
    Ok(())
}

fn relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
