//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use draftgate_publisher::pipeline::{self, NewsDraft, NewspicDraft, ProgressReporter};
use draftgate_shared::{
    AppConfig, CredentialOverrides, DraftgateError, RuntimeCredentials, config_file_path,
    init_config, load_config, resolve_credentials, save_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// draftgate — publish articles to an official-account draft box.
#[derive(Parser)]
#[command(
    name = "draftgate",
    version,
    about = "Turn a locally authored article into a submitted official-account draft.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Credential options shared by every network-facing subcommand.
///
/// Each value falls back to its environment variable, then to the persisted
/// config file.
#[derive(Args, Debug, Clone)]
pub(crate) struct CredentialOpts {
    /// Intermediary API base address (or DRAFTGATE_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Personal access token for the intermediary API (or DRAFTGATE_PAT).
    #[arg(long)]
    pat: Option<String>,

    /// Official-account app id (or WX_APPID).
    #[arg(long)]
    app_id: Option<String>,

    /// Official-account app secret (or WX_APPSECRET).
    #[arg(long)]
    app_secret: Option<String>,

    /// Request timeout in milliseconds, applied to every call this invocation.
    #[arg(long)]
    timeout: Option<u64>,
}

impl CredentialOpts {
    fn overrides(&self) -> CredentialOverrides {
        CredentialOverrides {
            base_url: self.base_url.clone(),
            pat: self.pat.clone(),
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Exchange app credentials for an access token and print the response.
    Token {
        #[command(flatten)]
        creds: CredentialOpts,
    },

    /// Upload photos as image material without creating a draft.
    Upload {
        /// Photo references: URLs, local paths, file:// URLs, or data: URIs.
        /// Comma-separated, or repeat the flag.
        #[arg(long, required = true)]
        photos: Vec<String>,

        #[command(flatten)]
        creds: CredentialOpts,
    },

    /// Create a rich-HTML draft (news).
    Draft {
        /// Draft title.
        #[arg(short, long)]
        title: String,

        /// HTML fragment used verbatim as the article body.
        #[arg(long, conflicts_with = "html_file")]
        html: Option<String>,

        /// Read the HTML fragment from a file.
        #[arg(long)]
        html_file: Option<PathBuf>,

        /// Photo references. Defaults to the images found in the body.
        #[arg(long)]
        photos: Vec<String>,

        #[command(flatten)]
        creds: CredentialOpts,
    },

    /// Create a text-plus-gallery draft (newspic).
    Newspic {
        /// Draft title.
        #[arg(short, long)]
        title: String,

        /// Text content, submitted untouched.
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read the text content from a file.
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Photo references. Defaults to the images found in the body.
        #[arg(long)]
        photos: Vec<String>,

        #[command(flatten)]
        creds: CredentialOpts,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show the persisted configuration.
    Show,
    /// Update persisted fields, leaving the rest untouched.
    Set {
        /// Intermediary API base address.
        #[arg(long)]
        base_url: Option<String>,

        /// Personal access token for the intermediary API.
        #[arg(long)]
        pat: Option<String>,

        /// Official-account app id.
        #[arg(long)]
        app_id: Option<String>,

        /// Official-account app secret.
        #[arg(long)]
        app_secret: Option<String>,

        /// Default request timeout in milliseconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "draftgate=info",
        1 => "draftgate=debug",
        _ => "draftgate=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Token { creds } => cmd_token(&creds).await,
        Command::Upload { photos, creds } => cmd_upload(&photos, &creds).await,
        Command::Draft {
            title,
            html,
            html_file,
            photos,
            creds,
        } => cmd_draft(title, html.as_deref(), html_file.as_deref(), &photos, &creds).await,
        Command::Newspic {
            title,
            content,
            content_file,
            photos,
            creds,
        } => {
            cmd_newspic(
                title,
                content.as_deref(),
                content_file.as_deref(),
                &photos,
                &creds,
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Set {
                base_url,
                pat,
                app_id,
                app_secret,
                timeout,
            } => cmd_config_set(base_url, pat, app_id, app_secret, timeout),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_token(creds_opts: &CredentialOpts) -> Result<()> {
    let creds = resolved_credentials(creds_opts)?;
    info!("exchanging app credentials for access token");

    let response = pipeline::fetch_token(&creds, creds_opts.timeout)
        .await
        .map_err(render)?;
    print_json(&response)
}

async fn cmd_upload(photos: &[String], creds_opts: &CredentialOpts) -> Result<()> {
    let photos = parse_photos(photos);
    let creds = resolved_credentials(creds_opts)?;

    info!(count = photos.len(), "uploading photo material");
    let progress = CliProgress::new();
    let result = pipeline::upload_photos(&creds, &photos, creds_opts.timeout, &progress)
        .await
        .map_err(render)?;
    progress.finish();

    print_json(&result)
}

async fn cmd_draft(
    title: String,
    html: Option<&str>,
    html_file: Option<&Path>,
    photos: &[String],
    creds_opts: &CredentialOpts,
) -> Result<()> {
    let body = read_text_input(html, html_file)?.ok_or_else(|| {
        eyre!("missing HTML body: pass --html or --html-file (submitted verbatim as the article content)")
    })?;

    let creds = resolved_credentials(creds_opts)?;
    let draft = NewsDraft {
        title,
        html: body,
        photos: parse_photos(photos),
    };

    info!(title = %draft.title, "creating news draft");
    let progress = CliProgress::new();
    let response = pipeline::publish_news(&creds, &draft, creds_opts.timeout, &progress)
        .await
        .map_err(render)?;
    progress.finish();

    print_json(&response)
}

async fn cmd_newspic(
    title: String,
    content: Option<&str>,
    content_file: Option<&Path>,
    photos: &[String],
    creds_opts: &CredentialOpts,
) -> Result<()> {
    let body = read_text_input(content, content_file)?
        .ok_or_else(|| eyre!("missing content: pass --content or --content-file"))?;

    let creds = resolved_credentials(creds_opts)?;
    let draft = NewspicDraft {
        title,
        content: body,
        photos: parse_photos(photos),
    };

    info!(title = %draft.title, "creating newspic draft");
    let progress = CliProgress::new();
    let response = pipeline::publish_newspic(&creds, &draft, creds_opts.timeout, &progress)
        .await
        .map_err(render)?;
    progress.finish();

    print_json(&response)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config().map_err(render)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config().map_err(render)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", config_file_path().map_err(render)?.display());
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_set(
    base_url: Option<String>,
    pat: Option<String>,
    app_id: Option<String>,
    app_secret: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let mut config = load_config().map_err(render)?;
    let mut changed = false;

    if let Some(v) = base_url {
        config.wx.base_url = v;
        changed = true;
    }
    if let Some(v) = pat {
        config.wx.pat = v;
        changed = true;
    }
    if let Some(v) = app_id {
        config.wx.app_id = v;
        changed = true;
    }
    if let Some(v) = app_secret {
        config.wx.app_secret = v;
        changed = true;
    }
    if let Some(v) = timeout {
        config.wx.timeout_ms = Some(v);
        changed = true;
    }

    if !changed {
        println!("No configuration updates provided.");
        return Ok(());
    }

    let path = save_config(&config).map_err(render)?;
    println!("Config updated at: {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolved_credentials(opts: &CredentialOpts) -> Result<RuntimeCredentials> {
    let config = load_config().map_err(render)?;
    resolve_credentials(&opts.overrides(), &config).map_err(render)
}

/// Convert a pipeline error into a report, appending remediation hints.
fn render(err: DraftgateError) -> color_eyre::eyre::Report {
    let hints = err.hints();
    if hints.is_empty() {
        return eyre!(err.to_string());
    }

    let mut message = err.to_string();
    for hint in hints {
        message.push_str("\n  fix: ");
        message.push_str(hint);
    }
    eyre!(message)
}

/// Flatten `--photos` values: comma-separated lists, except inline `data:`
/// payloads which contain commas and are taken whole.
fn parse_photos(values: &[String]) -> Vec<String> {
    let mut photos = Vec::new();
    for value in values {
        let value = value.trim();
        if value.starts_with("data:") {
            photos.push(value.to_string());
            continue;
        }
        photos.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    photos
}

/// Inline text, or the contents of a file when a path was given.
fn read_text_input(direct: Option<&str>, file: Option<&Path>) -> Result<Option<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
        return Ok(Some(content));
    }
    Ok(direct.map(str::to_string))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, current: usize, total: usize, name: &str) {
        self.spinner.set_message(format!("[{current}/{total}] {name}"));
    }

    fn photo_uploaded(&self, reference: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Uploaded [{current}/{total}] {reference}"));
    }
}
