use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use waymark::dispatch::{self, RenderContext, RenderEvent};
use waymark::index::{self, RelatedIndex};
use waymark::repository::ContentRepository;
use waymark::store::JsonStore;
use waymark::types::{Channel, GenerationVersion};
use waymark::urls::SiteUrls;
use waymark::{config, output, related};

/// Shared flags for commands that read the reverse index.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the existing reverse index and rescan every record
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "waymark")]
#[command(about = "Bracket-code cross-references for a static personal site")]
#[command(long_about = "\
Bracket-code cross-references for a static personal site

Content records are JSON files. Their body, summary and update notes may
refer to other content with bracket codes:

  {{pointlink 11111111-1111-1111-1111-111111111111; text the trailhead;}}
  {{photo 22222222-2222-2222-2222-222222222222; Dawn on the ridge}}
  {{photogallerypage;}}

Site layout:

  site/
  ├── config.toml                  # Site config (optional)
  ├── .waymark-related.json        # Reverse index (written by 'index')
  └── content/
      ├── points/trailhead.json    # One record per file...
      └── photos/2024-03.json      # ...or an array of records

Channels:
  site   Responsive figures, lazy-loaded maps
  email  Inline-styled figures, map codes removed
  local  Like site, pictures from the local media root

Run 'waymark gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root (holds config.toml)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Site,
    Email,
    Local,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Site => Channel::Site,
            ChannelArg::Email => Channel::Email,
            ChannelArg::Local => Channel::LocalDisplay,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the bracket codes in a text file for one channel
    Render {
        /// Text or markdown file to render
        file: PathBuf,
        #[arg(long, value_enum, default_value = "site")]
        channel: ChannelArg,
        /// Convert the processed text from markdown to HTML
        #[arg(long)]
        markdown: bool,
    },
    /// List the content related to one record
    Related {
        content_id: Uuid,
        /// Use reverse-index edges from this generation instead of a live scan
        #[arg(long)]
        generation: Option<GenerationVersion>,
    },
    /// Rebuild the reverse index for a generation
    Index {
        /// Generation version (defaults to now)
        #[arg(long)]
        generation: Option<GenerationVersion>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Report bracket codes that would not resolve
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let site_config = config::load_config(&cli.root)?;
    init_thread_pool(&site_config.processing);
    let index_path = site_config.index_path(&cli.root);
    let urls = SiteUrls::new(&site_config, &cli.root);

    match cli.command {
        Command::Render {
            file,
            channel,
            markdown,
        } => {
            let store = load_store(&site_config, &cli.root, &index_path)?;
            let text = std::fs::read_to_string(&file)?;
            let (tx, printer) = spawn_printer();
            let result = {
                let ctx = RenderContext::new(&store, &urls)
                    .with_progress(&tx)
                    .with_options((&site_config).into());
                dispatch::process_codes(&ctx, &text, channel.into()).await
            };
            drop(tx);
            printer.join().ok();
            let rendered = result?;
            if markdown {
                print!("{}", markdown_to_html(&rendered));
            } else {
                print!("{}", rendered);
            }
        }
        Command::Related {
            content_id,
            generation,
        } => {
            let store = load_store(&site_config, &cli.root, &index_path)?;
            let Some(item) = store.get(content_id) else {
                return Err(format!("no content with id {content_id}").into());
            };
            let (tx, printer) = spawn_printer();
            let result = {
                let ctx = RenderContext::new(&store, &urls)
                    .with_progress(&tx)
                    .with_options((&site_config).into());
                related::related_entries(&ctx, item, generation).await
            };
            drop(tx);
            printer.join().ok();
            let entries = result?;
            output::print_related_output(&entries);
        }
        Command::Index { generation, cache } => {
            let store = JsonStore::load(&site_config.content_dir(&cli.root))?;
            let version = generation.unwrap_or_else(GenerationVersion::now);
            let previous = if cache.no_cache {
                RelatedIndex::empty()
            } else {
                RelatedIndex::load(&index_path)
            };
            let (built, stats) = index::build_generation_index(&store, version, &previous).await?;
            built.save(&index_path)?;
            output::print_index_output(&stats, &version.to_string(), &index_path);
        }
        Command::Check => {
            let store = load_store(&site_config, &cli.root, &index_path)?;
            let records = store.all_content().await?;
            let ctx = RenderContext::new(&store, &urls).with_options((&site_config).into());
            let mut problems = Vec::new();
            for record in &records {
                let dangling = dispatch::dangling_references(&ctx, &record.searchable_text()).await?;
                if !dangling.is_empty() {
                    problems.push((record, dangling));
                }
            }
            output::print_check_output(&records, &problems);
            if !problems.is_empty() {
                return Err("dangling references found".into());
            }
        }
        Command::GenConfig => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Install the stderr `tracing` subscriber. `WAYMARK_LOG` wins over
/// `RUST_LOG`; both default to `warn`.
fn init_tracing() {
    let filter = std::env::var("WAYMARK_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn load_store(
    site_config: &config::SiteConfig,
    root: &Path,
    index_path: &Path,
) -> Result<JsonStore, Box<dyn std::error::Error>> {
    let store = JsonStore::load(&site_config.content_dir(root))?;
    Ok(store.with_index(RelatedIndex::load(index_path)))
}

/// Progress channel whose events a printer thread writes to stderr, keeping
/// stdout for the command's result. The thread exits once the sender is
/// dropped.
fn spawn_printer() -> (Sender<RenderEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_render_event(&event) {
                eprintln!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn markdown_to_html(text: &str) -> String {
    let parser = pulldown_cmark::Parser::new_ext(text, pulldown_cmark::Options::all());
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}
