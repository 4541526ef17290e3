use annotation_model::{AnnotationId, AnnotationType, Author, FileVersionId, Location, NewAnnotation, ThreadId};
use annotation_store::{AnnotationStore, FileStore, StoreError};
use annotator::{locate_page, to_document_space, PageGeometryProvider, Rect, ScreenPoint};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::executor::block_on;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "annotations-cli")]
#[command(about = "Point annotations CLI")]
pub struct Cli {
    /// Directory holding annotation files (defaults to the user data dir).
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every thread of a file version as JSON.
    List {
        #[arg(value_name = "FILE_VERSION")]
        file_version: String,
    },
    /// Add a comment, starting a new thread unless --thread is given.
    Add {
        #[arg(value_name = "FILE_VERSION")]
        file_version: String,
        #[arg(long)]
        page: u32,
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
        #[arg(long)]
        text: String,
        #[arg(long, value_name = "THREAD_ID")]
        thread: Option<String>,
        #[arg(long, value_name = "NAME")]
        author: Option<String>,
    },
    /// Delete one comment. Deleting a missing comment is not an error.
    Delete {
        #[arg(value_name = "FILE_VERSION")]
        file_version: String,
        #[arg(value_name = "ANNOTATION_ID")]
        annotation_id: String,
    },
    /// Convert a click on a rendered page into document units.
    Locate {
        #[arg(long, allow_negative_numbers = true)]
        page_top: f64,
        #[arg(long, allow_negative_numbers = true)]
        page_left: f64,
        #[arg(long)]
        page_height: f64,
        /// Rendered page width, unbounded when omitted.
        #[arg(long)]
        page_width: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(value_name = "CLIENT_X", allow_negative_numbers = true)]
        client_x: f64,
        #[arg(value_name = "CLIENT_Y", allow_negative_numbers = true)]
        client_y: f64,
    },
    /// Print CLI version.
    Version,
}

/// The one page `locate` knows about, reported under its real page number.
struct SinglePage {
    page: u32,
    rect: Rect,
}

impl PageGeometryProvider for SinglePage {
    fn page_count(&self) -> u32 {
        self.page
    }

    fn bounding_rect_for(&self, page: u32) -> Option<Rect> {
        (page == self.page).then_some(self.rect)
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::List { file_version } => run_list(&open_store(cli.store)?, &file_version),
        Commands::Add { file_version, page, x, y, text, thread, author } => {
            let request = AddRequest { page, x, y, text, thread, author };
            run_add(&open_store(cli.store)?, &file_version, request)
        }
        Commands::Delete { file_version, annotation_id } => {
            run_delete(&open_store(cli.store)?, &file_version, &annotation_id)
        }
        Commands::Locate {
            page_top,
            page_left,
            page_height,
            page_width,
            page,
            scale,
            client_x,
            client_y,
        } => {
            let width = page_width.unwrap_or(f64::INFINITY);
            let rect = Rect::new(page_left, page_top, width, page_height);
            run_locate(SinglePage { page, rect }, scale, ScreenPoint::new(client_x, client_y))
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_store(root: Option<PathBuf>) -> Result<FileStore> {
    match root {
        Some(root) => Ok(FileStore::with_root(root)),
        None => FileStore::from_default_project().context("failed to locate the data directory"),
    }
}

fn run_list(store: &FileStore, file_version: &str) -> Result<()> {
    let file_version_id = FileVersionId::new(file_version);
    let threads = block_on(store.get_thread_map(&file_version_id))
        .with_context(|| format!("failed to load annotations for {file_version_id}"))?;

    log::debug!("{} threads in {}", threads.len(), store.document_path(&file_version_id).display());
    println!("{}", serde_json::to_string_pretty(&threads)?);
    Ok(())
}

struct AddRequest {
    page: u32,
    x: f64,
    y: f64,
    text: String,
    thread: Option<String>,
    author: Option<String>,
}

fn run_add(store: &FileStore, file_version: &str, request: AddRequest) -> Result<()> {
    if request.page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    let text = request.text.trim();
    if text.is_empty() {
        anyhow::bail!("comment text is empty");
    }

    let author = match request.author {
        Some(name) => Author::new(name.clone(), name),
        None => Author::anonymous(),
    };
    let thread_id = request.thread.map(ThreadId::new);
    let location = Location::new(request.x, request.y, request.page);

    let annotation = block_on(store.create(
        &FileVersionId::new(file_version),
        thread_id.as_ref(),
        location,
        AnnotationType::Point,
        NewAnnotation::new(text, author),
    ))
    .context("failed to save annotation")?;

    println!("{}", serde_json::to_string_pretty(&annotation)?);
    Ok(())
}

fn run_delete(store: &FileStore, file_version: &str, annotation_id: &str) -> Result<()> {
    let annotation_id = AnnotationId::new(annotation_id);

    match block_on(store.delete(&FileVersionId::new(file_version), &annotation_id)) {
        Ok(()) => println!("deleted {annotation_id}"),
        Err(StoreError::NotFound(_)) => println!("not found {annotation_id}"),
        Err(error) => return Err(error).context("failed to delete annotation"),
    }
    Ok(())
}

fn run_locate(geometry: SinglePage, scale: f64, client: ScreenPoint) -> Result<()> {
    let Some(located) = locate_page(client, &geometry) else {
        anyhow::bail!("point ({}, {}) is outside the page", client.x, client.y);
    };

    let document = to_document_space(located.rect.relative(client), located.rect.height, scale)?;
    let location = Location::new(document.x, document.y, located.page);
    println!("{}", serde_json::to_string_pretty(&location)?);
    Ok(())
}
