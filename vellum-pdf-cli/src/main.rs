use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vellum_pdf::images::{compress_pdf_with_progress, CompressOptions, CompressionPreset, ImageCrateCodec};
use vellum_pdf::operations::{
    images_to_document, merge_documents, split_document, watermark_image, watermark_text, MergeOptions,
    PageSize, SplitMode, WatermarkOptions,
};
use vellum_pdf::page_tree::{extract_pages, remove_pages, rotate_pages};
use vellum_pdf::{
    decrypt, encrypt, Color, Document, EncryptionAlgorithm, EncryptionOptions, ImageXObject, PageRange,
    Permissions, WriterConfig,
};

#[derive(Parser)]
#[command(name = "vellum", about = "Merge, split, watermark, compress and encrypt PDF files", version, author)]
struct Cli {
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output file (a directory when compressing several inputs)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Password for encrypted inputs
    #[arg(long, global = true)]
    password: Option<String>,

    /// Write object streams and a compressed xref stream
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, page count, metadata and encryption of a PDF
    Info {
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge PDFs into one, in the order given
    Merge {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,

        /// Page range per file, in order (e.g. "all", "1-3", "2,5-")
        #[arg(short, long)]
        pages: Vec<String>,
    },

    /// Split a PDF into several files
    Split {
        input: PathBuf,

        /// Output file name pattern; {} becomes the part number
        #[arg(long, default_value = "part_{}.pdf")]
        pattern: String,

        #[arg(short, long, value_enum, default_value = "pages")]
        mode: SplitKind,

        /// Chunk size, ranges ("1-3;4-") or split points ("4,8") depending on the mode
        #[arg(long)]
        spec: Option<String>,
    },

    /// Copy selected pages into a new PDF
    Extract {
        input: PathBuf,

        #[arg(short, long)]
        pages: String,
    },

    /// Delete selected pages
    Remove {
        input: PathBuf,

        #[arg(short, long)]
        pages: String,
    },

    /// Rotate pages clockwise
    Rotate {
        input: PathBuf,

        /// Multiple of 90, may be negative
        #[arg(short, long, default_value = "90", allow_hyphen_values = true)]
        angle: i32,

        #[arg(short, long, default_value = "all")]
        pages: String,
    },

    /// Recompress images toward a target size reduction
    Compress {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, default_value = "medium")]
        preset: CompressionPreset,

        /// Target reduction in percent, overriding the preset's
        #[arg(long)]
        target: Option<f64>,

        #[arg(long, default_value = "3")]
        attempts: u32,
    },

    /// Stamp text or an image on pages
    Watermark {
        input: PathBuf,

        #[arg(short, long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,

        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, default_value = "0.3")]
        opacity: f64,

        /// Counterclockwise, in degrees
        #[arg(long, default_value = "45", allow_hyphen_values = true)]
        rotation: f64,

        #[arg(long, default_value = "48")]
        font_size: f64,

        /// Hex color such as "#ff0000"
        #[arg(long)]
        color: Option<Color>,

        #[arg(short, long, default_value = "all")]
        pages: String,
    },

    /// Protect a PDF with passwords
    Encrypt {
        input: PathBuf,

        #[arg(long, default_value = "")]
        user_password: String,

        #[arg(long)]
        owner_password: String,

        #[arg(long, value_enum, default_value = "aes-256")]
        algorithm: Algorithm,

        #[arg(long)]
        no_print: bool,

        #[arg(long)]
        no_copy: bool,

        #[arg(long)]
        no_modify: bool,
    },

    /// Remove encryption using the user or owner password
    Decrypt { input: PathBuf },

    /// Build a PDF with one page per image
    ImagesToPdf {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[arg(long, value_enum, default_value = "natural")]
        page_size: PageSizeKind,

        /// Resolution used for natural page sizes
        #[arg(long, default_value = "72")]
        dpi: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitKind {
    Pages,
    Chunks,
    Ranges,
    At,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    #[value(name = "rc4-40")]
    Rc4_40,
    #[value(name = "rc4-128")]
    Rc4_128,
    #[value(name = "aes-128")]
    Aes128,
    #[value(name = "aes-256")]
    Aes256,
}

impl From<Algorithm> for EncryptionAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Rc4_40 => EncryptionAlgorithm::Rc4_40,
            Algorithm::Rc4_128 => EncryptionAlgorithm::Rc4_128,
            Algorithm::Aes128 => EncryptionAlgorithm::Aes128,
            Algorithm::Aes256 => EncryptionAlgorithm::Aes256,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PageSizeKind {
    Natural,
    A4,
    Letter,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "vellum=debug,vellum_pdf=debug"
    } else {
        "vellum=info,vellum_pdf=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Settings every subcommand shares
struct Session {
    output: Option<PathBuf>,
    password: Option<String>,
    writer: WriterConfig,
}

impl Session {
    fn open(&self, path: &Path) -> Result<Document> {
        let mut doc = Document::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        if doc.is_locked() {
            let password = self
                .password
                .as_deref()
                .with_context(|| format!("{} is encrypted; pass --password", path.display()))?;
            unlock(&mut doc, password, path)?;
        }
        Ok(doc)
    }

    fn output(&self) -> Result<&Path> {
        self.output.as_deref().context("this command needs -o/--output")
    }

    fn save(&self, doc: &Document) -> Result<()> {
        let path = self.output()?;
        doc.save_with_config(path, &self.writer)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {} ({} pages)", path.display(), doc.page_count()?);
        Ok(())
    }
}

/// Decrypts a locked input so it can be edited. Outputs are written without
/// encryption.
fn unlock(doc: &mut Document, password: &str, path: &Path) -> Result<()> {
    decrypt(doc, password).with_context(|| format!("cannot unlock {}", path.display()))?;
    tracing::warn!("{} was encrypted; the output is not", path.display());
    Ok(())
}

fn page_range(text: &str) -> Result<PageRange> {
    PageRange::parse(text).with_context(|| format!("invalid page range '{text}'"))
}

fn page_indices(doc: &Document, text: &str) -> Result<Vec<usize>> {
    Ok(page_range(text)?.indices(doc.page_count()?)?)
}

fn split_mode(kind: SplitKind, spec: Option<&str>) -> Result<SplitMode> {
    let needs_spec = || spec.context("this split mode needs --spec");
    Ok(match kind {
        SplitKind::Pages => SplitMode::SinglePages,
        SplitKind::Chunks => SplitMode::ChunkSize(needs_spec()?.trim().parse().context("chunk size must be a number")?),
        SplitKind::Ranges => SplitMode::Ranges(needs_spec()?.split(';').map(page_range).collect::<Result<_>>()?),
        SplitKind::At => SplitMode::SplitAt(
            needs_spec()?
                .split(',')
                .map(|page| {
                    let page: usize = page.trim().parse().context("split points are page numbers")?;
                    Ok(page.saturating_sub(1))
                })
                .collect::<Result<_>>()?,
        ),
    })
}

fn info(session: &Session, input: &Path, json: bool) -> Result<()> {
    let mut doc = Document::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    if doc.is_locked() {
        if let Some(password) = session.password.as_deref() {
            decrypt(&mut doc, password).context("incorrect password")?;
        }
    }
    let summary = doc.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File: {}", input.display());
    println!("PDF version: {}", summary.version);
    match summary.page_count {
        Some(count) => println!("Pages: {count}"),
        None => println!("Pages: unknown (locked)"),
    }
    println!("Objects: {}", summary.object_count);
    let fields = [
        ("Title", summary.title.as_deref()),
        ("Author", summary.author.as_deref()),
        ("Producer", summary.producer.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{label}: {value}");
        }
    }
    if let Some(created) = summary.creation_date {
        println!("Created: {}", created.to_rfc3339());
    }
    if let Some(modified) = summary.modification_date {
        println!("Modified: {}", modified.to_rfc3339());
    }
    match &summary.security {
        Some(security) => {
            println!(
                "Encryption: {} (revision {}){}",
                security.method,
                security.revision,
                if security.locked { ", locked" } else { "" }
            );
            let permissions = security.permissions;
            println!(
                "Permissions: print={:?} modify={} copy={} annotate={}",
                permissions.print, permissions.modify, permissions.copy, permissions.annotate
            );
        }
        None => println!("Encryption: none"),
    }
    Ok(())
}

/// Compresses every input on the blocking pool, one document per task.
async fn compress(session: &Session, inputs: Vec<PathBuf>, options: CompressOptions) -> Result<()> {
    let several = inputs.len() > 1;
    if several {
        if let Some(dir) = session.output.as_deref() {
            std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
    }

    let mut tasks = tokio::task::JoinSet::new();
    for input in inputs {
        let destination = match (session.output.as_deref(), several) {
            (Some(path), false) => path.to_path_buf(),
            (dir, _) => {
                let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
                let name = format!("{stem}.compressed.pdf");
                match dir {
                    Some(dir) => dir.join(name),
                    None => input.with_file_name(name),
                }
            }
        };
        let options = options.clone();
        tasks.spawn_blocking(move || -> Result<(PathBuf, f64)> {
            let data = std::fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
            let codec = ImageCrateCodec::new();
            let outcome = compress_pdf_with_progress(&data, &codec, &options, |progress| {
                tracing::debug!(
                    "{}: attempt {} image {}/{}",
                    input.display(),
                    progress.attempt,
                    progress.index + 1,
                    progress.total
                );
                ControlFlow::Continue(())
            })
            .with_context(|| format!("failed to compress {}", input.display()))?;
            for skipped in &outcome.report.skipped {
                tracing::warn!("{}: image {} skipped: {}", input.display(), skipped.object_number, skipped.reason);
            }
            std::fs::write(&destination, &outcome.bytes)
                .with_context(|| format!("failed to write {}", destination.display()))?;
            Ok((destination, outcome.report.reduction))
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("compression task panicked")? {
            Ok((path, reduction)) => println!("Wrote {} ({:.1}% smaller)", path.display(), reduction * 100.0),
            Err(e) => {
                failures += 1;
                eprintln!("Error: {e:#}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} file(s) could not be compressed");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session {
        output: cli.output,
        password: cli.password,
        writer: if cli.compact {
            WriterConfig::compact()
        } else {
            WriterConfig::default()
        },
    };

    match cli.command {
        Commands::Info { input, json } => info(&session, &input, json)?,

        Commands::Merge { files, pages } => {
            if pages.len() > files.len() {
                bail!("{} page ranges given for {} files", pages.len(), files.len());
            }
            let docs = files.iter().map(|path| session.open(path)).collect::<Result<Vec<_>>>()?;
            let options = MergeOptions {
                page_ranges: pages.iter().map(|text| page_range(text).map(Some)).collect::<Result<_>>()?,
                ..MergeOptions::default()
            };
            let inputs: Vec<&Document> = docs.iter().collect();
            session.save(&merge_documents(&inputs, &options)?)?;
        }

        Commands::Split {
            input,
            pattern,
            mode,
            spec,
        } => {
            if !pattern.contains("{}") {
                bail!("pattern must contain {{}}");
            }
            let doc = session.open(&input)?;
            let parts = split_document(&doc, &split_mode(mode, spec.as_deref())?)?;
            let dir = session.output.clone().unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
            for (number, part) in parts.iter().enumerate() {
                let path = dir.join(pattern.replace("{}", &(number + 1).to_string()));
                part.save_with_config(&path, &session.writer)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote {} ({} pages)", path.display(), part.page_count()?);
            }
        }

        Commands::Extract { input, pages } => {
            let doc = session.open(&input)?;
            let indices = page_indices(&doc, &pages)?;
            session.save(&extract_pages(&doc, &indices)?)?;
        }

        Commands::Remove { input, pages } => {
            let mut doc = session.open(&input)?;
            let indices: BTreeSet<usize> = page_indices(&doc, &pages)?.into_iter().collect();
            remove_pages(&mut doc, &indices)?;
            session.save(&doc)?;
        }

        Commands::Rotate { input, angle, pages } => {
            let mut doc = session.open(&input)?;
            let indices = page_indices(&doc, &pages)?;
            rotate_pages(&mut doc, &indices, angle)?;
            session.save(&doc)?;
        }

        Commands::Compress {
            inputs,
            preset,
            target,
            attempts,
        } => {
            let mut options = CompressOptions::new(preset)
                .with_max_attempts(attempts)
                .with_writer(session.writer.clone());
            if let Some(percent) = target {
                options = options.with_target_percent(percent);
            }
            compress(&session, inputs, options).await?;
        }

        Commands::Watermark {
            input,
            text,
            image,
            opacity,
            rotation,
            font_size,
            color,
            pages,
        } => {
            let mut doc = session.open(&input)?;
            let mut options = WatermarkOptions::default()
                .with_pages(page_range(&pages)?)
                .with_opacity(opacity)
                .with_rotation(rotation)
                .with_font_size(font_size);
            if let Some(color) = color {
                options = options.with_color(color);
            }
            let stamped = match (text, image) {
                (Some(text), _) => watermark_text(&mut doc, &text, &options)?,
                (None, Some(path)) => {
                    let data = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
                    let image = ImageXObject::load(data, Some(&ImageCrateCodec::new()))?;
                    watermark_image(&mut doc, &image, &options)?
                }
                (None, None) => bail!("give --text or --image"),
            };
            tracing::info!("watermarked {stamped} pages");
            session.save(&doc)?;
        }

        Commands::Encrypt {
            input,
            user_password,
            owner_password,
            algorithm,
            no_print,
            no_copy,
            no_modify,
        } => {
            let mut doc = session.open(&input)?;
            let mut permissions = Permissions::all().with_copy(!no_copy).with_modify(!no_modify);
            if no_print {
                permissions = permissions.with_print(vellum_pdf::encryption::PrintPermission::None);
            }
            let options = EncryptionOptions::new(algorithm.into());
            let permissions = permissions.fitted_to(options.algorithm.revision());
            encrypt(&mut doc, &user_password, &owner_password, &permissions, &options)?;
            session.save(&doc)?;
        }

        Commands::Decrypt { input } => {
            let mut doc =
                Document::open(&input).with_context(|| format!("failed to open {}", input.display()))?;
            if !doc.is_encrypted() {
                bail!("{} is not encrypted", input.display());
            }
            let password = session.password.as_deref().unwrap_or("");
            decrypt(&mut doc, password).context("incorrect password")?;
            session.save(&doc)?;
        }

        Commands::ImagesToPdf { images, page_size, dpi } => {
            let codec = ImageCrateCodec::new();
            let loaded = images
                .iter()
                .map(|path| {
                    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
                    ImageXObject::load(data, Some(&codec)).with_context(|| format!("unsupported image {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            let size = match page_size {
                PageSizeKind::Natural => PageSize::Natural { dpi },
                PageSizeKind::A4 => PageSize::A4,
                PageSizeKind::Letter => PageSize::LETTER,
            };
            session.save(&images_to_document(&loaded, size)?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
