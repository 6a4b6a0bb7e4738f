use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use chronicler_engine::config::{Config, MODEL_FAST};
use chronicler_engine::extract::Extractor;
use chronicler_engine::kb;
use chronicler_engine::llm::ChatClient;

/// Build a cumulative markdown knowledge base from Word documents.
#[derive(Parser)]
#[command(name = "chronicler", version, about)]
struct Args {
    /// Path to a Word document (.docx) to process
    document: Option<PathBuf>,

    /// Process all .docx files in this directory
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Scan the directory recursively for .docx files
    #[arg(short, long)]
    recursive: bool,

    /// Output directory for the knowledge base
    #[arg(short, long, default_value = "knowledge_base")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.document.is_none() && args.dir.is_none() {
        anyhow::bail!("Either provide a document path or use --dir to process a directory");
    }

    let config = Config::from_env()?;
    let client = ChatClient::new(config.base_url.clone(), config.api_key.clone());

    println!("Testing chat backend connection...");
    if let Err(e) = client.ping(MODEL_FAST).await {
        eprintln!("Failed to connect to the chat backend: {e:#}");
        eprintln!("Please check your API key and internet connection.");
        return Err(e);
    }
    println!("Connection successful.\n");

    std::fs::create_dir_all(&args.output)?;
    let extractor = Extractor::new(&client, &config);

    if let Some(dir) = &args.dir {
        run_directory(&extractor, dir, args.recursive, &args.output).await
    } else {
        let document = args.document.as_ref().unwrap();
        if !document.exists() {
            anyhow::bail!("Document not found: {}", document.display());
        }
        if !try_process(&extractor, document, &args.output).await {
            anyhow::bail!("Document processing failed");
        }
        println!("\nSuccessfully processed document");
        print_location(&args.output);
        Ok(())
    }
}

async fn run_directory(
    extractor: &Extractor<'_>,
    dir: &Path,
    recursive: bool,
    output: &Path,
) -> Result<()> {
    let docx_files = kb::find_docx_files(dir, recursive);
    if docx_files.is_empty() {
        anyhow::bail!("No .docx files found in {}", dir.display());
    }

    println!("Found {} document(s) to process:", docx_files.len());
    for (i, file) in docx_files.iter().enumerate() {
        println!("   {}. {}", i + 1, file_name(file));
    }

    let response = prompt(&format!(
        "\nProcess all {} document(s)? (y=yes all, n=no, e=each, or enter number): ",
        docx_files.len()
    ))?;

    if response == "n" {
        println!("Cancelled, no documents processed");
        return Ok(());
    }

    if !response.is_empty() && response.chars().all(|c| c.is_ascii_digit()) {
        let number: usize = response.parse()?;
        if !(1..=docx_files.len()).contains(&number) {
            anyhow::bail!(
                "Invalid document number. Please enter a number between 1 and {}",
                docx_files.len()
            );
        }
        let document = &docx_files[number - 1];
        println!("Processing only document #{number}: {}\n", file_name(document));
        if !try_process(extractor, document, output).await {
            anyhow::bail!("Document processing failed");
        }
        println!("\nSuccessfully processed 1 document");
        print_location(output);
        return Ok(());
    }

    let mut processed = 0;
    if response == "e" {
        for document in &docx_files {
            let confirm = prompt(&format!("\nProcess {}? (y/n): ", file_name(document)))?;
            if confirm == "y" && try_process(extractor, document, output).await {
                processed += 1;
            }
        }
    } else {
        for document in &docx_files {
            if try_process(extractor, document, output).await {
                processed += 1;
            }
        }
    }

    println!(
        "\nSuccessfully processed {processed}/{} documents",
        docx_files.len()
    );
    print_location(output);
    Ok(())
}

/// Per-document failures are logged and absorbed so one broken file cannot
/// take down the rest of the batch.
async fn try_process(extractor: &Extractor<'_>, document: &Path, output: &Path) -> bool {
    match extractor.process_document(document, output).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                document = %document.display(),
                error = %format!("{e:#}"),
                "failed to process document"
            );
            false
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

fn print_location(output: &Path) {
    let location = output
        .canonicalize()
        .unwrap_or_else(|_| output.to_path_buf());
    println!("Knowledge base location: {}", location.display());
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
