//! pager – command-line content stream → PDF exporter.
//!
//! Usage:
//!   pager <input.json> [output.pdf] [--landscape] [--title "Chat"] [--plan plan.json]
//!         [--no-references] [--banner]
//!   pager --sample <chat|table|note> [output.pdf] ...
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `chat.json` → `chat.pdf`).

use std::{env, fs, path::Path, path::PathBuf, process};

use chat_pager::content::ContentStream;
use chat_pager::pipeline::{export_pdf, ExportConfig, PageOrientation};
use chat_pager::samples;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut plan_path: Option<PathBuf> = None;
    let mut sample: Option<String> = None;
    let mut landscape = false;
    let mut references = true;
    let mut banner = false;
    let mut title: Option<String> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--no-references" => references = false,
            "--banner" | "-b" => banner = true,
            "--title" | "-t" => match iter.next() {
                Some(v) => title = Some(v.clone()),
                None => fail_usage(&args[0], "--title needs a value"),
            },
            "--plan" | "-p" => match iter.next() {
                Some(v) => plan_path = Some(PathBuf::from(v)),
                None => fail_usage(&args[0], "--plan needs a path"),
            },
            "--sample" | "-s" => match iter.next() {
                Some(v) => {
                    sample = Some(v.clone());
                    // The sample takes the input slot.
                    positional = positional.max(1);
                }
                None => fail_usage(&args[0], "--sample needs a name"),
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                fail_usage(&args[0], &format!("Unknown flag: {other}"));
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    fail_usage(&args[0], &format!("Unexpected argument: {path}"));
                }
                positional += 1;
            }
        }
    }

    let (stream, default_title, default_output) = match (&sample, &input_path) {
        (Some(name), _) => {
            let stream = match name.as_str() {
                "chat" => samples::chat_transcript(),
                "table" => samples::long_table(120),
                "note" => samples::research_note(),
                other => fail_usage(&args[0], &format!("Unknown sample: {other}")),
            };
            (stream, format!("{name} sample"), PathBuf::from(format!("{name}.pdf")))
        }
        (None, Some(input)) => {
            let stream = read_stream(input);
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("chat-pager export")
                .to_string();
            (stream, stem, input.with_extension("pdf"))
        }
        (None, None) => fail_usage(&args[0], "Error: no input file specified."),
    };

    let output = output_path.unwrap_or(default_output);

    let config = ExportConfig {
        title: title.unwrap_or(default_title),
        orientation: if landscape {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        },
        append_references: references,
        title_banner: banner,
        ..ExportConfig::default()
    };

    match export_pdf(&stream, &config) {
        Ok((bytes, plan)) => {
            write_file(&output, &bytes);
            if let Some(path) = &plan_path {
                match plan.to_json() {
                    Ok(json) => write_file(path, json.as_bytes()),
                    Err(e) => {
                        eprintln!("Error serialising plan: {e}");
                        process::exit(1);
                    }
                }
            }
            let pages = plan.pages.len();
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{}, {} reference{})",
                output.display(),
                bytes.len(),
                pages,
                if pages == 1 { "" } else { "s" },
                plan.references.len(),
                if plan.references.len() == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error exporting PDF: {e}");
            process::exit(1);
        }
    }
}

fn read_stream(input: &Path) -> ContentStream {
    let json = match fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };
    match ContentStream::from_json(&json) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error parsing '{}': {e}", input.display());
            process::exit(1);
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) {
    // Create output directory if necessary.
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    if let Err(e) = fs::write(path, bytes) {
        eprintln!("Error writing '{}': {e}", path.display());
        process::exit(1);
    }
}

fn fail_usage(prog: &str, msg: &str) -> ! {
    eprintln!("{msg}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("pager – paginated PDF export of chat and note content (chat-pager)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.json> [output.pdf] [flags]");
    eprintln!("  {prog} --sample <chat|table|note> [output.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.json>       Content stream JSON (units of messages and opaque markup)");
    eprintln!("  [output.pdf]       Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --title, -t        Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --landscape, -l    Use landscape page orientation (A4 841×595 pt)");
    eprintln!("  --plan, -p         Also write the page plan JSON to this path");
    eprintln!("  --no-references    Do not append the references section");
    eprintln!("  --banner, -b       Open the document with the title as a heading");
    eprintln!("  --sample, -s       Export a built-in sample instead of a file");
    eprintln!("  --help             Print this message");
}
