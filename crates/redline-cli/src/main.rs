//! redline - convert between reviewed DOCX files and annotated text

#![allow(
    clippy::fn_params_excessive_bools, // CLI commands have many boolean flags
    clippy::needless_pass_by_value,    // clap hands over owned values
    clippy::unnecessary_wraps,         // consistent Result return for CLI handlers
)]

mod config;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use config::Config;
use redline_core::{CommentAnchor, ReviewOptions, RevisionKind, TagConfig, View};
use redline_docx::{Package, ReviewProcessor, RevisionEntry};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Which view(s) the read command prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ViewArg {
    /// Inline transcript with every revision and comment
    Tagged,
    /// Inserted text only
    Added,
    /// Deleted text only
    Deleted,
    /// One line per comment
    Comments,
    /// Text with all changes accepted
    Final,
    /// Text with all changes rejected
    Original,
    /// Every view, one after another
    All,
}

impl ViewArg {
    fn views(self) -> Vec<View> {
        match self {
            Self::Tagged => vec![View::Tagged],
            Self::Added => vec![View::Added],
            Self::Deleted => vec![View::Deleted],
            Self::Comments => vec![View::Comments],
            Self::Final => vec![View::Final],
            Self::Original => vec![View::Original],
            Self::All => View::ALL.to_vec(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "redline",
    about = "Read and write tracked changes and comments in DOCX files",
    long_about = "Turn the tracked changes and comments of a DOCX file into annotated text,\n\
                  and turn annotated text back into a DOCX file with real revisions.\n\
                  \n\
                  Default markup: \\add{..} \\del{..} \\repl{old}{new} \\hl{..} \\comment{..} \\anchor{..}",
    version
)]
struct Args {
    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Delimiter overrides shared by read and write
#[derive(ClapArgs, Debug, Default)]
struct TagArgs {
    /// Opening delimiter for inserted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    added_start: Option<String>,
    /// Closing delimiter for inserted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    added_end: Option<String>,
    /// Opening delimiter for deleted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    deleted_start: Option<String>,
    /// Closing delimiter for deleted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    deleted_end: Option<String>,
    /// Opening delimiter for highlighted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    highlight_start: Option<String>,
    /// Closing delimiter for highlighted text
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    highlight_end: Option<String>,
    /// Opening delimiter for comments
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    comment_start: Option<String>,
    /// Closing delimiter for comments
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    comment_end: Option<String>,
    /// Opening delimiter for an explicit comment range
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    anchor_start: Option<String>,
    /// Closing delimiter for an explicit comment range
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    anchor_end: Option<String>,
    /// Opening delimiter for a substitution
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    replaced_start: Option<String>,
    /// Separator between old and new text of a substitution
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    replaced_separator: Option<String>,
    /// Closing delimiter for a substitution
    #[arg(long, value_name = "STR", allow_hyphen_values = true)]
    replaced_end: Option<String>,
}

impl TagArgs {
    fn apply(&self, tags: &mut TagConfig) {
        let overrides = [
            (&self.added_start, &mut tags.added.start),
            (&self.added_end, &mut tags.added.end),
            (&self.deleted_start, &mut tags.deleted.start),
            (&self.deleted_end, &mut tags.deleted.end),
            (&self.highlight_start, &mut tags.highlight.start),
            (&self.highlight_end, &mut tags.highlight.end),
            (&self.comment_start, &mut tags.comment.start),
            (&self.comment_end, &mut tags.comment.end),
            (&self.anchor_start, &mut tags.anchor.start),
            (&self.anchor_end, &mut tags.anchor.end),
            (&self.replaced_start, &mut tags.replaced.start),
            (&self.replaced_separator, &mut tags.replaced.separator),
            (&self.replaced_end, &mut tags.replaced.end),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a reviewed document as annotated text
    #[command(long_about = "Render the tracked changes and comments of a DOCX file.\n\
                      \n\
                      Views: tagged (default), added, deleted, comments, final, original, all.\n\
                      \n\
                      Examples:\n\
                        redline read contract.docx\n\
                        redline read contract.docx --view final -o final.txt\n\
                        redline read contract.docx --added-start '[+' --added-end '+]'")]
    Read {
        /// Input DOCX file
        input: PathBuf,

        /// View to render
        #[arg(long, value_enum)]
        view: Option<ViewArg>,

        /// Keep adjacent runs of one revision as separate spans
        #[arg(long)]
        no_merge: bool,

        /// Merge adjacent runs of one revision
        #[arg(long, value_name = "BOOL", env = "REDLINE_MERGE_REVISIONS")]
        merge_revisions: Option<bool>,

        /// Leave comments out of the tagged view
        #[arg(long)]
        no_comments: bool,

        /// Include comments in the tagged view
        #[arg(long, value_name = "BOOL", env = "REDLINE_INCLUDE_COMMENTS")]
        include_comments: Option<bool>,

        #[command(flatten)]
        tags: TagArgs,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List paragraphs, revisions, comments and load warnings
    Inspect {
        /// Input DOCX file
        input: PathBuf,

        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,

        /// Keep adjacent runs of one revision as separate spans
        #[arg(long)]
        no_merge: bool,
    },

    /// Build a DOCX file from annotated text
    #[command(long_about = "Build a DOCX file with tracked changes and comments from annotated text.\n\
                      \n\
                      The template supplies styles, section settings and the comments part;\n\
                      its body is replaced by the annotated text, one paragraph per line.\n\
                      \n\
                      Examples:\n\
                        redline write notes.txt --template blank.docx -o reviewed.docx\n\
                        echo 'say \\repl{hi}{hello}' | redline write - --template blank.docx -o out.docx")]
    Write {
        /// Annotated text file, or '-' for stdin
        input: String,

        /// Template DOCX file
        #[arg(short, long)]
        template: PathBuf,

        /// Output DOCX file
        #[arg(short, long)]
        output: PathBuf,

        /// Author recorded on revisions and comments
        #[arg(long, env = "REDLINE_AUTHOR")]
        author: Option<String>,

        /// Highlight colour for highlighted text
        #[arg(long, value_name = "COLOR")]
        highlight_color: Option<String>,

        #[command(flatten)]
        tags: TagArgs,
    },

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for redline.\n\
                      \n\
                      Examples:\n\
                        redline completions bash > /usr/local/etc/bash_completion.d/redline\n\
                        redline completions zsh > ~/.zsh/completions/_redline")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// JSON shape of `inspect --json`
#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    paragraphs: Vec<String>,
    revisions: Vec<RevisionEntry>,
    comments: Vec<&'a CommentAnchor>,
    warnings: Vec<String>,
}

fn main() {
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    let env = env_logger::Env::default().default_filter_or(verbosity.log_filter());
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(args.command, verbosity) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(command: Commands, verbosity: Verbosity) -> Result<()> {
    match command {
        Commands::Read {
            input,
            view,
            no_merge,
            merge_revisions,
            no_comments,
            include_comments,
            tags,
            output,
        } => {
            let config = Config::discover();
            let mut options = config.review_options();
            tags.apply(&mut options.tags);
            options.merge_revisions =
                resolve_flag(no_merge, merge_revisions, options.merge_revisions);
            options.include_comments =
                resolve_flag(no_comments, include_comments, options.include_comments);
            let view = match view {
                Some(view) => view,
                None => configured_view(&config)?,
            };
            read_command(&input, view, options, output.as_deref(), verbosity)
        }
        Commands::Inspect {
            input,
            json,
            no_merge,
        } => {
            let mut options = Config::discover().review_options();
            if no_merge {
                options.merge_revisions = false;
            }
            inspect_command(&input, json, options)
        }
        Commands::Write {
            input,
            template,
            output,
            author,
            highlight_color,
            tags,
        } => {
            let mut options = Config::discover().review_options();
            tags.apply(&mut options.tags);
            if let Some(author) = author {
                options.author = author;
            }
            if let Some(color) = highlight_color {
                options.highlight_color = color;
            }
            write_command(&input, &template, &output, &options, verbosity)
        }
        Commands::Completions { shell } => {
            completion_command(shell);
            Ok(())
        }
    }
}

/// `--no-X` beats `--X <BOOL>` (or its env var), which beats the config value
const fn resolve_flag(negated: bool, explicit: Option<bool>, configured: bool) -> bool {
    if negated {
        return false;
    }
    match explicit {
        Some(value) => value,
        None => configured,
    }
}

fn configured_view(config: &Config) -> Result<ViewArg> {
    match config.default_view() {
        None => Ok(ViewArg::Tagged),
        Some(name) => match ViewArg::from_str(name, true) {
            Ok(view) => Ok(view),
            Err(_) => bail!("Unknown view '{name}' in {}", config::CONFIG_FILE_NAME),
        },
    }
}

fn open_document(input: &Path, options: ReviewOptions) -> Result<ReviewProcessor> {
    let processor = ReviewProcessor::open(input, options)
        .with_context(|| format!("Failed to read document: {}", input.display()))?;
    for warning in processor.warnings() {
        log::warn!("{}: {warning}", input.display());
    }
    Ok(processor)
}

fn read_command(
    input: &Path,
    view: ViewArg,
    options: ReviewOptions,
    output: Option<&Path>,
    verbosity: Verbosity,
) -> Result<()> {
    let processor = open_document(input, options)?;
    let views = view.views();

    let rendered = if let [single] = views.as_slice() {
        processor.render(*single)
    } else {
        views
            .iter()
            .map(|view| format!("=== {view} ===\n{}\n", processor.render(*view)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    match output {
        Some(path) => {
            fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            if verbosity != Verbosity::Quiet {
                eprintln!("{} {}", "Wrote".green().bold(), path.display());
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn inspect_command(input: &Path, json: bool, options: ReviewOptions) -> Result<()> {
    let processor = open_document(input, options)?;

    if json {
        let report = InspectReport {
            paragraphs: processor.paragraphs(),
            revisions: processor.revisions(),
            comments: processor.comments().collect(),
            warnings: processor.warnings().iter().map(ToString::to_string).collect(),
        };
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{text}");
        return Ok(());
    }

    println!("{}", "Paragraphs".bold());
    for (index, text) in processor.paragraphs().iter().enumerate() {
        println!("  [{index}] {text}");
    }

    println!("{}", "Revisions".bold());
    for entry in processor.revisions() {
        let span = &entry.span;
        let kind = match span.kind {
            RevisionKind::Inserted => "inserted",
            RevisionKind::Deleted => "deleted",
            RevisionKind::None => "unchanged",
        };
        println!(
            "  [{}] {} by {}: {:?}",
            span.paragraph,
            kind.cyan(),
            span.author.as_deref().unwrap_or("unknown"),
            entry.text
        );
    }

    println!("{}", "Comments".bold());
    for comment in processor.comments() {
        println!(
            "  #{} [{}-{}] {}",
            comment.id,
            comment.start.paragraph,
            comment.end.paragraph,
            comment.display_text()
        );
    }

    let warnings = processor.warnings();
    if !warnings.is_empty() {
        println!("{}", "Warnings".yellow().bold());
        for warning in warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

fn read_annotated(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read annotated text from stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read input file: {input}"))
    }
}

fn write_command(
    input: &str,
    template: &Path,
    output: &Path,
    options: &ReviewOptions,
    verbosity: Verbosity,
) -> Result<()> {
    let text = read_annotated(input)?;
    // A trailing newline would otherwise become an empty last paragraph
    let annotated = text.strip_suffix('\n').unwrap_or(&text);
    let annotated = annotated.strip_suffix('\r').unwrap_or(annotated);

    let template_package = Package::open(template)
        .with_context(|| format!("Failed to open template: {}", template.display()))?;
    let package = ReviewProcessor::build(&template_package, annotated, options)
        .context("Failed to build document")?;
    package
        .write(output)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    log::debug!(
        "wrote {} parts to {}",
        package.part_names().count(),
        output.display()
    );
    if verbosity != Verbosity::Quiet {
        eprintln!("{} {}", "Wrote".green().bold(), output.display());
    }
    Ok(())
}

fn completion_command(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
