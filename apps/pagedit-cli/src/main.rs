//! pagedit command line
//!
//! Thin front end over `pagedit-core`: inspect, edit, merge, split and crop
//! PDFs from the shell.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pagedit_core::crop::{self, ThumbnailSize, UiRect};
use pagedit_core::{
    split, EditorConfig, MergeOrder, PageEditError, PageId, RotationDirection, SourceDocument,
    Workspace,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pagedit")]
#[command(version, about = "Delete, reorder, rotate, merge, split and crop PDF pages")]
struct Args {
    /// Editor configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count and page sizes
    Info { file: PathBuf },

    /// Apply deletions, moves and rotations, in that order
    Edit {
        file: PathBuf,
        /// Positions to delete, e.g. "1,3-5"
        #[arg(long)]
        delete: Option<String>,
        /// Move a page: FROM:TO (1-based positions)
        #[arg(long = "move", value_parser = parse_move)]
        moves: Vec<(usize, usize)>,
        /// Rotate a page: POS:90 or POS:-90
        #[arg(long = "rotate", value_parser = parse_rotate, allow_hyphen_values = true)]
        rotations: Vec<(usize, RotationDirection)>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Concatenate two documents
    Merge {
        first: PathBuf,
        second: PathBuf,
        /// Put the second document first
        #[arg(long)]
        reverse: bool,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write one document per range segment
    Split {
        file: PathBuf,
        /// Segments, e.g. "1-3,4,5-"
        #[arg(long)]
        ranges: String,
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Export a region of one page, selected on a thumbnail
    Crop {
        file: PathBuf,
        /// 1-based page position
        #[arg(long)]
        page: usize,
        /// Thumbnail size the selection was made on: WxH
        #[arg(long, value_parser = parse_size)]
        thumb: ThumbnailSize,
        /// Selection in thumbnail pixels: X1,Y1,X2,Y2
        #[arg(long, value_parser = parse_rect)]
        rect: UiRect,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EditorConfig::default(),
    };

    match args.command {
        Command::Info { file } => info(&file),
        Command::Edit {
            file,
            delete,
            moves,
            rotations,
            output,
        } => edit(config, &file, delete.as_deref(), &moves, &rotations, &output),
        Command::Merge {
            first,
            second,
            reverse,
            output,
        } => {
            let order = if reverse {
                MergeOrder::BThenA
            } else {
                MergeOrder::AThenB
            };
            merge(config, &first, &second, order, &output)
        }
        Command::Split {
            file,
            ranges,
            out_dir,
        } => split_file(config, &file, &ranges, &out_dir),
        Command::Crop {
            file,
            page,
            thumb,
            rect,
            output,
        } => crop_page(config, &file, page, thumb, rect, &output),
    }
}

fn info(file: &Path) -> Result<()> {
    let document = SourceDocument::open(file)?;
    println!("{}: {} pages", file.display(), document.page_count());
    for index in 0..document.page_count() {
        let id = PageId(index);
        let geometry = document.page_geometry(id)?;
        let rotation = document.page_rotation(id)?;
        println!(
            "  page {:>4}: {:.0} x {:.0} pt, rotate {}",
            id.page_number(),
            geometry.width,
            geometry.height,
            rotation.degrees()
        );
    }
    Ok(())
}

fn edit(
    config: EditorConfig,
    file: &Path,
    delete: Option<&str>,
    moves: &[(usize, usize)],
    rotations: &[(usize, RotationDirection)],
    output: &Path,
) -> Result<()> {
    let mut workspace = Workspace::new(config);
    let session = workspace
        .open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    if let Some(text) = delete {
        let removed = session
            .delete_range_text(text)
            .with_context(|| format!("Invalid --delete '{}'", text))?;
        tracing::info!("Deleted {} pages", removed);
    }
    for &(from, to) in moves {
        session
            .reorder(from, to)
            .with_context(|| format!("Invalid --move {}:{}", from, to))?;
    }
    for &(position, direction) in rotations {
        session
            .rotate(position, direction)
            .with_context(|| format!("Invalid --rotate at position {}", position))?;
    }
    tracing::info!("{}", session.summary());

    match workspace.apply(file) {
        Ok(materialized) => move_out(&materialized, output),
        Err(PageEditError::NotDirty) => {
            tracing::warn!("No edits requested; copying input unchanged");
            copy_out(file, output)
        }
        Err(e) => Err(e).context("Failed to apply edits"),
    }
}

fn merge(
    config: EditorConfig,
    first: &Path,
    second: &Path,
    order: MergeOrder,
    output: &Path,
) -> Result<()> {
    let mut workspace = Workspace::new(config);
    let merged = workspace.merge(first, second, order).with_context(|| {
        format!("Failed to merge {} and {}", first.display(), second.display())
    })?;
    move_out(&merged, output)
}

fn split_file(config: EditorConfig, file: &Path, ranges: &str, out_dir: &Path) -> Result<()> {
    let compress = config.materialize.compress;
    let mut workspace = Workspace::new(config);
    workspace
        .open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let session = workspace
        .session(file)
        .context("Session closed unexpectedly")?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let written = split::split_ranges(session, ranges, out_dir, &file_stem(file), compress)
        .with_context(|| format!("Failed to split by '{}'", ranges))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn crop_page(
    config: EditorConfig,
    file: &Path,
    page: usize,
    thumb: ThumbnailSize,
    rect: UiRect,
    output: &Path,
) -> Result<()> {
    let compress = config.materialize.compress;
    let mut workspace = Workspace::new(config);
    workspace
        .open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let id = workspace
        .add_crop(file, page, rect, thumb)
        .with_context(|| format!("Invalid crop on page {}", page))?;

    let session = workspace
        .session(file)
        .context("Session closed unexpectedly")?;
    let Some(region) = session.crops().get(&id) else {
        bail!("Crop {} vanished", id);
    };
    crop::extract_crop(session.document(), region, output, compress)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn copy_out(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    println!("{}", to.display());
    Ok(())
}

/// Copy a materialized temporary to `to`, then drop the temporary
fn move_out(temp: &Path, to: &Path) -> Result<()> {
    copy_out(temp, to)?;
    if let Err(e) = fs::remove_file(temp) {
        tracing::warn!("Failed to remove {}: {}", temp.display(), e);
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn parse_pair(value: &str, separator: char) -> Result<(&str, &str), String> {
    value
        .split_once(separator)
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| format!("expected two values separated by '{}': '{}'", separator, value))
}

fn parse_move(value: &str) -> Result<(usize, usize), String> {
    let (from, to) = parse_pair(value, ':')?;
    let from = from.parse().map_err(|_| format!("invalid position '{}'", from))?;
    let to = to.parse().map_err(|_| format!("invalid position '{}'", to))?;
    Ok((from, to))
}

fn parse_rotate(value: &str) -> Result<(usize, RotationDirection), String> {
    let (position, degrees) = parse_pair(value, ':')?;
    let position = position
        .parse()
        .map_err(|_| format!("invalid position '{}'", position))?;
    let degrees: i64 = degrees
        .trim_start_matches('+')
        .parse()
        .map_err(|_| format!("invalid angle '{}'", degrees))?;
    let direction = RotationDirection::from_degrees(degrees).map_err(|e| e.to_string())?;
    Ok((position, direction))
}

fn parse_size(value: &str) -> Result<ThumbnailSize, String> {
    let (width, height) = parse_pair(&value.to_ascii_lowercase(), 'x')
        .map(|(w, h)| (w.to_string(), h.to_string()))?;
    let width = width.parse().map_err(|_| format!("invalid width '{}'", width))?;
    let height = height
        .parse()
        .map_err(|_| format!("invalid height '{}'", height))?;
    Ok(ThumbnailSize::new(width, height))
}

fn parse_rect(value: &str) -> Result<UiRect, String> {
    let coords = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid coordinate '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match coords.as_slice() {
        [x1, y1, x2, y2] => Ok(UiRect::new(*x1, *y1, *x2, *y2)),
        _ => Err(format!("expected X1,Y1,X2,Y2, got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object};
    use pagedit_core::config::MaterializeConfig;
    use pretty_assertions::assert_eq;

    struct Scratch {
        dir: PathBuf,
    }

    impl Scratch {
        fn new(label: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("pagedit-cli-{}-{}", label, std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn config(&self) -> EditorConfig {
            EditorConfig {
                materialize: MaterializeConfig {
                    temp_dir: Some(self.dir.join("tmp")),
                    compress: false,
                    ..MaterializeConfig::default()
                },
                ..EditorConfig::default()
            }
        }

        /// Blank Letter-size PDF with `count` pages
        fn write_pdf(&self, name: &str, count: usize) -> PathBuf {
            let mut doc = Document::with_version("1.7");
            let pages_id = doc.new_object_id();
            let kids: Vec<Object> = (0..count)
                .map(|_| {
                    let page = Dictionary::from_iter(vec![
                        ("Type", Object::Name(b"Page".to_vec())),
                        ("Parent", Object::Reference(pages_id)),
                        (
                            "MediaBox",
                            Object::Array(vec![
                                Object::Integer(0),
                                Object::Integer(0),
                                Object::Integer(612),
                                Object::Integer(792),
                            ]),
                        ),
                    ]);
                    Object::Reference(doc.add_object(page))
                })
                .collect();
            let pages = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(count as i64)),
                ("Kids", Object::Array(kids)),
            ]);
            doc.objects.insert(pages_id, Object::Dictionary(pages));
            let catalog_id = doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Catalog".to_vec())),
                ("Pages", Object::Reference(pages_id)),
            ]));
            doc.trailer.set("Root", Object::Reference(catalog_id));

            let path = self.dir.join(name);
            doc.save(&path).unwrap();
            path
        }

        fn leftover_temporaries(&self) -> Vec<PathBuf> {
            match fs::read_dir(self.dir.join("tmp")) {
                Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
                Err(_) => Vec::new(),
            }
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_edit_and_merge_leave_no_temporaries() {
        let scratch = Scratch::new("temporaries");
        let a = scratch.write_pdf("a.pdf", 3);
        let b = scratch.write_pdf("b.pdf", 2);

        let edited = scratch.dir.join("edited.pdf");
        edit(scratch.config(), &a, Some("1"), &[], &[], &edited).unwrap();
        assert_eq!(pagedit_core::get_page_count(&edited).unwrap(), 2);

        let merged = scratch.dir.join("merged.pdf");
        merge(scratch.config(), &a, &b, MergeOrder::BThenA, &merged).unwrap();
        assert_eq!(pagedit_core::get_page_count(&merged).unwrap(), 5);

        assert_eq!(scratch.leftover_temporaries(), Vec::<PathBuf>::new());
    }

    #[test]
    fn test_edit_without_changes_keeps_input() {
        let scratch = Scratch::new("unchanged");
        let a = scratch.write_pdf("a.pdf", 2);
        let out = scratch.dir.join("out.pdf");
        edit(scratch.config(), &a, None, &[], &[], &out).unwrap();
        assert!(a.exists());
        assert_eq!(pagedit_core::get_page_count(&out).unwrap(), 2);
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(parse_move("3:1").unwrap(), (3, 1));
        assert_eq!(parse_move(" 2 : 4 ").unwrap(), (2, 4));
        assert!(parse_move("3").is_err());
        assert!(parse_move("a:1").is_err());
    }

    #[test]
    fn test_parse_rotate() {
        assert_eq!(parse_rotate("2:90").unwrap(), (2, RotationDirection::Clockwise));
        assert_eq!(parse_rotate("2:+90").unwrap(), (2, RotationDirection::Clockwise));
        assert_eq!(
            parse_rotate("1:-90").unwrap(),
            (1, RotationDirection::CounterClockwise)
        );
        assert!(parse_rotate("1:45").is_err());
    }

    #[test]
    fn test_parse_size_and_rect() {
        assert_eq!(parse_size("150x200").unwrap(), ThumbnailSize::new(150.0, 200.0));
        assert_eq!(parse_size("150X200").unwrap(), ThumbnailSize::new(150.0, 200.0));
        assert!(parse_size("150").is_err());
        assert_eq!(
            parse_rect("75,100,150,200").unwrap(),
            UiRect::new(75.0, 100.0, 150.0, 200.0)
        );
        assert!(parse_rect("1,2,3").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "pagedit", "edit", "in.pdf", "--delete", "1,3", "--move", "2:1", "--rotate", "1:-90",
            "-o", "out.pdf",
        ])
        .unwrap();
        match args.command {
            Command::Edit {
                delete,
                moves,
                rotations,
                ..
            } => {
                assert_eq!(delete.as_deref(), Some("1,3"));
                assert_eq!(moves, vec![(2, 1)]);
                assert_eq!(rotations, vec![(1, RotationDirection::CounterClockwise)]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
