use std::fs::{self, File};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ReplaceMode;
use crate::error::ExportError;

/// Suffix of a single plugin file.
pub const PLUGIN_SUFFIX: &str = ".cs";
/// Suffix of an archived plugin folder.
pub const ARCHIVE_SUFFIX: &str = ".cszip";

/// 1 回の実行で共有する入出力ディレクトリ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
}

/// export 実行時に必要なパスとオプションを保持するコンテキスト。
pub struct ProcessContext {
    pub paths: ResolvedPaths,
    pub replace: ReplaceMode,
    pub quiet: bool,
}

/// エクスポート対象の種別を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    File,
    Folder,
}

/// 実行フェーズで使うエクスポートタスク情報を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    pub kind: ExportKind,
    pub label: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// ソースと出力先が同一実体の場合は何もしない（削除するとソースを失う）。
    pub in_place: bool,
}

impl ExportTask {
    /// 出力先のファイル名を返す。
    pub fn output_name(&self) -> String {
        self.destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.label.clone())
    }
}

/// `.cs` で終わらず、既存ディレクトリを指すターゲットのみフォルダとして扱う。
pub fn determine_kind(target: &str, context: &ProcessContext) -> ExportKind {
    let source = context.paths.source_dir.join(target);
    if !target.ends_with(PLUGIN_SUFFIX) && source.is_dir() {
        ExportKind::Folder
    } else {
        ExportKind::File
    }
}

/// ソースの存在を確認し、出力先を決定して実行タスクを構築する。
pub fn validate(
    kind: ExportKind,
    target: &str,
    context: &ProcessContext,
) -> Result<ExportTask, ExportError> {
    let (source, destination) = match kind {
        ExportKind::Folder => {
            let source = context
                .paths
                .source_dir
                .join(target)
                .canonicalize()
                .map_err(|e| ExportError::io(format!("cannot access '{target}'"), e))?;
            // canonical form so that "." or a trailing separator still has a name
            let name = source
                .file_name()
                .ok_or_else(|| {
                    ExportError::Usage(format!("cannot archive '{target}': folder has no name"))
                })?;
            let archive = format!("{}{ARCHIVE_SUFFIX}", name.to_string_lossy());
            let destination = context.paths.dest_dir.join(archive);
            (source, destination)
        }
        ExportKind::File => {
            let file = if target.ends_with(PLUGIN_SUFFIX) {
                target.to_string()
            } else {
                format!("{target}{PLUGIN_SUFFIX}")
            };
            let source = context.paths.source_dir.join(file);
            if !source.is_file() {
                return Err(ExportError::SourceNotFound { path: source });
            }
            let name = source
                .file_name()
                .ok_or_else(|| ExportError::SourceNotFound {
                    path: source.clone(),
                })?;
            let destination = context.paths.dest_dir.join(name);
            (source, destination)
        }
    };

    let in_place = is_same_file(&source, &destination);
    Ok(ExportTask {
        kind,
        label: target.to_string(),
        source,
        destination,
        in_place,
    })
}

fn is_same_file(source: &Path, destination: &Path) -> bool {
    match (source.canonicalize(), destination.canonicalize()) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

/// 既存の出力を取り除いてから、種別に応じたコピーまたはアーカイブ作成を行う。
pub fn execute(task: &ExportTask, context: &ProcessContext) -> Result<(), ExportError> {
    if task.in_place {
        tracing::debug!(path = %task.source.display(), "source is already the export, skipping");
        return Ok(());
    }

    remove_existing(&task.destination, context.replace)?;

    match task.kind {
        ExportKind::File => fs::copy(&task.source, &task.destination)
            .map(|_| ())
            .map_err(|e| {
                ExportError::io(
                    format!(
                        "cannot copy '{}' to '{}'",
                        task.label,
                        task.destination.display()
                    ),
                    e,
                )
            }),
        ExportKind::Folder => archive_folder(&task.source, &task.destination),
    }
}

fn remove_existing(destination: &Path, replace: ReplaceMode) -> Result<(), ExportError> {
    if fs::symlink_metadata(destination).is_err() {
        return Ok(());
    }

    tracing::debug!(path = %destination.display(), ?replace, "replacing existing export");
    let context = || format!("cannot replace '{}'", destination.display());
    match replace {
        ReplaceMode::Delete => {
            fs::remove_file(destination).map_err(|e| ExportError::io(context(), e))
        }
        ReplaceMode::Trash => trash::delete(destination)
            .map_err(|e| ExportError::io(context(), std::io::Error::other(e.to_string()))),
    }
}

/// ディレクトリ配下を再帰的に走査し、ルートからの相対パスで zip に格納する。
fn archive_folder(source: &Path, destination: &Path) -> Result<(), ExportError> {
    let zip_err = |e: zip::result::ZipError| ExportError::Zip {
        path: destination.to_path_buf(),
        source: e,
    };

    let file = File::create(destination)
        .map_err(|e| ExportError::io(format!("cannot create '{}'", destination.display()), e))?;
    let mut zipw = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            ExportError::io(
                format!("error reading directory '{}'", source.display()),
                e.into(),
            )
        })?;
        let path = entry.path();

        // the archive may be written inside the folder being archived
        if path == destination {
            continue;
        }
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };

        // zip entries always use "/" regardless of platform
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_file() {
            zipw.start_file(name.as_str(), options).map_err(zip_err)?;
            let mut f = File::open(path)
                .map_err(|e| ExportError::io(format!("cannot open '{}'", path.display()), e))?;
            std::io::copy(&mut f, &mut zipw)
                .map_err(|e| ExportError::io(format!("cannot archive '{}'", path.display()), e))?;
        } else if path.is_dir() && !name.is_empty() {
            zipw.add_directory(name.as_str(), options).map_err(zip_err)?;
        }
    }

    zipw.finish().map_err(zip_err)?;
    Ok(())
}
