pub mod args;
pub mod handlers;

use std::path::Path;

use crate::config::Config;
use crate::error::ExportError;
use crate::notifications::{self, ExportSummary};
use crate::roots;
use args::ExportRequest;
use handlers::{ProcessContext, ResolvedPaths};

/// 失敗時に報告するため、完了済みのエクスポートを順に記録する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: Vec<String>,
    pub total: usize,
}

impl ExportReport {
    pub fn new(total: usize) -> Self {
        Self {
            exported: Vec::new(),
            total,
        }
    }

    pub fn summary(&self, failed: bool) -> ExportSummary {
        ExportSummary {
            exported_count: self.exported.len(),
            total_count: self.total,
            failed,
        }
    }
}

/// export コマンド全体を実行し、終了コードを返す。最初の失敗で残りのターゲットは処理しない。
pub fn run(request: ExportRequest, config: &Config) -> i32 {
    match std::env::current_dir() {
        Ok(cwd) => run_in(&cwd, &request, config),
        Err(e) => {
            report_error(&ExportError::io("cannot determine current directory", e), None);
            1
        }
    }
}

/// `cwd` を起点にルートを解決して export を実行する。
pub fn run_in(cwd: &Path, request: &ExportRequest, config: &Config) -> i32 {
    let context = match prepare(request, config, cwd) {
        Ok(context) => context,
        Err(e) => {
            report_error(&e, None);
            return 1;
        }
    };

    let mut report = ExportReport::new(request.targets.len());
    let result = export_all(&request.targets, &context, &mut report);
    notifications::notify_export_result(&report.summary(result.is_err()), &config.notify);

    match result {
        Ok(()) => 0,
        Err(e) => {
            report_error(&e, Some(&report));
            1
        }
    }
}

fn prepare(
    request: &ExportRequest,
    config: &Config,
    cwd: &Path,
) -> Result<ProcessContext, ExportError> {
    let paths = resolve_paths(request, cwd)?;

    Ok(ProcessContext {
        paths,
        replace: config.output.replace,
        quiet: request.quiet,
    })
}

/// ルートを解決して入出力ディレクトリを決定する。出力先が存在しなければ失敗する（作成はしない）。
pub fn resolve_paths(request: &ExportRequest, cwd: &Path) -> Result<ResolvedPaths, ExportError> {
    let plugin_root = roots::resolve_root(cwd, request.plugin_root_name.as_deref())?;
    let server_root = roots::resolve_root(cwd, request.server_root_name.as_deref())?;
    tracing::debug!(
        plugin_root = %plugin_root.display(),
        server_root = %server_root.display(),
        "resolved roots"
    );

    let source_dir = plugin_root.join(&request.plugins_path);
    let dest_dir = server_root.join(&request.server_path);
    if !dest_dir.is_dir() {
        return Err(ExportError::DestinationNotFound { path: dest_dir });
    }
    let dest_dir = dest_dir.canonicalize().map_err(|e| {
        ExportError::io(format!("cannot access '{}'", dest_dir.display()), e)
    })?;

    tracing::debug!(
        source_dir = %source_dir.display(),
        dest_dir = %dest_dir.display(),
        "resolved paths"
    );
    Ok(ResolvedPaths {
        source_dir,
        dest_dir,
    })
}

/// ターゲットを順番に処理し、成功したものを `report` に記録する。
pub fn export_all(
    targets: &[String],
    context: &ProcessContext,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    for target in targets {
        let name = process_target(target, context)?;
        report.exported.push(name);
    }

    Ok(())
}

/// 単一ターゲットに対して種別判定・検証・実行までを一貫して行う。
fn process_target(target: &str, context: &ProcessContext) -> Result<String, ExportError> {
    let kind = handlers::determine_kind(target, context);
    let task = handlers::validate(kind, target, context)?;
    tracing::debug!(?task, "exporting");

    let name = task.output_name();
    if !context.quiet {
        println!("Exporting: {name}");
    }
    handlers::execute(&task, context)?;

    Ok(name)
}

/// エラーを 1 行で表示し、途中まで完了したエクスポートがあれば併せて報告する。
pub fn report_error(error: &ExportError, report: Option<&ExportReport>) {
    eprintln!("Error: {error}");
    if let Some(report) = report.filter(|r| !r.exported.is_empty()) {
        eprintln!(
            "Exported {} of {} targets before failure: {}",
            report.exported.len(),
            report.total,
            report.exported.join(", ")
        );
    }
    eprintln!("Try '--help' for more information.");
}
