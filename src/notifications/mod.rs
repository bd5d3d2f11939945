use std::env;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

use crate::config::NotifyConfig;

/// 実通知を抑止するテストモードの環境変数。
pub const TEST_MODE_ENV: &str = "CARBON_EXPORT_TEST_MODE";

/// エクスポート実行結果の集計情報を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub exported_count: usize,
    pub total_count: usize,
    pub failed: bool,
}

impl ExportSummary {
    /// 成功有無を返す。
    pub fn is_success(&self) -> bool {
        !self.failed
    }

    /// 通知本文を組み立てる。
    pub fn message(&self) -> String {
        format!(
            "exported: {}, remaining: {}",
            self.exported_count,
            self.total_count.saturating_sub(self.exported_count)
        )
    }
}

/// 設定で有効化されている場合のみ、実行結果の通知を発火する。
pub fn notify_export_result(summary: &ExportSummary, config: &NotifyConfig) {
    if !config.macos_notify {
        return;
    }

    #[cfg(test)]
    if let Some(override_fn) = test_override() {
        let _ = override_fn(summary);
        return;
    }

    if is_test_mode_enabled() {
        return;
    }

    if let Err(e) = dispatch(summary) {
        tracing::warn!("{e}");
    }
}

/// テストモード時は実通知を抑止する。
fn is_test_mode_enabled() -> bool {
    matches!(env::var(TEST_MODE_ENV).as_deref(), Ok("1"))
}

#[cfg(target_os = "macos")]
fn dispatch(summary: &ExportSummary) -> Result<(), String> {
    use mac_notification_sys::{Notification, send_notification};

    let subtitle = if summary.is_success() {
        "completed"
    } else {
        "failed"
    };

    let mut options = Notification::new();
    options.asynchronous(true);

    send_notification("carbon-export", Some(subtitle), &summary.message(), Some(&options))
        .map(|_| ())
        .map_err(|e| format!("notification delivery failed: {e}"))
}

#[cfg(not(target_os = "macos"))]
fn dispatch(_summary: &ExportSummary) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
type TestNotifier = fn(&ExportSummary) -> Result<(), String>;

#[cfg(test)]
fn notifier_slot() -> &'static Mutex<Option<TestNotifier>> {
    static SLOT: OnceLock<Mutex<Option<TestNotifier>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

#[cfg(test)]
fn test_override() -> Option<TestNotifier> {
    notifier_slot().lock().ok().and_then(|guard| *guard)
}

/// 差し替えた通知関数で `f` を実行する。テスト間で差し替えが競合しないよう逐次化する。
#[cfg(test)]
pub(crate) fn with_test_notifier<T>(notifier: TestNotifier, f: impl FnOnce() -> T) -> T {
    static SERIAL: Mutex<()> = Mutex::new(());
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

    *notifier_slot().lock().expect("lock notifier slot") = Some(notifier);
    let result = f();
    *notifier_slot().lock().expect("lock notifier slot") = None;
    result
}
