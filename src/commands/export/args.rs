use clap::{Arg, CommandFactory, Parser};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::ExportError;

const AFTER_HELP: &str = "\
Description:
  Exports a list of plugin files or folders into the server plugin folder.
  - .cs files are copied directly (the .cs suffix may be omitted).
  - Folders are compressed as .cszip files.

Options may also be given defaults in ~/.config/carbon-export/config.toml.";

#[derive(Parser, Debug)]
#[command(name = "carbon-export", version, args_override_self = true)]
#[command(
    about = "Export Carbon plugins to your server plugin folder for hot reloading",
    long_about = None,
    after_help = AFTER_HELP
)]
pub struct Args {
    /// Root folder name to search up the directory tree for from cwd
    #[arg(short = 'r', long = "plugin-root", visible_alias = "root", value_name = "NAME")]
    pub plugin_root: Option<String>,

    /// Development plugins folder relative to the plugin root, otherwise cwd
    #[arg(short = 'p', long = "plugins", value_name = "PATH")]
    pub plugins: Option<PathBuf>,

    /// Server folder name to search up the directory tree for from cwd
    #[arg(short = 'R', long = "server-root", value_name = "NAME")]
    pub server_root: Option<String>,

    /// Server plugins folder relative to the server root, otherwise cwd [default: server/carbon/plugins]
    #[arg(
        short = 's',
        long = "server",
        visible_alias = "output",
        short_alias = 'o',
        value_name = "PATH"
    )]
    pub server: Option<PathBuf>,

    /// Suppress informational output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Plugin files or folders to export
    #[arg(value_name = "FILES_OR_FOLDERS")]
    pub targets: Vec<String>,
}

/// 1 回の実行で処理するエクスポート要求。パース後は変更しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub targets: Vec<String>,
    pub plugin_root_name: Option<String>,
    pub plugins_path: PathBuf,
    pub server_root_name: Option<String>,
    pub server_path: PathBuf,
    pub quiet: bool,
}

/// パース結果。ヘルプ（またはバージョン）表示はエラーではない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Request(ExportRequest),
    Help(String),
}

/// `server/carbon/plugins` をプラットフォームの区切り文字で組み立てる。
pub fn default_server_path() -> PathBuf {
    ["server", "carbon", "plugins"].iter().collect()
}

/// コマンドライン引数（プログラム名を除く）を解析し、設定ファイルの既定値と合成する。
pub fn parse<I, T>(tokens: I, config: &Config) -> Result<ParseOutcome, ExportError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let tokens: Vec<OsString> = tokens.into_iter().map(Into::into).collect();
    scan_tokens(&tokens)?;

    let argv = std::iter::once(OsString::from("carbon-export")).chain(tokens);
    match Args::try_parse_from(argv) {
        Ok(args) => ExportRequest::from_args(args, config).map(ParseOutcome::Request),
        Err(err) => map_clap_error(err),
    }
}

impl ExportRequest {
    fn from_args(args: Args, config: &Config) -> Result<Self, ExportError> {
        if args.targets.is_empty() {
            return Err(ExportError::NoTargets);
        }

        let roots = &config.roots;
        Ok(Self {
            targets: args.targets,
            plugin_root_name: args.plugin_root.or_else(|| roots.plugin_root.clone()),
            plugins_path: args
                .plugins
                .or_else(|| roots.plugins.clone())
                .unwrap_or_default(),
            server_root_name: args.server_root.or_else(|| roots.server_root.clone()),
            server_path: args
                .server
                .or_else(|| roots.server.clone())
                .unwrap_or_else(default_server_path),
            quiet: args.quiet || config.output.quiet,
        })
    }
}

/// clap に渡す前に、オプション名をユーザーが入力したまま報告すべき誤りを検出する。
///
/// 単独の `-` と `--` は不明なオプションとして扱う。`-` で始まるターゲットは渡せない。
/// 値を取るオプションが末尾にある、または直後が別のオプションの場合は値の欠落とする。
/// ヘルプ・バージョン指定以降の判定は clap に任せる。
fn scan_tokens(tokens: &[OsString]) -> Result<(), ExportError> {
    let command = Args::command();
    let takes_value = |token: &str| {
        command
            .get_arguments()
            .filter(|arg| !arg.is_positional() && arg.get_action().takes_values())
            .any(|arg| names_arg(arg, token))
    };

    let mut pending: Option<&str> = None;
    for token in tokens {
        let Some(token) = token.to_str() else {
            pending = None;
            continue;
        };

        if let Some(option) = pending.take() {
            if token.starts_with('-') && token != "-" {
                return Err(ExportError::MissingOptionValue(option.to_string()));
            }
            continue;
        }

        match token {
            "-" | "--" => return Err(ExportError::UnknownOption(token.to_string())),
            "-h" | "--help" | "-V" | "--version" => return Ok(()),
            _ if takes_value(token) => pending = Some(token),
            _ => {}
        }
    }

    match pending {
        Some(option) => Err(ExportError::MissingOptionValue(option.to_string())),
        None => Ok(()),
    }
}

/// `--long`（別名を含む）または `-s` 形式のトークンが引数を指すかを判定する。
fn names_arg(arg: &Arg, token: &str) -> bool {
    if let Some(long) = token.strip_prefix("--") {
        arg.get_long() == Some(long) || arg.get_all_aliases().is_some_and(|a| a.contains(&long))
    } else if let Some(short) = token.strip_prefix('-') {
        let mut chars = short.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                arg.get_short() == Some(c)
                    || arg.get_all_short_aliases().is_some_and(|a| a.contains(&c))
            }
            _ => false,
        }
    } else {
        false
    }
}

fn map_clap_error(err: clap::Error) -> Result<ParseOutcome, ExportError> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            Ok(ParseOutcome::Help(err.render().to_string()))
        }
        ErrorKind::UnknownArgument => Err(ExportError::UnknownOption(invalid_arg(&err))),
        // clap reports an option without a following value as an invalid (empty) value
        ErrorKind::InvalidValue | ErrorKind::TooFewValues => {
            Err(ExportError::MissingOptionValue(invalid_arg(&err)))
        }
        _ => Err(ExportError::Usage(first_line(&err))),
    }
}

/// エラー対象の引数名を取り出す（`--plugins <PATH>` は `--plugins` に切り詰める）。
fn invalid_arg(err: &clap::Error) -> String {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => arg
            .split_whitespace()
            .next()
            .unwrap_or(arg.as_str())
            .to_string(),
        _ => first_line(err),
    }
}

fn first_line(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootsConfig;

    fn parse_request(tokens: &[&str]) -> ExportRequest {
        match parse(tokens, &Config::default()).unwrap() {
            ParseOutcome::Request(request) => request,
            ParseOutcome::Help(_) => panic!("unexpected help outcome"),
        }
    }

    #[test]
    fn test_positional_targets_keep_order_and_duplicates() {
        let request = parse_request(&["Zeta", "Alpha.cs", "Zeta", "Mid"]);
        assert_eq!(request.targets, vec!["Zeta", "Alpha.cs", "Zeta", "Mid"]);
    }

    #[test]
    fn test_defaults_without_options() {
        let request = parse_request(&["Plugin"]);
        assert_eq!(request.plugin_root_name, None);
        assert_eq!(request.plugins_path, PathBuf::new());
        assert_eq!(request.server_root_name, None);
        assert_eq!(request.server_path, default_server_path());
        assert!(!request.quiet);
    }

    #[test]
    fn test_options_interleaved_with_targets() {
        let request = parse_request(&[
            "First",
            "--plugin-root",
            "Dev",
            "-p",
            "src/plugins",
            "Second",
            "--server-root",
            "Rust",
            "--server",
            "carbon/plugins",
            "-q",
            "Third",
        ]);

        assert_eq!(request.targets, vec!["First", "Second", "Third"]);
        assert_eq!(request.plugin_root_name.as_deref(), Some("Dev"));
        assert_eq!(request.plugins_path, PathBuf::from("src/plugins"));
        assert_eq!(request.server_root_name.as_deref(), Some("Rust"));
        assert_eq!(request.server_path, PathBuf::from("carbon/plugins"));
        assert!(request.quiet);
    }

    #[test]
    fn test_legacy_aliases_are_accepted() {
        let request = parse_request(&["--root", "Dev", "-o", "out", "Plugin"]);
        assert_eq!(request.plugin_root_name.as_deref(), Some("Dev"));
        assert_eq!(request.server_path, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_option_value_fails() {
        for option in ["--plugin-root", "--plugins", "--server-root", "--server"] {
            let err = parse(["Plugin", option], &Config::default()).unwrap_err();
            match err {
                ExportError::MissingOptionValue(name) => assert_eq!(name, option),
                other => panic!("expected MissingOptionValue for {option}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_option_value_before_next_option_fails() {
        let err = parse(["Plugin", "--plugins", "--quiet"], &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingOptionValue(_)));
    }

    #[test]
    fn test_missing_value_reports_flag_as_typed() {
        let err = parse(["Plugin", "-p"], &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingOptionValue(ref name) if name == "-p"));

        let err = parse(["-o", "-q", "Plugin"], &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingOptionValue(ref name) if name == "-o"));

        let err = parse(["--root"], &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingOptionValue(ref name) if name == "--root"));
    }

    #[test]
    fn test_bare_dash_tokens_are_unknown_options() {
        for tokens in [
            vec!["--", "-Foo"],
            vec!["Foo", "--"],
            vec!["-"],
            vec!["Foo", "-", "Bar"],
        ] {
            let err = parse(&tokens, &Config::default()).unwrap_err();
            match err {
                ExportError::UnknownOption(name) => assert!(name == "-" || name == "--"),
                other => panic!("expected UnknownOption for {tokens:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_dash_is_accepted_as_option_value() {
        let request = parse_request(&["--plugins", "-", "Plugin"]);
        assert_eq!(request.plugins_path, PathBuf::from("-"));
        assert_eq!(request.targets, vec!["Plugin"]);
    }

    #[test]
    fn test_repeated_options_keep_last_value() {
        let request = parse_request(&["-q", "-q", "-p", "a", "-p", "b", "Plugin"]);
        assert!(request.quiet);
        assert_eq!(request.plugins_path, PathBuf::from("b"));

        let request = parse_request(&["--server", "one", "-o", "two", "Plugin"]);
        assert_eq!(request.server_path, PathBuf::from("two"));
    }

    #[test]
    fn test_help_after_value_option_still_shows_help() {
        let outcome = parse(["--help", "--plugins"], &Config::default()).unwrap();
        assert!(matches!(outcome, ParseOutcome::Help(_)));
    }

    #[test]
    fn test_unknown_option_fails() {
        let err = parse(["Plugin", "--bogus"], &Config::default()).unwrap_err();
        match err {
            ExportError::UnknownOption(name) => assert_eq!(name, "--bogus"),
            other => panic!("expected UnknownOption, got {other:?}"),
        }
    }

    #[test]
    fn test_no_targets_fails() {
        let err = parse(["--quiet"], &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::NoTargets));

        let err = parse(Vec::<String>::new(), &Config::default()).unwrap_err();
        assert!(matches!(err, ExportError::NoTargets));
    }

    #[test]
    fn test_help_is_not_an_error() {
        let outcome = parse(["--help"], &Config::default()).unwrap();
        match outcome {
            ParseOutcome::Help(text) => {
                assert!(text.contains("--plugin-root"));
                assert!(text.contains(".cszip"));
            }
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn test_help_wins_over_missing_targets_and_other_flags() {
        let outcome = parse(["-q", "-h"], &Config::default()).unwrap();
        assert!(matches!(outcome, ParseOutcome::Help(_)));
    }

    #[test]
    fn test_config_supplies_defaults_and_cli_overrides() {
        let config = Config {
            roots: RootsConfig {
                plugin_root: Some("FromConfig".to_string()),
                plugins: Some(PathBuf::from("cfg-src")),
                server_root: Some("CfgServer".to_string()),
                server: Some(PathBuf::from("cfg-out")),
            },
            ..Config::default()
        };

        let outcome = parse(["--plugins", "cli-src", "Plugin"], &config).unwrap();
        let ParseOutcome::Request(request) = outcome else {
            panic!("expected request");
        };

        assert_eq!(request.plugin_root_name.as_deref(), Some("FromConfig"));
        assert_eq!(request.plugins_path, PathBuf::from("cli-src"));
        assert_eq!(request.server_root_name.as_deref(), Some("CfgServer"));
        assert_eq!(request.server_path, PathBuf::from("cfg-out"));
    }

    #[test]
    fn test_config_quiet_applies_without_flag() {
        let mut config = Config::default();
        config.output.quiet = true;

        let ParseOutcome::Request(request) = parse(["Plugin"], &config).unwrap() else {
            panic!("expected request");
        };
        assert!(request.quiet);
    }
}
