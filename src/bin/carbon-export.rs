use carbon_export::commands::export::{
    self,
    args::{self, ParseOutcome},
};
use carbon_export::config::Config;
use carbon_export::logging;

/// Export Carbon plugins to a server plugin folder for hot reloading.
fn main() {
    logging::init_tracing();

    // 設定ファイルを読み込む
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            export::report_error(&e, None);
            std::process::exit(1);
        }
    };

    let request = match args::parse(std::env::args_os().skip(1), &config) {
        Ok(ParseOutcome::Request(request)) => request,
        Ok(ParseOutcome::Help(text)) => {
            print!("{text}");
            std::process::exit(0);
        }
        Err(e) => {
            export::report_error(&e, None);
            std::process::exit(1);
        }
    };

    let exit_code = export::run(request, &config);
    std::process::exit(exit_code);
}
